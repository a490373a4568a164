// Copyright (c) 2017 Mike Kershaw and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Exposes the recent message-bus traffic over the REST interface.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json;
use time;

use httpd::{HttpdHandler, HttpdResponse};
use messagebus::{MessageClient, MessageFlags};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

const RETAIN_MAX: usize = 100;

#[derive(Clone, Debug, Serialize)]
struct RetainedMessage {
    ts_sec: i64,
    flags: u32,
    message: String,
}

pub struct RestMessageClient {
    messages: RefCell<VecDeque<RetainedMessage>>,
}

pub struct RestMessageKey;

impl ComponentKey for RestMessageKey {
    type Component = RestMessageClient;
    const KEY: &'static str = "REST_MESSAGE";
}

impl RestMessageClient {
    pub fn new() -> Rc<RestMessageClient> {
        Rc::new(RestMessageClient {
            messages: RefCell::new(VecDeque::new()),
        })
    }

    pub fn message_count(&self) -> usize {
        self.messages.borrow().len()
    }
}

impl MessageClient for RestMessageClient {
    fn process_message(&self, msg: &str, flags: MessageFlags) {
        let mut messages = self.messages.borrow_mut();
        messages.push_back(RetainedMessage {
            ts_sec: time::get_time().sec,
            flags: flags.bits(),
            message: msg.to_string(),
        });
        while messages.len() > RETAIN_MAX {
            messages.pop_front();
        }
    }
}

impl HttpdHandler for RestMessageClient {
    fn httpd_verify_path(&self, path: &str, method: &str) -> bool {
        method == "GET" && path == "/messagebus/all_messages.json"
    }

    fn httpd_handle_request(
        &self,
        _registry: &GlobalRegistry,
        _path: &str,
        _method: &str,
    ) -> HttpdResponse {
        let messages: Vec<RetainedMessage> =
            self.messages.borrow().iter().cloned().collect();
        match serde_json::to_vec(&messages) {
            Ok(body) => HttpdResponse::json(body),
            Err(_) => HttpdResponse::not_found(),
        }
    }
}

impl LifetimeGlobal for RestMessageClient {
    fn name(&self) -> &'static str {
        "restmessage"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use registry::{GlobalRegistry, Version};

    #[test]
    fn retains_a_bounded_backlog() {
        let client = RestMessageClient::new();
        for n in 0..150 {
            client.process_message(&format!("msg {}", n), MessageFlags::INFO);
        }
        assert_eq!(client.message_count(), RETAIN_MAX);
    }

    #[test]
    fn serves_messages_as_json() {
        let reg = GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec![],
        );
        let client = RestMessageClient::new();
        client.process_message("hello operator", MessageFlags::INFO);
        assert!(client.httpd_verify_path("/messagebus/all_messages.json", "GET"));
        let response = client.httpd_handle_request(&reg, "/messagebus/all_messages.json", "GET");
        assert_eq!(response.status, 200);
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("hello operator"));
    }
}
