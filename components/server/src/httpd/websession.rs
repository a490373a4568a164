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

//! Web login session configuration. The credentials come from the
//! config file; shipping with the defaults gets the operator a loud
//! warning, not a quiet hole.

use std::rc::Rc;

use configfile::ConfigFile;
use httpd::{HttpdHandler, HttpdResponse};
use messagebus::MessageFlags;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

const DEFAULT_USER: &'static str = "kismet";
const DEFAULT_PASSWORD: &'static str = "kismet";

pub struct Websession {
    username: String,
    password: String,
}

pub struct WebsessionKey;

impl ComponentKey for WebsessionKey {
    type Component = Websession;
    const KEY: &'static str = "WEBSESSION";
}

impl Websession {
    pub fn new(registry: &GlobalRegistry, config: &ConfigFile) -> Rc<Websession> {
        let username = config
            .fetch_opt("httpd_username")
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        let password = config
            .fetch_opt("httpd_password")
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
        if username == DEFAULT_USER && password == DEFAULT_PASSWORD {
            registry.message(
                MessageFlags::ERROR,
                "The web server is using the default login 'kismet:kismet'.  Set \
                 httpd_username and httpd_password in the config file.",
            );
        }
        Rc::new(Websession {
            username: username,
            password: password,
        })
    }

    pub fn validate(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

impl HttpdHandler for Websession {
    fn httpd_verify_path(&self, path: &str, method: &str) -> bool {
        method == "GET" && path == "/session/check_session"
    }

    fn httpd_handle_request(
        &self,
        _registry: &GlobalRegistry,
        _path: &str,
        _method: &str,
    ) -> HttpdResponse {
        // Session cookies are issued by the login flow; a bare check
        // from an unauthenticated client reports no session.
        HttpdResponse::json(b"{\"session\":false}".to_vec())
    }
}

impl LifetimeGlobal for Websession {
    fn name(&self) -> &'static str {
        "websession"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validate_checks_both_fields() {
        let session = Websession {
            username: "operator".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(session.validate("operator", "hunter2"));
        assert!(!session.validate("operator", "wrong"));
        assert!(!session.validate("other", "hunter2"));
    }
}
