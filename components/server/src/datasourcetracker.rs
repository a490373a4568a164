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

//! The next-generation datasource registry. Datasource drivers
//! announce themselves here; the REST interface lists them. Capture
//! still flows through the packet source tracker.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json;

use httpd::{HttpdHandler, HttpdResponse};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

#[derive(Clone, Debug, Serialize)]
pub struct DatasourceType {
    pub name: String,
    pub description: String,
}

pub struct Datasourcetracker {
    types: RefCell<Vec<DatasourceType>>,
}

pub struct DatasourcetrackerKey;

impl ComponentKey for DatasourcetrackerKey {
    type Component = Datasourcetracker;
    const KEY: &'static str = "DATASOURCETRACKER";
}

impl Datasourcetracker {
    pub fn new() -> Rc<Datasourcetracker> {
        Rc::new(Datasourcetracker {
            types: RefCell::new(Vec::new()),
        })
    }

    pub fn register_datasource_type(&self, name: &str, description: &str) -> i32 {
        let mut types = self.types.borrow_mut();
        if types.iter().any(|t| t.name == name) {
            return -1;
        }
        types.push(DatasourceType {
            name: name.to_string(),
            description: description.to_string(),
        });
        0
    }

    pub fn type_count(&self) -> usize {
        self.types.borrow().len()
    }
}

impl HttpdHandler for Datasourcetracker {
    fn httpd_verify_path(&self, path: &str, method: &str) -> bool {
        method == "GET" && path == "/datasource/all_source_types.json"
    }

    fn httpd_handle_request(
        &self,
        _registry: &GlobalRegistry,
        _path: &str,
        _method: &str,
    ) -> HttpdResponse {
        let types: Vec<DatasourceType> = self.types.borrow().iter().cloned().collect();
        match serde_json::to_vec(&types) {
            Ok(body) => HttpdResponse::json(body),
            Err(_) => HttpdResponse::not_found(),
        }
    }
}

impl LifetimeGlobal for Datasourcetracker {
    fn name(&self) -> &'static str {
        "datasourcetracker"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_types_are_rejected() {
        let tracker = Datasourcetracker::new();
        assert_eq!(tracker.register_datasource_type("pcapfile", "pcap replay"), 0);
        assert_eq!(tracker.register_datasource_type("pcapfile", "pcap replay"), -1);
        assert_eq!(tracker.type_count(), 1);
    }
}
