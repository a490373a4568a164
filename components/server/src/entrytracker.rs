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

//! Stable numeric ids for tracked field names, shared by the REST
//! serializers and the log writers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use registry::{ComponentKey, LifetimeGlobal};

pub struct EntryTracker {
    names: RefCell<Vec<(String, String)>>,
    ids: RefCell<HashMap<String, usize>>,
}

pub struct EntryTrackerKey;

impl ComponentKey for EntryTrackerKey {
    type Component = EntryTracker;
    const KEY: &'static str = "ENTRYTRACKER";
}

impl EntryTracker {
    pub fn new() -> Rc<EntryTracker> {
        Rc::new(EntryTracker {
            names: RefCell::new(Vec::new()),
            ids: RefCell::new(HashMap::new()),
        })
    }

    /// Register a field, or return the existing id when the name is
    /// already known.
    pub fn register_field(&self, name: &str, description: &str) -> usize {
        if let Some(&id) = self.ids.borrow().get(name) {
            return id;
        }
        let mut names = self.names.borrow_mut();
        let id = names.len();
        names.push((name.to_string(), description.to_string()));
        self.ids.borrow_mut().insert(name.to_string(), id);
        id
    }

    pub fn field_name(&self, id: usize) -> Option<String> {
        self.names.borrow().get(id).map(|&(ref n, _)| n.clone())
    }

    pub fn field_id(&self, name: &str) -> Option<usize> {
        self.ids.borrow().get(name).cloned()
    }

    pub fn field_count(&self) -> usize {
        self.names.borrow().len()
    }
}

impl LifetimeGlobal for EntryTracker {
    fn name(&self) -> &'static str {
        "entrytracker"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_stable_and_idempotent() {
        let tracker = EntryTracker::new();
        let a = tracker.register_field("kismet.device.base.macaddr", "MAC address");
        let b = tracker.register_field("kismet.device.base.channel", "channel");
        let a2 = tracker.register_field("kismet.device.base.macaddr", "MAC address");
        assert_eq!(a, a2);
        assert!(a != b);
        assert_eq!(
            tracker.field_name(a).unwrap(),
            "kismet.device.base.macaddr"
        );
        assert_eq!(tracker.field_id("kismet.device.base.channel"), Some(b));
        assert_eq!(tracker.field_count(), 2);
    }
}
