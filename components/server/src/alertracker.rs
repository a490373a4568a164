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

//! Alert definitions and the raise path. Raised alerts go out over the
//! message bus with the ALERT severity and are retained in a bounded
//! backlog for the REST interface and the alert log.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use time::{self, Timespec};

use messagebus::MessageFlags;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

const BACKLOG_MAX: usize = 50;

#[derive(Clone, Debug)]
pub struct AlertDefinition {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct RaisedAlert {
    pub id: i32,
    pub ts: Timespec,
    pub text: String,
}

pub struct Alertracker {
    definitions: RefCell<Vec<AlertDefinition>>,
    backlog: RefCell<VecDeque<RaisedAlert>>,
    next_id: Cell<i32>,
}

pub struct AlertrackerKey;

impl ComponentKey for AlertrackerKey {
    type Component = Alertracker;
    const KEY: &'static str = "ALERTTRACKER";
}

impl Alertracker {
    pub fn new() -> Rc<Alertracker> {
        Rc::new(Alertracker {
            definitions: RefCell::new(Vec::new()),
            backlog: RefCell::new(VecDeque::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn register_alert(&self, name: &str, description: &str) -> i32 {
        if let Some(existing) = self.definitions
            .borrow()
            .iter()
            .find(|d| d.name == name)
        {
            return existing.id;
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.definitions.borrow_mut().push(AlertDefinition {
            id: id,
            name: name.to_string(),
            description: description.to_string(),
        });
        id
    }

    pub fn fetch_alert_id(&self, name: &str) -> Option<i32> {
        self.definitions
            .borrow()
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.id)
    }

    /// Raise an alert: post it to the bus and retain it in the
    /// backlog. Unknown ids are a caller bug and are dropped with a
    /// note.
    pub fn raise_alert(&self, registry: &GlobalRegistry, id: i32, text: &str) {
        let known = self.definitions.borrow().iter().any(|d| d.id == id);
        if !known {
            warn!("Alert raised against unregistered id {}", id);
            return;
        }
        let mut backlog = self.backlog.borrow_mut();
        backlog.push_back(RaisedAlert {
            id: id,
            ts: time::get_time(),
            text: text.to_string(),
        });
        while backlog.len() > BACKLOG_MAX {
            backlog.pop_front();
        }
        drop(backlog);
        registry.message(MessageFlags::ALERT, text);
    }

    pub fn backlog(&self) -> Vec<RaisedAlert> {
        self.backlog.borrow().iter().cloned().collect()
    }

    pub fn definition_count(&self) -> usize {
        self.definitions.borrow().len()
    }
}

impl LifetimeGlobal for Alertracker {
    fn name(&self) -> &'static str {
        "alertracker"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use registry::{GlobalRegistry, Version};

    fn registry() -> GlobalRegistry {
        GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec![],
        )
    }

    #[test]
    fn registration_is_idempotent_by_name() {
        let tracker = Alertracker::new();
        let a = tracker.register_alert("BSSTS", "BSS timestamp went backwards");
        let b = tracker.register_alert("BSSTS", "BSS timestamp went backwards");
        assert_eq!(a, b);
        assert_eq!(tracker.definition_count(), 1);
    }

    #[test]
    fn raised_alerts_land_in_the_backlog() {
        let reg = registry();
        let tracker = Alertracker::new();
        let id = tracker.register_alert("TEST", "test alert");
        tracker.raise_alert(&reg, id, "something happened");
        let backlog = tracker.backlog();
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].text, "something happened");
    }

    #[test]
    fn unknown_ids_do_not_enter_the_backlog() {
        let reg = registry();
        let tracker = Alertracker::new();
        tracker.raise_alert(&reg, 42, "phantom");
        assert!(tracker.backlog().is_empty());
    }

    #[test]
    fn backlog_is_bounded() {
        let reg = registry();
        let tracker = Alertracker::new();
        let id = tracker.register_alert("TEST", "test alert");
        for n in 0..100 {
            tracker.raise_alert(&reg, id, &format!("alert {}", n));
        }
        assert_eq!(tracker.backlog().len(), BACKLOG_MAX);
    }
}
