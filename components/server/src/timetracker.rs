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

//! Timer callbacks fired from the event loop tick, measured in server
//! timeslices.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use time::{self, Duration, Timespec};

use error::{Error, Result};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

/// Timeslices per second; one slice is one select timeout.
pub const SERVER_TIMESLICES_SEC: i64 = 10;

pub type TimerCallback = Box<dyn Fn(&GlobalRegistry, i32) -> i32>;

struct Timer {
    id: i32,
    next_trigger: Timespec,
    interval: Duration,
    recurring: bool,
    callback: TimerCallback,
}

pub struct Timetracker {
    timers: RefCell<Vec<Timer>>,
    next_id: Cell<i32>,
}

pub struct TimetrackerKey;

impl ComponentKey for TimetrackerKey {
    type Component = Timetracker;
    const KEY: &'static str = "TIMETRACKER";
}

impl Timetracker {
    pub fn new() -> Rc<Timetracker> {
        Rc::new(Timetracker {
            timers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    /// Register a callback to fire `slices` timeslices from now. A
    /// recurring timer re-arms itself until removed or until the
    /// callback returns zero or less.
    pub fn register_timer(
        &self,
        slices: i64,
        recurring: bool,
        callback: TimerCallback,
    ) -> Result<i32> {
        if slices <= 0 {
            return Err(Error::TimerInvalid(slices));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let interval = Duration::milliseconds(slices * 1000 / SERVER_TIMESLICES_SEC);
        self.timers.borrow_mut().push(Timer {
            id: id,
            next_trigger: time::get_time() + interval,
            interval: interval,
            recurring: recurring,
            callback: callback,
        });
        Ok(id)
    }

    pub fn remove_timer(&self, id: i32) {
        self.timers.borrow_mut().retain(|t| t.id != id);
    }

    /// Fire every due timer. Runs from the loop once per iteration,
    /// before the pollables.
    pub fn tick(&self, registry: &GlobalRegistry) {
        self.tick_at(registry, time::get_time());
    }

    fn tick_at(&self, registry: &GlobalRegistry, now: Timespec) {
        // Callbacks may register or remove timers, so the list is
        // taken out for the duration of the pass and merged back.
        let timers = self.timers.replace(Vec::new());
        let mut survivors = Vec::with_capacity(timers.len());
        for mut timer in timers {
            if timer.next_trigger > now {
                survivors.push(timer);
                continue;
            }
            let rv = (timer.callback)(registry, timer.id);
            if timer.recurring && rv > 0 {
                timer.next_trigger = now + timer.interval;
                survivors.push(timer);
            }
        }
        let mut timers = self.timers.borrow_mut();
        let added = timers.split_off(0);
        *timers = survivors;
        timers.extend(added);
    }

    pub fn timer_count(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl LifetimeGlobal for Timetracker {
    fn name(&self) -> &'static str {
        "timetracker"
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::rc::Rc;

    use time::{self, Duration};

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
    fn timer_does_not_fire_early() {
        let reg = registry();
        let tracker = Timetracker::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        tracker
            .register_timer(
                SERVER_TIMESLICES_SEC,
                false,
                Box::new(move |_reg, _id| {
                    counter.set(counter.get() + 1);
                    1
                }),
            ).unwrap();
        tracker.tick_at(&reg, time::get_time());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn one_shot_timer_fires_once() {
        let reg = registry();
        let tracker = Timetracker::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        tracker
            .register_timer(
                1,
                false,
                Box::new(move |_reg, _id| {
                    counter.set(counter.get() + 1);
                    1
                }),
            ).unwrap();
        let later = time::get_time() + Duration::seconds(5);
        tracker.tick_at(&reg, later);
        tracker.tick_at(&reg, later + Duration::seconds(5));
        assert_eq!(fired.get(), 1);
        assert_eq!(tracker.timer_count(), 0);
    }

    #[test]
    fn recurring_timer_rearms_until_cancelled() {
        let reg = registry();
        let tracker = Timetracker::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        tracker
            .register_timer(
                1,
                true,
                Box::new(move |_reg, _id| {
                    counter.set(counter.get() + 1);
                    // Cancel after the third firing.
                    if counter.get() >= 3 {
                        0
                    } else {
                        1
                    }
                }),
            ).unwrap();
        let mut now = time::get_time();
        for _ in 0..6 {
            now = now + Duration::seconds(1);
            tracker.tick_at(&reg, now);
        }
        assert_eq!(fired.get(), 3);
        assert_eq!(tracker.timer_count(), 0);
    }

    #[test]
    fn nonpositive_slices_are_rejected() {
        let tracker = Timetracker::new();
        assert!(tracker.register_timer(0, false, Box::new(|_, _| 1)).is_err());
    }

    #[test]
    fn removed_timer_never_fires() {
        let reg = registry();
        let tracker = Timetracker::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let id = tracker
            .register_timer(
                1,
                true,
                Box::new(move |_reg, _id| {
                    counter.set(counter.get() + 1);
                    1
                }),
            ).unwrap();
        tracker.remove_timer(id);
        tracker.tick_at(&reg, time::get_time() + Duration::seconds(5));
        assert_eq!(fired.get(), 0);
    }
}
