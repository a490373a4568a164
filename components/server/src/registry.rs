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

//! The global registry: the one value created before any subsystem and
//! destroyed after all of them. It is not a process global; it is
//! passed by reference into every constructor and every poll call, and
//! all cross-subsystem coupling resolves through its typed name map.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::Duration;

use libc::c_int;
use time::{self, Timespec};

use kismet_core::os::process::Pid;

use dumpfile::Dumpfile;
use error::{Error, Result};
use messagebus::{MessageBusKey, MessageFlags};
use pollable::Pollable;

/// Default width of both bounded windows: the capture-helper startup
/// handshake and the spindown drain. They are configured separately
/// (`ipc_sync_timeout`, `shutdown_drain`); sharing a default is not
/// sharing a constant.
pub const DEFAULT_WINDOW_SECS: u64 = 2;

#[derive(Clone, Copy, Debug)]
pub struct Version {
    pub major: &'static str,
    pub minor: &'static str,
    pub tiny: &'static str,
    pub revision: &'static str,
    pub revdate: &'static str,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}-{}", self.major, self.minor, self.tiny)
    }
}

/// An unrecoverable, user-visible event recorded during startup or
/// runtime. Appended once, replayed at teardown, never mutated.
#[derive(Clone, Debug)]
pub struct CriticalFailure {
    pub fail_time: Timespec,
    pub fail_msg: String,
}

/// A reaped child process, queued for whichever subsystem cares.
#[derive(Clone, Copy, Debug)]
pub struct ChildExit {
    pub pid: Pid,
    pub status: c_int,
}

/// A typed name for a registry component. The key string is the wire
/// between subsystems; the associated type makes `fetch` return a
/// handle of the right shape without downcasting at the call site.
pub trait ComponentKey {
    type Component: Any;
    const KEY: &'static str;
}

/// A subsystem whose destruction is sequenced by the orderly teardown.
/// `shutdown` runs in reverse registration order; dropping the last
/// strong reference afterwards releases the resources themselves.
pub trait LifetimeGlobal {
    fn name(&self) -> &'static str;
    fn shutdown(&self, _registry: &GlobalRegistry) {}
}

struct PollEntry {
    id: u64,
    pollable: Weak<dyn Pollable>,
}

type PollEntries = Rc<RefCell<Vec<PollEntry>>>;

/// Returned from `register_pollable`; dropping it removes the
/// registration, so a subsystem cannot outlive its slot in the loop.
pub struct PollToken {
    id: u64,
    entries: Weak<RefCell<Vec<PollEntry>>>,
}

impl Drop for PollToken {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.borrow_mut().retain(|e| e.id != self.id);
        }
    }
}

pub struct GlobalRegistry {
    pub version: Version,
    pub argv: Vec<String>,
    pub envp: Vec<(String, String)>,

    homedir: RefCell<PathBuf>,
    servername: RefCell<String>,

    components: RefCell<HashMap<&'static str, Rc<dyn Any>>>,
    lifetime_globals: RefCell<Vec<Rc<dyn LifetimeGlobal>>>,
    torn_down: Cell<bool>,

    pollables: PollEntries,
    next_poll_id: Cell<u64>,

    dumpfiles: RefCell<Vec<Rc<dyn Dumpfile>>>,

    spindown: Cell<bool>,
    fatal_condition: Cell<bool>,

    critfail_vec: RefCell<Vec<CriticalFailure>>,
    sigchild_vec: RefCell<Vec<ChildExit>>,

    getopt_long_num: Cell<u32>,
    usage_funcs: RefCell<Vec<fn()>>,

    cmdline_sources: RefCell<Vec<String>>,
    subsystem_optargs: RefCell<Vec<String>>,

    ipc_sync_timeout: Cell<Duration>,
    shutdown_drain: Cell<Duration>,

    pid_file: RefCell<Option<PathBuf>>,
    daemonized: Cell<bool>,
}

impl GlobalRegistry {
    pub fn new(version: Version, argv: Vec<String>) -> GlobalRegistry {
        GlobalRegistry {
            version: version,
            argv: argv,
            envp: ::std::env::vars().collect(),
            homedir: RefCell::new(PathBuf::from("/")),
            servername: RefCell::new(String::from("Kismet")),
            components: RefCell::new(HashMap::new()),
            lifetime_globals: RefCell::new(Vec::new()),
            torn_down: Cell::new(false),
            pollables: Rc::new(RefCell::new(Vec::new())),
            next_poll_id: Cell::new(1),
            dumpfiles: RefCell::new(Vec::new()),
            spindown: Cell::new(false),
            fatal_condition: Cell::new(false),
            critfail_vec: RefCell::new(Vec::new()),
            sigchild_vec: RefCell::new(Vec::new()),
            getopt_long_num: Cell::new(127),
            usage_funcs: RefCell::new(Vec::new()),
            cmdline_sources: RefCell::new(Vec::new()),
            subsystem_optargs: RefCell::new(Vec::new()),
            ipc_sync_timeout: Cell::new(Duration::from_secs(DEFAULT_WINDOW_SECS)),
            shutdown_drain: Cell::new(Duration::from_secs(DEFAULT_WINDOW_SECS)),
            pid_file: RefCell::new(None),
            daemonized: Cell::new(false),
        }
    }

    // Typed name map
    ////////////////////////////////////////////////////////////////////

    pub fn insert<K: ComponentKey>(&self, component: Rc<K::Component>) -> Result<()> {
        let mut components = self.components.borrow_mut();
        if components.contains_key(K::KEY) {
            return Err(Error::DuplicateKey(K::KEY));
        }
        components.insert(K::KEY, component as Rc<dyn Any>);
        Ok(())
    }

    pub fn fetch<K: ComponentKey>(&self) -> Option<Rc<K::Component>> {
        self.components
            .borrow()
            .get(K::KEY)
            .and_then(|c| c.clone().downcast::<K::Component>().ok())
    }

    // Lifetime globals
    ////////////////////////////////////////////////////////////////////

    pub fn register_lifetime_global(&self, global: Rc<dyn LifetimeGlobal>) {
        debug!("Registering lifetime global {}", global.name());
        self.lifetime_globals.borrow_mut().push(global);
    }

    /// Tear down every lifetime global in reverse registration order,
    /// then clear the registry itself. A second call is a no-op. A
    /// destructor that panics is reported and skipped; it must not
    /// take the rest of the teardown with it.
    pub fn shutdown_lifetime_globals(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        let globals = self.lifetime_globals.replace(Vec::new());
        for global in globals.into_iter().rev() {
            let name = global.name();
            let result = panic::catch_unwind(AssertUnwindSafe(|| global.shutdown(self)));
            if result.is_err() {
                eprintln!("Teardown of {} failed; continuing", name);
            }
        }
        self.components.borrow_mut().clear();
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    // Pollables
    ////////////////////////////////////////////////////////////////////

    pub fn register_pollable(&self, pollable: Weak<dyn Pollable>) -> PollToken {
        let id = self.next_poll_id.get();
        self.next_poll_id.set(id + 1);
        self.pollables.borrow_mut().push(PollEntry {
            id: id,
            pollable: pollable,
        });
        PollToken {
            id: id,
            entries: Rc::downgrade(&self.pollables),
        }
    }

    /// Convenience for the common case: register a concrete pollable
    /// subsystem held by `Rc`.
    pub fn register_pollable_rc<T: Pollable + 'static>(&self, pollable: &Rc<T>) -> PollToken {
        self.register_pollable(Rc::downgrade(pollable) as Weak<dyn Pollable>)
    }

    /// The loop iterates a snapshot so a handler may register or drop
    /// pollables without invalidating the iteration.
    pub fn snapshot_pollables(&self) -> Vec<Rc<dyn Pollable>> {
        self.pollables
            .borrow()
            .iter()
            .filter_map(|e| e.pollable.upgrade())
            .collect()
    }

    // Dumpfiles
    ////////////////////////////////////////////////////////////////////

    pub fn register_dumpfile(&self, dumpfile: Rc<dyn Dumpfile>) {
        self.dumpfiles.borrow_mut().push(dumpfile);
    }

    pub fn snapshot_dumpfiles(&self) -> Vec<Rc<dyn Dumpfile>> {
        self.dumpfiles.borrow().iter().cloned().collect()
    }

    /// Remove every dumpfile registration; teardown uses this to drop
    /// the final strong references after the closing flush.
    pub fn take_dumpfiles(&self) -> Vec<Rc<dyn Dumpfile>> {
        self.dumpfiles.replace(Vec::new())
    }

    // Spindown and fatal flags; both are monotone within a run.
    ////////////////////////////////////////////////////////////////////

    pub fn set_spindown(&self) {
        self.spindown.set(true);
    }

    pub fn is_spindown(&self) -> bool {
        self.spindown.get()
    }

    pub fn set_fatal_condition(&self) {
        self.fatal_condition.set(true);
    }

    pub fn is_fatal_condition(&self) -> bool {
        self.fatal_condition.get()
    }

    // Critical failures and reaped children
    ////////////////////////////////////////////////////////////////////

    pub fn add_critfail(&self, msg: &str) {
        self.critfail_vec.borrow_mut().push(CriticalFailure {
            fail_time: time::get_time(),
            fail_msg: msg.to_string(),
        });
    }

    pub fn critfails(&self) -> Vec<CriticalFailure> {
        self.critfail_vec.borrow().clone()
    }

    pub fn push_sigchild(&self, pid: Pid, status: c_int) {
        self.sigchild_vec.borrow_mut().push(ChildExit {
            pid: pid,
            status: status,
        });
    }

    pub fn drain_sigchild(&self) -> Vec<ChildExit> {
        self.sigchild_vec.replace(Vec::new())
    }

    // Odds and ends every subsystem reaches for
    ////////////////////////////////////////////////////////////////////

    /// Hand out a unique long-option code for a subsystem flag.
    pub fn reserve_option_code(&self) -> u32 {
        let code = self.getopt_long_num.get();
        self.getopt_long_num.set(code + 1);
        code
    }

    pub fn register_usage_func(&self, func: fn()) {
        self.usage_funcs.borrow_mut().push(func);
    }

    pub fn usage_funcs(&self) -> Vec<fn()> {
        self.usage_funcs.borrow().clone()
    }

    pub fn set_homedir(&self, path: PathBuf) {
        *self.homedir.borrow_mut() = path;
    }

    pub fn homedir(&self) -> PathBuf {
        self.homedir.borrow().clone()
    }

    pub fn set_servername(&self, name: &str) {
        *self.servername.borrow_mut() = name.to_string();
    }

    pub fn servername(&self) -> String {
        self.servername.borrow().clone()
    }

    pub fn add_cmdline_source(&self, source: &str) {
        self.cmdline_sources.borrow_mut().push(source.to_string());
    }

    pub fn cmdline_sources(&self) -> Vec<String> {
        self.cmdline_sources.borrow().clone()
    }

    pub fn add_subsystem_optarg(&self, arg: &str) {
        self.subsystem_optargs.borrow_mut().push(arg.to_string());
    }

    pub fn subsystem_optargs(&self) -> Vec<String> {
        self.subsystem_optargs.borrow().clone()
    }

    pub fn set_ipc_sync_timeout(&self, window: Duration) {
        self.ipc_sync_timeout.set(window);
    }

    pub fn ipc_sync_timeout(&self) -> Duration {
        self.ipc_sync_timeout.get()
    }

    pub fn set_shutdown_drain(&self, window: Duration) {
        self.shutdown_drain.set(window);
    }

    pub fn shutdown_drain(&self) -> Duration {
        self.shutdown_drain.get()
    }

    pub fn set_pid_file(&self, path: PathBuf) {
        *self.pid_file.borrow_mut() = Some(path);
    }

    pub fn take_pid_file(&self) -> Option<PathBuf> {
        self.pid_file.borrow_mut().take()
    }

    pub fn set_daemonized(&self) {
        self.daemonized.set(true);
    }

    pub fn is_daemonized(&self) -> bool {
        self.daemonized.get()
    }

    /// Post a message to the bus, or to stderr if the bus is not up
    /// yet. This is the one cross-subsystem call common enough to earn
    /// a convenience method.
    pub fn message(&self, flags: MessageFlags, msg: &str) {
        match self.fetch::<MessageBusKey>() {
            Some(bus) => bus.post(flags, msg),
            None => eprintln!("{:?}: {}", flags, msg),
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::{Cell, RefCell};
    use std::os::unix::io::RawFd;
    use std::rc::Rc;

    use super::*;
    use kismet_core::fdset::FdSet;

    fn registry() -> GlobalRegistry {
        GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec!["kismet_server".to_string()],
        )
    }

    struct Widget;

    struct WidgetKey;

    impl ComponentKey for WidgetKey {
        type Component = Widget;
        const KEY: &'static str = "WIDGET";
    }

    #[test]
    fn insert_then_fetch_returns_the_same_handle() {
        let reg = registry();
        let widget = Rc::new(Widget);
        reg.insert::<WidgetKey>(widget.clone()).unwrap();
        let fetched = reg.fetch::<WidgetKey>().unwrap();
        assert!(Rc::ptr_eq(&widget, &fetched));
    }

    #[test]
    fn duplicate_insert_fails() {
        let reg = registry();
        reg.insert::<WidgetKey>(Rc::new(Widget)).unwrap();
        assert!(reg.insert::<WidgetKey>(Rc::new(Widget)).is_err());
    }

    #[test]
    fn fetch_of_unknown_key_is_absent() {
        assert!(registry().fetch::<WidgetKey>().is_none());
    }

    struct OrderedGlobal {
        order: Rc<RefCell<Vec<&'static str>>>,
        tag: &'static str,
    }

    impl LifetimeGlobal for OrderedGlobal {
        fn name(&self) -> &'static str {
            self.tag
        }
        fn shutdown(&self, _reg: &GlobalRegistry) {
            self.order.borrow_mut().push(self.tag);
        }
    }

    #[test]
    fn lifetime_globals_tear_down_in_reverse_order() {
        let reg = registry();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in &["first", "second", "third"] {
            reg.register_lifetime_global(Rc::new(OrderedGlobal {
                order: order.clone(),
                tag: *tag,
            }));
        }
        reg.shutdown_lifetime_globals();
        assert_eq!(*order.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn double_teardown_is_a_noop() {
        let reg = registry();
        let order = Rc::new(RefCell::new(Vec::new()));
        reg.register_lifetime_global(Rc::new(OrderedGlobal {
            order: order.clone(),
            tag: "only",
        }));
        reg.shutdown_lifetime_globals();
        reg.shutdown_lifetime_globals();
        assert_eq!(order.borrow().len(), 1);
    }

    struct PanickyGlobal;

    impl LifetimeGlobal for PanickyGlobal {
        fn name(&self) -> &'static str {
            "panicky"
        }
        fn shutdown(&self, _reg: &GlobalRegistry) {
            panic!("boom");
        }
    }

    #[test]
    fn panicking_destructor_is_isolated() {
        let reg = registry();
        let order = Rc::new(RefCell::new(Vec::new()));
        reg.register_lifetime_global(Rc::new(OrderedGlobal {
            order: order.clone(),
            tag: "survivor",
        }));
        reg.register_lifetime_global(Rc::new(PanickyGlobal));
        reg.shutdown_lifetime_globals();
        assert_eq!(*order.borrow(), vec!["survivor"]);
    }

    struct CountingPollable {
        polls: Cell<u32>,
        tag: u32,
        seen: Rc<RefCell<Vec<u32>>>,
    }

    impl ::pollable::Pollable for CountingPollable {
        fn merge_set(&self, max_fd: RawFd, _rset: &mut FdSet, _wset: &mut FdSet) -> RawFd {
            max_fd
        }
        fn poll(&self, _reg: &GlobalRegistry, _rset: &FdSet, _wset: &FdSet) -> i32 {
            self.polls.set(self.polls.get() + 1);
            self.seen.borrow_mut().push(self.tag);
            0
        }
    }

    #[test]
    fn pollables_are_snapshotted_in_registration_order() {
        let reg = registry();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut keep = Vec::new();
        for tag in 0..3 {
            let p = Rc::new(CountingPollable {
                polls: Cell::new(0),
                tag: tag,
                seen: seen.clone(),
            });
            let token = reg.register_pollable(
                Rc::downgrade(&p) as ::std::rc::Weak<dyn (::pollable::Pollable)>
            );
            keep.push((p, token));
        }
        let rset = FdSet::new();
        let wset = FdSet::new();
        for p in reg.snapshot_pollables() {
            p.poll(&reg, &rset, &wset);
        }
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn dropping_the_token_deregisters() {
        let reg = registry();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let p = Rc::new(CountingPollable {
            polls: Cell::new(0),
            tag: 7,
            seen: seen.clone(),
        });
        let token =
            reg.register_pollable(Rc::downgrade(&p) as ::std::rc::Weak<dyn (::pollable::Pollable)>);
        assert_eq!(reg.snapshot_pollables().len(), 1);
        drop(token);
        assert!(reg.snapshot_pollables().is_empty());
    }

    #[test]
    fn fatal_condition_is_monotone() {
        let reg = registry();
        assert!(!reg.is_fatal_condition());
        reg.set_fatal_condition();
        assert!(reg.is_fatal_condition());
        // There is no way back; the only mutator sets it.
        reg.set_fatal_condition();
        assert!(reg.is_fatal_condition());
    }

    #[test]
    fn option_codes_are_unique() {
        let reg = registry();
        let a = reg.reserve_option_code();
        let b = reg.reserve_option_code();
        assert!(a != b);
    }
}
