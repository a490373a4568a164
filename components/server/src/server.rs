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

//! The select-multiplexed event loop and the orderly teardown. One
//! iteration merges every pollable's descriptors, selects with a 100ms
//! timeout, consumes latched signals, advances the timer tick, and
//! polls the subsystems in registration order.

use std::fs;
use std::io;
use std::time::{Duration, Instant};

use kismet_core::fdset::{self, FdSet};
use kismet_core::os::process::{self, wait_any_nohang};
use kismet_core::os::signals::{self, SignalEvent};

use httpd::HttpdServerKey;
use messagebus::{FatalQueueKey, MessageFlags};
use plugintracker::PlugintrackerKey;
use registry::GlobalRegistry;
use rootipc::RootIpcKey;
use sourcetracker::SourcetrackerKey;
use timetracker::TimetrackerKey;

pub const SELECT_TIMEOUT_MS: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Draining,
    SpindownFatal,
}

/// Where the loop goes next, given the registry flags. Fatal outranks
/// spindown; once fatal is observed the loop never stays in RUNNING.
pub fn next_state(fatal_condition: bool, spindown: bool) -> LoopState {
    if fatal_condition {
        LoopState::SpindownFatal
    } else if spindown {
        LoopState::Draining
    } else {
        LoopState::Running
    }
}

/// Run the core loop until spindown or a fatal condition, then perform
/// the orderly teardown. Returns the process exit code.
pub fn run(registry: &GlobalRegistry) -> i32 {
    loop {
        match next_state(registry.is_fatal_condition(), registry.is_spindown()) {
            LoopState::SpindownFatal => break,
            LoopState::Draining => {
                drain_until(registry, registry.shutdown_drain(), || false);
                break;
            }
            LoopState::Running => run_once(registry),
        }
    }
    spindown(registry)
}

/// One RUNNING iteration.
fn run_once(registry: &GlobalRegistry) {
    let mut rset = FdSet::new();
    let mut wset = FdSet::new();
    let mut max_fd = merge_wake_fd(&mut rset);

    for pollable in registry.snapshot_pollables() {
        max_fd = pollable.merge_set(max_fd, &mut rset, &mut wset);
    }

    match fdset::select(
        max_fd,
        &mut rset,
        &mut wset,
        Some(Duration::from_millis(SELECT_TIMEOUT_MS)),
    ) {
        Ok(_) => {}
        Err(ref e) if recoverable_select_error(e) => {}
        Err(e) => {
            registry.message(
                MessageFlags::ERROR,
                &format!("Main select loop failed: {}", e),
            );
            registry.set_fatal_condition();
            return;
        }
    }

    consume_signals(registry);

    if let Some(timetracker) = registry.fetch::<TimetrackerKey>() {
        timetracker.tick(registry);
    }

    for pollable in registry.snapshot_pollables() {
        let rv = pollable.poll(registry, &rset, &wset);
        if rv < 0 && registry.is_fatal_condition() {
            return;
        }
    }
}

/// A bounded drain: keep servicing pollable descriptors, but skip the
/// timer tick, until `stop` reports done, the window closes, or a
/// fatal condition appears. Shared by the IPC bootstrap handshake and
/// the spindown drain; each has its own configured window.
pub fn drain_until<F: Fn() -> bool>(registry: &GlobalRegistry, window: Duration, stop: F) {
    let deadline = Instant::now() + window;
    loop {
        if registry.is_fatal_condition() || stop() || Instant::now() >= deadline {
            return;
        }

        let mut rset = FdSet::new();
        let mut wset = FdSet::new();
        let mut max_fd = merge_wake_fd(&mut rset);
        for pollable in registry.snapshot_pollables() {
            max_fd = pollable.merge_set(max_fd, &mut rset, &mut wset);
        }

        match fdset::select(
            max_fd,
            &mut rset,
            &mut wset,
            Some(Duration::from_millis(SELECT_TIMEOUT_MS)),
        ) {
            Ok(_) => {}
            Err(ref e) if recoverable_select_error(e) => continue,
            Err(_) => return,
        }

        consume_signals(registry);

        for pollable in registry.snapshot_pollables() {
            if pollable.poll(registry, &rset, &wset) < 0 && registry.is_fatal_condition() {
                return;
            }
        }
    }
}

/// The orderly teardown. Every step is safe against the previous ones
/// having never run; a fatal during startup funnels through here too.
pub fn spindown(registry: &GlobalRegistry) -> i32 {
    // Helper death past this point is expected, not an event.
    signals::default_sigchld();

    if let Some(httpd) = registry.fetch::<HttpdServerKey>() {
        httpd.stop_httpd(registry);
    }
    if let Some(sourcetracker) = registry.fetch::<SourcetrackerKey>() {
        sourcetracker.stop_source(registry, 0);
    }

    registry.set_spindown();

    if !registry.is_daemonized() {
        eprintln!("\n*** KISMET IS SHUTTING DOWN ***");
    }

    // Let buffered log writes leave the process.
    drain_until(registry, registry.shutdown_drain(), || false);

    if let Some(ipc) = registry.fetch::<RootIpcKey>() {
        ipc.shutdown_ipc(registry);
    }

    if registry.is_fatal_condition() {
        eprintln!(
            "\n*** KISMET HAS ENCOUNTERED A FATAL ERROR AND CANNOT CONTINUE.  ***"
        );
    }

    eprintln!("Shutting down log files...");
    for dumpfile in registry.take_dumpfiles() {
        if let Err(e) = dumpfile.close(registry) {
            eprintln!("Unable to close {}: {}", dumpfile.name(), e);
        }
    }

    if let Some(plugintracker) = registry.fetch::<PlugintrackerKey>() {
        plugintracker.shutdown_plugins(registry);
    }

    if let Some(fatal_queue) = registry.fetch::<FatalQueueKey>() {
        fatal_queue.dump_fatals();
    }

    if !registry.is_daemonized() {
        eprintln!(
            "WARNING: Kismet changes the configuration of network devices.\n\
             \x20        In most cases you will need to restart networking for\n\
             \x20        your interface (varies per distribution/OS, but\n\
             \x20        usually:  /etc/init.d/networking restart\n"
        );
        eprintln!("Kismet exiting.");
    }

    registry.shutdown_lifetime_globals();

    if let Some(pid_file) = registry.take_pid_file() {
        if let Err(e) = fs::remove_file(&pid_file) {
            debug!("Unable to remove pid file {}: {}", pid_file.display(), e);
        }
    }

    if registry.is_fatal_condition() {
        1
    } else {
        0
    }
}

fn merge_wake_fd(rset: &mut FdSet) -> i32 {
    let wake = signals::wake_fd();
    if wake >= 0 {
        rset.set(wake);
        wake
    } else {
        0
    }
}

fn consume_signals(registry: &GlobalRegistry) {
    signals::drain_wake_fd();
    match signals::check_for_signal() {
        Some(SignalEvent::Shutdown) => registry.set_spindown(),
        Some(SignalEvent::Child) => {
            for (pid, status) in wait_any_nohang() {
                if !registry.is_spindown() {
                    debug!(
                        "Reaped child {} (exit {:?}, signal {:?})",
                        pid,
                        process::exit_status(status),
                        process::term_signal(status)
                    );
                    registry.push_sigchild(pid, status);
                }
            }
        }
        None => {}
    }
}

fn recoverable_select_error(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted || err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(test)]
mod test {
    use std::io;
    use std::time::{Duration, Instant};

    use super::*;
    use registry::{GlobalRegistry, Version};

    fn registry() -> GlobalRegistry {
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
        reg.set_shutdown_drain(Duration::from_millis(20));
        reg
    }

    #[test]
    fn fatal_outranks_spindown() {
        assert_eq!(next_state(true, true), LoopState::SpindownFatal);
        assert_eq!(next_state(true, false), LoopState::SpindownFatal);
        assert_eq!(next_state(false, true), LoopState::Draining);
        assert_eq!(next_state(false, false), LoopState::Running);
    }

    #[test]
    fn interrupted_select_is_not_fatal() {
        assert!(recoverable_select_error(&io::Error::from(
            io::ErrorKind::Interrupted
        )));
        assert!(recoverable_select_error(&io::Error::from(
            io::ErrorKind::WouldBlock
        )));
        assert!(!recoverable_select_error(&io::Error::from(
            io::ErrorKind::InvalidInput
        )));
    }

    #[test]
    fn drain_stops_on_condition() {
        let reg = registry();
        let start = Instant::now();
        drain_until(&reg, Duration::from_secs(10), || true);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn drain_stops_on_fatal() {
        let reg = registry();
        reg.set_fatal_condition();
        let start = Instant::now();
        drain_until(&reg, Duration::from_secs(10), || false);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn drain_runs_out_the_window() {
        let reg = registry();
        let start = Instant::now();
        drain_until(&reg, Duration::from_millis(150), || false);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn spindown_exit_code_reflects_fatal() {
        let reg = registry();
        assert_eq!(spindown(&reg), 0);

        let reg = registry();
        reg.set_fatal_condition();
        assert_eq!(spindown(&reg), 1);
    }

    #[test]
    fn run_exits_promptly_once_spindown_is_set() {
        let reg = registry();
        reg.set_spindown();
        let start = Instant::now();
        assert_eq!(run(&reg), 0);
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
