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

//! Process signal handling for the server. Handlers touch nothing but
//! atomics and a self-pipe; the event loop merges the wake descriptor
//! into its select set and consumes the latched events from there.

use std::backtrace::Backtrace;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::panic;
use std::process;
use std::ptr;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use libc::{self, c_int, c_void};

use error::{Error, Result};

static INIT: Once = Once::new();

static SHUTDOWN_PENDING: AtomicBool = AtomicBool::new(false);
static CHILD_PENDING: AtomicBool = AtomicBool::new(false);

static WAKE_READ_FD: AtomicI32 = AtomicI32::new(-1);
static WAKE_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalEvent {
    /// One of INT, TERM, HUP, or QUIT arrived; begin spindown.
    Shutdown,
    /// One or more children have exited and want reaping.
    Child,
}

/// Install the server signal handlers and the crash reporters. With
/// `debug` set, the SEGV handler and the panic hook are left alone so
/// a debugger sees the raw fault.
pub fn init(debug: bool) -> Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = init_once(debug);
    });
    result
}

fn init_once(debug: bool) -> Result<()> {
    let mut fds = [0 as c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(Error::Pipe(io::Error::last_os_error()));
    }
    for fd in &fds {
        unsafe {
            libc::fcntl(*fd, libc::F_SETFL, libc::O_NONBLOCK);
            libc::fcntl(*fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }
    }
    WAKE_READ_FD.store(fds[0], Ordering::SeqCst);
    WAKE_WRITE_FD.store(fds[1], Ordering::SeqCst);

    for sig in &[libc::SIGINT, libc::SIGTERM, libc::SIGHUP, libc::SIGQUIT] {
        install(*sig, handler_addr(handle_shutdown), 0)?;
    }
    install(libc::SIGCHLD, handler_addr(handle_child), libc::SA_NOCLDSTOP)?;
    install(libc::SIGPIPE, libc::SIG_IGN, 0)?;

    if !debug {
        install(libc::SIGSEGV, handler_addr(handle_segv), 0)?;
        panic::set_hook(Box::new(|info| {
            unsafe {
                libc::signal(libc::SIGSEGV, libc::SIG_DFL);
                libc::signal(libc::SIGCHLD, libc::SIG_DFL);
            }
            let msg = if let Some(s) = info.payload().downcast_ref::<&str>() {
                *s
            } else if let Some(s) = info.payload().downcast_ref::<String>() {
                s.as_str()
            } else {
                "unknown panic payload"
            };
            eprintln!("Uncaught exception \"{}\"", msg);
            eprintln!("{}", Backtrace::force_capture());
            process::abort();
        }));
    }
    Ok(())
}

/// Check for a latched signal event. Shutdown outranks child reaping;
/// a pending child event stays latched for the next check.
pub fn check_for_signal() -> Option<SignalEvent> {
    if SHUTDOWN_PENDING.swap(false, Ordering::SeqCst) {
        return Some(SignalEvent::Shutdown);
    }
    if CHILD_PENDING.swap(false, Ordering::SeqCst) {
        return Some(SignalEvent::Child);
    }
    None
}

/// The read end of the self-pipe; merge this into the select read set
/// so a signal interrupts the poll timeout.
pub fn wake_fd() -> RawFd {
    WAKE_READ_FD.load(Ordering::SeqCst)
}

/// Throw away any bytes the handlers wrote to the self-pipe.
pub fn drain_wake_fd() {
    let fd = wake_fd();
    if fd < 0 {
        return;
    }
    let mut buf = [0u8; 32];
    loop {
        let rv = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut c_void, buf.len()) };
        if rv <= 0 {
            break;
        }
    }
}

/// Put SIGCHLD back to its default disposition. Called at the top of
/// teardown so the capture helper's death does not loop us back into
/// the reaper.
pub fn default_sigchld() {
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
    }
}

fn handler_addr(handler: extern "C" fn(c_int)) -> libc::sighandler_t {
    handler as libc::sighandler_t
}

fn install(sig: c_int, handler: libc::sighandler_t, flags: c_int) -> Result<()> {
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = handler;
        action.sa_flags = flags;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(sig, &action, ptr::null_mut()) != 0 {
            return Err(Error::SignalInstall(io::Error::last_os_error()));
        }
    }
    Ok(())
}

fn wake() {
    let fd = WAKE_WRITE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        unsafe {
            libc::write(fd, b"s".as_ptr() as *const c_void, 1);
        }
    }
}

extern "C" fn handle_shutdown(_: c_int) {
    SHUTDOWN_PENDING.store(true, Ordering::SeqCst);
    wake();
}

extern "C" fn handle_child(_: c_int) {
    CHILD_PENDING.store(true, Ordering::SeqCst);
    wake();
}

extern "C" fn handle_segv(_: c_int) {
    // A second fault while reporting should kill us the ordinary way.
    unsafe {
        libc::signal(libc::SIGSEGV, libc::SIG_DFL);
        libc::signal(libc::SIGABRT, libc::SIG_DFL);
        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
    }
    eprintln!("Segmentation Fault (SIGSEGV / 11)");
    eprintln!("{}", Backtrace::force_capture());
    process::exit(-11);
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use libc;

    use super::*;
    use os::process;

    #[test]
    fn shutdown_signal_is_latched_and_consumed() {
        init(true).unwrap();
        process::signal(process::current_pid(), process::Signal::HUP).unwrap();
        // Delivery is to this process; give the kernel a beat.
        let mut seen = None;
        for _ in 0..100 {
            seen = check_for_signal();
            if seen.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(seen, Some(SignalEvent::Shutdown));
        assert_eq!(check_for_signal(), None);
        drain_wake_fd();
    }

    #[test]
    fn wake_fd_exists_after_init() {
        init(true).unwrap();
        assert!(wake_fd() >= 0);
        let flags = unsafe { libc::fcntl(wake_fd(), libc::F_GETFL, 0) };
        assert!(flags & libc::O_NONBLOCK != 0);
    }
}
