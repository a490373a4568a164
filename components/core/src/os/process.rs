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

use std::fmt::{self, Display, Formatter};
use std::io;

use libc::{self, c_int, pid_t};

use error::{Error, Result};

pub type Pid = pid_t;

#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    INT,
    QUIT,
    KILL,
    SEGV,
    TERM,
    HUP,
    CHLD,
    PIPE,
}

impl From<Signal> for i32 {
    fn from(value: Signal) -> i32 {
        match value {
            Signal::HUP => libc::SIGHUP,
            Signal::INT => libc::SIGINT,
            Signal::QUIT => libc::SIGQUIT,
            Signal::KILL => libc::SIGKILL,
            Signal::SEGV => libc::SIGSEGV,
            Signal::TERM => libc::SIGTERM,
            Signal::CHLD => libc::SIGCHLD,
            Signal::PIPE => libc::SIGPIPE,
        }
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match *self {
            Signal::HUP => "HUP",
            Signal::INT => "INT",
            Signal::QUIT => "QUIT",
            Signal::KILL => "KILL",
            Signal::SEGV => "SEGV",
            Signal::TERM => "TERM",
            Signal::CHLD => "CHLD",
            Signal::PIPE => "PIPE",
        };
        write!(f, "{}", s)
    }
}

pub fn current_pid() -> Pid {
    unsafe { libc::getpid() }
}

/// Is the process identified by the given PID still alive?
pub fn is_alive(pid: Pid) -> bool {
    match unsafe { libc::kill(pid, 0) } {
        0 => true,
        _ => {
            let err = io::Error::last_os_error();
            err.raw_os_error() == Some(libc::EPERM)
        }
    }
}

/// Send `signal` to the process identified by `pid`.
pub fn signal(pid: Pid, signal: Signal) -> Result<()> {
    match unsafe { libc::kill(pid, signal.into()) } {
        0 => Ok(()),
        _ => Err(Error::WaitPid(io::Error::last_os_error())),
    }
}

/// Non-blocking wait for a specific child. `Ok(None)` means the child
/// is still running; `Ok(Some(status))` carries the raw wait status.
pub fn try_wait(pid: Pid) -> Result<Option<c_int>> {
    let mut status = 0 as c_int;
    match unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } {
        0 => Ok(None),
        -1 => Err(Error::WaitPid(io::Error::last_os_error())),
        _ => Ok(Some(status)),
    }
}

/// Reap every child that has exited, without blocking. Returns the
/// (pid, raw wait status) pairs in reap order. Called from the event
/// loop after a SIGCHLD wakeup; never from the signal handler itself.
pub fn wait_any_nohang() -> Vec<(Pid, c_int)> {
    let mut reaped = Vec::new();
    loop {
        let mut status = 0 as c_int;
        match unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) } {
            pid if pid > 0 => reaped.push((pid, status)),
            _ => break,
        }
    }
    reaped
}

/// Exit code a child exited with, if it exited normally.
pub fn exit_status(raw: c_int) -> Option<i32> {
    if libc::WIFEXITED(raw) {
        Some(libc::WEXITSTATUS(raw))
    } else {
        None
    }
}

/// Signal number that terminated a child, if one did.
pub fn term_signal(raw: c_int) -> Option<i32> {
    if libc::WIFSIGNALED(raw) {
        Some(libc::WTERMSIG(raw))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_alive(current_pid()));
    }

    #[test]
    fn signal_numbers_match_libc() {
        let n: i32 = Signal::TERM.into();
        assert_eq!(n, libc::SIGTERM);
        let n: i32 = Signal::CHLD.into();
        assert_eq!(n, libc::SIGCHLD);
    }
}
