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

//! The console wrapper: a separate process that runs the real server
//! with its output piped, presents it in a three-region terminal
//! layout, and replays the tail of the output when the server exits so
//! the operator always sees how it ended.
//!
//! The server knows nothing about the wrapper beyond its stdout being
//! a pipe.

extern crate ansi_term;
extern crate env_logger;
#[macro_use]
extern crate kismet_core;
extern crate libc;
#[macro_use]
extern crate log;

mod console;

use std::collections::VecDeque;
use std::env;
use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use kismet_core::env as henv;
use kismet_core::fdset::{self, FdSet};
use kismet_core::os::process::{self, Signal};
use kismet_core::os::signals::{self, SignalEvent};

use console::Console;

static LOGKEY: &'static str = "WR";

/// Overrides the server binary the wrapper launches.
const SERVER_BINARY_ENV: &'static str = "KISMET_SERVER_BINARY";

/// Lines of server output replayed after exit.
const EXIT_BUFFER_LINES: usize = 48;

fn main() {
    env_logger::init();

    // The wrapper never wants the server's crash handlers; a fault
    // here should just kill the UI.
    if let Err(e) = signals::init(true) {
        outputln!("Unable to install signal handlers: {}", e);
        std::process::exit(1);
    }

    let mut child = match spawn_server() {
        Ok(child) => child,
        Err(e) => {
            outputln!("Unable to launch kismet_server: {}", e);
            std::process::exit(1);
        }
    };

    let mut console = Console::open();
    console.draw_chrome();

    let exit_buffer = pump_output(&mut child, &mut console);

    console.close();

    println!("Kismet server terminated.  Last output:");
    for line in &exit_buffer {
        print!("{}", line);
    }
    println!("Kismet exited.");
    child.wait().ok();
    std::process::exit(1);
}

fn spawn_server() -> std::io::Result<Child> {
    let binary = henv::var(SERVER_BINARY_ENV).unwrap_or_else(|_| "kismet_server".to_string());
    let mut command = Command::new(&binary);
    command.arg("--no-ncurses-wrapper");
    for arg in env::args().skip(1) {
        command.arg(arg);
    }
    debug!("Starting server {}", binary);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Read server output until EOF or a terminating signal, keeping the
/// last lines for the exit replay. Returns the exit buffer.
fn pump_output(child: &mut Child, console: &mut Console) -> VecDeque<String> {
    let mut exit_buffer = VecDeque::new();
    let stdout_fd = child.stdout.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1);
    let stderr_fd = child.stderr.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1);
    set_nonblock(stdout_fd);
    set_nonblock(stderr_fd);

    let mut stdout_buf = String::new();
    let mut stderr_buf = String::new();

    loop {
        match signals::check_for_signal() {
            Some(SignalEvent::Shutdown) => {
                // Pass the cancel down; the replay happens when the
                // child's pipes close.
                process::signal(child.id() as process::Pid, Signal::QUIT).ok();
            }
            Some(SignalEvent::Child) => {
                drain_remaining(child, console, &mut exit_buffer);
                break;
            }
            None => {}
        }

        let mut rset = FdSet::new();
        let mut wset = FdSet::new();
        let mut max_fd = signals::wake_fd();
        rset.set(max_fd);
        for fd in &[stdout_fd, stderr_fd] {
            if *fd >= 0 {
                rset.set(*fd);
                if *fd > max_fd {
                    max_fd = *fd;
                }
            }
        }

        match fdset::select(max_fd, &mut rset, &mut wset, Some(Duration::from_millis(250))) {
            Ok(_) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
        signals::drain_wake_fd();

        let mut eof = false;
        if rset.is_set(stdout_fd) {
            eof |= pump_fd(child.stdout.as_mut(), &mut stdout_buf, console, &mut exit_buffer);
        }
        if rset.is_set(stderr_fd) {
            eof |= pump_fd(child.stderr.as_mut(), &mut stderr_buf, console, &mut exit_buffer);
        }
        if eof {
            break;
        }
    }
    exit_buffer
}

/// Read whatever the pipe has, emit complete lines, and report EOF.
fn pump_fd<R: Read>(
    source: Option<&mut R>,
    pending: &mut String,
    console: &mut Console,
    exit_buffer: &mut VecDeque<String>,
) -> bool {
    let source = match source {
        Some(source) => source,
        None => return true,
    };
    let mut buf = [0u8; 2048];
    loop {
        match source.read(&mut buf) {
            Ok(0) => return true,
            Ok(n) => {
                pending.push_str(&String::from_utf8_lossy(&buf[..n]));
                while let Some(pos) = pending.find('\n') {
                    let line: String = pending.drain(..pos + 1).collect();
                    console.write_line(&line);
                    push_line(exit_buffer, line);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => return false,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return true,
        }
    }
}

/// After the child dies, its pipes may still hold buffered output;
/// collect it before the replay.
fn drain_remaining(
    child: &mut Child,
    console: &mut Console,
    exit_buffer: &mut VecDeque<String>,
) {
    let mut pending = String::new();
    pump_fd(child.stdout.as_mut(), &mut pending, console, exit_buffer);
    if !pending.is_empty() {
        push_line(exit_buffer, pending.clone());
        pending.clear();
    }
    pump_fd(child.stderr.as_mut(), &mut pending, console, exit_buffer);
    if !pending.is_empty() {
        push_line(exit_buffer, pending);
    }
}

fn push_line(exit_buffer: &mut VecDeque<String>, line: String) {
    exit_buffer.push_back(line);
    while exit_buffer.len() > EXIT_BUFFER_LINES {
        exit_buffer.pop_front();
    }
}

fn set_nonblock(fd: RawFd) {
    if fd < 0 {
        return;
    }
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}
