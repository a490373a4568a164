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

//! Privilege-split bootstrap: spawns the suid capture helper with a
//! pair of anonymous pipes, performs the STARTUP handshake, and then
//! serves as an ordinary pollable routing frames between the helper
//! and whichever subsystems registered commands with it.

use std::cell::{Cell, RefCell};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::process::{Child, Command, Stdio};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use libc::{self, c_void};

use capture_protocol::{self, Frame, FrameReader, StartupStatus};
use kismet_core::env as henv;
use kismet_core::fdset::FdSet;
use kismet_core::os::process::Pid;

use error::{Error, Result};
use messagebus::MessageFlags;
use pollable::Pollable;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};
use server;
use BIN_LOC;

const READ_CHUNK: usize = 4096;

pub type IpcHandler = Box<dyn Fn(&GlobalRegistry, &Frame) -> i32>;

struct IpcCommand {
    id: u32,
    name: String,
    handler: Option<IpcHandler>,
}

pub struct RootIpc {
    child: RefCell<Option<Child>>,
    child_pid: Cell<Pid>,
    read_fd: Cell<RawFd>,
    write_fd: Cell<RawFd>,
    reader: RefCell<FrameReader>,
    outbuf: RefCell<Vec<u8>>,
    cmds: RefCell<Vec<IpcCommand>>,
    next_cmd: Cell<u32>,
    synced: Cell<bool>,
    last_errno: Cell<i32>,
    shutdown_done: Cell<bool>,
}

pub struct RootIpcKey;

impl ComponentKey for RootIpcKey {
    type Component = RootIpc;
    const KEY: &'static str = "ROOTIPC";
}

impl RootIpc {
    /// Launch the capture helper with its stdin/stdout wired to our
    /// pipes. A helper that cannot be launched still yields a value:
    /// the handshake then times out and reports the condition as a
    /// critical failure rather than aborting startup outright.
    pub fn spawn(registry: &GlobalRegistry) -> Rc<RootIpc> {
        let binary = helper_binary();
        let ipc = Rc::new(RootIpc {
            child: RefCell::new(None),
            child_pid: Cell::new(0),
            read_fd: Cell::new(-1),
            write_fd: Cell::new(-1),
            reader: RefCell::new(FrameReader::new()),
            outbuf: RefCell::new(Vec::new()),
            cmds: RefCell::new(Vec::new()),
            next_cmd: Cell::new(capture_protocol::CMD_USER_BASE),
            synced: Cell::new(false),
            last_errno: Cell::new(0),
            shutdown_done: Cell::new(false),
        });

        debug!("Spawning capture helper {}", binary);
        let spawned = Command::new(&binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .env(
                capture_protocol::CAPTURE_PARENT_PID_ENV,
                format!("{}", ::kismet_core::os::process::current_pid()),
            ).spawn();

        match spawned {
            Ok(child) => {
                let read_fd = child.stdout.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1);
                let write_fd = child.stdin.as_ref().map(|s| s.as_raw_fd()).unwrap_or(-1);
                set_nonblock(read_fd);
                set_nonblock(write_fd);
                ipc.child_pid.set(child.id() as Pid);
                ipc.read_fd.set(read_fd);
                ipc.write_fd.set(write_fd);
                *ipc.child.borrow_mut() = Some(child);
            }
            Err(e) => {
                ipc.last_errno.set(e.raw_os_error().unwrap_or(0));
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Unable to launch {}: {}", binary, e),
                );
            }
        }
        ipc
    }

    pub fn is_running(&self) -> bool {
        self.read_fd.get() >= 0
    }

    pub fn fetch_spawn_pid(&self) -> Pid {
        self.child_pid.get()
    }

    pub fn fetch_ipc_synced(&self) -> bool {
        self.synced.get()
    }

    pub fn fetch_errno(&self) -> i32 {
        self.last_errno.get()
    }

    /// Register a command with the channel. `STARTUP` resolves to the
    /// reserved handshake id; everything else draws a fresh id from
    /// the counter. A command may be registered without a handler when
    /// only its ack matters.
    pub fn register_ipc_cmd(&self, name: &str, handler: Option<IpcHandler>) -> u32 {
        let id = if name == "STARTUP" {
            capture_protocol::CMD_STARTUP
        } else {
            let id = self.next_cmd.get();
            self.next_cmd.set(id + 1);
            id
        };
        self.cmds.borrow_mut().push(IpcCommand {
            id: id,
            name: name.to_string(),
            handler: handler,
        });
        id
    }

    pub fn send_ipc(&self, frame: &Frame) -> Result<()> {
        if !self.is_running() {
            return Err(Error::IpcNotRunning);
        }
        frame.encode(&mut self.outbuf.borrow_mut())?;
        Ok(())
    }

    /// Seal the privileged capability set. Everything that needs the
    /// helper's root rights must be registered before this point.
    pub fn sync_root(&self) -> Result<()> {
        self.send_ipc(&Frame::new(capture_protocol::CMD_SYNC_ROOT, Vec::new()))
    }

    /// Ship the registered command table so the helper can route
    /// frames by id.
    pub fn sync_ipc(&self) -> Result<()> {
        let mut table = String::new();
        for cmd in self.cmds.borrow().iter() {
            table.push_str(&format!("{}:{}\n", cmd.id, cmd.name));
        }
        self.send_ipc(&Frame::new(
            capture_protocol::CMD_SYNC_CMDS,
            table.into_bytes(),
        ))
    }

    /// Authorize the helper to drop privileges; sent once startup has
    /// registered everything privileged.
    pub fn send_startup(&self) -> Result<()> {
        self.send_ipc(&Frame::new(capture_protocol::CMD_STARTUP, Vec::new()))
    }

    /// Ask the helper to exit and reap it. Safe to call twice; the
    /// second call is a no-op.
    pub fn shutdown_ipc(&self, registry: &GlobalRegistry) {
        if self.shutdown_done.replace(true) || !self.is_running() {
            return;
        }
        if self.send_ipc(&Frame::new(capture_protocol::CMD_SHUTDOWN, Vec::new())).is_ok() {
            self.flush_blocking(Duration::from_millis(500));
        }
        let mut child = self.child.borrow_mut();
        if let Some(ref mut child) = *child {
            let deadline = Instant::now() + Duration::from_secs(1);
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Capture helper exited: {}", status);
                        break;
                    }
                    Ok(None) => {
                        if Instant::now() >= deadline {
                            registry.message(
                                MessageFlags::ERROR,
                                "Capture helper did not exit; killing it",
                            );
                            child.kill().ok();
                            child.wait().ok();
                            break;
                        }
                        thread::sleep(Duration::from_millis(50));
                    }
                    Err(e) => {
                        warn!("Unable to wait for capture helper, {}", e);
                        break;
                    }
                }
            }
        }
        self.read_fd.set(-1);
        self.write_fd.set(-1);
    }

    fn flush_blocking(&self, window: Duration) {
        let deadline = Instant::now() + window;
        while !self.outbuf.borrow().is_empty() && Instant::now() < deadline {
            if !self.write_some() {
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    /// Write as much buffered output as the pipe accepts. Returns
    /// false when the pipe is full or dead.
    fn write_some(&self) -> bool {
        let fd = self.write_fd.get();
        if fd < 0 {
            return false;
        }
        let mut outbuf = self.outbuf.borrow_mut();
        if outbuf.is_empty() {
            return false;
        }
        let rv =
            unsafe { libc::write(fd, outbuf.as_ptr() as *const c_void, outbuf.len()) };
        if rv > 0 {
            outbuf.drain(..rv as usize);
            true
        } else {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                debug!("Capture helper pipe write failed, {}", err);
            }
            false
        }
    }

    fn handle_frame(&self, registry: &GlobalRegistry, frame: &Frame) -> i32 {
        if frame.cmdnum == capture_protocol::CMD_STARTUP && frame.ack {
            match StartupStatus::decode(&frame.data) {
                Ok(status) => {
                    self.last_errno.set(status.errno);
                    if status.ok {
                        self.synced.set(true);
                    }
                }
                Err(e) => {
                    warn!("Undecodable STARTUP ack from capture helper, {}", e);
                }
            }
            return 0;
        }
        let handler_rv = {
            let cmds = self.cmds.borrow();
            match cmds.iter().find(|c| c.id == frame.cmdnum) {
                Some(cmd) => match cmd.handler {
                    Some(ref handler) => Some(handler(registry, frame)),
                    None => Some(0),
                },
                None => None,
            }
        };
        match handler_rv {
            Some(rv) => rv,
            None => {
                warn!("Unknown command {} from capture helper", frame.cmdnum);
                0
            }
        }
    }

    fn mark_dead(&self) {
        self.read_fd.set(-1);
        self.write_fd.set(-1);
    }
}

impl Pollable for RootIpc {
    fn merge_set(&self, mut max_fd: RawFd, rset: &mut FdSet, wset: &mut FdSet) -> RawFd {
        let read_fd = self.read_fd.get();
        if read_fd < 0 {
            return max_fd;
        }
        rset.set(read_fd);
        if read_fd > max_fd {
            max_fd = read_fd;
        }
        if !self.outbuf.borrow().is_empty() {
            let write_fd = self.write_fd.get();
            wset.set(write_fd);
            if write_fd > max_fd {
                max_fd = write_fd;
            }
        }
        max_fd
    }

    fn poll(&self, registry: &GlobalRegistry, rset: &FdSet, wset: &FdSet) -> i32 {
        let read_fd = self.read_fd.get();
        if read_fd < 0 {
            return 0;
        }

        if wset.is_set(self.write_fd.get()) {
            self.write_some();
        }

        if rset.is_set(read_fd) {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let rv = unsafe {
                    libc::read(read_fd, buf.as_mut_ptr() as *mut c_void, buf.len())
                };
                if rv > 0 {
                    self.reader.borrow_mut().extend(&buf[..rv as usize]);
                } else if rv == 0 {
                    registry.message(
                        MessageFlags::ERROR,
                        "Capture helper closed the IPC channel unexpectedly",
                    );
                    self.mark_dead();
                    return -1;
                } else {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::WouldBlock
                        || err.kind() == io::ErrorKind::Interrupted
                    {
                        break;
                    }
                    registry.message(
                        MessageFlags::ERROR,
                        &format!("Capture helper IPC read failed: {}", err),
                    );
                    self.mark_dead();
                    return -1;
                }
            }
        }

        loop {
            let frame = match self.reader.borrow_mut().next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    registry.message(
                        MessageFlags::ERROR,
                        &format!("Capture helper sent an invalid frame: {}", e),
                    );
                    self.mark_dead();
                    return -1;
                }
            };
            let rv = self.handle_frame(registry, &frame);
            if rv < 0 {
                return rv;
            }
        }
        0
    }
}

impl LifetimeGlobal for RootIpc {
    fn name(&self) -> &'static str {
        "rootipc"
    }
    fn shutdown(&self, registry: &GlobalRegistry) {
        self.shutdown_ipc(registry);
    }
}

/// Run the bounded startup handshake: drain pollables until the helper
/// acks STARTUP or the window closes, then record the outcome. The
/// failure text depends on the helper's errno; permission failures get
/// the "kismet group" diagnosis.
pub fn bootstrap(registry: &GlobalRegistry, ipc: &Rc<RootIpc>) {
    ipc.register_ipc_cmd("STARTUP", None);

    let window = registry.ipc_sync_timeout();
    let synced = ipc.clone();
    server::drain_until(registry, window, move || synced.fetch_ipc_synced());

    if ipc.fetch_ipc_synced() {
        registry.message(
            MessageFlags::INFO,
            &format!(
                "Started kismet_capture control binary successfully, pid {}",
                ipc.fetch_spawn_pid()
            ),
        );
        return;
    }

    let errno = ipc.fetch_errno();
    let fail_msg = if errno == libc::EPERM || errno == libc::EACCES {
        "Could not launch kismet_capture control binary, due to permission \
         errors.  To run Kismet suid-root your user MUST BE IN THE 'kismet' \
         GROUP.  Use the 'groups' command to show what groups your user is \
         in, and consult the Kismet README for more information."
    } else {
        "Failed to start kismet_capture control binary.  Make sure that \
         kismet_capture is installed, is suid-root, and that your user is in \
         the 'kismet' group, or run Kismet as root.  See the README for more \
         information."
    };
    registry.add_critfail(fail_msg);
    registry.message(MessageFlags::FATAL, fail_msg);
}

fn helper_binary() -> String {
    match henv::var(capture_protocol::CAPTURE_BINARY_ENV) {
        Ok(path) => path,
        Err(_) => format!("{}/kismet_capture", BIN_LOC),
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
