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

//! The helper's serve loop: ack STARTUP on boot, answer frames from
//! the server until the pipe closes or a SHUTDOWN arrives, drop
//! privileges when authorized.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use libc;

use kismet_core::env as henv;
use protocol::{self, Frame, FrameReader, StartupStatus};

use error::{Error, Result};
use handlers::{ChansetHandler, Handler};

const READ_CHUNK: usize = 4096;

/// State shared with the command handlers.
pub struct HelperState {
    channels: HashMap<String, u32>,
    root_synced: bool,
    privileges_dropped: bool,
    commands: HashMap<u32, String>,
}

impl HelperState {
    pub fn new() -> HelperState {
        HelperState {
            channels: HashMap::new(),
            root_synced: false,
            privileges_dropped: false,
            commands: HashMap::new(),
        }
    }

    pub fn record_channel(&mut self, interface: &str, channel: u32) {
        self.channels.insert(interface.to_string(), channel);
    }

    pub fn channel_for(&self, interface: &str) -> Option<u32> {
        self.channels.get(interface).cloned()
    }

    /// Parse the `id:name` table shipped by the sync command.
    fn load_command_table(&mut self, payload: &[u8]) {
        for line in String::from_utf8_lossy(payload).lines() {
            let mut parts = line.splitn(2, ':');
            let id = parts.next().and_then(|i| i.parse::<u32>().ok());
            let name = parts.next();
            if let (Some(id), Some(name)) = (id, name) {
                self.commands.insert(id, name.to_string());
            }
        }
    }

    fn command_name(&self, id: u32) -> Option<&str> {
        self.commands.get(&id).map(|n| n.as_str())
    }
}

pub fn run() -> Result<i32> {
    if let Ok(parent) = henv::var(protocol::CAPTURE_PARENT_PID_ENV) {
        debug!("Serving capture for server pid {}", parent);
    }

    let mut state = HelperState::new();
    let mut reader = FrameReader::new();
    let mut stdin = io::stdin();

    // Announce readiness immediately; the server's bootstrap window is
    // short. The errno tells the server why capture rights are absent
    // when they are.
    send_frame(&startup_ack())?;

    let mut buf = [0u8; READ_CHUNK];
    loop {
        let read = match stdin.read(&mut buf) {
            Ok(0) => {
                // Server went away; there is nobody left to serve.
                info!("IPC channel closed, exiting");
                return Ok(0);
            }
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        reader.extend(&buf[..read]);

        while let Some(frame) = reader.next_frame()? {
            if let Some(code) = handle_frame(&frame, &mut state)? {
                return Ok(code);
            }
        }
    }
}

fn handle_frame(frame: &Frame, state: &mut HelperState) -> Result<Option<i32>> {
    match frame.cmdnum {
        protocol::CMD_SHUTDOWN => {
            debug!("Shutdown requested");
            send_frame(&Frame::ack(protocol::CMD_SHUTDOWN, Vec::new()))?;
            Ok(Some(0))
        }
        protocol::CMD_STARTUP => {
            // The bare STARTUP command authorizes the privilege drop;
            // everything privileged is registered by now.
            drop_privileges(state)?;
            Ok(None)
        }
        protocol::CMD_SYNC_ROOT => {
            state.root_synced = true;
            Ok(None)
        }
        protocol::CMD_SYNC_CMDS => {
            state.load_command_table(&frame.data);
            Ok(None)
        }
        other => {
            let reply = match state.command_name(other) {
                Some(name) if name == ChansetHandler::NAME => {
                    Some(ChansetHandler::run(&frame.data, state))
                }
                Some(name) => {
                    warn!("No handler for command {} ({})", other, name);
                    None
                }
                None => {
                    warn!("Unknown command id {}", other);
                    None
                }
            };
            if let Some(payload) = reply {
                send_frame(&Frame::ack(other, payload))?;
            }
            Ok(None)
        }
    }
}

fn startup_ack() -> Frame {
    let euid = unsafe { libc::geteuid() };
    let status = if euid == 0 {
        StartupStatus { ok: true, errno: 0 }
    } else {
        // Without effective root the helper cannot hold capture
        // rights; the server turns this errno into the 'kismet group'
        // diagnosis.
        StartupStatus {
            ok: false,
            errno: libc::EPERM,
        }
    };
    Frame::ack(protocol::CMD_STARTUP, status.encode())
}

/// Give up everything but the capture rights: return to the invoking
/// user's real uid/gid. Only meaningful when running suid.
fn drop_privileges(state: &mut HelperState) -> Result<()> {
    if state.privileges_dropped {
        return Ok(());
    }
    state.privileges_dropped = true;

    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };
    if unsafe { libc::geteuid() } != 0 || uid == 0 {
        return Ok(());
    }
    if unsafe { libc::setgid(gid) } != 0 {
        return Err(Error::PrivilegeDrop(io::Error::last_os_error()));
    }
    if unsafe { libc::setuid(uid) } != 0 {
        return Err(Error::PrivilegeDrop(io::Error::last_os_error()));
    }
    info!("Dropped privileges to uid {} gid {}", uid, gid);
    Ok(())
}

fn send_frame(frame: &Frame) -> Result<()> {
    let mut encoded = Vec::new();
    frame.encode(&mut encoded)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(&encoded)?;
    handle.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use protocol::{self, Frame, StartupStatus};

    use super::*;

    #[test]
    fn startup_ack_reflects_privilege_state() {
        let ack = startup_ack();
        assert_eq!(ack.cmdnum, protocol::CMD_STARTUP);
        assert!(ack.ack);
        let status = StartupStatus::decode(&ack.data).unwrap();
        // The test harness is not suid root.
        if unsafe { ::libc::geteuid() } == 0 {
            assert!(status.ok);
        } else {
            assert!(!status.ok);
            assert_eq!(status.errno, ::libc::EPERM);
        }
    }

    #[test]
    fn sync_cmds_builds_the_routing_table() {
        let mut state = HelperState::new();
        state.load_command_table(b"100:CHANSET\n101:CHANLIST\n");
        assert_eq!(state.command_name(100), Some("CHANSET"));
        assert_eq!(state.command_name(101), Some("CHANLIST"));
        assert_eq!(state.command_name(102), None);
    }

    #[test]
    fn shutdown_frame_ends_the_loop() {
        let mut state = HelperState::new();
        let frame = Frame::new(protocol::CMD_SHUTDOWN, Vec::new());
        // send_frame writes the ack to stdout; in tests stdout is a
        // capture buffer, which is fine.
        let rv = handle_frame(&frame, &mut state).unwrap();
        assert_eq!(rv, Some(0));
    }

    #[test]
    fn sync_root_is_recorded() {
        let mut state = HelperState::new();
        let frame = Frame::new(protocol::CMD_SYNC_ROOT, Vec::new());
        handle_frame(&frame, &mut state).unwrap();
        assert!(state.root_synced);
    }
}
