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

//! Wire protocol between the Kismet server and the privileged capture
//! helper. The channel is a pair of anonymous pipes; records are
//! framed with a fixed header and an opaque payload. Only the STARTUP
//! handshake payload is defined here; every other payload belongs to
//! the subsystem that registered the command.

extern crate byteorder;
#[macro_use]
extern crate log;

pub mod error;
pub mod frame;

pub use error::{Error, Result};
pub use frame::{Frame, FrameReader, FRAME_HEADER_LEN, MAX_PAYLOAD};

/// Synchronous startup handshake; the helper acks on boot and the
/// server later sends the bare command to authorize privilege drop.
pub const CMD_STARTUP: u32 = 1;
/// Orderly helper shutdown.
pub const CMD_SHUTDOWN: u32 = 2;
/// Seals the privileged-capability set; nothing requiring root may be
/// registered after this.
pub const CMD_SYNC_ROOT: u32 = 3;
/// Ships the registered command table so the helper can route frames.
pub const CMD_SYNC_CMDS: u32 = 4;
/// First id handed out to subsystem-registered commands.
pub const CMD_USER_BASE: u32 = 100;

/// Exit code the helper uses when respawning it cannot help (bad
/// installation, refused privileges).
pub const ERR_NO_RETRY_EXCODE: i32 = 86;

/// Overrides the compiled-in helper binary location.
pub const CAPTURE_BINARY_ENV: &'static str = "KISMET_CAPTURE_BINARY";
/// Pid of the spawning server, exported to the helper.
pub const CAPTURE_PARENT_PID_ENV: &'static str = "KISMET_CAPTURE_PARENT_PID";

/// Payload of a STARTUP ack: one status byte and the helper-side errno
/// observed while preparing capture rights (0 when clean).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartupStatus {
    pub ok: bool,
    pub errno: i32,
}

impl StartupStatus {
    pub fn encode(&self) -> Vec<u8> {
        use byteorder::{LittleEndian, WriteBytesExt};
        let mut buf = Vec::with_capacity(5);
        buf.write_u8(if self.ok { 1 } else { 0 }).unwrap();
        buf.write_i32::<LittleEndian>(self.errno).unwrap();
        buf
    }

    pub fn decode(payload: &[u8]) -> Result<StartupStatus> {
        use byteorder::{LittleEndian, ReadBytesExt};
        use std::io::Cursor;
        if payload.len() < 5 {
            return Err(Error::ShortPayload(payload.len()));
        }
        let mut cur = Cursor::new(payload);
        let ok = cur.read_u8().map_err(Error::Io)? != 0;
        let errno = cur.read_i32::<LittleEndian>().map_err(Error::Io)?;
        Ok(StartupStatus {
            ok: ok,
            errno: errno,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn startup_status_carries_errno() {
        let status = StartupStatus {
            ok: false,
            errno: 13,
        };
        let decoded = StartupStatus::decode(&status.encode()).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn short_startup_payload_is_an_error() {
        assert!(StartupStatus::decode(&[1, 0]).is_err());
    }
}
