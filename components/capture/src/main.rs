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

//! The privileged capture helper. Installed suid-root, spawned by the
//! server with its stdin/stdout wired to the IPC pipes; it holds raw
//! capture rights on the server's behalf and drops the rest of its
//! privileges once the server authorizes it.

extern crate env_logger;
extern crate kismet_capture_protocol as protocol;
extern crate kismet_core;
extern crate libc;
#[macro_use]
extern crate log;

mod error;
mod handlers;
mod server;

use std::process;

fn main() {
    env_logger::init();

    // The helper only makes sense on the end of the server's pipes; a
    // human invoking it directly gets an explanation, not a protocol
    // stream.
    if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
        eprintln!(
            "kismet_capture is the root control helper for the Kismet server \
             and cannot be run directly.  Start kismet_server instead."
        );
        process::exit(protocol::ERR_NO_RETRY_EXCODE);
    }

    match server::run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Capture helper failed: {}", e);
            process::exit(protocol::ERR_NO_RETRY_EXCODE);
        }
    }
}
