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

//! The Kismet server core: global registry, message bus, timer and
//! event loop, privilege-split IPC bootstrap, and the subsystems that
//! join the loop through the pollable contract.

#[macro_use]
extern crate bitflags;
extern crate byteorder;
extern crate kismet_core;
extern crate kismet_capture_protocol as capture_protocol;
extern crate libc;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
extern crate time;
#[cfg(test)]
extern crate tempdir;

pub mod alertracker;
pub mod channeltracker;
pub mod configfile;
pub mod datasourcetracker;
pub mod devicetracker;
pub mod dissectors;
pub mod dlt;
pub mod dumpfile;
pub mod entrytracker;
pub mod error;
pub mod gps;
pub mod httpd;
pub mod manuf;
pub mod messagebus;
pub mod packetchain;
pub mod packetsource;
pub mod phy80211;
pub mod plugintracker;
pub mod pollable;
pub mod registry;
pub mod rootipc;
pub mod server;
pub mod sourcetracker;
pub mod statealert;
pub mod systemmonitor;
pub mod timetracker;

pub use error::{Error, Result};

pub const VERSION_MAJOR: &'static str = "2016";
pub const VERSION_MINOR: &'static str = "07";
pub const VERSION_TINY: &'static str = "R1";
pub const REVISION: &'static str = "rust-1";
pub const REVDATE: &'static str = "2017-10-01";

/// Compiled-in configuration directory, overridable at runtime with
/// the `KISMET_CONF` environment variable.
pub const SYSCONF_LOC: &'static str = "/usr/local/etc";
/// Compiled-in location of the capture helper binary.
pub const BIN_LOC: &'static str = "/usr/local/bin";

pub const CONFIG_BASE: &'static str = "kismet.conf";
pub const PID_BASE: &'static str = "kismet_server.pid";
