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

use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::result;

use capture_protocol;
use kismet_core;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    ConfigFileIO(PathBuf, io::Error),
    ConfigFileParse(PathBuf, usize, String),
    Core(kismet_core::Error),
    DuplicateKey(&'static str),
    DumpfileIO(PathBuf, io::Error),
    HttpdBind(String, io::Error),
    IpcNotRunning,
    IpcProtocol(capture_protocol::Error),
    IpcSpawn(io::Error),
    Io(io::Error),
    PcapMagic(PathBuf, u32),
    PidFileIO(PathBuf, io::Error),
    SourceConfig(String),
    SourceTypeUnknown(String),
    TimerInvalid(i64),
    TuntapOpen(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::ConfigFileIO(ref p, ref e) => {
                format!("Unable to read config file {}, {}", p.display(), e)
            }
            Error::ConfigFileParse(ref p, line, ref what) => {
                format!("Illegal config line {} in {}: {}", line, p.display(), what)
            }
            Error::Core(ref e) => format!("{}", e),
            Error::DuplicateKey(key) => {
                format!("A component is already registered under '{}'", key)
            }
            Error::DumpfileIO(ref p, ref e) => {
                format!("Unable to write dump file {}, {}", p.display(), e)
            }
            Error::HttpdBind(ref addr, ref e) => {
                format!("Unable to bind web server to {}, {}", addr, e)
            }
            Error::IpcNotRunning => "The capture helper is not running".to_string(),
            Error::IpcProtocol(ref e) => format!("Capture helper protocol error, {}", e),
            Error::IpcSpawn(ref e) => format!("Unable to launch the capture helper, {}", e),
            Error::Io(ref e) => format!("{}", e),
            Error::PcapMagic(ref p, magic) => {
                format!("{} is not a pcap file (magic {:#010x})", p.display(), magic)
            }
            Error::PidFileIO(ref p, ref e) => {
                format!("Unable to write pid file {}, {}", p.display(), e)
            }
            Error::SourceConfig(ref what) => format!("Invalid packet source definition: {}", what),
            Error::SourceTypeUnknown(ref t) => {
                format!("No packet source of type '{}' is available", t)
            }
            Error::TimerInvalid(slices) => {
                format!("Timers must fire in the future, got {} timeslices", slices)
            }
            Error::TuntapOpen(ref e) => format!("Unable to open tun/tap control device, {}", e),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::ConfigFileIO(..) => "Unable to read config file",
            Error::ConfigFileParse(..) => "Illegal config line",
            Error::Core(_) => "OS-level failure",
            Error::DuplicateKey(_) => "Component already registered under key",
            Error::DumpfileIO(..) => "Unable to write dump file",
            Error::HttpdBind(..) => "Unable to bind web server",
            Error::IpcNotRunning => "The capture helper is not running",
            Error::IpcProtocol(_) => "Capture helper protocol error",
            Error::IpcSpawn(_) => "Unable to launch the capture helper",
            Error::Io(_) => "IO error",
            Error::PcapMagic(..) => "Not a pcap file",
            Error::PidFileIO(..) => "Unable to write pid file",
            Error::SourceConfig(_) => "Invalid packet source definition",
            Error::SourceTypeUnknown(_) => "No such packet source type",
            Error::TimerInvalid(_) => "Timers must fire in the future",
            Error::TuntapOpen(_) => "Unable to open tun/tap control device",
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<kismet_core::Error> for Error {
    fn from(err: kismet_core::Error) -> Error {
        Error::Core(err)
    }
}

impl From<capture_protocol::Error> for Error {
    fn from(err: capture_protocol::Error) -> Error {
        Error::IpcProtocol(err)
    }
}
