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
use std::result;

use protocol;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Frame(protocol::Error),
    Io(io::Error),
    PrivilegeDrop(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::Frame(ref e) => format!("IPC framing error, {}", e),
            Error::Io(ref e) => format!("IPC channel error, {}", e),
            Error::PrivilegeDrop(ref e) => format!("Unable to drop privileges, {}", e),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Frame(_) => "IPC framing error",
            Error::Io(_) => "IPC channel error",
            Error::PrivilegeDrop(_) => "Unable to drop privileges",
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<protocol::Error> for Error {
    fn from(err: protocol::Error) -> Error {
        Error::Frame(err)
    }
}
