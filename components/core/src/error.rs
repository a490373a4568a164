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

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    GroupNotFound(String),
    Pipe(io::Error),
    SignalInstall(io::Error),
    UserNotFound(String),
    WaitPid(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::GroupNotFound(ref g) => format!("No GID for group '{}' could be found", g),
            Error::Pipe(ref e) => format!("Unable to create pipe, {}", e),
            Error::SignalInstall(ref e) => format!("Unable to install signal handler, {}", e),
            Error::UserNotFound(ref u) => format!("No UID for user '{}' could be found", u),
            Error::WaitPid(ref e) => format!("Unable to wait for child process, {}", e),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::GroupNotFound(_) => "Group not found",
            Error::Pipe(_) => "Unable to create pipe",
            Error::SignalInstall(_) => "Unable to install signal handler",
            Error::UserNotFound(_) => "User not found",
            Error::WaitPid(_) => "Unable to wait for child process",
        }
    }
}
