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
    BadSentinel(u32),
    Io(io::Error),
    OversizedPayload(usize),
    ShortPayload(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::BadSentinel(found) => {
                format!("Frame sentinel mismatch, found {:#010x}", found)
            }
            Error::Io(ref e) => format!("Frame IO error, {}", e),
            Error::OversizedPayload(len) => {
                format!("Frame payload of {} bytes exceeds the maximum", len)
            }
            Error::ShortPayload(len) => format!("Frame payload of {} bytes is truncated", len),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::BadSentinel(_) => "Frame sentinel mismatch",
            Error::Io(_) => "Frame IO error",
            Error::OversizedPayload(_) => "Frame payload exceeds the maximum",
            Error::ShortPayload(_) => "Frame payload is truncated",
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
