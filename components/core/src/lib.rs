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

//! Shared OS-level plumbing for the Kismet server, capture helper, and
//! console wrapper: process and signal management, fd-set multiplexing,
//! user lookups, and the user-facing output macros.

extern crate ansi_term;
extern crate libc;
#[macro_use]
extern crate log;
#[cfg(not(windows))]
extern crate users;

#[macro_use]
pub mod output;

pub mod env;
pub mod error;
pub mod fdset;
pub mod os;

pub use error::{Error, Result};
