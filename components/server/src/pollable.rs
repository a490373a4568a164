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

use std::os::unix::io::RawFd;

use kismet_core::fdset::FdSet;

use registry::GlobalRegistry;

/// The contract a subsystem implements to join the event loop with
/// its descriptors. Every descriptor is owned by exactly one
/// pollable.
pub trait Pollable {
    /// Advertise read/write interest into the caller's sets and return
    /// the new high-water descriptor. Must not block and must not
    /// change any descriptor state.
    fn merge_set(&self, max_fd: RawFd, rset: &mut FdSet, wset: &mut FdSet) -> RawFd;

    /// Perform non-blocking work against the ready sets and return
    /// promptly. A negative return is advisory; the loop escalates it
    /// only when the registry's fatal condition is also set. Poll
    /// handlers must not call back into the event loop or wait on
    /// another subsystem.
    fn poll(&self, registry: &GlobalRegistry, rset: &FdSet, wset: &FdSet) -> i32;
}
