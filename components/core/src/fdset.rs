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

//! A safe wrapper around `fd_set` and `select(2)`. The whole server
//! multiplexes on one select call, so this is the only place raw
//! descriptor sets are touched.

use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

use libc;

pub struct FdSet {
    raw: libc::fd_set,
}

impl FdSet {
    pub fn new() -> FdSet {
        let mut raw = unsafe { mem::zeroed() };
        unsafe { libc::FD_ZERO(&mut raw) };
        FdSet { raw: raw }
    }

    pub fn zero(&mut self) {
        unsafe { libc::FD_ZERO(&mut self.raw) };
    }

    /// Register interest in `fd`. Descriptors at or beyond FD_SETSIZE
    /// cannot be selected on and are ignored.
    pub fn set(&mut self, fd: RawFd) {
        if fd < 0 || fd >= libc::FD_SETSIZE as RawFd {
            warn!("Ignoring out-of-range descriptor {} in fd set", fd);
            return;
        }
        unsafe { libc::FD_SET(fd, &mut self.raw) };
    }

    pub fn is_set(&self, fd: RawFd) -> bool {
        if fd < 0 || fd >= libc::FD_SETSIZE as RawFd {
            return false;
        }
        unsafe { libc::FD_ISSET(fd, &self.raw) }
    }
}

impl Default for FdSet {
    fn default() -> FdSet {
        FdSet::new()
    }
}

/// `select(2)` over the given read and write sets. `max_fd` is the
/// highest descriptor present in either set. Returns the number of
/// ready descriptors; EINTR surfaces as `ErrorKind::Interrupted` and
/// EAGAIN as `ErrorKind::WouldBlock` so the event loop can tell the
/// benign failures from the fatal ones.
pub fn select(
    max_fd: RawFd,
    rset: &mut FdSet,
    wset: &mut FdSet,
    timeout: Option<Duration>,
) -> io::Result<usize> {
    let mut tv = timeout.map(|t| libc::timeval {
        tv_sec: t.as_secs() as libc::time_t,
        tv_usec: t.subsec_micros() as libc::suseconds_t,
    });
    let tv_ptr = match tv {
        Some(ref mut tv) => tv as *mut libc::timeval,
        None => ptr::null_mut(),
    };
    let rv = unsafe {
        libc::select(
            max_fd + 1,
            &mut rset.raw,
            &mut wset.raw,
            ptr::null_mut(),
            tv_ptr,
        )
    };
    if rv < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rv as usize)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_check() {
        let mut set = FdSet::new();
        assert!(!set.is_set(0));
        set.set(0);
        assert!(set.is_set(0));
        set.zero();
        assert!(!set.is_set(0));
    }

    #[test]
    fn out_of_range_descriptors_are_ignored() {
        let mut set = FdSet::new();
        set.set(-1);
        set.set(libc::FD_SETSIZE as i32 + 10);
        assert!(!set.is_set(-1));
        assert!(!set.is_set(libc::FD_SETSIZE as i32 + 10));
    }

    #[test]
    fn select_times_out_with_no_descriptors() {
        let mut rset = FdSet::new();
        let mut wset = FdSet::new();
        let ready = select(0, &mut rset, &mut wset, Some(Duration::from_millis(1))).unwrap();
        assert_eq!(ready, 0);
    }
}
