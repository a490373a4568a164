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

use std::path::PathBuf;

use libc;
use users;
use users::os::unix::UserExt;

use env;

pub fn get_uid_by_name(owner: &str) -> Option<u32> {
    users::get_user_by_name(owner).map(|u| u.uid())
}

pub fn get_gid_by_name(group: &str) -> Option<u32> {
    users::get_group_by_name(group).map(|g| g.gid())
}

pub fn get_current_uid() -> u32 {
    unsafe { libc::getuid() }
}

pub fn get_current_gid() -> u32 {
    unsafe { libc::getgid() }
}

pub fn get_effective_uid() -> u32 {
    unsafe { libc::geteuid() }
}

pub fn am_i_root() -> bool {
    get_effective_uid() == 0
}

/// The invoking user's home directory: $HOME when set, else the
/// password database entry for the real uid.
pub fn home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        return Some(PathBuf::from(home));
    }
    users::get_user_by_uid(get_current_uid()).map(|u| u.home_dir().to_path_buf())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_uid_resolves() {
        assert_eq!(get_uid_by_name("root"), Some(0));
    }

    #[test]
    fn home_dir_is_present() {
        assert!(home_dir().is_some());
    }
}
