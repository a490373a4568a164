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

use std::env;
use std::ffi::OsStr;
use std::result;

/// Fetch the environment variable `key` from the current process, but
/// return `VarError::NotPresent` if the value is present and empty.
/// An exported-but-empty variable means "unset" to every consumer in
/// this codebase.
pub fn var<K: AsRef<OsStr>>(key: K) -> result::Result<String, env::VarError> {
    match env::var(key) {
        Ok(val) => {
            if val.is_empty() {
                Err(env::VarError::NotPresent)
            } else {
                Ok(val)
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod test {
    use std::env;

    #[test]
    fn empty_value_is_not_present() {
        env::set_var("KISMET_TEST_EMPTY_VAR", "");
        assert!(super::var("KISMET_TEST_EMPTY_VAR").is_err());
        env::set_var("KISMET_TEST_EMPTY_VAR", "full");
        assert_eq!(super::var("KISMET_TEST_EMPTY_VAR").unwrap(), "full");
        env::remove_var("KISMET_TEST_EMPTY_VAR");
    }
}
