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

//! On-disk log writers. Each registers with the registry's dumpfile
//! list; the core flushes them on the configured write interval and
//! destroys them (flush and close) during teardown.

pub mod alert;
pub mod gpsxml;
pub mod netxml;
pub mod nettxt;
pub mod pcap;
pub mod strings;
pub mod tuntap;

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use error::{Error, Result};
use messagebus::MessageFlags;
use registry::GlobalRegistry;
use timetracker::{TimetrackerKey, SERVER_TIMESLICES_SEC};

/// The contract the core holds every log writer to: flush on demand,
/// close exactly once at teardown.
pub trait Dumpfile {
    fn name(&self) -> &'static str;
    fn path(&self) -> PathBuf;
    /// Write buffered data out. Returns true when anything was
    /// written.
    fn flush(&self, registry: &GlobalRegistry) -> Result<bool>;
    /// Final flush and release. Called once, from teardown.
    fn close(&self, registry: &GlobalRegistry) -> Result<()> {
        self.flush(registry)?;
        Ok(())
    }
}

/// Flush every registered dumpfile; posts the usual status line when
/// any of them had data. This is the write-interval timer body.
pub fn flush_dumpfiles(registry: &GlobalRegistry) -> i32 {
    let dumpfiles = registry.snapshot_dumpfiles();
    if dumpfiles.is_empty() {
        return 1;
    }
    let mut wrote = false;
    for dumpfile in dumpfiles {
        match dumpfile.flush(registry) {
            Ok(true) => wrote = true,
            Ok(false) => {}
            Err(e) => registry.message(
                MessageFlags::ERROR,
                &format!("Unable to flush {}: {}", dumpfile.name(), e),
            ),
        }
    }
    if wrote {
        registry.message(MessageFlags::INFO, "Saved data files");
    }
    1
}

/// Install the periodic flush timer when the config asks for one.
/// Returns false when the interval is present but unusable.
pub fn install_flush_timer(registry: &GlobalRegistry, interval_secs: u32) -> bool {
    let timetracker = match registry.fetch::<TimetrackerKey>() {
        Some(t) => t,
        None => return false,
    };
    timetracker
        .register_timer(
            SERVER_TIMESLICES_SEC * interval_secs as i64,
            true,
            Box::new(|reg, _id| flush_dumpfiles(reg)),
        ).is_ok()
}

/// Open a log file for appending, creating parent directories as
/// needed.
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::DumpfileIO(path.to_path_buf(), e))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::DumpfileIO(path.to_path_buf(), e))
}

/// Rewrite a snapshot-style log file from scratch.
pub fn recreate_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::DumpfileIO(path.to_path_buf(), e))?;
        }
    }
    File::create(path).map_err(|e| Error::DumpfileIO(path.to_path_buf(), e))
}
