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

//! Process health snapshot served over the REST interface.

use std::fs;
use std::rc::Rc;

use serde_json;
use time;

use kismet_core::os::process;
use kismet_core::os::users;

use devicetracker::DevicetrackerKey;
use httpd::{HttpdHandler, HttpdResponse};
use packetchain::PacketchainKey;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

#[derive(Debug, Serialize)]
struct SystemStatus {
    pid: i32,
    uid: u32,
    version: String,
    servername: String,
    start_time_sec: i64,
    devices: usize,
    packets: u64,
    memory_rss_kb: u64,
}

pub struct Systemmonitor {
    start_time_sec: i64,
}

pub struct SystemmonitorKey;

impl ComponentKey for SystemmonitorKey {
    type Component = Systemmonitor;
    const KEY: &'static str = "SYSTEM_MONITOR";
}

impl Systemmonitor {
    pub fn new() -> Rc<Systemmonitor> {
        Rc::new(Systemmonitor {
            start_time_sec: time::get_time().sec,
        })
    }

    fn snapshot(&self, registry: &GlobalRegistry) -> SystemStatus {
        let devices = registry
            .fetch::<DevicetrackerKey>()
            .map(|d| d.device_count())
            .unwrap_or(0);
        let packets = registry
            .fetch::<PacketchainKey>()
            .map(|c| c.packet_count())
            .unwrap_or(0);
        SystemStatus {
            pid: process::current_pid(),
            uid: users::get_current_uid(),
            version: format!("{}", registry.version),
            servername: registry.servername(),
            start_time_sec: self.start_time_sec,
            devices: devices,
            packets: packets,
            memory_rss_kb: rss_kb().unwrap_or(0),
        }
    }
}

/// Resident set size from /proc, in kilobytes. Zero when the proc
/// filesystem is not available.
fn rss_kb() -> Option<u64> {
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    let rss_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_kb = unsafe { ::libc::sysconf(::libc::_SC_PAGESIZE) } as u64 / 1024;
    Some(rss_pages * page_kb)
}

impl HttpdHandler for Systemmonitor {
    fn httpd_verify_path(&self, path: &str, method: &str) -> bool {
        method == "GET" && path == "/system/status.json"
    }

    fn httpd_handle_request(
        &self,
        registry: &GlobalRegistry,
        _path: &str,
        _method: &str,
    ) -> HttpdResponse {
        match serde_json::to_vec(&self.snapshot(registry)) {
            Ok(body) => HttpdResponse::json(body),
            Err(_) => HttpdResponse::not_found(),
        }
    }
}

impl LifetimeGlobal for Systemmonitor {
    fn name(&self) -> &'static str {
        "systemmonitor"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use registry::{GlobalRegistry, Version};

    #[test]
    fn snapshot_reports_identity_and_counts() {
        let reg = GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec![],
        );
        reg.set_servername("TestServer");
        let monitor = Systemmonitor::new();
        let status = monitor.snapshot(&reg);
        assert_eq!(status.servername, "TestServer");
        assert_eq!(status.version, "2016-07-R1");
        assert_eq!(status.devices, 0);
        assert!(status.pid > 0);
    }
}
