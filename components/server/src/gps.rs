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

//! GPS state, fed by a gpsd connection when one is configured. The
//! manager is a pollable: gpsd JSON lines arrive through the main
//! select loop like everything else.

use std::cell::{Cell, RefCell};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use serde_json;
use time;

use kismet_core::fdset::FdSet;

use configfile::ConfigFile;
use messagebus::MessageFlags;
use pollable::Pollable;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal, PollToken};

const GPSD_DEFAULT_PORT: u16 = 2947;
const WATCH_COMMAND: &'static [u8] = b"?WATCH={\"enable\":true,\"json\":true};\r\n";

#[derive(Clone, Copy, Debug, Serialize)]
pub struct GpsFix {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub mode: u8,
    pub time_sec: i64,
}

pub struct GpsManager {
    connection: RefCell<Option<TcpStream>>,
    linebuf: RefCell<String>,
    fix: Cell<Option<GpsFix>>,
    poll_token: RefCell<Option<PollToken>>,
}

pub struct GpsManagerKey;

impl ComponentKey for GpsManagerKey {
    type Component = GpsManager;
    const KEY: &'static str = "GPS_MANAGER";
}

impl GpsManager {
    pub fn new(registry: &GlobalRegistry, config: &ConfigFile) -> Rc<GpsManager> {
        let manager = Rc::new(GpsManager {
            connection: RefCell::new(None),
            linebuf: RefCell::new(String::new()),
            fix: Cell::new(None),
            poll_token: RefCell::new(None),
        });

        if !config.fetch_opt_bool("gps", false) {
            return manager;
        }

        let host = config
            .fetch_opt("gpshost")
            .unwrap_or_else(|| "localhost".to_string());
        let addr = if host.contains(':') {
            host
        } else {
            format!("{}:{}", host, GPSD_DEFAULT_PORT)
        };

        match TcpStream::connect(&addr) {
            Ok(mut stream) => {
                let _ = stream.set_read_timeout(Some(Duration::from_millis(100)));
                let _ = stream.write_all(WATCH_COMMAND);
                let _ = stream.set_nonblocking(true);
                *manager.connection.borrow_mut() = Some(stream);
                registry.message(
                    MessageFlags::INFO,
                    &format!("Using gpsd server on {}", addr),
                );
            }
            Err(e) => {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Unable to connect to gpsd on {}: {}", addr, e),
                );
            }
        }
        manager
    }

    pub fn set_poll_token(&self, token: PollToken) {
        *self.poll_token.borrow_mut() = Some(token);
    }

    pub fn fetch_fix(&self) -> Option<GpsFix> {
        self.fix.get()
    }

    #[cfg(test)]
    pub fn consume_test_fix(&self, fix: GpsFix) {
        self.fix.set(Some(fix));
    }

    fn descriptor(&self) -> RawFd {
        self.connection
            .borrow()
            .as_ref()
            .map(|s| s.as_raw_fd())
            .unwrap_or(-1)
    }

    fn consume_line(&self, line: &str) {
        let parsed: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return,
        };
        if parsed["class"].as_str() != Some("TPV") {
            return;
        }
        let mode = parsed["mode"].as_u64().unwrap_or(0) as u8;
        if mode < 2 {
            return;
        }
        self.fix.set(Some(GpsFix {
            lat: parsed["lat"].as_f64().unwrap_or(0.0),
            lon: parsed["lon"].as_f64().unwrap_or(0.0),
            alt: parsed["alt"].as_f64().unwrap_or(0.0),
            mode: mode,
            time_sec: time::get_time().sec,
        }));
    }
}

impl Pollable for GpsManager {
    fn merge_set(&self, mut max_fd: RawFd, rset: &mut FdSet, _wset: &mut FdSet) -> RawFd {
        let fd = self.descriptor();
        if fd >= 0 {
            rset.set(fd);
            if fd > max_fd {
                max_fd = fd;
            }
        }
        max_fd
    }

    fn poll(&self, registry: &GlobalRegistry, rset: &FdSet, _wset: &FdSet) -> i32 {
        let fd = self.descriptor();
        if fd < 0 || !rset.is_set(fd) {
            return 0;
        }
        let mut buf = [0u8; 2048];
        let read = {
            let mut connection = self.connection.borrow_mut();
            match *connection {
                Some(ref mut stream) => stream.read(&mut buf),
                None => return 0,
            }
        };
        match read {
            Ok(0) => {
                registry.message(MessageFlags::ERROR, "gpsd closed the connection");
                *self.connection.borrow_mut() = None;
                return -1;
            }
            Ok(n) => {
                let mut linebuf = self.linebuf.borrow_mut();
                linebuf.push_str(&String::from_utf8_lossy(&buf[..n]));
                while let Some(pos) = linebuf.find('\n') {
                    let line: String = linebuf.drain(..pos + 1).collect();
                    self.consume_line(line.trim());
                }
            }
            Err(ref e) if e.kind() == ::std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("gpsd connection error: {}", e),
                );
                *self.connection.borrow_mut() = None;
                return -1;
            }
        }
        0
    }
}

impl LifetimeGlobal for GpsManager {
    fn name(&self) -> &'static str {
        "gpsmanager"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn detached() -> GpsManager {
        GpsManager {
            connection: RefCell::new(None),
            linebuf: RefCell::new(String::new()),
            fix: Cell::new(None),
            poll_token: RefCell::new(None),
        }
    }

    #[test]
    fn tpv_with_a_fix_updates_state() {
        let gps = detached();
        gps.consume_line(
            "{\"class\":\"TPV\",\"mode\":3,\"lat\":44.5,\"lon\":-93.2,\"alt\":290.0}",
        );
        let fix = gps.fetch_fix().expect("fix should be set");
        assert_eq!(fix.mode, 3);
        assert!((fix.lat - 44.5).abs() < 1e-9);
        assert!((fix.lon + 93.2).abs() < 1e-9);
    }

    #[test]
    fn tpv_without_a_fix_is_ignored() {
        let gps = detached();
        gps.consume_line("{\"class\":\"TPV\",\"mode\":1}");
        assert!(gps.fetch_fix().is_none());
    }

    #[test]
    fn other_classes_are_ignored() {
        let gps = detached();
        gps.consume_line("{\"class\":\"SKY\",\"mode\":3,\"lat\":1.0}");
        gps.consume_line("not even json");
        assert!(gps.fetch_fix().is_none());
    }
}
