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

//! GPS track log: every flush appends the current fix as a track
//! point, so the file is a breadcrumb trail of the run.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use gps::GpsManagerKey;
use registry::GlobalRegistry;

pub struct DumpfileGpsxml {
    path: PathBuf,
    file: RefCell<Option<File>>,
    points: Cell<u64>,
}

impl DumpfileGpsxml {
    pub fn new(path: PathBuf) -> Rc<DumpfileGpsxml> {
        Rc::new(DumpfileGpsxml {
            path: path,
            file: RefCell::new(None),
            points: Cell::new(0),
        })
    }

    pub fn point_count(&self) -> u64 {
        self.points.get()
    }
}

impl Dumpfile for DumpfileGpsxml {
    fn name(&self) -> &'static str {
        "gpsxml"
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn flush(&self, registry: &GlobalRegistry) -> Result<bool> {
        let fix = registry
            .fetch::<GpsManagerKey>()
            .and_then(|gps| gps.fetch_fix());
        let fix = match fix {
            Some(fix) => fix,
            None => return Ok(false),
        };
        let io_err = |e| Error::DumpfileIO(self.path.clone(), e);
        if self.file.borrow().is_none() {
            let mut file = dumpfile::recreate_log_file(&self.path)?;
            writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>").map_err(&io_err)?;
            writeln!(file, "<gps-run server=\"{}\">", registry.servername())
                .map_err(&io_err)?;
            *self.file.borrow_mut() = Some(file);
        }
        let mut file = self.file.borrow_mut();
        let file = file.as_mut().unwrap();
        writeln!(
            file,
            "  <gps-point time-sec=\"{}\" lat=\"{}\" lon=\"{}\" alt=\"{}\" fix=\"{}\"/>",
            fix.time_sec, fix.lat, fix.lon, fix.alt, fix.mode
        ).map_err(&io_err)?;
        file.flush().map_err(&io_err)?;
        self.points.set(self.points.get() + 1);
        Ok(true)
    }

    fn close(&self, registry: &GlobalRegistry) -> Result<()> {
        self.flush(registry).ok();
        let io_err = |e| Error::DumpfileIO(self.path.clone(), e);
        if let Some(ref mut file) = *self.file.borrow_mut() {
            writeln!(file, "</gps-run>").map_err(&io_err)?;
            file.flush().map_err(&io_err)?;
        }
        self.file.borrow_mut().take();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::rc::Rc;

    use tempdir::TempDir;

    use super::*;
    use gps::{GpsFix, GpsManagerKey};
    use registry::{GlobalRegistry, Version};

    #[test]
    fn no_fix_means_no_file() {
        let dir = TempDir::new("gpsxml").unwrap();
        let path = dir.path().join("Kismet.gpsxml");
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
        let dump = DumpfileGpsxml::new(path.clone());
        assert!(!dump.flush(&reg).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn fixes_append_as_track_points() {
        let dir = TempDir::new("gpsxml").unwrap();
        let path = dir.path().join("Kismet.gpsxml");
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
        // A detached manager with a canned fix.
        let gps = ::gps::GpsManager::new(
            &reg,
            &::configfile::ConfigFile::parse(&write_empty_config(&dir)).unwrap(),
        );
        set_fix(&gps);
        reg.insert::<GpsManagerKey>(gps).unwrap();

        let dump = DumpfileGpsxml::new(path.clone());
        assert!(dump.flush(&reg).unwrap());
        assert!(dump.flush(&reg).unwrap());
        dump.close(&reg).unwrap();

        let xml = fs::read_to_string(&path).unwrap();
        assert_eq!(xml.matches("<gps-point").count(), 3);
        assert!(xml.contains("</gps-run>"));
        assert_eq!(dump.point_count(), 3);
    }

    fn write_empty_config(dir: &TempDir) -> ::std::path::PathBuf {
        let path = dir.path().join("kismet.conf");
        fs::write(&path, "gps=false\n").unwrap();
        path
    }

    fn set_fix(gps: &Rc<::gps::GpsManager>) {
        gps.consume_test_fix(GpsFix {
            lat: 44.0,
            lon: -93.0,
            alt: 200.0,
            mode: 3,
            time_sec: 1000,
        });
    }
}
