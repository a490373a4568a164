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

//! Alert log: subscribes to the ALERT severity on the message bus and
//! appends each line with a timestamp on flush.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use time;

use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use messagebus::{MessageClient, MessageFlags};
use registry::GlobalRegistry;

pub struct DumpfileAlert {
    path: PathBuf,
    buffer: RefCell<Vec<(i64, String)>>,
}

impl DumpfileAlert {
    pub fn new(path: PathBuf) -> Rc<DumpfileAlert> {
        Rc::new(DumpfileAlert {
            path: path,
            buffer: RefCell::new(Vec::new()),
        })
    }

    pub fn pending(&self) -> usize {
        self.buffer.borrow().len()
    }
}

impl MessageClient for DumpfileAlert {
    fn process_message(&self, msg: &str, flags: MessageFlags) {
        if !flags.contains(MessageFlags::ALERT) {
            return;
        }
        self.buffer
            .borrow_mut()
            .push((time::get_time().sec, msg.to_string()));
    }
}

impl Dumpfile for DumpfileAlert {
    fn name(&self) -> &'static str {
        "alert"
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn flush(&self, _registry: &GlobalRegistry) -> Result<bool> {
        let alerts = self.buffer.replace(Vec::new());
        if alerts.is_empty() {
            return Ok(false);
        }
        let mut file = dumpfile::open_log_file(&self.path)?;
        for &(ts, ref msg) in &alerts {
            writeln!(file, "{} {}", ts, msg)
                .map_err(|e| Error::DumpfileIO(self.path.clone(), e))?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempdir::TempDir;

    use super::*;
    use registry::{GlobalRegistry, Version};

    #[test]
    fn only_alerts_are_retained_and_flushed() {
        let dir = TempDir::new("alert").unwrap();
        let path = dir.path().join("Kismet.alert");
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
        let dump = DumpfileAlert::new(path.clone());
        dump.process_message("suspicious beacon", MessageFlags::ALERT);
        dump.process_message("ordinary status", MessageFlags::INFO);
        assert_eq!(dump.pending(), 1);

        assert!(dump.flush(&reg).unwrap());
        assert!(!dump.flush(&reg).unwrap());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("suspicious beacon"));
        assert!(!text.contains("ordinary status"));
    }
}
