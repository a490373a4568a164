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

//! Network summary log in XML: each flush rewrites the file from the
//! device tracker's current state.

use std::cell::Cell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use devicetracker::DevicetrackerKey;
use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use registry::GlobalRegistry;

pub struct DumpfileNetxml {
    path: PathBuf,
    last_count: Cell<usize>,
}

impl DumpfileNetxml {
    pub fn new(path: PathBuf) -> Rc<DumpfileNetxml> {
        Rc::new(DumpfileNetxml {
            path: path,
            last_count: Cell::new(0),
        })
    }
}

impl Dumpfile for DumpfileNetxml {
    fn name(&self) -> &'static str {
        "netxml"
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn flush(&self, registry: &GlobalRegistry) -> Result<bool> {
        let devicetracker = match registry.fetch::<DevicetrackerKey>() {
            Some(d) => d,
            None => return Ok(false),
        };
        let summaries = devicetracker.device_summaries();
        if summaries.is_empty() && self.last_count.get() == 0 {
            return Ok(false);
        }
        let mut file = dumpfile::recreate_log_file(&self.path)?;
        let io_err = |e| Error::DumpfileIO(self.path.clone(), e);
        writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>").map_err(&io_err)?;
        writeln!(
            file,
            "<detection-run server=\"{}\" version=\"{}\">",
            registry.servername(),
            registry.version
        ).map_err(&io_err)?;
        for device in &summaries {
            writeln!(
                file,
                "  <wireless-network mac=\"{}\" phy=\"{}\" channel=\"{}\" \
                 first-time=\"{}\" last-time=\"{}\" packets=\"{}\"/>",
                device.mac,
                device.phy,
                device.channel,
                device.first_time,
                device.last_time,
                device.packets
            ).map_err(&io_err)?;
        }
        writeln!(file, "</detection-run>").map_err(&io_err)?;
        self.last_count.set(summaries.len());
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempdir::TempDir;
    use time::Timespec;

    use super::*;
    use devicetracker::{Devicetracker, DevicetrackerKey};
    use packetchain::{CommonInfo, Packet, Packetchain, DLT_IEEE802_11};
    use registry::{GlobalRegistry, Version};

    #[test]
    fn flush_writes_tracked_devices() {
        let dir = TempDir::new("netxml").unwrap();
        let path = dir.path().join("Kismet.netxml");
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
        let chain = Packetchain::new();
        let tracker = Devicetracker::new();
        Devicetracker::hook_chain(&tracker, &chain);
        reg.insert::<DevicetrackerKey>(tracker).unwrap();

        let dump = DumpfileNetxml::new(path.clone());
        assert!(!dump.flush(&reg).unwrap());

        let mut pkt = Packet::new(Timespec::new(5, 0), DLT_IEEE802_11, "t", vec![0; 24]);
        let mut common = CommonInfo::new("IEEE802.11");
        common.source_mac = "00:11:22:33:44:55".to_string();
        pkt.common = Some(common);
        chain.process_packet(&reg, &mut pkt);

        assert!(dump.flush(&reg).unwrap());
        let xml = fs::read_to_string(&path).unwrap();
        assert!(xml.contains("00:11:22:33:44:55"));
        assert!(xml.contains("</detection-run>"));
    }
}
