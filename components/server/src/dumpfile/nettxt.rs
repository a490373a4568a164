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

//! Human-readable network summary, rewritten from the device tracker
//! on every flush.

use std::cell::Cell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use devicetracker::DevicetrackerKey;
use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use registry::GlobalRegistry;

pub struct DumpfileNettxt {
    path: PathBuf,
    last_count: Cell<usize>,
}

impl DumpfileNettxt {
    pub fn new(path: PathBuf) -> Rc<DumpfileNettxt> {
        Rc::new(DumpfileNettxt {
            path: path,
            last_count: Cell::new(0),
        })
    }
}

impl Dumpfile for DumpfileNettxt {
    fn name(&self) -> &'static str {
        "nettxt"
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
        writeln!(
            file,
            "Kismet ({}) device summary, {} devices",
            registry.version,
            summaries.len()
        ).map_err(&io_err)?;
        writeln!(file).map_err(&io_err)?;
        for (n, device) in summaries.iter().enumerate() {
            writeln!(file, "Device {}: {}", n + 1, device.mac).map_err(&io_err)?;
            writeln!(file, " Phy      : {}", device.phy).map_err(&io_err)?;
            writeln!(file, " Channel  : {}", device.channel).map_err(&io_err)?;
            writeln!(file, " Packets  : {}", device.packets).map_err(&io_err)?;
            writeln!(file, " First    : {}", device.first_time).map_err(&io_err)?;
            writeln!(file, " Last     : {}", device.last_time).map_err(&io_err)?;
            writeln!(file).map_err(&io_err)?;
        }
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
    fn summary_lists_devices() {
        let dir = TempDir::new("nettxt").unwrap();
        let path = dir.path().join("Kismet.nettxt");
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

        let mut pkt = Packet::new(Timespec::new(9, 0), DLT_IEEE802_11, "t", vec![0; 24]);
        let mut common = CommonInfo::new("IEEE802.11");
        common.source_mac = "AA:BB:CC:DD:EE:FF".to_string();
        pkt.common = Some(common);
        chain.process_packet(&reg, &mut pkt);

        let dump = DumpfileNettxt::new(path.clone());
        assert!(dump.flush(&reg).unwrap());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Device 1: AA:BB:CC:DD:EE:FF"));
        assert!(text.contains("1 devices"));
    }
}
