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

//! Raw packet log in pcap format, fed from the logging phase of the
//! packet chain.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use byteorder::{LittleEndian, WriteBytesExt};

use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use packetchain::{Packet, Packetchain, CHAINPOS_LOGGING};
use packetsource::SNAPLEN_MAX;
use registry::{ComponentKey, GlobalRegistry};

struct BufferedRecord {
    ts_sec: u32,
    ts_usec: u32,
    data: Vec<u8>,
}

pub struct DumpfilePcap {
    path: PathBuf,
    file: RefCell<Option<File>>,
    buffer: RefCell<Vec<BufferedRecord>>,
    dlt: Cell<Option<u32>>,
    logged: Cell<u64>,
}

pub struct PcapDumpKey;

impl ComponentKey for PcapDumpKey {
    type Component = DumpfilePcap;
    const KEY: &'static str = "PCAPDUMP";
}

impl DumpfilePcap {
    pub fn new(path: PathBuf, chain: &Packetchain) -> Rc<DumpfilePcap> {
        let dump = Rc::new(DumpfilePcap {
            path: path,
            file: RefCell::new(None),
            buffer: RefCell::new(Vec::new()),
            dlt: Cell::new(None),
            logged: Cell::new(0),
        });
        let hook = dump.clone();
        chain.register_handler(
            CHAINPOS_LOGGING,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.log_packet(pkt);
                0
            }),
        );
        dump
    }

    fn log_packet(&self, packet: &Packet) {
        if packet.error || packet.data.is_empty() {
            return;
        }
        // The file's link type is fixed by the first packet; packets
        // of other types cannot share it.
        match self.dlt.get() {
            None => self.dlt.set(Some(packet.dlt)),
            Some(dlt) if dlt != packet.dlt => return,
            Some(_) => {}
        }
        self.buffer.borrow_mut().push(BufferedRecord {
            ts_sec: packet.ts.sec as u32,
            ts_usec: (packet.ts.nsec / 1000) as u32,
            data: packet.data.clone(),
        });
        self.logged.set(self.logged.get() + 1);
    }

    fn ensure_file(&self) -> Result<()> {
        if self.file.borrow().is_some() {
            return Ok(());
        }
        let mut file = dumpfile::recreate_log_file(&self.path)?;
        let mut header = Vec::with_capacity(24);
        header.write_u32::<LittleEndian>(0xa1b2_c3d4).unwrap();
        header.write_u16::<LittleEndian>(2).unwrap();
        header.write_u16::<LittleEndian>(4).unwrap();
        header.write_u32::<LittleEndian>(0).unwrap();
        header.write_u32::<LittleEndian>(0).unwrap();
        header.write_u32::<LittleEndian>(SNAPLEN_MAX as u32).unwrap();
        header
            .write_u32::<LittleEndian>(self.dlt.get().unwrap_or(1))
            .unwrap();
        file.write_all(&header)
            .map_err(|e| Error::DumpfileIO(self.path.clone(), e))?;
        *self.file.borrow_mut() = Some(file);
        Ok(())
    }

    pub fn logged_count(&self) -> u64 {
        self.logged.get()
    }
}

impl Dumpfile for DumpfilePcap {
    fn name(&self) -> &'static str {
        "pcapdump"
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn flush(&self, _registry: &GlobalRegistry) -> Result<bool> {
        let records = self.buffer.replace(Vec::new());
        if records.is_empty() {
            return Ok(false);
        }
        self.ensure_file()?;
        let mut file = self.file.borrow_mut();
        let file = file.as_mut().unwrap();
        for record in &records {
            let mut rec_header = Vec::with_capacity(16);
            rec_header.write_u32::<LittleEndian>(record.ts_sec).unwrap();
            rec_header.write_u32::<LittleEndian>(record.ts_usec).unwrap();
            rec_header
                .write_u32::<LittleEndian>(record.data.len() as u32)
                .unwrap();
            rec_header
                .write_u32::<LittleEndian>(record.data.len() as u32)
                .unwrap();
            file.write_all(&rec_header)
                .and_then(|_| file.write_all(&record.data))
                .map_err(|e| Error::DumpfileIO(self.path.clone(), e))?;
        }
        file.flush()
            .map_err(|e| Error::DumpfileIO(self.path.clone(), e))?;
        Ok(true)
    }

    fn close(&self, registry: &GlobalRegistry) -> Result<()> {
        self.flush(registry)?;
        self.file.borrow_mut().take();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempdir::TempDir;
    use time::Timespec;

    use super::*;
    use packetchain::{Packet, Packetchain, DLT_IEEE802_11};
    use registry::{GlobalRegistry, Version};

    fn registry() -> GlobalRegistry {
        GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec![],
        )
    }

    #[test]
    fn flush_writes_header_and_records() {
        let dir = TempDir::new("pcapdump").unwrap();
        let path = dir.path().join("Kismet.pcapdump");
        let reg = registry();
        let chain = Packetchain::new();
        let dump = DumpfilePcap::new(path.clone(), &chain);

        let mut pkt = Packet::new(
            Timespec::new(1000, 5000),
            DLT_IEEE802_11,
            "t",
            vec![0xAB; 48],
        );
        chain.process_packet(&reg, &mut pkt);

        assert!(dump.flush(&reg).unwrap());
        let written = fs::read(&path).unwrap();
        // Global header + record header + 48 payload bytes.
        assert_eq!(written.len(), 24 + 16 + 48);
        assert_eq!(&written[0..4], &[0xd4, 0xc3, 0xb2, 0xa1]);
        assert_eq!(dump.logged_count(), 1);

        // Nothing new buffered; a second flush writes nothing.
        assert!(!dump.flush(&reg).unwrap());
    }

    #[test]
    fn errored_packets_are_not_logged() {
        let dir = TempDir::new("pcapdump").unwrap();
        let reg = registry();
        let chain = Packetchain::new();
        let dump = DumpfilePcap::new(dir.path().join("x.pcapdump"), &chain);

        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", vec![1; 8]);
        pkt.error = true;
        dump.log_packet(&pkt);
        assert_eq!(dump.logged_count(), 0);
        assert!(!dump.flush(&reg).unwrap());
    }
}
