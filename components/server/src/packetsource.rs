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

//! Packet capture sources. A source owns one descriptor, produces
//! packets into the chain when polled, and is multiplexed through the
//! source tracker's loop registration.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use time::Timespec;

use error::{Error, Result};
use messagebus::MessageFlags;
use packetchain::{Packet, PacketchainKey};
use registry::GlobalRegistry;

/// Upper bound on a single captured frame; pcap files announcing more
/// are corrupt.
pub const SNAPLEN_MAX: usize = 65535;

pub trait PacketSource {
    fn name(&self) -> String;
    fn source_type(&self) -> &'static str;
    fn interface(&self) -> String;
    /// Begin capture. Must leave the descriptor nonblocking.
    fn open(&self, registry: &GlobalRegistry) -> Result<()>;
    fn close(&self);
    fn running(&self) -> bool;
    /// The descriptor to select on, or -1 when none applies.
    fn descriptor(&self) -> RawFd;
    /// Do a bounded amount of capture work. Negative means the source
    /// failed and should be shut down.
    fn poll(&self, registry: &GlobalRegistry) -> i32;
}

/// A parsed `ncsource=` definition: `interface[:opt=val,...]` with
/// `type` and `name` the options the core understands.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceDefinition {
    pub interface: String,
    pub source_type: Option<String>,
    pub name: Option<String>,
    pub options: HashMap<String, String>,
}

impl FromStr for SourceDefinition {
    type Err = Error;

    fn from_str(s: &str) -> Result<SourceDefinition> {
        let mut parts = s.splitn(2, ':');
        let interface = parts.next().unwrap_or("").trim().to_string();
        if interface.is_empty() {
            return Err(Error::SourceConfig(s.to_string()));
        }
        let mut options = HashMap::new();
        if let Some(optstr) = parts.next() {
            for opt in optstr.split(',') {
                let mut kv = opt.splitn(2, '=');
                let key = kv.next().unwrap_or("").trim();
                let value = match kv.next() {
                    Some(v) => v.trim(),
                    None => return Err(Error::SourceConfig(s.to_string())),
                };
                if key.is_empty() || value.is_empty() {
                    return Err(Error::SourceConfig(s.to_string()));
                }
                options.insert(key.to_lowercase(), value.to_string());
            }
        }
        Ok(SourceDefinition {
            interface: interface,
            source_type: options.get("type").cloned(),
            name: options.get("name").cloned(),
            options: options,
        })
    }
}

/// Replays a pcap capture file through the packet chain. A regular
/// file is always ready, so each poll pass reads a bounded burst of
/// records; offline replay is paced by the loop, not the disk.
#[cfg(feature = "use-packetsource-pcapfile")]
pub struct PcapfileSource {
    def: SourceDefinition,
    path: PathBuf,
    file: RefCell<Option<File>>,
    swapped: Cell<bool>,
    dlt: Cell<u32>,
    finished: Cell<bool>,
    packets: Cell<u64>,
}

#[cfg(feature = "use-packetsource-pcapfile")]
const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
#[cfg(feature = "use-packetsource-pcapfile")]
const PCAP_MAGIC_SWAPPED: u32 = 0xd4c3_b2a1;
#[cfg(feature = "use-packetsource-pcapfile")]
const PCAP_GLOBAL_HEADER_LEN: usize = 24;
#[cfg(feature = "use-packetsource-pcapfile")]
const PCAP_RECORD_HEADER_LEN: usize = 16;
#[cfg(feature = "use-packetsource-pcapfile")]
const RECORDS_PER_POLL: usize = 32;

#[cfg(feature = "use-packetsource-pcapfile")]
impl PcapfileSource {
    pub const SOURCE_TYPE: &'static str = "pcapfile";

    pub fn new(def: SourceDefinition) -> Rc<PcapfileSource> {
        let path = PathBuf::from(&def.interface);
        Rc::new(PcapfileSource {
            def: def,
            path: path,
            file: RefCell::new(None),
            swapped: Cell::new(false),
            dlt: Cell::new(0),
            finished: Cell::new(false),
            packets: Cell::new(0),
        })
    }

    fn read_u32(&self, buf: &[u8]) -> u32 {
        if self.swapped.get() {
            BigEndian::read_u32(buf)
        } else {
            LittleEndian::read_u32(buf)
        }
    }

    fn read_exact_or_eof(&self, buf: &mut [u8]) -> Result<bool> {
        let mut file = self.file.borrow_mut();
        let file = match *file {
            Some(ref mut f) => f,
            None => return Ok(false),
        };
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(false);
                    }
                    return Err(Error::SourceConfig(format!(
                        "{} ends mid-record",
                        self.path.display()
                    )));
                }
                Ok(n) => filled += n,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(true)
    }

    pub fn packet_count(&self) -> u64 {
        self.packets.get()
    }
}

#[cfg(feature = "use-packetsource-pcapfile")]
impl PacketSource for PcapfileSource {
    fn name(&self) -> String {
        self.def
            .name
            .clone()
            .unwrap_or_else(|| format!("pcapfile-{}", self.path.display()))
    }

    fn source_type(&self) -> &'static str {
        Self::SOURCE_TYPE
    }

    fn interface(&self) -> String {
        self.def.interface.clone()
    }

    fn open(&self, _registry: &GlobalRegistry) -> Result<()> {
        let mut file = File::open(&self.path)
            .map_err(|e| Error::ConfigFileIO(self.path.clone(), e))?;
        let mut header = [0u8; PCAP_GLOBAL_HEADER_LEN];
        file.read_exact(&mut header)
            .map_err(|e| Error::ConfigFileIO(self.path.clone(), e))?;
        let magic = LittleEndian::read_u32(&header[0..4]);
        match magic {
            PCAP_MAGIC => self.swapped.set(false),
            PCAP_MAGIC_SWAPPED => self.swapped.set(true),
            other => return Err(Error::PcapMagic(self.path.clone(), other)),
        }
        *self.file.borrow_mut() = Some(file);
        self.dlt.set(self.read_u32(&[
            // network field, last 4 bytes of the global header
            header[20], header[21], header[22], header[23],
        ]));
        Ok(())
    }

    fn close(&self) {
        self.file.borrow_mut().take();
        self.finished.set(true);
    }

    fn running(&self) -> bool {
        self.file.borrow().is_some() && !self.finished.get()
    }

    fn descriptor(&self) -> RawFd {
        self.file
            .borrow()
            .as_ref()
            .map(|f| f.as_raw_fd())
            .unwrap_or(-1)
    }

    fn poll(&self, registry: &GlobalRegistry) -> i32 {
        if !self.running() {
            return 0;
        }
        let chain = match registry.fetch::<PacketchainKey>() {
            Some(chain) => chain,
            None => return 0,
        };

        for _ in 0..RECORDS_PER_POLL {
            let mut rec_header = [0u8; PCAP_RECORD_HEADER_LEN];
            match self.read_exact_or_eof(&mut rec_header) {
                Ok(true) => {}
                Ok(false) => {
                    registry.message(
                        MessageFlags::INFO,
                        &format!("Pcap file source {} finished replay", self.name()),
                    );
                    self.close();
                    return 0;
                }
                Err(e) => {
                    registry.message(
                        MessageFlags::ERROR,
                        &format!("Pcap source {} failed: {}", self.name(), e),
                    );
                    self.close();
                    return -1;
                }
            }
            let ts_sec = self.read_u32(&rec_header[0..4]) as i64;
            let ts_usec = self.read_u32(&rec_header[4..8]) as i32;
            let incl_len = self.read_u32(&rec_header[8..12]) as usize;
            if incl_len > SNAPLEN_MAX {
                registry.message(
                    MessageFlags::ERROR,
                    &format!(
                        "Pcap source {} has a corrupt record ({} bytes)",
                        self.name(),
                        incl_len
                    ),
                );
                self.close();
                return -1;
            }
            let mut data = vec![0u8; incl_len];
            match self.read_exact_or_eof(&mut data) {
                Ok(true) => {}
                _ => {
                    self.close();
                    return -1;
                }
            }
            let mut packet = Packet::new(
                Timespec::new(ts_sec, ts_usec * 1000),
                self.dlt.get(),
                &self.name(),
                data,
            );
            chain.process_packet(registry, &mut packet);
            self.packets.set(self.packets.get() + 1);
        }
        0
    }
}
