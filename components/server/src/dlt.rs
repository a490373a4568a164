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

//! Link-type decoders. Each strips its capture header off the front of
//! the frame, leaving bare 802.11 at the payload offset for the
//! classifiers downstream.

use std::cell::Cell;
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};

use packetchain::{
    Packet, Packetchain, CHAINPOS_POSTCAP, DLT_IEEE802_11, DLT_IEEE802_11_RADIO,
    DLT_PPI, DLT_PRISM_HEADER,
};
use registry::GlobalRegistry;

/// The AVS/prism2 capture header is a fixed-size preamble.
const PRISM2_HEADER_LEN: usize = 144;

/// CACE PPI: u8 version, u8 flags, u16le length, u32le dlt.
pub struct PpiDlt {
    decapped: Cell<u64>,
}

impl PpiDlt {
    pub fn register(chain: &Packetchain) -> Rc<PpiDlt> {
        let dlt = Rc::new(PpiDlt {
            decapped: Cell::new(0),
        });
        let hook = dlt.clone();
        chain.register_handler(
            CHAINPOS_POSTCAP,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| hook.decap(pkt)),
        );
        dlt
    }

    fn decap(&self, packet: &mut Packet) -> i32 {
        if packet.dlt != DLT_PPI {
            return 0;
        }
        if packet.data.len() < 8 {
            return -1;
        }
        let header_len = LittleEndian::read_u16(&packet.data[2..4]) as usize;
        if header_len < 8 || header_len > packet.data.len() {
            return -1;
        }
        packet.payload_offset = header_len;
        packet.dlt = DLT_IEEE802_11;
        self.decapped.set(self.decapped.get() + 1);
        0
    }

    pub fn decapped(&self) -> u64 {
        self.decapped.get()
    }
}

/// Radiotap: u8 version, u8 pad, u16le length, then the field bitmap.
pub struct RadiotapDlt {
    decapped: Cell<u64>,
}

impl RadiotapDlt {
    pub fn register(chain: &Packetchain) -> Rc<RadiotapDlt> {
        let dlt = Rc::new(RadiotapDlt {
            decapped: Cell::new(0),
        });
        let hook = dlt.clone();
        chain.register_handler(
            CHAINPOS_POSTCAP,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| hook.decap(pkt)),
        );
        dlt
    }

    fn decap(&self, packet: &mut Packet) -> i32 {
        if packet.dlt != DLT_IEEE802_11_RADIO {
            return 0;
        }
        if packet.data.len() < 8 || packet.data[0] != 0 {
            return -1;
        }
        let header_len = LittleEndian::read_u16(&packet.data[2..4]) as usize;
        if header_len < 8 || header_len > packet.data.len() {
            return -1;
        }
        packet.payload_offset = header_len;
        packet.dlt = DLT_IEEE802_11;
        self.decapped.set(self.decapped.get() + 1);
        0
    }

    pub fn decapped(&self) -> u64 {
        self.decapped.get()
    }
}

pub struct Prism2Dlt {
    decapped: Cell<u64>,
}

impl Prism2Dlt {
    pub fn register(chain: &Packetchain) -> Rc<Prism2Dlt> {
        let dlt = Rc::new(Prism2Dlt {
            decapped: Cell::new(0),
        });
        let hook = dlt.clone();
        chain.register_handler(
            CHAINPOS_POSTCAP,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| hook.decap(pkt)),
        );
        dlt
    }

    fn decap(&self, packet: &mut Packet) -> i32 {
        if packet.dlt != DLT_PRISM_HEADER {
            return 0;
        }
        if packet.data.len() < PRISM2_HEADER_LEN {
            return -1;
        }
        packet.payload_offset = PRISM2_HEADER_LEN;
        packet.dlt = DLT_IEEE802_11;
        self.decapped.set(self.decapped.get() + 1);
        0
    }

    pub fn decapped(&self) -> u64 {
        self.decapped.get()
    }
}

#[cfg(test)]
mod test {
    use time::Timespec;

    use super::*;
    use packetchain::DLT_PPI;
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
    fn ppi_strips_its_header() {
        let reg = registry();
        let chain = Packetchain::new();
        let ppi = PpiDlt::register(&chain);

        // 12-byte PPI header then two payload bytes.
        let mut data = vec![0u8, 0, 12, 0, 105, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(&[0xAA, 0xBB]);
        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_PPI, "t", data);
        chain.process_packet(&reg, &mut pkt);

        assert_eq!(pkt.dlt, DLT_IEEE802_11);
        assert_eq!(pkt.payload(), &[0xAA, 0xBB]);
        assert_eq!(ppi.decapped(), 1);
    }

    #[test]
    fn truncated_radiotap_is_an_error() {
        let reg = registry();
        let chain = Packetchain::new();
        RadiotapDlt::register(&chain);

        // Claims a 64-byte header but carries 10 bytes total.
        let data = vec![0u8, 0, 64, 0, 0, 0, 0, 0, 0, 0];
        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11_RADIO, "t", data);
        chain.process_packet(&reg, &mut pkt);
        assert!(pkt.error);
    }

    #[test]
    fn foreign_linktypes_pass_untouched() {
        let reg = registry();
        let chain = Packetchain::new();
        PpiDlt::register(&chain);
        RadiotapDlt::register(&chain);
        Prism2Dlt::register(&chain);

        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", vec![0; 32]);
        chain.process_packet(&reg, &mut pkt);
        assert!(!pkt.error);
        assert_eq!(pkt.payload_offset, 0);
    }
}
