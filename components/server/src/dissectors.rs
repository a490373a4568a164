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

//! IP-over-802.11 data dissection: spots LLC/SNAP encapsulated IPv4
//! and ARP inside data frames and keeps the counters the trackers and
//! logs read.

use std::cell::Cell;
use std::rc::Rc;

use packetchain::{Packet, Packetchain, CHAINPOS_DATADISSECT, DLT_IEEE802_11};
use registry::GlobalRegistry;

const LLC_SNAP: [u8; 6] = [0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00];
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];
const ETHERTYPE_ARP: [u8; 2] = [0x08, 0x06];

const DATA_HEADER_LEN: usize = 24;
const FRAME_TYPE_DATA: u8 = 2;

pub struct IpdataDissector {
    ipv4: Cell<u64>,
    arp: Cell<u64>,
}

impl IpdataDissector {
    pub fn register(chain: &Packetchain) -> Rc<IpdataDissector> {
        let dissector = Rc::new(IpdataDissector {
            ipv4: Cell::new(0),
            arp: Cell::new(0),
        });
        let hook = dissector.clone();
        chain.register_handler(
            CHAINPOS_DATADISSECT,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.dissect(pkt);
                0
            }),
        );
        dissector
    }

    fn dissect(&self, packet: &Packet) {
        if packet.dlt != DLT_IEEE802_11 {
            return;
        }
        let frame = packet.payload();
        if frame.len() < DATA_HEADER_LEN + 8 {
            return;
        }
        if (frame[0] >> 2) & 0x03 != FRAME_TYPE_DATA {
            return;
        }
        let llc = &frame[DATA_HEADER_LEN..];
        if llc[..6] != LLC_SNAP {
            return;
        }
        if llc[6..8] == ETHERTYPE_IPV4 {
            self.ipv4.set(self.ipv4.get() + 1);
        } else if llc[6..8] == ETHERTYPE_ARP {
            self.arp.set(self.arp.get() + 1);
        }
    }

    pub fn ipv4_count(&self) -> u64 {
        self.ipv4.get()
    }

    pub fn arp_count(&self) -> u64 {
        self.arp.get()
    }
}

#[cfg(test)]
mod test {
    use time::Timespec;

    use super::*;
    use registry::{GlobalRegistry, Version};

    fn data_frame(ethertype: &[u8; 2]) -> Vec<u8> {
        let mut frame = vec![0u8; DATA_HEADER_LEN];
        frame[0] = 0x08; // data frame
        frame.extend_from_slice(&LLC_SNAP);
        frame.extend_from_slice(ethertype);
        frame.extend_from_slice(&[0; 20]);
        frame
    }

    #[test]
    fn counts_ipv4_and_arp_separately() {
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
        let dissector = IpdataDissector::register(&chain);

        let mut pkt = Packet::new(
            Timespec::new(0, 0),
            DLT_IEEE802_11,
            "t",
            data_frame(&ETHERTYPE_IPV4),
        );
        chain.process_packet(&reg, &mut pkt);
        let mut pkt = Packet::new(
            Timespec::new(0, 0),
            DLT_IEEE802_11,
            "t",
            data_frame(&ETHERTYPE_ARP),
        );
        chain.process_packet(&reg, &mut pkt);

        assert_eq!(dissector.ipv4_count(), 1);
        assert_eq!(dissector.arp_count(), 1);
    }

    #[test]
    fn management_frames_are_not_data() {
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
        let dissector = IpdataDissector::register(&chain);

        let mut frame = data_frame(&ETHERTYPE_IPV4);
        frame[0] = 0x80; // beacon
        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", frame);
        chain.process_packet(&reg, &mut pkt);
        assert_eq!(dissector.ipv4_count(), 0);
    }
}
