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

//! The 802.11 base PHY: classifies bare 802.11 frames into the common
//! packet info the device tracker consumes.

use std::cell::Cell;
use std::rc::Rc;

use byteorder::{ByteOrder, LittleEndian};

use devicetracker::Devicetracker;
use packetchain::{CommonInfo, Packet, Packetchain, CHAINPOS_CLASSIFIER, DLT_IEEE802_11};
use registry::GlobalRegistry;

pub const PHY_NAME: &'static str = "IEEE802.11";

const FRAME_TYPE_MGMT: u8 = 0;
const FRAME_SUBTYPE_BEACON: u8 = 8;

/// Fixed management parameters: timestamp (8), interval (2),
/// capabilities (2).
const MGMT_FIXED_LEN: usize = 12;
const MGMT_HEADER_LEN: usize = 24;

const IETAG_DS_CHANNEL: u8 = 3;

pub fn format_mac(bytes: &[u8]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    )
}

pub struct Phy80211 {
    phy_id: Cell<i32>,
    classified: Cell<u64>,
    beacons: Cell<u64>,
}

impl Phy80211 {
    /// Build the PHY, register it with the device tracker, and hook
    /// the classifier phase. Returns negative when the tracker refuses
    /// the registration.
    pub fn register(
        chain: &Packetchain,
        devicetracker: &Devicetracker,
    ) -> (Rc<Phy80211>, i32) {
        let phy = Rc::new(Phy80211 {
            phy_id: Cell::new(-1),
            classified: Cell::new(0),
            beacons: Cell::new(0),
        });
        let phy_id = devicetracker.register_phy_handler(PHY_NAME);
        phy.phy_id.set(phy_id);

        let hook = phy.clone();
        chain.register_handler(
            CHAINPOS_CLASSIFIER,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| hook.classify(pkt)),
        );

        (phy, phy_id)
    }

    fn classify(&self, packet: &mut Packet) -> i32 {
        if packet.dlt != DLT_IEEE802_11 {
            return 0;
        }
        let frame = packet.payload().to_vec();
        if frame.len() < MGMT_HEADER_LEN {
            return 0;
        }

        let fc0 = frame[0];
        let frame_type = (fc0 >> 2) & 0x03;
        let subtype = (fc0 >> 4) & 0x0F;

        let mut common = CommonInfo::new(PHY_NAME);
        common.dest_mac = format_mac(&frame[4..10]);
        common.source_mac = format_mac(&frame[10..16]);
        common.bssid = format_mac(&frame[16..22]);

        if frame_type == FRAME_TYPE_MGMT && subtype == FRAME_SUBTYPE_BEACON {
            self.beacons.set(self.beacons.get() + 1);
            let body = &frame[MGMT_HEADER_LEN..];
            if body.len() >= MGMT_FIXED_LEN {
                common.bss_timestamp = LittleEndian::read_u64(&body[0..8]);
                common.channel = ds_channel(&body[MGMT_FIXED_LEN..]).unwrap_or(0);
            }
        }

        packet.common = Some(common);
        self.classified.set(self.classified.get() + 1);
        0
    }

    pub fn phy_id(&self) -> i32 {
        self.phy_id.get()
    }

    pub fn classified(&self) -> u64 {
        self.classified.get()
    }

    pub fn beacons(&self) -> u64 {
        self.beacons.get()
    }
}

/// Walk the tagged information elements of a beacon body for the DS
/// parameter set channel.
fn ds_channel(mut ies: &[u8]) -> Option<u32> {
    while ies.len() >= 2 {
        let tag = ies[0];
        let len = ies[1] as usize;
        if ies.len() < 2 + len {
            return None;
        }
        if tag == IETAG_DS_CHANNEL && len >= 1 {
            return Some(ies[2] as u32);
        }
        ies = &ies[2 + len..];
    }
    None
}

#[cfg(test)]
mod test {
    use time::Timespec;

    use super::*;
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

    /// A minimal beacon: mgmt header, fixed params with timestamp 99,
    /// one DS tag carrying channel 6.
    pub fn beacon_frame() -> Vec<u8> {
        let mut frame = vec![0u8; MGMT_HEADER_LEN];
        frame[0] = 0x80; // mgmt / beacon
        frame[4..10].copy_from_slice(&[0xFF; 6]);
        frame[10..16].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame[16..22].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let mut fixed = vec![0u8; MGMT_FIXED_LEN];
        fixed[0] = 99; // timestamp, little endian
        frame.extend_from_slice(&fixed);
        frame.extend_from_slice(&[IETAG_DS_CHANNEL, 1, 6]);
        frame
    }

    #[test]
    fn beacon_yields_common_info() {
        let reg = registry();
        let chain = Packetchain::new();
        let tracker = Devicetracker::new();
        let (phy, phy_id) = Phy80211::register(&chain, &tracker);
        assert!(phy_id >= 0);

        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", beacon_frame());
        chain.process_packet(&reg, &mut pkt);

        let common = pkt.common.expect("classifier should attach common info");
        assert_eq!(common.source_mac, "00:11:22:33:44:55");
        assert_eq!(common.bssid, "00:11:22:33:44:55");
        assert_eq!(common.channel, 6);
        assert_eq!(common.bss_timestamp, 99);
        assert_eq!(phy.beacons(), 1);
    }

    #[test]
    fn short_frames_are_ignored() {
        let reg = registry();
        let chain = Packetchain::new();
        let tracker = Devicetracker::new();
        let (phy, _) = Phy80211::register(&chain, &tracker);

        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", vec![0x80; 10]);
        chain.process_packet(&reg, &mut pkt);
        assert!(pkt.common.is_none());
        assert_eq!(phy.classified(), 0);
    }
}
