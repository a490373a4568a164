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

//! Tracks every radio and client the classifiers report, keyed by
//! MAC. The tracker joins the chain at the tracker phase and consumes
//! whatever common info a PHY attached upstream.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use packetchain::{Packet, Packetchain, CHAINPOS_TRACKER};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

#[derive(Clone, Debug, Serialize)]
pub struct DeviceSummary {
    pub mac: String,
    pub phy: &'static str,
    pub first_time: i64,
    pub last_time: i64,
    pub packets: u64,
    pub last_bssid: String,
    pub channel: u32,
}

pub struct Devicetracker {
    devices: RefCell<BTreeMap<String, DeviceSummary>>,
    phys: RefCell<Vec<&'static str>>,
}

pub struct DevicetrackerKey;

impl ComponentKey for DevicetrackerKey {
    type Component = Devicetracker;
    const KEY: &'static str = "DEVICETRACKER";
}

impl Devicetracker {
    pub fn new() -> Rc<Devicetracker> {
        Rc::new(Devicetracker {
            devices: RefCell::new(BTreeMap::new()),
            phys: RefCell::new(Vec::new()),
        })
    }

    /// Hook the packet chain; separate from `new` so tests can drive
    /// the tracker directly.
    pub fn hook_chain(tracker: &Rc<Devicetracker>, chain: &Packetchain) {
        let hook = tracker.clone();
        chain.register_handler(
            CHAINPOS_TRACKER,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| hook.track(pkt)),
        );
    }

    /// Register a PHY handler; the id indexes the PHY table. A PHY
    /// name may register only once.
    pub fn register_phy_handler(&self, name: &'static str) -> i32 {
        let mut phys = self.phys.borrow_mut();
        if phys.contains(&name) {
            return -1;
        }
        phys.push(name);
        (phys.len() - 1) as i32
    }

    fn track(&self, packet: &mut Packet) -> i32 {
        let common = match packet.common {
            Some(ref c) => c.clone(),
            None => return 0,
        };
        if common.source_mac.is_empty() {
            return 0;
        }
        let mut devices = self.devices.borrow_mut();
        let now = packet.ts.sec;
        let entry = devices
            .entry(common.source_mac.clone())
            .or_insert_with(|| DeviceSummary {
                mac: common.source_mac.clone(),
                phy: common.phy,
                first_time: now,
                last_time: now,
                packets: 0,
                last_bssid: String::new(),
                channel: 0,
            });
        entry.last_time = now;
        entry.packets += 1;
        entry.last_bssid = common.bssid.clone();
        if common.channel != 0 {
            entry.channel = common.channel;
        }
        0
    }

    pub fn device_count(&self) -> usize {
        self.devices.borrow().len()
    }

    pub fn device_summaries(&self) -> Vec<DeviceSummary> {
        self.devices.borrow().values().cloned().collect()
    }

    pub fn phy_count(&self) -> usize {
        self.phys.borrow().len()
    }

    /// Usage text contributed to the core `--help` output.
    pub fn usage() {
        println!(
            " *** Device Tracking Options ***\n\
             \x20    device_timeout=<seconds>   Forget devices not seen for <seconds>"
        );
    }
}

impl LifetimeGlobal for Devicetracker {
    fn name(&self) -> &'static str {
        "devicetracker"
    }
}

#[cfg(test)]
mod test {
    use time::Timespec;

    use super::*;
    use packetchain::{CommonInfo, Packet, Packetchain, DLT_IEEE802_11};
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

    fn classified_packet(mac: &str, ts: i64) -> Packet {
        let mut pkt = Packet::new(Timespec::new(ts, 0), DLT_IEEE802_11, "t", vec![0; 24]);
        let mut common = CommonInfo::new("IEEE802.11");
        common.source_mac = mac.to_string();
        common.bssid = mac.to_string();
        pkt.common = Some(common);
        pkt
    }

    #[test]
    fn devices_accumulate_by_mac() {
        let reg = registry();
        let chain = Packetchain::new();
        let tracker = Devicetracker::new();
        Devicetracker::hook_chain(&tracker, &chain);

        chain.process_packet(&reg, &mut classified_packet("00:11:22:33:44:55", 100));
        chain.process_packet(&reg, &mut classified_packet("00:11:22:33:44:55", 200));
        chain.process_packet(&reg, &mut classified_packet("66:77:88:99:AA:BB", 300));

        assert_eq!(tracker.device_count(), 2);
        let summaries = tracker.device_summaries();
        let first = summaries
            .iter()
            .find(|d| d.mac == "00:11:22:33:44:55")
            .unwrap();
        assert_eq!(first.first_time, 100);
        assert_eq!(first.last_time, 200);
        assert_eq!(first.packets, 2);
    }

    #[test]
    fn unclassified_packets_are_not_tracked() {
        let reg = registry();
        let chain = Packetchain::new();
        let tracker = Devicetracker::new();
        Devicetracker::hook_chain(&tracker, &chain);

        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", vec![0; 24]);
        chain.process_packet(&reg, &mut pkt);
        assert_eq!(tracker.device_count(), 0);
    }

    #[test]
    fn phy_registration_rejects_duplicates() {
        let tracker = Devicetracker::new();
        assert_eq!(tracker.register_phy_handler("IEEE802.11"), 0);
        assert_eq!(tracker.register_phy_handler("IEEE802.11"), -1);
        assert_eq!(tracker.register_phy_handler("Z-Wave"), 1);
    }
}
