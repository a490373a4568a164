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

//! Per-channel activity counts, fed from the tracker phase.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use packetchain::{Packet, Packetchain, CHAINPOS_TRACKER};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct ChannelRecord {
    pub packets: u64,
    pub last_time: i64,
}

pub struct Channeltracker {
    channels: RefCell<BTreeMap<u32, ChannelRecord>>,
}

pub struct ChanneltrackerKey;

impl ComponentKey for ChanneltrackerKey {
    type Component = Channeltracker;
    const KEY: &'static str = "CHANNEL_TRACKER";
}

impl Channeltracker {
    pub fn new() -> Rc<Channeltracker> {
        Rc::new(Channeltracker {
            channels: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn hook_chain(tracker: &Rc<Channeltracker>, chain: &Packetchain) {
        let hook = tracker.clone();
        chain.register_handler(
            CHAINPOS_TRACKER,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.record(pkt);
                0
            }),
        );
    }

    fn record(&self, packet: &Packet) {
        let channel = match packet.common {
            Some(ref c) if c.channel != 0 => c.channel,
            _ => return,
        };
        let mut channels = self.channels.borrow_mut();
        let entry = channels.entry(channel).or_insert_with(ChannelRecord::default);
        entry.packets += 1;
        entry.last_time = packet.ts.sec;
    }

    pub fn channel_map(&self) -> BTreeMap<u32, ChannelRecord> {
        self.channels.borrow().clone()
    }
}

impl LifetimeGlobal for Channeltracker {
    fn name(&self) -> &'static str {
        "channeltracker"
    }
}

#[cfg(test)]
mod test {
    use time::Timespec;

    use super::*;
    use packetchain::{CommonInfo, Packet, Packetchain, DLT_IEEE802_11};
    use registry::{GlobalRegistry, Version};

    #[test]
    fn channels_count_classified_packets() {
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
        let tracker = Channeltracker::new();
        Channeltracker::hook_chain(&tracker, &chain);

        for &(channel, ts) in &[(6u32, 10i64), (6, 20), (11, 30)] {
            let mut pkt =
                Packet::new(Timespec::new(ts, 0), DLT_IEEE802_11, "t", vec![0; 24]);
            let mut common = CommonInfo::new("IEEE802.11");
            common.channel = channel;
            common.source_mac = "00:11:22:33:44:55".to_string();
            pkt.common = Some(common);
            chain.process_packet(&reg, &mut pkt);
        }

        let map = tracker.channel_map();
        assert_eq!(map[&6].packets, 2);
        assert_eq!(map[&6].last_time, 20);
        assert_eq!(map[&11].packets, 1);
        assert!(map.get(&1).is_none());
    }
}
