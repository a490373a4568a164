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

//! Stateful alert engine: watches per-BSS beacon timestamps across
//! packets and raises when a timestamp runs backwards, which usually
//! means someone is impersonating the access point.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use alertracker::Alertracker;
use packetchain::{Packet, Packetchain, CHAINPOS_TRACKER};
use registry::GlobalRegistry;

/// Allow this much backwards slop before alerting; APs reset their
/// timestamp on reboot and rebooting is not spoofing.
const BSSTS_SLOP: u64 = 5_000_000;

pub struct BssTimestampAlert {
    alert_id: i32,
    last_ts: RefCell<HashMap<String, u64>>,
}

impl BssTimestampAlert {
    pub fn register(
        chain: &Packetchain,
        alertracker: &Alertracker,
    ) -> Rc<BssTimestampAlert> {
        let alert_id = alertracker.register_alert(
            "BSSTIMESTAMP",
            "A BSS timestamp ran backwards, which can indicate AP spoofing",
        );
        let engine = Rc::new(BssTimestampAlert {
            alert_id: alert_id,
            last_ts: RefCell::new(HashMap::new()),
        });
        let hook = engine.clone();
        chain.register_handler(
            CHAINPOS_TRACKER,
            Rc::new(move |reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.check(reg, pkt);
                0
            }),
        );
        engine
    }

    fn check(&self, registry: &GlobalRegistry, packet: &Packet) {
        let common = match packet.common {
            Some(ref c) if c.bss_timestamp != 0 => c,
            _ => return,
        };
        let mut last = self.last_ts.borrow_mut();
        let previous = last.insert(common.bssid.clone(), common.bss_timestamp);
        if let Some(previous) = previous {
            if common.bss_timestamp + BSSTS_SLOP < previous {
                if let Some(tracker) = registry.fetch::<::alertracker::AlertrackerKey>() {
                    tracker.raise_alert(
                        registry,
                        self.alert_id,
                        &format!(
                            "BSS timestamp on {} dropped from {} to {}; possible \
                             AP spoofing",
                            common.bssid, previous, common.bss_timestamp
                        ),
                    );
                }
            }
        }
    }

    pub fn tracked_bss_count(&self) -> usize {
        self.last_ts.borrow().len()
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use time::Timespec;

    use super::*;
    use alertracker::{Alertracker, AlertrackerKey};
    use packetchain::{CommonInfo, Packet, Packetchain, DLT_IEEE802_11};
    use registry::{GlobalRegistry, Version};

    fn registry(tracker: &Rc<Alertracker>) -> GlobalRegistry {
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
        reg.insert::<AlertrackerKey>(tracker.clone()).unwrap();
        reg
    }

    fn beacon_with_ts(ts: u64) -> Packet {
        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "t", vec![0; 24]);
        let mut common = CommonInfo::new("IEEE802.11");
        common.bssid = "00:11:22:33:44:55".to_string();
        common.source_mac = common.bssid.clone();
        common.bss_timestamp = ts;
        pkt.common = Some(common);
        pkt
    }

    #[test]
    fn forward_timestamps_do_not_alert() {
        let alerts = Alertracker::new();
        let reg = registry(&alerts);
        let chain = Packetchain::new();
        BssTimestampAlert::register(&chain, &alerts);

        chain.process_packet(&reg, &mut beacon_with_ts(1_000_000_000));
        chain.process_packet(&reg, &mut beacon_with_ts(2_000_000_000));
        assert!(alerts.backlog().is_empty());
    }

    #[test]
    fn large_backwards_jump_alerts() {
        let alerts = Alertracker::new();
        let reg = registry(&alerts);
        let chain = Packetchain::new();
        let engine = BssTimestampAlert::register(&chain, &alerts);

        chain.process_packet(&reg, &mut beacon_with_ts(2_000_000_000));
        chain.process_packet(&reg, &mut beacon_with_ts(1_000_000));
        assert_eq!(alerts.backlog().len(), 1);
        assert_eq!(engine.tracked_bss_count(), 1);
    }

    #[test]
    fn small_jitter_is_within_slop() {
        let alerts = Alertracker::new();
        let reg = registry(&alerts);
        let chain = Packetchain::new();
        BssTimestampAlert::register(&chain, &alerts);

        chain.process_packet(&reg, &mut beacon_with_ts(10_000_000));
        chain.process_packet(&reg, &mut beacon_with_ts(9_000_000));
        assert!(alerts.backlog().is_empty());
    }
}
