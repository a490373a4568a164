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

//! The packet processing chain. Capture sources inject packets; every
//! decoder, classifier, tracker, and logger hooks a phase and sees
//! each packet in phase order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use time::Timespec;

use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

pub const CHAINPOS_POSTCAP: u32 = 1;
pub const CHAINPOS_LLCDISSECT: u32 = 2;
pub const CHAINPOS_DECRYPT: u32 = 3;
pub const CHAINPOS_DATADISSECT: u32 = 4;
pub const CHAINPOS_CLASSIFIER: u32 = 5;
pub const CHAINPOS_TRACKER: u32 = 6;
pub const CHAINPOS_LOGGING: u32 = 7;

// Link types the chain knows how to strip down to 802.11.
pub const DLT_EN10MB: u32 = 1;
pub const DLT_IEEE802_11: u32 = 105;
pub const DLT_PRISM_HEADER: u32 = 119;
pub const DLT_IEEE802_11_RADIO: u32 = 127;
pub const DLT_PPI: u32 = 192;

/// Link-layer-independent summary a classifier attaches to a packet.
#[derive(Clone, Debug, Default)]
pub struct CommonInfo {
    pub source_mac: String,
    pub dest_mac: String,
    pub bssid: String,
    pub channel: u32,
    pub bss_timestamp: u64,
    pub phy: &'static str,
}

impl CommonInfo {
    pub fn new(phy: &'static str) -> CommonInfo {
        CommonInfo {
            phy: phy,
            ..Default::default()
        }
    }
}

pub struct Packet {
    pub ts: Timespec,
    pub dlt: u32,
    pub source: String,
    pub data: Vec<u8>,
    /// Offset of the link payload once a DLT decoder has stripped its
    /// header; zero until one does.
    pub payload_offset: usize,
    pub common: Option<CommonInfo>,
    pub error: bool,
}

impl Packet {
    pub fn new(ts: Timespec, dlt: u32, source: &str, data: Vec<u8>) -> Packet {
        Packet {
            ts: ts,
            dlt: dlt,
            source: source.to_string(),
            data: data,
            payload_offset: 0,
            common: None,
            error: false,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[self.payload_offset.min(self.data.len())..]
    }
}

pub type ChainHandler = Rc<dyn Fn(&GlobalRegistry, &mut Packet) -> i32>;

pub struct Packetchain {
    handlers: RefCell<Vec<(u32, ChainHandler)>>,
    packets: Cell<u64>,
    errors: Cell<u64>,
}

pub struct PacketchainKey;

impl ComponentKey for PacketchainKey {
    type Component = Packetchain;
    const KEY: &'static str = "PACKETCHAIN";
}

impl Packetchain {
    pub fn new() -> Rc<Packetchain> {
        Rc::new(Packetchain {
            handlers: RefCell::new(Vec::new()),
            packets: Cell::new(0),
            errors: Cell::new(0),
        })
    }

    /// Hook `handler` at `phase`. Within a phase, handlers run in
    /// registration order.
    pub fn register_handler(&self, phase: u32, handler: ChainHandler) {
        let mut handlers = self.handlers.borrow_mut();
        let at = handlers
            .iter()
            .position(|&(p, _)| p > phase)
            .unwrap_or(handlers.len());
        handlers.insert(at, (phase, handler));
    }

    /// Run a packet through the chain. A handler returning negative
    /// marks the packet in error and stops the chain.
    pub fn process_packet(&self, registry: &GlobalRegistry, packet: &mut Packet) {
        self.packets.set(self.packets.get() + 1);
        let snapshot: Vec<ChainHandler> = self.handlers
            .borrow()
            .iter()
            .map(|&(_, ref h)| h.clone())
            .collect();
        for handler in snapshot {
            if handler(registry, packet) < 0 {
                packet.error = true;
                self.errors.set(self.errors.get() + 1);
                break;
            }
        }
    }

    pub fn packet_count(&self) -> u64 {
        self.packets.get()
    }

    pub fn error_count(&self) -> u64 {
        self.errors.get()
    }
}

impl LifetimeGlobal for Packetchain {
    fn name(&self) -> &'static str {
        "packetchain"
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

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

    fn packet() -> Packet {
        Packet::new(Timespec::new(0, 0), DLT_IEEE802_11, "test0", vec![0; 8])
    }

    #[test]
    fn handlers_run_in_phase_order_regardless_of_registration() {
        let reg = registry();
        let chain = Packetchain::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for &(phase, tag) in &[
            (CHAINPOS_LOGGING, "logging"),
            (CHAINPOS_POSTCAP, "postcap"),
            (CHAINPOS_TRACKER, "tracker"),
        ] {
            let order = order.clone();
            chain.register_handler(
                phase,
                Rc::new(move |_reg: &GlobalRegistry, _pkt: &mut Packet| {
                    order.borrow_mut().push(tag);
                    0
                }),
            );
        }

        chain.process_packet(&reg, &mut packet());
        assert_eq!(*order.borrow(), vec!["postcap", "tracker", "logging"]);
    }

    #[test]
    fn negative_handler_marks_error_and_stops_the_chain() {
        let reg = registry();
        let chain = Packetchain::new();
        let later = Rc::new(RefCell::new(false));

        chain.register_handler(
            CHAINPOS_POSTCAP,
            Rc::new(|_reg: &GlobalRegistry, _pkt: &mut Packet| -1),
        );
        let flag = later.clone();
        chain.register_handler(
            CHAINPOS_LOGGING,
            Rc::new(move |_reg: &GlobalRegistry, _pkt: &mut Packet| {
                *flag.borrow_mut() = true;
                0
            }),
        );

        let mut pkt = packet();
        chain.process_packet(&reg, &mut pkt);
        assert!(pkt.error);
        assert!(!*later.borrow());
        assert_eq!(chain.error_count(), 1);
    }

    #[test]
    fn payload_respects_the_decoded_offset() {
        let mut pkt = Packet::new(Timespec::new(0, 0), DLT_PPI, "t", vec![1, 2, 3, 4]);
        pkt.payload_offset = 2;
        assert_eq!(pkt.payload(), &[3, 4]);
        pkt.payload_offset = 100;
        assert!(pkt.payload().is_empty());
    }
}
