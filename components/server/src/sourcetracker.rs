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

//! The packet source tracker: source type registry, configuration
//! loading, capture start/stop, and the loop registration that
//! multiplexes every source's descriptor.

use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::rc::Rc;

use capture_protocol::Frame;
use kismet_core::fdset::FdSet;

use configfile::ConfigKey;
use messagebus::MessageFlags;
use packetsource::{PacketSource, SourceDefinition};
use pollable::Pollable;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal, PollToken};
use rootipc::RootIpc;

pub type SourceBuilder = fn(SourceDefinition) -> Rc<dyn PacketSource>;

struct SourcePrototype {
    type_name: &'static str,
    builder: SourceBuilder,
}

pub struct Sourcetracker {
    prototypes: RefCell<Vec<SourcePrototype>>,
    sources: RefCell<Vec<Rc<dyn PacketSource>>>,
    poll_token: RefCell<Option<PollToken>>,
    chanset_cmd: Cell<u32>,
    started: Cell<bool>,
}

pub struct SourcetrackerKey;

impl ComponentKey for SourcetrackerKey {
    type Component = Sourcetracker;
    const KEY: &'static str = "SOURCETRACKER";
}

impl Sourcetracker {
    pub fn new() -> Rc<Sourcetracker> {
        Rc::new(Sourcetracker {
            prototypes: RefCell::new(Vec::new()),
            sources: RefCell::new(Vec::new()),
            poll_token: RefCell::new(None),
            chanset_cmd: Cell::new(0),
            started: Cell::new(false),
        })
    }

    pub fn set_poll_token(&self, token: PollToken) {
        *self.poll_token.borrow_mut() = Some(token);
    }

    /// Register a source type. Returns negative when the type name is
    /// already claimed.
    pub fn register_packet_source(&self, type_name: &'static str, builder: SourceBuilder) -> i32 {
        let mut prototypes = self.prototypes.borrow_mut();
        if prototypes.iter().any(|p| p.type_name == type_name) {
            return -1;
        }
        prototypes.push(SourcePrototype {
            type_name: type_name,
            builder: builder,
        });
        0
    }

    /// Register the channel-control command with the capture helper.
    /// The helper acks channel changes; the ack is bookkeeping, so the
    /// handler just logs.
    pub fn register_ipc(&self, ipc: &Rc<RootIpc>) {
        let cmd = ipc.register_ipc_cmd(
            "CHANSET",
            Some(Box::new(|_reg: &GlobalRegistry, frame: &Frame| {
                debug!("Channel set ack, {} payload bytes", frame.data.len());
                0
            })),
        );
        self.chanset_cmd.set(cmd);
    }

    pub fn chanset_cmd(&self) -> u32 {
        self.chanset_cmd.get()
    }

    /// Build sources from the command line and the config file.
    /// Returns negative on an unusable definition; the orchestrator
    /// treats that as fatal.
    pub fn load_configuration(&self, registry: &GlobalRegistry) -> i32 {
        let mut definitions: Vec<String> = registry.cmdline_sources();
        if let Some(config) = registry.fetch::<ConfigKey>() {
            if let Some(more) = config.fetch_opt_vec("ncsource") {
                definitions.extend(more);
            }
        }

        for raw in definitions {
            let def: SourceDefinition = match raw.parse() {
                Ok(def) => def,
                Err(e) => {
                    registry.message(
                        MessageFlags::FATAL,
                        &format!("Invalid packet source '{}': {}", raw, e),
                    );
                    return -1;
                }
            };
            let type_name = match def.source_type {
                Some(ref t) => t.clone(),
                None => {
                    registry.message(
                        MessageFlags::FATAL,
                        &format!(
                            "Packet source '{}' has no type and none could be guessed",
                            raw
                        ),
                    );
                    return -1;
                }
            };
            let prototypes = self.prototypes.borrow();
            let prototype = match prototypes.iter().find(|p| p.type_name == type_name) {
                Some(p) => p,
                None => {
                    registry.message(
                        MessageFlags::FATAL,
                        &format!(
                            "No packet source of type '{}' is available for '{}'",
                            type_name, raw
                        ),
                    );
                    return -1;
                }
            };
            let source = (prototype.builder)(def);
            registry.message(
                MessageFlags::INFO,
                &format!("Created source {} ({})", source.name(), type_name),
            );
            drop(prototypes);
            self.sources.borrow_mut().push(source);
        }
        0
    }

    /// Begin capture on every configured source (source id zero means
    /// all, and the core only ever starts all).
    pub fn start_source(&self, registry: &GlobalRegistry, _src_id: u64) -> i32 {
        self.started.set(true);
        let sources: Vec<Rc<dyn PacketSource>> =
            self.sources.borrow().iter().cloned().collect();
        let mut failures = 0;
        for source in sources {
            match source.open(registry) {
                Ok(()) => registry.message(
                    MessageFlags::INFO,
                    &format!("Started source {}", source.name()),
                ),
                Err(e) => {
                    failures += 1;
                    registry.message(
                        MessageFlags::ERROR,
                        &format!("Unable to start source {}: {}", source.name(), e),
                    );
                }
            }
        }
        -failures
    }

    /// Stop capture everywhere; called from teardown. Idempotent.
    pub fn stop_source(&self, _registry: &GlobalRegistry, _src_id: u64) {
        if !self.started.replace(false) {
            return;
        }
        for source in self.sources.borrow().iter() {
            if source.running() {
                source.close();
            }
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.borrow().len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.borrow().iter().map(|s| s.name()).collect()
    }
}

impl Pollable for Sourcetracker {
    fn merge_set(&self, mut max_fd: RawFd, rset: &mut FdSet, _wset: &mut FdSet) -> RawFd {
        for source in self.sources.borrow().iter() {
            if !source.running() {
                continue;
            }
            let fd = source.descriptor();
            if fd >= 0 {
                rset.set(fd);
                if fd > max_fd {
                    max_fd = fd;
                }
            }
        }
        max_fd
    }

    fn poll(&self, registry: &GlobalRegistry, rset: &FdSet, _wset: &FdSet) -> i32 {
        let sources: Vec<Rc<dyn PacketSource>> =
            self.sources.borrow().iter().cloned().collect();
        let mut rv = 0;
        for source in sources {
            if !source.running() {
                continue;
            }
            let fd = source.descriptor();
            if fd >= 0 && !rset.is_set(fd) {
                continue;
            }
            if source.poll(registry) < 0 {
                registry.message(
                    MessageFlags::ERROR,
                    &format!("Shut down failed source {}", source.name()),
                );
                rv = -1;
            }
        }
        rv
    }
}

impl LifetimeGlobal for Sourcetracker {
    fn name(&self) -> &'static str {
        "sourcetracker"
    }
    fn shutdown(&self, registry: &GlobalRegistry) {
        self.stop_source(registry, 0);
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::os::unix::io::RawFd;
    use std::rc::Rc;

    use super::*;
    use error::Result;
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

    struct NullSource {
        def: SourceDefinition,
        open: Cell<bool>,
    }

    impl PacketSource for NullSource {
        fn name(&self) -> String {
            self.def.interface.clone()
        }
        fn source_type(&self) -> &'static str {
            "null"
        }
        fn interface(&self) -> String {
            self.def.interface.clone()
        }
        fn open(&self, _registry: &GlobalRegistry) -> Result<()> {
            self.open.set(true);
            Ok(())
        }
        fn close(&self) {
            self.open.set(false);
        }
        fn running(&self) -> bool {
            self.open.get()
        }
        fn descriptor(&self) -> RawFd {
            -1
        }
        fn poll(&self, _registry: &GlobalRegistry) -> i32 {
            0
        }
    }

    fn null_builder(def: SourceDefinition) -> Rc<dyn PacketSource> {
        Rc::new(NullSource {
            def: def,
            open: Cell::new(false),
        })
    }

    #[test]
    fn duplicate_type_registration_is_refused() {
        let tracker = Sourcetracker::new();
        assert_eq!(tracker.register_packet_source("null", null_builder), 0);
        assert_eq!(tracker.register_packet_source("null", null_builder), -1);
    }

    #[test]
    fn cmdline_sources_are_loaded() {
        let reg = registry();
        reg.add_cmdline_source("fake0:type=null");
        let tracker = Sourcetracker::new();
        tracker.register_packet_source("null", null_builder);
        assert_eq!(tracker.load_configuration(&reg), 0);
        assert_eq!(tracker.source_count(), 1);
        assert_eq!(tracker.source_names(), vec!["fake0".to_string()]);
    }

    #[test]
    fn unknown_source_type_is_fatal() {
        let reg = registry();
        reg.add_cmdline_source("wlan0:type=wext");
        let tracker = Sourcetracker::new();
        tracker.register_packet_source("null", null_builder);
        assert!(tracker.load_configuration(&reg) < 0);
    }

    #[test]
    fn untyped_source_is_fatal() {
        let reg = registry();
        reg.add_cmdline_source("wlan0");
        let tracker = Sourcetracker::new();
        assert!(tracker.load_configuration(&reg) < 0);
    }

    #[test]
    fn start_and_stop_toggle_sources() {
        let reg = registry();
        reg.add_cmdline_source("fake0:type=null");
        let tracker = Sourcetracker::new();
        tracker.register_packet_source("null", null_builder);
        tracker.load_configuration(&reg);

        assert_eq!(tracker.start_source(&reg, 0), 0);
        assert!(tracker.sources.borrow()[0].running());
        tracker.stop_source(&reg, 0);
        assert!(!tracker.sources.borrow()[0].running());
    }
}
