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

//! Printable-string extraction log: harvests ASCII runs from data
//! frame payloads as they pass the dissection phase.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use dumpfile::{self, Dumpfile};
use error::{Error, Result};
use packetchain::{Packet, Packetchain, CHAINPOS_DATADISSECT};
use registry::GlobalRegistry;

const MIN_RUN: usize = 4;
const STRINGS_PER_PACKET: usize = 32;

pub struct DumpfileStrings {
    path: PathBuf,
    buffer: RefCell<Vec<String>>,
}

impl DumpfileStrings {
    pub fn new(path: PathBuf, chain: &Packetchain) -> Rc<DumpfileStrings> {
        let dump = Rc::new(DumpfileStrings {
            path: path,
            buffer: RefCell::new(Vec::new()),
        });
        let hook = dump.clone();
        chain.register_handler(
            CHAINPOS_DATADISSECT,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.harvest(pkt);
                0
            }),
        );
        dump
    }

    fn harvest(&self, packet: &Packet) {
        let mut buffer = self.buffer.borrow_mut();
        let mut run = String::new();
        let mut harvested = 0;
        for &byte in packet.payload() {
            if byte >= 0x20 && byte < 0x7F {
                run.push(byte as char);
                continue;
            }
            if run.len() >= MIN_RUN {
                buffer.push(run.clone());
                harvested += 1;
                if harvested >= STRINGS_PER_PACKET {
                    return;
                }
            }
            run.clear();
        }
        if run.len() >= MIN_RUN {
            buffer.push(run);
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.borrow().len()
    }
}

impl Dumpfile for DumpfileStrings {
    fn name(&self) -> &'static str {
        "string"
    }

    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn flush(&self, _registry: &GlobalRegistry) -> Result<bool> {
        let strings = self.buffer.replace(Vec::new());
        if strings.is_empty() {
            return Ok(false);
        }
        let mut file = dumpfile::open_log_file(&self.path)?;
        for s in &strings {
            writeln!(file, "{}", s).map_err(|e| Error::DumpfileIO(self.path.clone(), e))?;
        }
        Ok(true)
    }
}
