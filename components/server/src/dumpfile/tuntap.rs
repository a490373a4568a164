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

//! Virtual network interface export: replays captured frames into a
//! tap device so external tools can watch them live. Opening the
//! control device needs privileges; without them the exporter reports
//! the condition and stays inert.

use std::cell::Cell;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};
use std::path::PathBuf;
use std::rc::Rc;

use libc::{self, c_char, c_short, c_void};

use dumpfile::Dumpfile;
use error::{Error, Result};
use messagebus::MessageFlags;
use packetchain::{Packet, Packetchain, CHAINPOS_LOGGING};
use registry::GlobalRegistry;

const TUN_CONTROL: &'static str = "/dev/net/tun";
const TAP_NAME: &'static str = "kistap0";

const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const IFF_TAP: c_short = 0x0002;
const IFF_NO_PI: c_short = 0x1000;

#[repr(C)]
struct IfReq {
    ifr_name: [c_char; libc::IFNAMSIZ],
    ifr_flags: c_short,
    _pad: [u8; 22],
}

pub struct DumpfileTuntap {
    fd: Cell<RawFd>,
    exported: Cell<u64>,
}

impl DumpfileTuntap {
    pub fn new(chain: &Packetchain) -> Rc<DumpfileTuntap> {
        let dump = Rc::new(DumpfileTuntap {
            fd: Cell::new(-1),
            exported: Cell::new(0),
        });
        let hook = dump.clone();
        chain.register_handler(
            CHAINPOS_LOGGING,
            Rc::new(move |_reg: &GlobalRegistry, pkt: &mut Packet| {
                hook.export(pkt);
                0
            }),
        );
        dump
    }

    /// Open and configure the tap device. Runs after the IPC sync so
    /// a privileged helper has had its chance to prepare the device
    /// node; failure is reported and leaves the exporter inert.
    pub fn open_tuntap(&self, registry: &GlobalRegistry) -> Result<()> {
        let control = OpenOptions::new()
            .read(true)
            .write(true)
            .open(TUN_CONTROL)
            .map_err(Error::TuntapOpen)?;

        let mut req = IfReq {
            ifr_name: [0; libc::IFNAMSIZ],
            ifr_flags: IFF_TAP | IFF_NO_PI,
            _pad: [0; 22],
        };
        for (dst, src) in req.ifr_name.iter_mut().zip(TAP_NAME.bytes()) {
            *dst = src as c_char;
        }

        let rv = unsafe { libc::ioctl(control.as_raw_fd(), TUNSETIFF, &mut req) };
        if rv < 0 {
            return Err(Error::TuntapOpen(io::Error::last_os_error()));
        }
        self.fd.set(control.into_raw_fd());
        registry.message(
            MessageFlags::INFO,
            &format!("Opened tun/tap packet export on {}", TAP_NAME),
        );
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.fd.get() >= 0
    }

    pub fn exported_count(&self) -> u64 {
        self.exported.get()
    }

    fn export(&self, packet: &Packet) {
        let fd = self.fd.get();
        if fd < 0 || packet.error || packet.data.is_empty() {
            return;
        }
        let rv = unsafe {
            libc::write(
                fd,
                packet.data.as_ptr() as *const c_void,
                packet.data.len(),
            )
        };
        if rv > 0 {
            self.exported.set(self.exported.get() + 1);
        }
    }
}

impl Dumpfile for DumpfileTuntap {
    fn name(&self) -> &'static str {
        "tuntap"
    }

    fn path(&self) -> PathBuf {
        PathBuf::from(TAP_NAME)
    }

    fn flush(&self, _registry: &GlobalRegistry) -> Result<bool> {
        // Frames go straight to the device; there is nothing buffered.
        Ok(false)
    }

    fn close(&self, _registry: &GlobalRegistry) -> Result<()> {
        let fd = self.fd.replace(-1);
        if fd >= 0 {
            unsafe {
                libc::close(fd);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use packetchain::Packetchain;
    use registry::{GlobalRegistry, Version};

    #[test]
    fn unopened_exporter_is_inert() {
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
        let dump = DumpfileTuntap::new(&chain);
        assert!(!dump.is_open());
        assert!(!dump.flush(&reg).unwrap());
        dump.close(&reg).unwrap();
        assert_eq!(dump.exported_count(), 0);
    }
}
