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

//! The embedded web server. Startup and shutdown are core lifecycle
//! responsibilities; routing belongs to the handlers subsystems
//! register. The listener is nonblocking and served from the main
//! select loop; each poll pass does a bounded amount of accept and
//! request work.

pub mod restmessage;
pub mod websession;

use std::cell::{Cell, RefCell};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use kismet_core::fdset::FdSet;

use configfile::ConfigFile;
use error::{Error, Result};
use messagebus::MessageFlags;
use pollable::Pollable;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal, PollToken};

pub const HTTPD_DEFAULT_PORT: u16 = 2501;

/// Accept at most this many connections per poll pass so the web
/// server cannot starve the capture path.
const ACCEPTS_PER_POLL: usize = 8;

const REQUEST_MAX: usize = 4096;

pub struct HttpdResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpdResponse {
    pub fn json(body: Vec<u8>) -> HttpdResponse {
        HttpdResponse {
            status: 200,
            content_type: "application/json",
            body: body,
        }
    }

    pub fn not_found() -> HttpdResponse {
        HttpdResponse {
            status: 404,
            content_type: "text/plain",
            body: b"not found".to_vec(),
        }
    }
}

pub trait HttpdHandler {
    fn httpd_verify_path(&self, path: &str, method: &str) -> bool;
    fn httpd_handle_request(
        &self,
        registry: &GlobalRegistry,
        path: &str,
        method: &str,
    ) -> HttpdResponse;
}

pub struct Httpd {
    port: u16,
    listener: RefCell<Option<TcpListener>>,
    handlers: RefCell<Vec<Rc<dyn HttpdHandler>>>,
    poll_token: RefCell<Option<PollToken>>,
    requests: Cell<u64>,
}

pub struct HttpdServerKey;

impl ComponentKey for HttpdServerKey {
    type Component = Httpd;
    const KEY: &'static str = "HTTPD_SERVER";
}

impl Httpd {
    pub fn new(config: &ConfigFile) -> Rc<Httpd> {
        let port = config
            .fetch_opt_as::<u16>("httpd_port")
            .and_then(|p| p.ok())
            .unwrap_or(HTTPD_DEFAULT_PORT);
        Rc::new(Httpd {
            port: port,
            listener: RefCell::new(None),
            handlers: RefCell::new(Vec::new()),
            poll_token: RefCell::new(None),
            requests: Cell::new(0),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn register_handler(&self, handler: Rc<dyn HttpdHandler>) {
        self.handlers.borrow_mut().push(handler);
    }

    pub fn set_poll_token(&self, token: PollToken) {
        *self.poll_token.borrow_mut() = Some(token);
    }

    /// Bind the listening socket and begin serving. Construction and
    /// listening are separate steps; handlers register in between.
    pub fn start_httpd(&self, registry: &GlobalRegistry) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener =
            TcpListener::bind(&addr).map_err(|e| Error::HttpdBind(addr.clone(), e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::HttpdBind(addr.clone(), e))?;
        *self.listener.borrow_mut() = Some(listener);
        registry.message(
            MessageFlags::INFO,
            &format!("Started Kismet web server on port {}", self.port),
        );
        Ok(())
    }

    /// Stop listening and drop the loop registration. Idempotent.
    pub fn stop_httpd(&self, _registry: &GlobalRegistry) {
        self.listener.borrow_mut().take();
        self.poll_token.borrow_mut().take();
    }

    pub fn is_running(&self) -> bool {
        self.listener.borrow().is_some()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }

    fn serve_connection(&self, registry: &GlobalRegistry, mut stream: TcpStream) {
        let _ = stream.set_nonblocking(false);
        let _ = stream.set_read_timeout(Some(Duration::from_millis(100)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(500)));

        let mut buf = [0u8; REQUEST_MAX];
        let read = match stream.read(&mut buf) {
            Ok(n) if n > 0 => n,
            _ => return,
        };
        let request = String::from_utf8_lossy(&buf[..read]).into_owned();
        let mut first_line = request.lines().next().unwrap_or("").split_whitespace();
        let method = first_line.next().unwrap_or("");
        let path = first_line.next().unwrap_or("");
        if method.is_empty() || path.is_empty() {
            return;
        }

        self.requests.set(self.requests.get() + 1);
        let response = self.dispatch(registry, path, method);
        let reason = match response.status {
            200 => "OK",
            404 => "Not Found",
            401 => "Unauthorized",
            _ => "Error",
        };
        let header = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            response.status,
            reason,
            response.content_type,
            response.body.len()
        );
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(&response.body);
    }

    fn dispatch(&self, registry: &GlobalRegistry, path: &str, method: &str) -> HttpdResponse {
        let handlers: Vec<Rc<dyn HttpdHandler>> =
            self.handlers.borrow().iter().cloned().collect();
        for handler in handlers {
            if handler.httpd_verify_path(path, method) {
                return handler.httpd_handle_request(registry, path, method);
            }
        }
        HttpdResponse::not_found()
    }
}

impl Pollable for Httpd {
    fn merge_set(&self, mut max_fd: RawFd, rset: &mut FdSet, _wset: &mut FdSet) -> RawFd {
        if let Some(ref listener) = *self.listener.borrow() {
            let fd = listener.as_raw_fd();
            rset.set(fd);
            if fd > max_fd {
                max_fd = fd;
            }
        }
        max_fd
    }

    fn poll(&self, registry: &GlobalRegistry, rset: &FdSet, _wset: &FdSet) -> i32 {
        let ready = match *self.listener.borrow() {
            Some(ref listener) => rset.is_set(listener.as_raw_fd()),
            None => false,
        };
        if !ready {
            return 0;
        }
        for _ in 0..ACCEPTS_PER_POLL {
            let accepted = match *self.listener.borrow() {
                Some(ref listener) => listener.accept(),
                None => return 0,
            };
            match accepted {
                Ok((stream, _addr)) => self.serve_connection(registry, stream),
                Err(ref e) if e.kind() == ::std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("Web server accept failed: {}", e);
                    break;
                }
            }
        }
        0
    }
}

impl LifetimeGlobal for Httpd {
    fn name(&self) -> &'static str {
        "httpd"
    }
    fn shutdown(&self, registry: &GlobalRegistry) {
        self.stop_httpd(registry);
    }
}
