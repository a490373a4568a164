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

//! Severity-tagged status fan-out. Everything an operator is meant to
//! see flows through here; the `log` crate stays for developer
//! diagnostics.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use registry::{ComponentKey, LifetimeGlobal};

bitflags! {
    pub struct MessageFlags: u32 {
        const DEBUG      = 0b0000_0001;
        const INFO       = 0b0000_0010;
        const ERROR      = 0b0000_0100;
        const ALERT      = 0b0000_1000;
        const FATAL      = 0b0001_0000;
        /// Force retention in the fatal queue even for non-fatal text.
        const PRINT      = 0b0010_0000;
        /// Local console only; never forwarded to remote clients.
        const LOCAL      = 0b0100_0000;
        const PRINTERROR = Self::ERROR.bits | Self::PRINT.bits;
        const ALL        = 0b0111_1111;
    }
}

/// How many FATAL/PRINT lines the fatal queue retains; oldest drop
/// first.
pub const FATAL_QUEUE_MAX: usize = 50;

/// Field width the stdout client wraps to.
const WRAP_WIDTH: usize = 75;

// The silence and line-wrap switches mirror the command line and are
// consulted on every print; they live here rather than in the registry
// because the stdout client runs before the registry settles.
static SILENT: AtomicBool = AtomicBool::new(false);
static LINEWRAP: AtomicBool = AtomicBool::new(true);

pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::Relaxed);
}

pub fn is_silent() -> bool {
    SILENT.load(Ordering::Relaxed)
}

pub fn set_linewrap(linewrap: bool) {
    LINEWRAP.store(linewrap, Ordering::Relaxed);
}

pub fn is_linewrap() -> bool {
    LINEWRAP.load(Ordering::Relaxed)
}

/// Wrap `text` into lines at most `width` columns wide, indenting
/// continuation lines by `indent` spaces.
pub fn inline_wrap(text: &str, indent: usize, width: usize) -> String {
    let mut out = String::new();
    let mut line_len = 0;
    let pad = " ".repeat(indent);
    for word in text.split_whitespace() {
        if line_len > 0 && line_len + 1 + word.len() > width {
            out.push('\n');
            out.push_str(&pad);
            line_len = indent;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        out.push_str(word);
        line_len += word.len();
    }
    out.push('\n');
    out
}

pub trait MessageClient {
    fn process_message(&self, msg: &str, flags: MessageFlags);
}

struct Subscription {
    client: Rc<dyn MessageClient>,
    mask: MessageFlags,
}

pub struct MessageBus {
    clients: RefCell<Vec<Subscription>>,
}

pub struct MessageBusKey;

impl ComponentKey for MessageBusKey {
    type Component = MessageBus;
    const KEY: &'static str = "MESSAGEBUS";
}

impl MessageBus {
    pub fn new() -> Rc<MessageBus> {
        Rc::new(MessageBus {
            clients: RefCell::new(Vec::new()),
        })
    }

    pub fn register_client(&self, client: Rc<dyn MessageClient>, mask: MessageFlags) {
        self.clients.borrow_mut().push(Subscription {
            client: client,
            mask: mask,
        });
    }

    pub fn remove_client(&self, client: &Rc<dyn MessageClient>) {
        self.clients
            .borrow_mut()
            .retain(|s| !Rc::ptr_eq(&s.client, client));
    }

    /// Deliver `msg` to every client whose subscription intersects
    /// `flags`, synchronously and in registration order. Posting never
    /// fails; a panicking client is reported to stderr and the
    /// remaining clients still see the message. Clients must not post
    /// from inside their callback.
    pub fn post(&self, flags: MessageFlags, msg: &str) {
        let matched: Vec<Rc<dyn MessageClient>> = self.clients
            .borrow()
            .iter()
            .filter(|s| s.mask.intersects(flags))
            .map(|s| s.client.clone())
            .collect();
        for client in matched {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| client.process_message(msg, flags)));
            if outcome.is_err() {
                eprintln!("A message client failed processing: {}", msg);
            }
        }
    }
}

impl LifetimeGlobal for MessageBus {
    fn name(&self) -> &'static str {
        "messagebus"
    }
}

/// Prints to the console with a severity prefix, honoring the silence
/// and line-wrap switches. FATAL lands on stderr so it survives stdout
/// redirection.
pub struct StdoutClient;

impl StdoutClient {
    pub fn new() -> Rc<StdoutClient> {
        Rc::new(StdoutClient)
    }

    fn emit(&self, target: &mut dyn Write, prefix: &str, msg: &str) {
        if is_linewrap() {
            let _ = write!(
                target,
                "{}",
                inline_wrap(&format!("{}{}", prefix, msg), prefix.len(), WRAP_WIDTH)
            );
        } else {
            let _ = writeln!(target, "{}{}", prefix, msg);
        }
        let _ = target.flush();
    }
}

impl MessageClient for StdoutClient {
    fn process_message(&self, msg: &str, flags: MessageFlags) {
        if is_silent() {
            return;
        }
        if flags.contains(MessageFlags::FATAL) {
            self.emit(&mut io::stderr(), "FATAL: ", msg);
        } else if flags.contains(MessageFlags::DEBUG) {
            self.emit(&mut io::stdout(), "DEBUG: ", msg);
        } else if flags.contains(MessageFlags::LOCAL) {
            self.emit(&mut io::stdout(), "LOCAL: ", msg);
        } else if flags.contains(MessageFlags::ERROR) {
            self.emit(&mut io::stdout(), "ERROR: ", msg);
        } else if flags.contains(MessageFlags::ALERT) {
            self.emit(&mut io::stdout(), "ALERT: ", msg);
        } else if flags.contains(MessageFlags::INFO) {
            self.emit(&mut io::stdout(), "INFO: ", msg);
        }
    }
}

/// Retains the tail of the FATAL/PRINT stream so it can be replayed to
/// stderr at exit, after the console has been torn down or redirected.
pub struct FatalQueueClient {
    queue: RefCell<VecDeque<String>>,
    dumped: Cell<bool>,
}

pub struct FatalQueueKey;

impl ComponentKey for FatalQueueKey {
    type Component = FatalQueueClient;
    const KEY: &'static str = "FATAL_QUEUE";
}

impl FatalQueueClient {
    pub fn new() -> Rc<FatalQueueClient> {
        Rc::new(FatalQueueClient {
            queue: RefCell::new(VecDeque::new()),
            dumped: Cell::new(false),
        })
    }

    pub fn dump_fatals(&self) {
        if self.dumped.replace(true) {
            return;
        }
        for line in self.queue.borrow().iter() {
            if is_linewrap() {
                eprint!("{}", inline_wrap(line, 7, 80));
            } else {
                eprintln!("{}", line);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl MessageClient for FatalQueueClient {
    fn process_message(&self, msg: &str, flags: MessageFlags) {
        let mut queue = self.queue.borrow_mut();
        if flags.contains(MessageFlags::FATAL) {
            queue.push_back(format!("FATAL: {}", msg));
        } else if flags.contains(MessageFlags::PRINT) {
            queue.push_back(format!("ERROR: {}", msg));
        } else {
            return;
        }
        while queue.len() > FATAL_QUEUE_MAX {
            queue.pop_front();
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct Recorder {
        seen: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn new() -> Rc<Recorder> {
            Rc::new(Recorder {
                seen: RefCell::new(Vec::new()),
            })
        }
    }

    impl MessageClient for Recorder {
        fn process_message(&self, msg: &str, _flags: MessageFlags) {
            self.seen.borrow_mut().push(msg.to_string());
        }
    }

    #[test]
    fn delivery_requires_mask_intersection() {
        let bus = MessageBus::new();
        let info_client = Recorder::new();
        let fatal_client = Recorder::new();
        bus.register_client(info_client.clone(), MessageFlags::INFO);
        bus.register_client(fatal_client.clone(), MessageFlags::FATAL);

        bus.post(MessageFlags::INFO, "hello");
        assert_eq!(info_client.seen.borrow().len(), 1);
        assert!(fatal_client.seen.borrow().is_empty());
    }

    #[test]
    fn clients_see_messages_in_registration_order() {
        let bus = MessageBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Tagged {
            order: Rc<RefCell<Vec<u32>>>,
            tag: u32,
        }
        impl MessageClient for Tagged {
            fn process_message(&self, _msg: &str, _flags: MessageFlags) {
                self.order.borrow_mut().push(self.tag);
            }
        }

        for tag in 0..3 {
            bus.register_client(
                Rc::new(Tagged {
                    order: order.clone(),
                    tag: tag,
                }),
                MessageFlags::ALL,
            );
        }
        bus.post(MessageFlags::INFO, "ping");
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn removed_client_no_longer_sees_posts() {
        let bus = MessageBus::new();
        let client = Recorder::new();
        bus.register_client(client.clone(), MessageFlags::ALL);
        bus.post(MessageFlags::INFO, "one");
        bus.remove_client(&(client.clone() as Rc<dyn MessageClient>));
        bus.post(MessageFlags::INFO, "two");
        assert_eq!(*client.seen.borrow(), vec!["one".to_string()]);
    }

    #[test]
    fn panicking_client_does_not_stop_delivery() {
        struct Bomb;
        impl MessageClient for Bomb {
            fn process_message(&self, _msg: &str, _flags: MessageFlags) {
                panic!("client bug");
            }
        }

        let bus = MessageBus::new();
        let survivor = Recorder::new();
        bus.register_client(Rc::new(Bomb), MessageFlags::ALL);
        bus.register_client(survivor.clone(), MessageFlags::ALL);
        bus.post(MessageFlags::ERROR, "boom");
        assert_eq!(survivor.seen.borrow().len(), 1);
    }

    #[test]
    fn fatal_queue_drops_oldest_beyond_fifty() {
        let client = FatalQueueClient::new();
        for n in 0..60 {
            client.process_message(&format!("failure {}", n), MessageFlags::FATAL);
        }
        assert_eq!(client.len(), FATAL_QUEUE_MAX);
    }

    #[test]
    fn fatal_queue_keeps_print_but_not_info() {
        let client = FatalQueueClient::new();
        client.process_message("forced", MessageFlags::PRINT);
        client.process_message("ordinary", MessageFlags::INFO);
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn wrap_respects_width_and_indent() {
        let text = "one two three four five six seven eight nine ten eleven twelve \
                    thirteen fourteen fifteen sixteen";
        let wrapped = inline_wrap(text, 6, 30);
        for line in wrapped.lines().skip(1) {
            assert!(line.starts_with("      "));
        }
        for line in wrapped.lines() {
            assert!(line.len() <= 30 + 6);
        }
    }
}
