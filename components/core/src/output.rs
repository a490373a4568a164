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

//! User-facing output, as distinct from developer logging through the
//! `log` crate. Every process in the workspace speaks through
//! `outputln!`, which picks up the `LOGKEY` static of the invoking
//! module.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use ansi_term::Colour::White;

static VERBOSE: AtomicBool = AtomicBool::new(false);
static NO_COLOR: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

pub fn set_no_color(no_color: bool) {
    NO_COLOR.store(no_color, Ordering::Relaxed);
}

pub fn is_color() -> bool {
    !NO_COLOR.load(Ordering::Relaxed)
}

/// Format a line the way the server presents itself to an operator:
/// `kismet(XY): content`, with `file:line` appended in verbose mode.
pub fn format_line(logkey: &str, file: &str, line: u32, content: &str) -> String {
    let preamble = if is_verbose() {
        format!("kismet({})[{}:{}]:", logkey, file, line)
    } else {
        format!("kismet({}):", logkey)
    };
    let preamble = if is_color() {
        format!("{}", White.dimmed().paint(preamble))
    } else {
        preamble
    };
    format!("{} {}\n", preamble, content)
}

/// The wrapper pipes our stdout; keep it unbuffered so lines arrive as
/// they happen.
pub fn print_line(line: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(line.as_bytes()).ok();
    handle.flush().ok();
}

#[macro_export]
macro_rules! output_format {
    ($content:expr) => {
        $crate::output::format_line(LOGKEY, file!(), line!(), $content)
    };
    ($format:expr, $($arg:tt)*) => {
        $crate::output::format_line(LOGKEY, file!(), line!(), &format!($format, $($arg)*))
    };
}

#[macro_export]
macro_rules! outputln {
    ($content:expr) => {{
        $crate::output::print_line(&$crate::output::format_line(
            LOGKEY, file!(), line!(), $content))
    }};
    ($format:expr, $($arg:tt)*) => {{
        $crate::output::print_line(&$crate::output::format_line(
            LOGKEY, file!(), line!(), &format!($format, $($arg)*)))
    }};
}

#[cfg(test)]
mod test {
    use super::*;

    static LOGKEY: &'static str = "OT";

    #[test]
    fn format_carries_logkey() {
        set_no_color(true);
        let line = format_line(LOGKEY, file!(), line!(), "hello");
        assert!(line.starts_with("kismet(OT):"));
        assert!(line.ends_with("hello\n"));
    }

    #[test]
    fn verbose_format_includes_location() {
        set_no_color(true);
        set_verbose(true);
        let line = output_format!("x = {}", 2);
        assert!(line.contains("output.rs"));
        set_verbose(false);
    }
}
