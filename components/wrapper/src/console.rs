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

//! Three-region terminal presentation: a reverse-video title bar, a
//! scrolling body driven by a DECSTBM scroll region, and a hint line
//! at the bottom. Falls back to plain passthrough when stdout is not
//! a terminal.

use std::io::{self, Write};
use std::mem;

use ansi_term::Style;
use libc;

const TITLE: &'static str = "Kismet Server";
const HINT: &'static str = "Visit http://localhost:2501 to view the Kismet UI";

pub struct Console {
    rows: u16,
    cols: u16,
    is_tty: bool,
}

impl Console {
    pub fn open() -> Console {
        let is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) } == 1;
        let (rows, cols) = terminal_size().unwrap_or((24, 80));
        Console {
            rows: rows,
            cols: cols,
            is_tty: is_tty,
        }
    }

    /// Draw the title and hint bars and confine output to the body
    /// region between them.
    pub fn draw_chrome(&mut self) {
        if !self.is_tty {
            return;
        }
        let bar = Style::new().reverse();
        let mut out = io::stdout();
        // Clear, title on the first row, hint on the last.
        let _ = write!(out, "\x1b[2J\x1b[1;1H");
        let _ = write!(out, "{}", bar.paint(pad_to(TITLE, self.cols as usize)));
        let _ = write!(out, "\x1b[{};1H", self.rows);
        let _ = write!(out, "{}", bar.paint(pad_to(HINT, self.cols as usize)));
        // Scroll region over the body, cursor at its top.
        let _ = write!(out, "\x1b[2;{}r\x1b[2;1H", self.rows.saturating_sub(1));
        let _ = out.flush();
    }

    /// Append one line of server output to the body.
    pub fn write_line(&mut self, line: &str) {
        let mut out = io::stdout();
        let _ = write!(out, "{}", line);
        let _ = out.flush();
    }

    /// Restore the terminal to a normal full-screen scroll state.
    pub fn close(&mut self) {
        if !self.is_tty {
            return;
        }
        let mut out = io::stdout();
        let _ = write!(out, "\x1b[r\x1b[{};1H\n", self.rows);
        let _ = out.flush();
    }
}

fn pad_to(text: &str, width: usize) -> String {
    let mut padded = String::with_capacity(width);
    padded.push_str(text);
    while padded.len() < width {
        padded.push(' ');
    }
    padded
}

fn terminal_size() -> Option<(u16, u16)> {
    let mut size: libc::winsize = unsafe { mem::zeroed() };
    let rv = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut size) };
    if rv == 0 && size.ws_row > 0 && size.ws_col > 0 {
        Some((size.ws_row, size.ws_col))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn padding_fills_to_width() {
        let padded = pad_to("abc", 10);
        assert_eq!(padded.len(), 10);
        assert!(padded.starts_with("abc"));
    }

    #[test]
    fn padding_never_truncates() {
        assert_eq!(pad_to("abcdef", 3), "abcdef");
    }
}
