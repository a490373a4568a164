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

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use error::{Error, Result};

const SENTINEL: u32 = 0xDECA_FBAD;

/// sentinel + cmdnum + ack + data_len
pub const FRAME_HEADER_LEN: usize = 4 + 4 + 1 + 4;

/// Hard payload bound. A frame announcing more than this is a protocol
/// violation, not a large message.
pub const MAX_PAYLOAD: usize = 32 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub cmdnum: u32,
    pub ack: bool,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(cmdnum: u32, data: Vec<u8>) -> Frame {
        Frame {
            cmdnum: cmdnum,
            ack: false,
            data: data,
        }
    }

    pub fn ack(cmdnum: u32, data: Vec<u8>) -> Frame {
        Frame {
            cmdnum: cmdnum,
            ack: true,
            data: data,
        }
    }

    /// Append the encoded frame to `buf`. Fails if the payload exceeds
    /// the protocol bound.
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        if self.data.len() > MAX_PAYLOAD {
            return Err(Error::OversizedPayload(self.data.len()));
        }
        buf.write_u32::<LittleEndian>(SENTINEL)?;
        buf.write_u32::<LittleEndian>(self.cmdnum)?;
        buf.write_u8(if self.ack { 1 } else { 0 })?;
        buf.write_u32::<LittleEndian>(self.data.len() as u32)?;
        buf.extend_from_slice(&self.data);
        Ok(())
    }

    /// Decode one frame from the front of `buf`. Returns the frame and
    /// the number of bytes consumed, or `None` when `buf` holds less
    /// than a complete frame.
    pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
        if buf.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }
        let mut cur = Cursor::new(buf);
        let sentinel = cur.read_u32::<LittleEndian>()?;
        if sentinel != SENTINEL {
            return Err(Error::BadSentinel(sentinel));
        }
        let cmdnum = cur.read_u32::<LittleEndian>()?;
        let ack = cur.read_u8()? != 0;
        let data_len = cur.read_u32::<LittleEndian>()? as usize;
        if data_len > MAX_PAYLOAD {
            return Err(Error::OversizedPayload(data_len));
        }
        if buf.len() < FRAME_HEADER_LEN + data_len {
            return Ok(None);
        }
        let data = buf[FRAME_HEADER_LEN..FRAME_HEADER_LEN + data_len].to_vec();
        Ok(Some((
            Frame {
                cmdnum: cmdnum,
                ack: ack,
                data: data,
            },
            FRAME_HEADER_LEN + data_len,
        )))
    }
}

/// Reassembles frames from the byte stream a nonblocking pipe hands
/// us. Feed it whatever `read` returned; pop complete frames out.
#[derive(Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> FrameReader {
        FrameReader { buf: Vec::new() }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match Frame::decode(&self.buf) {
            Ok(Some((frame, consumed))) => {
                self.buf.drain(..consumed);
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // The stream is unrecoverable once framing is lost.
                warn!("Dropping {} undecodable buffered bytes", self.buf.len());
                self.buf.clear();
                Err(e)
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_header_is_incomplete() {
        assert_eq!(Frame::decode(&[0xAD, 0xFB]).unwrap(), None);
    }

    #[test]
    fn bad_sentinel_is_rejected() {
        let mut buf = Vec::new();
        Frame::new(7, vec![1, 2, 3]).encode(&mut buf).unwrap();
        buf[0] = 0x00;
        assert!(Frame::decode(&buf).is_err());
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut buf = Vec::new();
        Frame::new(7, vec![]).encode(&mut buf).unwrap();
        // Announce an absurd payload length.
        let len = (MAX_PAYLOAD as u32) + 1;
        buf[9] = (len & 0xFF) as u8;
        buf[10] = ((len >> 8) & 0xFF) as u8;
        buf[11] = ((len >> 16) & 0xFF) as u8;
        buf[12] = ((len >> 24) & 0xFF) as u8;
        assert!(Frame::decode(&buf).is_err());
    }

    #[test]
    fn oversized_payload_will_not_encode() {
        let frame = Frame::new(7, vec![0; MAX_PAYLOAD + 1]);
        assert!(frame.encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn reader_reassembles_split_frames() {
        let mut buf = Vec::new();
        Frame::new(3, vec![9; 10]).encode(&mut buf).unwrap();
        Frame::ack(3, vec![]).encode(&mut buf).unwrap();

        let mut reader = FrameReader::new();
        let (first, rest) = buf.split_at(5);
        reader.extend(first);
        assert!(reader.next_frame().unwrap().is_none());
        reader.extend(rest);

        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.cmdnum, 3);
        assert!(!frame.ack);
        assert_eq!(frame.data.len(), 10);

        let frame = reader.next_frame().unwrap().unwrap();
        assert!(frame.ack);
        assert_eq!(reader.pending(), 0);
    }
}
