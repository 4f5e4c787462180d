//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// chunk.rs - raw PNG chunk I/O and CRC-32
//
// Copyright (c) 2024 mtpaste contributors
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//

use std::io::Write;

use crc::crc32;
use crc::Hasher32;

use super::error::{Error, Result};
use super::utils::{read_be32, write_be32};

//
// https://www.w3.org/TR/PNG/#5PNG-file-signature
//
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a];

pub const CHUNK_LEN_SIZE: usize = 4;
pub const CHUNK_TYPE_SIZE: usize = 4;
pub const CHUNK_CRC_SIZE: usize = 4;

//
// CRC-32, IEEE polynomial, over `tag || data` as the chunk rules require.
// https://www.w3.org/TR/PNG/#5CRC-algorithm
//
pub fn chunk_crc(tag: &[u8], data: &[u8]) -> u32 {
    let mut digest = crc32::Digest::new(crc32::IEEE);
    digest.write(tag);
    digest.write(data);
    digest.sum32()
}

pub fn is_png_buffer(buf: &[u8]) -> bool {
    buf.len() >= PNG_SIGNATURE.len() && buf[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

//
// Emit the 8-byte signature that precedes the first chunk.
//
pub fn write_signature<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(&PNG_SIGNATURE)?;
    Ok(())
}

//
// Emit one chunk: big-endian length, four tag bytes, payload, then the
// CRC over `tag || data` computed at emit time.
//
pub fn write_chunk<W: Write>(w: &mut W, tag: &[u8; 4], data: &[u8]) -> Result<()> {
    if data.len() > u32::MAX as usize {
        return Err(Error::WrongChunk(
            "chunk data exceeds the u32 length field".to_string(),
        ));
    }
    write_be32(w, data.len() as u32)?;
    w.write_all(tag)?;
    w.write_all(data)?;
    write_be32(w, chunk_crc(tag, data))?;
    Ok(())
}

//
// One chunk as it sits on the wire: big-endian length, four ASCII
// type bytes, payload, big-endian CRC. The payload is copied out of
// the source buffer, so the chunk owns its bytes and the source can
// be dropped after parsing.
//
pub struct RawChunk {
    pub tag: [u8; 4],
    pub data: Vec<u8>,
    pub crc: u32,
}

impl RawChunk {
    pub fn new(tag: &[u8; 4], data: Vec<u8>) -> RawChunk {
        let crc = chunk_crc(tag, &data);
        RawChunk {
            tag: *tag,
            data,
            crc,
        }
    }

    pub fn load(buf: &[u8], offset: usize) -> Result<RawChunk> {
        if offset + CHUNK_LEN_SIZE + CHUNK_TYPE_SIZE > buf.len() {
            return Err(Error::WrongChunk(
                "buffer too small for chunk header".to_string(),
            ));
        }

        let length = read_be32(&buf[offset..]) as usize;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&buf[offset + CHUNK_LEN_SIZE..offset + CHUNK_LEN_SIZE + CHUNK_TYPE_SIZE]);

        let data_start = offset + CHUNK_LEN_SIZE + CHUNK_TYPE_SIZE;
        if data_start + length + CHUNK_CRC_SIZE > buf.len() {
            return Err(Error::WrongChunk(
                "buffer too small for chunk data and CRC".to_string(),
            ));
        }

        let data = buf[data_start..data_start + length].to_vec();
        let crc = read_be32(&buf[data_start + length..]);

        Ok(RawChunk { tag, data, crc })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write_chunk(w, &self.tag, &self.data)
    }

    //
    // Total bytes this chunk occupied on the wire.
    //
    pub fn wire_len(&self) -> usize {
        CHUNK_LEN_SIZE + CHUNK_TYPE_SIZE + self.data.len() + CHUNK_CRC_SIZE
    }

    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    pub fn computed_crc(&self) -> u32 {
        chunk_crc(&self.tag, &self.data)
    }

    pub fn crc_matches(&self) -> bool {
        self.computed_crc() == self.crc
    }

    //
    // CRC mismatch as an error value, or None when the chunk is intact.
    // Callers decide whether the mismatch is fatal.
    //
    pub fn crc_fault(&self) -> Option<Error> {
        let computed = self.computed_crc();
        if computed == self.crc {
            None
        } else {
            Some(Error::CrcMismatch {
                tag: self.tag_str(),
                computed,
                stored: self.crc,
            })
        }
    }
}
