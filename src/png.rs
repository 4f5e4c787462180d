//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// png.rs - three-chunk PNG parser and builder
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

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use super::chunk::{is_png_buffer, write_chunk, write_signature, RawChunk, PNG_SIGNATURE};
use super::error::{Error, Result};
use super::utils::read_be32;
use super::zdata;
use super::{ColorType, Header};

pub const IHDR_PAYLOAD_SIZE: usize = 13;

//
// A PNG in the only shape the strip pipeline deals in: exactly
// IHDR | IDAT | IEND, a single IDAT, no filter or interlace handling.
//
// crc_faults carries any CRC mismatches seen while parsing. They are
// deliberately non-fatal: a corrupt strip becomes image noise rather
// than halting assembly. Callers that want strictness can check the
// list themselves.
//
pub struct SimplePng {
    pub header: Header,
    pub idat: Vec<u8>,
    pub crc_faults: Vec<Error>,
}

impl SimplePng {
    pub fn new(width: u32, height: u32, bit_depth: u8, color_type: ColorType) -> SimplePng {
        SimplePng {
            header: Header::new(width, height, bit_depth, color_type),
            idat: Vec::new(),
            crc_faults: Vec::new(),
        }
    }

    pub fn parse(buf: &[u8]) -> Result<SimplePng> {
        if !is_png_buffer(buf) {
            return Err(Error::NotPng);
        }

        let mut offset = PNG_SIGNATURE.len();
        let mut crc_faults = Vec::new();

        let ihdr = expect_chunk(buf, &mut offset, b"IHDR", &mut crc_faults)?;
        if ihdr.data.len() != IHDR_PAYLOAD_SIZE {
            return Err(Error::WrongChunk(format!(
                "IHDR payload must be {} bytes, got {}",
                IHDR_PAYLOAD_SIZE,
                ihdr.data.len()
            )));
        }
        let idat = expect_chunk(buf, &mut offset, b"IDAT", &mut crc_faults)?;
        expect_chunk(buf, &mut offset, b"IEND", &mut crc_faults)?;

        let header = Header {
            width: read_be32(&ihdr.data[0..]),
            height: read_be32(&ihdr.data[4..]),
            bit_depth: ihdr.data[8],
            color_type: ihdr.data[9],
            compression: ihdr.data[10],
            filter: ihdr.data[11],
            interlace: ihdr.data[12],
        };

        Ok(SimplePng {
            header,
            idat: idat.data,
            crc_faults,
        })
    }

    //
    // Structural sanity only; CRCs and payload consistency are not
    // re-checked here.
    //
    pub fn validate(&self) -> bool {
        self.header.validate()
    }

    //
    // Serialize as `signature || IHDR || IDAT || IEND`, CRCs computed
    // at emit time. Returns the sink for further use.
    //
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<W> {
        write_signature(&mut w)?;
        write_chunk(&mut w, b"IHDR", &self.header.payload())?;
        write_chunk(&mut w, b"IDAT", &self.idat)?;
        write_chunk(&mut w, b"IEND", b"")?;
        w.flush()?;
        Ok(w)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)?;
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<SimplePng> {
        let mut buf = Vec::new();
        File::open(path)?.read_to_end(&mut buf)?;
        SimplePng::parse(&buf)
    }

    //
    // Inflate the IDAT back into raster rows, one filter byte plus
    // stride bytes per row, sized from the header.
    //
    pub fn raw_data(&self) -> Result<Vec<u8>> {
        let expected = self.header.height as usize * (self.header.stride() + 1);
        let mut out = vec![0u8; expected];
        let n = zdata::inflate_into(&mut out, &self.idat)?;
        out.truncate(n);
        Ok(out)
    }

    //
    // Deflate raster rows into the IDAT, replacing whatever was there.
    //
    pub fn set_raw_data(&mut self, data: &[u8], level: u8) -> Result<()> {
        self.idat = zdata::deflate_vec(data, level)?;
        Ok(())
    }
}

fn expect_chunk(
    buf: &[u8],
    offset: &mut usize,
    tag: &[u8; 4],
    faults: &mut Vec<Error>,
) -> Result<RawChunk> {
    let chunk = RawChunk::load(buf, *offset)?;
    if &chunk.tag != tag {
        return Err(Error::WrongChunk(format!(
            "expected {}, got {}",
            String::from_utf8_lossy(tag),
            chunk.tag_str()
        )));
    }
    if let Some(fault) = chunk.crc_fault() {
        faults.push(fault);
    }
    *offset += chunk.wire_len();
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::super::chunk::{write_chunk, write_signature};
    use super::super::error::Error;
    use super::super::ColorType;
    use super::SimplePng;

    fn rgba_png(width: u32, height: u32, raster: &[u8]) -> Vec<u8> {
        let mut png = SimplePng::new(width, height, 8, ColorType::TruecolorAlpha);
        png.set_raw_data(raster, 6).unwrap();
        png.write_to(Vec::new()).unwrap()
    }

    #[test]
    fn round_trips_a_full_size_raster() {
        // 400x300 RGBA plus a filter byte per row.
        let mut raster = vec![0u8; 300 * (400 * 4 + 1)];
        rand::thread_rng().fill_bytes(&mut raster);

        let bytes = rgba_png(400, 300, &raster);
        let png = SimplePng::parse(&bytes).unwrap();

        assert_eq!(png.header.width, 400);
        assert_eq!(png.header.height, 300);
        assert_eq!(png.header.bit_depth, 8);
        assert_eq!(png.header.color_type, 6);
        assert!(png.validate());
        assert!(png.crc_faults.is_empty());
        assert_eq!(png.raw_data().unwrap(), raster);
    }

    #[test]
    fn zero_width_fails_validation() {
        let raster = vec![0u8; 4 * (1 * 4 + 1)];
        let bytes = rgba_png(0, 4, &raster);
        let png = SimplePng::parse(&bytes).unwrap();
        assert!(!png.validate());
    }

    #[test]
    fn bogus_color_type_fails_validation() {
        let mut png = SimplePng::new(8, 8, 8, ColorType::TruecolorAlpha);
        png.header.color_type = 5;
        assert!(!png.validate());
    }

    #[test]
    fn flipped_idat_bit_is_nonfatal() {
        let raster = vec![9u8; 2 * (2 * 4 + 1)];
        let mut bytes = rgba_png(2, 2, &raster);

        // First byte of the IDAT payload sits after the signature (8),
        // the IHDR chunk (12 + 13) and the IDAT length + tag (8).
        let idat_payload = 8 + 25 + 8;
        bytes[idat_payload] ^= 0x01;

        let png = SimplePng::parse(&bytes).unwrap();
        assert_eq!(png.crc_faults.len(), 1);
        assert!(matches!(png.crc_faults[0], Error::CrcMismatch { .. }));
        // The payload is damaged, so a later inflate is allowed to fail;
        // the point is that parsing did not abort.
        let _ = png.raw_data();
    }

    #[test]
    fn rejects_wrong_chunk_order() {
        let mut bytes = Vec::new();
        write_signature(&mut bytes).unwrap();
        write_chunk(&mut bytes, b"IDAT", b"xx").unwrap();

        match SimplePng::parse(&bytes) {
            Err(Error::WrongChunk(_)) => {}
            other => panic!("expected WrongChunk, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_missing_signature() {
        assert!(matches!(
            SimplePng::parse(b"this is not a png at all"),
            Err(Error::NotPng)
        ));
    }

    #[test]
    fn rejects_oversize_ihdr() {
        let mut bytes = Vec::new();
        write_signature(&mut bytes).unwrap();
        write_chunk(&mut bytes, b"IHDR", &[0u8; 14]).unwrap();
        assert!(matches!(
            SimplePng::parse(&bytes),
            Err(Error::WrongChunk(_))
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = std::env::temp_dir().join("mtpaste-png-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tiny.png");

        let raster = vec![3u8; 3 * (4 * 4 + 1)];
        let mut png = SimplePng::new(4, 3, 8, ColorType::TruecolorAlpha);
        png.set_raw_data(&raster, 6).unwrap();
        png.write_file(&path).unwrap();

        let loaded = SimplePng::load_file(&path).unwrap();
        assert_eq!(loaded.header, png.header);
        assert_eq!(loaded.raw_data().unwrap(), raster);

        std::fs::remove_file(&path).ok();
    }
}
