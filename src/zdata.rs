//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// zdata.rs - single-shot in-memory inflate and deflate
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

use std::cmp;

use miniz_oxide::deflate::core::{
    compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush, TDEFLStatus,
};
use miniz_oxide::inflate::stream::{inflate, InflateState};
use miniz_oxide::{DataFormat, MZError, MZFlush, MZStatus};

use super::error::{Error, Result};

// Output is stepped through the codecs in pieces of this size.
pub const ZLIB_CHUNK: usize = 16 * 1024;

// zlib's default compression level.
pub const DEFAULT_LEVEL: u8 = 6;

//
// Decode a complete zlib stream into the caller's buffer, returning
// the number of bytes produced. The caller sizes the buffer; output
// that would overrun it is an error, not a truncation.
//
pub fn inflate_into(dst: &mut [u8], src: &[u8]) -> Result<usize> {
    let mut state = InflateState::new_boxed(DataFormat::Zlib);
    let mut in_pos = 0;
    let mut out_pos = 0;

    loop {
        let out_end = cmp::min(out_pos + ZLIB_CHUNK, dst.len());
        let res = inflate(
            &mut state,
            &src[in_pos..],
            &mut dst[out_pos..out_end],
            MZFlush::None,
        );
        in_pos += res.bytes_consumed;
        out_pos += res.bytes_written;

        match res.status {
            Ok(MZStatus::StreamEnd) => return Ok(out_pos),
            Ok(MZStatus::Ok) => {
                if out_pos == dst.len() {
                    return Err(Error::General(
                        "inflated data exceeds destination buffer".to_string(),
                    ));
                }
            }
            // A preset dictionary never appears in these streams.
            Ok(MZStatus::NeedDict) | Err(MZError::Data) => {
                return Err(Error::General(
                    "invalid or incomplete deflate data".to_string(),
                ))
            }
            Err(MZError::Mem) => return Err(Error::Memory("inflate")),
            Err(MZError::Buf) => {
                return Err(Error::General("no progress possible in inflate".to_string()))
            }
            Err(e) => return Err(Error::General(format!("inflate returned {:?}", e))),
        }
    }
}

//
// Compress the whole source in one Finish-terminated pass, producing a
// complete zlib stream shrunk to the bytes actually emitted.
//
pub fn deflate_vec(src: &[u8], level: u8) -> Result<Vec<u8>> {
    let flags = create_comp_flags_from_zip_params(level as i32, 15, 0);
    let mut compressor = CompressorOxide::new(flags);
    let mut output = vec![0; cmp::max(src.len() / 2, ZLIB_CHUNK)];

    let mut in_pos = 0;
    let mut out_pos = 0;
    loop {
        let (status, bytes_in, bytes_out) = compress(
            &mut compressor,
            &src[in_pos..],
            &mut output[out_pos..],
            TDEFLFlush::Finish,
        );
        out_pos += bytes_out;
        in_pos += bytes_in;

        match status {
            TDEFLStatus::Done => {
                output.truncate(out_pos);
                return Ok(output);
            }
            TDEFLStatus::Okay => {
                // More output pending; grow and go around again.
                if output.len().saturating_sub(out_pos) < 30 {
                    output.resize(output.len() * 2, 0);
                }
            }
            _ => return Err(Error::General("deflate failed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::RngCore;

    use super::{deflate_vec, inflate_into, DEFAULT_LEVEL};

    #[test]
    fn round_trip_constant_bytes() {
        let raster = vec![0x2au8; 9606];
        let stream = deflate_vec(&raster, DEFAULT_LEVEL).unwrap();
        assert!(stream.len() < raster.len());

        let mut out = vec![0u8; raster.len()];
        let n = inflate_into(&mut out, &stream).unwrap();
        assert_eq!(n, raster.len());
        assert_eq!(out, raster);
    }

    #[test]
    fn round_trip_random_bytes() {
        let mut raster = vec![0u8; 48 * 1024];
        rand::thread_rng().fill_bytes(&mut raster);
        let stream = deflate_vec(&raster, DEFAULT_LEVEL).unwrap();

        let mut out = vec![0u8; raster.len()];
        let n = inflate_into(&mut out, &stream).unwrap();
        assert_eq!(n, raster.len());
        assert_eq!(out, raster);
    }

    #[test]
    fn produces_valid_zlib_stream() {
        let data = b"strip strip strip strip strip".repeat(40);
        let stream = deflate_vec(&data, DEFAULT_LEVEL).unwrap();
        let decoded = miniz_oxide::inflate::decompress_to_vec_zlib(&stream).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn oversized_output_is_an_error() {
        let raster = vec![7u8; 4096];
        let stream = deflate_vec(&raster, DEFAULT_LEVEL).unwrap();

        let mut out = vec![0u8; raster.len() - 1];
        assert!(inflate_into(&mut out, &stream).is_err());
    }

    #[test]
    fn garbage_input_is_a_data_error() {
        let mut out = vec![0u8; 64];
        assert!(inflate_into(&mut out, b"definitely not zlib").is_err());
    }
}
