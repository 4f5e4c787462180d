//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
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

pub mod chunk;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod png;
pub mod ring;
pub mod utils;
pub mod zdata;

use error::{Error, Result};

//
// The remote image is sharded into this many horizontal strips,
// each served as a standalone three-chunk PNG.
//
pub const FRAGMENT_COUNT: u32 = 50;

// Largest strip the fragment endpoint will ever serve.
pub const MAX_STRIP_BYTES: usize = 10_000;

// Strip geometry: six rows of 400 RGBA pixels, one filter byte per row.
pub const STRIP_WIDTH: u32 = 400;
pub const STRIP_ROWS: u32 = 6;
pub const STRIP_INF_SIZE: usize = (STRIP_ROWS as usize) * (STRIP_WIDTH as usize * 4 + 1);

// Size of the flat raster region all inflated strips land in.
pub const ARENA_SIZE: usize = FRAGMENT_COUNT as usize * STRIP_INF_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorType {
    Greyscale = 0,
    Truecolor = 2,
    IndexedColor = 3,
    GreyscaleAlpha = 4,
    TruecolorAlpha = 6,
}

impl ColorType {
    pub fn from_u8(val: u8) -> Result<ColorType> {
        match val {
            0 => Ok(ColorType::Greyscale),
            2 => Ok(ColorType::Truecolor),
            3 => Ok(ColorType::IndexedColor),
            4 => Ok(ColorType::GreyscaleAlpha),
            6 => Ok(ColorType::TruecolorAlpha),
            _ => Err(Error::General(format!("invalid color type value {}", val))),
        }
    }
}

//
// IHDR payload as a domain object. Fields are stored raw so that a
// strip carrying a bogus color type still parses; validate() is the
// place that passes judgement.
//
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
    pub compression: u8,
    pub filter: u8,
    pub interlace: u8,
}

impl Header {
    pub fn new(width: u32, height: u32, bit_depth: u8, color_type: ColorType) -> Header {
        Header {
            width,
            height,
            bit_depth,
            color_type: color_type as u8,
            compression: 0,
            filter: 0,
            interlace: 0,
        }
    }

    pub fn validate(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        match self.bit_depth {
            1 | 2 | 4 | 8 | 16 => {}
            _ => return false,
        }
        ColorType::from_u8(self.color_type).is_ok()
    }

    //
    // The 13-byte IHDR payload in wire order.
    //
    pub fn payload(&self) -> [u8; 13] {
        let mut data = [0u8; 13];
        data[0..4].copy_from_slice(&self.width.to_be_bytes());
        data[4..8].copy_from_slice(&self.height.to_be_bytes());
        data[8] = self.bit_depth;
        data[9] = self.color_type;
        data[10] = self.compression;
        data[11] = self.filter;
        data[12] = self.interlace;
        data
    }

    pub fn bytes_per_pixel(&self) -> usize {
        (match self.color_type {
            2 => 3,
            4 => 2,
            6 => 4,
            _ => 1,
        }) * if self.bit_depth > 8 { 2 } else { 1 }
    }

    //
    // Bytes per raster row, not counting the leading filter byte.
    //
    pub fn stride(&self) -> usize {
        self.bytes_per_pixel() * self.width as usize
    }
}

pub use error::Error as StripError;
pub use fetch::{Fragment, FragmentSource, HttpSource};
pub use pipeline::{Options, Pipeline};
pub use png::SimplePng;
