//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// error.rs - error kinds shared across the crate
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

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

//
// Messages are short human strings; nothing parses them.
//
// CrcMismatch is special: the chunk parsers treat it as a warning and
// still hand back the parsed structure, so a strip that picked up noise
// in transit shows up as image noise instead of halting assembly.
//
#[derive(Error, Debug)]
pub enum Error {
    #[error("not a PNG stream")]
    NotPng,

    #[error("{tag} chunk CRC mismatch: computed {computed:08x}, expected {stored:08x}")]
    CrcMismatch {
        tag: String,
        computed: u32,
        stored: u32,
    },

    #[error("wrong chunk: {0}")]
    WrongChunk(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("out of memory: {0}")]
    Memory(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    General(String),
}
