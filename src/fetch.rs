//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// fetch.rs - fragment endpoint client
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

use std::io::Read;

use super::error::{Error, Result};
use super::MAX_STRIP_BYTES;

pub const ENDPOINT: &str = "http://ece252-1.uwaterloo.ca:2530/image";

// Response header carrying the authoritative strip index.
pub const FRAGMENT_HEADER: &str = "X-Ece252-Fragment";

//
// One fetched fragment. The sequence is whatever the server
// advertised; absent or unparseable headers come back as None and the
// caller decides what to do about the mismatch.
//
pub struct Fragment {
    pub sequence: Option<u32>,
    pub bytes: Vec<u8>,
}

//
// Where fragments come from. The pipeline only ever talks to this
// trait, so tests can swap in a canned source; implementations must
// tolerate concurrent calls from many workers.
//
pub trait FragmentSource: Send + Sync {
    fn fetch(&self, image: u32, part: u32) -> Result<Fragment>;
}

pub struct HttpSource {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new() -> HttpSource {
        HttpSource::with_endpoint(ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> HttpSource {
        HttpSource {
            endpoint: endpoint.to_string(),
            agent: ureq::AgentBuilder::new().user_agent("mtpaste/1.0").build(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> HttpSource {
        HttpSource::new()
    }
}

impl FragmentSource for HttpSource {
    fn fetch(&self, image: u32, part: u32) -> Result<Fragment> {
        let url = format!("{}?img={}&part={}", self.endpoint, image, part);

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::Network(e.to_string()))?;

        let sequence = response
            .header(FRAGMENT_HEADER)
            .and_then(|v| v.trim().parse::<u32>().ok());

        // Read one byte past the cap so an oversized body is
        // distinguishable from one that just fits.
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_STRIP_BYTES as u64 + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() > MAX_STRIP_BYTES {
            return Err(Error::Network(format!(
                "fragment {} exceeds {} bytes",
                part, MAX_STRIP_BYTES
            )));
        }

        Ok(Fragment { sequence, bytes })
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::{Fragment, FragmentSource, HttpSource};

    //
    // One-shot HTTP server speaking just enough protocol for a
    // single fragment response.
    //
    fn serve_once(status: &'static str, headers: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 2048];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
                status,
                body.len(),
                headers
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn scrapes_sequence_header() {
        let endpoint = serve_once("200 OK", "X-Ece252-Fragment: 7\r\n", b"strip bytes");
        let source = HttpSource::with_endpoint(&endpoint);

        let Fragment { sequence, bytes } = source.fetch(1, 7).unwrap();
        assert_eq!(sequence, Some(7));
        assert_eq!(bytes, b"strip bytes");
    }

    #[test]
    fn missing_header_yields_no_sequence() {
        let endpoint = serve_once("200 OK", "", b"strip bytes");
        let source = HttpSource::with_endpoint(&endpoint);

        let fragment = source.fetch(1, 3).unwrap();
        assert_eq!(fragment.sequence, None);
    }

    #[test]
    fn server_error_is_a_network_error() {
        let endpoint = serve_once("500 Internal Server Error", "", b"");
        let source = HttpSource::with_endpoint(&endpoint);
        assert!(source.fetch(1, 0).is_err());
    }

    #[test]
    fn unreachable_endpoint_is_a_network_error() {
        // Port 1 on loopback; nothing listens there.
        let source = HttpSource::with_endpoint("http://127.0.0.1:1");
        assert!(source.fetch(1, 0).is_err());
    }
}
