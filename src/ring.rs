//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// ring.rs - bounded FIFO of fetched strip records
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

use super::error::{Error, Result};
use super::MAX_STRIP_BYTES;

//
// One downloaded fragment, as it travels from a producer to a
// consumer. Records move by value; once a record is in the ring it
// has no ties to the worker that fetched it.
//
#[derive(Clone, Debug)]
pub struct StripRecord {
    pub sequence: u32,
    pub bytes: Vec<u8>,
}

impl StripRecord {
    pub fn new(sequence: u32, bytes: Vec<u8>) -> Result<StripRecord> {
        if bytes.len() > MAX_STRIP_BYTES {
            return Err(Error::General(format!(
                "strip {} is {} bytes, cap is {}",
                sequence,
                bytes.len(),
                MAX_STRIP_BYTES
            )));
        }
        Ok(StripRecord { sequence, bytes })
    }

    //
    // Placeholder for a fragment that could not be fetched. It flows
    // through the ring like any other record; downstream parsing fails
    // on the empty body and the raster slot stays zeroed.
    //
    pub fn empty(sequence: u32) -> StripRecord {
        StripRecord {
            sequence,
            bytes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

//
// Fixed-capacity FIFO. Plain data, no locking of its own: the
// pipeline serializes every touch through one mutex, and its condvars
// guarantee push is never called on a full ring. The asserts document
// that protocol.
//
pub struct StripRing {
    slots: Box<[Option<StripRecord>]>,
    capacity: usize,
    head: usize,
    tail: usize,
    count: usize,
}

impl StripRing {
    pub fn new(capacity: usize) -> StripRing {
        assert!(capacity > 0, "ring capacity must be nonzero");
        StripRing {
            slots: vec![None; capacity].into_boxed_slice(),
            capacity,
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    pub fn push(&mut self, record: StripRecord) {
        assert!(self.count < self.capacity, "push on full ring");
        self.slots[self.head] = Some(record);
        self.head = (self.head + 1) % self.capacity;
        self.count += 1;
    }

    pub fn pop(&mut self) -> Option<StripRecord> {
        if self.count == 0 {
            return None;
        }
        let record = self.slots[self.tail].take();
        self.tail = (self.tail + 1) % self.capacity;
        self.count -= 1;
        debug_assert!(record.is_some(), "occupied slot was empty");
        record
    }
}

#[cfg(test)]
mod tests {
    use super::{StripRecord, StripRing};

    fn record(sequence: u32) -> StripRecord {
        StripRecord::new(sequence, vec![sequence as u8; 4]).unwrap()
    }

    #[test]
    fn fifo_order() {
        let mut ring = StripRing::new(3);
        ring.push(record(0));
        ring.push(record(1));
        ring.push(record(2));

        assert_eq!(ring.pop().unwrap().sequence, 0);
        assert_eq!(ring.pop().unwrap().sequence, 1);
        assert_eq!(ring.pop().unwrap().sequence, 2);
        assert!(ring.pop().is_none());
    }

    #[test]
    fn wraps_around() {
        let mut ring = StripRing::new(2);
        for round in 0..5u32 {
            ring.push(record(2 * round));
            ring.push(record(2 * round + 1));
            assert!(ring.is_full());
            assert_eq!(ring.pop().unwrap().sequence, 2 * round);
            assert_eq!(ring.pop().unwrap().sequence, 2 * round + 1);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut ring = StripRing::new(1);
        assert!(ring.pop().is_none());
        ring.push(record(9));
        assert_eq!(ring.pop().unwrap().sequence, 9);
        assert!(ring.pop().is_none());
    }

    #[test]
    #[should_panic(expected = "push on full ring")]
    fn push_on_full_panics() {
        let mut ring = StripRing::new(1);
        ring.push(record(0));
        ring.push(record(1));
    }

    #[test]
    fn rejects_oversized_record() {
        assert!(StripRecord::new(0, vec![0u8; 10_001]).is_err());
        assert!(StripRecord::new(0, vec![0u8; 10_000]).is_ok());
    }
}
