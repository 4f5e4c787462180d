//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// pipeline.rs - producers, consumers, and the shared coordination state
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

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::error::{Error, Result};
use super::fetch::FragmentSource;
use super::png::SimplePng;
use super::ring::{StripRecord, StripRing};
use super::zdata;
use super::{ColorType, ARENA_SIZE, FRAGMENT_COUNT, STRIP_INF_SIZE, STRIP_ROWS, STRIP_WIDTH};

#[derive(Copy, Clone)]
pub struct Options<'a> {
    buffer_size: usize,
    producers: usize,
    consumers: usize,
    consumer_delay: u64,
    image: u32,
    thread_pool: Option<&'a ThreadPool>,
}

impl<'a> Options<'a> {
    // Use default options
    pub fn new() -> Options<'a> {
        Options {
            buffer_size: 10,
            producers: 1,
            consumers: 1,
            consumer_delay: 0,
            image: 1,

            //
            // Build a dedicated pool sized to the worker count.
            //
            thread_pool: None,
        }
    }

    //
    // A supplied pool must have at least producers + consumers threads;
    // the workers block on the ring and on network I/O, so a smaller
    // pool can park every consumer behind the producers and stall.
    //
    pub fn set_thread_pool(&mut self, thread_pool: &'a ThreadPool) -> Result<()> {
        self.thread_pool = Some(thread_pool);
        Ok(())
    }

    pub fn set_buffer_size(&mut self, buffer_size: usize) -> Result<()> {
        if !(1..=50).contains(&buffer_size) {
            return Err(Error::General(
                "buffer size must be between 1 and 50".to_string(),
            ));
        }
        self.buffer_size = buffer_size;
        Ok(())
    }

    pub fn set_producers(&mut self, producers: usize) -> Result<()> {
        if !(1..=20).contains(&producers) {
            return Err(Error::General(
                "number of producers must be between 1 and 20".to_string(),
            ));
        }
        self.producers = producers;
        Ok(())
    }

    pub fn set_consumers(&mut self, consumers: usize) -> Result<()> {
        if !(1..=20).contains(&consumers) {
            return Err(Error::General(
                "number of consumers must be between 1 and 20".to_string(),
            ));
        }
        self.consumers = consumers;
        Ok(())
    }

    pub fn set_consumer_delay(&mut self, delay_ms: u64) -> Result<()> {
        if delay_ms > 1000 {
            return Err(Error::General(
                "consumer delay must be between 0 and 1000 ms".to_string(),
            ));
        }
        self.consumer_delay = delay_ms;
        Ok(())
    }

    pub fn set_image(&mut self, image: u32) -> Result<()> {
        if !(1..=3).contains(&image) {
            return Err(Error::General(
                "image number must be between 1 and 3".to_string(),
            ));
        }
        self.image = image;
        Ok(())
    }
}

impl<'a> Default for Options<'a> {
    fn default() -> Options<'a> {
        Options::new()
    }
}

//
// The ring plus every coordination counter, all guarded by one mutex.
// The two condvars stand in for the classic empty/filled counting
// semaphores: `space` wakes producers waiting for a free slot,
// `filled` wakes consumers waiting for a record.
//
// Invariants, all under the mutex: next_sequence == produced <= total,
// consumed <= produced, and on a completed run
// consumed == produced == total.
//
struct Depot {
    state: Mutex<DepotState>,
    space: Condvar,
    filled: Condvar,
}

struct DepotState {
    ring: StripRing,
    total: u32,
    produced: u32,
    consumed: u32,
    next_sequence: u32,
}

impl Depot {
    fn new(capacity: usize, total: u32) -> Depot {
        Depot {
            state: Mutex::new(DepotState {
                ring: StripRing::new(capacity),
                total,
                produced: 0,
                consumed: 0,
                next_sequence: 0,
            }),
            space: Condvar::new(),
            filled: Condvar::new(),
        }
    }

    //
    // Hand out the next sequence to fetch, or None once every
    // fragment has been claimed. Sequences go out in increasing order;
    // nothing says they come back in that order.
    //
    fn claim(&self) -> Option<u32> {
        let mut state = self.state.lock().unwrap();
        if state.produced >= state.total {
            return None;
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.produced += 1;
        Some(sequence)
    }

    // Blocks while the ring is full.
    fn push(&self, record: StripRecord) {
        let mut state = self.state.lock().unwrap();
        while state.ring.is_full() {
            state = self.space.wait(state).unwrap();
        }
        state.ring.push(record);
        self.filled.notify_one();
    }

    //
    // Blocks while the ring is empty and strips are still owed;
    // returns None once every fragment has been consumed. Coupling the
    // emptiness check with the termination check under one lock is
    // what keeps a late consumer from parking forever.
    //
    fn pop(&self) -> Option<StripRecord> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(record) = state.ring.pop() {
                self.space.notify_one();
                return Some(record);
            }
            if state.consumed >= state.total {
                return None;
            }
            state = self.filled.wait(state).unwrap();
        }
    }

    fn mark_consumed(&self) {
        let mut state = self.state.lock().unwrap();
        state.consumed += 1;
        debug_assert!(state.consumed <= state.produced);
        if state.consumed >= state.total {
            // Wake every consumer still parked in pop() so they can
            // observe completion and drain out.
            self.filled.notify_all();
        }
    }

    fn counters(&self) -> (u32, u32, u32) {
        let state = self.state.lock().unwrap();
        (state.produced, state.consumed, state.next_sequence)
    }
}

struct Shared {
    depot: Depot,
    arena: Mutex<Box<[u8]>>,
    image: u32,
    delay: Duration,
}

enum WorkerMessage {
    ProducerDone(usize),
    ConsumerDone(usize),
}

pub struct Pipeline<'a> {
    options: Options<'a>,
    shared: Arc<Shared>,
    elapsed: Option<Duration>,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: &Options<'a>) -> Pipeline<'a> {
        Pipeline {
            options: *options,
            shared: Arc::new(Shared {
                depot: Depot::new(options.buffer_size, FRAGMENT_COUNT),
                arena: Mutex::new(vec![0u8; ARENA_SIZE].into_boxed_slice()),
                image: options.image,
                delay: Duration::from_millis(options.consumer_delay),
            }),
            elapsed: None,
        }
    }

    //
    // Fetch and inflate every fragment. Blocks until all workers have
    // drained; the raster arena is fully populated on return.
    //
    pub fn run(&mut self, source: Arc<dyn FragmentSource>) -> Result<()> {
        let start = Instant::now();

        let producers = self.options.producers;
        let consumers = self.options.consumers;
        let total = producers + consumers;

        let owned_pool;
        let pool = match self.options.thread_pool {
            Some(pool) => pool,
            None => {
                owned_pool = ThreadPoolBuilder::new()
                    .num_threads(total)
                    .build()
                    .map_err(|e| Error::General(e.to_string()))?;
                &owned_pool
            }
        };

        let (tx, rx) = mpsc::channel();

        for id in 0..producers {
            let tx = tx.clone();
            let shared = Arc::clone(&self.shared);
            let source = Arc::clone(&source);
            pool.spawn(move || {
                producer_loop(id, &shared, source.as_ref());
                tx.send(WorkerMessage::ProducerDone(id)).ok();
            });
        }
        for id in 0..consumers {
            let tx = tx.clone();
            let shared = Arc::clone(&self.shared);
            pool.spawn(move || {
                consumer_loop(id, &shared);
                tx.send(WorkerMessage::ConsumerDone(id)).ok();
            });
        }
        drop(tx);

        let mut finished = 0;
        while finished < total {
            match rx.recv() {
                Ok(WorkerMessage::ProducerDone(_)) | Ok(WorkerMessage::ConsumerDone(_)) => {
                    finished += 1;
                }
                Err(_) => {
                    return Err(Error::General(
                        "worker exited without reporting completion".to_string(),
                    ));
                }
            }
        }

        self.elapsed = Some(start.elapsed());
        Ok(())
    }

    //
    // Deflate the whole arena into a single IDAT and wrap it in the
    // final image's header.
    //
    pub fn assemble(&self) -> Result<SimplePng> {
        let arena = self.shared.arena.lock().unwrap();
        let mut png = SimplePng::new(
            STRIP_WIDTH,
            STRIP_ROWS * FRAGMENT_COUNT,
            8,
            ColorType::TruecolorAlpha,
        );
        png.set_raw_data(&arena[..], zdata::DEFAULT_LEVEL)?;
        Ok(png)
    }

    pub fn produced(&self) -> u32 {
        self.shared.depot.counters().0
    }

    pub fn consumed(&self) -> u32 {
        self.shared.depot.counters().1
    }

    pub fn next_sequence(&self) -> u32 {
        self.shared.depot.counters().2
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    //
    // Copy of the raster arena, mostly for inspection in tests and
    // tooling; assembly itself goes through assemble().
    //
    pub fn raster(&self) -> Vec<u8> {
        self.shared.arena.lock().unwrap().to_vec()
    }
}

fn producer_loop(id: usize, shared: &Shared, source: &dyn FragmentSource) {
    while let Some(sequence) = shared.depot.claim() {
        let record = match source.fetch(shared.image, sequence) {
            Ok(fragment) => {
                if fragment.sequence != Some(sequence) {
                    eprintln!(
                        "producer {}: fragment {} advertised sequence {:?}",
                        id, sequence, fragment.sequence
                    );
                    StripRecord::empty(sequence)
                } else {
                    match StripRecord::new(sequence, fragment.bytes) {
                        Ok(record) => record,
                        Err(e) => {
                            eprintln!("producer {}: fragment {}: {}", id, sequence, e);
                            StripRecord::empty(sequence)
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("producer {}: failed to fetch fragment {}: {}", id, sequence, e);
                StripRecord::empty(sequence)
            }
        };

        // Every claim delivers exactly one record, fetched or empty,
        // so the consumed counter can always converge.
        shared.depot.push(record);
    }
}

fn consumer_loop(id: usize, shared: &Shared) {
    while let Some(record) = shared.depot.pop() {
        if !shared.delay.is_zero() {
            thread::sleep(shared.delay);
        }
        process_strip(id, &record, shared);

        // Counted even when processing failed: the slot stays zeroed
        // and assembly still converges.
        shared.depot.mark_consumed();
    }
}

fn process_strip(id: usize, record: &StripRecord, shared: &Shared) {
    let png = match SimplePng::parse(&record.bytes) {
        Ok(png) => png,
        Err(e) => {
            if !record.is_empty() {
                eprintln!(
                    "consumer {}: failed to parse strip {}: {}",
                    id, record.sequence, e
                );
            }
            return;
        }
    };
    for fault in &png.crc_faults {
        eprintln!("consumer {}: strip {}: {}", id, record.sequence, fault);
    }

    let mut strip = vec![0u8; STRIP_INF_SIZE];
    let produced = match zdata::inflate_into(&mut strip, &png.idat) {
        Ok(n) => n,
        Err(e) => {
            eprintln!(
                "consumer {}: inflate failed for strip {}: {}",
                id, record.sequence, e
            );
            return;
        }
    };

    let offset = record.sequence as usize * STRIP_INF_SIZE;
    let mut arena = shared.arena.lock().unwrap();
    if offset + STRIP_INF_SIZE <= arena.len() {
        arena[offset..offset + produced].copy_from_slice(&strip[..produced]);
    }
}
