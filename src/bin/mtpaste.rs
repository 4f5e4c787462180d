//
// mtpaste - a multithreaded parallel PNG strip fetcher in Rust
// mtpaste.rs - CLI utility and Rust API example
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

use std::sync::Arc;

// CLI options
use clap::{Arg, ArgMatches, Command};

use rayon::ThreadPoolBuilder;

// For timing!
use time::OffsetDateTime;

// Hey that's us!
use mtpaste::error::Error;
use mtpaste::{HttpSource, Options, Pipeline, FRAGMENT_COUNT};

const OUTPUT_FILE: &str = "all.png";

fn arg_value(args: &ArgMatches, name: &str) -> Result<u64, Error> {
    // All five arguments are required positionals, so unwrap is safe.
    let s = args.value_of(name).unwrap();
    s.parse::<u64>()
        .map_err(|_e| Error::General(format!("invalid {}: {}", name, s)))
}

fn doit(args: ArgMatches) -> Result<(), Error> {
    let buffer_size = arg_value(&args, "buffer-size")?;
    let producers = arg_value(&args, "producers")?;
    let consumers = arg_value(&args, "consumers")?;
    let delay = arg_value(&args, "delay")?;
    let image = arg_value(&args, "image")?;

    let mut options = Options::new();
    options.set_buffer_size(buffer_size as usize)?;
    options.set_producers(producers as usize)?;
    options.set_consumers(consumers as usize)?;
    options.set_consumer_delay(delay)?;
    options.set_image(image as u32)?;

    // One worker per thread: producers and consumers both block, on
    // the ring and on the network, so they cannot share threads.
    let pool = ThreadPoolBuilder::new()
        .num_threads((producers + consumers) as usize)
        .build()
        .map_err(|e| Error::General(e.to_string()))?;
    options.set_thread_pool(&pool)?;

    println!("Configuration:");
    println!("  Buffer size: {}", buffer_size);
    println!("  Producers: {}", producers);
    println!("  Consumers: {}", consumers);
    println!("  Consumer delay: {} ms", delay);
    println!("  Image number: {}", image);
    println!();

    println!("Fetching {} fragments of image {}...", FRAGMENT_COUNT, image);
    let mut pipeline = Pipeline::new(&options);

    let start_time = OffsetDateTime::now_utc();
    pipeline.run(Arc::new(HttpSource::new()))?;

    println!("Assembling final PNG...");
    let png = pipeline.assemble()?;

    println!("Saving result to {}...", OUTPUT_FILE);
    png.write_file(OUTPUT_FILE)?;
    let delta = OffsetDateTime::now_utc() - start_time;

    println!();
    println!(
        "mtpaste execution time: {:.2} seconds",
        delta.as_seconds_f64()
    );

    Ok(())
}

pub fn main() {
    let matches = Command::new("mtpaste parallel PNG strip fetcher")
        .version("0.1.0")
        .about("Fetches a sharded PNG from the fragment endpoint with parallel \
                downloaders and decompressors, then writes the assembled image.")
        .arg(Arg::new("buffer-size")
            .help("Ring buffer capacity, in strips (1-50).")
            .required(true)
            .index(1))
        .arg(Arg::new("producers")
            .help("Number of downloader workers (1-20).")
            .required(true)
            .index(2))
        .arg(Arg::new("consumers")
            .help("Number of decompressor workers (1-20).")
            .required(true)
            .index(3))
        .arg(Arg::new("delay")
            .help("Per-strip consumer delay in milliseconds (0-1000).")
            .required(true)
            .index(4))
        .arg(Arg::new("image")
            .help("Image number to fetch (1-3).")
            .required(true)
            .index(5))
        .get_matches();

    match doit(matches) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
