// riffwav -- A WAV encoding and decoding library in Rust
// Copyright 2024 The riffwav Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use riffwav::{SampleFormat, Status, WavDecoder};

fuzz_target!(|data: &[u8]| {
    let cursor = Cursor::new(data);
    let mut decoder = match WavDecoder::new(cursor) {
        Ok(d) => d,
        Err(..) => return,
    };

    // Exercise the native path for the file's own encoding, and the
    // normalized path into f64.
    let mut block = [0.0_f64; 64];
    match decoder.format() {
        SampleFormat::Float32 => {
            for sample in decoder.samples::<f32>() {
                if sample.is_err() {
                    return;
                }
            }
        }
        _ => loop {
            match decoder.read(&mut block) {
                Ok((_, Status::Ready)) => {}
                Ok((_, Status::EndOfStream)) | Err(..) => return,
            }
        },
    }
});
