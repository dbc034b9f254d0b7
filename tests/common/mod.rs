// riffwav -- A WAV encoding and decoding library in Rust
// Copyright 2024 The riffwav Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![allow(dead_code)]

use std::io::Cursor;

use riffwav::{AudioConfig, Sample, Status, WavDecoder, WavEncoder};

/// Encodes `chunks` with one `write` call per chunk, returns the stream.
pub fn encode<S: Sample>(config: AudioConfig, chunks: &[&[S]]) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = WavEncoder::new(&mut buffer, config).unwrap();
    for chunk in chunks {
        assert_eq!(encoder.write(chunk).unwrap(), chunk.len());
    }
    encoder.close().unwrap();
    buffer.into_inner()
}

/// Decodes a whole stream in blocks of `block` samples.
///
/// Checks that every block but the last is full, and that the last one
/// reports the end of the stream.
pub fn decode_blocks<S: Sample>(bytes: Vec<u8>, block: usize) -> (AudioConfig, Vec<S>) {
    let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
    let config = decoder.config();
    let mut samples = Vec::new();
    let mut dst = vec![S::default(); block];
    loop {
        let (n, status) = decoder.read(&mut dst).unwrap();
        samples.extend_from_slice(&dst[..n]);
        match status {
            Status::Ready => assert_eq!(n, block),
            Status::EndOfStream => break,
        }
    }
    (config, samples)
}

/// Decodes a whole stream.
pub fn decode<S: Sample>(bytes: Vec<u8>) -> Vec<S> {
    decode_blocks(bytes, 256).1
}

/// Returns a path in the temporary directory that no other test uses.
pub fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("riffwav-{}-{}", std::process::id(), name))
}
