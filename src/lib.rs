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

//! riffwav, a streaming wav encoding and decoding library.
//!
//! The decoder reads RIFF/WAVE streams holding 8, 16, 24 or 32-bit integer
//! PCM, 32 or 64-bit IEEE float, A-law or µ-law samples. Samples can be
//! decoded into their native type without loss, or into any other type that
//! implements [`Sample`] via a normalized `f64`. The encoder always writes
//! 16-bit PCM, and patches the size fields of the header when it is closed.
//!
//! Examples
//! ========
//!
//! The following example renders a 440 Hz sine wave as normalized floats, and
//! stores it as a mono wav stream with a sample rate of 44.1 kHz.
//!
//! ```
//! use std::f64::consts::PI;
//! use std::io::Cursor;
//!
//! let config = riffwav::AudioConfig::new(44_100, 1).unwrap();
//! let mut buffer = Cursor::new(Vec::new());
//! let mut encoder = riffwav::WavEncoder::new(&mut buffer, config).unwrap();
//! let sine: Vec<f64> = (0..44_100)
//!     .map(|t| (t as f64 / 44_100.0 * 440.0 * 2.0 * PI).sin() * 0.5)
//!     .collect();
//! encoder.write(&sine).unwrap();
//! encoder.close().unwrap();
//! assert_eq!(buffer.get_ref().len(), 44 + 2 * 44_100);
//! ```
//!
//! The following example computes the root mean square (RMS) of a stream,
//! reading it in blocks of 1024 samples.
//!
//! ```
//! # use std::io::Cursor;
//! # let config = riffwav::AudioConfig::new(8_000, 2).unwrap();
//! # let mut buffer = Cursor::new(Vec::new());
//! # let mut encoder = riffwav::WavEncoder::new(&mut buffer, config).unwrap();
//! # encoder.write(&[0.25_f64; 4000]).unwrap();
//! # encoder.close().unwrap();
//! # buffer.set_position(0);
//! let mut decoder = riffwav::WavDecoder::new(buffer).unwrap();
//! let mut block = [0.0_f64; 1024];
//! let mut sqr_sum = 0.0;
//! let mut n = 0;
//! loop {
//!     let (produced, status) = decoder.read(&mut block).unwrap();
//!     sqr_sum += block[..produced].iter().map(|x| x * x).sum::<f64>();
//!     n += produced;
//!     if status == riffwav::Status::EndOfStream {
//!         break;
//!     }
//! }
//! println!("RMS is {}", (sqr_sum / n as f64).sqrt());
//! ```

#![warn(missing_docs)]

use std::io;

pub mod g711;
pub mod wav;

mod read;
mod registry;
mod sample;
mod write;

pub use read::{read_wave_header, Status, WavDecoder, WavIntoSamples, WavSamples};
pub use registry::{Decoder, Format, ReadSeek, Registry};
pub use sample::{
    convert, pcm16_from_normalized, pcm32_from_normalized, pcm8_from_normalized, ALaw, MuLaw,
    RawSample, Sample, SampleFormat, SamplesMut,
};
pub use write::WavEncoder;

/// The name under which [`register`] makes this codec known.
pub const FORMAT_NAME: &str = "wav";

/// The magic bytes that every wav stream starts with.
pub const MAGIC: &[u8] = b"RIFF";

/// The error type for operations on `WavDecoder`, `WavEncoder` and `Registry`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An IO error occurred in the underlying reader or writer.
    #[error(transparent)]
    Io(io::Error),
    /// Ill-formed WAVE data was encountered.
    ///
    /// A stream that ends in the middle of a header or a sample is reported
    /// as malformed rather than as an IO error.
    #[error("ill-formed WAVE stream: {0}")]
    Malformed(&'static str),
    /// The stream is well-formed, but its sample encoding is not supported.
    #[error("unsupported WAVE format: format tag {format_tag:#06x} with {bits_per_sample} bits per sample")]
    Unsupported {
        /// The format tag from the fmt chunk.
        format_tag: u16,
        /// The bits per sample from the fmt chunk.
        bits_per_sample: u16,
    },
    /// The sink accepted fewer bytes than it was given.
    #[error("short write after {written} samples")]
    ShortWrite {
        /// The number of samples that were written completely.
        written: usize,
    },
    /// A previous write failed, the encoder cannot be used any more.
    #[error("the encoder failed on an earlier write")]
    EncoderFailed,
    /// The number of samples written is not a multiple of the number of channels.
    #[error("the number of samples written is not a multiple of the number of channels")]
    UnfinishedFrame,
    /// The data chunk would exceed the 4 GiB its length field can describe.
    #[error("the data chunk is too large for a wav file")]
    DataTooLarge,
    /// No registered format recognizes the stream.
    #[error("no registered format recognizes the stream")]
    UnknownFormat,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Malformed("unexpected end of stream"),
            _ => Error::Io(err),
        }
    }
}

/// A type for results generated by riffwav where the error type is hard-wired.
pub type Result<T> = std::result::Result<T, Error>;

/// Specifies properties of the audio data.
///
/// The encoding of the samples is not part of the configuration: the decoder
/// reports it separately through [`WavDecoder::format`], and the encoder
/// always writes [`WavEncoder::BITS_PER_SAMPLE`]-bit PCM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AudioConfig {
    /// The number of frames per second.
    ///
    /// A common value is 44100, this is 44.1 kHz which is used for CD audio.
    pub sample_rate: u32,

    /// The number of interleaved channels.
    pub channels: u16,
}

impl AudioConfig {
    /// Creates a configuration, rejecting a zero sample rate or channel count.
    pub fn new(sample_rate: u32, channels: u16) -> Result<AudioConfig> {
        if sample_rate == 0 {
            return Err(Error::Malformed("sample rate is 0"));
        }
        if channels == 0 {
            return Err(Error::Malformed("file contains zero channels"));
        }
        Ok(AudioConfig {
            sample_rate,
            channels,
        })
    }
}

/// Registers the wav codec under [`FORMAT_NAME`] with the magic [`MAGIC`].
///
/// Call this once while setting up the registry; nothing is registered
/// implicitly.
pub fn register(registry: &mut Registry) {
    registry.register(Format {
        name: FORMAT_NAME,
        magic: MAGIC,
        open: read::open_boxed,
    });
}

#[test]
fn write_read_i16_is_lossless() {
    let mut buffer = io::Cursor::new(Vec::new());
    let config = AudioConfig::new(44_100, 2).unwrap();

    {
        let mut encoder = WavEncoder::new(&mut buffer, config).unwrap();
        let samples: Vec<i16> = (-1024_i16..1024).collect();
        assert_eq!(encoder.write(&samples).unwrap(), 2048);
        encoder.close().unwrap();
    }

    {
        buffer.set_position(0);
        let mut decoder = WavDecoder::new(&mut buffer).unwrap();
        assert_eq!(config, decoder.config());
        assert_eq!(decoder.format(), SampleFormat::Pcm16);
        assert_eq!(decoder.len(), Some(2048));
        assert_eq!(decoder.duration(), Some(1024));
        for (expected, read) in (-1024_i16..1024).zip(decoder.samples()) {
            assert_eq!(expected, read.unwrap());
        }
    }
}

#[test]
fn write_read_f64_goes_through_pcm16() {
    let mut buffer = io::Cursor::new(Vec::new());
    let config = AudioConfig::new(8_000, 1).unwrap();

    {
        let mut encoder = WavEncoder::new(&mut buffer, config).unwrap();
        encoder.write(&[0.0_f64, 0.5, -0.5, 1.0]).unwrap();
        encoder.close().unwrap();
    }

    buffer.set_position(0);
    let mut decoder = WavDecoder::new(buffer).unwrap();
    let mut pcm = [0_i16; 8];
    let (n, status) = decoder.read(&mut pcm).unwrap();
    assert_eq!(n, 4);
    assert_eq!(status, Status::EndOfStream);
    assert_eq!(&pcm[..n], &[0, 16384, -16384, 32767]);
}

#[test]
fn write_read_companded_is_lossless_for_codes() {
    // Every A-law code expands to a 16-bit value that compresses back to the
    // same code, so writing codes and reading codes loses nothing.
    let codes: Vec<ALaw> = (0..=255_u8).map(ALaw).collect();
    let mut buffer = io::Cursor::new(Vec::new());
    {
        let mut encoder = WavEncoder::new(&mut buffer, AudioConfig::new(8_000, 1).unwrap()).unwrap();
        encoder.write(&codes).unwrap();
        encoder.close().unwrap();
    }
    buffer.set_position(0);
    let decoder = WavDecoder::new(buffer).unwrap();
    let read: Vec<i16> = decoder.into_samples::<i16>().map(|s| s.unwrap()).collect();
    let expected: Vec<i16> = codes.iter().map(|c| g711::alaw_to_linear(c.0)).collect();
    assert_eq!(read, expected);
}

#[test]
fn flush_should_produce_valid_file() {
    use std::io::Seek;
    use std::mem;

    let mut buffer = io::Cursor::new(Vec::new());
    let samples: &[i16] = &[2, 4, 5, 7, 11, 13];

    {
        let mut encoder = WavEncoder::new(&mut buffer, AudioConfig::new(44_100, 2).unwrap()).unwrap();
        encoder.write(samples).unwrap();

        // We should be able to see everything up to the flush later.
        encoder.flush().unwrap();

        // Write more samples. These should be in the buffer, but not read by the
        // decoder if we don't close the encoder.
        encoder.write(&[17_i16, 19]).unwrap();

        mem::forget(encoder);
    }

    buffer.seek(io::SeekFrom::Start(0)).unwrap();

    let mut decoder = WavDecoder::new(&mut buffer).unwrap();
    let read_samples: Vec<i16> = decoder.samples().map(|r| r.unwrap()).collect();

    // We expect to see all samples up to the flush, but not the later ones.
    assert_eq!(&read_samples[..], samples);
}

#[test]
fn dropping_the_encoder_finalizes_the_header() {
    let mut buffer = io::Cursor::new(Vec::new());
    {
        let mut encoder = WavEncoder::new(&mut buffer, AudioConfig::new(8_000, 1).unwrap()).unwrap();
        encoder.write(&[1_i16, 2, 3]).unwrap();
    }
    buffer.set_position(0);
    let decoder = WavDecoder::new(buffer).unwrap();
    assert_eq!(decoder.data_len(), Some(6));
}

#[test]
fn audio_config_rejects_degenerate_values() {
    assert!(AudioConfig::new(0, 1).is_err());
    assert!(AudioConfig::new(8_000, 0).is_err());
    assert_eq!(
        AudioConfig::new(48_000, 6).unwrap(),
        AudioConfig {
            sample_rate: 48_000,
            channels: 6
        }
    );
}

#[test]
fn unexpected_eof_is_reported_as_malformed() {
    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
    assert!(matches!(Error::from(eof), Error::Malformed(_)));
    let other = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
    assert!(matches!(Error::from(other), Error::Io(_)));
}
