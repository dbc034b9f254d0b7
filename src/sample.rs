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

//! Sample encodings and the conversions between them.
//!
//! Every on-disk encoding has a "native" Rust type that holds its values
//! without loss. Decoding into the native type of the file copies the value;
//! decoding into any other type goes through a normalized `f64`, where full
//! scale is `[-1.0, 1.0)` for the integer formats.

use std::io;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::g711;
use crate::wav::{WAVE_FORMAT_ALAW, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM};
use crate::{Error, Result};

/// The encoding of the samples in a data chunk.
///
/// Only combinations of format tag and bits per sample that this crate can
/// decode have a variant; see [`SampleFormat::resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit PCM, 128 is silence.
    Pcm8,
    /// Signed little-endian 16-bit PCM.
    Pcm16,
    /// Signed little-endian 24-bit PCM, packed in 3 bytes.
    Pcm24,
    /// Signed little-endian 32-bit PCM.
    Pcm32,
    /// Little-endian IEEE 754 single precision.
    Float32,
    /// Little-endian IEEE 754 double precision.
    Float64,
    /// 8-bit G.711 A-law.
    ALaw,
    /// 8-bit G.711 µ-law.
    MuLaw,
}

impl SampleFormat {
    /// Picks the sample format for a format tag and bit depth from the fmt chunk.
    ///
    /// Returns `Error::Unsupported` for any pair outside of:
    ///
    /// | format tag | bits per sample |
    /// |------------|-----------------|
    /// | PCM        | 8, 16, 24, 32   |
    /// | IEEE float | 32, 64          |
    /// | A-law      | 8               |
    /// | µ-law      | 8               |
    pub fn resolve(format_tag: u16, bits_per_sample: u16) -> Result<SampleFormat> {
        match (format_tag, bits_per_sample) {
            (WAVE_FORMAT_PCM, 8) => Ok(SampleFormat::Pcm8),
            (WAVE_FORMAT_PCM, 16) => Ok(SampleFormat::Pcm16),
            (WAVE_FORMAT_PCM, 24) => Ok(SampleFormat::Pcm24),
            (WAVE_FORMAT_PCM, 32) => Ok(SampleFormat::Pcm32),
            (WAVE_FORMAT_IEEE_FLOAT, 32) => Ok(SampleFormat::Float32),
            (WAVE_FORMAT_IEEE_FLOAT, 64) => Ok(SampleFormat::Float64),
            (WAVE_FORMAT_ALAW, 8) => Ok(SampleFormat::ALaw),
            (WAVE_FORMAT_MULAW, 8) => Ok(SampleFormat::MuLaw),
            _ => Err(Error::Unsupported { format_tag, bits_per_sample }),
        }
    }

    /// The format tag written in the fmt chunk for this encoding.
    pub fn format_tag(self) -> u16 {
        match self {
            SampleFormat::Pcm8
            | SampleFormat::Pcm16
            | SampleFormat::Pcm24
            | SampleFormat::Pcm32 => WAVE_FORMAT_PCM,
            SampleFormat::Float32 | SampleFormat::Float64 => WAVE_FORMAT_IEEE_FLOAT,
            SampleFormat::ALaw => WAVE_FORMAT_ALAW,
            SampleFormat::MuLaw => WAVE_FORMAT_MULAW,
        }
    }

    /// The number of bits used to store one sample.
    pub fn bits_per_sample(self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }

    /// The number of bytes used to store one sample.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Pcm8 | SampleFormat::ALaw | SampleFormat::MuLaw => 1,
            SampleFormat::Pcm16 => 2,
            SampleFormat::Pcm24 => 3,
            SampleFormat::Pcm32 | SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }
}

/// A single sample as it is stored on disk, tagged with its encoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawSample {
    /// An unsigned 8-bit PCM sample.
    U8(u8),
    /// A signed 16-bit PCM sample.
    I16(i16),
    /// A signed 24-bit PCM sample, sign-extended to 32 bits.
    I24(i32),
    /// A signed 32-bit PCM sample.
    I32(i32),
    /// A single precision float sample.
    F32(f32),
    /// A double precision float sample.
    F64(f64),
    /// An A-law code.
    ALaw(u8),
    /// A µ-law code.
    MuLaw(u8),
}

impl RawSample {
    /// Interprets the first `format.bytes_per_sample()` bytes of `bytes`.
    pub fn from_le_bytes(format: SampleFormat, bytes: &[u8; 8]) -> RawSample {
        match format {
            SampleFormat::Pcm8 => RawSample::U8(bytes[0]),
            SampleFormat::Pcm16 => RawSample::I16(LittleEndian::read_i16(bytes)),
            SampleFormat::Pcm24 => {
                let x = LittleEndian::read_u24(bytes);
                // Test the sign bit, if it is set, extend the sign into the
                // most significant byte.
                if x & (1 << 23) == 0 {
                    RawSample::I24(x as i32)
                } else {
                    RawSample::I24((x | 0xff_00_00_00) as i32)
                }
            }
            SampleFormat::Pcm32 => RawSample::I32(LittleEndian::read_i32(bytes)),
            SampleFormat::Float32 => RawSample::F32(LittleEndian::read_f32(bytes)),
            SampleFormat::Float64 => RawSample::F64(LittleEndian::read_f64(bytes)),
            SampleFormat::ALaw => RawSample::ALaw(bytes[0]),
            SampleFormat::MuLaw => RawSample::MuLaw(bytes[0]),
        }
    }

    /// Writes the sample in its on-disk layout.
    pub fn write_le<W: io::Write>(self, writer: &mut W) -> io::Result<()> {
        match self {
            RawSample::U8(x) | RawSample::ALaw(x) | RawSample::MuLaw(x) => writer.write_u8(x),
            RawSample::I16(x) => writer.write_i16::<LittleEndian>(x),
            RawSample::I24(x) => writer.write_i24::<LittleEndian>(x),
            RawSample::I32(x) => writer.write_i32::<LittleEndian>(x),
            RawSample::F32(x) => writer.write_f32::<LittleEndian>(x),
            RawSample::F64(x) => writer.write_f64::<LittleEndian>(x),
        }
    }

    /// The encoding this sample is stored in.
    pub fn format(self) -> SampleFormat {
        match self {
            RawSample::U8(_) => SampleFormat::Pcm8,
            RawSample::I16(_) => SampleFormat::Pcm16,
            RawSample::I24(_) => SampleFormat::Pcm24,
            RawSample::I32(_) => SampleFormat::Pcm32,
            RawSample::F32(_) => SampleFormat::Float32,
            RawSample::F64(_) => SampleFormat::Float64,
            RawSample::ALaw(_) => SampleFormat::ALaw,
            RawSample::MuLaw(_) => SampleFormat::MuLaw,
        }
    }

    /// Converts the sample to a normalized floating point value.
    ///
    /// Integer formats are divided by their half range, so the most negative
    /// value maps to -1.0 and the most positive one to just below 1.0. 24-bit
    /// PCM is sign-extended to 32 bits and scaled like 32-bit PCM, so it
    /// agrees with the value delivered in an `i32`. Float
    /// formats are passed through unchanged. Companded formats are expanded
    /// to 16-bit PCM first.
    pub fn to_normalized(self) -> f64 {
        match self {
            RawSample::U8(x) => (f64::from(x) - 128.0) / 128.0,
            RawSample::I16(x) => pcm16_to_normalized(x),
            RawSample::I24(x) | RawSample::I32(x) => f64::from(x) / 2_147_483_648.0,
            RawSample::F32(x) => f64::from(x),
            RawSample::F64(x) => x,
            RawSample::ALaw(code) => pcm16_to_normalized(g711::alaw_to_linear(code)),
            RawSample::MuLaw(code) => pcm16_to_normalized(g711::ulaw_to_linear(code)),
        }
    }
}

#[inline(always)]
fn pcm16_to_normalized(x: i16) -> f64 {
    f64::from(x) / 32_768.0
}

/// Quantizes a normalized value to unsigned 8-bit PCM.
///
/// The value is scaled by 128, truncated toward zero, offset by 128 and
/// saturated to `0..=255`. NaN becomes 128, which is silence.
pub fn pcm8_from_normalized(x: f64) -> u8 {
    if x.is_nan() {
        return 128;
    }
    ((x * 128.0).trunc() + 128.0) as u8
}

/// Quantizes a normalized value to signed 16-bit PCM.
///
/// The value is scaled by 32768 and truncated toward zero, saturating at the
/// ends of the range: 0.5 becomes 16384, and 1.0 becomes 32767. NaN becomes 0.
pub fn pcm16_from_normalized(x: f64) -> i16 {
    (x * 32_768.0) as i16
}

/// Quantizes a normalized value to signed 32-bit PCM, truncating and saturating.
pub fn pcm32_from_normalized(x: f64) -> i32 {
    (x * 2_147_483_648.0) as i32
}

/// An 8-bit G.711 A-law code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ALaw(pub u8);

/// An 8-bit G.711 µ-law code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MuLaw(pub u8);

impl Default for ALaw {
    /// The code for silence.
    fn default() -> ALaw {
        ALaw(0xd5)
    }
}

impl Default for MuLaw {
    /// The code for silence.
    fn default() -> MuLaw {
        MuLaw(0xff)
    }
}

/// A type that can be used to represent audio samples.
///
/// Via this trait, decoding can be generic over `u8`, `i16`, `i32`, `f32`,
/// `f64`, [`ALaw`] and [`MuLaw`]. When the type is the native type of the
/// sample encoding in the file, values are copied exactly. 24-bit PCM has no
/// dedicated type: decoding it into `i32` yields the sign-extended 24-bit
/// value, and its normalized value is that of the same `i32`. Any other combination converts through the normalized `f64`
/// representation, which may lose precision.
pub trait Sample: Copy + Default + Send + Sync + 'static {
    /// Converts an on-disk sample, copying it when `Self` is its native type.
    fn from_raw(raw: RawSample) -> Self {
        Self::from_normalized(raw.to_normalized())
    }

    /// Tags the sample with its native on-disk encoding.
    fn to_raw(self) -> RawSample;

    /// Quantizes a normalized value to this sample type.
    fn from_normalized(x: f64) -> Self;

    /// Converts the sample to a normalized value.
    fn to_normalized(self) -> f64 {
        self.to_raw().to_normalized()
    }

    /// Converts the sample to 16-bit PCM for writing.
    fn to_pcm16(self) -> i16 {
        pcm16_from_normalized(self.to_normalized())
    }
}

impl Sample for u8 {
    fn from_raw(raw: RawSample) -> u8 {
        match raw {
            RawSample::U8(x) => x,
            other => u8::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::U8(self)
    }

    fn from_normalized(x: f64) -> u8 {
        pcm8_from_normalized(x)
    }
}

impl Sample for i16 {
    fn from_raw(raw: RawSample) -> i16 {
        match raw {
            RawSample::I16(x) => x,
            other => i16::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::I16(self)
    }

    fn from_normalized(x: f64) -> i16 {
        pcm16_from_normalized(x)
    }

    #[inline(always)]
    fn to_pcm16(self) -> i16 {
        self
    }
}

impl Sample for i32 {
    fn from_raw(raw: RawSample) -> i32 {
        match raw {
            RawSample::I32(x) | RawSample::I24(x) => x,
            other => i32::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::I32(self)
    }

    fn from_normalized(x: f64) -> i32 {
        pcm32_from_normalized(x)
    }
}

impl Sample for f32 {
    fn from_raw(raw: RawSample) -> f32 {
        match raw {
            RawSample::F32(x) => x,
            other => f32::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::F32(self)
    }

    fn from_normalized(x: f64) -> f32 {
        x as f32
    }
}

impl Sample for f64 {
    fn from_raw(raw: RawSample) -> f64 {
        raw.to_normalized()
    }

    fn to_raw(self) -> RawSample {
        RawSample::F64(self)
    }

    fn from_normalized(x: f64) -> f64 {
        x
    }
}

impl Sample for ALaw {
    fn from_raw(raw: RawSample) -> ALaw {
        match raw {
            RawSample::ALaw(code) => ALaw(code),
            other => ALaw::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::ALaw(self.0)
    }

    fn from_normalized(x: f64) -> ALaw {
        ALaw(g711::linear_to_alaw(pcm16_from_normalized(x)))
    }

    fn to_pcm16(self) -> i16 {
        g711::alaw_to_linear(self.0)
    }
}

impl Sample for MuLaw {
    fn from_raw(raw: RawSample) -> MuLaw {
        match raw {
            RawSample::MuLaw(code) => MuLaw(code),
            other => MuLaw::from_normalized(other.to_normalized()),
        }
    }

    fn to_raw(self) -> RawSample {
        RawSample::MuLaw(self.0)
    }

    fn from_normalized(x: f64) -> MuLaw {
        MuLaw(g711::linear_to_ulaw(pcm16_from_normalized(x)))
    }

    fn to_pcm16(self) -> i16 {
        g711::ulaw_to_linear(self.0)
    }
}

/// Copies samples from `src` into `dst`, converting between sample types.
///
/// Samples are copied exactly when `T` is the native type of the samples in
/// `src`, and converted through the normalized representation otherwise.
/// Returns the number of samples copied, the length of the shorter slice.
pub fn convert<S: Sample, T: Sample>(src: &[S], dst: &mut [T]) -> usize {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = T::from_raw(s.to_raw());
    }
    src.len().min(dst.len())
}

/// A mutable slice of samples of any type that implements [`Sample`].
///
/// This allows decoding into a caller-chosen sample type through a trait
/// object, see [`Decoder`](crate::Decoder).
#[derive(Debug)]
pub enum SamplesMut<'a> {
    /// Unsigned 8-bit PCM samples.
    Pcm8(&'a mut [u8]),
    /// Signed 16-bit PCM samples.
    Pcm16(&'a mut [i16]),
    /// Signed 32-bit PCM samples (also used for 24-bit PCM).
    Pcm32(&'a mut [i32]),
    /// Single precision float samples.
    Float32(&'a mut [f32]),
    /// Double precision float samples.
    Float64(&'a mut [f64]),
    /// A-law codes.
    ALaw(&'a mut [ALaw]),
    /// µ-law codes.
    MuLaw(&'a mut [MuLaw]),
}

impl<'a> SamplesMut<'a> {
    /// The number of samples the slice can hold.
    pub fn len(&self) -> usize {
        match self {
            SamplesMut::Pcm8(s) => s.len(),
            SamplesMut::Pcm16(s) => s.len(),
            SamplesMut::Pcm32(s) => s.len(),
            SamplesMut::Float32(s) => s.len(),
            SamplesMut::Float64(s) => s.len(),
            SamplesMut::ALaw(s) => s.len(),
            SamplesMut::MuLaw(s) => s.len(),
        }
    }

    /// Returns whether the slice holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_samples_mut_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a mut [$ty]> for SamplesMut<'a> {
                fn from(samples: &'a mut [$ty]) -> SamplesMut<'a> {
                    SamplesMut::$variant(samples)
                }
            }
        )*
    };
}

impl_samples_mut_from! {
    u8 => Pcm8,
    i16 => Pcm16,
    i32 => Pcm32,
    f32 => Float32,
    f64 => Float64,
    ALaw => ALaw,
    MuLaw => MuLaw,
}
