// riffwav -- A WAV encoding and decoding library in Rust
// Copyright 2024 The riffwav Authors

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

//! Building blocks for working with the WAVE format.
//!
//! A WAVE file is a RIFF container: a 12-byte header, followed by _chunks_
//! that each start with a 4-byte identifier and a 4-byte little-endian
//! length. This module contains the structs that describe those headers and
//! the fixed layout of the files that [`WavEncoder`](crate::WavEncoder)
//! writes. For the higher level API, see the crate root.

use std::io;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::read::ReadExt;
use crate::{AudioConfig, Error, Result};

/// Format tag for integer PCM.
pub const WAVE_FORMAT_PCM: u16 = 0x0001;
/// Format tag for IEEE 754 floating point samples.
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// Format tag for G.711 A-law.
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
/// Format tag for G.711 µ-law.
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
/// Format tag that defers the encoding to a GUID in the fmt chunk. Not supported.
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xfffe;

/// Length of the header written by the encoder, up to the first sample byte.
pub const HEADER_LEN: u64 = 44;

/// Offset of the RIFF chunk length in the encoder's header.
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Offset of the data chunk length in the encoder's header.
pub const DATA_SIZE_OFFSET: u64 = 40;

/// Length of the body of a fmt chunk that holds a `PCMWAVEFORMAT` struct.
pub const FMT_CHUNK_LEN: u32 = 16;

/// Returns the RIFF chunk length of an encoded file with `data_len` data bytes.
///
/// This is the "WAVE" tag, the complete fmt chunk (8 + 16 bytes), and the
/// data chunk header, plus the data itself.
pub fn riff_size(data_len: u32) -> u32 {
    (4 + 24 + 8_u32).saturating_add(data_len)
}

/// The header of a single chunk: its identifier and the length of its body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    /// The four ASCII bytes that identify the chunk, e.g. `b"fmt "`.
    pub id: [u8; 4],
    /// The length in bytes of the body, excluding the pad byte.
    pub len: u32,
}

impl ChunkHeader {
    /// Reads an 8-byte chunk header.
    pub fn read_from<R: io::Read>(reader: &mut R) -> Result<ChunkHeader> {
        let id = reader.read_4_bytes()?;
        let len = reader.read_u32::<LittleEndian>()?;
        Ok(ChunkHeader { id, len })
    }

    /// Serializes the header for writing to a file.
    pub fn to_bytes(self) -> [u8; 8] {
        let mut result = [0u8; 8];
        result[..4].copy_from_slice(&self.id);
        LittleEndian::write_u32(&mut result[4..], self.len);
        result
    }

    /// The length of the body including the pad byte that follows odd-length chunks.
    pub fn padded_len(&self) -> u64 {
        u64::from(self.len) + u64::from(self.len & 1)
    }
}

/// The outermost header of a wav file: the RIFF header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RiffHeader {
    /// The length in bytes of the data that follows the header.
    ///
    /// This does not include the length of the 8-byte RIFF header, but it does
    /// include the length of the 4-byte WAVE tag. Therefore the size of a wav
    /// file is 8 bytes more than this inner length.
    ///
    /// A value of `u32::MAX` is in some cases used to signal that the data that
    /// follows is a stream of unknown length, rather than a file with a
    /// specific duration. This meaning is non-standard, but nonetheless occurs
    /// in the wild.
    pub inner_len: u32,
}

impl RiffHeader {
    /// Parses the RIFF WAVE header.
    ///
    /// Aside from returning the length of the file, this can be used to test
    /// the magic bytes to see if a file might be a wav file at all.
    pub fn from_bytes(bytes: [u8; 12]) -> Result<RiffHeader> {
        if &bytes[..4] != b"RIFF" {
            return Err(Error::Malformed("no RIFF tag found"));
        }
        if &bytes[8..] != b"WAVE" {
            return Err(Error::Malformed("no WAVE tag found"));
        }
        Ok(RiffHeader {
            inner_len: LittleEndian::read_u32(&bytes[4..8]),
        })
    }

    /// Serializes the header for writing to a file.
    pub fn to_bytes(self) -> [u8; 12] {
        let mut result: [u8; 12] = *b"RIFF\0\0\0\0WAVE";
        LittleEndian::write_u32(&mut result[4..8], self.inner_len);
        result
    }
}

/// The fields of the fmt chunk that every variant of it shares.
///
/// This is the `PCMWAVEFORMAT` struct: a `WAVEFORMAT` plus the bits per
/// sample. The 18 and 40-byte variants of the chunk extend it with a `cbSize`
/// field and (for the extensible format) a channel mask and subformat GUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// One of the `WAVE_FORMAT_*` tags.
    pub format_tag: u16,
    /// The number of interleaved channels.
    pub channels: u16,
    /// The number of frames per second.
    pub sample_rate: u32,
    /// Redundant: `sample_rate * block_align`.
    pub avg_bytes_per_sec: u32,
    /// The number of bytes in one frame.
    pub block_align: u16,
    /// The number of bits used to store a single sample.
    pub bits_per_sample: u16,
}

impl FormatDescriptor {
    /// Parses the first 16 bytes of a fmt chunk body.
    pub fn from_bytes(bytes: [u8; 16]) -> FormatDescriptor {
        FormatDescriptor {
            format_tag: LittleEndian::read_u16(&bytes[0..2]),
            channels: LittleEndian::read_u16(&bytes[2..4]),
            sample_rate: LittleEndian::read_u32(&bytes[4..8]),
            avg_bytes_per_sec: LittleEndian::read_u32(&bytes[8..12]),
            block_align: LittleEndian::read_u16(&bytes[12..14]),
            bits_per_sample: LittleEndian::read_u16(&bytes[14..16]),
        }
    }

    /// Serializes the descriptor as a 16-byte fmt chunk body.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut result = [0u8; 16];
        LittleEndian::write_u16(&mut result[0..2], self.format_tag);
        LittleEndian::write_u16(&mut result[2..4], self.channels);
        LittleEndian::write_u32(&mut result[4..8], self.sample_rate);
        LittleEndian::write_u32(&mut result[8..12], self.avg_bytes_per_sec);
        LittleEndian::write_u16(&mut result[12..14], self.block_align);
        LittleEndian::write_u16(&mut result[14..16], self.bits_per_sample);
        result
    }

    /// Builds the descriptor for 16-bit PCM with the given configuration.
    ///
    /// Fails when the block alignment or the byte rate do not fit in their fields.
    pub fn pcm16(config: AudioConfig) -> Result<FormatDescriptor> {
        let block_align = config
            .channels
            .checked_mul(2)
            .ok_or(Error::Malformed("too many channels for 16-bit frames"))?;
        let avg_bytes_per_sec = config
            .sample_rate
            .checked_mul(u32::from(block_align))
            .ok_or(Error::Malformed("byte rate does not fit in 32 bits"))?;
        Ok(FormatDescriptor {
            format_tag: WAVE_FORMAT_PCM,
            channels: config.channels,
            sample_rate: config.sample_rate,
            avg_bytes_per_sec,
            block_align,
            bits_per_sample: 16,
        })
    }

    /// Returns the audio configuration, validating that it is not degenerate.
    pub fn config(&self) -> Result<AudioConfig> {
        AudioConfig::new(self.sample_rate, self.channels)
    }

    /// Whether the redundant fields agree with the others.
    ///
    /// Files in the wild do not always get these right, and they are not
    /// needed to decode the samples, so a mismatch is not an error.
    pub fn is_consistent(&self) -> bool {
        let bytes_per_sample = u32::from(self.bits_per_sample).div_ceil(8);
        u32::from(self.block_align) == u32::from(self.channels) * bytes_per_sample
            && Some(self.avg_bytes_per_sec) == self.sample_rate.checked_mul(u32::from(self.block_align))
    }
}

/// Builds the 44-byte header of a 16-bit PCM file with `data_len` data bytes.
///
/// The layout is the RIFF header, a 16-byte fmt chunk, and the data chunk
/// header, so the size fields land at [`RIFF_SIZE_OFFSET`] and
/// [`DATA_SIZE_OFFSET`].
pub fn pcm16_header(format: FormatDescriptor, data_len: u32) -> [u8; 44] {
    let mut header = [0u8; 44];
    let riff = RiffHeader {
        inner_len: riff_size(data_len),
    };
    let fmt = ChunkHeader {
        id: *b"fmt ",
        len: FMT_CHUNK_LEN,
    };
    let data = ChunkHeader {
        id: *b"data",
        len: data_len,
    };
    header[0..12].copy_from_slice(&riff.to_bytes());
    header[12..20].copy_from_slice(&fmt.to_bytes());
    header[20..36].copy_from_slice(&format.to_bytes());
    header[36..44].copy_from_slice(&data.to_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn riff_header_checks_both_tags() {
        let good = *b"RIFF\x24\x00\x00\x00WAVE";
        assert_eq!(RiffHeader::from_bytes(good).unwrap().inner_len, 36);
        assert_eq!(RiffHeader { inner_len: 36 }.to_bytes(), good);

        match RiffHeader::from_bytes(*b"RIFX\x24\x00\x00\x00WAVE") {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
        match RiffHeader::from_bytes(*b"RIFF\x24\x00\x00\x00AVI ") {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn chunk_header_pads_odd_lengths() {
        let odd = ChunkHeader { id: *b"LIST", len: 7 };
        let even = ChunkHeader { id: *b"LIST", len: 8 };
        assert_eq!(odd.padded_len(), 8);
        assert_eq!(even.padded_len(), 8);
        let mut cursor = io::Cursor::new(odd.to_bytes());
        assert_eq!(ChunkHeader::read_from(&mut cursor).unwrap(), odd);
    }

    #[test]
    fn truncated_chunk_header_is_malformed() {
        let mut cursor = io::Cursor::new(b"dat".to_vec());
        match ChunkHeader::read_from(&mut cursor) {
            Err(Error::Malformed(_)) => {}
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn pcm16_descriptor_fills_redundant_fields() {
        let config = AudioConfig::new(44_100, 2).unwrap();
        let format = FormatDescriptor::pcm16(config).unwrap();
        assert_eq!(format.block_align, 4);
        assert_eq!(format.avg_bytes_per_sec, 176_400);
        assert!(format.is_consistent());
        assert_eq!(format.config().unwrap(), config);
        assert_eq!(FormatDescriptor::from_bytes(format.to_bytes()), format);
    }

    #[test]
    fn pcm16_descriptor_rejects_overflowing_rates() {
        let config = AudioConfig::new(u32::MAX, 2).unwrap();
        assert!(FormatDescriptor::pcm16(config).is_err());
    }

    #[test]
    fn pcm16_header_layout() {
        let config = AudioConfig::new(8000, 1).unwrap();
        let header = pcm16_header(FormatDescriptor::pcm16(config).unwrap(), 10);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(LittleEndian::read_u32(&header[4..8]), 46);
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(LittleEndian::read_u32(&header[16..20]), 16);
        assert_eq!(LittleEndian::read_u16(&header[20..22]), WAVE_FORMAT_PCM);
        assert_eq!(LittleEndian::read_u16(&header[22..24]), 1);
        assert_eq!(LittleEndian::read_u32(&header[24..28]), 8000);
        assert_eq!(LittleEndian::read_u32(&header[28..32]), 16_000);
        assert_eq!(LittleEndian::read_u16(&header[32..34]), 2);
        assert_eq!(LittleEndian::read_u16(&header[34..36]), 16);
        assert_eq!(&header[36..40], b"data");
        assert_eq!(LittleEndian::read_u32(&header[DATA_SIZE_OFFSET as usize..]), 10);
        assert_eq!(riff_size(10), 46);
    }
}
