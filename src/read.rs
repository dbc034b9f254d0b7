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

use std::fs;
use std::io;
use std::marker;
use std::path;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use crate::registry::{Decoder, ReadSeek};
use crate::wav::{ChunkHeader, FormatDescriptor, RiffHeader};
use crate::{AudioConfig, Error, RawSample, Result, Sample, SampleFormat, SamplesMut};

/// Extends the functionality of `io::Read` with the methods RIFF parsing needs.
///
/// The fixed-width integer reads come from byteorder's `ReadBytesExt`.
pub trait ReadExt: io::Read {
    /// Reads 4 bytes and returns them in an array.
    fn read_4_bytes(&mut self) -> io::Result<[u8; 4]>;

    /// Skips over `n` bytes.
    ///
    /// Returns an `UnexpectedEof` error if the reader ends first.
    fn skip_bytes(&mut self, n: u64) -> io::Result<()>;

    /// Reads until `buf` is full or the reader ends, returns the number of bytes read.
    ///
    /// Unlike `read_exact`, reaching the end of the reader early is not an
    /// error, the caller decides what a partial read means.
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<R> ReadExt for R
where
    R: io::Read,
{
    #[inline(always)]
    fn read_4_bytes(&mut self) -> io::Result<[u8; 4]> {
        let mut buf = [0_u8; 4];
        self.read_exact(&mut buf[..])?;
        Ok(buf)
    }

    fn skip_bytes(&mut self, n: u64) -> io::Result<()> {
        let skipped = io::copy(&mut io::Read::take(&mut *self, n), &mut io::sink())?;
        if skipped < n {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside a chunk",
            ));
        }
        Ok(())
    }

    #[inline(always)]
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            match self.read(&mut buf[n..]) {
                Ok(0) => break,
                Ok(progress) => n += progress,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(n)
    }
}

/// Whether more samples may follow after a call to [`WavDecoder::read`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The destination was filled; more samples may follow.
    Ready,
    /// There are no more samples in the data chunk.
    ///
    /// This is the normal end of a stream, not an error. Every later call to
    /// `read` produces zero samples and reports `EndOfStream` again.
    EndOfStream,
}

/// What the chunk scan found before the first sample byte.
struct Preamble {
    descriptor: FormatDescriptor,
    format: SampleFormat,
    /// The declared length of the data chunk.
    data_len: u32,
    /// Offset of the first sample byte from where the scan started.
    data_offset: u64,
}

/// A decoder that reads the WAVE format from the underlying reader.
///
/// A `WavDecoder` is a streaming decoder. It reads data from the underlying
/// reader on demand, and it reads no more than strictly necessary. No internal
/// buffering is performed on the underlying reader, but this can easily be
/// added by wrapping the reader in an `io::BufReader`. The `open` constructor
/// takes care of this for you.
///
/// Reading needs `&mut self` while the queries take `&self`, so a decoder that
/// is shared between threads behind a `std::sync::RwLock` allows concurrent
/// queries but serializes reads.
pub struct WavDecoder<R> {
    /// Sample rate and channel count as found in the fmt chunk.
    config: AudioConfig,

    /// The fmt chunk as it was found in the stream.
    descriptor: FormatDescriptor,

    /// The encoding of the samples in the data chunk.
    format: SampleFormat,

    /// The length of the data chunk in bytes, `None` for an unbounded stream.
    data_len: Option<u32>,

    /// The offset of the first sample byte, relative to where the decoder
    /// started reading.
    data_offset: u64,

    /// The number of data chunk bytes read so far.
    ///
    /// This only ever counts whole samples, and for a known data length it
    /// never exceeds that length, except after seeking past the end.
    bytes_consumed: u64,

    /// The reader from which the WAVE format is read.
    reader: R,
}

/// An iterator that yields samples of type `S` read from a `WavDecoder`.
///
/// Samples are converted to `S` the same way [`WavDecoder::read`] converts them.
pub struct WavSamples<'wr, R, S>
where
    R: 'wr,
{
    decoder: &'wr mut WavDecoder<R>,
    phantom_sample: marker::PhantomData<S>,
}

/// An iterator that yields samples of type `S` read from a `WavDecoder`.
///
/// This is the owning counterpart of [`WavSamples`].
pub struct WavIntoSamples<R, S> {
    decoder: WavDecoder<R>,
    phantom_sample: marker::PhantomData<S>,
}

/// Reads the RIFF WAVE header, returns the supposed file size.
///
/// This function can be used to quickly check if the file could be a wav file
/// by reading 12 bytes of the header. If an `Ok` is returned, the file is
/// likely a wav file. If an `Err` is returned, it is definitely not a wav
/// file.
///
/// The returned file size cannot be larger than 2<sup>32</sup> + 7 bytes.
pub fn read_wave_header<R: io::Read>(reader: &mut R) -> Result<u64> {
    let mut bytes = [0_u8; 12];
    reader.read_exact(&mut bytes)?;
    let header = RiffHeader::from_bytes(bytes)?;

    // The stored file length does not include the "RIFF" magic and 4-byte
    // length field, so the total size is 8 bytes more than what is stored.
    Ok(u64::from(header.inner_len) + 8)
}

/// Reads chunks until a data chunk is encountered.
///
/// Afterwards, the reader will be positioned at the first content byte of
/// the data chunk. Assumes the 12-byte RIFF header has been read already.
fn read_until_data<R: io::Read>(reader: &mut R) -> Result<Preamble> {
    let mut fmt: Option<(FormatDescriptor, SampleFormat)> = None;
    let mut position: u64 = 12;

    loop {
        // If no data chunk is ever encountered, this returns Malformed once
        // the reader runs out.
        let header = ChunkHeader::read_from(reader)?;
        position += 8;
        debug!(
            id = %String::from_utf8_lossy(&header.id),
            len = header.len,
            offset = position,
            "found chunk"
        );

        match &header.id {
            b"fmt " => {
                fmt = Some(read_fmt_chunk(reader, header.len)?);
                position += header.padded_len();
            }
            b"fact" => {
                // All (compressed) non-PCM formats must have a fact chunk. It
                // holds the number of samples per channel, which is redundant
                // with the length of the data chunk, so it is skipped.
                reader.skip_bytes(header.padded_len())?;
                position += header.padded_len();
            }
            b"data" => {
                // The fmt chunk must precede the data chunk. Any chunks that
                // come after the data chunk are never read.
                let (descriptor, format) = fmt.ok_or(Error::Malformed("missing fmt chunk"))?;
                return Ok(Preamble {
                    descriptor,
                    format,
                    data_len: header.len,
                    data_offset: position,
                });
            }
            b"RIFF" => return Err(Error::Malformed("nested RIFF chunk")),
            _ => {
                // Optional chunks such as LIST or bext; skip all of their bytes.
                debug!(
                    id = %String::from_utf8_lossy(&header.id),
                    len = header.len,
                    "skipping unknown chunk"
                );
                reader.skip_bytes(header.padded_len())?;
                position += header.padded_len();
            }
        }
    }
}

/// Reads the fmt chunk, including its pad byte.
fn read_fmt_chunk<R: io::Read>(reader: &mut R, chunk_len: u32) -> Result<(FormatDescriptor, SampleFormat)> {
    // The minimal fmt chunk is the PCMWAVEFORMAT struct, as defined at
    // https://msdn.microsoft.com/en-us/library/dd743663.aspx.
    // ```
    // typedef struct {
    //   WAVEFORMAT wf;
    //   WORD       wBitsPerSample;
    // } PCMWAVEFORMAT;
    // ```
    // where WAVEFORMAT holds the format tag, channel count, sample rate,
    // byte rate and block alignment. The WAVEFORMATEX struct that makes up
    // the 18-byte variant adds a `cbSize` field that counts the bytes of any
    // extension that follow, which is 22 for the 40-byte WAVEFORMATEXTENSIBLE.
    if chunk_len < 16 {
        return Err(Error::Malformed("invalid fmt chunk size"));
    }

    let mut bytes = [0_u8; 16];
    reader.read_exact(&mut bytes)?;
    let descriptor = FormatDescriptor::from_bytes(bytes);

    // A file using an encoding we cannot decode is reported as such, even if
    // the rest of its fmt chunk is odd.
    let format = SampleFormat::resolve(descriptor.format_tag, descriptor.bits_per_sample)?;

    let mut remaining = u64::from(chunk_len) - 16;
    if remaining >= 2 {
        let cb_size = reader.read_u16::<LittleEndian>()?;
        remaining -= 2;
        match chunk_len {
            18 if cb_size != 0 => {
                // For the formats we support `cbSize` should be 0, but nonzero
                // values do occur in practice and there is nothing to read.
                warn!(cb_size, "ignoring nonzero cbSize in 18-byte fmt chunk");
            }
            40 if cb_size != 22 => {
                return Err(Error::Malformed("unexpected WAVEFORMATEXTENSIBLE size"));
            }
            _ => {}
        }
    }
    // Extension bytes (channel mask, subformat GUID, or anything a writer
    // added) are not needed to decode the supported formats.
    reader.skip_bytes(remaining + u64::from(chunk_len & 1))?;

    descriptor.config()?;
    if !descriptor.is_consistent() {
        warn!(
            block_align = descriptor.block_align,
            avg_bytes_per_sec = descriptor.avg_bytes_per_sec,
            "inconsistent fmt chunk"
        );
    }

    Ok((descriptor, format))
}

impl<R> WavDecoder<R>
where
    R: io::Read,
{
    /// Attempts to create a decoder that reads the WAVE format.
    ///
    /// The header is read immediately, up to and including the header of the
    /// data chunk. Reading the data will be done on demand.
    pub fn new(mut reader: R) -> Result<WavDecoder<R>> {
        let file_len = read_wave_header(&mut reader)?;
        let preamble = read_until_data(&mut reader)?;
        let config = preamble.descriptor.config()?;

        // A length of 0 is written by encoders that stream to a sink they
        // cannot seek back into, as is the nonstandard u32::MAX that ffmpeg
        // uses for pipes. In both cases the data runs until the stream ends.
        let data_len = match preamble.data_len {
            0 | u32::MAX => None,
            len => Some(len),
        };

        let width = preamble.format.bytes_per_sample() as u64;
        if let Some(len) = data_len {
            if u64::from(len) % width != 0 {
                warn!(len, width, "data chunk length is not a multiple of the sample size");
            }
        }

        debug!(
            file_len,
            sample_rate = config.sample_rate,
            channels = config.channels,
            format = ?preamble.format,
            data_len = ?data_len,
            data_offset = preamble.data_offset,
            "decoding wav stream"
        );

        Ok(WavDecoder {
            config,
            descriptor: preamble.descriptor,
            format: preamble.format,
            data_len,
            data_offset: preamble.data_offset,
            bytes_consumed: 0,
            reader,
        })
    }

    /// Returns the sample rate and channel count of the stream.
    pub fn config(&self) -> AudioConfig {
        self.config
    }

    /// Returns the encoding of the samples in the stream.
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Returns the fmt chunk as it was found in the stream.
    pub fn format_descriptor(&self) -> FormatDescriptor {
        self.descriptor
    }

    /// Returns the length of the data chunk in bytes.
    ///
    /// Returns `None` when the stream declares an unknown length, in which
    /// case samples are read until the underlying reader ends.
    pub fn data_len(&self) -> Option<u32> {
        self.data_len
    }

    /// Returns the offset of the first sample byte.
    ///
    /// The offset is relative to the position of the reader when it was
    /// passed to [`WavDecoder::new`].
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Returns the number of data bytes consumed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Returns the number of whole samples in the data chunk.
    ///
    /// The length is the duration times the number of channels. It is
    /// independent of how many samples have been read already. For an
    /// unbounded stream the length is not known.
    pub fn len(&self) -> Option<u32> {
        let width = self.format.bytes_per_sample() as u32;
        self.data_len.map(|len| len / width)
    }

    /// Returns the duration of the stream in frames.
    ///
    /// The duration is independent of the number of channels. The duration in
    /// seconds can be obtained by dividing this number by the sample rate.
    pub fn duration(&self) -> Option<u32> {
        self.len().map(|len| len / u32::from(self.config.channels))
    }

    /// Decodes samples into `dst`, returns how many were produced and whether more may follow.
    ///
    /// When `S` is the native type of the stream's encoding, samples are
    /// copied exactly. Otherwise they are converted through their normalized
    /// value, see [`Sample`]. Fewer than `dst.len()` samples are produced only
    /// at the end of the stream. For a stream of known length, `EndOfStream`
    /// is reported as soon as the last whole sample has been produced.
    ///
    /// An error is fatal to the stream: it is not defined how many samples of
    /// `dst` were overwritten, nor where the reader is positioned.
    pub fn read<S: Sample>(&mut self, dst: &mut [S]) -> Result<(usize, Status)> {
        for (i, slot) in dst.iter_mut().enumerate() {
            match self.read_raw()? {
                Some(raw) => *slot = S::from_raw(raw),
                None => return Ok((i, Status::EndOfStream)),
            }
        }
        let status = if self.is_exhausted() {
            Status::EndOfStream
        } else {
            Status::Ready
        };
        Ok((dst.len(), status))
    }

    /// Whether the known data length has no whole sample left.
    fn is_exhausted(&self) -> bool {
        let width = self.format.bytes_per_sample() as u64;
        match self.data_len {
            Some(len) => self.bytes_consumed + width > u64::from(len),
            None => false,
        }
    }

    /// Reads the next sample in its on-disk encoding, `None` at the end of the stream.
    fn read_raw(&mut self) -> Result<Option<RawSample>> {
        let width = self.format.bytes_per_sample();
        let mut bytes = [0_u8; 8];

        if self.data_len.is_some() {
            // The check happens before anything is read, so a trailing partial
            // sample is never consumed and the counter stays within bounds.
            if self.is_exhausted() {
                return Ok(None);
            }
            self.reader.read_exact(&mut bytes[..width])?;
        } else {
            match self.reader.read_up_to(&mut bytes[..width])? {
                0 => return Ok(None),
                n if n < width => return Err(Error::Malformed("stream ends inside a sample")),
                _ => {}
            }
        }

        self.bytes_consumed += width as u64;
        Ok(Some(RawSample::from_le_bytes(self.format, &bytes)))
    }

    /// Returns an iterator over all samples.
    ///
    /// The channel data is interleaved. The iterator is streaming. That is,
    /// if you call this method once, read a few samples, and call this method
    /// again, the second iterator will not start again from the beginning of
    /// the stream, it will continue where the first iterator stopped.
    pub fn samples<'wr, S: Sample>(&'wr mut self) -> WavSamples<'wr, R, S> {
        WavSamples {
            decoder: self,
            phantom_sample: marker::PhantomData,
        }
    }

    /// Same as `samples`, but takes ownership of the `WavDecoder`.
    ///
    /// See `samples()` for more info.
    pub fn into_samples<S: Sample>(self) -> WavIntoSamples<R, S> {
        WavIntoSamples {
            decoder: self,
            phantom_sample: marker::PhantomData,
        }
    }

    /// Destroys the `WavDecoder` and returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Seeks to the given sample within the data chunk.
    ///
    /// The position is measured in samples (not frames) since the beginning of
    /// the audio data. No bounds checking is done: after seeking past the end,
    /// the next read reports `EndOfStream` for a stream of known length.
    ///
    /// This method requires that the inner reader `R` implements `Seek`. The
    /// seek is relative to the current position, so the reader does not need
    /// to have started at offset 0. A target whose byte offset does not fit
    /// in an `i64` is an `io::ErrorKind::InvalidInput` error.
    pub fn seek(&mut self, sample: u64) -> Result<()>
    where
        R: io::Seek,
    {
        let out_of_range = || Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "seek target out of range"));
        let width = self.format.bytes_per_sample() as u64;
        let target = sample.checked_mul(width).ok_or_else(out_of_range)?;
        let offset = i64::try_from(target)
            .ok()
            .zip(i64::try_from(self.bytes_consumed).ok())
            .and_then(|(target, consumed)| target.checked_sub(consumed))
            .ok_or_else(out_of_range)?;
        self.reader.seek(io::SeekFrom::Current(offset))?;
        self.bytes_consumed = target;
        Ok(())
    }
}

impl WavDecoder<io::BufReader<fs::File>> {
    /// Attempts to create a decoder that reads from the specified file.
    ///
    /// This is a convenience constructor that opens a `File`, wraps it in a
    /// `BufReader` and then constructs a `WavDecoder` from it.
    pub fn open<P: AsRef<path::Path>>(filename: P) -> Result<WavDecoder<io::BufReader<fs::File>>> {
        let file = fs::File::open(filename)?;
        let buf_reader = io::BufReader::new(file);
        WavDecoder::new(buf_reader)
    }
}

impl<R> Decoder for WavDecoder<R>
where
    R: io::Read + io::Seek + Send,
{
    fn config(&self) -> AudioConfig {
        self.config
    }

    fn format(&self) -> SampleFormat {
        self.format
    }

    fn read(&mut self, dst: SamplesMut<'_>) -> Result<(usize, Status)> {
        match dst {
            SamplesMut::Pcm8(s) => WavDecoder::read(self, s),
            SamplesMut::Pcm16(s) => WavDecoder::read(self, s),
            SamplesMut::Pcm32(s) => WavDecoder::read(self, s),
            SamplesMut::Float32(s) => WavDecoder::read(self, s),
            SamplesMut::Float64(s) => WavDecoder::read(self, s),
            SamplesMut::ALaw(s) => WavDecoder::read(self, s),
            SamplesMut::MuLaw(s) => WavDecoder::read(self, s),
        }
    }

    fn seek(&mut self, sample: u64) -> Result<()> {
        WavDecoder::seek(self, sample)
    }
}

/// Opens a wav stream for the registry.
pub(crate) fn open_boxed(reader: Box<dyn ReadSeek>) -> Result<Box<dyn Decoder>> {
    Ok(Box::new(WavDecoder::new(reader)?))
}

fn iter_next<R, S>(decoder: &mut WavDecoder<R>) -> Option<Result<S>>
where
    R: io::Read,
    S: Sample,
{
    match decoder.read_raw() {
        Ok(Some(raw)) => Some(Ok(S::from_raw(raw))),
        Ok(None) => None,
        Err(err) => Some(Err(err)),
    }
}

fn iter_size_hint<R>(decoder: &WavDecoder<R>) -> (usize, Option<usize>) {
    let width = decoder.format.bytes_per_sample() as u64;
    match decoder.data_len {
        Some(len) => {
            let samples_left = u64::from(len).saturating_sub(decoder.bytes_consumed) / width;
            (samples_left as usize, Some(samples_left as usize))
        }
        None => (0, None),
    }
}

impl<'wr, R, S> Iterator for WavSamples<'wr, R, S>
where
    R: io::Read,
    S: Sample,
{
    type Item = Result<S>;

    fn next(&mut self) -> Option<Result<S>> {
        iter_next(&mut self.decoder)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        iter_size_hint(&self.decoder)
    }
}

impl<R, S> Iterator for WavIntoSamples<R, S>
where
    R: io::Read,
    S: Sample,
{
    type Item = Result<S>;

    fn next(&mut self) -> Option<Result<S>> {
        iter_next(&mut self.decoder)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        iter_size_hint(&self.decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{WAVE_FORMAT_ALAW, WAVE_FORMAT_EXTENSIBLE, WAVE_FORMAT_IEEE_FLOAT, WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM};
    use crate::{ALaw, MuLaw};
    use approx::assert_abs_diff_eq;
    use rstest::rstest;
    use std::io::Cursor;

    /// Builds a chunk, including the pad byte for odd lengths.
    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut bytes = ChunkHeader { id: *id, len: body.len() as u32 }.to_bytes().to_vec();
        bytes.extend_from_slice(body);
        if body.len() % 2 == 1 {
            bytes.push(0);
        }
        bytes
    }

    fn fmt_body(format_tag: u16, channels: u16, sample_rate: u32, bits_per_sample: u16) -> Vec<u8> {
        let block_align = channels * bits_per_sample.div_ceil(8);
        FormatDescriptor {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * u32::from(block_align),
            block_align,
            bits_per_sample,
        }
        .to_bytes()
        .to_vec()
    }

    fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
        let body: Vec<u8> = chunks.concat();
        let mut bytes = RiffHeader { inner_len: 4 + body.len() as u32 }.to_bytes().to_vec();
        bytes.extend_from_slice(&body);
        bytes
    }

    fn simple(format_tag: u16, bits_per_sample: u16, data: &[u8]) -> Vec<u8> {
        riff(&[
            chunk(b"fmt ", &fmt_body(format_tag, 1, 8000, bits_per_sample)),
            chunk(b"data", data),
        ])
    }

    fn expect_malformed<T>(result: Result<T>) {
        match result {
            Err(Error::Malformed(_)) => {}
            Err(other) => panic!("expected Malformed, got {:?}", other),
            Ok(..) => panic!("expected Malformed, got Ok"),
        }
    }

    #[test]
    fn reads_8bit_unsigned_as_normalized() {
        let bytes = simple(WAVE_FORMAT_PCM, 8, &[128, 127, 129, 0, 255]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.config(), AudioConfig::new(8000, 1).unwrap());
        assert_eq!(decoder.format(), SampleFormat::Pcm8);

        let mut dst = [9.0_f64; 5];
        assert_eq!(decoder.read(&mut dst).unwrap(), (5, Status::EndOfStream));
        let expected = [0.0, -1.0 / 128.0, 1.0 / 128.0, -1.0, 127.0 / 128.0];
        for (x, e) in dst.iter().zip(&expected) {
            assert_abs_diff_eq!(*x, *e);
        }
        assert_eq!(decoder.read(&mut dst).unwrap(), (0, Status::EndOfStream));
    }

    #[test]
    fn short_destination_reports_ready() {
        let bytes = simple(WAVE_FORMAT_PCM, 8, &[128, 127, 129, 0, 255]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        let mut dst = [0_u8; 2];
        assert_eq!(decoder.read(&mut dst).unwrap(), (2, Status::Ready));
        assert_eq!(dst, [128, 127]);
        assert_eq!(decoder.read(&mut dst).unwrap(), (2, Status::Ready));
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::EndOfStream));
        assert_eq!(dst[0], 255);
        assert_eq!(decoder.bytes_consumed(), 5);
    }

    #[test]
    fn rejects_non_riff_streams() {
        let mut bytes = simple(WAVE_FORMAT_PCM, 16, &[0, 0]);
        bytes[0] = b'X';
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));

        let mut bytes = simple(WAVE_FORMAT_PCM, 16, &[0, 0]);
        bytes[8..12].copy_from_slice(b"AVI ");
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));

        expect_malformed(WavDecoder::new(Cursor::new(b"RIFF".to_vec())));
    }

    #[test]
    fn extensible_is_unsupported() {
        let mut body = fmt_body(WAVE_FORMAT_EXTENSIBLE, 2, 48000, 16);
        body.extend_from_slice(&22_u16.to_le_bytes());
        body.extend_from_slice(&16_u16.to_le_bytes());
        body.extend_from_slice(&3_u32.to_le_bytes());
        body.extend_from_slice(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00,
                                 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b, 0x71]);
        assert_eq!(body.len(), 40);
        let bytes = riff(&[chunk(b"fmt ", &body), chunk(b"data", &[0, 0, 0, 0])]);
        match WavDecoder::new(Cursor::new(bytes)) {
            Err(Error::Unsupported { format_tag, bits_per_sample }) => {
                assert_eq!(format_tag, WAVE_FORMAT_EXTENSIBLE);
                assert_eq!(bits_per_sample, 16);
            }
            Err(other) => panic!("expected Unsupported, got {:?}", other),
            Ok(..) => panic!("expected Unsupported, got Ok"),
        }
    }

    #[test]
    fn unsupported_bit_depth_is_unsupported() {
        let bytes = simple(WAVE_FORMAT_IEEE_FLOAT, 16, &[0, 0]);
        assert!(matches!(
            WavDecoder::new(Cursor::new(bytes)),
            Err(Error::Unsupported { format_tag: WAVE_FORMAT_IEEE_FLOAT, bits_per_sample: 16 })
        ));
    }

    #[test]
    fn skips_unknown_chunks() {
        // An odd-length LIST chunk with its pad byte, and a fact chunk.
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16)),
            chunk(b"LIST", b"INFOabc"),
            chunk(b"fact", &2_u32.to_le_bytes()),
            chunk(b"data", &[2, 0, 0xfd, 0xff]),
        ]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.data_offset(), 12 + 24 + 16 + 12 + 8);
        let samples: Vec<i16> = decoder.samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [2, -3]);
    }

    #[test]
    fn reads_wave_format_ex_fmt_chunks() {
        let mut body = fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16);
        body.extend_from_slice(&0_u16.to_le_bytes());
        let bytes = riff(&[chunk(b"fmt ", &body), chunk(b"data", &[5, 0, 0xf9, 0xff])]);
        let decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = decoder.into_samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [5, -7]);
    }

    #[test]
    fn forty_byte_fmt_chunk_needs_cb_size_22() {
        let mut body = fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16);
        body.extend_from_slice(&0_u16.to_le_bytes());
        body.extend_from_slice(&[0; 22]);
        let bytes = riff(&[chunk(b"fmt ", &body), chunk(b"data", &[0, 0])]);
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));
    }

    #[test]
    fn short_fmt_chunk_is_malformed() {
        let body = fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16);
        let bytes = riff(&[chunk(b"fmt ", &body[..14]), chunk(b"data", &[0, 0])]);
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));
    }

    #[test]
    fn zero_channels_is_malformed() {
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 0, 44100, 16)),
            chunk(b"data", &[0, 0]),
        ]);
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));
    }

    #[test]
    fn data_before_fmt_is_malformed() {
        let bytes = riff(&[
            chunk(b"data", &[0, 0]),
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16)),
        ]);
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));
    }

    #[test]
    fn missing_data_chunk_is_malformed() {
        let bytes = riff(&[chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 1, 44100, 16))]);
        expect_malformed(WavDecoder::new(Cursor::new(bytes)));
    }

    #[test]
    fn truncated_data_is_malformed() {
        let mut bytes = simple(WAVE_FORMAT_PCM, 16, &[1, 0, 2, 0, 3, 0]);
        bytes.truncate(bytes.len() - 3);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        let mut dst = [0_i16; 3];
        expect_malformed(decoder.read(&mut dst));
    }

    #[test]
    fn trailing_partial_sample_is_not_read() {
        let bytes = simple(WAVE_FORMAT_PCM, 16, &[1, 0, 2, 0, 3]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.len(), Some(2));
        let mut dst = [0_i16; 4];
        assert_eq!(decoder.read(&mut dst).unwrap(), (2, Status::EndOfStream));
        assert_eq!(&dst[..2], &[1, 2]);
        assert_eq!(decoder.bytes_consumed(), 4);
        assert_eq!(decoder.read(&mut dst).unwrap(), (0, Status::EndOfStream));
        assert_eq!(decoder.bytes_consumed(), 4);
    }

    #[rstest]
    #[case(0)]
    #[case(u32::MAX)]
    fn unbounded_data_reads_until_the_end(#[case] declared_len: u32) {
        let mut bytes = simple(WAVE_FORMAT_PCM, 16, &[]);
        let len_at = bytes.len() - 4;
        bytes[len_at..].copy_from_slice(&declared_len.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 2, 0, 3, 0]);

        let mut decoder = WavDecoder::new(Cursor::new(bytes.clone())).unwrap();
        assert_eq!(decoder.data_len(), None);
        assert_eq!(decoder.len(), None);
        assert_eq!(decoder.samples::<i16>().size_hint(), (0, None));

        let mut dst = [0_i16; 3];
        assert_eq!(decoder.read(&mut dst).unwrap(), (3, Status::Ready));
        assert_eq!(dst, [1, 2, 3]);
        assert_eq!(decoder.read(&mut dst).unwrap(), (0, Status::EndOfStream));

        // A stream that stops inside a sample is truncated.
        bytes.push(4);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        let mut dst = [0_i16; 4];
        expect_malformed(decoder.read(&mut dst));
    }

    #[rstest]
    #[case(WAVE_FORMAT_PCM, 8, &[0x40], 0x40 as f64 / 128.0 - 1.0)]
    #[case(WAVE_FORMAT_PCM, 16, &[0x00, 0xc0], -0.5)]
    #[case(WAVE_FORMAT_PCM, 24, &[0x00, 0x00, 0x40], 1.0 / 512.0)]
    #[case(WAVE_FORMAT_PCM, 32, &[0x00, 0x00, 0x00, 0xc0], -0.5)]
    #[case(WAVE_FORMAT_IEEE_FLOAT, 32, &0.375_f32.to_le_bytes(), 0.375)]
    #[case(WAVE_FORMAT_IEEE_FLOAT, 64, &(-0.75_f64).to_le_bytes(), -0.75)]
    #[case(WAVE_FORMAT_ALAW, 8, &[0xaa], 32256.0 / 32768.0)]
    #[case(WAVE_FORMAT_MULAW, 8, &[0x00], -32124.0 / 32768.0)]
    fn decodes_every_format_to_normalized(
        #[case] format_tag: u16,
        #[case] bits_per_sample: u16,
        #[case] data: &[u8],
        #[case] expected: f64,
    ) {
        let bytes = simple(format_tag, bits_per_sample, data);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.len(), Some(1));
        let mut dst = [0.0_f64; 1];
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::EndOfStream));
        assert_abs_diff_eq!(dst[0], expected);
    }

    #[test]
    fn native_paths_are_exact() {
        let data = [0xff, 0xff, 0xff, 0x00, 0x00, 0x80];
        let decoder = WavDecoder::new(Cursor::new(simple(WAVE_FORMAT_PCM, 24, &data))).unwrap();
        let samples: Vec<i32> = decoder.into_samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [-1, -8_388_608]);

        let mut data = Vec::new();
        for x in &[2.0_f32, 3.0, -16411.0, 1019.0] {
            data.extend_from_slice(&x.to_le_bytes());
        }
        let decoder = WavDecoder::new(Cursor::new(simple(WAVE_FORMAT_IEEE_FLOAT, 32, &data))).unwrap();
        let samples: Vec<f32> = decoder.into_samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [2.0, 3.0, -16411.0, 1019.0]);

        let decoder = WavDecoder::new(Cursor::new(simple(WAVE_FORMAT_ALAW, 8, &[0x13, 0xd5]))).unwrap();
        let samples: Vec<ALaw> = decoder.into_samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [ALaw(0x13), ALaw(0xd5)]);

        let decoder = WavDecoder::new(Cursor::new(simple(WAVE_FORMAT_MULAW, 8, &[0x13, 0xff]))).unwrap();
        let samples: Vec<MuLaw> = decoder.into_samples().map(|r| r.unwrap()).collect();
        assert_eq!(samples, [MuLaw(0x13), MuLaw(0xff)]);
    }

    #[test]
    fn len_and_size_hint_are_correct() {
        let bytes = riff(&[
            chunk(b"fmt ", &fmt_body(WAVE_FORMAT_PCM, 2, 44100, 16)),
            chunk(b"data", &[2, 0, 0xfd, 0xff, 5, 0, 0xf9, 0xff]),
        ]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.len(), Some(4));
        assert_eq!(decoder.duration(), Some(2));

        {
            let mut samples = decoder.samples::<i16>();
            assert_eq!(samples.size_hint(), (4, Some(4)));
            samples.next();
            assert_eq!(samples.size_hint(), (3, Some(3)));
        }

        // Reading should not affect the initial length.
        assert_eq!(decoder.len(), Some(4));

        // Creating a new iterator resumes where the previous iterator stopped.
        let mut samples = decoder.samples::<i16>();
        assert_eq!(samples.size_hint(), (3, Some(3)));
        assert_eq!(samples.next().unwrap().unwrap(), -3);
    }

    #[test]
    fn seek_repositions_within_the_data() {
        let bytes = simple(WAVE_FORMAT_PCM, 16, &[1, 0, 2, 0, 3, 0, 4, 0]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        let mut dst = [0_i16; 1];

        decoder.seek(2).unwrap();
        assert_eq!(decoder.bytes_consumed(), 4);
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::Ready));
        assert_eq!(dst[0], 3);

        decoder.seek(0).unwrap();
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::Ready));
        assert_eq!(dst[0], 1);

        decoder.seek(3).unwrap();
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::EndOfStream));
        assert_eq!(dst[0], 4);

        // Past the end there is nothing left.
        decoder.seek(10).unwrap();
        assert_eq!(decoder.read(&mut dst).unwrap(), (0, Status::EndOfStream));
    }

    #[test]
    fn seek_works_on_unbounded_data() {
        let mut bytes = simple(WAVE_FORMAT_PCM, 16, &[]);
        let len_at = bytes.len() - 4;
        bytes[len_at..].copy_from_slice(&0_u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 2, 0, 3, 0, 4, 0]);

        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.data_len(), None);
        let mut dst = [0_i16; 1];

        decoder.seek(0).unwrap();
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::Ready));
        assert_eq!(dst[0], 1);

        decoder.seek(3).unwrap();
        assert_eq!(decoder.read(&mut dst).unwrap(), (1, Status::Ready));
        assert_eq!(dst[0], 4);
        assert_eq!(decoder.read(&mut dst).unwrap(), (0, Status::EndOfStream));
    }

    #[test]
    fn seek_out_of_range_is_invalid_input() {
        let bytes = simple(WAVE_FORMAT_PCM, 16, &[1, 0, 2, 0]);
        let mut decoder = WavDecoder::new(Cursor::new(bytes)).unwrap();
        for &sample in &[u64::MAX, 1 << 62] {
            match decoder.seek(sample) {
                Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::InvalidInput),
                other => panic!("expected InvalidInput, got {:?}", other),
            }
        }
        assert_eq!(decoder.bytes_consumed(), 0);
    }

    /// A reader that fails with `ConnectionReset` once `limit` bytes were read.
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let left = self.limit.saturating_sub(self.inner.position());
            if left == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            let n = buf.len().min(left as usize);
            io::Read::read(&mut self.inner, &mut buf[..n])
        }
    }

    #[test]
    fn io_errors_inside_a_sample_are_passed_through() {
        let bytes = simple(WAVE_FORMAT_PCM, 16, &[1, 0, 2, 0, 3, 0]);
        // Fail after the first byte of the second sample.
        let limit = bytes.len() as u64 - 3;
        let reader = FailingReader { inner: Cursor::new(bytes), limit };
        let mut decoder = WavDecoder::new(reader).unwrap();
        let mut dst = [0_i16; 3];
        match decoder.read(&mut dst) {
            Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected ConnectionReset, got {:?}", other),
        }
    }

    #[test]
    fn pcm24_normalizes_like_its_i32_container() {
        let data = [0x00, 0x00, 0x40, 0xff, 0xff, 0xff, 0x00, 0x00, 0x80, 0xff, 0xff, 0x7f];
        let bytes = simple(WAVE_FORMAT_PCM, 24, &data);

        let direct: Vec<f64> = WavDecoder::new(Cursor::new(bytes.clone()))
            .unwrap()
            .into_samples()
            .map(|r| r.unwrap())
            .collect();
        let native: Vec<i32> = WavDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_samples()
            .map(|r| r.unwrap())
            .collect();
        let mut via_i32 = vec![0.0_f64; native.len()];
        assert_eq!(crate::convert(&native, &mut via_i32), 4);

        assert_eq!(native, [4_194_304, -1, -8_388_608, 8_388_607]);
        assert_eq!(direct, via_i32);
    }

    #[test]
    fn samples_equals_into_samples() {
        let bytes = simple(WAVE_FORMAT_PCM, 8, &[19, 53, 89, 127, 200]);
        let decoder_val = WavDecoder::new(Cursor::new(bytes.clone())).unwrap();
        let mut decoder_ref = WavDecoder::new(Cursor::new(bytes)).unwrap();

        let samples_val: Vec<i16> = decoder_val.into_samples().map(|r| r.unwrap()).collect();
        let samples_ref: Vec<i16> = decoder_ref.samples().map(|r| r.unwrap()).collect();

        assert_eq!(samples_val, samples_ref);
        assert_eq!(samples_val.len(), 5);
    }

    #[test]
    fn skip_bytes_fails_on_a_short_reader() {
        let mut cursor = Cursor::new(vec![0_u8; 3]);
        assert!(cursor.skip_bytes(3).is_ok());
        let mut cursor = Cursor::new(vec![0_u8; 3]);
        let err = cursor.skip_bytes(4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
