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
use std::io::{Seek, Write};
use std::path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use tracing::{debug, trace};

use crate::wav::{self, FormatDescriptor, DATA_SIZE_OFFSET, HEADER_LEN, RIFF_SIZE_OFFSET};
use crate::{AudioConfig, Error, Result, Sample};

/// The largest data chunk for which the RIFF length still fits in 32 bits.
const MAX_DATA_LEN: u32 = u32::MAX - 36;

/// Extends the functionality of seekable writers with additional methods.
pub trait WriteExt: io::Write + io::Seek {
    /// Writes an unsigned 32-bit integer in little endian format at an absolute position.
    ///
    /// The writer is left positioned right after the written bytes.
    fn write_le_u32_at(&mut self, pos: u64, x: u32) -> io::Result<()>;
}

impl<W> WriteExt for W
where
    W: io::Write + io::Seek,
{
    fn write_le_u32_at(&mut self, pos: u64, x: u32) -> io::Result<()> {
        self.seek(io::SeekFrom::Start(pos))?;
        self.write_u32::<LittleEndian>(x)
    }
}

/// An encoder that accepts samples and writes them as 16-bit PCM in the WAVE format.
///
/// The header is written immediately, with 0 in both size fields. They are
/// patched once the number of samples is known: on `flush`, and when the
/// encoder is closed. If `close` is not called, the stream will be finalized
/// upon drop. However, finalization involves IO that may fail, and without
/// calling `close`, such a failure cannot be observed.
///
/// ```
/// use std::io::Cursor;
///
/// let config = riffwav::AudioConfig::new(8_000, 2).unwrap();
/// let mut buffer = Cursor::new(Vec::new());
/// let mut encoder = riffwav::WavEncoder::new(&mut buffer, config).unwrap();
/// encoder.write(&[0.5_f32, -0.5]).unwrap();
/// encoder.write(&[1_i16, -1]).unwrap();
/// assert_eq!(encoder.samples_written(), 4);
/// encoder.close().unwrap();
/// assert_eq!(buffer.into_inner().len(), 44 + 8);
/// ```
pub struct WavEncoder<W>
where
    W: io::Write + io::Seek,
{
    /// Sample rate and channel count of the stream.
    config: AudioConfig,

    /// The writer that will be written to.
    writer: io::BufWriter<W>,

    /// Position of the writer when the encoder was created.
    ///
    /// The size fields are patched relative to this position.
    origin: u64,

    /// The number of bytes written to the data section.
    ///
    /// This is an `u32` because WAVE cannot accommodate more data.
    data_len: u32,

    /// Samples of the current `write` call, encoded as bytes.
    buffer: Vec<u8>,

    /// Whether a write failed. The encoder refuses any further IO afterwards.
    failed: bool,

    /// Whether `finalize_internal` has been called.
    finalized: bool,
}

impl<W> WavEncoder<W>
where
    W: io::Write + io::Seek,
{
    /// The number of bits per sample in the data chunk.
    pub const BITS_PER_SAMPLE: u16 = 16;

    /// Creates an encoder that writes the WAVE format to the underlying writer.
    ///
    /// The header is written at the current position of the writer, which
    /// does not need to be 0. `WavEncoder` employs buffering internally to
    /// avoid too many `write` calls to the underlying writer.
    pub fn new(mut writer: W, config: AudioConfig) -> Result<WavEncoder<W>> {
        let format = FormatDescriptor::pcm16(config)?;
        let origin = writer.stream_position()?;

        let mut header = wav::pcm16_header(format, 0);
        LittleEndian::write_u32(&mut header[RIFF_SIZE_OFFSET as usize..][..4], 0);

        let mut writer = io::BufWriter::new(writer);
        writer.write_all(&header)?;

        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            origin,
            "encoding wav stream"
        );

        Ok(WavEncoder {
            config,
            writer,
            origin,
            data_len: 0,
            buffer: Vec::new(),
            failed: false,
            finalized: false,
        })
    }

    /// Returns the sample rate and channel count of the stream.
    pub fn config(&self) -> AudioConfig {
        self.config
    }

    /// Returns the number of samples written so far, for all channels together.
    pub fn samples_written(&self) -> u64 {
        u64::from(self.data_len) / 2
    }

    /// Returns the number of bytes written to the data chunk so far.
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Writes samples, returns how many were written.
    ///
    /// WAVE interleaves channel data, so the channel that a sample belongs to
    /// depends on previous writes. Every sample is converted to 16-bit PCM
    /// with [`Sample::to_pcm16`], which copies `i16` samples and quantizes all
    /// others through their normalized value.
    ///
    /// If the underlying writer accepts fewer bytes than it was given, this
    /// returns `Error::ShortWrite` with the number of samples that did make
    /// it. After any failed write the encoder is unusable, and further calls
    /// return `Error::EncoderFailed`.
    pub fn write<S: Sample>(&mut self, samples: &[S]) -> Result<usize> {
        if self.failed {
            return Err(Error::EncoderFailed);
        }

        let new_len = u64::from(self.data_len) + samples.len() as u64 * 2;
        if new_len > u64::from(MAX_DATA_LEN) {
            return Err(Error::DataTooLarge);
        }

        self.buffer.clear();
        self.buffer.reserve(samples.len() * 2);
        for &sample in samples {
            let mut bytes = [0_u8; 2];
            LittleEndian::write_i16(&mut bytes, sample.to_pcm16());
            self.buffer.extend_from_slice(&bytes);
        }

        let result = loop {
            match self.writer.write(&self.buffer) {
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(n) if n == self.buffer.len() => {
                self.data_len = new_len as u32;
                Ok(samples.len())
            }
            Ok(n) => {
                self.failed = true;
                let written = n / 2;
                self.data_len += (written * 2) as u32;
                Err(Error::ShortWrite { written })
            }
            Err(err) => {
                self.failed = true;
                Err(err.into())
            }
        }
    }

    /// Flushes all samples, and updates the header to include them.
    ///
    /// After a successful flush, the stream written so far is a valid wav
    /// file. The encoder can still be written to afterwards.
    pub fn flush(&mut self) -> Result<()> {
        if self.failed {
            return Err(Error::EncoderFailed);
        }
        self.update_header()
    }

    /// Patches both size fields, then positions the writer at the end of the data.
    fn update_header(&mut self) -> Result<()> {
        let result = self.patch_sizes();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn patch_sizes(&mut self) -> Result<()> {
        let riff_len = wav::riff_size(self.data_len);
        self.writer.write_le_u32_at(self.origin + RIFF_SIZE_OFFSET, riff_len)?;
        self.writer.write_le_u32_at(self.origin + DATA_SIZE_OFFSET, self.data_len)?;
        let end = self.origin + HEADER_LEN + u64::from(self.data_len);
        self.writer.seek(io::SeekFrom::Start(end))?;
        self.writer.flush()?;
        trace!(riff_len, data_len = self.data_len, "patched header");
        Ok(())
    }

    /// Performs finalization. After calling this, the encoder should be destructed.
    fn finalize_internal(&mut self) -> Result<()> {
        self.finalized = true;
        if self.failed {
            return Err(Error::EncoderFailed);
        }

        self.update_header()?;

        // Signal error if the last frame was not finished, but do so after
        // everything has been written, so that no data is lost, even though
        // the stream now ends in the middle of a frame.
        if self.samples_written() % u64::from(self.config.channels) != 0 {
            return Err(Error::UnfinishedFrame);
        }

        Ok(())
    }

    /// Writes the parts of the WAVE format that require knowing all samples.
    ///
    /// This method must be called after all samples have been written. If it
    /// is not called, the destructor will finalize the stream, but any errors
    /// that occur in the process cannot be observed in that manner.
    pub fn close(mut self) -> Result<()> {
        self.finalize_internal()
    }
}

impl<W> Drop for WavEncoder<W>
where
    W: io::Write + io::Seek,
{
    fn drop(&mut self) {
        // `finalize_internal` must be called only once. If that is done via
        // `close`, then this method is a no-op. If the user did not close
        // explicitly, then we should do it now. This can fail, but drop
        // should not panic, so a failure is ignored silently here.
        if !self.finalized {
            let _r = self.finalize_internal();
        }
    }
}

impl WavEncoder<fs::File> {
    /// Creates an encoder that writes the WAVE format to a file.
    ///
    /// This is a convenience constructor that creates the file and then
    /// constructs a `WavEncoder` from it. The file will be overwritten if it
    /// exists.
    pub fn create<P: AsRef<path::Path>>(filename: P, config: AudioConfig) -> Result<WavEncoder<fs::File>> {
        let file = fs::File::create(filename)?;
        WavEncoder::new(file, config)
    }
}
