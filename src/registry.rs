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

//! Lookup of audio codecs by the magic bytes at the start of a stream.

use std::fmt;
use std::io;

use tracing::debug;

use crate::read::ReadExt;
use crate::{AudioConfig, Error, Result, SampleFormat, SamplesMut, Status};

/// A readable and seekable byte stream that can be handed to a codec.
pub trait ReadSeek: io::Read + io::Seek + Send {}

impl<T> ReadSeek for T where T: io::Read + io::Seek + Send {}

/// A decoder behind a trait object, as returned by [`Registry::open`].
pub trait Decoder: Send {
    /// Returns the sample rate and channel count of the stream.
    fn config(&self) -> AudioConfig;

    /// Returns the encoding of the samples in the stream.
    fn format(&self) -> SampleFormat;

    /// Decodes samples into `dst`, see [`WavDecoder::read`](crate::WavDecoder::read).
    fn read(&mut self, dst: SamplesMut<'_>) -> Result<(usize, Status)>;

    /// Seeks to the given sample, see [`WavDecoder::seek`](crate::WavDecoder::seek).
    fn seek(&mut self, sample: u64) -> Result<()>;
}

/// A codec that can be looked up in a [`Registry`].
#[derive(Clone, Copy)]
pub struct Format {
    /// A short lowercase name, e.g. `"wav"`.
    pub name: &'static str,
    /// The bytes every stream in this format starts with.
    pub magic: &'static [u8],
    /// Constructs a decoder over a stream positioned at its first byte.
    pub open: fn(Box<dyn ReadSeek>) -> Result<Box<dyn Decoder>>,
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Format")
            .field("name", &self.name)
            .field("magic", &self.magic)
            .finish()
    }
}

/// A set of codecs, looked up by the magic bytes of a stream.
///
/// Nothing is registered implicitly. Codecs are added with
/// [`Registry::register`], or for this crate's codec with
/// [`register`](crate::register).
///
/// ```
/// let mut registry = riffwav::Registry::new();
/// riffwav::register(&mut registry);
/// assert_eq!(registry.formats().len(), 1);
/// assert_eq!(registry.formats()[0].name, "wav");
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    formats: Vec<Format>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Adds a codec. Formats registered earlier take precedence on equal magic.
    pub fn register(&mut self, format: Format) {
        debug!(name = format.name, "registered format");
        self.formats.push(format);
    }

    /// Returns the registered formats in registration order.
    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    fn lookup(&self, prefix: &[u8]) -> Option<&Format> {
        self.formats
            .iter()
            .find(|format| prefix.starts_with(format.magic))
    }

    /// Returns the name of the format of the stream, if any registered format matches.
    ///
    /// The reader is returned to the position it had before the call.
    pub fn identify<R: io::Read + io::Seek>(&self, reader: &mut R) -> Result<Option<&'static str>> {
        let max_len = self.formats.iter().map(|f| f.magic.len()).max().unwrap_or(0);
        let start = reader.stream_position()?;
        let mut prefix = vec![0_u8; max_len];
        let n = reader.read_up_to(&mut prefix)?;
        reader.seek(io::SeekFrom::Start(start))?;
        Ok(self.lookup(&prefix[..n]).map(|format| format.name))
    }

    /// Opens a decoder for the stream with the first registered format whose magic matches.
    ///
    /// Returns the decoder together with the name of its format, or
    /// `Error::UnknownFormat` if no format recognizes the stream.
    pub fn open<R>(&self, mut reader: R) -> Result<(Box<dyn Decoder>, &'static str)>
    where
        R: ReadSeek + 'static,
    {
        let name = self.identify(&mut reader)?.ok_or(Error::UnknownFormat)?;
        let format = self
            .formats
            .iter()
            .find(|format| format.name == name)
            .ok_or(Error::UnknownFormat)?;
        let decoder = (format.open)(Box::new(reader))?;
        Ok((decoder, format.name))
    }
}
