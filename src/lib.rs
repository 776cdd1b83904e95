// c2wave -- Wave file normalization for fixed-rate speech codecs.
// Copyright (c) 2016 Kevin Brothaler and the riff-wave project authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reads wave PCM files of any common shape and turns them into the fixed
//! 8 kHz, mono, 16-bit sample stream a frame-based speech codec expects, and
//! writes such a stream back out as a canonical wave file.
//!
//! The pipeline has four stages:
//!
//! 1. [`chunk`] walks the RIFF chunk structure and locates the format
//!    description and the sample data.
//! 2. [`decoder`] turns raw 8, 16, 24 or 32-bit PCM frames into mono 16-bit
//!    samples.
//! 3. [`resampler`] converts those samples to 8000 Hz with linear
//!    interpolation, carrying its position across calls.
//! 4. [`pump`] fills fixed-size frames for a [`Transcoder`], and drives the
//!    reverse direction from a [`compressed`] file into a [`WaveWriter`].
//!
//! # The wave file format
//!
//! The wave file format starts with the RIFF file header:
//!
//! Offset | Size | Data       |    Description
//! -----: | ---: | ---------- | ----------------------------------------------
//!      0 |    4 | "RIFF"     | Identifies the main chunk.
//!      4 |    4 | chunk size | The size of the rest of the file. Informational only; it is never trusted.
//!      8 |    4 | "WAVE"     | Indicates that this is a wave file.
//!
//! Then follows a sequence of subchunks, each an ASCII tag, a 32-bit
//! little-endian size, and that many bytes of payload. Two of them matter:
//!
//! * The "fmt " subchunk, which describes the samples.
//! * The "data" subchunk, which holds the samples.
//!
//! Everything else ("LIST", "fact", ...) is skipped. If several "fmt "
//! subchunks precede the data, the last one wins.
//!
//! ## The "fmt " subchunk
//!
//! Offset | Size | Data            | Description
//! -----: | ---: | --------------- | -----------------------------------------
//!      0 |    2 | format          | 1 for integer PCM, 3 for IEEE float, 0xFFFE for the extensible format.
//!      2 |    2 | num channels    | Mono, stereo, or something else.
//!      4 |    4 | sample rate     | Frames per second.
//!      8 |    4 | byte rate       | Not interpreted.
//!     12 |    2 | block align     | Not interpreted; recomputed from channels and bits.
//!     14 |    2 | bits per sample | 8, 16, 24 or 32 are supported.
//!
//! For the extensible format, an extension of at least 22 bytes follows whose
//! sub-format GUID starts with the effective format code. Any other extension
//! bytes are skipped.
//!
//! ## The "data" subchunk
//!
//! The data subchunk holds interleaved frames; a frame is one sample per
//! channel. 8-bit samples are unsigned with an offset of 128, wider samples
//! are signed little-endian integers. The subchunk size must be a whole
//! number of frames and must fit inside the file.
//!
//! ## Writing
//!
//! [`WaveWriter`] always writes the canonical 44-byte header: "RIFF", a
//! 16-byte PCM "fmt " chunk for 8000 Hz mono 16-bit, and one "data" chunk.
//! The two size fields (offsets 4 and 40) are placeholders until the writer
//! is finalized.

#[cfg(test)]
#[macro_use]
mod test_macros {
    // This is a helper macro that helps us validate results in our tests.
    // Thank you bluss and durka42!
    macro_rules! assert_matches {
        ($expected:pat $(if $guard:expr)*, $value:expr) => {
            match $value {
                $expected $(if $guard)* => {},
                ref actual => {
                    panic!("assertion failed: `(left matches right)` (left: `{}`, right: `{:?}`",
                        stringify!($expected), actual);
                },
            }
        };
    }
}

pub mod chunk;
pub mod compressed;
pub mod decoder;
pub mod error;
pub mod pump;
pub mod reader;
pub mod resampler;
pub mod transcoder;
pub mod writer;

pub use crate::compressed::{CompressedHeader, CompressedReader, CompressedWriter, Mode};
pub use crate::error::{Error, FormatErrorKind, Result};
pub use crate::pump::{DecodeSummary, EncodeSummary};
pub use crate::reader::{SampleSource, WaveReader};
pub use crate::transcoder::Transcoder;
pub use crate::writer::WaveWriter;

// MARK: Format description

pub const FORMAT_PCM: u16 = 1;
pub const FORMAT_IEEE_FLOAT: u16 = 3;
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// The encoding named by the format code of a "fmt " chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Pcm,
    Float,
    Extensible,
    Other(u16),
}

impl FormatTag {
    pub fn from_code(code: u16) -> FormatTag {
        match code {
            FORMAT_PCM => FormatTag::Pcm,
            FORMAT_IEEE_FLOAT => FormatTag::Float,
            FORMAT_EXTENSIBLE => FormatTag::Extensible,
            other => FormatTag::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match *self {
            FormatTag::Pcm => FORMAT_PCM,
            FormatTag::Float => FORMAT_IEEE_FLOAT,
            FormatTag::Extensible => FORMAT_EXTENSIBLE,
            FormatTag::Other(code) => code,
        }
    }
}

/// The sample layout of a wave file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub format_tag: FormatTag,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// The number of bytes in one frame (one sample for every channel).
    pub fn block_align(&self) -> u64 {
        u64::from(self.num_channels) * u64::from(self.bits_per_sample / 8)
    }

    /// The number of bytes per second of audio.
    pub fn byte_rate(&self) -> u64 {
        u64::from(self.sample_rate) * self.block_align()
    }
}

/// The fixed format everything is converted to: 8000 Hz, mono, 16-bit signed.
pub const CANONICAL_FORMAT: PcmFormat = PcmFormat {
    format_tag: FormatTag::Pcm,
    num_channels: 1,
    sample_rate: 8000,
    bits_per_sample: 16,
};

/// Tunables for [`WaveReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// How many source frames are read, decoded and resampled per refill.
    /// Output does not depend on this value.
    pub block_frames: usize,
}

impl Default for ReaderOptions {
    fn default() -> ReaderOptions {
        ReaderOptions { block_frames: 4096 }
    }
}
