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

//! Error types shared by every stage of the pipeline.

use std::io;
use std::result;

use thiserror::Error;

use crate::compressed::Mode;

/// Represents an error that occurred while reading, converting or writing audio.
#[derive(Error, Debug)]
pub enum Error {
    /// The file format is incorrect.
    #[error("Format error: {0}")]
    Format(FormatErrorKind),

    /// The file is well-formed but uses an encoding we refuse to guess at.
    #[error("Unsupported format: format tag {format_tag:#06x}, {bits_per_sample} bits per sample")]
    Unsupported { format_tag: u16, bits_per_sample: u16 },

    /// The transcoder could not be instantiated for the requested mode.
    #[error("Transcoder unavailable for mode {0}")]
    TranscoderUnavailable(Mode),

    /// An IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Represents a result of any fallible operation in this crate.
pub type Result<T> = result::Result<T, Error>;

/// Represents a file format error, when the input is malformed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// The file does not start with a "RIFF" tag and chunk size.
    #[error("not a RIFF file")]
    NotARiffFile,
    /// The file doesn't continue with "WAVE" after the RIFF chunk header.
    #[error("not a WAVE file")]
    NotAWaveFile,
    /// The input ended before a "fmt " chunk preceding the data was found.
    #[error("fmt chunk is missing")]
    MissingFmtChunk,
    /// The input ended before a "data" chunk was found.
    #[error("data chunk is missing")]
    MissingDataChunk,
    /// This file is missing header data and can't be parsed.
    #[error("fmt chunk is too short")]
    FmtChunkTooShort,
    /// A chunk claims more bytes than the file holds.
    #[error("chunk {tag:?} of {size} bytes runs past the end of the file")]
    ChunkPastEndOfFile { tag: [u8; 4], size: u32 },
    /// The number of channels is zero, which is invalid.
    #[error("number of channels is zero")]
    NumChannelsIsZero,
    /// The sample rate is zero, which is invalid.
    #[error("sample rate is zero")]
    SampleRateIsZero,
    /// The data chunk doesn't hold a whole number of sample frames.
    #[error("data chunk of {size} bytes is not a multiple of the {block_align}-byte block")]
    DataNotFrameAligned { size: u64, block_align: u64 },
    /// The sample data would overflow the 32-bit size fields of the header.
    #[error("sample data exceeds the 4 GiB limit of a wave file")]
    DataTooLarge,
    /// The compressed file doesn't start with the expected magic value.
    #[error("bad compressed file magic {0:#010x}")]
    BadMagic(u32),
    /// The compressed file ended before its 16-byte header was complete.
    #[error("compressed header is truncated")]
    TruncatedHeader,
    /// The compressed file names a mode we don't know.
    #[error("unknown mode identifier {0}")]
    UnknownMode(u32),
    /// The frame geometry in the header disagrees with the transcoder.
    #[error(
        "frame geometry mismatch: header has {header_samples} samples/{header_bits} bits, \
         transcoder has {samples} samples/{bits} bits"
    )]
    GeometryMismatch {
        header_samples: u32,
        header_bits: u32,
        samples: u32,
        bits: u32,
    },
    /// A frame handed to the compressed writer has the wrong length.
    #[error("frame of {got} bytes, expected {expected}")]
    FrameLengthMismatch { got: usize, expected: usize },
    /// The last compressed frame is shorter than the declared frame length.
    #[error("truncated frame: got {got} of {expected} bytes")]
    TruncatedFrame { got: usize, expected: usize },
}

impl From<FormatErrorKind> for Error {
    fn from(kind: FormatErrorKind) -> Error {
        Error::Format(kind)
    }
}
