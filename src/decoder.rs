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

//! Decodes interleaved PCM frames into mono 16-bit samples.
//!
//! Each channel value is first mapped into the 16-bit range:
//!
//! Bits | Encoding                    | Mapping
//! ---: | --------------------------- | -----------------------
//!    8 | unsigned, offset 128        | `(byte - 128) * 256`
//!   16 | signed little-endian        | unchanged
//!   24 | signed little-endian        | `value >> 8`
//!   32 | signed little-endian        | `value >> 16`
//!
//! The shifts are arithmetic. The channels of a frame are then averaged, and
//! the mean is truncated toward zero: `(100, 300)` gives `200`, `(100, -101)`
//! gives `0`, `(-3, -4)` gives `-3`.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::{FormatTag, PcmFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitDepth {
    Unsigned8,
    Signed16,
    Signed24,
    Signed32,
}

impl BitDepth {
    fn width(&self) -> usize {
        match *self {
            BitDepth::Unsigned8 => 1,
            BitDepth::Signed16 => 2,
            BitDepth::Signed24 => 3,
            BitDepth::Signed32 => 4,
        }
    }
}

/// Turns raw frames of one fixed layout into mono 16-bit samples. The layout
/// is chosen once, when the decoder is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDecoder {
    depth: BitDepth,
    channels: u16,
}

impl SampleDecoder {
    /// Selects the decoder for a format, refusing anything that isn't 8, 16,
    /// 24 or 32-bit integer PCM.
    pub fn new(encoding: FormatTag, format: &PcmFormat) -> Result<SampleDecoder> {
        let unsupported = Error::Unsupported {
            format_tag: encoding.code(),
            bits_per_sample: format.bits_per_sample,
        };

        if encoding != FormatTag::Pcm || format.num_channels == 0 {
            return Err(unsupported);
        }

        let depth = match format.bits_per_sample {
            8 => BitDepth::Unsigned8,
            16 => BitDepth::Signed16,
            24 => BitDepth::Signed24,
            32 => BitDepth::Signed32,
            _ => return Err(unsupported),
        };

        Ok(SampleDecoder {
            depth: depth,
            channels: format.num_channels,
        })
    }

    /// The number of bytes in one input frame.
    pub fn block_align(&self) -> usize {
        self.depth.width() * usize::from(self.channels)
    }

    /// Decodes every whole frame in `bytes`, appending one sample per frame
    /// to `out`. Returns the number of samples appended. A trailing partial
    /// frame is ignored.
    pub fn decode(&self, bytes: &[u8], out: &mut Vec<i16>) -> usize {
        match self.depth {
            BitDepth::Unsigned8 => self.decode_with(bytes, out, |b| (i32::from(b[0]) - 128) * 256),
            BitDepth::Signed16 => self.decode_with(bytes, out, |b| i32::from(LittleEndian::read_i16(b))),
            BitDepth::Signed24 => self.decode_with(bytes, out, |b| LittleEndian::read_i24(b) >> 8),
            BitDepth::Signed32 => self.decode_with(bytes, out, |b| LittleEndian::read_i32(b) >> 16),
        }
    }

    fn decode_with<F>(&self, bytes: &[u8], out: &mut Vec<i16>, to_16bit: F) -> usize
        where F: Fn(&[u8]) -> i32
    {
        let width = self.depth.width();
        let frames = bytes.chunks_exact(self.block_align());
        let count = frames.len();
        out.reserve(count);

        for frame in frames {
            let sum: i64 = frame.chunks_exact(width).map(|b| i64::from(to_16bit(b))).sum();
            out.push(downmix(sum, self.channels));
        }

        count
    }
}

/// Averages a sum of per-channel 16-bit values, truncating toward zero.
pub fn downmix(sum: i64, channels: u16) -> i16 {
    // Every term is within the i16 range, so the mean is too.
    (sum / i64::from(channels)) as i16
}

// MARK: Tests
