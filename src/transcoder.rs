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

//! The seam to a fixed-rate, frame-based speech codec.
//!
//! A transcoder instance is created for one [`Mode`](crate::Mode) and
//! released when dropped. Every frame it consumes holds exactly
//! `samples_per_frame()` canonical samples, and every frame it produces holds
//! exactly `bytes_per_frame()` bytes.

/// Rounds a bit count up to whole bytes.
pub fn bytes_per_frame(bits_per_frame: usize) -> usize {
    (bits_per_frame + 7) / 8
}

pub trait Transcoder {
    /// Canonical samples consumed by `encode` and produced by `decode`.
    fn samples_per_frame(&self) -> usize;

    /// Significant bits in one encoded frame.
    fn bits_per_frame(&self) -> usize;

    /// Bytes in one encoded frame.
    fn bytes_per_frame(&self) -> usize {
        bytes_per_frame(self.bits_per_frame())
    }

    /// Encodes `samples_per_frame()` samples into `bytes_per_frame()` bytes.
    fn encode(&mut self, speech: &[i16], bits: &mut [u8]);

    /// Decodes `bytes_per_frame()` bytes into `samples_per_frame()` samples.
    fn decode(&mut self, bits: &[u8], speech: &mut [i16]);
}

impl<'a, T> Transcoder for &'a mut T
    where T: Transcoder + ?Sized
{
    fn samples_per_frame(&self) -> usize {
        (**self).samples_per_frame()
    }

    fn bits_per_frame(&self) -> usize {
        (**self).bits_per_frame()
    }

    fn encode(&mut self, speech: &[i16], bits: &mut [u8]) {
        (**self).encode(speech, bits)
    }

    fn decode(&mut self, bits: &[u8], speech: &mut [i16]) {
        (**self).decode(bits, speech)
    }
}

impl<T> Transcoder for Box<T>
    where T: Transcoder + ?Sized
{
    fn samples_per_frame(&self) -> usize {
        (**self).samples_per_frame()
    }

    fn bits_per_frame(&self) -> usize {
        (**self).bits_per_frame()
    }

    fn encode(&mut self, speech: &[i16], bits: &mut [u8]) {
        (**self).encode(speech, bits)
    }

    fn decode(&mut self, bits: &[u8], speech: &mut [i16]) {
        (**self).decode(bits, speech)
    }
}
