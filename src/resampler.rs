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

//! Streaming linear-interpolation sample rate conversion.
//!
//! Output sample `n` sits at source position `n * source_rate / target_rate`.
//! The position is computed from the output counter with integer arithmetic,
//! so the result never depends on how the input was split across calls and
//! the fractional phase never drifts, however long the stream.

use log::debug;

use crate::error::{FormatErrorKind, Result};

/// Converts mono 16-bit samples from one rate to another.
#[derive(Debug, Clone)]
pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    // Source samples that later outputs may still reference.
    pending: Vec<i16>,
    // Absolute source index of pending[0].
    consumed: u64,
    // Output samples produced so far.
    produced: u64,
}

impl Resampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Resampler> {
        if source_rate == 0 || target_rate == 0 {
            return Err(FormatErrorKind::SampleRateIsZero.into());
        }

        debug!("resampling {} Hz -> {} Hz (ratio {:.4})",
               source_rate,
               target_rate,
               f64::from(source_rate) / f64::from(target_rate));

        Ok(Resampler {
            source_rate: source_rate,
            target_rate: target_rate,
            pending: Vec::new(),
            consumed: 0,
            produced: 0,
        })
    }

    /// Source samples per output sample.
    pub fn ratio(&self) -> f64 {
        f64::from(self.source_rate) / f64::from(self.target_rate)
    }

    pub fn is_passthrough(&self) -> bool {
        self.source_rate == self.target_rate
    }

    /// The fractional offset into the next unread source sample; always
    /// equal to `produced * ratio mod 1`.
    pub fn phase(&self) -> f64 {
        self.position(self.produced).1
    }

    /// Total output samples produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// The number of output samples a stream of `source_samples` yields once
    /// flushed.
    pub fn output_len(&self, source_samples: u64) -> u64 {
        let num = u128::from(source_samples) * u128::from(self.target_rate);
        let den = u128::from(self.source_rate);
        ((num + den - 1) / den) as u64
    }

    /// Feeds source samples in and appends every output sample whose
    /// neighbours are now known. Returns the number of samples appended.
    pub fn process(&mut self, input: &[i16], out: &mut Vec<i16>) -> usize {
        if self.is_passthrough() {
            out.extend_from_slice(input);
            self.produced += input.len() as u64;
            self.consumed += input.len() as u64;
            return input.len();
        }

        self.pending.extend_from_slice(input);
        self.drain(out, false)
    }

    /// Signals the end of the source and appends the remaining output
    /// samples, holding the last source sample flat past the end.
    pub fn flush(&mut self, out: &mut Vec<i16>) -> usize {
        if self.is_passthrough() {
            return 0;
        }

        let count = self.drain(out, true);
        self.consumed += self.pending.len() as u64;
        self.pending.clear();
        count
    }

    fn drain(&mut self, out: &mut Vec<i16>, at_end: bool) -> usize {
        let mut count = 0;

        loop {
            let (index, frac) = self.position(self.produced);
            let idx = (index - self.consumed) as usize;
            // Interpolation needs the next sample too, unless there is none.
            let needed = if at_end { idx + 1 } else { idx + 2 };
            if needed > self.pending.len() {
                break;
            }

            let s0 = self.pending[idx];
            let s1 = self.pending.get(idx + 1).copied().unwrap_or(s0);
            out.push(interpolate(s0, s1, frac));
            self.produced += 1;
            count += 1;
        }

        let (next_index, _) = self.position(self.produced);
        let done = ((next_index - self.consumed) as usize).min(self.pending.len());
        self.pending.drain(..done);
        self.consumed += done as u64;

        count
    }

    fn position(&self, output_index: u64) -> (u64, f64) {
        let num = u128::from(output_index) * u128::from(self.source_rate);
        let den = u128::from(self.target_rate);
        ((num / den) as u64, (num % den) as f64 / den as f64)
    }
}

fn interpolate(s0: i16, s1: i16, frac: f64) -> i16 {
    let s0 = f64::from(s0);
    let s1 = f64::from(s1);
    let value = (s0 + frac * (s1 - s0)).round();
    value.max(f64::from(i16::MIN)).min(f64::from(i16::MAX)) as i16
}

// MARK: Tests
