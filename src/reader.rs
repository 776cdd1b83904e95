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

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use log::info;

use crate::chunk::{scan_wave_header, DataRegion, WaveHeader};
use crate::decoder::SampleDecoder;
use crate::error::Result;
use crate::resampler::Resampler;
use crate::{PcmFormat, ReaderOptions, CANONICAL_FORMAT};

/// Something that hands out canonical (8000 Hz, mono, 16-bit) samples.
pub trait SampleSource {
    /// Fills as much of `buf` as possible and returns the number of samples
    /// written. Returns 0 only once the source is exhausted.
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize>;
}

impl<'a, S> SampleSource for &'a mut S
    where S: SampleSource + ?Sized
{
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        (**self).read_samples(buf)
    }
}

/// Helper struct that takes ownership of a reader and hands out the wave
/// file's samples converted to the canonical format.
///
/// The header is parsed when the reader is created; a file that fails to
/// parse never produces a `WaveReader`.
#[derive(Debug)]
pub struct WaveReader<R>
    where R: Read + Seek
{
    header: WaveHeader,
    decoder: SampleDecoder,
    resampler: Resampler,
    options: ReaderOptions,

    // Bytes of the data region consumed so far.
    data_position: u64,
    // Canonical samples handed out so far.
    samples_read: u64,
    // Set once the resampler has been flushed at the end of the data.
    flushed: bool,

    // Scratch buffers, reused for every block.
    raw: Vec<u8>,
    decoded: Vec<i16>,
    ready: Vec<i16>,
    ready_pos: usize,

    // The underlying reader that we'll use to read data.
    reader: R,
}

impl WaveReader<BufReader<File>> {
    /// Opens a wave file for buffered reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        WaveReader::new(BufReader::new(file))
    }
}

impl<R> WaveReader<R>
    where R: Read + Seek
{
    /// Returns a new wave reader for the given reader.
    pub fn new(reader: R) -> Result<WaveReader<R>> {
        WaveReader::with_options(reader, ReaderOptions::default())
    }

    pub fn with_options(mut reader: R, options: ReaderOptions) -> Result<WaveReader<R>> {
        let header = scan_wave_header(&mut reader)?;
        let decoder = SampleDecoder::new(header.encoding(), &header.format)?;
        let resampler = Resampler::new(header.format.sample_rate, CANONICAL_FORMAT.sample_rate)?;
        reader.seek(SeekFrom::Start(header.data.byte_offset))?;

        info!("{} Hz, {} channel(s), {} bits ({:?}), {} data bytes",
              header.format.sample_rate,
              header.format.num_channels,
              header.format.bits_per_sample,
              header.encoding(),
              header.data.byte_length);

        Ok(WaveReader {
            header: header,
            decoder: decoder,
            resampler: resampler,
            options: options,
            data_position: 0,
            samples_read: 0,
            flushed: false,
            raw: Vec::new(),
            decoded: Vec::new(),
            ready: Vec::new(),
            ready_pos: 0,
            reader: reader,
        })
    }

    /// The format of the file as stored.
    pub fn origin_format(&self) -> &PcmFormat {
        &self.header.format
    }

    pub fn header(&self) -> &WaveHeader {
        &self.header
    }

    pub fn data_region(&self) -> &DataRegion {
        &self.header.data
    }

    /// Frames (one sample per channel) in the data chunk.
    pub fn total_frames(&self) -> u64 {
        self.header.data.byte_length / self.header.format.block_align()
    }

    /// The exact number of canonical samples this reader will hand out.
    pub fn total_canonical_samples(&self) -> u64 {
        self.resampler.output_len(self.total_frames())
    }

    /// The playing time of the source.
    pub fn duration(&self) -> Duration {
        let nanos = u128::from(self.total_frames()) * 1_000_000_000 /
                    u128::from(self.header.format.sample_rate);
        Duration::from_nanos(nanos as u64)
    }

    /// Canonical samples handed out so far.
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Releases the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    // Pulls the next block through the decoder and resampler. Returns false
    // once everything has been converted.
    fn refill(&mut self) -> Result<bool> {
        if self.flushed {
            return Ok(false);
        }

        self.ready.clear();
        self.ready_pos = 0;

        let remaining = self.header.data.byte_length - self.data_position;
        if remaining == 0 {
            self.resampler.flush(&mut self.ready);
            self.flushed = true;
            return Ok(true);
        }

        let block = self.options.block_frames.max(1) as u64 * self.header.format.block_align();
        let len = remaining.min(block) as usize;
        self.raw.resize(len, 0);
        self.reader.read_exact(&mut self.raw)?;
        self.data_position += len as u64;

        self.decoded.clear();
        self.decoder.decode(&self.raw, &mut self.decoded);
        self.resampler.process(&self.decoded, &mut self.ready);
        Ok(true)
    }
}

impl<R> SampleSource for WaveReader<R>
    where R: Read + Seek
{
    fn read_samples(&mut self, buf: &mut [i16]) -> Result<usize> {
        let mut filled = 0;

        while filled < buf.len() {
            if self.ready_pos == self.ready.len() {
                if !self.refill()? {
                    break;
                }
                continue;
            }

            let n = (self.ready.len() - self.ready_pos).min(buf.len() - filled);
            buf[filled..filled + n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
            self.ready_pos += n;
            filled += n;
        }

        self.samples_read += filled as u64;
        Ok(filled)
    }
}

// MARK: Tests
