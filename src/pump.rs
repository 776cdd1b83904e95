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

//! Moves fixed-size frames between the wave side and a [`Transcoder`].
//!
//! Encoding pulls canonical samples from a [`SampleSource`], zero-pads the
//! final partial frame, and appends each encoded frame to a
//! [`CompressedWriter`]. Decoding reads frames from a [`CompressedReader`]
//! and appends the decoded samples to a [`WaveWriter`]; a trailing partial
//! frame can't be decoded and is dropped.

use std::fs;
use std::io::{Read, Seek, Write};
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};

use crate::compressed::{CompressedHeader, CompressedReader, CompressedWriter, Mode};
use crate::error::{Error, FormatErrorKind, Result};
use crate::reader::{SampleSource, WaveReader};
use crate::transcoder::Transcoder;
use crate::writer::WaveWriter;
use crate::CANONICAL_FORMAT;

/// What an encode run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Frames handed to the transcoder.
    pub frames: u64,
    /// Canonical samples pulled from the source.
    pub samples_in: u64,
    /// Zero samples appended to complete the final frame.
    pub padded_samples: u64,
    /// Encoded bytes written, excluding the header.
    pub bytes_out: u64,
}

impl EncodeSummary {
    /// Playing time of the encoded audio.
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples_in)
    }

    /// Canonical PCM bytes per encoded byte.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_out == 0 {
            return 0.0;
        }
        (self.samples_in * 2) as f64 / self.bytes_out as f64
    }
}

/// What a decode run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Frames decoded.
    pub frames: u64,
    /// Samples accepted by the wave writer.
    pub samples_out: u64,
    /// Decoded samples the wave writer did not accept.
    pub samples_short: u64,
    /// Bytes of a trailing partial frame that were dropped.
    pub dropped_tail_bytes: usize,
}

impl DecodeSummary {
    pub fn duration(&self) -> Duration {
        samples_duration(self.samples_out)
    }
}

fn samples_duration(samples: u64) -> Duration {
    let rate = u64::from(CANONICAL_FORMAT.sample_rate);
    Duration::from_secs(samples / rate) +
    Duration::from_nanos((samples % rate) * 1_000_000_000 / rate)
}

/// Fills `frame` from `source`, zeroing whatever the source can't supply.
/// Returns the number of real samples; less than `frame.len()` means this is
/// the final frame, and 0 means there was nothing left at all.
pub fn fill_frame<S>(source: &mut S, frame: &mut [i16]) -> Result<usize>
    where S: SampleSource + ?Sized
{
    let mut filled = 0;
    while filled < frame.len() {
        let n = source.read_samples(&mut frame[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    for sample in &mut frame[filled..] {
        *sample = 0;
    }
    Ok(filled)
}

/// Encodes everything `source` holds into `output`.
pub fn encode<S, T, W>(source: &mut S,
                       transcoder: &mut T,
                       output: &mut CompressedWriter<W>)
                       -> Result<EncodeSummary>
    where S: SampleSource + ?Sized,
          T: Transcoder + ?Sized,
          W: Write
{
    output.header.check_geometry(transcoder)?;

    let samples_per_frame = transcoder.samples_per_frame();
    let mut frame = vec![0i16; samples_per_frame];
    let mut bits = vec![0u8; transcoder.bytes_per_frame()];
    let mut summary = EncodeSummary::default();

    loop {
        let filled = fill_frame(source, &mut frame)?;
        if filled == 0 {
            break;
        }

        transcoder.encode(&frame, &mut bits);
        output.write_frame(&bits)?;

        summary.frames += 1;
        summary.samples_in += filled as u64;
        summary.bytes_out += bits.len() as u64;

        if filled < samples_per_frame {
            summary.padded_samples = (samples_per_frame - filled) as u64;
            debug!("final frame padded: {} samples -> {} samples", filled, samples_per_frame);
            break;
        }
    }

    info!("encoded {} frames ({:.2} s), compression {:.1}:1",
          summary.frames,
          summary.duration().as_secs_f64(),
          summary.compression_ratio());
    Ok(summary)
}

/// Decodes every whole frame of `input` into `output`.
pub fn decode<R, T, W>(input: &mut CompressedReader<R>,
                       transcoder: &mut T,
                       output: &mut WaveWriter<W>)
                       -> Result<DecodeSummary>
    where R: Read,
          T: Transcoder + ?Sized,
          W: Write + Seek
{
    input.header.check_geometry(transcoder)?;

    let samples_per_frame = transcoder.samples_per_frame();
    let mut speech = vec![0i16; samples_per_frame];
    let mut summary = DecodeSummary::default();

    loop {
        let bits = match input.read_frame() {
            Ok(Some(bits)) => bits,
            Ok(None) => break,
            Err(Error::Format(FormatErrorKind::TruncatedFrame { got, expected })) => {
                warn!("dropping trailing partial frame ({} of {} bytes)", got, expected);
                summary.dropped_tail_bytes = got;
                break;
            }
            Err(err) => return Err(err),
        };

        transcoder.decode(bits, &mut speech);
        let written = output.write_samples(&speech)?;
        if written < samples_per_frame {
            warn!("short write: {} of {} samples", written, samples_per_frame);
            summary.samples_short += (samples_per_frame - written) as u64;
        }

        summary.frames += 1;
        summary.samples_out += written as u64;
    }

    info!("decoded {} frames ({:.2} s)",
          summary.frames,
          summary.duration().as_secs_f64());
    Ok(summary)
}

/// Encodes a wave file of any supported format into a compressed file.
///
/// `create` instantiates the transcoder for `mode`; returning `None` fails
/// the run before the output file is created. If the run fails after that,
/// the output file is removed.
pub fn encode_file<P, Q, F, T>(input: P, output: Q, mode: Mode, create: F) -> Result<EncodeSummary>
    where P: AsRef<Path>,
          Q: AsRef<Path>,
          F: FnOnce(Mode) -> Option<T>,
          T: Transcoder
{
    let mut reader = WaveReader::open(input)?;
    let mut transcoder = create(mode).ok_or(Error::TranscoderUnavailable(mode))?;

    let output = output.as_ref();
    let header = CompressedHeader::for_transcoder(mode, &transcoder);
    let mut writer = CompressedWriter::create(output, header)?;
    let summary = match encode(&mut reader, &mut transcoder, &mut writer) {
        Ok(summary) => summary,
        Err(err) => {
            drop(writer);
            return Err(remove_partial_output(output, err));
        }
    };
    if let Err(err) = writer.finish() {
        return Err(remove_partial_output(output, err));
    }
    Ok(summary)
}

/// Decodes a compressed file into a canonical wave file.
///
/// The header is validated against the transcoder `create` returns for its
/// mode before the output file is created. If the run fails after that, the
/// output file is removed.
pub fn decode_file<P, Q, F, T>(input: P, output: Q, create: F) -> Result<DecodeSummary>
    where P: AsRef<Path>,
          Q: AsRef<Path>,
          F: FnOnce(Mode) -> Option<T>,
          T: Transcoder
{
    let mut reader = CompressedReader::open(input)?;
    let mode = reader.header.mode;
    let mut transcoder = create(mode).ok_or(Error::TranscoderUnavailable(mode))?;
    reader.header.check_geometry(&transcoder)?;

    let output = output.as_ref();
    let mut writer = WaveWriter::create(output)?;
    let summary = match decode(&mut reader, &mut transcoder, &mut writer) {
        Ok(summary) => summary,
        Err(err) => {
            writer.discard();
            return Err(remove_partial_output(output, err));
        }
    };
    if let Err(err) = writer.finalize() {
        return Err(remove_partial_output(output, err));
    }
    Ok(summary)
}

// A run that fails after creating its output leaves nothing behind.
fn remove_partial_output(path: &Path, err: Error) -> Error {
    warn!("removing partial output {}: {}", path.display(), err);
    if let Err(remove_err) = fs::remove_file(path) {
        warn!("failed to remove {}: {}", path.display(), remove_err);
    }
    err
}

// MARK: Tests
