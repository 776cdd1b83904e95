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

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;
use std::path::Path;

use c2wave::{SampleSource, Transcoder};
use hound::{SampleFormat, WavSpec, WavWriter};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn int_spec(channels: u16, sample_rate: u32, bits_per_sample: u16) -> WavSpec {
    WavSpec {
        channels: channels,
        sample_rate: sample_rate,
        bits_per_sample: bits_per_sample,
        sample_format: SampleFormat::Int,
    }
}

/// Writes `frames` frames with every channel of every frame set to the
/// matching entry of `values`. The value type picks the stored width.
pub fn write_constant_wav<P, S>(path: P, spec: WavSpec, frames: usize, values: &[S])
    where P: AsRef<Path>,
          S: hound::Sample + Copy
{
    assert_eq!(spec.channels as usize, values.len());
    let mut writer = WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        for &value in values {
            writer.write_sample(value).unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// A mono tone at half of full scale.
pub fn sine(sample_rate: u32, frequency: f64, samples: usize) -> Vec<i16> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / f64::from(sample_rate);
            ((2.0 * PI * frequency * t).sin() * 16384.0) as i16
        })
        .collect()
}

pub fn write_mono_16bit<P: AsRef<Path>>(path: P, sample_rate: u32, samples: &[i16]) {
    let mut writer = WavWriter::create(path, int_spec(1, sample_rate, 16)).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

pub fn read_hound_samples<P: AsRef<Path>>(path: P) -> (WavSpec, Vec<i16>) {
    let mut reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    (spec, samples)
}

/// Drains a sample source through a buffer of `chunk` samples.
pub fn read_all<S: SampleSource>(source: &mut S, chunk: usize) -> Vec<i16> {
    let mut all = Vec::new();
    let mut buf = vec![0i16; chunk];
    loop {
        let n = source.read_samples(&mut buf).unwrap();
        if n == 0 {
            return all;
        }
        all.extend_from_slice(&buf[..n]);
    }
}

/// A stand-in codec that keeps the high byte of the first
/// `bytes_per_frame()` samples of each frame. On decode every sample is
/// rebuilt from the byte at its index modulo the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighByteCodec {
    pub samples_per_frame: usize,
    pub bits_per_frame: usize,
}

impl HighByteCodec {
    /// One byte per sample, so decoding reproduces every high byte.
    pub fn lossless_high(samples_per_frame: usize) -> HighByteCodec {
        HighByteCodec {
            samples_per_frame: samples_per_frame,
            bits_per_frame: samples_per_frame * 8,
        }
    }
}

impl Transcoder for HighByteCodec {
    fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    fn bits_per_frame(&self) -> usize {
        self.bits_per_frame
    }

    fn encode(&mut self, speech: &[i16], bits: &mut [u8]) {
        assert_eq!(self.samples_per_frame, speech.len());
        for (byte, sample) in bits.iter_mut().zip(speech) {
            *byte = (*sample >> 8) as u8;
        }
    }

    fn decode(&mut self, bits: &[u8], speech: &mut [i16]) {
        assert_eq!(self.bytes_per_frame(), bits.len());
        for (i, sample) in speech.iter_mut().enumerate() {
            *sample = i16::from(bits[i % bits.len()] as i8) << 8;
        }
    }
}
