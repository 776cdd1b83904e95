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

//! The compressed frame file written by the encoder and read by the decoder.
//!
//! Offset | Size | Data              | Description
//! -----: | ---: | ----------------- | ----------------------------------------
//!      0 |    4 | magic             | 0x43324332, little-endian.
//!      4 |    4 | mode              | The transcoder mode identifier.
//!      8 |    4 | samples per frame | As declared by the transcoder for the mode.
//!     12 |    4 | bits per frame    | As declared by the transcoder for the mode.
//!     16 |  ... | frames            | Back-to-back frames of `ceil(bits / 8)` bytes each.
//!
//! There is no frame count; the file length determines it.

use std::fmt;
use std::fs::File;
use std::io;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::result;
use std::str::FromStr;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, FormatErrorKind, Result};
use crate::transcoder::{self, Transcoder};

pub const MAGIC: u32 = 0x4332_4332;
pub const HEADER_LEN: u64 = 16;

// MARK: Modes

/// The bitrate modes a transcoder may be created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Mode3200,
    Mode2400,
    Mode1600,
    Mode1400,
    Mode1300,
    Mode1200,
    Mode700,
    Mode700B,
}

pub const ALL_MODES: [Mode; 8] = [Mode::Mode3200,
                                  Mode::Mode2400,
                                  Mode::Mode1600,
                                  Mode::Mode1400,
                                  Mode::Mode1300,
                                  Mode::Mode1200,
                                  Mode::Mode700,
                                  Mode::Mode700B];

impl Mode {
    /// The identifier stored in a compressed header.
    pub fn id(&self) -> u32 {
        match *self {
            Mode::Mode3200 => 0,
            Mode::Mode2400 => 1,
            Mode::Mode1600 => 2,
            Mode::Mode1400 => 3,
            Mode::Mode1300 => 4,
            Mode::Mode1200 => 5,
            Mode::Mode700 => 6,
            Mode::Mode700B => 7,
        }
    }

    pub fn from_id(id: u32) -> Option<Mode> {
        ALL_MODES.iter().cloned().find(|mode| mode.id() == id)
    }

    fn label(&self) -> &'static str {
        match *self {
            Mode::Mode3200 => "3200",
            Mode::Mode2400 => "2400",
            Mode::Mode1600 => "1600",
            Mode::Mode1400 => "1400",
            Mode::Mode1300 => "1300",
            Mode::Mode1200 => "1200",
            Mode::Mode700 => "700",
            Mode::Mode700B => "700B",
        }
    }
}

impl Default for Mode {
    fn default() -> Mode {
        Mode::Mode3200
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The bitrate spelling of a mode was not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid mode '{}'", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> result::Result<Mode, ParseModeError> {
        ALL_MODES.iter()
            .cloned()
            .find(|mode| mode.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

// MARK: Header

/// The fixed header of a compressed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedHeader {
    pub mode: Mode,
    pub samples_per_frame: u32,
    pub bits_per_frame: u32,
}

impl CompressedHeader {
    /// Describes the frames `transcoder` produces for `mode`.
    pub fn for_transcoder<T>(mode: Mode, transcoder: &T) -> CompressedHeader
        where T: Transcoder + ?Sized
    {
        CompressedHeader {
            mode: mode,
            samples_per_frame: transcoder.samples_per_frame() as u32,
            bits_per_frame: transcoder.bits_per_frame() as u32,
        }
    }

    pub fn bytes_per_frame(&self) -> usize {
        transcoder::bytes_per_frame(self.bits_per_frame as usize)
    }

    /// Fails unless `transcoder` produces exactly the frames described here.
    pub fn check_geometry<T>(&self, transcoder: &T) -> Result<()>
        where T: Transcoder + ?Sized
    {
        let samples = transcoder.samples_per_frame() as u32;
        let bits = transcoder.bits_per_frame() as u32;
        if samples != self.samples_per_frame || bits != self.bits_per_frame {
            return Err(FormatErrorKind::GeometryMismatch {
                    header_samples: self.samples_per_frame,
                    header_bits: self.bits_per_frame,
                    samples: samples,
                    bits: bits,
                }
                .into());
        }
        Ok(())
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.mode.id())?;
        writer.write_u32::<LittleEndian>(self.samples_per_frame)?;
        writer.write_u32::<LittleEndian>(self.bits_per_frame)
    }

    fn read_from<R: Read>(reader: &mut R) -> Result<CompressedHeader> {
        let mut raw = [0u8; HEADER_LEN as usize];
        match reader.read_exact(&mut raw) {
            Ok(()) => {}
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(FormatErrorKind::TruncatedHeader.into());
            }
            Err(err) => return Err(err.into()),
        }

        let mut fields = &raw[..];
        let magic = fields.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(FormatErrorKind::BadMagic(magic).into());
        }
        let mode_id = fields.read_u32::<LittleEndian>()?;
        let mode = Mode::from_id(mode_id).ok_or(Error::Format(FormatErrorKind::UnknownMode(mode_id)))?;

        Ok(CompressedHeader {
            mode: mode,
            samples_per_frame: fields.read_u32::<LittleEndian>()?,
            bits_per_frame: fields.read_u32::<LittleEndian>()?,
        })
    }
}

// MARK: Writing

/// Writes a compressed file: the header on creation, then one frame at a time.
#[derive(Debug)]
pub struct CompressedWriter<W>
    where W: Write
{
    pub header: CompressedHeader,
    frames_written: u64,
    writer: W,
}

impl CompressedWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, header: CompressedHeader) -> Result<Self> {
        let file = File::create(path)?;
        CompressedWriter::new(BufWriter::new(file), header)
    }
}

impl<W> CompressedWriter<W>
    where W: Write
{
    pub fn new(mut writer: W, header: CompressedHeader) -> Result<CompressedWriter<W>> {
        header.write_to(&mut writer)?;
        Ok(CompressedWriter {
            header: header,
            frames_written: 0,
            writer: writer,
        })
    }

    /// Appends one frame, which must be exactly `bytes_per_frame()` long.
    pub fn write_frame(&mut self, bits: &[u8]) -> Result<()> {
        let expected = self.header.bytes_per_frame();
        if bits.len() != expected {
            return Err(FormatErrorKind::FrameLengthMismatch {
                    got: bits.len(),
                    expected: expected,
                }
                .into());
        }
        self.writer.write_all(bits)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

// MARK: Reading

/// Reads a compressed file one frame at a time.
#[derive(Debug)]
pub struct CompressedReader<R>
    where R: Read
{
    pub header: CompressedHeader,
    frame: Vec<u8>,
    frames_read: u64,
    reader: R,
}

impl CompressedReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        CompressedReader::new(BufReader::new(file))
    }
}

impl<R> CompressedReader<R>
    where R: Read
{
    /// Reads and validates the header.
    pub fn new(mut reader: R) -> Result<CompressedReader<R>> {
        let header = CompressedHeader::read_from(&mut reader)?;
        Ok(CompressedReader {
            header: header,
            frame: Vec::new(),
            frames_read: 0,
            reader: reader,
        })
    }

    /// Reads the next frame. Returns `Ok(None)` at a clean end of input, and
    /// a `TruncatedFrame` error if the input ends partway through a frame.
    ///
    /// The frame buffer only grows as bytes actually arrive, so a header
    /// declaring a huge frame costs nothing until the data is there.
    pub fn read_frame(&mut self) -> Result<Option<&[u8]>> {
        let expected = self.header.bytes_per_frame();
        self.frame.clear();
        (&mut self.reader).take(expected as u64).read_to_end(&mut self.frame)?;
        let got = self.frame.len();

        if got == 0 {
            Ok(None)
        } else if got < expected {
            Err(FormatErrorKind::TruncatedFrame {
                    got: got,
                    expected: expected,
                }
                .into())
        } else {
            self.frames_read += 1;
            Ok(Some(&self.frame[..]))
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl<R> CompressedReader<R>
    where R: Read + Seek
{
    /// Whole frames left between the current position and the end of input.
    pub fn frames_remaining(&mut self) -> Result<u64> {
        let bytes_per_frame = self.header.bytes_per_frame() as u64;
        let current = self.reader.stream_position()?;
        let end = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(current))?;
        if bytes_per_frame == 0 {
            return Ok(0);
        }
        Ok(end.saturating_sub(current) / bytes_per_frame)
    }
}

// MARK: Tests
