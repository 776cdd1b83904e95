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

//! Walks the RIFF chunk structure of a wave file.
//!
//! The scanner never trusts a size field: every chunk is checked against the
//! real length of the stream before it is skipped or recorded, so a crafted
//! or truncated file fails with a format error instead of a read past the
//! end.

use std::io;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::error::{Error, FormatErrorKind, Result};
use crate::{FormatTag, PcmFormat};

const TAG_RIFF: &[u8; 4] = b"RIFF";
const TAG_WAVE: &[u8; 4] = b"WAVE";
const TAG_FMT: &[u8; 4] = b"fmt ";
const TAG_DATA: &[u8; 4] = b"data";

// Size of the fixed part of the fmt chunk.
const FMT_BASE_SIZE: u32 = 16;
// Minimum extension size for the extensible format.
const EXTENSIBLE_EXTRA_SIZE: u16 = 22;

/// Where the sample bytes live in the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegion {
    /// Absolute offset of the first sample byte.
    pub byte_offset: u64,
    /// Length of the sample data in bytes; always a whole number of frames.
    pub byte_length: u64,
}

impl DataRegion {
    pub fn end(&self) -> u64 {
        self.byte_offset + self.byte_length
    }
}

/// Everything the scanner learns about a wave file before its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    pub format: PcmFormat,
    /// The effective format code carried by an extensible fmt chunk.
    pub sub_format: Option<FormatTag>,
    pub data: DataRegion,
}

impl WaveHeader {
    /// The encoding of the samples, looking through the extensible wrapper.
    pub fn encoding(&self) -> FormatTag {
        self.sub_format.unwrap_or(self.format.format_tag)
    }
}

/// Scans the header of a wave file and leaves the reader positioned at the
/// first sample byte.
pub fn scan_wave_header<R>(reader: &mut R) -> Result<WaveHeader>
    where R: Read + Seek
{
    reader.scan_wave_header()
}

fn is_eof(err: &Error) -> bool {
    match *err {
        Error::Io(ref io_err) => io_err.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

fn validate_fmt_header_is_large_enough(size: u32, min_size: u32) -> Result<()> {
    if size < min_size {
        Err(FormatErrorKind::FmtChunkTooShort.into())
    } else {
        Ok(())
    }
}

pub(crate) trait ReadChunksExt: Read + Seek {
    fn scan_wave_header(&mut self) -> Result<WaveHeader> {
        let start = self.stream_position()?;
        let stream_len = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(start))?;

        self.validate_is_riff_file()?;
        self.validate_is_wave_file()?;

        let mut fmt: Option<(PcmFormat, Option<FormatTag>)> = None;

        loop {
            let (tag, size) = match self.read_chunk_header() {
                Ok(header) => header,
                Err(ref err) if is_eof(err) => {
                    return Err(if fmt.is_none() {
                        FormatErrorKind::MissingFmtChunk.into()
                    } else {
                        FormatErrorKind::MissingDataChunk.into()
                    });
                }
                Err(err) => return Err(err),
            };

            let chunk_begin = self.stream_position()?;
            if chunk_begin + u64::from(size) > stream_len {
                return Err(FormatErrorKind::ChunkPastEndOfFile { tag: tag, size: size }.into());
            }

            if &tag == TAG_FMT {
                debug!("fmt chunk at {}, {} bytes", chunk_begin, size);
                // An earlier fmt chunk is simply replaced.
                fmt = Some(self.read_fmt_chunk(size)?);
            } else if &tag == TAG_DATA {
                debug!("data chunk at {}, {} bytes", chunk_begin, size);
                let (format, sub_format) = match fmt {
                    Some(fmt) => fmt,
                    None => return Err(FormatErrorKind::MissingFmtChunk.into()),
                };
                let block_align = format.block_align();
                if block_align != 0 && u64::from(size) % block_align != 0 {
                    return Err(FormatErrorKind::DataNotFrameAligned {
                            size: u64::from(size),
                            block_align: block_align,
                        }
                        .into());
                }
                // The data chunk ends the scan; we're left at the first sample.
                return Ok(WaveHeader {
                    format: format,
                    sub_format: sub_format,
                    data: DataRegion {
                        byte_offset: chunk_begin,
                        byte_length: u64::from(size),
                    },
                });
            } else {
                debug!("skipping chunk {:?} ({} bytes)", String::from_utf8_lossy(&tag), size);
                self.seek(SeekFrom::Current(i64::from(size)))?;
            }
        }
    }

    fn read_fmt_chunk(&mut self, size: u32) -> Result<(PcmFormat, Option<FormatTag>)> {
        validate_fmt_header_is_large_enough(size, FMT_BASE_SIZE)?;

        let format_tag = FormatTag::from_code(self.read_u16::<LittleEndian>()?);
        let num_channels = self.read_u16::<LittleEndian>()?;
        let sample_rate = self.read_u32::<LittleEndian>()?;
        // Ignore byte rate and block align; both follow from the other fields.
        let _ = self.read_u32::<LittleEndian>()?;
        let _ = self.read_u16::<LittleEndian>()?;
        let bits_per_sample = self.read_u16::<LittleEndian>()?;

        let sub_format = match format_tag {
            FormatTag::Extensible => Some(self.read_extensible_sub_format(size)?),
            _ => {
                self.skip_over_remainder(FMT_BASE_SIZE, size)?;
                None
            }
        };

        if num_channels == 0 {
            return Err(FormatErrorKind::NumChannelsIsZero.into());
        } else if sample_rate == 0 {
            return Err(FormatErrorKind::SampleRateIsZero.into());
        }

        Ok((PcmFormat {
                format_tag: format_tag,
                num_channels: num_channels,
                sample_rate: sample_rate,
                bits_per_sample: bits_per_sample,
            },
            sub_format))
    }

    fn read_extensible_sub_format(&mut self, size: u32) -> Result<FormatTag> {
        // cbSize, valid bits, channel mask, then the first two GUID bytes.
        validate_fmt_header_is_large_enough(size, FMT_BASE_SIZE + 2)?;
        let extra_info_size = self.read_u16::<LittleEndian>()?;
        validate_fmt_header_is_large_enough(extra_info_size.into(),
                                            EXTENSIBLE_EXTRA_SIZE.into())?;
        validate_fmt_header_is_large_enough(size,
                                            FMT_BASE_SIZE + 2 + u32::from(extra_info_size))?;

        // Ignore valid bits per sample and channel mask.
        let _ = self.read_u16::<LittleEndian>()?;
        let _ = self.read_u32::<LittleEndian>()?;
        let sub_format = FormatTag::from_code(self.read_u16::<LittleEndian>()?);

        self.skip_over_remainder(FMT_BASE_SIZE + 10, size)?;
        Ok(sub_format)
    }

    fn skip_over_remainder(&mut self, read_so_far: u32, size: u32) -> Result<()> {
        if read_so_far < size {
            let remainder = size - read_so_far;
            self.seek(SeekFrom::Current(remainder.into()))?;
        }
        Ok(())
    }

    fn validate_is_riff_file(&mut self) -> Result<()> {
        self.validate_tag(TAG_RIFF, FormatErrorKind::NotARiffFile)?;
        // The overall size is informational only; files with a wrong value
        // are still read.
        let _ = self.read_u32::<LittleEndian>()
            .map_err(|_| Error::from(FormatErrorKind::NotARiffFile))?;
        Ok(())
    }

    fn validate_is_wave_file(&mut self) -> Result<()> {
        self.validate_tag(TAG_WAVE, FormatErrorKind::NotAWaveFile)
    }

    fn validate_tag(&mut self, expected_tag: &[u8; 4], err_kind: FormatErrorKind) -> Result<()> {
        let mut tag = [0u8; 4];
        match self.read_exact(&mut tag) {
            Ok(()) if &tag == expected_tag => Ok(()),
            Ok(()) => Err(err_kind.into()),
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(err_kind.into()),
            Err(err) => Err(err.into()),
        }
    }

    fn read_chunk_header(&mut self) -> Result<([u8; 4], u32)> {
        let mut tag = [0u8; 4];
        self.read_exact(&mut tag)?;
        let size = self.read_u32::<LittleEndian>()?;
        Ok((tag, size))
    }
}

impl<T> ReadChunksExt for T where T: Read + Seek {}

// MARK: Tests

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use super::{scan_wave_header, DataRegion, ReadChunksExt};
    use crate::error::{Error, FormatErrorKind};
    use crate::{FormatTag, PcmFormat};

    fn fmt_chunk(format: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let mut vec = Vec::new();
        vec.extend_from_slice(b"fmt \x10\x00\x00\x00");
        vec.extend_from_slice(&format.to_le_bytes());
        vec.extend_from_slice(&channels.to_le_bytes());
        vec.extend_from_slice(&rate.to_le_bytes());
        vec.extend_from_slice(&(rate * u32::from(channels) * u32::from(bits / 8)).to_le_bytes());
        vec.extend_from_slice(&(channels * (bits / 8)).to_le_bytes());
        vec.extend_from_slice(&bits.to_le_bytes());
        vec
    }

    fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut vec = Vec::new();
        vec.extend_from_slice(tag);
        vec.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        vec.extend_from_slice(payload);
        vec
    }

    fn wave(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut vec = Vec::new();
        vec.extend_from_slice(b"RIFF\x00\x00\x00\x00WAVE");
        for c in chunks {
            vec.extend_from_slice(c);
        }
        vec
    }

    // RIFF header tests

    #[test]
    fn test_validate_is_riff_file_ok() {
        let mut data = Cursor::new(b"RIFF    ");
        assert_matches!(Ok(()), data.validate_is_riff_file());
    }

    #[test]
    fn test_validate_is_riff_file_err_incomplete() {
        let mut data = Cursor::new(b"RIF     ");
        assert_matches!(Err(Error::Format(FormatErrorKind::NotARiffFile)),
                        data.validate_is_riff_file());
    }

    #[test]
    fn test_validate_is_riff_file_err_too_short() {
        let mut data = Cursor::new(b"RI");
        assert_matches!(Err(Error::Format(FormatErrorKind::NotARiffFile)),
                        data.validate_is_riff_file());
    }

    #[test]
    fn test_validate_is_wave_file_err_something_else() {
        let mut data = Cursor::new(b"JPEG");
        assert_matches!(Err(Error::Format(FormatErrorKind::NotAWaveFile)),
                        data.validate_is_wave_file());
    }

    // Header scanning

    #[test]
    fn test_scan_canonical_header() {
        let vec = wave(&[fmt_chunk(1, 1, 8000, 16), chunk(b"data", &[0; 8])]);
        let header = scan_wave_header(&mut Cursor::new(vec)).unwrap();

        assert_eq!(PcmFormat {
                       format_tag: FormatTag::Pcm,
                       num_channels: 1,
                       sample_rate: 8000,
                       bits_per_sample: 16,
                   },
                   header.format);
        assert_eq!(DataRegion { byte_offset: 44, byte_length: 8 }, header.data);
        assert_eq!(FormatTag::Pcm, header.encoding());
    }

    #[test]
    fn test_scan_leaves_reader_at_first_sample() {
        let vec = wave(&[fmt_chunk(1, 1, 8000, 8), chunk(b"data", b"\x01\x02")]);
        let mut cursor = Cursor::new(vec);
        let _ = scan_wave_header(&mut cursor).unwrap();
        let mut buf = [0u8; 2];
        cursor.read_exact(&mut buf).unwrap();
        assert_eq!(b"\x01\x02", &buf);
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let plain = wave(&[fmt_chunk(1, 2, 44100, 16), chunk(b"data", &[0; 16])]);
        let plain_header = scan_wave_header(&mut Cursor::new(plain)).unwrap();

        for n in 1..4 {
            let mut chunks = Vec::new();
            for i in 0..n {
                chunks.push(chunk(b"LIST", &vec![0xAA; i * 3 + 1]));
            }
            chunks.push(fmt_chunk(1, 2, 44100, 16));
            chunks.push(chunk(b"fact", &[0; 4]));
            chunks.push(chunk(b"data", &[0; 16]));
            let header = scan_wave_header(&mut Cursor::new(wave(&chunks))).unwrap();

            assert_eq!(plain_header.format, header.format);
            assert_eq!(plain_header.data.byte_length, header.data.byte_length);
        }
    }

    #[test]
    fn test_last_fmt_chunk_wins() {
        let vec = wave(&[fmt_chunk(1, 1, 8000, 16),
                         fmt_chunk(1, 2, 22050, 8),
                         chunk(b"data", &[0; 4])]);
        let header = scan_wave_header(&mut Cursor::new(vec)).unwrap();
        assert_eq!(2, header.format.num_channels);
        assert_eq!(22050, header.format.sample_rate);
        assert_eq!(8, header.format.bits_per_sample);
    }

    #[test]
    fn test_missing_fmt_chunk() {
        let vec = wave(&[]);
        assert_matches!(Err(Error::Format(FormatErrorKind::MissingFmtChunk)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_data_before_fmt_is_missing_fmt() {
        let vec = wave(&[chunk(b"data", &[0; 4]), fmt_chunk(1, 1, 8000, 16)]);
        assert_matches!(Err(Error::Format(FormatErrorKind::MissingFmtChunk)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_missing_data_chunk() {
        let vec = wave(&[fmt_chunk(1, 1, 8000, 16), chunk(b"LIST", &[0; 6])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::MissingDataChunk)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_chunk_past_end_of_file() {
        let mut vec = wave(&[fmt_chunk(1, 1, 8000, 16)]);
        vec.extend_from_slice(b"LIST\xFF\xFF\xFF\x7F\x00\x00");
        assert_matches!(Err(Error::Format(FormatErrorKind::ChunkPastEndOfFile { .. })),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_data_chunk_past_end_of_file() {
        let mut vec = wave(&[fmt_chunk(1, 1, 8000, 16)]);
        vec.extend_from_slice(b"data\x10\x00\x00\x00\x00\x00");
        assert_matches!(Err(Error::Format(FormatErrorKind::ChunkPastEndOfFile { size: 16, .. })),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_data_not_frame_aligned() {
        let vec = wave(&[fmt_chunk(1, 2, 8000, 16), chunk(b"data", &[0; 6])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::DataNotFrameAligned {
                            size: 6,
                            block_align: 4,
                        })),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_fmt_chunk_too_small() {
        let vec = wave(&[chunk(b"fmt ", &[1, 0, 1, 0, 0x40, 0x1F, 0, 0])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::FmtChunkTooShort)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_dont_accept_zero_channels_or_rate() {
        let vec = wave(&[fmt_chunk(1, 0, 8000, 16), chunk(b"data", &[])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::NumChannelsIsZero)),
                        scan_wave_header(&mut Cursor::new(vec)));

        let vec = wave(&[fmt_chunk(1, 1, 0, 16), chunk(b"data", &[])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::SampleRateIsZero)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    #[test]
    fn test_fmt_extra_bytes_are_skipped() {
        let mut fmt = fmt_chunk(1, 1, 16000, 16);
        fmt[4] = 18;
        fmt.extend_from_slice(&[0, 0]);
        let vec = wave(&[fmt, chunk(b"data", &[0; 2])]);
        let header = scan_wave_header(&mut Cursor::new(vec)).unwrap();
        assert_eq!(16000, header.format.sample_rate);
        assert_eq!(DataRegion { byte_offset: 46, byte_length: 2 }, header.data);
    }

    // Extended format

    fn extensible_fmt(sub_format: u16) -> Vec<u8> {
        let mut fmt = fmt_chunk(0xFFFE, 2, 48000, 24);
        fmt[4] = 40;
        fmt.extend_from_slice(b"\x16\x00\x18\x00\x03\x00\x00\x00");
        fmt.extend_from_slice(&sub_format.to_le_bytes());
        fmt.extend_from_slice(b"\x00\x00\x00\x00\x10\x00\x80\x00\x00\xAA\x00\x38\x9B\x71");
        fmt
    }

    #[test]
    fn test_extensible_pcm() {
        let vec = wave(&[extensible_fmt(1), chunk(b"data", &[0; 12])]);
        let header = scan_wave_header(&mut Cursor::new(vec)).unwrap();
        assert_eq!(FormatTag::Extensible, header.format.format_tag);
        assert_eq!(Some(FormatTag::Pcm), header.sub_format);
        assert_eq!(FormatTag::Pcm, header.encoding());
        assert_eq!(DataRegion { byte_offset: 68, byte_length: 12 }, header.data);
    }

    #[test]
    fn test_extensible_float() {
        let vec = wave(&[extensible_fmt(3), chunk(b"data", &[0; 12])]);
        let header = scan_wave_header(&mut Cursor::new(vec)).unwrap();
        assert_eq!(FormatTag::Float, header.encoding());
    }

    #[test]
    fn test_extensible_too_short() {
        let mut fmt = fmt_chunk(0xFFFE, 1, 8000, 16);
        fmt[4] = 20;
        fmt.extend_from_slice(b"\x02\x00\x00\x00");
        let vec = wave(&[fmt, chunk(b"data", &[])]);
        assert_matches!(Err(Error::Format(FormatErrorKind::FmtChunkTooShort)),
                        scan_wave_header(&mut Cursor::new(vec)));
    }

    // Misc tests

    #[test]
    fn test_skip_over_remainder() {
        let mut data = Cursor::new(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        let mut buf = [0u8; 4];

        let _ = data.skip_over_remainder(0, 0);
        let _ = data.read(&mut buf);
        assert_eq!(b"ABCD", &buf);

        let _ = data.skip_over_remainder(4, 4);
        let _ = data.read(&mut buf);
        assert_eq!(b"EFGH", &buf);

        let _ = data.skip_over_remainder(0, 4);
        let _ = data.read(&mut buf);
        assert_eq!(b"MNOP", &buf);
    }
}
