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
use std::io;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use log::{debug, warn};

use crate::error::{FormatErrorKind, Result};
use crate::{PcmFormat, CANONICAL_FORMAT, FORMAT_PCM};

// Bytes from the start of the header to the first sample.
const HEADER_LEN: u64 = 44;
// Bytes counted by the RIFF size field besides the sample data.
const RIFF_OVERHEAD: u64 = 36;
const RIFF_SIZE_OFFSET: u64 = 4;
const DATA_SIZE_OFFSET: u64 = 40;

/// Helper struct that takes ownership of a writer and writes canonical
/// samples to it as a wave file.
///
/// The header is written immediately with zero size fields, so the output is
/// a well-formed (empty) wave file at every point. The size fields are
/// patched by [`finalize`](WaveWriter::finalize), or on drop if `finalize`
/// was never called.
#[derive(Debug)]
pub struct WaveWriter<W>
    where W: Write + Seek
{
    ///  Represents the PCM format for this wave file.
    pub pcm_format: PcmFormat,

    // Where the header starts in the underlying writer.
    header_begin: u64,
    // Bytes of sample data written so far.
    bytes_written: u64,
    finalized: bool,
    scratch: Vec<u8>,

    // The underlying writer that we'll use to write data.
    writer: W,
}

impl WaveWriter<BufWriter<File>> {
    /// Creates a wave file for buffered writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        WaveWriter::new(BufWriter::new(file))
    }
}

impl<W> WaveWriter<W>
    where W: Write + Seek
{
    /// Returns a new wave writer for the given writer, writing the header
    /// with placeholder sizes.
    pub fn new(mut writer: W) -> Result<WaveWriter<W>> {
        let header_begin = writer.stream_position()?;
        write_header(&mut writer, &CANONICAL_FORMAT)?;

        Ok(WaveWriter {
            pcm_format: CANONICAL_FORMAT,
            header_begin: header_begin,
            bytes_written: 0,
            finalized: false,
            scratch: Vec::new(),
            writer: writer,
        })
    }

    /// Appends samples and returns how many were written. A result smaller
    /// than `samples.len()` means the underlying writer stopped accepting
    /// data; the shortfall is not an error.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<usize> {
        let wanted = samples.len() as u64 * 2;
        if self.bytes_written + wanted > u64::from(u32::MAX) - RIFF_OVERHEAD {
            return Err(FormatErrorKind::DataTooLarge.into());
        }

        self.scratch.resize(samples.len() * 2, 0);
        LittleEndian::write_i16_into(samples, &mut self.scratch);

        let mut done = 0;
        while done < self.scratch.len() {
            match self.writer.write(&self.scratch[done..]) {
                Ok(0) => break,
                Ok(n) => done += n,
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref err) if err.kind() == io::ErrorKind::WriteZero => break,
                Err(err) => return Err(err.into()),
            }
        }

        // Only whole samples count; a stray odd byte is rewound and will be
        // overwritten by the next write.
        let committed = done & !1;
        self.bytes_written += committed as u64;
        if committed != done {
            debug!("rewinding half-written sample");
            self.writer.seek(SeekFrom::Start(self.header_begin + HEADER_LEN + self.bytes_written))?;
        }
        Ok(committed / 2)
    }

    /// Samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.bytes_written / 2
    }

    /// Patches the size fields with the final totals and flushes.
    pub fn finalize(mut self) -> Result<()> {
        self.finalize_in_place()
    }

    /// Abandons the file without patching the header.
    pub(crate) fn discard(mut self) {
        self.finalized = true;
    }

    fn finalize_in_place(&mut self) -> Result<()> {
        // A failed patch is not retried on drop.
        self.finalized = true;

        if self.bytes_written > 0 {
            let data_size = self.bytes_written as u32;
            let end = self.header_begin + HEADER_LEN + self.bytes_written;

            self.writer.seek(SeekFrom::Start(self.header_begin + RIFF_SIZE_OFFSET))?;
            self.writer.write_u32::<LittleEndian>(RIFF_OVERHEAD as u32 + data_size)?;
            self.writer.seek(SeekFrom::Start(self.header_begin + DATA_SIZE_OFFSET))?;
            self.writer.write_u32::<LittleEndian>(data_size)?;
            self.writer.seek(SeekFrom::Start(end))?;
            debug!("patched wave header: {} data bytes", data_size);
        }

        self.writer.flush()?;
        Ok(())
    }
}

impl<W> Drop for WaveWriter<W>
    where W: Write + Seek
{
    fn drop(&mut self) {
        if !self.finalized {
            warn!("wave writer dropped without finalize; patching header");
            if let Err(err) = self.finalize_in_place() {
                warn!("failed to patch wave header: {}", err);
            }
        }
    }
}

fn write_header<W: Write>(writer: &mut W, format: &PcmFormat) -> io::Result<()> {
    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(FORMAT_PCM)?;
    writer.write_u16::<LittleEndian>(format.num_channels)?;
    writer.write_u32::<LittleEndian>(format.sample_rate)?;
    writer.write_u32::<LittleEndian>(format.byte_rate() as u32)?;
    writer.write_u16::<LittleEndian>(format.block_align() as u16)?;
    writer.write_u16::<LittleEndian>(format.bits_per_sample)?;

    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(0)
}

// MARK: Tests

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::{Cursor, Seek, SeekFrom, Write};

    use super::WaveWriter;
    use crate::reader::{SampleSource, WaveReader};

    const EMPTY_HEADER: &[u8] = b"RIFF\x00\x00\x00\x00WAVE\
                                  fmt \x10\x00\x00\x00\
                                  \x01\x00\
                                  \x01\x00\
                                  \x40\x1F\x00\x00\
                                  \x80\x3E\x00\x00\
                                  \x02\x00\
                                  \x10\x00\
                                  data\x00\x00\x00\x00";

    #[test]
    fn test_placeholder_header_is_written_on_open() {
        let mut cursor = Cursor::new(Vec::new());
        let writer = WaveWriter::new(&mut cursor).unwrap();
        assert_eq!(EMPTY_HEADER, &writer.writer.get_ref()[..]);
        writer.finalize().unwrap();
    }

    #[test]
    fn test_no_samples_leaves_zero_sizes() {
        let mut cursor = Cursor::new(Vec::new());
        WaveWriter::new(&mut cursor).unwrap().finalize().unwrap();
        assert_eq!(EMPTY_HEADER, &cursor.into_inner()[..]);
    }

    #[test]
    fn test_sizes_are_patched_on_finalize() {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WaveWriter::new(&mut cursor).unwrap();
        assert_eq!(3, writer.write_samples(&[1, -2, 0x0304]).unwrap());
        assert_eq!(2, writer.write_samples(&[5, 6]).unwrap());
        assert_eq!(5, writer.samples_written());
        writer.finalize().unwrap();

        let bytes = cursor.into_inner();
        assert_eq!(44 + 10, bytes.len());
        assert_eq!(&(36u32 + 10).to_le_bytes(), &bytes[4..8]);
        assert_eq!(&10u32.to_le_bytes(), &bytes[40..44]);
        assert_eq!(b"\x01\x00\xFE\xFF\x04\x03\x05\x00\x06\x00", &bytes[44..]);
    }

    #[test]
    fn test_drop_patches_sizes() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WaveWriter::new(&mut cursor).unwrap();
            writer.write_samples(&[7; 4]).unwrap();
        }
        let bytes = cursor.into_inner();
        assert_eq!(&44u32.to_le_bytes(), &bytes[4..8]);
        assert_eq!(&8u32.to_le_bytes(), &bytes[40..44]);
    }

    #[test]
    fn test_discard_skips_the_patch() {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = WaveWriter::new(&mut cursor).unwrap();
        writer.write_samples(&[7; 4]).unwrap();
        writer.discard();

        let bytes = cursor.into_inner();
        assert_eq!(44 + 8, bytes.len());
        assert_eq!(&[0u8; 4], &bytes[4..8]);
        assert_eq!(&[0u8; 4], &bytes[40..44]);
    }

    #[test]
    fn test_header_offsets_are_relative_to_start() {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(b"JUNK").unwrap();
        let mut writer = WaveWriter::new(&mut cursor).unwrap();
        writer.write_samples(&[1]).unwrap();
        writer.finalize().unwrap();

        let bytes = cursor.into_inner();
        assert_eq!(b"JUNKRIFF", &bytes[..8]);
        assert_eq!(&38u32.to_le_bytes(), &bytes[8..12]);
        assert_eq!(&2u32.to_le_bytes(), &bytes[44..48]);
    }

    // Accepts a fixed number of bytes, then refuses to take more.
    struct ShortWriter {
        inner: Cursor<Vec<u8>>,
        capacity: usize,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.inner.position() as usize);
            let n = room.min(buf.len());
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for ShortWriter {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_partial_write_is_reported_not_fatal() {
        let mut short = ShortWriter {
            inner: Cursor::new(Vec::new()),
            capacity: 44 + 6,
        };
        let mut writer = WaveWriter::new(&mut short).unwrap();
        assert_eq!(3, writer.write_samples(&[1, 2, 3, 4, 5]).unwrap());
        assert_eq!(0, writer.write_samples(&[6]).unwrap());
        assert_eq!(3, writer.samples_written());
        writer.finalize().unwrap();

        let bytes = short.inner.into_inner();
        assert_eq!(&42u32.to_le_bytes(), &bytes[4..8]);
        assert_eq!(&6u32.to_le_bytes(), &bytes[40..44]);
    }

    #[test]
    fn test_half_written_sample_is_not_committed() {
        let mut short = ShortWriter {
            inner: Cursor::new(Vec::new()),
            capacity: 44 + 5,
        };
        let mut writer = WaveWriter::new(&mut short).unwrap();
        assert_eq!(2, writer.write_samples(&[1, 2, 3]).unwrap());
        assert_eq!(0, writer.write_samples(&[4]).unwrap());
        assert_eq!(2, writer.samples_written());
        writer.finalize().unwrap();

        let bytes = short.inner.into_inner();
        assert_eq!(&40u32.to_le_bytes(), &bytes[4..8]);
        assert_eq!(&4u32.to_le_bytes(), &bytes[40..44]);

        let mut reader = WaveReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(2, reader.total_frames());
        let mut buf = [0i16; 4];
        assert_eq!(2, reader.read_samples(&mut buf).unwrap());
        assert_eq!(&[1, 2], &buf[..2]);
        assert_eq!(0, reader.read_samples(&mut buf).unwrap());
    }
}
