//! RIFF/WAVE file interface
//!
//! Reads PCM and WAVE_FORMAT_EXTENSIBLE (PCM sub-format) files one channel at
//! a time, and writes minimal PCM files that are filled channel by channel.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, trace};

use crate::protocols::dtmf::SampleBuffer;
use crate::{Error, Result};

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

const PCM_FMT_SIZE: u32 = 16;
const EXTENSIBLE_FMT_SIZE: u32 = 40;
const EXTENSIBLE_CB_SIZE: u16 = 22;

/// KSDATAFORMAT_SUBTYPE_PCM as stored on disk
const PCM_SUBFORMAT_GUID: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Size of the header written by [`write_header`]
pub const PCM_HEADER_SIZE: u64 = 44;

pub const SUPPORTED_BITS: [u16; 3] = [16, 24, 32];

/// Container variant of a parsed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WavFormat {
    Pcm,
    Extensible,
}

/// Stream parameters used to create a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
}

impl WavSpec {
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    pub fn data_len(&self) -> u64 {
        self.block_align() as u64 * u64::from(self.frames)
    }

    fn validate(&self) -> Result<()> {
        if !SUPPORTED_BITS.contains(&self.bits_per_sample) {
            return Err(Error::invalid_argument(format!(
                "Unsupported bit depth: {}",
                self.bits_per_sample
            )));
        }
        if self.channels == 0 {
            return Err(Error::invalid_argument("WAV needs at least one channel"));
        }
        if self.data_len() > u64::from(u32::MAX) - PCM_HEADER_SIZE {
            return Err(Error::invalid_argument("WAV data exceeds 4 GiB"));
        }
        Ok(())
    }

    /// Canonical 44-byte PCM header
    pub fn encode_header(&self) -> Bytes {
        let data_len = self.data_len() as u32;
        let block_align = self.block_align() as u16;

        let mut buf = BytesMut::with_capacity(PCM_HEADER_SIZE as usize);
        buf.put_slice(b"RIFF");
        buf.put_u32_le(data_len + PCM_HEADER_SIZE as u32 - 8);
        buf.put_slice(b"WAVE");
        buf.put_slice(b"fmt ");
        buf.put_u32_le(PCM_FMT_SIZE);
        buf.put_u16_le(WAVE_FORMAT_PCM);
        buf.put_u16_le(self.channels);
        buf.put_u32_le(self.sample_rate);
        buf.put_u32_le(u32::from(block_align) * self.sample_rate);
        buf.put_u16_le(block_align);
        buf.put_u16_le(self.bits_per_sample);
        buf.put_slice(b"data");
        buf.put_u32_le(data_len);
        buf.freeze()
    }
}

/// Parsed header of an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WavHeader {
    pub format: WavFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
    /// Byte offset of the first sample
    pub data_offset: u64,
}

impl WavHeader {
    pub fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            frames: self.frames,
        }
    }
}

fn read_chunk_header<R: Read>(reader: &mut R) -> Result<([u8; 4], u32)> {
    let mut raw = [0u8; 8];
    reader.read_exact(&mut raw)?;
    let mut buf = &raw[..];
    let mut id = [0u8; 4];
    buf.copy_to_slice(&mut id);
    Ok((id, buf.get_u32_le()))
}

fn expect_chunk<R: Read>(reader: &mut R, expected: &[u8; 4]) -> Result<u32> {
    let (id, size) = read_chunk_header(reader)?;
    if &id != expected {
        return Err(Error::format_invalid(format!(
            "Expected '{}' chunk, found '{}'",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(&id)
        )));
    }
    Ok(size)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0);
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Parse a header from the start of a WAV stream
pub fn parse_header<R: Read>(reader: &mut R) -> Result<WavHeader> {
    expect_chunk(reader, b"RIFF")?;
    let mut wave = [0u8; 4];
    reader.read_exact(&mut wave)?;
    if &wave != b"WAVE" {
        return Err(Error::format_invalid("Missing WAVE identifier"));
    }
    let mut offset = 12u64;

    let fmt_size = expect_chunk(reader, b"fmt ")?;
    if fmt_size != PCM_FMT_SIZE && fmt_size != EXTENSIBLE_FMT_SIZE {
        return Err(Error::format_invalid(format!("Unexpected fmt chunk size {}", fmt_size)));
    }
    let fmt = read_exact_vec(reader, fmt_size as usize)?;
    offset += 8 + u64::from(fmt_size);

    let mut fmt = &fmt[..];
    let format_tag = fmt.get_u16_le();
    let channels = fmt.get_u16_le();
    let sample_rate = fmt.get_u32_le();
    let byte_rate = fmt.get_u32_le();
    let block_align = fmt.get_u16_le();
    let bits_per_sample = fmt.get_u16_le();

    let format = match (format_tag, fmt_size) {
        (WAVE_FORMAT_PCM, PCM_FMT_SIZE) => WavFormat::Pcm,
        (WAVE_FORMAT_EXTENSIBLE, EXTENSIBLE_FMT_SIZE) => {
            let cb_size = fmt.get_u16_le();
            let valid_bits = fmt.get_u16_le();
            let _channel_mask = fmt.get_u32_le();
            let mut guid = [0u8; 16];
            fmt.copy_to_slice(&mut guid);

            if cb_size != EXTENSIBLE_CB_SIZE {
                return Err(Error::format_invalid(format!("Unexpected cbSize {}", cb_size)));
            }
            if valid_bits > bits_per_sample {
                return Err(Error::format_invalid(format!(
                    "Valid bits {} exceed container bits {}",
                    valid_bits, bits_per_sample
                )));
            }
            if guid != PCM_SUBFORMAT_GUID {
                return Err(Error::format_invalid("Extensible sub-format is not PCM"));
            }
            WavFormat::Extensible
        }
        (tag, size) => {
            return Err(Error::format_invalid(format!(
                "Unsupported format tag 0x{:04X} with fmt size {}",
                tag, size
            )));
        }
    };

    if !SUPPORTED_BITS.contains(&bits_per_sample) {
        return Err(Error::format_invalid(format!("Unsupported bit depth {}", bits_per_sample)));
    }
    if channels == 0 {
        return Err(Error::format_invalid("Zero channels"));
    }
    let expected_align = u32::from(channels) * u32::from(bits_per_sample / 8);
    if u32::from(block_align) != expected_align {
        return Err(Error::format_invalid(format!(
            "Block align {} does not match {} channels of {} bits",
            block_align, channels, bits_per_sample
        )));
    }
    if u64::from(block_align) * u64::from(sample_rate) != u64::from(byte_rate) {
        return Err(Error::format_invalid(format!(
            "Byte rate {} does not match block align {} at {} Hz",
            byte_rate, block_align, sample_rate
        )));
    }

    if format == WavFormat::Extensible {
        let fact_size = expect_chunk(reader, b"fact")?;
        if fact_size < 4 {
            return Err(Error::format_invalid(format!("fact chunk too small: {}", fact_size)));
        }
        read_exact_vec(reader, fact_size as usize)?;
        offset += 8 + u64::from(fact_size);
    }

    let data_size = expect_chunk(reader, b"data")?;
    offset += 8;

    Ok(WavHeader {
        format,
        channels,
        sample_rate,
        bits_per_sample,
        frames: data_size / u32::from(block_align),
        data_offset: offset,
    })
}

/// Read and validate the header of the file at `path`
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<WavHeader> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);
    let header = parse_header(&mut reader)?;
    debug!(
        "{}: {:?} {} ch, {} Hz, {} bits, {} frames",
        path.display(),
        header.format,
        header.channels,
        header.sample_rate,
        header.bits_per_sample,
        header.frames
    );
    Ok(header)
}

fn check_channel(channels: u16, chan: usize) -> Result<()> {
    if chan >= usize::from(channels) {
        return Err(Error::invalid_argument(format!(
            "Channel {} out of range for {} channel file",
            chan, channels
        )));
    }
    Ok(())
}

fn decode_sample(mut raw: &[u8], bits_per_sample: u16) -> i32 {
    match bits_per_sample {
        16 => i32::from(raw.get_i16_le()),
        // Shift the 24-bit value to the top and back to sign-extend it
        24 => ((raw.get_uint_le(3) as u32) << 8) as i32 >> 8,
        _ => raw.get_i32_le(),
    }
}

fn encode_sample(mut raw: &mut [u8], sample: i32, bits_per_sample: u16) {
    match bits_per_sample {
        16 => raw.put_i16_le(sample as i16),
        24 => raw.put_int_le(i64::from(sample), 3),
        _ => raw.put_i32_le(sample),
    }
}

/// Extract one channel's samples from the interleaved data
pub fn read_channel<P: AsRef<Path>>(path: P, header: &WavHeader, chan: usize) -> Result<SampleBuffer> {
    check_channel(header.channels, chan)?;
    let spec = header.spec();

    let mut file = File::open(path.as_ref())?;
    file.seek(SeekFrom::Start(header.data_offset))?;
    let data = read_exact_vec(&mut BufReader::new(file), spec.data_len() as usize)?;

    let width = spec.bytes_per_sample();
    let offset = chan * width;
    let mut samples = SampleBuffer::new();
    samples.try_reserve_exact(header.frames as usize)?;
    samples.extend(
        data.chunks_exact(spec.block_align())
            .map(|frame| decode_sample(&frame[offset..offset + width], header.bits_per_sample)),
    );

    trace!("Read {} samples from channel {}", samples.len(), chan);
    Ok(samples)
}

/// Create `path` with a PCM header and zeroed data sized for `spec.frames`
pub fn write_header<P: AsRef<Path>>(path: P, spec: &WavSpec) -> Result<()> {
    spec.validate()?;

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&spec.encode_header())?;
    io::copy(&mut io::repeat(0).take(spec.data_len()), &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Overwrite channel `chan` of a file created by [`write_header`]
pub fn write_channel<P: AsRef<Path>>(path: P, spec: &WavSpec, chan: usize, samples: &[i32]) -> Result<()> {
    check_channel(spec.channels, chan)?;
    if samples.len() != spec.frames as usize {
        return Err(Error::invalid_argument(format!(
            "Expected {} samples for channel {}, got {}",
            spec.frames,
            chan,
            samples.len()
        )));
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
    file.seek(SeekFrom::Start(PCM_HEADER_SIZE))?;
    let mut data = read_exact_vec(&mut file, spec.data_len() as usize)?;

    let width = spec.bytes_per_sample();
    let offset = chan * width;
    for (frame, &sample) in data.chunks_exact_mut(spec.block_align()).zip(samples) {
        encode_sample(&mut frame[offset..offset + width], sample, spec.bits_per_sample);
    }

    file.seek(SeekFrom::Start(PCM_HEADER_SIZE))?;
    file.write_all(&data)?;
    file.flush()?;

    trace!("Wrote {} samples to channel {}", samples.len(), chan);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn spec(channels: u16, bits_per_sample: u16, frames: u32) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample,
            frames,
        }
    }

    fn extensible_header(channels: u16, bits: u16, frames: u32, guid: [u8; 16]) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let data_len = u32::from(block_align) * frames;
        let mut buf = BytesMut::new();
        buf.put_slice(b"RIFF");
        buf.put_u32_le(72 + data_len);
        buf.put_slice(b"WAVE");
        buf.put_slice(b"fmt ");
        buf.put_u32_le(EXTENSIBLE_FMT_SIZE);
        buf.put_u16_le(WAVE_FORMAT_EXTENSIBLE);
        buf.put_u16_le(channels);
        buf.put_u32_le(8000);
        buf.put_u32_le(u32::from(block_align) * 8000);
        buf.put_u16_le(block_align);
        buf.put_u16_le(bits);
        buf.put_u16_le(EXTENSIBLE_CB_SIZE);
        buf.put_u16_le(bits);
        buf.put_u32_le(0x3);
        buf.put_slice(&guid);
        buf.put_slice(b"fact");
        buf.put_u32_le(4);
        buf.put_u32_le(frames);
        buf.put_slice(b"data");
        buf.put_u32_le(data_len);
        buf.put_bytes(0, data_len as usize);
        buf.to_vec()
    }

    #[test]
    fn test_pcm_header_layout() {
        let header = spec(2, 16, 8000).encode_header();
        assert_eq!(header.len(), 44);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..16], b"WAVEfmt ");
        assert_eq!(&header[36..40], b"data");

        let parsed = parse_header(&mut Cursor::new(header.to_vec())).unwrap();
        assert_eq!(parsed.format, WavFormat::Pcm);
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.sample_rate, 8000);
        assert_eq!(parsed.bits_per_sample, 16);
        assert_eq!(parsed.frames, 8000);
        assert_eq!(parsed.data_offset, PCM_HEADER_SIZE);
    }

    #[test]
    fn test_extensible_header() {
        let bytes = extensible_header(2, 24, 10, PCM_SUBFORMAT_GUID);
        let parsed = parse_header(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.format, WavFormat::Extensible);
        assert_eq!(parsed.bits_per_sample, 24);
        assert_eq!(parsed.frames, 10);
        assert_eq!(parsed.data_offset, 80);
    }

    #[test]
    fn test_extensible_channels_are_sign_extended() {
        let left = [1, -1, 8_388_607, -8_388_608];
        let right = [-2, 300_000, 0, -4096];

        let mut bytes = extensible_header(2, 24, 4, PCM_SUBFORMAT_GUID);
        for (frame, (&l, &r)) in bytes[80..].chunks_exact_mut(6).zip(left.iter().zip(&right)) {
            encode_sample(&mut frame[0..3], l, 24);
            encode_sample(&mut frame[3..6], r, 24);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ext24.wav");
        std::fs::write(&path, &bytes).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.format, WavFormat::Extensible);
        assert_eq!(header.data_offset, 80);
        assert_eq!(read_channel(&path, &header, 0).unwrap(), left);
        assert_eq!(read_channel(&path, &header, 1).unwrap(), right);
    }

    #[test]
    fn test_extensible_rejects_float_subformat() {
        let mut guid = PCM_SUBFORMAT_GUID;
        guid[0] = 0x03; // IEEE float
        let bytes = extensible_header(2, 32, 10, guid);
        let err = parse_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::FormatInvalid(_)));
    }

    #[test]
    fn test_rejects_bad_chunk_ids_and_fields() {
        let good = spec(2, 16, 4).encode_header().to_vec();

        let mut riff = good.clone();
        riff[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(parse_header(&mut Cursor::new(riff)), Err(Error::FormatInvalid(_))));

        let mut data = good.clone();
        data[36..40].copy_from_slice(b"LIST");
        assert!(matches!(parse_header(&mut Cursor::new(data)), Err(Error::FormatInvalid(_))));

        let mut tag = good.clone();
        tag[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(matches!(parse_header(&mut Cursor::new(tag)), Err(Error::FormatInvalid(_))));

        let mut bits = good.clone();
        bits[34..36].copy_from_slice(&8u16.to_le_bytes());
        bits[32..34].copy_from_slice(&2u16.to_le_bytes());
        bits[28..32].copy_from_slice(&16000u32.to_le_bytes());
        assert!(matches!(parse_header(&mut Cursor::new(bits)), Err(Error::FormatInvalid(_))));

        let mut rate = good;
        rate[28..32].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(parse_header(&mut Cursor::new(rate)), Err(Error::FormatInvalid(_))));
    }

    #[test]
    fn test_truncated_header_is_io_error() {
        let header = spec(2, 16, 4).encode_header();
        let err = parse_header(&mut Cursor::new(header[..20].to_vec())).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_sample_codec_sign_extension() {
        let mut raw = [0u8; 3];
        encode_sample(&mut raw, -2, 24);
        assert_eq!(raw, [0xFE, 0xFF, 0xFF]);
        assert_eq!(decode_sample(&raw, 24), -2);

        encode_sample(&mut raw, 8_388_607, 24);
        assert_eq!(decode_sample(&raw, 24), 8_388_607);
        encode_sample(&mut raw, -8_388_608, 24);
        assert_eq!(decode_sample(&raw, 24), -8_388_608);

        let mut raw16 = [0u8; 2];
        encode_sample(&mut raw16, -32768, 16);
        assert_eq!(decode_sample(&raw16, 16), -32768);

        let mut raw32 = [0u8; 4];
        encode_sample(&mut raw32, i32::MIN, 32);
        assert_eq!(decode_sample(&raw32, 32), i32::MIN);
    }

    #[test]
    fn test_write_then_read_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("34.wav");

        for bits in SUPPORTED_BITS {
            let spec = spec(3, bits, 5);
            write_header(&path, &spec).unwrap();

            let header = read_header(&path).unwrap();
            assert_eq!(header.spec(), spec);
            assert_eq!(read_channel(&path, &header, 1).unwrap(), vec![0; 5]);

            write_channel(&path, &spec, 0, &[1, -1, 2, -2, 3]).unwrap();
            write_channel(&path, &spec, 2, &[-100, 200, -300, 400, -500]).unwrap();

            assert_eq!(read_channel(&path, &header, 0).unwrap(), vec![1, -1, 2, -2, 3]);
            assert_eq!(read_channel(&path, &header, 1).unwrap(), vec![0; 5]);
            assert_eq!(read_channel(&path, &header, 2).unwrap(), vec![-100, 200, -300, 400, -500]);

            let len = std::fs::metadata(&path).unwrap().len();
            assert_eq!(len, PCM_HEADER_SIZE + spec.data_len());
        }
    }

    #[test]
    fn test_channel_bounds_and_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("12.wav");
        let spec = spec(2, 16, 4);
        write_header(&path, &spec).unwrap();
        let header = read_header(&path).unwrap();

        assert!(matches!(read_channel(&path, &header, 2), Err(Error::InvalidArgument(_))));
        assert!(matches!(write_channel(&path, &spec, 2, &[0; 4]), Err(Error::InvalidArgument(_))));
        assert!(matches!(write_channel(&path, &spec, 0, &[0; 3]), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = read_header("/nonexistent/dir/none.wav").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_write_rejects_unsupported_depth() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_header(dir.path().join("x.wav"), &spec(2, 8, 4)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
