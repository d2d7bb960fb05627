//! **PCM container decoder**
//!
//! Parses the fixed 44-byte RIFF/WAVE header and streams the raw payload.
//! Every header field is stored little-endian on disk regardless of the host,
//! so all reads go through `u16::from_le_bytes` / `u32::from_le_bytes`.
//!
//! The payload is interleaved signed 16-bit mono PCM; a sample frame is
//! rebuilt from its two bytes as `lo | hi << 8`.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use super::WavError;
use crate::constants::WAV_HEADER_LEN;

/// Decoded metadata of the fixed 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// RIFF chunk size (total file length minus 8).
    pub riff_len: u32,
    /// Channel count (1 for everything this engine produces).
    pub channels: u16,
    /// Samples per second.
    pub sample_rate: u32,
    /// Bytes per second (`sample_rate * block_align`).
    pub byte_rate: u32,
    /// Bytes per sample frame (block align).
    pub frame_size: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Payload length in bytes (the `data` chunk size).
    pub payload_len: u32,
}

impl WavHeader {
    /// Number of whole sample frames the payload holds (`floor(N / S)`).
    pub fn sample_count(&self) -> usize {
        self.payload_len as usize / self.frame_size as usize
    }
}

/// Sequential reader over an uncompressed PCM container.
pub struct WavReader<R> {
    inner: R,
    header: WavHeader,
    /// Bytes of payload handed out so far.
    consumed: usize,
    /// Scratch for one sample frame, sized `frame_size` once in `new`.
    frame_buf: Vec<u8>,
}

impl WavReader<BufReader<File>> {
    /// Open a container from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        let file = File::open(path.as_ref())?;
        let rd = Self::new(BufReader::new(file))?;
        debug!(
            "opened {}: {} Hz, {} ch, {} payload bytes",
            path.as_ref().display(),
            rd.header.sample_rate,
            rd.header.channels,
            rd.header.payload_len
        );
        Ok(rd)
    }
}

impl<R: Read + Seek> WavReader<R> {
    /// Parse the header from any seekable byte source.
    pub fn new(mut inner: R) -> Result<Self, WavError> {
        let mut hdr = [0u8; WAV_HEADER_LEN];
        let got = read_fully(&mut inner, &mut hdr)?;
        if got < WAV_HEADER_LEN {
            return Err(WavError::Truncated(got));
        }
        let header = parse_header(&hdr)?;
        let frame_buf = vec![0u8; header.frame_size as usize];
        Ok(Self {
            inner,
            header,
            consumed: 0,
            frame_buf,
        })
    }

    /// Header metadata.
    pub fn header(&self) -> &WavHeader {
        &self.header
    }

    /// Read up to `buf.len()` payload bytes, bounded by the declared payload
    /// length. Returns the number of bytes actually read and advances the
    /// cursor; `Ok(0)` signals end-of-data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, WavError> {
        let remaining = self.header.payload_len as usize - self.consumed;
        if remaining == 0 {
            return Ok(0);
        }
        let want = buf.len().min(remaining);
        let got = read_fully(&mut self.inner, &mut buf[..want])?;
        self.consumed += got;
        Ok(got)
    }

    /// Rewind to the start of the payload.
    pub fn reset(&mut self) -> Result<(), WavError> {
        self.inner.seek(SeekFrom::Start(WAV_HEADER_LEN as u64))?;
        self.consumed = 0;
        Ok(())
    }

    /// Next mono sample frame, or `None` once fewer than `frame_size` bytes
    /// remain. Only the first two bytes of a frame contribute; the payload is
    /// mono by contract, so there is no mixing.
    pub fn next_sample(&mut self) -> Result<Option<i16>, WavError> {
        let frame_size = self.frame_buf.len();
        let mut frame = std::mem::take(&mut self.frame_buf);
        let got = self.read(&mut frame)?;
        let sample = if got < frame_size {
            None
        } else {
            // low byte + high byte << 8
            let hi = if frame_size > 1 { frame[1] } else { 0 };
            Some(i16::from_le_bytes([frame[0], hi]))
        };
        self.frame_buf = frame;
        Ok(sample)
    }

    /// Drain every remaining sample frame into one buffer.
    pub fn read_all_samples(&mut self) -> Result<Vec<i16>, WavError> {
        let mut out = Vec::with_capacity(self.header.sample_count());
        while let Some(s) = self.next_sample()? {
            out.push(s);
        }
        Ok(out)
    }
}

/* ─────────────────────── header parsing ─────────────────────── */

fn parse_header(hdr: &[u8; WAV_HEADER_LEN]) -> Result<WavHeader, WavError> {
    if &hdr[0..4] != b"RIFF" {
        return Err(WavError::BadMagic { expected: "RIFF" });
    }
    if &hdr[8..12] != b"WAVE" {
        return Err(WavError::BadMagic { expected: "WAVE" });
    }
    if &hdr[12..16] != b"fmt " {
        return Err(WavError::BadMagic { expected: "fmt " });
    }
    if &hdr[36..40] != b"data" {
        return Err(WavError::BadMagic { expected: "data" });
    }
    let fmt_len = u32_at(hdr, 16);
    if fmt_len != 16 {
        return Err(WavError::BadMagic { expected: "fmt(16)" });
    }
    let format_tag = u16_at(hdr, 20);
    if format_tag != 1 {
        return Err(WavError::NotPcm(format_tag));
    }

    let header = WavHeader {
        riff_len: u32_at(hdr, 4),
        channels: u16_at(hdr, 22),
        sample_rate: u32_at(hdr, 24),
        byte_rate: u32_at(hdr, 28),
        frame_size: u16_at(hdr, 32),
        bits_per_sample: u16_at(hdr, 34),
        payload_len: u32_at(hdr, 40),
    };
    if header.frame_size == 0 {
        return Err(WavError::ZeroField("block align"));
    }
    if header.sample_rate == 0 {
        return Err(WavError::ZeroField("sample rate"));
    }
    Ok(header)
}

#[inline]
fn u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline]
fn u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// `Read::read` may return short counts; loop until the buffer is full or EOF.
fn read_fully<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize, WavError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/* ───────────────────────────── tests ──────────────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(payload_len: u32, frame_size: u16) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(b"RIFF");
        h.extend_from_slice(&(36 + payload_len).to_le_bytes());
        h.extend_from_slice(b"WAVE");
        h.extend_from_slice(b"fmt ");
        h.extend_from_slice(&16u32.to_le_bytes());
        h.extend_from_slice(&1u16.to_le_bytes()); // PCM
        h.extend_from_slice(&1u16.to_le_bytes()); // mono
        h.extend_from_slice(&8000u32.to_le_bytes());
        h.extend_from_slice(&16000u32.to_le_bytes());
        h.extend_from_slice(&frame_size.to_le_bytes());
        h.extend_from_slice(&16u16.to_le_bytes());
        h.extend_from_slice(b"data");
        h.extend_from_slice(&payload_len.to_le_bytes());
        h
    }

    #[test]
    fn parses_little_endian_fields() {
        let mut bytes = header_bytes(4, 2);
        bytes.extend_from_slice(&[0x34, 0x12, 0xfe, 0xff]);
        let rd = WavReader::new(Cursor::new(bytes)).unwrap();
        let h = rd.header();
        assert_eq!(h.sample_rate, 8000);
        assert_eq!(h.frame_size, 2);
        assert_eq!(h.payload_len, 4);
        assert_eq!(h.sample_count(), 2);
    }

    #[test]
    fn samples_combine_low_and_high_byte() {
        let mut bytes = header_bytes(4, 2);
        bytes.extend_from_slice(&[0x34, 0x12, 0xfe, 0xff]);
        let mut rd = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(rd.next_sample().unwrap(), Some(0x1234));
        assert_eq!(rd.next_sample().unwrap(), Some(-2));
        assert_eq!(rd.next_sample().unwrap(), None);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = header_bytes(0, 2);
        bytes[0] = b'X';
        assert!(matches!(
            WavReader::new(Cursor::new(bytes)),
            Err(WavError::BadMagic { expected: "RIFF" })
        ));
    }

    #[test]
    fn non_pcm_format_tag_is_rejected() {
        let mut bytes = header_bytes(0, 2);
        bytes[20..22].copy_from_slice(&3u16.to_le_bytes()); // IEEE float
        assert!(matches!(
            WavReader::new(Cursor::new(bytes)),
            Err(WavError::NotPcm(3))
        ));
    }

    #[test]
    fn yields_floor_of_payload_over_frame_size() {
        // 7 payload bytes, 2-byte frames -> exactly 3 samples.
        let mut bytes = header_bytes(7, 2);
        bytes.extend_from_slice(&[1, 0, 2, 0, 3, 0, 4]);
        let mut rd = WavReader::new(Cursor::new(bytes)).unwrap();
        let samples = rd.read_all_samples().unwrap();
        assert_eq!(samples, vec![1, 2, 3]);
    }

    #[test]
    fn reset_rewinds_to_payload_start() {
        let mut bytes = header_bytes(4, 2);
        bytes.extend_from_slice(&[5, 0, 6, 0]);
        let mut rd = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(rd.read_all_samples().unwrap(), vec![5, 6]);
        rd.reset().unwrap();
        assert_eq!(rd.read_all_samples().unwrap(), vec![5, 6]);
    }

    #[test]
    fn truncated_header_is_reported() {
        let bytes = header_bytes(0, 2)[..20].to_vec();
        assert!(matches!(
            WavReader::new(Cursor::new(bytes)),
            Err(WavError::Truncated(20))
        ));
    }
}
