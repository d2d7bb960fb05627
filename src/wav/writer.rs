//! **PCM container writer** – the sink a capture session streams into.
//!
//! The 44-byte header is written up front with zeroed length fields so block
//! writes from a periodic capture callback never stall on header bookkeeping;
//! [`WavWriter::finalize`] patches the RIFF and payload lengths in place and
//! only then is the file a valid container. [`WavWriter::discard`] drops the
//! in-progress file atomically, leaving nothing behind.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::WavError;
use crate::constants::WAV_HEADER_LEN;

/// Streaming writer for 16-bit mono little-endian PCM.
pub struct WavWriter {
    out: BufWriter<File>,
    path: PathBuf,
    sample_rate: u32,
    payload_len: u32,
    finalized: bool,
}

impl WavWriter {
    /// Create the output file and reserve the header.
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self, WavError> {
        if sample_rate == 0 {
            return Err(WavError::ZeroField("sample rate"));
        }
        let path = path.as_ref().to_path_buf();
        let mut out = BufWriter::new(File::create(&path)?);
        out.write_all(&header(sample_rate, 0))?;
        Ok(Self {
            out,
            path,
            sample_rate,
            payload_len: 0,
            finalized: false,
        })
    }

    /// Append one block of samples. Buffered; no flush per block.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), WavError> {
        for &s in samples {
            self.out.write_all(&s.to_le_bytes())?;
        }
        self.payload_len += (samples.len() * 2) as u32;
        Ok(())
    }

    /// Append a block of already-encoded payload bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), WavError> {
        self.out.write_all(bytes)?;
        self.payload_len += bytes.len() as u32;
        Ok(())
    }

    /// Bytes of payload written so far.
    pub fn payload_len(&self) -> u32 {
        self.payload_len
    }

    /// Patch the length fields and flush. The file is only a valid container
    /// after this returns.
    pub fn finalize(mut self) -> Result<PathBuf, WavError> {
        self.out.flush()?;
        let file = self.out.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header(self.sample_rate, self.payload_len))?;
        file.sync_all()?;
        self.finalized = true;
        debug!(
            "finalized {} ({} payload bytes)",
            self.path.display(),
            self.payload_len
        );
        Ok(self.path.clone())
    }

    /// Abort the session and remove the partial file.
    pub fn discard(mut self) -> Result<(), WavError> {
        self.finalized = true; // suppress the drop warning
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(
                "capture sink {} dropped without finalize/discard; file left truncated",
                self.path.display()
            );
        }
    }
}

/// Build the fixed 44-byte header for 16-bit mono PCM.
fn header(sample_rate: u32, payload_len: u32) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = sample_rate * 2;
    let mut h = [0u8; WAV_HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(36 + payload_len).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&1u16.to_le_bytes()); // mono
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&2u16.to_le_bytes()); // block align
    h[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&payload_len.to_le_bytes());
    h
}

/* ───────────────────────────── tests ──────────────────────────────── */
