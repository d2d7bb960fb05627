//! Trained speaker model and its on-disk format.
//!
//! A codebook is frozen at enrollment and never mutated afterwards;
//! verification only reads it. Persistence is CBOR, written atomically via
//! "`<file>.tmp` → rename" so a crashed save never leaves a half-written
//! model behind.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use ciborium::{de, ser};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::constants::CODEBOOK_FORMAT_VERSION;

/* --------------------------------------------------------------------- */
/*  Error type                                                           */

#[derive(Debug, Error)]
pub enum CodebookError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cbor: {0}")]
    Cbor(String),
    #[error("unsupported codebook version {0}")]
    Version(u8),
}

type CbResult<T> = Result<T, CodebookError>;

fn write_cbor<W: Write, T: Serialize + ?Sized>(w: W, val: &T) -> CbResult<()> {
    ser::into_writer(val, w).map_err(|e| CodebookError::Cbor(e.to_string()))
}
fn read_cbor<R: Read, T: DeserializeOwned>(r: R) -> CbResult<T> {
    de::from_reader(r).map_err(|e| CodebookError::Cbor(e.to_string()))
}

/* --------------------------------------------------------------------- */
/*  Persistence traits                                                   */

/// CBOR serialization with atomic file writes.
pub trait ModelSave: Serialize {
    /// Atomically write CBOR to `path`.
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CbResult<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");

        {
            let f = File::create(&tmp)?;
            let mut bw = BufWriter::new(f);
            write_cbor(&mut bw, self)?;
            bw.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Serialize into an in-memory CBOR buffer.
    fn save_to_buffer(&self) -> CbResult<Vec<u8>> {
        let mut buf = Vec::new();
        write_cbor(&mut buf, self)?;
        Ok(buf)
    }
}

/// CBOR deserialization from files or buffers.
pub trait ModelLoad: DeserializeOwned + Sized {
    fn load_from_file<P: AsRef<Path>>(path: P) -> CbResult<Self> {
        let f = File::open(path)?;
        read_cbor(BufReader::new(f))
    }

    fn load_from_buffer(buf: &[u8]) -> CbResult<Self> {
        read_cbor(BufReader::new(buf))
    }
}

/* --------------------------------------------------------------------- */
/*  Codebook                                                             */

/// A fixed set of centroid vectors representing one enrolled voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    /// On-disk format version.
    pub version: u8,
    centroids: Vec<Vec<f64>>,
}

impl ModelSave for Codebook {}
impl ModelLoad for Codebook {}

impl Codebook {
    /// Freeze a set of centroids. All centroids must share one dimension and
    /// there must be at least one; both are guaranteed by the trainer.
    pub(crate) fn new(centroids: Vec<Vec<f64>>) -> Self {
        debug_assert!(!centroids.is_empty());
        debug_assert!(centroids.iter().all(|c| c.len() == centroids[0].len()));
        Self {
            version: CODEBOOK_FORMAT_VERSION,
            centroids,
        }
    }

    /// Number of centroids.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Dimension of every centroid.
    pub fn dimension(&self) -> usize {
        self.centroids.first().map_or(0, Vec::len)
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Reject models written by a future format version.
    pub fn ensure_supported(&self) -> CbResult<()> {
        if self.version > CODEBOOK_FORMAT_VERSION {
            return Err(CodebookError::Version(self.version));
        }
        Ok(())
    }
}

/* ───────────────────────────── tests ──────────────────────────────── */
