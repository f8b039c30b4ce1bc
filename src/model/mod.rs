//! The compact, self-describing binary model container.
//!
//! Layout: a 48-byte little-endian header, a label string table, an
//! attribute string table, two feature-reference chunks ("LFRF"/"AFRF"),
//! and a feature-record chunk ("FEAT"). See `writer`/`reader` for the exact
//! byte layout of each section.

pub mod reader;
pub mod writer;

use std::path::Path;

use crate::dict::Dictionary;
use crate::feature::{Feature, FeatureRefs};

pub(crate) const MAGIC: &[u8; 4] = b"lCRF";
pub(crate) const MODEL_TYPE: &[u8; 4] = b"FOMC";
pub(crate) const VERSION: u32 = 100;
pub(crate) const HEADER_SIZE: usize = 48;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("bad magic bytes in model file")]
    BadMagic,
    #[error("unsupported model version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed model file: {0}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A loaded, read-only model: weights, feature references, and the string
/// dictionaries needed to translate ids back to names.
pub struct Model {
    pub labels: Dictionary,
    pub attrs: Dictionary,
    pub features: Vec<Feature>,
    pub refs: FeatureRefs,
    pub weights: Vec<f64>,
}

impl Model {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        reader::read_model(path)
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }
}
