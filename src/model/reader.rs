//! Binary model reader: the inverse of `writer::write_model`.

use std::fs;
use std::path::Path;

use crate::dict::Dictionary;
use crate::feature::{Feature, FeatureKind, FeatureRefs};

use super::{Model, ModelError, HEADER_SIZE, MAGIC, MODEL_TYPE, VERSION};

struct Header {
    num_features: u32,
    num_labels: u32,
    num_attrs: u32,
    off_features: u32,
    off_labels: u32,
    off_attrs: u32,
    off_labelrefs: u32,
    off_attrrefs: u32,
}

pub fn read_model(path: &Path) -> Result<Model, ModelError> {
    let buf = fs::read(path)?;
    let header = parse_header(&buf)?;

    let labels = Dictionary::from_ordered(read_string_table(&buf, header.off_labels as usize)?);
    let attrs = Dictionary::from_ordered(read_string_table(&buf, header.off_attrs as usize)?);

    if labels.len() != header.num_labels as usize {
        return Err(ModelError::Malformed(format!(
            "label count mismatch: header says {}, table has {}",
            header.num_labels,
            labels.len()
        )));
    }
    if attrs.len() != header.num_attrs as usize {
        return Err(ModelError::Malformed(format!(
            "attribute count mismatch: header says {}, table has {}",
            header.num_attrs,
            attrs.len()
        )));
    }

    let label_refs = read_refs_chunk(&buf, header.off_labelrefs as usize, b"LFRF")?;
    let attr_refs = read_refs_chunk(&buf, header.off_attrrefs as usize, b"AFRF")?;

    let (features, weights) = read_feat_chunk(&buf, header.off_features as usize, header.num_features)?;

    Ok(Model {
        labels,
        attrs,
        features,
        refs: FeatureRefs { label_refs, attr_refs },
        weights,
    })
}

fn parse_header(buf: &[u8]) -> Result<Header, ModelError> {
    if buf.len() < HEADER_SIZE {
        return Err(ModelError::Malformed("file shorter than header".into()));
    }
    if &buf[0..4] != MAGIC {
        return Err(ModelError::BadMagic);
    }
    if &buf[8..12] != MODEL_TYPE {
        return Err(ModelError::Malformed("unexpected model type tag".into()));
    }
    let version = read_u32(buf, 12);
    if version != VERSION {
        return Err(ModelError::UnsupportedVersion(version));
    }

    Ok(Header {
        num_features: read_u32(buf, 16),
        num_labels: read_u32(buf, 20),
        num_attrs: read_u32(buf, 24),
        off_features: read_u32(buf, 28),
        off_labels: read_u32(buf, 32),
        off_attrs: read_u32(buf, 36),
        off_labelrefs: read_u32(buf, 40),
        off_attrrefs: read_u32(buf, 44),
    })
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(buf[at..at + 4].try_into().expect("4-byte slice"))
}

fn read_f64(buf: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(buf[at..at + 8].try_into().expect("8-byte slice"))
}

fn read_string_table(buf: &[u8], at: usize) -> Result<Vec<String>, ModelError> {
    let count = read_u32(buf, at) as usize;
    let mut pos = at + 4;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u32(buf, pos) as usize;
        pos += 4;
        let bytes = buf
            .get(pos..pos + len)
            .ok_or_else(|| ModelError::Malformed("truncated string table".into()))?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| ModelError::Malformed("non-UTF8 string in dictionary".into()))?
            .to_owned();
        out.push(s);
        pos += len;
    }
    Ok(out)
}

fn read_refs_chunk(buf: &[u8], at: usize, tag: &[u8; 4]) -> Result<Vec<Vec<u32>>, ModelError> {
    if &buf[at..at + 4] != tag {
        return Err(ModelError::Malformed(format!(
            "expected chunk tag {:?}",
            std::str::from_utf8(tag).unwrap_or("?")
        )));
    }
    let count = read_u32(buf, at + 8) as usize;
    let offsets_at = at + 12;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let off = read_u32(buf, offsets_at + 4 * i) as usize;
        let block_at = at + off;
        let n = read_u32(buf, block_at) as usize;
        let mut fids = Vec::with_capacity(n);
        for k in 0..n {
            fids.push(read_u32(buf, block_at + 4 + 4 * k));
        }
        out.push(fids);
    }
    Ok(out)
}

fn read_feat_chunk(buf: &[u8], at: usize, count: u32) -> Result<(Vec<Feature>, Vec<f64>), ModelError> {
    if &buf[at..at + 4] != b"FEAT" {
        return Err(ModelError::Malformed("expected chunk tag FEAT".into()));
    }
    let n = read_u32(buf, at + 8) as usize;
    if n != count as usize {
        return Err(ModelError::Malformed(
            "feature count mismatch between header and FEAT chunk".into(),
        ));
    }
    let records_at = at + 12;
    let mut features = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..n {
        let rec_at = records_at + 20 * i;
        let kind = read_u32(buf, rec_at);
        let src = read_u32(buf, rec_at + 4);
        let dst = read_u32(buf, rec_at + 8);
        let weight = read_f64(buf, rec_at + 12);
        let kind = match kind {
            0 => FeatureKind::State,
            1 => FeatureKind::Transition,
            other => {
                return Err(ModelError::Malformed(format!("unknown feature kind tag {other}")))
            }
        };
        features.push(Feature {
            kind,
            src,
            dst,
            freq: 0.0,
        });
        weights.push(weight);
    }
    Ok((features, weights))
}
