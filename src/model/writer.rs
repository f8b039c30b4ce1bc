//! Binary model writer.
//!
//! Builds each section in memory, computes offsets, then writes the whole
//! file in one pass (simpler than seek-and-patch, and the file is small
//! enough in practice that the double buffering cost does not matter).

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::dict::Dictionary;
use crate::feature::{Feature, FeatureKind};

use super::{ModelError, HEADER_SIZE, MAGIC, MODEL_TYPE, VERSION};

struct Record {
    kind: u32,
    src: u32,
    dst: u32,
    weight: f64,
}

/// Writes `features`/`w` (active features only, i.e. nonzero weight) to
/// `path`. Attributes referenced by no active feature are dropped and
/// renumbered; labels are never pruned since every label remains a valid
/// tag regardless of feature activity.
pub fn write_model(
    path: &Path,
    features: &[Feature],
    w: &[f64],
    attrs: &Dictionary,
    labels: &Dictionary,
) -> Result<(), ModelError> {
    assert_eq!(features.len(), w.len());

    let mut amap: HashMap<u32, u32> = HashMap::new();
    let active: Vec<(&Feature, f64)> = features
        .iter()
        .zip(w.iter())
        .filter(|(_, &weight)| weight != 0.0)
        .map(|(f, &weight)| (f, weight))
        .collect();

    for (f, _) in &active {
        if f.kind == FeatureKind::State && !amap.contains_key(&f.src) {
            let new_id = amap.len() as u32;
            amap.insert(f.src, new_id);
        }
    }
    let num_attrs = amap.len();

    let mut label_refs: Vec<Vec<u32>> = vec![Vec::new(); labels.len()];
    let mut attr_refs: Vec<Vec<u32>> = vec![Vec::new(); num_attrs];
    let mut records = Vec::with_capacity(active.len());

    for (new_fid, (f, weight)) in active.iter().enumerate() {
        let new_fid = new_fid as u32;
        match f.kind {
            FeatureKind::State => {
                let new_src = amap[&f.src];
                attr_refs[new_src as usize].push(new_fid);
                records.push(Record {
                    kind: 0,
                    src: new_src,
                    dst: f.dst,
                    weight: *weight,
                });
            }
            FeatureKind::Transition => {
                label_refs[f.src as usize].push(new_fid);
                records.push(Record {
                    kind: 1,
                    src: f.src,
                    dst: f.dst,
                    weight: *weight,
                });
            }
        }
    }

    let mut attr_strings = vec![String::new(); num_attrs];
    for (&old_id, &new_id) in amap.iter() {
        attr_strings[new_id as usize] = attrs
            .string_of(old_id)
            .ok_or_else(|| ModelError::Malformed(format!("dangling attribute id {old_id}")))?
            .to_owned();
    }
    let mut label_strings = Vec::with_capacity(labels.len());
    for id in 0..labels.len() as u32 {
        label_strings.push(
            labels
                .string_of(id)
                .ok_or_else(|| ModelError::Malformed(format!("dangling label id {id}")))?
                .to_owned(),
        );
    }

    let label_dict_buf = write_string_table(&label_strings);
    let attr_dict_buf = write_string_table(&attr_strings);

    let off_labels = HEADER_SIZE as u32;
    let off_attrs = off_labels + label_dict_buf.len() as u32;
    let unaligned_labelrefs = off_attrs + attr_dict_buf.len() as u32;
    let pad_len = (4 - unaligned_labelrefs % 4) % 4;
    let off_labelrefs = unaligned_labelrefs + pad_len;

    // The label reference chunk carries two trailing empty blocks beyond
    // the L real ones, matching crf1d_encode.cpp's crf1dmw_open_labelrefs(L+2).
    let labelrefs_buf = write_refs_chunk(b"LFRF", &label_refs, 2);
    let attrrefs_buf = write_refs_chunk(b"AFRF", &attr_refs, 0);
    let feat_buf = write_feat_chunk(&records);

    let off_attrrefs = off_labelrefs + labelrefs_buf.len() as u32;
    let off_features = off_attrrefs + attrrefs_buf.len() as u32;
    let total_size = off_features + feat_buf.len() as u32;

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&total_size.to_le_bytes());
    header.extend_from_slice(MODEL_TYPE);
    header.extend_from_slice(&VERSION.to_le_bytes());
    header.extend_from_slice(&(records.len() as u32).to_le_bytes());
    header.extend_from_slice(&(labels.len() as u32).to_le_bytes());
    header.extend_from_slice(&(num_attrs as u32).to_le_bytes());
    header.extend_from_slice(&off_features.to_le_bytes());
    header.extend_from_slice(&off_labels.to_le_bytes());
    header.extend_from_slice(&off_attrs.to_le_bytes());
    header.extend_from_slice(&off_labelrefs.to_le_bytes());
    header.extend_from_slice(&off_attrrefs.to_le_bytes());
    debug_assert_eq!(header.len(), HEADER_SIZE);

    let mut file = File::create(path)?;
    file.write_all(&header)?;
    file.write_all(&label_dict_buf)?;
    file.write_all(&attr_dict_buf)?;
    file.write_all(&vec![0u8; pad_len as usize])?;
    file.write_all(&labelrefs_buf)?;
    file.write_all(&attrrefs_buf)?;
    file.write_all(&feat_buf)?;
    Ok(())
}

fn write_string_table(strings: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
        buf.extend_from_slice(s.as_bytes());
    }
    buf
}

/// Writes a reference chunk with `refs.len() + extra_empty` blocks, the
/// trailing `extra_empty` of them zero-length. `extra_empty` exists so the
/// label reference chunk can carry the two trailing slots the reference
/// writer always allocates beyond the L real label blocks.
fn write_refs_chunk(tag: &[u8; 4], refs: &[Vec<u32>], extra_empty: usize) -> Vec<u8> {
    let total = refs.len() + extra_empty;
    let count = total as u32;
    let header_len = 4 + 4 + 4 + 4 * total;

    let mut blocks = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(total);
    let mut running = header_len as u32;
    let empty: Vec<u32> = Vec::new();
    for r in refs.iter().chain(std::iter::repeat(&empty).take(extra_empty)) {
        offsets.push(running);
        let mut block = Vec::with_capacity(4 + 4 * r.len());
        block.extend_from_slice(&(r.len() as u32).to_le_bytes());
        for &fid in r {
            block.extend_from_slice(&fid.to_le_bytes());
        }
        running += block.len() as u32;
        blocks.push(block);
    }

    let mut buf = Vec::with_capacity(running as usize);
    buf.extend_from_slice(tag);
    buf.extend_from_slice(&running.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    for off in &offsets {
        buf.extend_from_slice(&off.to_le_bytes());
    }
    for block in &blocks {
        buf.extend_from_slice(block);
    }
    buf
}

fn write_feat_chunk(records: &[Record]) -> Vec<u8> {
    let size = 12 + 20 * records.len();
    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(b"FEAT");
    buf.extend_from_slice(&(size as u32).to_le_bytes());
    buf.extend_from_slice(&(records.len() as u32).to_le_bytes());
    for r in records {
        buf.extend_from_slice(&r.kind.to_le_bytes());
        buf.extend_from_slice(&r.src.to_le_bytes());
        buf.extend_from_slice(&r.dst.to_le_bytes());
        buf.extend_from_slice(&r.weight.to_le_bytes());
    }
    buf
}
