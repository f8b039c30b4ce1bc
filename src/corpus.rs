//! The item-wise annotation format: one item per line, blank line ends an
//! instance, `@weight <float>` overrides the next instance's weight.
//!
//! Grounded in `frontend/reader.cpp`'s tokenizer loop: each line starts a
//! fresh "item" whose first token is either a label or a `@`-declaration;
//! a line consisting solely of a declaration contributes no item.

use std::io::BufRead;

use crate::data::{Attribute, Dataset, Instance, Item};
use crate::dict::Dictionary;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("line {line}: unrecognized declaration {token:?}")]
    UnrecognizedDeclaration { line: usize, token: String },
    #[error("line {line}: invalid weight value {value:?}")]
    InvalidWeight { line: usize, value: String },
    #[error("line {line}: invalid attribute value {value:?}")]
    InvalidAttributeValue { line: usize, value: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parses a corpus from `reader`, interning labels and attributes into
/// `labels`/`attrs`, tagging every produced instance with `group`.
pub fn parse(
    reader: impl BufRead,
    group: i32,
    labels: &mut Dictionary,
    attrs: &mut Dictionary,
) -> Result<Vec<Instance>, CorpusError> {
    let mut instances = Vec::new();
    let mut inst = Instance::new(group);

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        let lineno = lineno + 1;

        if trimmed.trim().is_empty() {
            if !inst.is_empty() {
                instances.push(std::mem::replace(&mut inst, Instance::new(group)));
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let mut idx = 0;
        let mut label: Option<u32> = None;
        let mut item = Item::new();

        while idx < tokens.len() {
            let token = tokens[idx];
            if label.is_none() {
                if let Some(name) = token.strip_prefix('@') {
                    if name == "weight" {
                        idx += 1;
                        let value = tokens.get(idx).copied().unwrap_or("");
                        inst.weight = value.parse::<f64>().map_err(|_| CorpusError::InvalidWeight {
                            line: lineno,
                            value: value.to_owned(),
                        })?;
                        idx += 1;
                        continue;
                    }
                    return Err(CorpusError::UnrecognizedDeclaration {
                        line: lineno,
                        token: token.to_owned(),
                    });
                }
                label = Some(labels.get_or_intern(token));
                idx += 1;
            } else {
                let (name, value) = match token.split_once(':') {
                    Some((n, v)) if !v.is_empty() => {
                        let parsed = v.parse::<f64>().map_err(|_| CorpusError::InvalidAttributeValue {
                            line: lineno,
                            value: v.to_owned(),
                        })?;
                        (n, parsed)
                    }
                    _ => (token, 1.0),
                };
                item.push(Attribute::new(attrs.get_or_intern(name), value));
                idx += 1;
            }
        }

        if let Some(l) = label {
            inst.append(item, l);
        }
    }

    if !inst.is_empty() {
        instances.push(inst);
    }

    Ok(instances)
}

/// Parses a corpus and wraps the result in a `Dataset` sized to the given
/// dictionaries' final extents.
pub fn parse_dataset(
    reader: impl BufRead,
    group: i32,
    labels: &mut Dictionary,
    attrs: &mut Dictionary,
) -> Result<Dataset, CorpusError> {
    let instances = parse(reader, group, labels, attrs)?;
    Ok(Dataset::new(instances, labels.len(), attrs.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_items_with_and_without_values() {
        let text = "pos a1 a2:0.5\nneg a1:2\n";
        let mut labels = Dictionary::new();
        let mut attrs = Dictionary::new();
        let instances = parse(Cursor::new(text), 0, &mut labels, &mut attrs).expect("parse");

        assert_eq!(instances.len(), 1);
        let inst = &instances[0];
        assert_eq!(inst.len(), 2);
        assert_eq!(inst.items[0].contents.len(), 2);
        assert_eq!(inst.items[0].contents[1].value, 0.5);
        assert_eq!(inst.items[1].contents[0].value, 2.0);
    }

    #[test]
    fn blank_line_ends_an_instance() {
        let text = "pos a1\n\nneg a1\n";
        let mut labels = Dictionary::new();
        let mut attrs = Dictionary::new();
        let instances = parse(Cursor::new(text), 0, &mut labels, &mut attrs).expect("parse");
        assert_eq!(instances.len(), 2);
    }

    #[test]
    fn weight_declaration_overrides_instance_weight() {
        let text = "@weight 2.5\npos a1\n";
        let mut labels = Dictionary::new();
        let mut attrs = Dictionary::new();
        let instances = parse(Cursor::new(text), 0, &mut labels, &mut attrs).expect("parse");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].weight, 2.5);
    }

    #[test]
    fn unrecognized_declaration_is_a_hard_error() {
        let text = "@bogus x\npos a1\n";
        let mut labels = Dictionary::new();
        let mut attrs = Dictionary::new();
        let err = parse(Cursor::new(text), 0, &mut labels, &mut attrs).unwrap_err();
        assert!(matches!(err, CorpusError::UnrecognizedDeclaration { .. }));
    }
}
