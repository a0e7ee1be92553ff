//! JSON keypoint files.
//!
//! A file is one object mapping the decimal keypoint index to
//! `[[x, y], size, angle, response, octave, class_id, [descriptor...]]`.
//! Indices must cover `0..n` exactly once.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::keypoint_set::KeypointSet;
use crate::types::{Descriptor, Keypoint};

type RawEntry = ([f32; 2], f32, f32, f32, i32, i32, Vec<f32>);

impl KeypointSet {
    /// Parse a keypoint file, taking the descriptor dimension from its entries.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let (keypoints, descriptors) = parse_entries(json)?;
        KeypointSet::new(keypoints, descriptors)
    }

    /// Parse a keypoint file whose descriptors must all have length `dim`.
    pub fn from_json_str_with_dimension(json: &str, dim: usize) -> CoreResult<Self> {
        let (keypoints, descriptors) = parse_entries(json)?;
        KeypointSet::with_dimension(keypoints, descriptors, dim)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn load_json_with_dimension<P: AsRef<Path>>(path: P, dim: usize) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str_with_dimension(&content, dim)
    }

    /// Serialize in the format [`KeypointSet::from_json_str`] reads.
    pub fn to_json_string(&self) -> CoreResult<String> {
        let mut map = serde_json::Map::with_capacity(self.len());
        for (index, (kp, desc)) in self.iter().enumerate() {
            map.insert(
                index.to_string(),
                serde_json::json!([[kp.x, kp.y], kp.size, kp.angle, kp.response, kp.octave, kp.class_id, desc]),
            );
        }
        Ok(serde_json::to_string(&Value::Object(map))?)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> CoreResult<()> {
        let json = self.to_json_string()?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

fn parse_entries(json: &str) -> CoreResult<(Vec<Keypoint>, Vec<Descriptor>)> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;

    let mut ordered: BTreeMap<usize, (String, Value)> = BTreeMap::new();
    for (key, value) in raw {
        let index: usize = key.trim().parse().map_err(|_| CoreError::Malformed {
            entry: key.clone(),
            reason: "key is not a keypoint index".to_string(),
        })?;
        if ordered.contains_key(&index) {
            return Err(CoreError::Malformed {
                entry: key,
                reason: format!("duplicate keypoint index {}", index),
            });
        }
        ordered.insert(index, (key, value));
    }

    let mut keypoints = Vec::with_capacity(ordered.len());
    let mut descriptors = Vec::with_capacity(ordered.len());
    for (expected, (index, (key, value))) in ordered.into_iter().enumerate() {
        if index != expected {
            return Err(CoreError::Malformed {
                entry: key,
                reason: format!("missing keypoint index {}", expected),
            });
        }
        let (pt, size, angle, response, octave, class_id, desc): RawEntry =
            serde_json::from_value(value).map_err(|e| CoreError::Malformed {
                entry: key.clone(),
                reason: e.to_string(),
            })?;
        keypoints.push(Keypoint {
            x: pt[0],
            y: pt[1],
            size,
            angle,
            response,
            octave,
            class_id,
        });
        descriptors.push(desc);
    }

    log::debug!("parsed {} keypoint entries", keypoints.len());
    Ok((keypoints, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ENTRIES: &str = r#"{
        "1": [[30.5, 40.25], 12.0, 90.0, 800.0, 1, -1, [0.0, 1.0, 0.5]],
        "0": [[10.0, 20.0], 15.0, 45.5, 1200.0, 0, -1, [1.0, 0.0, 0.25]]
    }"#;

    #[test]
    fn test_parses_in_index_order() {
        let set = KeypointSet::from_json_str(TWO_ENTRIES).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.dimension(), 3);
        let kp0 = set.keypoint(0).unwrap();
        assert_eq!((kp0.x, kp0.y, kp0.size, kp0.angle), (10.0, 20.0, 15.0, 45.5));
        assert_eq!(kp0.class_id, -1);
        assert_eq!(set.keypoint(1).unwrap().octave, 1);
        assert_eq!(set.descriptor(1).unwrap(), &[0.0, 1.0, 0.5]);
    }

    #[test]
    fn test_declared_dimension_checked() {
        let err = KeypointSet::from_json_str_with_dimension(TWO_ENTRIES, 64).unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch { declared: 64, actual: 3 }));
    }

    #[test]
    fn test_wrong_descriptor_length_is_format_error() {
        let json = r#"{"0": [[0, 0], 1, 0, 0, 0, -1, [1, 2]], "1": [[1, 1], 1, 0, 0, 0, -1, [1]]}"#;
        let err = KeypointSet::from_json_str(json).unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(err, CoreError::DescriptorLength { index: 1, .. }));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let json = r#"{"0": [[0, 0], 1, 0, 0, 0, [1, 2]]}"#;
        let err = KeypointSet::from_json_str(json).unwrap_err();
        assert!(matches!(err, CoreError::Malformed { ref entry, .. } if entry == "0"));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_index_gap_rejected() {
        let json = r#"{"0": [[0, 0], 1, 0, 0, 0, -1, [1]], "2": [[1, 1], 1, 0, 0, 0, -1, [1]]}"#;
        let err = KeypointSet::from_json_str(json).unwrap_err();
        assert!(matches!(err, CoreError::Malformed { ref entry, .. } if entry == "2"));
    }

    #[test]
    fn test_not_an_object() {
        let err = KeypointSet::from_json_str("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_save_then_load_file() {
        let set = KeypointSet::from_json_str(TWO_ENTRIES).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        set.save_json(&path).unwrap();
        let loaded = KeypointSet::load_json_with_dimension(&path, 3).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = KeypointSet::load_json("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(!err.is_format_error());
    }
}
