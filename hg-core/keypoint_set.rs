use crate::error::{CoreError, CoreResult};
use crate::types::{Descriptor, Keypoint};

/// Immutable keypoints of one image with their parallel descriptors.
///
/// Descriptors are stored row-major in one flat buffer of `len() * dimension()`
/// values. There is no mutation API, so a set can be shared across threads and
/// read concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    keypoints: Vec<Keypoint>,
    descriptors: Vec<f32>,
    dim: usize,
}

impl KeypointSet {
    /// Build from parallel keypoint and descriptor sequences.
    ///
    /// The dimension is taken from the first descriptor; an empty set has
    /// dimension 0.
    pub fn new(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>) -> CoreResult<Self> {
        let dim = descriptors.first().map_or(0, |d| d.len());
        Self::build(keypoints, descriptors, dim)
    }

    /// Like [`KeypointSet::new`], but every descriptor must have the declared length.
    pub fn with_dimension(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>, dim: usize) -> CoreResult<Self> {
        if dim == 0 {
            return Err(CoreError::ZeroDimension);
        }
        if let Some(first) = descriptors.first() {
            if first.len() != dim {
                return Err(CoreError::DimensionMismatch {
                    declared: dim,
                    actual: first.len(),
                });
            }
        }
        Self::build(keypoints, descriptors, dim)
    }

    /// Build from a flat descriptor buffer holding `dim` values per keypoint.
    ///
    /// A buffer whose length is not an exact multiple of `dim` is rejected
    /// instead of being truncated.
    pub fn from_flat(keypoints: Vec<Keypoint>, values: Vec<f32>, dim: usize) -> CoreResult<Self> {
        if dim == 0 {
            return Err(CoreError::ZeroDimension);
        }
        if values.len() % dim != 0 {
            return Err(CoreError::DimensionRemainder {
                values: values.len(),
                dim,
            });
        }
        let count = values.len() / dim;
        if count != keypoints.len() {
            return Err(CoreError::CountMismatch {
                keypoints: keypoints.len(),
                descriptors: count,
            });
        }
        check_finite(&values, dim)?;
        Ok(Self {
            keypoints,
            descriptors: values,
            dim,
        })
    }

    /// Set with no entries.
    pub fn empty() -> Self {
        Self {
            keypoints: Vec::new(),
            descriptors: Vec::new(),
            dim: 0,
        }
    }

    fn build(keypoints: Vec<Keypoint>, descriptors: Vec<Descriptor>, dim: usize) -> CoreResult<Self> {
        if keypoints.len() != descriptors.len() {
            return Err(CoreError::CountMismatch {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
        if !descriptors.is_empty() && dim == 0 {
            return Err(CoreError::ZeroDimension);
        }

        let mut flat = Vec::with_capacity(descriptors.len() * dim);
        for (index, d) in descriptors.iter().enumerate() {
            if d.len() != dim {
                return Err(CoreError::DescriptorLength {
                    index,
                    expected: dim,
                    actual: d.len(),
                });
            }
            flat.extend_from_slice(d);
        }
        check_finite(&flat, dim)?;

        Ok(Self {
            keypoints,
            descriptors: flat,
            dim,
        })
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Descriptor dimensionality shared by every entry (0 for an empty set).
    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn keypoint(&self, index: usize) -> CoreResult<&Keypoint> {
        self.keypoints.get(index).ok_or(CoreError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    pub fn descriptor(&self, index: usize) -> CoreResult<&[f32]> {
        if index >= self.len() {
            return Err(CoreError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(&self.descriptors[index * self.dim..(index + 1) * self.dim])
    }

    pub fn get(&self, index: usize) -> CoreResult<(&Keypoint, &[f32])> {
        Ok((self.keypoint(index)?, self.descriptor(index)?))
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Descriptor rows in index order.
    pub fn descriptors(&self) -> impl ExactSizeIterator<Item = &[f32]> + '_ {
        self.descriptors.chunks(self.dim.max(1))
    }

    /// The flat row-major descriptor buffer.
    pub fn descriptor_values(&self) -> &[f32] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Keypoint, &[f32])> + '_ {
        self.keypoints.iter().zip(self.descriptors())
    }
}

fn check_finite(values: &[f32], dim: usize) -> CoreResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(pos) => Err(CoreError::Malformed {
            entry: (pos / dim).to_string(),
            reason: "descriptor contains a non-finite value".to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kps(n: usize) -> Vec<Keypoint> {
        (0..n).map(|i| Keypoint::at(i as f32, 2.0 * i as f32)).collect()
    }

    #[test]
    fn test_count_mismatch_is_format_error() {
        let err = KeypointSet::new(kps(3), vec![vec![0.0; 4]; 2]).unwrap_err();
        assert!(matches!(err, CoreError::CountMismatch { keypoints: 3, descriptors: 2 }));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_inconsistent_descriptor_length() {
        let descs = vec![vec![0.0; 4], vec![0.0; 4], vec![0.0; 3]];
        let err = KeypointSet::new(kps(3), descs).unwrap_err();
        assert!(matches!(err, CoreError::DescriptorLength { index: 2, expected: 4, actual: 3 }));
    }

    #[test]
    fn test_declared_dimension_mismatch() {
        let err = KeypointSet::with_dimension(kps(1), vec![vec![0.0; 64]], 128).unwrap_err();
        assert!(matches!(err, CoreError::DimensionMismatch { declared: 128, actual: 64 }));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_flat_remainder_rejected() {
        let err = KeypointSet::from_flat(kps(2), vec![0.0; 129], 64).unwrap_err();
        assert!(matches!(err, CoreError::DimensionRemainder { values: 129, dim: 64 }));
        assert!(matches!(
            KeypointSet::from_flat(kps(2), vec![0.0; 64], 0),
            Err(CoreError::ZeroDimension)
        ));
    }

    #[test]
    fn test_flat_count_mismatch() {
        let err = KeypointSet::from_flat(kps(3), vec![0.0; 128], 64).unwrap_err();
        assert!(matches!(err, CoreError::CountMismatch { keypoints: 3, descriptors: 2 }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = KeypointSet::new(kps(2), vec![vec![0.0, 1.0], vec![f32::NAN, 1.0]]).unwrap_err();
        assert!(matches!(err, CoreError::Malformed { ref entry, .. } if entry == "1"));
    }

    #[test]
    fn test_lookup_and_bounds() {
        let set = KeypointSet::new(kps(2), vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.dimension(), 2);
        assert_eq!(set.descriptor(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(set.keypoint(1).unwrap().y, 2.0);

        let err = set.descriptor(2).unwrap_err();
        assert!(err.is_index_error());
        assert!(!err.is_format_error());
        assert!(matches!(set.keypoint(7), Err(CoreError::IndexOutOfRange { index: 7, len: 2 })));
    }

    #[test]
    fn test_empty_set() {
        let set = KeypointSet::new(Vec::new(), Vec::new()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.dimension(), 0);
        assert_eq!(set.descriptors().count(), 0);
        assert_eq!(set, KeypointSet::empty());
    }

    proptest! {
        #[test]
        fn prop_flat_roundtrip_preserves_rows(n in 0usize..20, dim in 1usize..16) {
            let values: Vec<f32> = (0..n * dim).map(|v| v as f32).collect();
            let set = KeypointSet::from_flat(kps(n), values, dim).unwrap();
            prop_assert_eq!(set.len(), n);
            prop_assert_eq!(set.descriptors().count(), set.keypoints().len());
            for (i, row) in set.descriptors().enumerate() {
                prop_assert_eq!(row.len(), dim);
                prop_assert_eq!(row[0], (i * dim) as f32);
            }
        }

        #[test]
        fn prop_mismatched_counts_always_fail(n in 0usize..10, m in 0usize..10) {
            prop_assume!(n != m);
            let result = KeypointSet::new(kps(n), vec![vec![0.5; 8]; m]);
            let is_count_mismatch = matches!(result, Err(CoreError::CountMismatch { .. }));
            prop_assert!(is_count_mismatch);
        }
    }
}
