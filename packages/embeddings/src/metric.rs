/// Distance metrics for comparing embedding vectors
use serde::{Deserialize, Serialize};

/// How two vectors are compared. Smaller is always closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance
    #[default]
    Euclidean,
    /// `1 - cosine_similarity`, in `[0, 2]`
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::Cosine => {
                let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
                for (x, y) in a.iter().zip(b) {
                    dot = x.mul_add(*y, dot);
                    norm_a = x.mul_add(*x, norm_a);
                    norm_b = y.mul_add(*y, norm_b);
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean() {
        let d = DistanceMetric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_identical() {
        let orthogonal = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((orthogonal - 1.0).abs() < 1e-6);

        let identical = DistanceMetric::Cosine.distance(&[0.3, 0.4], &[0.3, 0.4]);
        assert!(identical.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let d = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert_eq!(d, 1.0);
    }
}
