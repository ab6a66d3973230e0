// Utility functions for recommendation-core

use ndarray::ArrayView1;

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Normalize vector to unit length in place (no-op on the zero vector)
pub fn l2_normalize(vec: &mut ndarray::Array1<f32>) {
    let norm = vec.dot(vec).sqrt();
    if norm > 0.0 {
        *vec /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn test_cosine_similarity() {
        let a = Array1::from_vec(vec![1.0, 0.0, 0.0]);
        let b = Array1::from_vec(vec![1.0, 0.0, 0.0]);
        assert!((cosine_similarity(a.view(), b.view()) - 1.0).abs() < 1e-6);

        let c = Array1::from_vec(vec![1.0, 0.0, 0.0]);
        let d = Array1::from_vec(vec![0.0, 1.0, 0.0]);
        assert!(cosine_similarity(c.view(), d.view()).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetry() {
        let a = Array1::from_vec(vec![0.3, -1.2, 0.7]);
        let b = Array1::from_vec(vec![2.0, 0.1, -0.5]);
        let ab = cosine_similarity(a.view(), b.view());
        let ba = cosine_similarity(b.view(), a.view());
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_norm() {
        let a = Array1::from_vec(vec![0.0, 0.0]);
        let b = Array1::from_vec(vec![1.0, 2.0]);
        assert_eq!(cosine_similarity(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_l2_normalize() {
        let mut vec = Array1::from_vec(vec![3.0, 4.0]);
        l2_normalize(&mut vec);
        assert!((vec[0] - 0.6).abs() < 1e-6);
        assert!((vec[1] - 0.8).abs() < 1e-6);
    }
}
