// Cosine similarity, centroids, and threshold search over embeddings.
//
// Embeddings come from a sentence transformer (384 dims by default), but
// nothing here assumes a particular dimension. Callers only need vectors
// that agree with each other.

use super::error::VectorError;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn check_dims(a: &[f64], b: &[f64]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    Ok(())
}

/// Cosine similarity between two embedding vectors: `dot(a,b) / (|a| * |b|)`.
///
/// Returns 0.0 when either input is empty or has zero norm. That 0.0 is a
/// sentinel for "no meaningful comparison", not a measured similarity.
/// Non-empty vectors of different lengths are a `DimensionMismatch`.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, VectorError> {
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }
    check_dims(a, b)?;

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    // Clamp to [-1, 1] to absorb floating point drift
    Ok((dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Element-wise arithmetic mean of a set of vectors.
///
/// Used to build the "ideal" competitor profile for a keyword: the centroid
/// of the top-ranking pages' embeddings.
pub fn centroid(vectors: &[Vec<f64>]) -> Result<Vec<f64>, VectorError> {
    let first = vectors.first().ok_or(VectorError::EmptyInput)?;
    let dim = first.len();

    let mut sum = vec![0.0_f64; dim];
    for v in vectors {
        if v.len() != dim {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                found: v.len(),
            });
        }
        for (acc, &val) in sum.iter_mut().zip(v.iter()) {
            *acc += val;
        }
    }

    let n = vectors.len() as f64;
    for val in &mut sum {
        *val /= n;
    }
    Ok(sum)
}

/// Indices of candidates whose cosine similarity to `query` is strictly
/// greater than `threshold`, in candidate order.
///
/// Zero-norm candidates are divided by 1.0 instead of their norm, so they
/// come out at similarity 0.0 without an error. A zero-norm query matches
/// nothing. Candidates whose dimension differs from the query are skipped.
pub fn batch_threshold_search(query: &[f64], candidates: &[Vec<f64>], threshold: f64) -> Vec<usize> {
    if query.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let query_norm = norm(query);
    if query_norm == 0.0 {
        return Vec::new();
    }

    candidates
        .iter()
        .enumerate()
        .filter_map(|(i, candidate)| {
            if candidate.len() != query.len() {
                tracing::debug!(
                    index = i,
                    expected = query.len(),
                    found = candidate.len(),
                    "Skipping candidate with mismatched dimension"
                );
                return None;
            }
            let candidate_norm = norm(candidate);
            let safe_norm = if candidate_norm == 0.0 { 1.0 } else { candidate_norm };
            let similarity = dot(query, candidate) / (query_norm * safe_norm);
            (similarity > threshold).then_some(i)
        })
        .collect()
}

/// Euclidean (L2) distance between two vectors.
pub fn l2_distance(a: &[f64], b: &[f64]) -> Result<f64, VectorError> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt())
}

/// Scale a vector to unit length. The zero vector stays the zero vector.
pub fn normalize(v: &[f64]) -> Vec<f64> {
    let magnitude = norm(v);
    if magnitude == 0.0 {
        return vec![0.0; v.len()];
    }
    v.iter().map(|x| x / magnitude).collect()
}

/// Mean cosine similarity of `v` to every member of `cluster`.
/// An empty cluster scores 0.0.
pub fn average_similarity_to_cluster(v: &[f64], cluster: &[Vec<f64>]) -> Result<f64, VectorError> {
    if cluster.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for member in cluster {
        total += cosine_similarity(v, member)?;
    }
    Ok(total / cluster.len() as f64)
}

/// A candidate returned by `k_nearest_neighbors`.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f64,
    pub similarity: f64,
}

/// The `k` candidates closest to `target` by L2 distance, nearest first.
pub fn k_nearest_neighbors(
    target: &[f64],
    candidates: &[(String, Vec<f64>)],
    k: usize,
) -> Result<Vec<Neighbor>, VectorError> {
    let mut neighbors = candidates
        .iter()
        .map(|(id, vector)| {
            Ok(Neighbor {
                id: id.clone(),
                distance: l2_distance(target, vector)?,
                similarity: cosine_similarity(target, vector)?,
            })
        })
        .collect::<Result<Vec<_>, VectorError>>()?;

    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    neighbors.truncate(k);
    Ok(neighbors)
}
