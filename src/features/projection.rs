//! Principal-component projection of feature vectors.
//!
//! Used by the exploratory tooling to reduce TF-IDF vectors to a handful of
//! coordinates that can be plotted elsewhere. Components are found by power
//! iteration on the implicit covariance matrix, with each new component kept
//! orthogonal to the previous ones.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{MailsiftError, Result};
use crate::features::vector::FeatureVector;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f64 = 1e-10;

/// A fitted projection onto the leading principal components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalProjection {
    mean: Vec<f64>,
    components: Vec<Vec<f64>>,
    explained_variance: Vec<f64>,
}

impl PrincipalProjection {
    /// Fit `n_components` components on `vectors`.
    pub fn fit(vectors: &[FeatureVector], n_components: usize, seed: u64) -> Result<Self> {
        let dimension = match vectors.first() {
            Some(first) => first.dimension(),
            None => {
                return Err(MailsiftError::training_data(
                    "cannot fit a projection on zero vectors",
                ));
            }
        };
        if vectors.len() < 2 {
            return Err(MailsiftError::training_data(
                "a projection needs at least two vectors",
            ));
        }
        if n_components == 0 || n_components > dimension {
            return Err(MailsiftError::invalid_argument(format!(
                "cannot extract {n_components} components from {dimension} dimensions"
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.dimension() != dimension) {
            return Err(MailsiftError::DimensionMismatch {
                expected: dimension,
                actual: bad.dimension(),
            });
        }

        let n = vectors.len() as f64;
        let mut mean = vec![0.0; dimension];
        for vector in vectors {
            for (index, value) in vector.iter() {
                mean[index] += value;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut components: Vec<Vec<f64>> = Vec::with_capacity(n_components);
        let mut explained_variance = Vec::with_capacity(n_components);

        for _ in 0..n_components {
            let mut v: Vec<f64> = (0..dimension).map(|_| rng.random_range(-1.0..1.0)).collect();
            orthogonalize(&mut v, &components);
            normalize(&mut v);

            let mut eigenvalue = 0.0;
            for _ in 0..MAX_ITERATIONS {
                let mut next = covariance_product(vectors, &mean, &v);
                orthogonalize(&mut next, &components);
                eigenvalue = dot(&next, &v);
                if normalize(&mut next) == 0.0 {
                    // remaining variance is zero
                    next = v.clone();
                    eigenvalue = 0.0;
                }
                let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
                v = next;
                if delta < TOLERANCE {
                    break;
                }
            }

            flip_sign(&mut v);
            components.push(v);
            explained_variance.push(eigenvalue.max(0.0));
        }

        Ok(PrincipalProjection {
            mean,
            components,
            explained_variance,
        })
    }

    /// Coordinates of `vector` along each component.
    pub fn transform(&self, vector: &FeatureVector) -> Result<Vec<f64>> {
        if vector.dimension() != self.mean.len() {
            return Err(MailsiftError::DimensionMismatch {
                expected: self.mean.len(),
                actual: vector.dimension(),
            });
        }

        Ok(self
            .components
            .iter()
            .map(|component| vector.dot(component) - dot(&self.mean, component))
            .collect())
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Variance captured by each component, in extraction order.
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }
}

/// Covariance times `v` without materializing the covariance matrix.
fn covariance_product(vectors: &[FeatureVector], mean: &[f64], v: &[f64]) -> Vec<f64> {
    let mean_dot = dot(mean, v);
    let mut result = vec![0.0; v.len()];
    let mut weight_sum = 0.0;

    for vector in vectors {
        let weight = vector.dot(v) - mean_dot;
        for (index, value) in vector.iter() {
            result[index] += weight * value;
        }
        weight_sum += weight;
    }

    let scale = 1.0 / (vectors.len() as f64 - 1.0);
    for (r, m) in result.iter_mut().zip(mean) {
        *r = (*r - weight_sum * m) * scale;
    }
    result
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let projection = dot(v, b);
        for (x, y) in v.iter_mut().zip(b) {
            *x -= projection * y;
        }
    }
}

/// Make the largest-magnitude coordinate positive so results are stable.
fn flip_sign(v: &mut [f64]) {
    let largest = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if largest < 0.0 {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}
