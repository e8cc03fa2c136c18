use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{LqrError, Result};

/// Disturbance realizations observed for one stage and their empirical mean.
#[derive(Debug, Clone)]
pub struct SampleSet {
    samples: Vec<DVector<f64>>,
    mean: DVector<f64>,
}

impl SampleSet {
    /// Builds a set from its realizations, computing the mean.
    pub fn new(samples: Vec<DVector<f64>>) -> Result<SampleSet> {
        let Some(first) = samples.first() else {
            return Err(LqrError::EmptySampleSet);
        };
        let mut sum = DVector::zeros(first.len());
        for w in &samples {
            if w.len() != sum.len() {
                return Err(LqrError::DimensionMismatch {
                    operation: "sample set",
                    left: (w.len(), 1),
                    right: (sum.len(), 1),
                });
            }
            sum += w;
        }
        let mean = sum / samples.len() as f64;
        Ok(SampleSet { samples, mean })
    }

    /// Builds a set with a mean supplied by the caller.
    pub fn with_mean(samples: Vec<DVector<f64>>, mean: DVector<f64>) -> Result<SampleSet> {
        if samples.is_empty() {
            return Err(LqrError::EmptySampleSet);
        }
        if let Some(w) = samples.iter().find(|w| w.len() != mean.len()) {
            return Err(LqrError::DimensionMismatch {
                operation: "sample set",
                left: (w.len(), 1),
                right: (mean.len(), 1),
            });
        }
        Ok(SampleSet { samples, mean })
    }

    pub fn samples(&self) -> &[DVector<f64>] {
        &self.samples
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Uncentred second moment `1/N Σ w wᵗ`.
    pub fn second_moment(&self) -> DMatrix<f64> {
        let dim = self.dim();
        let sum = self
            .samples
            .iter()
            .fold(DMatrix::zeros(dim, dim), |acc, w| acc + w * w.transpose());
        sum / self.samples.len() as f64
    }
}

/// Draws `sample_number` i.i.d. vectors with entries `N(mean, sigma²)`.
///
/// Returns the set and its uncentred second moment.
pub fn generate_single_sample<R: Rng + ?Sized>(
    sample_number: usize,
    dim: usize,
    mean: f64,
    sigma: f64,
    rng: &mut R,
) -> Result<(SampleSet, DMatrix<f64>)> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(LqrError::InvalidParameter(format!(
            "standard deviation must be positive and finite, got {sigma}"
        )));
    }
    let normal = Normal::new(mean, sigma)
        .map_err(|e| LqrError::InvalidParameter(format!("N({mean}, {sigma}²): {e}")))?;
    let samples = (0..sample_number)
        .map(|_| DVector::from_fn(dim, |_, _| normal.sample(rng)))
        .collect();
    let set = SampleSet::new(samples)?;
    let second_moment = set.second_moment();
    Ok((set, second_moment))
}

/// One independent sample set per stage, `result[t-1]` belongs to stage `t`.
pub fn generate_multi_sample<R: Rng + ?Sized>(
    sample_number: usize,
    stage_number: usize,
    dim: usize,
    mean: f64,
    sigma: f64,
    rng: &mut R,
) -> Result<Vec<SampleSet>> {
    (0..stage_number)
        .map(|_| generate_single_sample(sample_number, dim, mean, sigma, rng).map(|(s, _)| s))
        .collect()
}
