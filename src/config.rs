use std::path::{Path, PathBuf};

use log::info;
use nalgebra::DVector;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::control::model::DiscreteModel;
use crate::data::load_sample_sets;
use crate::error::{LqrError, Result};
use crate::utils::matmul::matrix_from_rows;
use crate::utils::sampling::{generate_multi_sample, SampleSet};

/// Matrices are row-major nested lists. When `dt` is set, `a` and `b` are
/// continuous-time and discretized with a zero-order hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    pub xi: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
    pub q_f: Vec<Vec<f64>>,
    pub r: Vec<Vec<f64>>,
    pub dt: Option<f64>,
    pub stage_number: usize,
    pub sample_number: usize,
    pub noise_mean: f64,
    pub noise_sigma: f64,
    pub theta: f64,
    pub lams: Vec<f64>,
    pub initial_state: Vec<f64>,
    pub seed: u64,
    /// Read samples from this CSV file instead of drawing them.
    pub samples_csv: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    /// Cart-pole linearized around the upright position, pushed on both
    /// velocities.
    fn default() -> Self {
        let l_bar = 2.0; // length of bar
        let mass_cart = 1.0; // [kg]
        let mass_ball = 0.3; // [kg]
        let g = 9.8; // [m/s^2]

        #[rustfmt::skip]
        let a = vec![
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, mass_ball * g / mass_cart, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![0.0, 0.0, g * (mass_cart + mass_ball) / (l_bar * mass_cart), 0.0],
        ];
        let b = vec![
            vec![0.0],
            vec![1.0 / mass_cart],
            vec![0.0],
            vec![1.0 / (l_bar * mass_cart)],
        ];
        #[rustfmt::skip]
        let xi = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 0.1],
        ];
        let q = diagonal(&[10.0, 1.0, 10.0, 1.0]);

        ExperimentConfig {
            a,
            b,
            xi,
            q_f: q.clone(),
            q,
            r: vec![vec![0.01]],
            dt: Some(0.1),
            stage_number: 20,
            sample_number: 10,
            noise_mean: 0.0,
            noise_sigma: 0.1,
            theta: 0.1,
            lams: vec![1.0, 10.0, 100.0, 1000.0, 10000.0],
            initial_state: vec![0.0, 0.0, -0.2, 0.0],
            seed: 0,
            samples_csv: None,
        }
    }
}

fn diagonal(values: &[f64]) -> Vec<Vec<f64>> {
    (0..values.len())
        .map(|i| {
            (0..values.len())
                .map(|j| if i == j { values[i] } else { 0.0 })
                .collect()
        })
        .collect()
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: ExperimentConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        info!("loaded experiment configuration from {}", path.as_ref().display());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stage_number == 0 {
            return Err(LqrError::InvalidParameter(
                "stage_number must be at least 1".to_owned(),
            ));
        }
        if self.samples_csv.is_none() && self.sample_number == 0 {
            return Err(LqrError::InvalidParameter(
                "sample_number must be at least 1".to_owned(),
            ));
        }
        if self.initial_state.len() != self.a.len() {
            return Err(LqrError::DimensionMismatch {
                operation: "initial_state",
                left: (self.initial_state.len(), 1),
                right: (self.a.len(), 1),
            });
        }
        Ok(())
    }

    pub fn model(&self) -> Result<DiscreteModel> {
        let a = matrix_from_rows(&self.a)?;
        let b = matrix_from_rows(&self.b)?;
        let xi = matrix_from_rows(&self.xi)?;
        let q = matrix_from_rows(&self.q)?;
        let q_f = matrix_from_rows(&self.q_f)?;
        let r = matrix_from_rows(&self.r)?;
        match self.dt {
            Some(dt) => DiscreteModel::from_continuous(&a, &b, xi, q, q_f, r, dt),
            None => DiscreteModel::new(a, b, xi, q, q_f, r),
        }
    }

    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_vec(self.initial_state.clone())
    }

    /// Per-stage samples, from `samples_csv` or drawn from
    /// `N(noise_mean, noise_sigma²)`.
    pub fn sample_sets<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<SampleSet>> {
        match &self.samples_csv {
            Some(path) => load_sample_sets(path),
            None => generate_multi_sample(
                self.sample_number,
                self.stage_number,
                self.xi.first().map_or(0, Vec::len),
                self.noise_mean,
                self.noise_sigma,
                rng,
            ),
        }
    }
}
