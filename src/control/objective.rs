use std::cmp::Ordering;
use std::fmt;

use log::debug;
use nalgebra::DVector;

use crate::control::minimax_lqr::{feasible, max_real_eigenvalue, riccati_update, ValueFunction};
use crate::control::model::DisturbedLinearModel;
use crate::error::{LqrError, Result};
use crate::utils::matmul::ensure_len;
use crate::utils::sampling::SampleSet;

/// Why a risk parameter cannot support a finite robust cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Infeasibility {
    NegativeRisk,
    /// `max Re λ(XiᵗPXi) >= lam` with `stage` stages to go.
    EigenvalueBound { stage: usize, max_eigenvalue: f64 },
}

/// Outcome of [`evaluate`].
///
/// Compares like `f64` with [`Cost::Infeasible`] acting as `+∞`, so a search
/// over `lam` can order outcomes directly.
#[derive(Debug, Clone, Copy)]
pub enum Cost {
    Finite(f64),
    Infeasible(Infeasibility),
}

impl Cost {
    pub fn value(&self) -> f64 {
        match self {
            Cost::Finite(v) => *v,
            Cost::Infeasible(_) => f64::INFINITY,
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, Cost::Finite(_))
    }

    pub fn finite(&self) -> Option<f64> {
        match self {
            Cost::Finite(v) => Some(*v),
            Cost::Infeasible(_) => None,
        }
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value().partial_cmp(&other.value())
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Finite(v) => write!(f, "{v:.6}"),
            Cost::Infeasible(Infeasibility::NegativeRisk) => write!(f, "infeasible (lam < 0)"),
            Cost::Infeasible(Infeasibility::EigenvalueBound {
                stage,
                max_eigenvalue,
            }) => write!(
                f,
                "infeasible (stage {stage}: max eigenvalue {max_eigenvalue:.6})"
            ),
        }
    }
}

/// Robust objective of the risk parameter `lam`.
///
/// Runs the minimax recursion from `(Q_f, 0, 0)` over stages
/// `stage_number..=1`, stage `t` using `sample_sets[t - 1]`, and returns
/// `lam·theta² + (x0ᵗPx0 + 2rᵗx0 + z) / stage_number`.
///
/// A negative `lam`, or a stage where the eigenvalue bound fails, gives
/// [`Cost::Infeasible`]. Shape errors and singular inverses are returned as
/// errors.
pub fn evaluate(
    model: &impl DisturbedLinearModel,
    lam: f64,
    theta: f64,
    stage_number: usize,
    initial_state: &DVector<f64>,
    sample_sets: &[SampleSet],
) -> Result<Cost> {
    if lam.is_nan() {
        return Err(LqrError::InvalidParameter("risk parameter is NaN".to_owned()));
    }
    if lam < 0.0 {
        debug!("lam = {lam} is negative, objective is infeasible");
        return Ok(Cost::Infeasible(Infeasibility::NegativeRisk));
    }
    if stage_number == 0 || sample_sets.len() < stage_number {
        return Err(LqrError::InvalidHorizon {
            stage_number,
            available: sample_sets.len(),
        });
    }
    ensure_len("initial state", initial_state, model.a().nrows())?;

    let mut value = ValueFunction::terminal(model);
    for t in (1..=stage_number).rev() {
        if !feasible(model.xi(), &value.p, lam)? {
            let max_eigenvalue = max_real_eigenvalue(model.xi(), &value.p)?;
            debug!("lam = {lam} infeasible at stage {t}: max eigenvalue {max_eigenvalue}");
            return Ok(Cost::Infeasible(Infeasibility::EigenvalueBound {
                stage: t,
                max_eigenvalue,
            }));
        }
        value = riccati_update(model, &value, &sample_sets[t - 1], lam)?;
    }

    let cost = lam * theta * theta + value.cost(initial_state)? / stage_number as f64;
    debug!("lam = {lam}: objective {cost}");
    Ok(Cost::Finite(cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::lqr;
    use crate::control::model::{DiscreteModel, LinearModel};
    use crate::utils::sampling::generate_multi_sample;
    use nalgebra::DMatrix;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::error::Error;
    use std::result::Result;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    fn unit_model() -> DiscreteModel {
        DiscreteModel::new(
            scalar(1.0),
            scalar(1.0),
            scalar(1.0),
            scalar(1.0),
            scalar(1.0),
            scalar(1.0),
        )
        .unwrap()
    }

    fn point_sets(w: f64, stages: usize) -> Vec<SampleSet> {
        (0..stages)
            .map(|_| SampleSet::new(vec![DVector::from_element(1, w)]).unwrap())
            .collect()
    }

    fn pendulum_like(xi: DMatrix<f64>) -> DiscreteModel {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.05, 0.4, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[0.0, 0.05]);
        let q = DMatrix::from_row_slice(2, 2, &[10.0, 0.0, 0.0, 1.0]);
        DiscreteModel::new(a, b, xi, q.clone(), q, scalar(0.1)).unwrap()
    }

    #[test]
    fn negative_lam_is_infeasible() -> Result<(), Box<dyn Error>> {
        let model = unit_model();
        let x0 = DVector::from_element(1, 1.0);
        let cost = evaluate(&model, -0.5, 1.0, 1, &x0, &point_sets(0.0, 1))?;
        assert!(matches!(cost, Cost::Infeasible(Infeasibility::NegativeRisk)));
        assert_eq!(cost.value(), f64::INFINITY);
        // sample sets are not even looked at
        let cost = evaluate(&model, -1.0, 0.0, 3, &x0, &[])?;
        assert_eq!(cost.value(), f64::INFINITY);
        Ok(())
    }

    #[test]
    fn zero_state_scenario_is_finite() -> Result<(), Box<dyn Error>> {
        let model = unit_model();
        let x0 = DVector::from_element(1, 0.0);
        let cost = evaluate(&model, 10.0, 0.0, 1, &x0, &point_sets(0.0, 1))?;
        // P = 1 + 1/1.9, r = 0, z = 0 and x0 = 0
        approx::assert_abs_diff_eq!(cost.value(), 0.0, epsilon = 1e-9);
        assert!(cost.is_feasible());
        Ok(())
    }

    #[test]
    fn scalar_scenario_matches_hand_substitution() -> Result<(), Box<dyn Error>> {
        let model = unit_model();
        let x0 = DVector::from_element(1, 1.0);
        let lam = 10.0;
        let theta = 0.3;
        let cost = evaluate(&model, lam, theta, 1, &x0, &point_sets(1.0, 1))?;
        // P = 1 + 1/1.9, r = 1/1.9, z = 1/1.9
        let m = 1.0 / 1.9;
        let expected = lam * theta * theta + (1.0 + m) + 2.0 * m + m;
        approx::assert_abs_diff_eq!(cost.value(), expected, epsilon = 1e-9);
        Ok(())
    }

    #[test]
    fn no_disturbance_channel_matches_standard_lqr() -> Result<(), Box<dyn Error>> {
        let model = pendulum_like(DMatrix::zeros(2, 1));
        let mut rng = StdRng::seed_from_u64(1);
        let stage_number = 12;
        let sets = generate_multi_sample(10, stage_number, 1, 0.0, 1.0, &mut rng)?;
        let x0 = DVector::from_vec(vec![0.3, -0.2]);

        let robust = evaluate(&model, 2.0, 0.0, stage_number, &x0, &sets)?;
        let standard = lqr::finite_horizon_cost(
            model.a(),
            model.b(),
            model.q(),
            model.q_f(),
            model.r(),
            stage_number,
            &x0,
        )?;
        approx::assert_abs_diff_eq!(robust.value(), standard, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn small_lam_is_infeasible_large_lam_is_not() -> Result<(), Box<dyn Error>> {
        let model = pendulum_like(DMatrix::from_row_slice(2, 1, &[0.0, 0.2]));
        let mut rng = StdRng::seed_from_u64(5);
        let sets = generate_multi_sample(20, 8, 1, 0.0, 0.5, &mut rng)?;
        let x0 = DVector::from_vec(vec![0.1, 0.0]);

        let tight = evaluate(&model, 1e-3, 0.1, 8, &x0, &sets)?;
        match tight {
            Cost::Infeasible(Infeasibility::EigenvalueBound { stage, .. }) => assert_eq!(stage, 8),
            other => panic!("expected infeasible, got {other}"),
        }
        let loose = evaluate(&model, 1e3, 0.1, 8, &x0, &sets)?;
        assert!(loose.is_feasible());
        assert!(loose < tight);
        Ok(())
    }

    #[test]
    fn infeasible_orders_above_every_finite_cost() {
        let infeasible = Cost::Infeasible(Infeasibility::NegativeRisk);
        let bound = Cost::Infeasible(Infeasibility::EigenvalueBound {
            stage: 2,
            max_eigenvalue: 3.0,
        });
        assert!(Cost::Finite(1e300) < infeasible);
        assert!(Cost::Finite(-1.0) < Cost::Finite(0.0));
        assert_eq!(infeasible, bound);
        assert_eq!(infeasible.finite(), None);
        assert_eq!(Cost::Finite(2.5).finite(), Some(2.5));
    }

    #[test]
    fn short_sample_list_is_rejected() {
        let model = unit_model();
        let x0 = DVector::from_element(1, 1.0);
        let result = evaluate(&model, 10.0, 0.0, 3, &x0, &point_sets(0.0, 2));
        assert!(matches!(
            result,
            Err(LqrError::InvalidHorizon {
                stage_number: 3,
                available: 2
            })
        ));
        assert!(evaluate(&model, 10.0, 0.0, 0, &x0, &point_sets(0.0, 2)).is_err());
    }

    #[test]
    fn evaluation_is_pure() -> Result<(), Box<dyn Error>> {
        let model = pendulum_like(DMatrix::from_row_slice(2, 1, &[0.1, 0.1]));
        let mut rng = StdRng::seed_from_u64(11);
        let sets = generate_multi_sample(5, 4, 1, 0.2, 0.3, &mut rng)?;
        let x0 = DVector::from_vec(vec![1.0, 0.5]);
        let first = evaluate(&model, 50.0, 0.05, 4, &x0, &sets)?;
        let second = evaluate(&model, 50.0, 0.05, 4, &x0, &sets)?;
        assert_eq!(first.finite(), second.finite());
        Ok(())
    }
}
