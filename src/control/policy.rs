use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::control::minimax_lqr::{control_gain, feasible, riccati_update, ValueFunction};
use crate::control::model::{DiscreteModel, DisturbedLinearModel};
use crate::control::worst_case::sample_worst_case;
use crate::error::{LqrError, Result};
use crate::utils::matmul::ensure_len;
use crate::utils::sampling::SampleSet;

/// Affine feedback `u = k x + l` for one time step, and the value function
/// of the step after it.
#[derive(Debug, Clone)]
pub struct StageGain {
    pub k: DMatrix<f64>,
    pub l: DVector<f64>,
    pub next_value: ValueFunction,
}

/// Time-ordered gains: `stages[0]` acts first, with `len()` stages to go.
#[derive(Debug, Clone)]
pub struct MinimaxPolicy {
    pub lam: f64,
    pub stages: Vec<StageGain>,
    /// Value function with every stage to go.
    pub initial_value: ValueFunction,
}

impl MinimaxPolicy {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Control at time step `step` (0 is the first step).
    pub fn control(&self, step: usize, x: &DVector<f64>) -> Result<DVector<f64>> {
        let gain = self.stages.get(step).ok_or(LqrError::InvalidHorizon {
            stage_number: step + 1,
            available: self.stages.len(),
        })?;
        ensure_len("state", x, gain.k.ncols())?;
        Ok(&gain.k * x + &gain.l)
    }
}

/// Backward pass of the minimax recursion that keeps the gains.
///
/// Stage `t` (stages to go) uses `sample_sets[t - 1]`. Unlike
/// [`crate::control::objective::evaluate`], an infeasible stage is an error
/// here since no policy exists.
pub fn synthesize(
    model: &impl DisturbedLinearModel,
    lam: f64,
    sample_sets: &[SampleSet],
) -> Result<MinimaxPolicy> {
    let stage_number = sample_sets.len();
    if stage_number == 0 {
        return Err(LqrError::InvalidHorizon {
            stage_number,
            available: 0,
        });
    }

    let mut value = ValueFunction::terminal(model);
    let mut stages = Vec::with_capacity(stage_number);
    for t in 1..=stage_number {
        if !(lam > 0.0 && feasible(model.xi(), &value.p, lam)?) {
            return Err(LqrError::Infeasible { lam, stage: t });
        }
        let samples = &sample_sets[t - 1];
        let (k, l) = control_gain(model, &value, samples.mean(), lam)?;
        let next = riccati_update(model, &value, samples, lam)?;
        stages.push(StageGain {
            k,
            l,
            next_value: value,
        });
        value = next;
    }
    stages.reverse();
    debug!("synthesized minimax policy over {stage_number} stages, lam = {lam}");

    Ok(MinimaxPolicy {
        lam,
        stages,
        initial_value: value,
    })
}

/// Closed-loop trajectory of a policy.
#[derive(Debug, Clone)]
pub struct Trajectory {
    /// `len() + 1` states, starting with the initial state.
    pub states: Vec<DVector<f64>>,
    pub controls: Vec<DVector<f64>>,
    pub disturbances: Vec<DVector<f64>>,
    /// Σ (xᵗQx + uᵗRu) + x_Nᵗ Q_f x_N
    pub cost: f64,
}

/// Simulates `policy` from `initial_state`, the adversary answering each
/// control with a worst-case disturbance drawn by `rng`.
pub fn rollout<R: Rng + ?Sized>(
    model: &DiscreteModel,
    policy: &MinimaxPolicy,
    initial_state: &DVector<f64>,
    sample_sets: &[SampleSet],
    rng: &mut R,
) -> Result<Trajectory> {
    let stage_number = policy.len();
    if sample_sets.len() < stage_number {
        return Err(LqrError::InvalidHorizon {
            stage_number,
            available: sample_sets.len(),
        });
    }
    ensure_len("initial state", initial_state, model.n())?;

    let mut x = initial_state.clone();
    let mut trajectory = Trajectory {
        states: vec![x.clone()],
        controls: Vec::with_capacity(stage_number),
        disturbances: Vec::with_capacity(stage_number),
        cost: 0.0,
    };
    for (step, gain) in policy.stages.iter().enumerate() {
        let stages_to_go = stage_number - step;
        let u = policy.control(step, &x)?;
        let w = sample_worst_case(
            &sample_sets[stages_to_go - 1],
            &x,
            &u,
            model,
            &gain.next_value,
            policy.lam,
            rng,
        )?;
        trajectory.cost += model.stage_cost(&x, &u)?;
        x = model.step(&x, &u, &w)?;

        trajectory.states.push(x.clone());
        trajectory.controls.push(u);
        trajectory.disturbances.push(w);
    }
    trajectory.cost += model.terminal_cost(&x)?;
    info!(
        "rollout over {stage_number} stages: cost {:.6}, final |x| {:.6}",
        trajectory.cost,
        x.norm()
    );
    Ok(trajectory)
}
