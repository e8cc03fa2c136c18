use log::trace;
use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::control::minimax_lqr::ValueFunction;
use crate::control::model::DisturbedLinearModel;
use crate::error::{LqrError, Result};
use crate::utils::matmul::{column, ensure_len, matmul, matmul3, to_vector};
use crate::utils::sampling::SampleSet;

/// Worst-case perturbation of every sample in `samples`.
///
/// Each `wᵢ` is moved to the solution of
/// `(lam I − XiᵗPXi) w' = XiᵗP(Ax + Bu) + Xiᵗr + lam wᵢ`,
/// the adversary's best response under the value function `(P, r)` of the
/// next stage. The left-hand side is shared, so it is factorized once.
pub fn worst_case_candidates(
    samples: &SampleSet,
    x: &DVector<f64>,
    u: &DVector<f64>,
    model: &impl DisturbedLinearModel,
    value: &ValueFunction,
    lam: f64,
) -> Result<Vec<DVector<f64>>> {
    if !lam.is_finite() {
        return Err(LqrError::InvalidParameter(format!(
            "risk parameter must be finite, got {lam}"
        )));
    }
    let (a, b, xi) = (model.a(), model.b(), model.xi());
    let k = xi.ncols();
    ensure_len("state", x, a.nrows())?;
    ensure_len("control", u, b.ncols())?;
    ensure_len("sample", samples.mean(), k)?;
    ensure_len("r", &value.r, a.nrows())?;

    let p = &value.p;
    let xit = xi.transpose();
    let lhs = DMatrix::identity(k, k) * lam - matmul3(&xit, p, xi)?;
    let lu = lhs.lu();
    if !lu.is_invertible() {
        return Err(LqrError::Singular {
            term: "lam I - XiᵗPXi",
        });
    }

    let nominal = column(&(a * x + b * u));
    let common = to_vector(&(matmul3(&xit, p, &nominal)? + matmul(&xit, &column(&value.r))?))?;

    samples
        .samples()
        .iter()
        .map(|w| {
            lu.solve(&(&common + w * lam))
                .filter(|sol| sol.iter().all(|v| v.is_finite()))
                .ok_or(LqrError::Singular {
                    term: "lam I - XiᵗPXi",
                })
        })
        .collect()
}

/// Draws one worst-case disturbance uniformly among the perturbed samples.
///
/// With a single sample the answer is unique and `rng` is left untouched.
#[allow(clippy::too_many_arguments)]
pub fn sample_worst_case<R: Rng + ?Sized>(
    samples: &SampleSet,
    x: &DVector<f64>,
    u: &DVector<f64>,
    model: &impl DisturbedLinearModel,
    value: &ValueFunction,
    lam: f64,
    rng: &mut R,
) -> Result<DVector<f64>> {
    let mut candidates = worst_case_candidates(samples, x, u, model, value, lam)?;
    let index = match candidates.len() {
        0 => return Err(LqrError::EmptySampleSet),
        1 => 0,
        len => rng.gen_range(0..len),
    };
    trace!("worst case: picked candidate {index} of {}", candidates.len());
    Ok(candidates.swap_remove(index))
}
