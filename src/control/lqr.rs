use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::control::model::LinearModel;
use crate::error::{LqrError, Result};
use crate::utils::matmul::{checked_inverse, ensure_len, ensure_shape, matmul3, matmul4, matmul7};

fn check_shapes(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    p: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<()> {
    let n = a.nrows();
    let m = b.ncols();
    ensure_shape("A", a, (n, n))?;
    ensure_shape("B", b, (n, m))?;
    ensure_shape("P", p, (n, n))?;
    ensure_shape("R", r, (m, m))
}

/// One backward step of the discrete Riccati recursion
///
/// P' = Q + AᵗPA − AᵗPB(R + BᵗPB)⁻¹BᵗPA
pub fn riccati_update(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    p: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    check_shapes(a, b, p, r)?;
    ensure_shape("Q", q, p.shape())?;
    let at = a.transpose();
    let bt = b.transpose();
    let s_inv = checked_inverse(r + matmul3(&bt, p, b)?, "R + BᵗPB")?;
    Ok(q + matmul3(&at, p, a)? - matmul7(&at, p, b, &s_inv, &bt, p, a)?)
}

/// K = −(R + BᵗPB)⁻¹BᵗPA, so that u = K x
pub fn control_gain(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    p: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    check_shapes(a, b, p, r)?;
    let bt = b.transpose();
    let s_inv = checked_inverse(r + matmul3(&bt, p, b)?, "R + BᵗPB")?;
    Ok(-matmul4(&s_inv, &bt, p, a)?)
}

/// Cost-to-go matrices of a finite horizon problem, starting from `q_f`.
///
/// `result[t]` is the matrix with `t` stages to go, so `result[0] == q_f`.
pub fn finite_horizon(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    q_f: &DMatrix<f64>,
    r: &DMatrix<f64>,
    stage_number: usize,
) -> Result<Vec<DMatrix<f64>>> {
    let mut ps = Vec::with_capacity(stage_number + 1);
    ps.push(q_f.clone());
    for t in 1..=stage_number {
        let p = riccati_update(a, b, &ps[t - 1], q, r)?;
        trace!("standard riccati, {t} stages to go: trace(P) = {}", p.trace());
        ps.push(p);
    }
    Ok(ps)
}

/// `x0ᵗ P x0 / stage_number` with `P` the cost-to-go after `stage_number`
/// stages, the normalization used by the minimax objective.
pub fn finite_horizon_cost(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    q_f: &DMatrix<f64>,
    r: &DMatrix<f64>,
    stage_number: usize,
    initial_state: &DVector<f64>,
) -> Result<f64> {
    if stage_number == 0 {
        return Err(LqrError::InvalidHorizon {
            stage_number,
            available: 0,
        });
    }
    ensure_len("initial state", initial_state, a.nrows())?;
    let ps = finite_horizon(a, b, q, q_f, r, stage_number)?;
    let p = &ps[stage_number];
    Ok((initial_state.transpose() * p * initial_state)[(0, 0)] / stage_number as f64)
}

/// Discrete time Algebraic Riccati Equation (DARE), solved by iterating the
/// recursion from `Q` until successive iterates differ by less than `epsilon`.
pub fn dare(model: &impl LinearModel, max_iter: usize, epsilon: f64) -> Result<DMatrix<f64>> {
    let mut p = model.q().clone();
    for i in 0..max_iter {
        let pn = riccati_update(model.a(), model.b(), &p, model.q(), model.r())?;
        if (&pn - &p).abs().max() < epsilon {
            debug!("DARE converged after {} iterations", i + 1);
            return Ok(pn);
        }
        p = pn;
    }
    debug!("DARE stopped after {max_iter} iterations without converging");
    Ok(p)
}

/// LQR control for state `x` from the stationary gain.
pub fn lqr(
    x: &DVector<f64>,
    model: &impl LinearModel,
    max_iter: usize,
    epsilon: f64,
) -> Result<DVector<f64>> {
    ensure_len("state", x, model.a().nrows())?;
    let p = dare(model, max_iter, epsilon)?;
    let k = control_gain(model.a(), model.b(), &p, model.r())?;
    Ok(k * x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::model::DiscreteModel;
    use std::error::Error;
    use std::result::Result;

    fn double_integrator() -> (DMatrix<f64>, DMatrix<f64>) {
        let dt = 0.1;
        let a = DMatrix::from_row_slice(2, 2, &[1.0, dt, 0.0, 1.0]);
        let b = DMatrix::from_row_slice(2, 1, &[dt * dt / 2.0, dt]);
        (a, b)
    }

    #[test]
    fn update_keeps_symmetry() -> Result<(), Box<dyn Error>> {
        let (a, b) = double_integrator();
        let q = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]);
        let r = DMatrix::from_element(1, 1, 0.5);
        let mut p = DMatrix::from_row_slice(2, 2, &[4.0, -1.0, -1.0, 3.0]);
        for _ in 0..20 {
            p = riccati_update(&a, &b, &p, &q, &r)?;
            approx::assert_abs_diff_eq!(p.clone(), p.transpose(), epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn scalar_update_matches_hand_computation() -> Result<(), Box<dyn Error>> {
        let one = DMatrix::from_element(1, 1, 1.0);
        // 1 + 1 - 1·1·(1 + 1)⁻¹·1·1 = 1.5
        let p = riccati_update(&one, &one, &one, &one, &one)?;
        approx::assert_abs_diff_eq!(p[(0, 0)], 1.5, epsilon = 1e-12);
        let k = control_gain(&one, &one, &one, &one)?;
        approx::assert_abs_diff_eq!(k[(0, 0)], -0.5, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn singular_cost_is_reported() {
        let a = DMatrix::<f64>::identity(2, 2);
        let b = DMatrix::<f64>::zeros(2, 1);
        let p = DMatrix::<f64>::identity(2, 2);
        let r = DMatrix::<f64>::zeros(1, 1);
        assert!(matches!(
            riccati_update(&a, &b, &p, &p, &r),
            Err(LqrError::Singular { .. })
        ));
        assert!(matches!(
            control_gain(&a, &b, &p, &r),
            Err(LqrError::Singular { .. })
        ));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let (a, b) = double_integrator();
        let p = DMatrix::<f64>::identity(3, 3);
        let r = DMatrix::from_element(1, 1, 1.0);
        assert!(matches!(
            riccati_update(&a, &b, &p, &p, &r),
            Err(LqrError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn finite_horizon_starts_from_terminal_cost() -> Result<(), Box<dyn Error>> {
        let (a, b) = double_integrator();
        let q = DMatrix::<f64>::identity(2, 2);
        let q_f = 10.0 * DMatrix::<f64>::identity(2, 2);
        let r = DMatrix::from_element(1, 1, 1.0);
        let ps = finite_horizon(&a, &b, &q, &q_f, &r, 3)?;
        assert_eq!(ps.len(), 4);
        approx::assert_abs_diff_eq!(ps[0].clone(), q_f);
        approx::assert_abs_diff_eq!(
            ps[1].clone(),
            riccati_update(&a, &b, &q_f, &q, &r)?,
            epsilon = 1e-12
        );
        Ok(())
    }

    #[test]
    fn lqr_stabilizes_double_integrator() -> Result<(), Box<dyn Error>> {
        let (a, b) = double_integrator();
        let q = DMatrix::<f64>::identity(2, 2);
        let r = DMatrix::from_element(1, 1, 1.0);
        let model = DiscreteModel::new(
            a.clone(),
            b.clone(),
            DMatrix::zeros(2, 1),
            q.clone(),
            q,
            r,
        )?;
        let mut x = DVector::from_vec(vec![1.0, 0.0]);
        for _ in 0..500 {
            let u = lqr(&x, &model, 1000, 1e-9)?;
            x = &a * &x + &b * u;
        }
        assert!(x.norm() < 1e-2);
        Ok(())
    }
}
