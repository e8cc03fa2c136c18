use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::control::model::DisturbedLinearModel;
use crate::error::{LqrError, Result};
use crate::utils::matmul::{
    checked_inverse, column, ensure_len, ensure_shape, matmul, matmul3, matmul4, matmul5, matmul6,
    row, to_scalar, to_vector,
};
use crate::utils::sampling::SampleSet;

/// Cost-to-go `V_t(x) = xᵗPx + 2rᵗx + z` with `t` stages to go.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFunction {
    pub p: DMatrix<f64>,
    pub r: DVector<f64>,
    pub z: f64,
}

impl ValueFunction {
    /// `(Q_f, 0, 0)`
    pub fn terminal(model: &impl DisturbedLinearModel) -> ValueFunction {
        ValueFunction {
            p: model.q_f().clone(),
            r: DVector::zeros(model.q_f().nrows()),
            z: 0.0,
        }
    }

    /// xᵗPx + 2rᵗx + z
    pub fn cost(&self, x: &DVector<f64>) -> Result<f64> {
        ensure_len("state", x, self.p.nrows())?;
        Ok((x.transpose() * &self.p * x)[(0, 0)] + 2.0 * self.r.dot(x) + self.z)
    }

    fn check(&self, n: usize) -> Result<()> {
        ensure_shape("P", &self.p, (n, n))?;
        ensure_len("r", &self.r, n)
    }
}

fn check_risk(lam: f64) -> Result<f64> {
    if !(lam.is_finite() && lam > 0.0) {
        return Err(LqrError::InvalidParameter(format!(
            "risk parameter must be positive and finite, got {lam}"
        )));
    }
    Ok(lam.recip())
}

/// Largest real part among the eigenvalues of `XiᵗPXi`.
pub fn max_real_eigenvalue(xi: &DMatrix<f64>, p: &DMatrix<f64>) -> Result<f64> {
    let xtpx = matmul3(&xi.transpose(), p, xi)?;
    if xtpx.is_empty() {
        return Ok(f64::NEG_INFINITY);
    }
    Ok(xtpx
        .complex_eigenvalues()
        .iter()
        .map(|e| e.re)
        .fold(f64::NEG_INFINITY, f64::max))
}

/// `max Re λ(XiᵗPXi) < lam`
///
/// The bound does not depend on `lam`, so raising `lam` can only turn an
/// infeasible stage feasible.
pub fn feasible(xi: &DMatrix<f64>, p: &DMatrix<f64>, lam: f64) -> Result<bool> {
    Ok(max_real_eigenvalue(xi, p)? < lam)
}

/// One backward stage of the minimax recursion.
///
/// With `W = BR⁻¹Bᵗ − XiXiᵗ/lam`, `M = (I + PW)⁻¹`,
/// `N = (I − XiᵗPXi/lam)⁻¹` and `M₂ = (I − PXiXiᵗ/lam)⁻¹`:
///
/// ```text
/// P' = Q + AᵗMPA
/// r' = AᵗM(PXiμ + r)
/// z' = z + 1/N Σ wᵢᵗ N XiᵗPXi wᵢ + μᵗXiᵗ(M − M₂)PXiμ + (2μᵗXiᵗ − rᵗW)Mr
/// ```
///
/// The sample average divides by the sample count, not by one less.
/// Feasibility is not checked here: call [`feasible`] first. Any singular
/// inverse is reported as [`LqrError::Singular`].
pub fn riccati_update(
    model: &impl DisturbedLinearModel,
    value: &ValueFunction,
    samples: &SampleSet,
    lam: f64,
) -> Result<ValueFunction> {
    let inv_lam = check_risk(lam)?;
    let (a, b, xi, q) = (model.a(), model.b(), model.xi(), model.q());
    let n = a.nrows();
    let k = xi.ncols();
    value.check(n)?;
    ensure_len("sample mean", samples.mean(), k)?;

    let p = &value.p;
    let at = a.transpose();
    let bt = b.transpose();
    let xit = xi.transpose();
    let r_inv = checked_inverse(model.r().clone(), "R")?;

    let w = matmul3(b, &r_inv, &bt)? - inv_lam * matmul(xi, &xit)?;
    let m = checked_inverse(DMatrix::identity(n, n) + matmul(p, &w)?, "I + PW")?;
    let n_inv = checked_inverse(
        DMatrix::identity(k, k) - inv_lam * matmul3(&xit, p, xi)?,
        "I - XiᵗPXi/lam",
    )?;
    let m2 = checked_inverse(
        DMatrix::identity(n, n) - inv_lam * matmul3(p, xi, &xit)?,
        "I - PXiXiᵗ/lam",
    )?;

    let mu = column(samples.mean());
    let r_col = column(&value.r);
    let bias = matmul3(p, xi, &mu)? + &r_col;

    let p_next = q + matmul4(&at, &m, p, a)?;
    let r_next = to_vector(&matmul3(&at, &m, &bias)?)?;

    let mut expectation = 0.0;
    for sample in samples.samples() {
        let wt = row(sample);
        expectation += to_scalar(&matmul6(&wt, &n_inv, &xit, p, xi, &wt.transpose())?)?;
    }
    expectation /= samples.len() as f64;

    let mean_term = to_scalar(&matmul6(&mu.transpose(), &xit, &(&m - &m2), p, xi, &mu)?)?;
    let cross = 2.0 * matmul(&mu.transpose(), &xit)? - matmul(&r_col.transpose(), &w)?;
    let linear_term = to_scalar(&matmul3(&cross, &m, &r_col)?)?;

    let z_next = value.z + expectation + mean_term + linear_term;
    trace!(
        "minimax stage: sample term {expectation:.6e}, mean term {mean_term:.6e}, linear term {linear_term:.6e}"
    );

    Ok(ValueFunction {
        p: p_next,
        r: r_next,
        z: z_next,
    })
}

/// Feedback gain `K` and bias `L` of the minimax policy `u = K x + L`.
///
/// With `T = I + PBR⁻¹Bᵗ − PXiXiᵗ/lam`:
/// `K = −R⁻¹BᵗT⁻¹PA` and `L = −R⁻¹BᵗT⁻¹(PXiμ + r)`, where `(P, r)` is the
/// value function of the next stage.
pub fn control_gain(
    model: &impl DisturbedLinearModel,
    value: &ValueFunction,
    sample_mean: &DVector<f64>,
    lam: f64,
) -> Result<(DMatrix<f64>, DVector<f64>)> {
    let inv_lam = check_risk(lam)?;
    let (a, b, xi) = (model.a(), model.b(), model.xi());
    let n = a.nrows();
    value.check(n)?;
    ensure_len("sample mean", sample_mean, xi.ncols())?;

    let p = &value.p;
    let bt = b.transpose();
    let xit = xi.transpose();
    let r_inv = checked_inverse(model.r().clone(), "R")?;

    let t = DMatrix::identity(n, n) + matmul4(p, b, &r_inv, &bt)?
        - inv_lam * matmul3(p, xi, &xit)?;
    let t_inv = checked_inverse(t, "I + PBR⁻¹Bᵗ - PXiXiᵗ/lam")?;
    let bias = matmul3(p, xi, &column(sample_mean))? + column(&value.r);

    let k = -matmul5(&r_inv, &bt, &t_inv, p, a)?;
    let l = -to_vector(&matmul4(&r_inv, &bt, &t_inv, &bias)?)?;
    Ok((k, l))
}
