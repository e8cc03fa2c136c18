use nalgebra::{DMatrix, DVector};

use crate::error::{LqrError, Result};
use crate::utils::discretize::continuous_to_discrete_zoh;
use crate::utils::matmul::{ensure_len, ensure_shape};

/// Discrete-time dynamics and quadratic cost of an LQR problem.
pub trait LinearModel {
    fn a(&self) -> &DMatrix<f64>;
    fn b(&self) -> &DMatrix<f64>;
    fn q(&self) -> &DMatrix<f64>;
    fn r(&self) -> &DMatrix<f64>;
}

/// A [`LinearModel`] driven by an additive disturbance `Xi·w`, with a
/// terminal cost.
pub trait DisturbedLinearModel: LinearModel {
    fn xi(&self) -> &DMatrix<f64>;
    fn q_f(&self) -> &DMatrix<f64>;
}

/// x_{t+1} = A x_t + B u_t + Xi w_t
///
/// n: state size, m: input size, k: disturbance size
#[derive(Debug, Clone)]
pub struct DiscreteModel {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    xi: DMatrix<f64>,
    q: DMatrix<f64>,
    q_f: DMatrix<f64>,
    r: DMatrix<f64>,
}

impl DiscreteModel {
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        xi: DMatrix<f64>,
        q: DMatrix<f64>,
        q_f: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<DiscreteModel> {
        let n = a.nrows();
        let m = b.ncols();
        let k = xi.ncols();
        ensure_shape("A", &a, (n, n))?;
        ensure_shape("B", &b, (n, m))?;
        ensure_shape("Xi", &xi, (n, k))?;
        ensure_shape("Q", &q, (n, n))?;
        ensure_shape("Q_f", &q_f, (n, n))?;
        ensure_shape("R", &r, (m, m))?;
        Ok(DiscreteModel {
            a,
            b,
            xi,
            q,
            q_f,
            r,
        })
    }

    /// Discretizes `(a_c, b_c)` with a zero-order hold of period `dt`.
    pub fn from_continuous(
        a_c: &DMatrix<f64>,
        b_c: &DMatrix<f64>,
        xi: DMatrix<f64>,
        q: DMatrix<f64>,
        q_f: DMatrix<f64>,
        r: DMatrix<f64>,
        dt: f64,
    ) -> Result<DiscreteModel> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(LqrError::InvalidParameter(format!(
                "sampling period must be positive, got {dt}"
            )));
        }
        let (a, b) = continuous_to_discrete_zoh(a_c, b_c, dt)?;
        DiscreteModel::new(a, b, xi, q, q_f, r)
    }

    /// Same model with the disturbance channel removed.
    pub fn without_disturbance(&self) -> DiscreteModel {
        DiscreteModel {
            xi: DMatrix::zeros(self.n(), self.k()),
            ..self.clone()
        }
    }

    pub fn n(&self) -> usize {
        self.a.nrows()
    }

    pub fn m(&self) -> usize {
        self.b.ncols()
    }

    pub fn k(&self) -> usize {
        self.xi.ncols()
    }

    pub fn step(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        w: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        ensure_len("state", x, self.n())?;
        ensure_len("control", u, self.m())?;
        ensure_len("disturbance", w, self.k())?;
        Ok(&self.a * x + &self.b * u + &self.xi * w)
    }

    /// xᵗQx + uᵗRu
    pub fn stage_cost(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<f64> {
        ensure_len("state", x, self.n())?;
        ensure_len("control", u, self.m())?;
        Ok((x.transpose() * &self.q * x)[(0, 0)] + (u.transpose() * &self.r * u)[(0, 0)])
    }

    /// xᵗQ_f x
    pub fn terminal_cost(&self, x: &DVector<f64>) -> Result<f64> {
        ensure_len("state", x, self.n())?;
        Ok((x.transpose() * &self.q_f * x)[(0, 0)])
    }
}

impl LinearModel for DiscreteModel {
    fn a(&self) -> &DMatrix<f64> {
        &self.a
    }
    fn b(&self) -> &DMatrix<f64> {
        &self.b
    }
    fn q(&self) -> &DMatrix<f64> {
        &self.q
    }
    fn r(&self) -> &DMatrix<f64> {
        &self.r
    }
}

impl DisturbedLinearModel for DiscreteModel {
    fn xi(&self) -> &DMatrix<f64> {
        &self.xi
    }
    fn q_f(&self) -> &DMatrix<f64> {
        &self.q_f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::result::Result;

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    #[test]
    fn rejects_bad_shapes() {
        let i2 = DMatrix::<f64>::identity(2, 2);
        let b = DMatrix::<f64>::zeros(2, 1);
        let xi = DMatrix::<f64>::identity(2, 2);
        // R must be m×m = 1×1
        let err = DiscreteModel::new(
            i2.clone(),
            b.clone(),
            xi,
            i2.clone(),
            i2.clone(),
            i2.clone(),
        );
        assert!(matches!(
            err,
            Err(LqrError::DimensionMismatch { operation: "R", .. })
        ));
        // Xi rows must match the state
        let err = DiscreteModel::new(
            i2.clone(),
            b,
            DMatrix::zeros(3, 1),
            i2.clone(),
            i2,
            scalar(1.0),
        );
        assert!(matches!(
            err,
            Err(LqrError::DimensionMismatch {
                operation: "Xi",
                ..
            })
        ));
    }

    #[test]
    fn step_and_costs() -> Result<(), Box<dyn Error>> {
        let model = DiscreteModel::new(
            scalar(2.0),
            scalar(1.0),
            scalar(0.5),
            scalar(3.0),
            scalar(4.0),
            scalar(5.0),
        )?;
        let x = DVector::from_element(1, 1.0);
        let u = DVector::from_element(1, -1.0);
        let w = DVector::from_element(1, 2.0);
        approx::assert_abs_diff_eq!(model.step(&x, &u, &w)?[0], 2.0 - 1.0 + 1.0);
        approx::assert_abs_diff_eq!(model.stage_cost(&x, &u)?, 3.0 + 5.0);
        approx::assert_abs_diff_eq!(model.terminal_cost(&x)?, 4.0);
        assert!(model.step(&x, &u, &DVector::zeros(2)).is_err());
        Ok(())
    }

    #[test]
    fn from_continuous_discretizes() -> Result<(), Box<dyn Error>> {
        let a_c = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let b_c = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let i2 = DMatrix::<f64>::identity(2, 2);
        let model = DiscreteModel::from_continuous(
            &a_c,
            &b_c,
            i2.clone(),
            i2.clone(),
            i2,
            scalar(1.0),
            0.2,
        )?;
        approx::assert_abs_diff_eq!(model.a()[(0, 1)], 0.2, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(model.b()[(0, 0)], 0.02, epsilon = 1e-12);
        assert_eq!((model.n(), model.m(), model.k()), (2, 1, 2));
        Ok(())
    }
}
