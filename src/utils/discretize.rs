use nalgebra::DMatrix;

use crate::error::{LqrError, Result};

/// Zero-order-hold discretization of `x_dot = A x + B u`.
///
/// Exponentiates `[[A, B], [0, 0]]·dt`; the top block row is `[A_d, B_d]`.
pub fn continuous_to_discrete_zoh(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    dt: f64,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let n = a.nrows();
    if !a.is_square() || b.nrows() != n {
        return Err(LqrError::DimensionMismatch {
            operation: "zero-order hold",
            left: a.shape(),
            right: b.shape(),
        });
    }
    let m = b.ncols();

    let mut block = DMatrix::<f64>::zeros(n + m, n + m);
    block.view_mut((0, 0), (n, n)).copy_from(a);
    block.view_mut((0, n), (n, m)).copy_from(b);
    let exp = (block * dt).exp();

    let ad = exp.view((0, 0), (n, n)).clone_owned();
    let bd = exp.view((0, n), (n, m)).clone_owned();
    Ok((ad, bd))
}
