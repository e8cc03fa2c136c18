use nalgebra::{DMatrix, DVector};

use crate::error::{LqrError, Result};

pub fn ensure_shape(
    operation: &'static str,
    m: &DMatrix<f64>,
    expected: (usize, usize),
) -> Result<()> {
    if m.shape() != expected {
        return Err(LqrError::DimensionMismatch {
            operation,
            left: m.shape(),
            right: expected,
        });
    }
    Ok(())
}

pub fn ensure_len(operation: &'static str, v: &DVector<f64>, expected: usize) -> Result<()> {
    if v.len() != expected {
        return Err(LqrError::DimensionMismatch {
            operation,
            left: (v.len(), 1),
            right: (expected, 1),
        });
    }
    Ok(())
}

/// `A·B`, returning [`LqrError::DimensionMismatch`] where `*` would panic.
pub fn matmul(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.ncols() != b.nrows() {
        return Err(LqrError::DimensionMismatch {
            operation: "matrix product",
            left: a.shape(),
            right: b.shape(),
        });
    }
    Ok(a * b)
}

/// A·(B·C)
pub fn matmul3(a: &DMatrix<f64>, b: &DMatrix<f64>, c: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    matmul(a, &matmul(b, c)?)
}

/// (A·B)·(C·D)
pub fn matmul4(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    c: &DMatrix<f64>,
    d: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    matmul(&matmul(a, b)?, &matmul(c, d)?)
}

/// (A·B)·((C·D)·E)
pub fn matmul5(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    c: &DMatrix<f64>,
    d: &DMatrix<f64>,
    e: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    matmul3(&matmul(a, b)?, &matmul(c, d)?, e)
}

/// (A·B·C)·(D·E·F), each half grouped as in [`matmul3`]
pub fn matmul6(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    c: &DMatrix<f64>,
    d: &DMatrix<f64>,
    e: &DMatrix<f64>,
    f: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    matmul(&matmul3(a, b, c)?, &matmul3(d, e, f)?)
}

/// A·((B·C·D)·(E·F·G))
#[allow(clippy::too_many_arguments)]
pub fn matmul7(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    c: &DMatrix<f64>,
    d: &DMatrix<f64>,
    e: &DMatrix<f64>,
    f: &DMatrix<f64>,
    g: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    matmul3(a, &matmul3(b, c, d)?, &matmul3(e, f, g)?)
}

/// Inverse of a square matrix, `term` names it in the error.
pub fn checked_inverse(m: DMatrix<f64>, term: &'static str) -> Result<DMatrix<f64>> {
    if !m.is_square() {
        return Err(LqrError::DimensionMismatch {
            operation: term,
            left: m.shape(),
            right: (m.nrows(), m.nrows()),
        });
    }
    match m.try_inverse() {
        Some(inv) if inv.iter().all(|x| x.is_finite()) => Ok(inv),
        _ => Err(LqrError::Singular { term }),
    }
}

/// n×1 matrix view of a vector, for use in the chain products.
pub fn column(v: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_column_slice(v.len(), 1, v.as_slice())
}

/// 1×n matrix view of a vector.
pub fn row(v: &DVector<f64>) -> DMatrix<f64> {
    DMatrix::from_row_slice(1, v.len(), v.as_slice())
}

/// Reads back the single column of an n×1 product.
pub fn to_vector(m: &DMatrix<f64>) -> Result<DVector<f64>> {
    if m.ncols() != 1 {
        return Err(LqrError::DimensionMismatch {
            operation: "column vector",
            left: m.shape(),
            right: (m.nrows(), 1),
        });
    }
    Ok(m.column(0).clone_owned())
}

/// Reads back the value of a 1×1 product.
pub fn to_scalar(m: &DMatrix<f64>) -> Result<f64> {
    ensure_shape("scalar", m, (1, 1))?;
    Ok(m[(0, 0)])
}

/// Builds a matrix from row-major nested vectors, all rows the same length.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|row| row.len() != ncols) {
        return Err(LqrError::DimensionMismatch {
            operation: "matrix rows",
            left: (1, bad.len()),
            right: (1, ncols),
        });
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}
