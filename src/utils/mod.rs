pub mod discretize;
pub mod matmul;
pub mod sampling;
