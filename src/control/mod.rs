pub mod lqr;
pub mod minimax_lqr;
pub mod model;
pub mod objective;
pub mod policy;
pub mod worst_case;

pub use minimax_lqr::ValueFunction;
pub use model::{DiscreteModel, DisturbedLinearModel, LinearModel};
pub use objective::{evaluate, Cost, Infeasibility};
pub use policy::{rollout, synthesize, MinimaxPolicy, Trajectory};
