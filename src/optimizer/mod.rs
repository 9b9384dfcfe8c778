pub mod aggregate;
pub mod extract;
pub mod horizon;
pub mod lp;
pub mod model;
pub mod relax;
pub mod scheduler;
pub mod solver;

pub use aggregate::*;
pub use extract::*;
pub use horizon::*;
pub use lp::*;
pub use model::*;
pub use relax::*;
pub use scheduler::*;
pub use solver::*;
