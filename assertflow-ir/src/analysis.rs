//! The forward dataflow engine which flow-fact models plug into.
//!
//! An analysis run over a [`Function`](crate::Function) owns a [`FormulaArena`]; every
//! [`Environment`] created during the run borrows it, so no abstract state can outlive or cross
//! runs.

pub mod dataflow;
pub use dataflow::*;
pub mod environment;
pub use environment::*;
pub mod formula;
pub use formula::*;
pub mod postorder;
pub use postorder::*;
pub mod solver;
pub use solver::*;
