#![forbid(unsafe_code)]

pub mod opt;
pub mod tac;

pub use opt::{optimize, OptConfig, OptimizeOutcome};
pub use tac::{generate, Operand, TacInstr, TacProgram};
