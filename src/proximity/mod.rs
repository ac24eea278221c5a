//! Proximity evaluation orchestrator.

mod core;

pub use self::core::{EmitValue, Evaluation, evaluate};
