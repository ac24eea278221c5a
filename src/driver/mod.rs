//! Host drivers feeding events into a [`Document`](crate::Document).

mod terminal;

pub use terminal::{DriverResult, TerminalDriver, TerminalDriverError};
