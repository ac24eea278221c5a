//! Session engine orchestrator.
//!
//! The session owns the whole listening lifecycle: it normalizes and
//! resolves targets, attaches throttled pointer/scroll/resize listeners,
//! runs the per-tick evaluation loop with frame-over-frame change
//! detection, and exposes `kill` and `reboot` for safe teardown and hot
//! reconfiguration.

mod core;
mod options;
mod single;

pub use self::core::{
    ProximityResult, Session, SessionCallback, TargetCallback, TargetProximity, Unsubscribe,
};
pub use self::options::{
    SessionOptions, SessionOptionsPatch, SessionUpdate, TargetDefaults, options_equal,
};
pub use self::single::SingleTarget;
