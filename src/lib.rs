//! Cursor-proximity engine over a headless document model.
//!
//! Nearfield tracks a set of registered elements and, on every throttled
//! pointer movement, reports whether (or how closely) the cursor sits
//! within a configurable margin of each one, optionally scoped to a
//! scrollable container. The crate owns no UI: hosts build a [`Document`],
//! feed pointer/scroll/resize events into it (for example through
//! [`TerminalDriver`]), and attach a [`Session`] that evaluates proximity
//! and fires callbacks when results change.

pub mod document;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod metrics;
pub mod overlay;
pub mod proximity;
pub mod session;
pub mod target;
pub mod throttle;
pub mod uid;

pub use document::{
    Document, DocumentEvent, ElementId, ElementSpec, ListenerFn, ListenerId, ListenerKind,
};
pub use driver::{DriverResult, TerminalDriver, TerminalDriverError};
pub use error::{ConfigError, Result};
pub use geometry::{Point, Rect, Size};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
    MemorySink,
};
pub use metrics::{MetricSnapshot, SessionMetrics};
pub use overlay::OverlayNode;
pub use proximity::{EmitValue, Evaluation, evaluate};
pub use session::{
    ProximityResult, Session, SessionCallback, SessionOptions, SessionOptionsPatch, SessionUpdate,
    SingleTarget, TargetCallback, TargetDefaults, TargetProximity, Unsubscribe,
};
pub use target::{
    CONTEXT_UID_ATTR, DEBUG_ID_ATTR, Distance, DistanceInput, ElementRef, MARKER_ATTR,
    OutputFormat, PROXIMITY_ATTR, ResolvedContext, ResolvedTarget, TargetDescriptor, TargetInput,
    UID_ATTR, prepare_targets, resolve_targets,
};
pub use throttle::{Clock, ManualClock, MonotonicClock, Throttle};
pub use uid::UidGenerator;
