//! Target normalization orchestrator.
//!
//! Turns caller-supplied descriptors (single, list, or attribute-scan
//! fallback) into the canonical resolved list the session engine evaluates,
//! and owns the marker-attribute contract shared with external styling and
//! debugging consumers.

mod core;

pub use self::core::{
    CONTEXT_UID_ATTR, DEBUG_ID_ATTR, Distance, DistanceInput, ElementRef, MARKER_ATTR,
    OutputFormat, PROXIMITY_ATTR, ResolvedContext, ResolvedTarget, TargetDescriptor, TargetInput,
    UID_ATTR, descriptors_equal, normalize_distance, prepare_targets, resolve_targets,
};
