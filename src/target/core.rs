use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::document::{Document, ElementId};
use crate::error::{ConfigError, Result};
use crate::session::{SessionOptions, TargetCallback};
use crate::uid::UidGenerator;

/// Marker attribute identifying monitored elements; also the selector used
/// by the fallback scan when no targets are supplied.
pub const MARKER_ATTR: &str = "data-nearfield";
/// Per-target uid marker, regenerated on each resolution pass.
pub const UID_ATTR: &str = "data-nearfield-uid";
/// Per-context uid marker; written once per physical element and reused on
/// rebuild so scroll listeners stay deduped.
pub const CONTEXT_UID_ATTR: &str = "data-nearfield-context-uid";
/// Live boolean containment state, published for external styling hooks.
pub const PROXIMITY_ATTR: &str = "data-nearfield-proximity";
/// Marker carried by debug overlay nodes.
pub const DEBUG_ID_ATTR: &str = "data-nearfield-debug-id";

/// Reference to a page element: a live handle, or a selector resolved at
/// boot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementRef {
    Element(ElementId),
    Selector(String),
}

impl From<ElementId> for ElementRef {
    fn from(id: ElementId) -> Self {
        ElementRef::Element(id)
    }
}

impl From<&str> for ElementRef {
    fn from(selector: &str) -> Self {
        ElementRef::Selector(selector.to_string())
    }
}

impl From<String> for ElementRef {
    fn from(selector: String) -> Self {
        ElementRef::Selector(selector)
    }
}

/// Raw distance input accepted from callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceInput {
    Scalar(f64),
    Axes { x: f64, y: f64 },
}

impl From<f64> for DistanceInput {
    fn from(value: f64) -> Self {
        DistanceInput::Scalar(value)
    }
}

impl From<(f64, f64)> for DistanceInput {
    fn from((x, y): (f64, f64)) -> Self {
        DistanceInput::Axes { x, y }
    }
}

/// Normalized per-axis margin in pixels. Components are always finite and
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Distance {
    pub x: f64,
    pub y: f64,
}

/// Output format of emitted proximity values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Boolean,
    Percentage,
}

/// Normalize a caller-supplied distance: a bare number becomes a symmetric
/// margin, a well-formed axes pair passes through, anything else collapses
/// to zero. Negative or non-finite components clamp to zero.
pub fn normalize_distance(input: Option<DistanceInput>) -> Distance {
    match input {
        Some(DistanceInput::Scalar(value)) if value.is_finite() => Distance {
            x: value.max(0.0),
            y: value.max(0.0),
        },
        Some(DistanceInput::Axes { x, y }) if x.is_finite() && y.is_finite() => Distance {
            x: x.max(0.0),
            y: y.max(0.0),
        },
        _ => Distance::default(),
    }
}

/// Caller-supplied description of one monitored element.
#[derive(Clone, Default)]
pub struct TargetDescriptor {
    pub target: Option<ElementRef>,
    pub distance: Option<DistanceInput>,
    pub context: Option<ElementRef>,
    pub format: Option<OutputFormat>,
    pub enabled: Option<bool>,
    pub on_proximity: Option<TargetCallback>,
}

impl TargetDescriptor {
    pub fn new(target: impl Into<ElementRef>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    pub fn with_distance(mut self, distance: impl Into<DistanceInput>) -> Self {
        self.distance = Some(distance.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<ElementRef>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn on_proximity(mut self, callback: TargetCallback) -> Self {
        self.on_proximity = Some(callback);
        self
    }
}

impl fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("target", &self.target)
            .field("distance", &self.distance)
            .field("context", &self.context)
            .field("format", &self.format)
            .field("enabled", &self.enabled)
            .field("on_proximity", &self.on_proximity.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// How callers hand targets to a session: one descriptor, a list, or a scan
/// of the document for the marker attribute.
#[derive(Clone)]
pub enum TargetInput {
    One(TargetDescriptor),
    Many(Vec<TargetDescriptor>),
    Auto,
}

impl From<TargetDescriptor> for TargetInput {
    fn from(descriptor: TargetDescriptor) -> Self {
        TargetInput::One(descriptor)
    }
}

impl From<Vec<TargetDescriptor>> for TargetInput {
    fn from(descriptors: Vec<TargetDescriptor>) -> Self {
        TargetInput::Many(descriptors)
    }
}

/// Resolved scoping container for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContext {
    pub element: ElementId,
    pub uid: String,
}

/// Canonical per-target record produced by [`resolve_targets`]: exactly one
/// live element, normalized distance, effective format/enabled flags and an
/// optional resolved context.
#[derive(Clone)]
pub struct ResolvedTarget {
    pub uid: String,
    pub element: ElementId,
    pub distance: Distance,
    pub format: OutputFormat,
    pub enabled: bool,
    pub context: Option<ResolvedContext>,
    pub on_proximity: Option<TargetCallback>,
    /// Index of the descriptor this record came from, used to route
    /// unsubscribe requests back to the stored configuration.
    pub(crate) source: usize,
}

impl fmt::Debug for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTarget")
            .field("uid", &self.uid)
            .field("element", &self.element)
            .field("distance", &self.distance)
            .field("format", &self.format)
            .field("enabled", &self.enabled)
            .field("context", &self.context)
            .finish()
    }
}

/// Normalize the target input shape. A single descriptor wraps into a
/// one-element list, a list passes through, and absent input scans the
/// document for the marker attribute, synthesizing descriptors from the
/// session defaults. `None` means nothing to track.
pub fn prepare_targets(
    document: &Document,
    input: TargetInput,
    options: &SessionOptions,
) -> Option<Vec<TargetDescriptor>> {
    match input {
        TargetInput::One(descriptor) => Some(vec![descriptor]),
        TargetInput::Many(descriptors) => Some(descriptors),
        TargetInput::Auto => {
            let marked = document.query_selector_all(&format!("[{MARKER_ATTR}]"));
            if marked.is_empty() {
                return None;
            }
            let defaults = &options.defaults;
            Some(
                marked
                    .into_iter()
                    .map(|element| TargetDescriptor {
                        target: Some(ElementRef::Element(element)),
                        distance: defaults.distance,
                        context: defaults.context.clone(),
                        format: None,
                        enabled: None,
                        on_proximity: defaults.on_proximity.clone(),
                    })
                    .collect(),
            )
        }
    }
}

/// Resolve descriptors into canonical targets, tagging elements with their
/// marker attributes along the way.
///
/// Selector misses fail with [`ConfigError::TargetNotFound`] /
/// [`ConfigError::ContextNotFound`]; direct handles whose element has left
/// the document are filtered out; an empty result after filtering fails
/// with [`ConfigError::NoTargets`].
pub fn resolve_targets(
    document: &Document,
    descriptors: &[TargetDescriptor],
    options: &SessionOptions,
    uids: &UidGenerator,
) -> Result<Vec<ResolvedTarget>> {
    let defaults = &options.defaults;
    let mut resolved = Vec::with_capacity(descriptors.len());

    for (source, descriptor) in descriptors.iter().enumerate() {
        let element = match resolve_element(document, descriptor.target.as_ref(), false)? {
            Some(element) => element,
            None => continue,
        };

        let context_ref = descriptor.context.as_ref().or(defaults.context.as_ref());
        let context = match context_ref {
            Some(reference) => resolve_element(document, Some(reference), true)?
                .map(|element| ResolvedContext {
                    uid: context_uid(document, element, uids),
                    element,
                }),
            None => None,
        };

        let uid = uids.next_target();
        document.set_attribute(element, MARKER_ATTR, "");
        document.set_attribute(element, UID_ATTR, uid.clone());

        resolved.push(ResolvedTarget {
            uid,
            element,
            distance: normalize_distance(descriptor.distance.or(defaults.distance)),
            format: descriptor
                .format
                .or(defaults.format)
                .unwrap_or(options.format),
            enabled: descriptor.enabled.unwrap_or(true),
            context,
            on_proximity: descriptor
                .on_proximity
                .clone()
                .or_else(|| defaults.on_proximity.clone()),
            source,
        });
    }

    if resolved.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    Ok(resolved)
}

fn resolve_element(
    document: &Document,
    reference: Option<&ElementRef>,
    is_context: bool,
) -> Result<Option<ElementId>> {
    match reference {
        None => Err(ConfigError::TargetRequired),
        Some(ElementRef::Selector(selector)) => match document.query_selector(selector) {
            Some(element) => Ok(Some(element)),
            None if is_context => Err(ConfigError::ContextNotFound(selector.clone())),
            None => Err(ConfigError::TargetNotFound(selector.clone())),
        },
        // A handle whose element has left the document is filtered, not an
        // error: the caller held a valid reference once.
        Some(ElementRef::Element(id)) => Ok(document.contains(*id).then_some(*id)),
    }
}

/// Reuse the context's existing uid marker when present so the identifier
/// stays stable across rebuilds for the same physical element.
fn context_uid(document: &Document, element: ElementId, uids: &UidGenerator) -> String {
    if let Some(existing) = document.attribute(element, CONTEXT_UID_ATTR) {
        if !existing.is_empty() {
            return existing;
        }
    }
    let uid = uids.next_context();
    document.set_attribute(element, CONTEXT_UID_ATTR, uid.clone());
    uid
}

fn same_callback(a: &Option<TargetCallback>, b: &Option<TargetCallback>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// Structural comparison of prepared descriptor lists, used by `reboot` to
/// decide whether the stored target configuration changed. Callbacks are
/// compared by allocation identity.
pub fn descriptors_equal(
    a: &Option<Vec<TargetDescriptor>>,
    b: &Option<Vec<TargetDescriptor>>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.len() == b.len()
                && a.iter().zip(b.iter()).all(|(a, b)| {
                    a.target == b.target
                        && a.distance == b.distance
                        && a.context == b.context
                        && a.format == b.format
                        && a.enabled == b.enabled
                        && same_callback(&a.on_proximity, &b.on_proximity)
                })
        }
        _ => false,
    }
}
