use std::sync::Arc;

use crate::logging::Logger;
use crate::target::{DistanceInput, ElementRef, OutputFormat, TargetInput};

use super::core::{SessionCallback, TargetCallback};

/// Per-target defaults applied to descriptors lacking their own settings.
#[derive(Clone, Default)]
pub struct TargetDefaults {
    pub distance: Option<DistanceInput>,
    pub format: Option<OutputFormat>,
    pub context: Option<ElementRef>,
    pub on_proximity: Option<TargetCallback>,
}

/// Fully merged session configuration.
#[derive(Clone)]
pub struct SessionOptions {
    /// Master switch; a disabled session boots into an inert state.
    pub enabled: bool,
    /// Throttle interval in milliseconds for pointer, scroll and resize
    /// handling.
    pub delay_ms: u64,
    /// Build debug overlays mirroring target bounds.
    pub debug: bool,
    /// Session-wide output format, overridable per target.
    pub format: OutputFormat,
    /// Change callback, invoked with the full aggregate whenever it differs
    /// from the previous frame.
    pub on_proximity: Option<SessionCallback>,
    pub defaults: TargetDefaults,
    /// Structured logger for lifecycle events. Ambient: excluded from the
    /// equality `reboot` uses to detect configuration changes.
    pub logger: Option<Logger>,
    /// Interval between metric snapshot emissions through the logger. Zero
    /// disables snapshots.
    pub metrics_interval_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 100,
            debug: false,
            format: OutputFormat::Boolean,
            on_proximity: None,
            defaults: TargetDefaults::default(),
            logger: None,
            metrics_interval_ms: 0,
        }
    }
}

impl SessionOptions {
    /// Apply a partial overlay, right-biased key-by-key: set patch keys
    /// replace the current value, unset keys keep it.
    pub fn merge(&self, patch: &SessionOptionsPatch) -> SessionOptions {
        SessionOptions {
            enabled: patch.enabled.unwrap_or(self.enabled),
            delay_ms: patch.delay_ms.unwrap_or(self.delay_ms),
            debug: patch.debug.unwrap_or(self.debug),
            format: patch.format.unwrap_or(self.format),
            on_proximity: patch
                .on_proximity
                .clone()
                .or_else(|| self.on_proximity.clone()),
            defaults: patch
                .defaults
                .clone()
                .unwrap_or_else(|| self.defaults.clone()),
            logger: patch.logger.clone().or_else(|| self.logger.clone()),
            metrics_interval_ms: patch
                .metrics_interval_ms
                .unwrap_or(self.metrics_interval_ms),
        }
    }
}

/// Partial options overlay for [`SessionUpdate`].
#[derive(Clone, Default)]
pub struct SessionOptionsPatch {
    pub enabled: Option<bool>,
    pub delay_ms: Option<u64>,
    pub debug: Option<bool>,
    pub format: Option<OutputFormat>,
    pub on_proximity: Option<SessionCallback>,
    pub defaults: Option<TargetDefaults>,
    pub logger: Option<Logger>,
    pub metrics_interval_ms: Option<u64>,
}

impl SessionOptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn on_proximity(mut self, callback: SessionCallback) -> Self {
        self.on_proximity = Some(callback);
        self
    }

    pub fn defaults(mut self, defaults: TargetDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn metrics_interval_ms(mut self, interval: u64) -> Self {
        self.metrics_interval_ms = Some(interval);
        self
    }
}

/// Arguments to [`Session::reboot`](super::Session::reboot).
#[derive(Default)]
pub struct SessionUpdate {
    pub targets: Option<TargetInput>,
    pub options: Option<SessionOptionsPatch>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(mut self, targets: impl Into<TargetInput>) -> Self {
        self.targets = Some(targets.into());
        self
    }

    pub fn with_options(mut self, patch: SessionOptionsPatch) -> Self {
        self.options = Some(patch);
        self
    }
}

fn same_arc<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn defaults_equal(a: &TargetDefaults, b: &TargetDefaults) -> bool {
    a.distance == b.distance
        && a.format == b.format
        && a.context == b.context
        && same_arc(&a.on_proximity, &b.on_proximity)
}

/// Structural equality over the configuration surface `reboot` compares:
/// plain values key-by-key, function-valued options by allocation identity.
pub fn options_equal(a: &SessionOptions, b: &SessionOptions) -> bool {
    a.enabled == b.enabled
        && a.delay_ms == b.delay_ms
        && a.debug == b.debug
        && a.format == b.format
        && same_arc(&a.on_proximity, &b.on_proximity)
        && defaults_equal(&a.defaults, &b.defaults)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_right_biased_per_key() {
        let base = SessionOptions::default();
        let merged = base.merge(
            &SessionOptionsPatch::new()
                .delay_ms(250)
                .format(OutputFormat::Percentage),
        );
        assert_eq!(merged.delay_ms, 250);
        assert_eq!(merged.format, OutputFormat::Percentage);
        // Unset keys keep the prior value.
        assert!(merged.enabled);
        assert!(!merged.debug);
    }

    #[test]
    fn merge_keeps_existing_callback_when_patch_is_silent() {
        let callback: SessionCallback = Arc::new(|_| {});
        let base = SessionOptions {
            on_proximity: Some(Arc::clone(&callback)),
            ..SessionOptions::default()
        };
        let merged = base.merge(&SessionOptionsPatch::new().debug(true));
        assert!(same_arc(&merged.on_proximity, &Some(callback)));
        assert!(merged.debug);
    }

    #[test]
    fn equality_is_structural_with_identity_callbacks() {
        let callback: SessionCallback = Arc::new(|_| {});
        let a = SessionOptions {
            on_proximity: Some(Arc::clone(&callback)),
            ..SessionOptions::default()
        };
        let same = SessionOptions {
            on_proximity: Some(Arc::clone(&callback)),
            ..SessionOptions::default()
        };
        let fresh_callback = SessionOptions {
            on_proximity: Some(Arc::new(|_| {})),
            ..SessionOptions::default()
        };
        let different_delay = SessionOptions {
            delay_ms: 50,
            on_proximity: Some(callback),
            ..SessionOptions::default()
        };

        assert!(options_equal(&a, &same));
        assert!(!options_equal(&a, &fresh_callback));
        assert!(!options_equal(&a, &different_delay));
    }

    #[test]
    fn ambient_logger_does_not_affect_equality() {
        use crate::logging::{Logger, MemorySink};
        let a = SessionOptions::default();
        let b = SessionOptions {
            logger: Some(Logger::new(MemorySink::new())),
            metrics_interval_ms: 1000,
            ..SessionOptions::default()
        };
        assert!(options_equal(&a, &b));
    }
}
