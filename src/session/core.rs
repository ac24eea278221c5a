use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;

use crate::document::{Document, DocumentEvent, ElementId, ListenerId, ListenerKind};
use crate::geometry::{Point, Size};
use crate::logging::{LogLevel, event_with_fields, json_kv, json_str};
use crate::metrics::{MetricSnapshot, SessionMetrics};
use crate::overlay::{self, OverlayNode};
use crate::proximity::{EmitValue, evaluate};
use crate::target::{
    CONTEXT_UID_ATTR, OutputFormat, ResolvedTarget, TargetDescriptor, TargetInput,
    descriptors_equal, prepare_targets, resolve_targets,
};
use crate::throttle::{Clock, MonotonicClock, Throttle};
use crate::uid::UidGenerator;

use super::options::{SessionOptions, SessionUpdate, options_equal};

const LOG_TARGET: &str = "nearfield::session";
const METRICS_TARGET: &str = "nearfield::session.metrics";

/// Session-level change callback, invoked with the full aggregate.
pub type SessionCallback = Arc<dyn Fn(&[ProximityResult]) + Send + Sync>;
/// Per-target callback, invoked on every evaluated tick.
pub type TargetCallback = Arc<dyn Fn(TargetProximity) + Send + Sync>;

/// One entry of the aggregate handed to the session-level callback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityResult {
    pub uid: String,
    pub element: Option<ElementId>,
    pub enabled: bool,
    pub format: OutputFormat,
    pub data: EmitValue,
}

/// Payload handed to per-target callbacks.
#[derive(Clone)]
pub struct TargetProximity {
    pub uid: String,
    pub element: ElementId,
    pub data: EmitValue,
    pub enabled: bool,
    pub format: OutputFormat,
    pub unsubscribe: Unsubscribe,
}

impl fmt::Debug for TargetProximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetProximity")
            .field("uid", &self.uid)
            .field("element", &self.element)
            .field("data", &self.data)
            .field("enabled", &self.enabled)
            .field("format", &self.format)
            .finish()
    }
}

/// Affordance handed to per-target callbacks: invoking it reboots the
/// session with this target's enabled flag forced off. This is the only way
/// to disable a single target at runtime without supplying a fresh list.
#[derive(Clone)]
pub struct Unsubscribe {
    core: Weak<SessionCore>,
    uid: String,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        if let Some(core) = self.core.upgrade() {
            SessionCore::unsubscribe_target(&core, &self.uid);
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsubscribe({})", self.uid)
    }
}

struct EngineState {
    options: SessionOptions,
    descriptors: Option<Vec<TargetDescriptor>>,
    resolved: Vec<ResolvedTarget>,
    listeners: Vec<ListenerId>,
    overlays: Vec<OverlayNode>,
    pointer_gate: Throttle<Point>,
    resize_gate: Throttle<Size>,
    // Keyed by contextUID; one gate and one listener per distinct context
    // element regardless of how many targets share it.
    scroll_gates: HashMap<String, (ElementId, Throttle<()>)>,
    previous_frame: Option<blake3::Hash>,
    last_metrics_emit: Option<Instant>,
    active: bool,
}

struct SessionCore {
    document: Document,
    clock: Arc<dyn Clock>,
    uids: UidGenerator,
    created: Instant,
    state: Mutex<EngineState>,
    metrics: Mutex<SessionMetrics>,
}

/// Handle to one running proximity session.
///
/// A session owns its resolved targets, listener registrations, overlay
/// nodes and previous-frame cache; multiple sessions over one document
/// coexist without sharing any of them. Handles are cheap to clone; the
/// underlying session tears down when the last handle drops, or earlier via
/// [`kill`](Session::kill).
#[derive(Clone)]
pub struct Session {
    core: Arc<SessionCore>,
}

impl Session {
    /// Construct and boot a session. `targets` is a single descriptor, a
    /// list, or [`TargetInput::Auto`] to scan the document for the marker
    /// attribute.
    pub fn create(
        document: &Document,
        targets: impl Into<TargetInput>,
        options: SessionOptions,
    ) -> Session {
        Self::with_clock(document, targets, options, Arc::new(MonotonicClock))
    }

    /// Construct with an injected clock; tests pair this with
    /// [`ManualClock`](crate::throttle::ManualClock).
    pub fn with_clock(
        document: &Document,
        targets: impl Into<TargetInput>,
        options: SessionOptions,
        clock: Arc<dyn Clock>,
    ) -> Session {
        let descriptors = prepare_targets(document, targets.into(), &options);
        let delay = Duration::from_millis(options.delay_ms);
        let created = clock.now();
        let core = Arc::new(SessionCore {
            document: document.clone(),
            clock,
            uids: UidGenerator::new(),
            created,
            state: Mutex::new(EngineState {
                options,
                descriptors,
                resolved: Vec::new(),
                listeners: Vec::new(),
                overlays: Vec::new(),
                pointer_gate: Throttle::new(delay),
                resize_gate: Throttle::new(delay),
                scroll_gates: HashMap::new(),
                previous_frame: None,
                last_metrics_emit: None,
                active: false,
            }),
            metrics: Mutex::new(SessionMetrics::new()),
        });
        SessionCore::boot(&core);
        Session { core }
    }

    /// Tear down: detach every listener, remove overlays, clear caches.
    /// Idempotent; safe before any successful boot.
    pub fn kill(&self) {
        self.core.kill();
    }

    /// Reconfigure and rebuild. Targets and options are compared
    /// structurally and replaced only when different; the kill/boot cycle
    /// runs regardless.
    pub fn reboot(&self, update: SessionUpdate) {
        SessionCore::reboot(&self.core, update);
    }

    /// Current merged options.
    pub fn options(&self) -> SessionOptions {
        self.core.lock_state().options.clone()
    }

    /// Current normalized target descriptor list, if any.
    pub fn targets(&self) -> Option<Vec<TargetDescriptor>> {
        self.core.lock_state().descriptors.clone()
    }

    /// Whether listeners are currently attached.
    pub fn is_active(&self) -> bool {
        self.core.lock_state().active
    }

    /// Flush throttled work whose interval has elapsed. Hosts call this on
    /// every loop iteration so coalesced trailing events fire at the
    /// interval boundary.
    pub fn poll_deferred(&self) {
        SessionCore::poll_deferred(&self.core);
    }

    pub fn metrics_snapshot(&self) -> MetricSnapshot {
        self.core.metrics_snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if Arc::strong_count(&self.core) == 1 {
            self.core.kill();
        }
    }
}

impl SessionCore {
    fn boot(this: &Arc<Self>) {
        let mut state = this.lock_state();
        if !state.options.enabled {
            this.log(&state.options, LogLevel::Debug, "boot_skipped_disabled", []);
            return;
        }
        let Some(descriptors) = state.descriptors.clone() else {
            this.log(&state.options, LogLevel::Debug, "boot_skipped_no_targets", []);
            return;
        };

        match resolve_targets(&this.document, &descriptors, &state.options, &this.uids) {
            Ok(resolved) => state.resolved = resolved,
            Err(err) => {
                // Resolution mistakes must not crash the host: the session
                // degrades to inert and stays reboot-able.
                this.log(
                    &state.options,
                    LogLevel::Error,
                    "boot_failed",
                    [json_str("error", err.to_string())],
                );
                return;
            }
        }

        let delay = Duration::from_millis(state.options.delay_ms);
        state.pointer_gate = Throttle::new(delay);
        state.resize_gate = Throttle::new(delay);
        state.scroll_gates.clear();

        if state.options.debug {
            state.overlays = overlay::build_overlays(&this.document, &state.resolved);
        }

        if !state.resolved.is_empty() {
            let weak = Arc::downgrade(this);
            let id = this.document.add_listener(
                ListenerKind::PointerMove,
                Arc::new(move |event| {
                    if let DocumentEvent::PointerMove(cursor) = event {
                        if let Some(core) = weak.upgrade() {
                            SessionCore::pointer_event(&core, *cursor);
                        }
                    }
                }),
            );
            state.listeners.push(id);
        }

        if !state.overlays.is_empty() {
            let weak = Arc::downgrade(this);
            let id = this.document.add_listener(
                ListenerKind::Resize,
                Arc::new(move |event| {
                    if let DocumentEvent::Resize(_) = event {
                        if let Some(core) = weak.upgrade() {
                            core.resize_event();
                        }
                    }
                }),
            );
            state.listeners.push(id);
        }

        let mut contexts: Vec<(String, ElementId)> = Vec::new();
        for target in &state.resolved {
            if let Some(context) = &target.context {
                if !contexts.iter().any(|(uid, _)| uid == &context.uid) {
                    contexts.push((context.uid.clone(), context.element));
                }
            }
        }
        for (uid, element) in contexts {
            state
                .scroll_gates
                .insert(uid, (element, Throttle::new(delay)));
            let weak = Arc::downgrade(this);
            let id = this.document.add_listener(
                ListenerKind::Scroll(element),
                Arc::new(move |event| {
                    if let DocumentEvent::Scroll(source) = event {
                        if let Some(core) = weak.upgrade() {
                            core.scroll_event(*source);
                        }
                    }
                }),
            );
            state.listeners.push(id);
        }

        state.active = !state.listeners.is_empty();
        this.log(
            &state.options,
            LogLevel::Info,
            "session_booted",
            [
                json_kv("targets", json!(state.resolved.len())),
                json_kv("debug", json!(state.options.debug)),
            ],
        );
        drop(state);
        if let Ok(mut metrics) = this.metrics.lock() {
            metrics.record_boot();
        }
    }

    fn kill(&self) {
        let (listeners, overlays, was_active, options) = {
            let mut state = self.lock_state();
            let was_active = state.active;
            state.active = false;
            let listeners = std::mem::take(&mut state.listeners);
            let overlays = std::mem::take(&mut state.overlays);
            state.resolved.clear();
            state.previous_frame = None;
            state.pointer_gate.reset();
            state.resize_gate.reset();
            state.scroll_gates.clear();
            (listeners, overlays, was_active, state.options.clone())
        };
        for id in listeners {
            self.document.remove_listener(id);
        }
        overlay::remove_overlays(&self.document, &overlays);
        if was_active {
            self.log(&options, LogLevel::Info, "session_killed", []);
            if let Ok(mut metrics) = self.metrics.lock() {
                metrics.record_kill();
            }
        }
    }

    fn reboot(this: &Arc<Self>, update: SessionUpdate) {
        let (targets_changed, options_changed) = {
            let mut state = this.lock_state();
            let mut options_changed = false;
            if let Some(patch) = &update.options {
                let merged = state.options.merge(patch);
                options_changed = !options_equal(&state.options, &merged);
                state.options = merged;
            }
            let mut targets_changed = false;
            if let Some(input) = update.targets {
                let prepared = prepare_targets(&this.document, input, &state.options);
                if !descriptors_equal(&state.descriptors, &prepared) {
                    state.descriptors = prepared;
                    targets_changed = true;
                }
            }
            (targets_changed, options_changed)
        };

        // Always a full rebuild, even when nothing changed.
        this.kill();
        SessionCore::boot(this);

        let options = this.lock_state().options.clone();
        this.log(
            &options,
            LogLevel::Info,
            "session_rebooted",
            [
                json_kv("targets_changed", json!(targets_changed)),
                json_kv("options_changed", json!(options_changed)),
            ],
        );
        if let Ok(mut metrics) = this.metrics.lock() {
            metrics.record_reboot();
        }
    }

    fn unsubscribe_target(this: &Arc<Self>, uid: &str) {
        let found = {
            let mut state = this.lock_state();
            let source = state
                .resolved
                .iter()
                .find(|target| target.uid == uid)
                .map(|target| target.source);
            match source {
                Some(index) => {
                    if let Some(descriptors) = state.descriptors.as_mut() {
                        if let Some(descriptor) = descriptors.get_mut(index) {
                            descriptor.enabled = Some(false);
                        }
                    }
                    true
                }
                None => false,
            }
        };
        if !found {
            return;
        }
        this.kill();
        SessionCore::boot(this);
        let options = this.lock_state().options.clone();
        this.log(
            &options,
            LogLevel::Info,
            "target_unsubscribed",
            [json_str("uid", uid)],
        );
        if let Ok(mut metrics) = this.metrics.lock() {
            metrics.record_reboot();
        }
    }

    fn pointer_event(this: &Arc<Self>, cursor: Point) {
        if let Ok(mut metrics) = this.metrics.lock() {
            metrics.record_pointer_event();
        }
        let fired = {
            let mut state = this.lock_state();
            if !state.active {
                return;
            }
            let now = this.clock.now();
            state.pointer_gate.offer(now, cursor)
        };
        if let Some(cursor) = fired {
            SessionCore::run_tick(this, cursor);
        }
    }

    /// Evaluate every enabled target, fire per-target callbacks, and fire
    /// the session-level callback when the aggregate differs from the
    /// previous frame. Callbacks run after the state lock is released so an
    /// unsubscribe-triggered reboot from inside a callback cannot deadlock.
    fn run_tick(this: &Arc<Self>, cursor: Point) {
        let (targets, overlays, options) = {
            let state = this.lock_state();
            if !state.active {
                return;
            }
            (
                state.resolved.clone(),
                state.overlays.clone(),
                state.options.clone(),
            )
        };

        let mut aggregate = Vec::new();
        let mut callbacks = Vec::new();
        for target in targets.iter().filter(|target| target.enabled) {
            let evaluation = evaluate(
                &this.document,
                target.format,
                target.element,
                target.context.as_ref().map(|context| context.element),
                target.distance,
                cursor,
            );
            if options.debug {
                overlay::set_overlay_active(
                    &this.document,
                    &overlays,
                    &target.uid,
                    evaluation.proximity,
                );
            }
            aggregate.push(ProximityResult {
                uid: target.uid.clone(),
                element: Some(target.element),
                enabled: target.enabled,
                format: target.format,
                data: evaluation.emit,
            });
            if let Some(callback) = &target.on_proximity {
                callbacks.push((
                    Arc::clone(callback),
                    TargetProximity {
                        uid: target.uid.clone(),
                        element: target.element,
                        data: evaluation.emit,
                        enabled: target.enabled,
                        format: target.format,
                        unsubscribe: Unsubscribe {
                            core: Arc::downgrade(this),
                            uid: target.uid.clone(),
                        },
                    },
                ));
            }
        }

        let hash = frame_hash(&aggregate);
        let changed = {
            let mut state = this.lock_state();
            let changed = match (&state.previous_frame, &hash) {
                (None, _) => true,
                (Some(previous), Some(new)) => previous != new,
                (Some(_), None) => true,
            };
            if changed {
                state.previous_frame = hash;
            }
            changed
        };

        if let Ok(mut metrics) = this.metrics.lock() {
            metrics.record_tick(aggregate.len());
            if changed {
                metrics.record_frame_change();
            }
        }

        for (callback, payload) in callbacks {
            callback(payload);
        }
        if changed {
            if let Some(on_proximity) = &options.on_proximity {
                on_proximity(&aggregate);
            }
        }
        this.maybe_emit_metrics();
    }

    fn resize_event(&self) {
        let fired = {
            let mut state = self.lock_state();
            if !state.active || state.overlays.is_empty() {
                return;
            }
            let viewport = self.document.viewport();
            state.resize_gate.offer(self.clock.now(), viewport)
        };
        if fired.is_some() {
            self.rebuild_overlays();
        }
    }

    fn rebuild_overlays(&self) {
        let mut state = self.lock_state();
        if !state.active {
            return;
        }
        overlay::remove_overlays(&self.document, &state.overlays);
        state.overlays = overlay::build_overlays(&self.document, &state.resolved);
        self.log(
            &state.options,
            LogLevel::Debug,
            "overlays_rebuilt",
            [json_kv("count", json!(state.overlays.len()))],
        );
        drop(state);
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_overlay_rebuild();
        }
    }

    fn scroll_event(&self, source: ElementId) {
        let fired = {
            let mut state = self.lock_state();
            if !state.active {
                return;
            }
            let now = self.clock.now();
            state
                .scroll_gates
                .values_mut()
                .find(|(element, _)| *element == source)
                .is_some_and(|(_, gate)| gate.offer(now, ()).is_some())
        };
        if fired {
            self.reposition_for(source);
        }
    }

    /// Reposition only the overlays scoped to the scrolled element, matching
    /// its contextUID marker against each overlay's cached uid.
    fn reposition_for(&self, source: ElementId) {
        let Some(uid) = self.document.attribute(source, CONTEXT_UID_ATTR) else {
            return;
        };
        let state = self.lock_state();
        if !state.active {
            return;
        }
        overlay::reposition_overlays(&self.document, &state.overlays, &state.resolved, &uid);
    }

    fn poll_deferred(this: &Arc<Self>) {
        let now = this.clock.now();
        let (pointer, resize, scrolls) = {
            let mut state = this.lock_state();
            if !state.active {
                return;
            }
            let pointer = state.pointer_gate.poll(now);
            let resize = state.resize_gate.poll(now);
            let mut scrolls = Vec::new();
            for (element, gate) in state.scroll_gates.values_mut() {
                if gate.poll(now).is_some() {
                    scrolls.push(*element);
                }
            }
            (pointer, resize, scrolls)
        };
        if let Some(cursor) = pointer {
            SessionCore::run_tick(this, cursor);
        }
        if resize.is_some() {
            this.rebuild_overlays();
        }
        for element in scrolls {
            this.reposition_for(element);
        }
        this.maybe_emit_metrics();
    }

    fn maybe_emit_metrics(&self) {
        let logger = {
            let mut state = self.lock_state();
            let interval = state.options.metrics_interval_ms;
            if interval == 0 || state.options.logger.is_none() {
                return;
            }
            let now = self.clock.now();
            if let Some(last) = state.last_metrics_emit {
                if now.duration_since(last) < Duration::from_millis(interval) {
                    return;
                }
            }
            state.last_metrics_emit = Some(now);
            state.options.logger.clone()
        };
        if let Some(logger) = logger {
            let _ = logger.log_event(self.metrics_snapshot().to_log_event(METRICS_TARGET));
        }
    }

    fn metrics_snapshot(&self) -> MetricSnapshot {
        let uptime = self.clock.now().duration_since(self.created);
        match self.metrics.lock() {
            Ok(metrics) => metrics.snapshot(uptime),
            Err(_) => SessionMetrics::new().snapshot(uptime),
        }
    }

    fn log(
        &self,
        options: &SessionOptions,
        level: LogLevel,
        message: &str,
        fields: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) {
        if let Some(logger) = options.logger.as_ref() {
            let _ = logger.log_event(event_with_fields(level, LOG_TARGET, message, fields));
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().expect("session state poisoned")
    }
}

fn frame_hash(aggregate: &[ProximityResult]) -> Option<blake3::Hash> {
    serde_json::to_vec(aggregate)
        .ok()
        .map(|bytes| blake3::hash(&bytes))
}
