use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated over a session's lifetime.
#[derive(Debug, Default, Clone)]
pub struct SessionMetrics {
    pointer_events: u64,
    ticks: u64,
    evaluations: u64,
    frame_changes: u64,
    boots: u64,
    reboots: u64,
    kills: u64,
    overlay_rebuilds: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pointer_event(&mut self) {
        self.pointer_events = self.pointer_events.saturating_add(1);
    }

    pub fn record_tick(&mut self, evaluated: usize) {
        self.ticks = self.ticks.saturating_add(1);
        self.evaluations = self.evaluations.saturating_add(evaluated as u64);
    }

    pub fn record_frame_change(&mut self) {
        self.frame_changes = self.frame_changes.saturating_add(1);
    }

    pub fn record_boot(&mut self) {
        self.boots = self.boots.saturating_add(1);
    }

    pub fn record_reboot(&mut self) {
        self.reboots = self.reboots.saturating_add(1);
    }

    pub fn record_kill(&mut self) {
        self.kills = self.kills.saturating_add(1);
    }

    pub fn record_overlay_rebuild(&mut self) {
        self.overlay_rebuilds = self.overlay_rebuilds.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            pointer_events: self.pointer_events,
            ticks: self.ticks,
            evaluations: self.evaluations,
            frame_changes: self.frame_changes,
            boots: self.boots,
            reboots: self.reboots,
            kills: self.kills,
            overlay_rebuilds: self.overlay_rebuilds,
        }
    }
}

/// Point-in-time view of the session counters.
#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub pointer_events: u64,
    pub ticks: u64,
    pub evaluations: u64,
    pub frame_changes: u64,
    pub boots: u64,
    pub reboots: u64,
    pub kills: u64,
    pub overlay_rebuilds: u64,
}

impl MetricSnapshot {
    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("pointer_events".to_string(), json!(self.pointer_events));
        map.insert("ticks".to_string(), json!(self.ticks));
        map.insert("evaluations".to_string(), json!(self.evaluations));
        map.insert("frame_changes".to_string(), json!(self.frame_changes));
        map.insert("boots".to_string(), json!(self.boots));
        map.insert("reboots".to_string(), json!(self.reboots));
        map.insert("kills".to_string(), json!(self.kills));
        map.insert("overlay_rebuilds".to_string(), json!(self.overlay_rebuilds));
        map
    }

    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(
            LogLevel::Info,
            target.to_string(),
            "session_metrics".to_string(),
            self.as_fields(),
        )
    }
}
