use crate::TrackerResult;
use crate::collector::{Collector, PassReport};
use crate::config::{DEBUG_STATS, TrackerConfig};
use crate::error::TrackerError;
use crate::notification::{Notification, NotificationQueue};
use crate::object::{ObjectData, ObjectId, TrackedObject};
use crate::reference::{SlotId, SlotState, Strength};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct Tracker {
    collector: Arc<RwLock<Collector>>,
    notifications: Arc<NotificationQueue>,
    pass_lock: Mutex<()>,
    pass_active: AtomicBool,
    enabled: bool,
    config: TrackerConfig,
}

// Clears the pass flag even if the pass returns early.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        let mut collector = Collector::new();
        collector.set_debug_flags(config.debug_flags);

        Self {
            collector: Arc::new(RwLock::new(collector)),
            notifications: Arc::new(NotificationQueue::new()),
            pass_lock: Mutex::new(()),
            pass_active: AtomicBool::new(false),
            enabled: true,
            config,
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    fn ensure_no_pass(&self) -> TrackerResult<()> {
        if self.pass_active.load(Ordering::Acquire) {
            return Err(TrackerError::PassInProgress);
        }
        Ok(())
    }

    pub fn register(&self, data: ObjectData) -> TrackerResult<ObjectId> {
        self.register_named("", data)
    }

    pub fn register_named(&self, name: &str, data: ObjectData) -> TrackerResult<ObjectId> {
        self.ensure_no_pass()?;
        self.collector.write().register(name.to_string(), data)
    }

    pub fn add_edge(
        &self,
        source: ObjectId,
        target: ObjectId,
        strength: Strength,
    ) -> TrackerResult<SlotId> {
        self.ensure_no_pass()?;
        self.collector.write().add_edge(source, target, strength)
    }

    pub fn remove_edge(&self, slot: SlotId) -> TrackerResult<()> {
        self.ensure_no_pass()?;
        self.collector.write().remove_edge(slot).map(|_| ())
    }

    /// Remove an object immediately, outside of any pass. Slots that point
    /// at it are resolved by the next pass.
    pub fn remove_object(&self, id: ObjectId) -> TrackerResult<TrackedObject> {
        self.ensure_no_pass()?;
        self.collector.write().remove_object(id)
    }

    pub fn clear_slot(&self, slot: SlotId) -> TrackerResult<()> {
        self.ensure_no_pass()?;
        self.collector.write().clear_slot(slot)
    }

    pub fn bind(&self, name: &str, id: ObjectId) -> TrackerResult<Option<ObjectId>> {
        self.ensure_no_pass()?;
        self.collector.write().bind(name, id)
    }

    pub fn unbind(&self, name: &str) -> TrackerResult<Option<ObjectId>> {
        self.ensure_no_pass()?;
        self.collector.write().unbind(name)
    }

    pub fn read_slot(&self, slot: SlotId) -> TrackerResult<Option<ObjectId>> {
        self.collector.read().read_slot(slot)
    }

    pub fn slot_state(&self, slot: SlotId) -> TrackerResult<SlotState> {
        self.collector.read().slot_state(slot)
    }

    pub fn payload(&self, id: ObjectId) -> TrackerResult<ObjectData> {
        self.collector.read().payload(id).cloned()
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.collector.read().is_live(id)
    }

    pub fn object_count(&self) -> usize {
        self.collector.read().graph().object_count()
    }

    pub fn run_pass(&self, memory_pressure: bool) -> TrackerResult<PassReport> {
        if !self.enabled {
            return Ok(PassReport::empty(memory_pressure));
        }

        let _serial = self.pass_lock.lock();
        self.pass_active.store(true, Ordering::Release);
        let _active = PassGuard(&self.pass_active);

        let report = {
            let mut collector = self.collector.write();
            collector.run_pass(memory_pressure, &self.notifications)?
        };

        debug!(
            "pass reclaimed {} object(s), cleared {} slot(s), notified {} in {:?}",
            report.reclaimed.len(),
            report.cleared,
            report.notified.len(),
            report.elapsed
        );
        if self.config.debug_flags & DEBUG_STATS != 0 {
            info!("tracker stats after pass: {:?}", self.get_stats());
        }

        Ok(report)
    }

    pub fn under_memory_pressure(&self) -> bool {
        self.collector.read().graph().live_bytes() >= self.config.pressure_threshold_bytes
    }

    /// Run a pass, treating the tracker as under memory pressure once the
    /// estimated live payload reaches the configured threshold.
    pub fn collect(&self) -> TrackerResult<PassReport> {
        let pressure = self.under_memory_pressure();
        self.run_pass(pressure)
    }

    pub fn needs_collection(&self) -> bool {
        self.collector.read().registered_since_pass() >= self.config.registration_threshold
    }

    pub fn collect_if_needed(&self) -> TrackerResult<Option<PassReport>> {
        if !self.enabled || !self.needs_collection() {
            return Ok(None);
        }
        self.collect().map(Some)
    }

    pub fn drain_all(&self) -> Vec<Notification> {
        self.notifications.drain_all()
    }

    pub fn poll(&self) -> Option<Notification> {
        self.notifications.poll()
    }

    /// Handle for a consumer that drains notifications on its own schedule.
    pub fn notifications(&self) -> Arc<NotificationQueue> {
        Arc::clone(&self.notifications)
    }

    pub fn get_stats(&self) -> crate::TrackerStats {
        self.collector.read().get_stats()
    }

    pub fn set_debug(&mut self, flags: u32) {
        self.config.debug_flags = flags;
        self.collector.write().set_debug_flags(flags);
    }

    pub fn get_debug(&self) -> u32 {
        self.config.debug_flags
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

pub mod global {
    use super::*;
    use std::sync::OnceLock;

    static TRACKER: OnceLock<Tracker> = OnceLock::new();

    pub fn get_tracker() -> &'static Tracker {
        TRACKER.get_or_init(|| Tracker::with_config(TrackerConfig::from_env()))
    }

    pub fn register(data: ObjectData) -> TrackerResult<ObjectId> {
        get_tracker().register(data)
    }

    pub fn bind(name: &str, id: ObjectId) -> TrackerResult<Option<ObjectId>> {
        get_tracker().bind(name, id)
    }

    pub fn unbind(name: &str) -> TrackerResult<Option<ObjectId>> {
        get_tracker().unbind(name)
    }

    pub fn collect() -> TrackerResult<PassReport> {
        get_tracker().collect()
    }

    pub fn drain_all() -> Vec<Notification> {
        get_tracker().drain_all()
    }

    pub fn get_stats() -> crate::TrackerStats {
        get_tracker().get_stats()
    }
}
