use crate::TrackerResult;
use crate::config::{DEBUG_NOTIFY, DEBUG_RECLAIMED};
use crate::error::TrackerError;
use crate::notification::NotificationQueue;
use crate::object::{ObjectData, ObjectId, TrackedObject};
use crate::reference::{ReferenceSlot, SlotId, SlotState, Strength};
use crate::roots::RootSet;
use crate::traversal::ReachabilityGraph;
use log::{debug, error, trace, warn};
use std::collections::{BTreeSet, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Scanning,
    Reclaiming,
    NotifyingPhantoms,
}

/// Outcome of one reachability pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub reclaimed: BTreeSet<ObjectId>,
    pub notified: BTreeSet<ObjectId>,
    /// Soft and weak slots cleared by this pass.
    pub cleared: usize,
    pub memory_pressure: bool,
    pub timestamp: Instant,
    pub elapsed: Duration,
}

impl PassReport {
    pub(crate) fn empty(memory_pressure: bool) -> Self {
        Self {
            reclaimed: BTreeSet::new(),
            notified: BTreeSet::new(),
            cleared: 0,
            memory_pressure,
            timestamp: Instant::now(),
            elapsed: Duration::ZERO,
        }
    }
}

// Everything a pass will do, worked out before anything is mutated.
#[derive(Debug, Default)]
pub(crate) struct PassPlan {
    pub(crate) reclaim: BTreeSet<ObjectId>,
    pub(crate) clear: Vec<SlotId>,
    pub(crate) enqueue: Vec<SlotId>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CollectorTotals {
    pub passes: usize,
    pub reclaimed: usize,
    pub notified: usize,
    pub cleared: usize,
}

#[derive(Debug)]
pub struct Collector {
    pub(crate) graph: ReachabilityGraph,
    pub(crate) roots: RootSet,
    pub(crate) totals: CollectorTotals,
    pub(crate) registered_since_pass: usize,
    pub(crate) debug_flags: u32,
    state: PassState,
}

impl Collector {
    pub fn new() -> Self {
        Self {
            graph: ReachabilityGraph::new(),
            roots: RootSet::new(),
            totals: CollectorTotals::default(),
            registered_since_pass: 0,
            debug_flags: 0,
            state: PassState::Idle,
        }
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn graph(&self) -> &ReachabilityGraph {
        &self.graph
    }

    pub fn roots(&self) -> &RootSet {
        &self.roots
    }

    pub fn totals(&self) -> CollectorTotals {
        self.totals
    }

    pub fn registered_since_pass(&self) -> usize {
        self.registered_since_pass
    }

    fn ensure_idle(&self) -> TrackerResult<()> {
        if self.state != PassState::Idle {
            return Err(TrackerError::PassInProgress);
        }
        Ok(())
    }

    fn transition(&mut self, next: PassState) {
        trace!("pass state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn register(&mut self, name: String, data: ObjectData) -> TrackerResult<ObjectId> {
        self.ensure_idle()?;
        let id = self.graph.register(name, data);
        self.registered_since_pass += 1;
        debug!("registered object {id}");
        Ok(id)
    }

    pub fn add_edge(
        &mut self,
        source: ObjectId,
        target: ObjectId,
        strength: Strength,
    ) -> TrackerResult<SlotId> {
        self.ensure_idle()?;
        let slot = self.graph.add_edge(source, target, strength)?;
        debug!("{slot}: {source} -{strength:?}-> {target}");
        Ok(slot)
    }

    pub fn remove_edge(&mut self, slot: SlotId) -> TrackerResult<ReferenceSlot> {
        self.ensure_idle()?;
        self.graph.remove_edge(slot)
    }

    pub fn remove_object(&mut self, id: ObjectId) -> TrackerResult<TrackedObject> {
        self.ensure_idle()?;
        let obj = self.graph.remove_object(id)?;

        let names = self.roots.unbind_object(id);
        if !names.is_empty() {
            warn!("removed object {id} was still bound as root {names:?}");
        }

        debug!("removed object {id}");
        Ok(obj)
    }

    /// Explicitly clear a slot. This is the only way a phantom slot ever
    /// reaches the cleared state.
    pub fn clear_slot(&mut self, slot_id: SlotId) -> TrackerResult<()> {
        self.ensure_idle()?;
        self.graph
            .get_slot_mut(&slot_id)
            .ok_or(TrackerError::UnknownSlot(slot_id))?
            .clear();
        Ok(())
    }

    pub fn bind(&mut self, name: &str, id: ObjectId) -> TrackerResult<Option<ObjectId>> {
        self.ensure_idle()?;
        if !self.graph.contains(&id) {
            return Err(TrackerError::UnknownObject(id));
        }
        Ok(self.roots.bind(name, id))
    }

    pub fn unbind(&mut self, name: &str) -> TrackerResult<Option<ObjectId>> {
        self.ensure_idle()?;
        Ok(self.roots.unbind(name))
    }

    pub fn read_slot(&self, slot_id: SlotId) -> TrackerResult<Option<ObjectId>> {
        self.graph
            .get_slot(&slot_id)
            .map(ReferenceSlot::read)
            .ok_or(TrackerError::UnknownSlot(slot_id))
    }

    pub fn slot_state(&self, slot_id: SlotId) -> TrackerResult<SlotState> {
        self.graph
            .get_slot(&slot_id)
            .map(ReferenceSlot::state)
            .ok_or(TrackerError::UnknownSlot(slot_id))
    }

    pub fn payload(&self, id: ObjectId) -> TrackerResult<&ObjectData> {
        self.graph
            .get_object(&id)
            .map(|obj| &obj.data)
            .ok_or(TrackerError::UnknownObject(id))
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.graph.contains(&id)
    }

    pub fn run_pass(
        &mut self,
        memory_pressure: bool,
        queue: &NotificationQueue,
    ) -> TrackerResult<PassReport> {
        self.ensure_idle()?;
        let started = Instant::now();

        self.transition(PassState::Scanning);
        let unreachable = self.graph.find_unreachable(&self.roots, memory_pressure);

        let plan = self.plan(unreachable);
        if let Err(err) = self.check_plan(&plan) {
            error!("aborting pass: {err}");
            self.transition(PassState::Idle);
            return Err(err);
        }

        self.transition(PassState::Reclaiming);
        let cleared = self.reclaim(&plan);

        self.transition(PassState::NotifyingPhantoms);
        let timestamp = Instant::now();
        let notified = self.notify(&plan, queue, timestamp);

        self.transition(PassState::Idle);

        self.registered_since_pass = 0;
        self.totals.passes += 1;
        self.totals.reclaimed += plan.reclaim.len();
        self.totals.notified += notified.len();
        self.totals.cleared += cleared;

        Ok(PassReport {
            reclaimed: plan.reclaim,
            notified,
            cleared,
            memory_pressure,
            timestamp,
            elapsed: started.elapsed(),
        })
    }

    fn plan(&self, unreachable: HashSet<ObjectId>) -> PassPlan {
        let mut plan = PassPlan {
            reclaim: unreachable.into_iter().collect(),
            ..PassPlan::default()
        };

        let mut resolving: Vec<SlotId> = plan
            .reclaim
            .iter()
            .flat_map(|id| self.graph.slots_to(*id).iter().copied())
            .collect();
        resolving.extend(self.graph.dangling_slots());
        resolving.sort_unstable();
        resolving.dedup();

        for slot_id in resolving {
            let Some(slot) = self.graph.get_slot(&slot_id) else {
                continue;
            };
            // Slots die with their source.
            if !slot.is_pending() || plan.reclaim.contains(&slot.source) {
                continue;
            }
            match slot.strength() {
                Strength::Soft | Strength::Weak => plan.clear.push(slot_id),
                Strength::Phantom => plan.enqueue.push(slot_id),
                // A strong slot from a surviving source keeps its target
                // reachable, so only dangling strong slots get here.
                Strength::Strong => {}
            }
        }

        plan
    }

    pub(crate) fn check_plan(&self, plan: &PassPlan) -> TrackerResult<()> {
        for id in &plan.reclaim {
            if self.roots.contains_object(*id) {
                return Err(TrackerError::RootStillLive(*id));
            }
            if !self.graph.contains(id) {
                return Err(TrackerError::Internal(format!(
                    "planned reclamation of unregistered object {id}"
                )));
            }
        }
        Ok(())
    }

    fn reclaim(&mut self, plan: &PassPlan) -> usize {
        for slot_id in &plan.clear {
            if let Some(slot) = self.graph.get_slot_mut(slot_id) {
                slot.clear();
            }
        }

        // check_plan verified every id is registered.
        for id in &plan.reclaim {
            if let Ok(obj) = self.graph.remove_object(*id) {
                if self.debug_flags & DEBUG_RECLAIMED != 0 {
                    debug!("reclaimed {} {:?} ({} bytes)", obj.id, obj.name, obj.size_hint());
                }
            }
        }

        plan.clear.len()
    }

    fn notify(
        &mut self,
        plan: &PassPlan,
        queue: &NotificationQueue,
        timestamp: Instant,
    ) -> BTreeSet<ObjectId> {
        let mut notified = BTreeSet::new();

        for slot_id in &plan.enqueue {
            let Some(slot) = self.graph.get_slot_mut(slot_id) else {
                continue;
            };
            slot.mark_enqueued();
            notified.insert(slot.target);
        }

        for id in &notified {
            if self.debug_flags & DEBUG_NOTIFY != 0 {
                debug!("phantom notification for {id}");
            }
            queue.enqueue(*id, timestamp);
        }

        notified
    }

    pub fn get_stats(&self) -> crate::TrackerStats {
        crate::TrackerStats {
            passes: self.totals.passes,
            reclaimed: self.totals.reclaimed,
            notified: self.totals.notified,
            cleared: self.totals.cleared,
            live_objects: self.graph.object_count(),
            live_bytes: self.graph.live_bytes(),
            roots: self.roots.len(),
            slot_counts: self.graph.slot_counts_by_strength(),
        }
    }

    pub fn set_debug_flags(&mut self, flags: u32) {
        self.debug_flags = flags;
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: PassState) {
        self.state = state;
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}
