use crate::TrackerResult;
use crate::error::TrackerError;
use crate::object::{ObjectData, ObjectId, TrackedObject};
use crate::reference::{ReferenceSlot, SlotId, Strength};
use crate::roots::RootSet;
use std::collections::{HashMap, HashSet, VecDeque};

/// Arena of tracked objects plus the table of slots between them.
#[derive(Debug)]
pub struct ReachabilityGraph {
    objects: HashMap<ObjectId, TrackedObject>,

    slots: HashMap<SlotId, ReferenceSlot>,

    // Slots pointing at an object. Entries survive the target's removal so
    // the next pass can resolve dangling slots.
    incoming: HashMap<ObjectId, Vec<SlotId>>,

    next_object: u64,
    next_slot: u64,
}

impl ReachabilityGraph {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            slots: HashMap::new(),
            incoming: HashMap::new(),
            next_object: 1,
            next_slot: 1,
        }
    }

    pub fn register(&mut self, name: String, data: ObjectData) -> ObjectId {
        let id = ObjectId::from_raw(self.next_object);
        self.next_object += 1;
        self.objects.insert(id, TrackedObject::new(id, name, data));
        id
    }

    pub fn add_edge(
        &mut self,
        source: ObjectId,
        target: ObjectId,
        strength: Strength,
    ) -> TrackerResult<SlotId> {
        if !self.objects.contains_key(&target) {
            return Err(TrackerError::UnknownObject(target));
        }
        let source_obj = self
            .objects
            .get_mut(&source)
            .ok_or(TrackerError::UnknownObject(source))?;

        let slot_id = SlotId::from_raw(self.next_slot);
        self.next_slot += 1;

        source_obj.outgoing.push(slot_id);
        self.incoming.entry(target).or_default().push(slot_id);
        self.slots
            .insert(slot_id, ReferenceSlot::new(slot_id, source, target, strength));

        Ok(slot_id)
    }

    pub fn remove_edge(&mut self, slot_id: SlotId) -> TrackerResult<ReferenceSlot> {
        let slot = self
            .slots
            .remove(&slot_id)
            .ok_or(TrackerError::UnknownSlot(slot_id))?;

        if let Some(source) = self.objects.get_mut(&slot.source) {
            source.outgoing.retain(|id| *id != slot_id);
        }
        self.unlink_incoming(slot.target, slot_id);

        Ok(slot)
    }

    /// Remove `id` and every slot it owns. Slots targeting it stay behind,
    /// dangling, until a pass resolves them.
    pub fn remove_object(&mut self, id: ObjectId) -> TrackerResult<TrackedObject> {
        let obj = self
            .objects
            .remove(&id)
            .ok_or(TrackerError::UnknownObject(id))?;

        for slot_id in &obj.outgoing {
            if let Some(slot) = self.slots.remove(slot_id) {
                self.unlink_incoming(slot.target, *slot_id);
            }
        }

        Ok(obj)
    }

    fn unlink_incoming(&mut self, target: ObjectId, slot_id: SlotId) {
        if let Some(refs) = self.incoming.get_mut(&target) {
            refs.retain(|id| *id != slot_id);
            if refs.is_empty() {
                self.incoming.remove(&target);
            }
        }
    }

    /// Objects reachable from `roots` through slots that keep their target
    /// alive under the given pressure. Each object is visited once.
    pub fn compute_reachable(&self, roots: &RootSet, memory_pressure: bool) -> HashSet<ObjectId> {
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::new();

        for root_id in roots.object_ids() {
            if self.objects.contains_key(&root_id) && reachable.insert(root_id) {
                queue.push_back(root_id);
            }
        }

        while let Some(current_id) = queue.pop_front() {
            let Some(current) = self.objects.get(&current_id) else {
                continue;
            };

            for slot_id in &current.outgoing {
                let Some(slot) = self.slots.get(slot_id) else {
                    continue;
                };
                if !slot.strength().keeps_alive(memory_pressure) {
                    continue;
                }
                if self.objects.contains_key(&slot.target) && reachable.insert(slot.target) {
                    queue.push_back(slot.target);
                }
            }
        }

        reachable
    }

    pub fn find_unreachable(&self, roots: &RootSet, memory_pressure: bool) -> HashSet<ObjectId> {
        let reachable = self.compute_reachable(roots, memory_pressure);
        self.objects
            .keys()
            .filter(|id| !reachable.contains(id))
            .copied()
            .collect()
    }

    /// Slots whose target is no longer registered and which have not been
    /// resolved yet.
    pub fn dangling_slots(&self) -> Vec<SlotId> {
        self.incoming
            .iter()
            .filter(|(target, _)| !self.objects.contains_key(target))
            .flat_map(|(_, refs)| refs.iter().copied())
            .filter(|slot_id| self.slots.get(slot_id).is_some_and(|s| s.is_pending()))
            .collect()
    }

    pub fn slots_to(&self, id: ObjectId) -> &[SlotId] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn slots_from(&self, id: ObjectId) -> &[SlotId] {
        self.objects
            .get(&id)
            .map(|obj| obj.outgoing())
            .unwrap_or_default()
    }

    pub fn get_object(&self, id: &ObjectId) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get_slot(&self, slot_id: &SlotId) -> Option<&ReferenceSlot> {
        self.slots.get(slot_id)
    }

    pub(crate) fn get_slot_mut(&mut self, slot_id: &SlotId) -> Option<&mut ReferenceSlot> {
        self.slots.get_mut(slot_id)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_counts_by_strength(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for slot in self.slots.values() {
            counts[slot.strength().index()] += 1;
        }
        counts
    }

    pub fn live_bytes(&self) -> usize {
        self.objects.values().map(TrackedObject::size_hint).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for ReachabilityGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(n: usize) -> (ReachabilityGraph, Vec<ObjectId>) {
        let mut graph = ReachabilityGraph::new();
        let ids = (0..n)
            .map(|i| graph.register(format!("obj{i}"), ObjectData::Integer(i as i64)))
            .collect();
        (graph, ids)
    }

    fn rooted(id: ObjectId) -> RootSet {
        let mut roots = RootSet::new();
        roots.bind("root", id);
        roots
    }

    #[test]
    fn test_graph_creation() {
        let graph = ReachabilityGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.slot_count(), 0);
    }

    #[test]
    fn test_add_edge_unknown_object() {
        let (mut graph, ids) = graph_with(1);
        let missing = ObjectId::from_raw(99);

        assert_eq!(
            graph.add_edge(ids[0], missing, Strength::Strong),
            Err(TrackerError::UnknownObject(missing))
        );
        assert_eq!(
            graph.add_edge(missing, ids[0], Strength::Weak),
            Err(TrackerError::UnknownObject(missing))
        );
        assert_eq!(graph.slot_count(), 0);
    }

    #[test]
    fn test_strong_chain_reachable() {
        let (mut graph, ids) = graph_with(3);
        graph.add_edge(ids[0], ids[1], Strength::Strong).unwrap();
        graph.add_edge(ids[1], ids[2], Strength::Strong).unwrap();

        let reachable = graph.compute_reachable(&rooted(ids[0]), false);
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn test_weak_never_traversed() {
        let (mut graph, ids) = graph_with(2);
        graph.add_edge(ids[0], ids[1], Strength::Weak).unwrap();

        for pressure in [false, true] {
            let reachable = graph.compute_reachable(&rooted(ids[0]), pressure);
            assert!(!reachable.contains(&ids[1]));
        }
    }

    #[test]
    fn test_phantom_never_traversed() {
        let (mut graph, ids) = graph_with(2);
        graph.add_edge(ids[0], ids[1], Strength::Phantom).unwrap();

        let reachable = graph.compute_reachable(&rooted(ids[0]), false);
        assert!(!reachable.contains(&ids[1]));
    }

    #[test]
    fn test_soft_depends_on_pressure() {
        let (mut graph, ids) = graph_with(3);
        graph.add_edge(ids[0], ids[1], Strength::Soft).unwrap();
        graph.add_edge(ids[1], ids[2], Strength::Strong).unwrap();

        let relaxed = graph.compute_reachable(&rooted(ids[0]), false);
        assert!(relaxed.contains(&ids[1]));
        assert!(relaxed.contains(&ids[2]));

        let pressured = graph.compute_reachable(&rooted(ids[0]), true);
        assert_eq!(pressured.len(), 1);
    }

    #[test]
    fn test_cycle_visited_once() {
        let (mut graph, ids) = graph_with(3);
        graph.add_edge(ids[0], ids[1], Strength::Strong).unwrap();
        graph.add_edge(ids[1], ids[2], Strength::Strong).unwrap();
        graph.add_edge(ids[2], ids[0], Strength::Strong).unwrap();
        graph.add_edge(ids[2], ids[1], Strength::Strong).unwrap();

        let reachable = graph.compute_reachable(&rooted(ids[1]), false);
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn test_unrooted_cycle_unreachable() {
        let (mut graph, ids) = graph_with(3);
        graph.add_edge(ids[1], ids[2], Strength::Strong).unwrap();
        graph.add_edge(ids[2], ids[1], Strength::Strong).unwrap();

        let unreachable = graph.find_unreachable(&rooted(ids[0]), false);
        assert_eq!(unreachable, HashSet::from([ids[1], ids[2]]));
    }

    #[test]
    fn test_insertion_order_independent() {
        let edges = [
            (0, 1, Strength::Strong),
            (1, 2, Strength::Soft),
            (2, 3, Strength::Strong),
            (0, 4, Strength::Weak),
            (3, 5, Strength::Phantom),
            (4, 5, Strength::Strong),
            (3, 0, Strength::Strong),
        ];

        let build = |order: &[usize], pressure: bool| {
            let (mut graph, ids) = graph_with(6);
            for &i in order {
                let (from, to, strength) = edges[i];
                graph.add_edge(ids[from], ids[to], strength).unwrap();
            }
            let reachable = graph.compute_reachable(&rooted(ids[0]), pressure);
            let mut positions: Vec<usize> = reachable
                .iter()
                .map(|id| ids.iter().position(|x| x == id).unwrap())
                .collect();
            positions.sort_unstable();
            positions
        };

        let forward: Vec<usize> = (0..edges.len()).collect();
        let reverse: Vec<usize> = (0..edges.len()).rev().collect();
        let shuffled = vec![3, 6, 0, 5, 2, 4, 1];

        for pressure in [false, true] {
            let expected = build(&forward, pressure);
            assert_eq!(build(&reverse, pressure), expected);
            assert_eq!(build(&shuffled, pressure), expected);
        }
        assert_eq!(build(&forward, false), vec![0, 1, 2, 3]);
        assert_eq!(build(&forward, true), vec![0, 1]);
    }

    #[test]
    fn test_remove_object_leaves_dangling_incoming() {
        let (mut graph, ids) = graph_with(3);
        let weak = graph.add_edge(ids[0], ids[1], Strength::Weak).unwrap();
        graph.add_edge(ids[1], ids[2], Strength::Strong).unwrap();

        let removed = graph.remove_object(ids[1]).unwrap();
        assert_eq!(removed.id, ids[1]);
        assert!(!graph.contains(&ids[1]));

        // Owned slot is gone, the slot pointing at the removed object is not.
        assert_eq!(graph.slot_count(), 1);
        assert!(graph.slots_to(ids[2]).is_empty());
        assert_eq!(graph.dangling_slots(), vec![weak]);
    }

    #[test]
    fn test_remove_edge() {
        let (mut graph, ids) = graph_with(2);
        let slot = graph.add_edge(ids[0], ids[1], Strength::Strong).unwrap();

        assert!(graph.remove_edge(slot).is_ok());
        assert!(graph.slots_from(ids[0]).is_empty());
        assert!(graph.slots_to(ids[1]).is_empty());
        assert_eq!(
            graph.remove_edge(slot).unwrap_err(),
            TrackerError::UnknownSlot(slot)
        );
    }

    #[test]
    fn test_missing_root_skipped() {
        let (graph, _) = graph_with(1);
        let reachable = graph.compute_reachable(&rooted(ObjectId::from_raw(42)), false);
        assert!(reachable.is_empty());
    }

    #[test]
    fn test_slot_counts_by_strength() {
        let (mut graph, ids) = graph_with(2);
        for strength in Strength::ALL {
            graph.add_edge(ids[0], ids[1], strength).unwrap();
        }
        graph.add_edge(ids[1], ids[0], Strength::Strong).unwrap();

        assert_eq!(graph.slot_counts_by_strength(), [2, 1, 1, 1]);
    }
}
