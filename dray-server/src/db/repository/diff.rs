//! Pure child-diff helpers for aggregate updates
//!
//! Incoming children are classified against the persisted set by id
//! presence: no id → insert, known id → update, persisted id missing from
//! the incoming set → delete. Sequenced children are renumbered
//! contiguously from 0 in incoming order.

use crate::db::models::{
    AdditionalCharge, ShipmentComment, ShipmentCommodity, ShipmentMove, Stop,
};

/// Anything diffable by id.
pub trait HasId {
    fn entity_id(&self) -> &str;
}

macro_rules! impl_has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn entity_id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_has_id!(ShipmentMove, Stop, ShipmentCommodity, AdditionalCharge, ShipmentComment);

/// Index classification of an incoming child set against the persisted one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChildDiff {
    /// Indices into the incoming slice that must be inserted
    pub inserts: Vec<usize>,
    /// Indices into the incoming slice that must be CAS-updated
    pub updates: Vec<usize>,
    /// Persisted ids with no incoming counterpart
    pub delete_ids: Vec<String>,
}

impl ChildDiff {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.delete_ids.is_empty()
    }
}

/// Classify incoming children against the persisted set.
pub fn diff_children<T: HasId>(existing: &[T], incoming: &[T]) -> ChildDiff {
    let mut diff = ChildDiff::default();

    for (idx, child) in incoming.iter().enumerate() {
        let id = child.entity_id();
        if id.is_empty() {
            diff.inserts.push(idx);
        } else if existing.iter().any(|e| e.entity_id() == id) {
            diff.updates.push(idx);
        } else {
            // id supplied by the caller but unknown to us: treat as insert
            diff.inserts.push(idx);
        }
    }

    for persisted in existing {
        let id = persisted.entity_id();
        if !incoming.iter().any(|c| c.entity_id() == id) {
            diff.delete_ids.push(id.to_string());
        }
    }

    diff
}

/// Renumber a sequenced child set contiguously from 0 in slice order.
/// Returns the indices whose sequence actually changed.
pub fn resequence_moves(moves: &mut [ShipmentMove]) -> Vec<usize> {
    let mut changed = Vec::new();
    for (i, mv) in moves.iter_mut().enumerate() {
        if mv.sequence != i as i32 {
            mv.sequence = i as i32;
            changed.push(i);
        }
    }
    changed
}

/// Same as [`resequence_moves`] for stops.
pub fn resequence_stops(stops: &mut [Stop]) -> Vec<usize> {
    let mut changed = Vec::new();
    for (i, stop) in stops.iter_mut().enumerate() {
        if stop.sequence != i as i32 {
            stop.sequence = i as i32;
            changed.push(i);
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(id: &str, seq: i32) -> ShipmentMove {
        ShipmentMove {
            id: id.to_string(),
            sequence: seq,
            ..ShipmentMove::default()
        }
    }

    #[test]
    fn classifies_by_id_presence() {
        let existing = vec![mv("smv_a", 0), mv("smv_b", 1), mv("smv_c", 2)];
        let incoming = vec![mv("smv_a", 0), mv("", 1), mv("smv_c", 2)];

        let diff = diff_children(&existing, &incoming);

        assert_eq!(diff.updates, vec![0, 2]);
        assert_eq!(diff.inserts, vec![1]);
        assert_eq!(diff.delete_ids, vec!["smv_b".to_string()]);
    }

    #[test]
    fn unknown_supplied_id_is_an_insert() {
        let existing = vec![mv("smv_a", 0)];
        let incoming = vec![mv("smv_a", 0), mv("smv_imported", 1)];
        let diff = diff_children(&existing, &incoming);
        assert_eq!(diff.inserts, vec![1]);
        assert!(diff.delete_ids.is_empty());
    }

    #[test]
    fn empty_incoming_deletes_everything() {
        let existing = vec![mv("smv_a", 0), mv("smv_b", 1)];
        let diff = diff_children(&existing, &[]);
        assert_eq!(diff.delete_ids.len(), 2);
        assert!(diff.is_empty() == false);
    }

    #[test]
    fn deleting_an_intermediate_move_resequences_the_tail() {
        // persisted 0,1,2 — the middle one was removed by the caller
        let mut survivors = vec![mv("smv_a", 0), mv("smv_c", 2)];
        let changed = resequence_moves(&mut survivors);
        assert_eq!(survivors[1].sequence, 1);
        assert_eq!(changed, vec![1]);
    }

    #[test]
    fn already_contiguous_is_untouched() {
        let mut moves = vec![mv("smv_a", 0), mv("smv_b", 1)];
        assert!(resequence_moves(&mut moves).is_empty());
    }
}
