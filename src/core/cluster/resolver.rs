// src/core/cluster/resolver.rs

//! Reconciles a remote node's claimed slot bitmap against our own slot table,
//! applying the epoch-ordered ownership rule and flagging stale claimants
//! that need an `UPDATE` correction.

use super::state::ClusterState;
use std::collections::BTreeSet;
use tracing::info;

/// Applies a claim of `claimed_slots` by `claimant_id` (at `claimant_epoch`)
/// against the local slot table. Returns a pair of `(claimant_is_stale,
/// slots_lost_by_me)`: the first is `true` if the claimant turned out to be
/// behind (holds a lower epoch than the slot's actual current owner),
/// meaning the caller should send it a single `UPDATE` message to correct it
/// — at most once per processed packet, regardless of how many of its slots
/// were stale, to avoid an update storm. The second lists any slots that
/// were reassigned away from this node as a result of the claim, so the
/// caller can purge their keys locally.
///
/// A slot this node is currently importing from `claimant_id` is skipped
/// entirely — gossip never reassigns it, only `CLUSTER SETSLOT ... NODE`
/// closes out an in-progress import.
pub fn apply_slot_claim(
    state: &ClusterState,
    claimant_id: &str,
    claimant_epoch: u64,
    claimed_slots: &BTreeSet<u16>,
) -> (bool, Vec<u16>) {
    let mut claimant_is_stale = false;
    let mut slots_lost_by_me = Vec::new();

    for &slot in claimed_slots {
        if state.importing_slots_from[slot as usize].read().is_some() {
            continue;
        }

        let current_owner = state.slots_map[slot as usize].read().clone();
        match current_owner {
            None => {
                *state.slots_map[slot as usize].write() = Some(claimant_id.to_string());
            }
            Some(ref owner_id) if owner_id == claimant_id => {}
            Some(owner_id) => {
                let owner_epoch = state
                    .nodes
                    .get(&owner_id)
                    .map(|n| n.node_info.config_epoch)
                    .unwrap_or(0);

                if claimant_epoch > owner_epoch {
                    *state.slots_map[slot as usize].write() = Some(claimant_id.to_string());
                    if let Some(mut prev) = state.nodes.get_mut(&owner_id) {
                        prev.node_info.slots.remove(&slot);
                    }
                    if owner_id == state.my_id {
                        slots_lost_by_me.push(slot);
                    }
                    info!(
                        "Slot {} reassigned from {} (epoch {}) to {} (epoch {})",
                        slot, owner_id, owner_epoch, claimant_id, claimant_epoch
                    );
                } else if claimant_epoch < owner_epoch {
                    claimant_is_stale = true;
                }
                // Equal epochs with differing owners is a collision for
                // `epoch::resolve_collisions` to break, not this function.
            }
        }
    }

    if let Some(mut claimant) = state.nodes.get_mut(claimant_id) {
        claimant.node_info.slots = claimed_slots.clone();
    }

    (claimant_is_stale, slots_lost_by_me)
}

/// Clears every slot this node has marked as owned-by `stale_node_id` that is
/// no longer reflected in that node's current claim, used after a node comes
/// back from a partition with a smaller slot set than before.
pub fn purge_dangling_ownership(state: &ClusterState, node_id: &str, still_owned: &BTreeSet<u16>) {
    if let Some(node) = state.nodes.get(node_id) {
        for &slot in &node.node_info.slots {
            if !still_owned.contains(&slot) {
                let mut owner = state.slots_map[slot as usize].write();
                if owner.as_deref() == Some(node_id) {
                    *owner = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::cluster::state::{NodeFlags, NodeRuntimeState};
    use std::collections::HashMap;
    use std::time::Instant;

    fn test_state() -> ClusterState {
        ClusterState::new(&Config::default()).unwrap()
    }

    fn insert_node(state: &ClusterState, id: &str, epoch: u64, slots: &[u16]) {
        let mut info = state.get_my_config().node_info.clone();
        info.id = id.to_string();
        info.flags_raw = NodeFlags::PRIMARY.bits();
        info.config_epoch = epoch;
        info.slots = slots.iter().copied().collect();
        state.nodes.insert(
            id.to_string(),
            NodeRuntimeState {
                node_info: info,
                ping_sent: None,
                pong_received: Some(Instant::now()),
                fail_reports: HashMap::new(),
                voted_time: None,
                fail_time: None,
            },
        );
    }

    #[test]
    fn claims_unassigned_slots() {
        let state = test_state();
        let claim: BTreeSet<u16> = [1, 2, 3].into_iter().collect();
        insert_node(&state, "nodeA", 1, &[1, 2, 3]);
        let (stale, _lost) = apply_slot_claim(&state, "nodeA", 1, &claim);
        assert!(!stale);
        assert_eq!(state.slots_map[1].read().as_deref(), Some("nodeA"));
    }

    #[test]
    fn higher_epoch_wins_reassignment() {
        let state = test_state();
        insert_node(&state, "nodeA", 1, &[5]);
        insert_node(&state, "nodeB", 2, &[5]);
        *state.slots_map[5].write() = Some("nodeA".to_string());

        let claim: BTreeSet<u16> = [5].into_iter().collect();
        let (stale, lost) = apply_slot_claim(&state, "nodeB", 2, &claim);
        assert!(!stale);
        assert_eq!(state.slots_map[5].read().as_deref(), Some("nodeB"));
        assert!(lost.is_empty());
    }

    #[test]
    fn lower_epoch_claimant_flagged_stale() {
        let state = test_state();
        insert_node(&state, "nodeA", 5, &[9]);
        insert_node(&state, "nodeB", 1, &[9]);
        *state.slots_map[9].write() = Some("nodeA".to_string());

        let claim: BTreeSet<u16> = [9].into_iter().collect();
        let (stale, lost) = apply_slot_claim(&state, "nodeB", 1, &claim);
        assert!(stale);
        assert_eq!(state.slots_map[9].read().as_deref(), Some("nodeA"));
        assert!(lost.is_empty());
    }

    #[test]
    fn importing_slot_is_skipped_during_gossip_reassignment() {
        let state = test_state();
        insert_node(&state, "nodeA", 1, &[7]);
        insert_node(&state, "nodeB", 2, &[7]);
        *state.slots_map[7].write() = Some("nodeA".to_string());
        *state.importing_slots_from[7].write() = Some("nodeA".to_string());

        let claim: BTreeSet<u16> = [7].into_iter().collect();
        let (stale, lost) = apply_slot_claim(&state, "nodeB", 2, &claim);
        assert!(!stale);
        assert!(lost.is_empty());
        // Ownership is untouched; only CLUSTER SETSLOT ... NODE closes this out.
        assert_eq!(state.slots_map[7].read().as_deref(), Some("nodeA"));
    }
}
