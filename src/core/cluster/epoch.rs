// src/core/cluster/epoch.rs

//! Epoch bookkeeping: adopting the highest epoch seen, the two unconsensual
//! bump escape hatches, and collision resolution between masters that ended
//! up sharing the same `configEpoch`.

use super::state::{ClusterState, NodeFlags};
use std::sync::atomic::Ordering;
use tracing::info;

/// Adopts `epoch` into `current_epoch` if it is strictly greater than what
/// we've already seen. Called on every inbound gossip packet and bus message.
pub fn adopt(state: &ClusterState, epoch: u64) {
    state.observe_epoch(epoch);
}

/// Unconsensual epoch bump used by `SETSLOT <slot> NODE` when closing out an
/// import, and by `FAILOVER TAKEOVER`: both claim ownership immediately,
/// without running an election, by minting a fresh epoch ahead of
/// `current_epoch`.
pub fn bump_for_unconsensual_claim(state: &ClusterState) -> u64 {
    state.get_new_config_epoch()
}

/// Scans for masters sharing our own `configEpoch` and, if we are the
/// lexicographically greater ID in the collision, bumps our own epoch to
/// break the tie. Meant to be called once per gossip tick.
pub fn resolve_collisions(state: &ClusterState) {
    let my_epoch = state.get_my_config().node_info.config_epoch;
    if my_epoch == 0 {
        return;
    }

    let collides_with_lesser_id = state.nodes.iter().any(|entry| {
        let info = &entry.value().node_info;
        info.id != state.my_id
            && info.get_flags().contains(NodeFlags::PRIMARY)
            && info.config_epoch == my_epoch
            && info.id < state.my_id
    });

    if collides_with_lesser_id {
        let new_epoch = state.current_epoch.fetch_add(0, Ordering::Relaxed).max(my_epoch) + 1;
        state.current_epoch.store(new_epoch, Ordering::Relaxed);
        if let Some(mut myself) = state.nodes.get_mut(&state.my_id) {
            myself.node_info.config_epoch = new_epoch;
        }
        info!(
            "Resolved configEpoch collision at epoch {} by bumping to {}",
            my_epoch, new_epoch
        );
    }
}
