// src/core/commands/cluster/reset.rs

//! Implements `CLUSTER RESET [SOFT|HARD]`: forgets every other node, flushes
//! the keyspace, and zeroes out slot ownership and epoch state.
//!
//! Unlike real Redis Cluster, `HARD` does not regenerate this node's run ID:
//! `ClusterState::my_id` is set once at startup and shared via `Arc` with the
//! gossip task and every connection handler, so swapping it would require
//! tearing down and rebuilding those tasks. Operators who need a fresh node
//! identity should restart the process instead.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use std::sync::atomic::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Soft,
    Hard,
}

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    mode: ResetMode,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    for db in &ctx.state.dbs {
        db.clear_all_shards().await;
    }

    cluster.nodes.retain(|id, _| id == &cluster.my_id);
    for slot in cluster.slots_map.iter() {
        *slot.write() = None;
    }
    for slot in cluster.migrating_slots_to.iter() {
        *slot.write() = None;
    }
    for slot in cluster.importing_slots_from.iter() {
        *slot.write() = None;
    }
    cluster.blacklist.clear();

    {
        let mut myself = cluster.nodes.get_mut(&cluster.my_id).unwrap();
        myself.node_info.slots.clear();
        myself.node_info.config_epoch = 0;
        myself.node_info.replica_of = None;
        myself.node_info.had_replicas = false;
    }
    cluster.current_epoch.store(0, Ordering::Relaxed);
    cluster.last_vote_epoch.store(0, Ordering::Relaxed);

    cluster.save_config()?;

    if mode == ResetMode::Hard {
        tracing::warn!(
            "CLUSTER RESET HARD requested but this node's run ID is immutable at runtime; \
             restart the process for a fresh node ID."
        );
    }

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite,
    ))
}
