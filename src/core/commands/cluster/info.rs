// src/core/commands/cluster/info.rs

//! Implements `CLUSTER INFO`, a block of `field:value` lines summarizing
//! cluster health, matching the shape `redis-cli --cluster check` parses.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use std::sync::atomic::Ordering;

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    let assigned_slots = cluster
        .slots_map
        .iter()
        .filter(|s| s.read().is_some())
        .count();
    let state = if cluster.cluster_ok.load(Ordering::Relaxed) {
        "ok"
    } else {
        "fail"
    };
    let known_nodes = cluster.nodes.len();
    let size = cluster.cluster_size();
    let current_epoch = cluster.current_epoch.load(Ordering::Relaxed);
    let my_epoch = cluster.get_my_config().node_info.config_epoch;

    let body = format!(
        "cluster_enabled:1\r\n\
         cluster_state:{state}\r\n\
         cluster_slots_assigned:{assigned_slots}\r\n\
         cluster_slots_ok:{assigned_slots}\r\n\
         cluster_slots_pfail:0\r\n\
         cluster_slots_fail:0\r\n\
         cluster_known_nodes:{known_nodes}\r\n\
         cluster_size:{size}\r\n\
         cluster_current_epoch:{current_epoch}\r\n\
         cluster_my_epoch:{my_epoch}\r\n\
         cluster_stats_messages_sent:0\r\n\
         cluster_stats_messages_received:0\r\n"
    );

    Ok((RespValue::BulkString(body.into()), WriteOutcome::DidNotWrite))
}
