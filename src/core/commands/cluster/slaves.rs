// src/core/commands/cluster/slaves.rs

//! Implements `CLUSTER SLAVES <master-id>`, listing the replicas of a master
//! in the same line format as `CLUSTER NODES`.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    master_id: &str,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    if !cluster.nodes.contains_key(master_id) {
        return Err(SpinelDBError::InvalidState(format!(
            "Unknown node {master_id}"
        )));
    }

    let current_epoch = cluster
        .current_epoch
        .load(std::sync::atomic::Ordering::Relaxed);

    let lines: Vec<RespValue> = cluster
        .replicas_of(master_id)
        .into_iter()
        .filter_map(|id| cluster.nodes.get(&id).map(|rt| (id, rt)))
        .map(|(id, rt)| {
            let node = &rt.node_info;
            let flags_str = node
                .get_flags()
                .iter_names()
                .map(|(name, _)| name.to_lowercase())
                .collect::<Vec<_>>()
                .join(",");
            let last_pong = rt.pong_received.map_or(0, |t| t.elapsed().as_millis());
            RespValue::BulkString(
                format!(
                    "{} {} {} {} {} {} {} connected",
                    id, node.addr, flags_str, master_id, node.config_epoch, last_pong, current_epoch
                )
                .into(),
            )
        })
        .collect();

    Ok((RespValue::Array(lines), WriteOutcome::DidNotWrite))
}
