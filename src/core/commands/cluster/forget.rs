// src/core/commands/cluster/forget.rs

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::database::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use tracing::info;

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    node_id_to_forget: &str,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx
        .state
        .cluster
        .as_ref()
        .expect("CLUSTER FORGET must be run in cluster mode");

    // A node cannot forget itself.
    if node_id_to_forget == cluster.my_id {
        return Err(SpinelDBError::InvalidState(
            "Cannot forget myself".to_string(),
        ));
    }

    if !cluster.nodes.contains_key(node_id_to_forget) {
        return Err(SpinelDBError::InvalidState(format!(
            "Node {node_id_to_forget} not found in the cluster"
        )));
    }

    // Unassigns this node's slots, clears fail-reports and replica_of
    // back-references, and blacklists it so gossip can't rediscover it.
    cluster.forget_node(node_id_to_forget);
    info!(
        "Node {} has been removed from the cluster configuration.",
        node_id_to_forget
    );

    cluster.save_config()?;

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite, // Config change, not data change
    ))
}
