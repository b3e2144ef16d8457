// src/core/commands/cluster/failover.rs

//! Implements `CLUSTER FAILOVER [FORCE|TAKEOVER]`, the manually triggered
//! variant of the replica-promotion flow normally driven by failure
//! detection. The command only submits the request to the gossip worker,
//! which owns the bus connections needed to run the handshake; it replies
//! `OK` once the request is accepted, not once the failover completes.

use super::FailoverMode;
use crate::core::cluster::gossip::GossipTaskMessage;
use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    mode: FailoverMode,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx
        .state
        .cluster
        .as_ref()
        .ok_or_else(|| SpinelDBError::InvalidState("Cluster mode is not enabled.".into()))?;

    if !cluster
        .get_my_config()
        .node_info
        .get_flags()
        .contains(crate::core::cluster::NodeFlags::REPLICA)
    {
        return Err(SpinelDBError::InvalidState(
            "You should send CLUSTER FAILOVER to a replica".into(),
        ));
    }

    let task_msg = GossipTaskMessage::BeginManualFailover {
        takeover: matches!(mode, FailoverMode::Takeover),
    };

    ctx.state
        .cluster_gossip_tx
        .try_send(task_msg)
        .map_err(|e| SpinelDBError::Internal(format!("failed to submit failover request: {e}")))?;

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite,
    ))
}
