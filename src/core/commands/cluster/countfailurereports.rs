// src/core/commands/cluster/countfailurereports.rs

//! Implements `CLUSTER COUNT-FAILURE-REPORTS <node-id>`.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    node_id: &str,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();
    let count = cluster
        .nodes
        .get(node_id)
        .map(|rt| rt.fail_reports.len())
        .ok_or_else(|| SpinelDBError::InvalidState(format!("Unknown node {node_id}")))?;

    Ok((RespValue::Integer(count as i64), WriteOutcome::DidNotWrite))
}
