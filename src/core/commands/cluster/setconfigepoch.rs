// src/core/commands/cluster/setconfigepoch.rs

//! Implements `CLUSTER SET-CONFIG-EPOCH <epoch>`, used during initial cluster
//! bootstrap to hand each empty node a distinct starting epoch before any
//! slot is assigned.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    epoch: u64,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    let mut myself = cluster.nodes.get_mut(&cluster.my_id).unwrap();
    if myself.node_info.config_epoch != 0 {
        return Err(SpinelDBError::InvalidState(
            "Node config epoch is already non-zero".to_string(),
        ));
    }

    myself.node_info.config_epoch = epoch;
    drop(myself);
    cluster.observe_epoch(epoch);

    cluster.save_config()?;

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite,
    ))
}
