// src/core/commands/cluster/flushslots.rs

//! Implements `CLUSTER FLUSHSLOTS`, which unassigns every slot this node
//! owns. Refuses to run unless the keyspace is empty, so an operator can't
//! accidentally orphan live data.

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();

    if ctx.db.get_key_count() != 0 {
        return Err(SpinelDBError::InvalidState(
            "DB must be empty to perform CLUSTER FLUSHSLOTS.".to_string(),
        ));
    }

    let mut myself = cluster.nodes.get_mut(&cluster.my_id).unwrap();
    let owned: Vec<u16> = myself.node_info.slots.iter().copied().collect();
    myself.node_info.slots.clear();
    drop(myself);

    for slot in owned {
        *cluster.slots_map[slot as usize].write() = None;
    }

    cluster.save_config()?;

    Ok((
        RespValue::SimpleString("OK".into()),
        WriteOutcome::DidNotWrite,
    ))
}
