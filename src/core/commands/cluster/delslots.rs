// src/core/commands/cluster/delslots.rs

//! Implements `CLUSTER DELSLOTS slot...`, unassigning specific slots this
//! node currently owns. Unlike `FLUSHSLOTS` it leaves any data in place.

use crate::core::cluster::slot::NUM_SLOTS;
use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    slots: &[u16],
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let cluster = ctx.state.cluster.as_ref().unwrap();
    let mut myself = cluster.nodes.get_mut(&cluster.my_id).unwrap();

    for &slot in slots {
        if slot >= NUM_SLOTS as u16 {
            return Err(SpinelDBError::InvalidState(format!(
                "Slot {slot} is out of range"
            )));
        }
        if !myself.node_info.slots.contains(&slot) {
            return Err(SpinelDBError::InvalidState(format!(
                "Slot {slot} is not assigned to this node"
            )));
        }
    }

    let mut cleared = 0i64;
    for &slot in slots {
        myself.node_info.slots.remove(&slot);
        *cluster.slots_map[slot as usize].write() = None;
        cleared += 1;
    }
    drop(myself);

    cluster.save_config()?;

    Ok((RespValue::Integer(cleared), WriteOutcome::DidNotWrite))
}
