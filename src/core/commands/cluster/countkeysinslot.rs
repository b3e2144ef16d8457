// src/core/commands/cluster/countkeysinslot.rs

use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};

pub async fn execute(
    ctx: &mut ExecutionContext<'_>,
    slot: u16,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    let count = ctx.db.count_keys_in_slot(slot).await;
    Ok((
        RespValue::Integer(count as i64),
        WriteOutcome::DidNotWrite,
    ))
}
