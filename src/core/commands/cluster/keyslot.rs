// src/core/commands/cluster/keyslot.rs

use crate::core::cluster::slot;
use crate::core::commands::command_trait::WriteOutcome;
use crate::core::storage::db::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use bytes::Bytes;

pub async fn execute(
    _ctx: &mut ExecutionContext<'_>,
    key: &Bytes,
) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
    Ok((
        RespValue::Integer(slot::get_slot(key) as i64),
        WriteOutcome::DidNotWrite,
    ))
}
