// src/core/commands/generic/readwrite.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::database::ExecutionContext;
use crate::core::protocol::RespFrame;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// Reverses `READONLY`: the connection goes back to being redirected with
/// `MOVED` for slots this node doesn't own, even if it's a replica of the
/// owner.
#[derive(Debug, Clone, Default)]
pub struct ReadWrite;

impl ParseCommand for ReadWrite {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if !args.is_empty() {
            return Err(SpinelDBError::WrongArgumentCount(
                "READWRITE command".to_string(),
            ));
        }
        Ok(ReadWrite)
    }
}

#[async_trait]
impl ExecutableCommand for ReadWrite {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        // Handled entirely in `command_router`, same as ASKING.
        Err(SpinelDBError::Internal(
            "READWRITE command should not be executed directly".into(),
        ))
    }
}

impl CommandSpec for ReadWrite {
    fn name(&self) -> &'static str {
        "readwrite"
    }
    fn arity(&self) -> i64 {
        1
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE
    }
    fn first_key(&self) -> i64 {
        0
    }
    fn last_key(&self) -> i64 {
        0
    }
    fn step(&self) -> i64 {
        0
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![]
    }
}
