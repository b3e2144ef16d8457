// src/core/commands/generic/readonly.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::database::ExecutionContext;
use crate::core::protocol::RespFrame;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// Lets a client read a replica's slots directly instead of being redirected
/// to the slot's master, for the lifetime of the connection.
#[derive(Debug, Clone, Default)]
pub struct ReadOnly;

impl ParseCommand for ReadOnly {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if !args.is_empty() {
            return Err(SpinelDBError::WrongArgumentCount(
                "READONLY command".to_string(),
            ));
        }
        Ok(ReadOnly)
    }
}

#[async_trait]
impl ExecutableCommand for ReadOnly {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        // Handled entirely in `command_router`, same as ASKING.
        Err(SpinelDBError::Internal(
            "READONLY command should not be executed directly".into(),
        ))
    }
}

impl CommandSpec for ReadOnly {
    fn name(&self) -> &'static str {
        "readonly"
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
