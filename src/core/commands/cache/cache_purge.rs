// src/core/commands/cache/cache_purge.rs

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::database::ExecutionContext;
use crate::core::protocol::RespFrame;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CachePurge {
    pub patterns: Vec<Bytes>,
}

impl ParseCommand for CachePurge {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if args.is_empty() {
            return Err(SpinelDBError::WrongArgumentCount("CACHE.PURGE".to_string()));
        }
        let patterns = args.iter().map(extract_bytes).collect::<Result<_, _>>()?;
        Ok(CachePurge { patterns })
    }
}

#[async_trait]
impl ExecutableCommand for CachePurge {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        const PURGE_PATTERN_TTL: Duration = Duration::from_secs(300);
        let expiry = Instant::now() + PURGE_PATTERN_TTL;

        for pattern in &self.patterns {
            ctx.state
                .cache
                .purge_patterns
                .insert(pattern.clone(), expiry);
        }

        if let Some(cluster_state) = &ctx.state.cluster {
            // Lazy purges are applied locally only; the bus protocol has no
            // room for a tag-purge message type, so peers discover the same
            // patterns independently when the same command reaches them.
            let _ = cluster_state.get_new_purge_epoch();
        }

        Ok((
            RespValue::SimpleString("OK".into()),
            WriteOutcome::DidNotWrite,
        ))
    }
}

impl CommandSpec for CachePurge {
    fn name(&self) -> &'static str {
        "cache.purge"
    }
    fn arity(&self) -> i64 {
        -2
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
        self.patterns.clone()
    }
}
