// src/core/commands/list/rpop.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::{extract_bytes, extract_string};
use crate::core::commands::list::logic::{list_pop_count_logic, list_pop_logic};
use crate::core::protocol::RespFrame;
use crate::core::storage::db::{ExecutionContext, PopDirection};
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct RPop {
    pub key: Bytes,
    pub count: Option<usize>,
}

impl ParseCommand for RPop {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        match args.len() {
            1 => Ok(RPop {
                key: extract_bytes(&args[0])?,
                count: None,
            }),
            2 => Ok(RPop {
                key: extract_bytes(&args[0])?,
                count: Some(
                    extract_string(&args[1])?
                        .parse()
                        .map_err(|_| OpalDBError::NotAnInteger)?,
                ),
            }),
            _ => Err(OpalDBError::WrongArgumentCount("rpop".to_string())),
        }
    }
}

#[async_trait]
impl ExecutableCommand for RPop {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        match self.count {
            None => list_pop_logic(ctx, &self.key, PopDirection::Right),
            Some(count) => list_pop_count_logic(ctx, &self.key, PopDirection::Right, count),
        }
    }
}

impl CommandSpec for RPop {
    fn name(&self) -> &'static str {
        "rpop"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone()];
        if let Some(count) = self.count {
            args.push(count.to_string().into());
        }
        args
    }
}
