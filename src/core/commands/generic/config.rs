// src/core/commands/generic/config.rs

use crate::core::commands::command_trait::{
    CommandFlags, CommandSpec, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::storage::db::ExecutionContext;
use crate::core::{OpalDBError, RespValue};
use async_trait::async_trait;
use bytes::Bytes;

/// `CONFIG GET parameter`. Reflects the startup parameters that affect the
/// snapshot location; unsupported parameters return an empty array.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub parameter: String,
}

impl ParseCommand for Config {
    fn parse(args: &[RespFrame]) -> Result<Self, OpalDBError> {
        if args.len() != 2 {
            return Err(OpalDBError::WrongArgumentCount("config".to_string()));
        }
        let subcommand = extract_string(&args[0])?;
        if !subcommand.eq_ignore_ascii_case("get") {
            return Err(OpalDBError::InvalidState(format!(
                "Unknown CONFIG subcommand or wrong number of arguments for '{subcommand}'"
            )));
        }
        Ok(Config {
            parameter: extract_string(&args[1])?.to_ascii_lowercase(),
        })
    }
}

#[async_trait]
impl ExecutableCommand for Config {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
        let config = &ctx.state.config;
        let value = match self.parameter.as_str() {
            "dir" => Some(config.dir.clone()),
            "dbfilename" => Some(config.dbfilename.clone()),
            _ => None,
        };
        let response = match value {
            Some(value) => RespValue::Array(vec![
                RespValue::BulkString(self.parameter.clone().into()),
                RespValue::BulkString(value.into()),
            ]),
            None => RespValue::Array(vec![]),
        };
        Ok((response, WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for Config {
    fn name(&self) -> &'static str {
        "config"
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::ADMIN | CommandFlags::NO_PROPAGATE | CommandFlags::READONLY
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![Bytes::from_static(b"GET"), self.parameter.clone().into()]
    }
}
