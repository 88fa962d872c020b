// src/core/commands/command_def.rs

//! The `define_commands!` macro: generates the `Command` enum and its
//! parse/dispatch/serialize implementations from one compile-time table, so
//! adding a command is a single line in `commands/mod.rs` plus its struct.

macro_rules! define_commands {
    (
        control: {
            $( ($ctrl_variant:ident, $ctrl_name:literal) ),* $(,)?
        },
        standard: {
            $( ($variant:ident, $struct_name:ident, $module:ident, $cmd_name:literal) ),* $(,)?
        }
    ) => {
        /// Every recognized command: bare control variants handled by the
        /// router, and per-command argument structs for everything else.
        #[derive(Debug, Clone)]
        pub enum Command {
            $( $ctrl_variant, )*
            $( $variant($module::$struct_name), )*
        }

        impl Command {
            /// The canonical lowercase command name.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Command::$ctrl_variant => $ctrl_name, )*
                    $( Command::$variant(_) => $cmd_name, )*
                }
            }
        }

        impl TryFrom<RespFrame> for Command {
            type Error = OpalDBError;

            /// Parses a request frame (an array of bulk strings, first
            /// element the case-insensitive command name) into a `Command`.
            fn try_from(frame: RespFrame) -> Result<Self, Self::Error> {
                let RespFrame::Array(parts) = frame else {
                    return Err(OpalDBError::SyntaxError);
                };
                let Some(RespFrame::BulkString(name_bytes)) = parts.first() else {
                    return Err(OpalDBError::SyntaxError);
                };
                let name = String::from_utf8_lossy(name_bytes).to_ascii_lowercase();
                let args = &parts[1..];
                match name.as_str() {
                    $(
                        $ctrl_name => {
                            if !args.is_empty() {
                                return Err(OpalDBError::WrongArgumentCount(
                                    $ctrl_name.to_string(),
                                ));
                            }
                            Ok(Command::$ctrl_variant)
                        }
                    )*
                    $(
                        $cmd_name => Ok(Command::$variant($module::$struct_name::parse(args)?)),
                    )*
                    _ => Err(OpalDBError::UnknownCommand(name)),
                }
            }
        }

        #[async_trait]
        impl CommandExt for Command {
            fn get_flags(&self) -> CommandFlags {
                match self {
                    $(
                        Command::$ctrl_variant =>
                            CommandFlags::TRANSACTION | CommandFlags::NO_PROPAGATE,
                    )*
                    $( Command::$variant(cmd) => cmd.flags(), )*
                }
            }

            fn get_keys(&self) -> Vec<Bytes> {
                match self {
                    $( Command::$ctrl_variant => vec![], )*
                    $( Command::$variant(cmd) => CommandSpec::get_keys(cmd), )*
                }
            }

            async fn execute<'a>(
                &self,
                ctx: &mut ExecutionContext<'a>,
            ) -> Result<(RespValue, WriteOutcome), OpalDBError> {
                match self {
                    $(
                        Command::$ctrl_variant => Err(OpalDBError::Internal(
                            concat!("'", $ctrl_name, "' is handled by the router").to_string(),
                        )),
                    )*
                    $( Command::$variant(cmd) => cmd.execute(ctx).await, )*
                }
            }
        }

        /// Re-encodes a parsed command as a request frame; used when writes
        /// are appended to the replication stream.
        impl From<Command> for RespFrame {
            fn from(cmd: Command) -> Self {
                let name = cmd.name().to_uppercase();
                let mut frames = vec![RespFrame::BulkString(Bytes::from(name))];
                match cmd {
                    $( Command::$ctrl_variant => {} )*
                    $(
                        Command::$variant(c) => {
                            frames.extend(
                                c.to_resp_args().into_iter().map(RespFrame::BulkString),
                            );
                        }
                    )*
                }
                RespFrame::Array(frames)
            }
        }
    };
}
