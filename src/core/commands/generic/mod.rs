// src/core/commands/generic/mod.rs

pub mod config;
pub mod del;
pub mod echo;
pub mod info;
pub mod keys;
pub mod ping;
pub mod psubscribe;
pub mod psync;
pub mod publish;
pub mod punsubscribe;
pub mod quit;
pub mod replconf;
pub mod save;
pub mod subscribe;
pub mod type_cmd;
pub mod unsubscribe;
pub mod wait;

pub use config::Config;
pub use del::Del;
pub use echo::Echo;
pub use info::Info;
pub use keys::Keys;
pub use ping::Ping;
pub use psubscribe::PSubscribe;
pub use psync::Psync;
pub use publish::Publish;
pub use punsubscribe::PUnsubscribe;
pub use quit::Quit;
pub use replconf::Replconf;
pub use save::Save;
pub use subscribe::Subscribe;
pub use type_cmd::TypeInfo;
pub use unsubscribe::Unsubscribe;
pub use wait::Wait;
