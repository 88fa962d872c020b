// src/config.rs

//! The server's runtime configuration, assembled from the command-line
//! surface and validated at startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DIR: &str = "/tmp";
pub const DEFAULT_DBFILENAME: &str = "dump.rdb";

/// The replication role this instance runs with for its lifetime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ReplicationRole {
    Leader,
    Follower { host: String, port: u16 },
}

impl Default for ReplicationRole {
    fn default() -> Self {
        ReplicationRole::Leader
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub replication: ReplicationRole,
    /// Directory holding the snapshot file.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Snapshot file name within `dir`.
    #[serde(default = "default_dbfilename")]
    pub dbfilename: String,
    /// Log filter applied when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_dir() -> String {
    DEFAULT_DIR.to_string()
}
fn default_dbfilename() -> String {
    DEFAULT_DBFILENAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            replication: ReplicationRole::default(),
            dir: default_dir(),
            dbfilename: default_dbfilename(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// The full path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.dbfilename)
    }

    /// Parses the CLI surface:
    /// `--port <n>`, `--replicaof "<host> <port>"` (or two arguments),
    /// `--dir <path>`, `--dbfilename <name>`, `--help`.
    ///
    /// Returns `Ok(None)` when `--help` was requested.
    pub fn from_args(args: &[String]) -> Result<Option<Config>, String> {
        let mut config = Config::default();
        let mut i = 0;

        while i < args.len() {
            match args[i].as_str() {
                "--help" | "-h" => return Ok(None),
                "--port" => {
                    let value = args
                        .get(i + 1)
                        .ok_or("--port flag requires a value")?;
                    let port: u32 = value
                        .parse()
                        .map_err(|_| format!("invalid port number: {value}"))?;
                    if port == 0 || port > u16::MAX as u32 {
                        return Err(format!("port out of range (1..65535): {value}"));
                    }
                    config.port = port as u16;
                    i += 2;
                }
                "--replicaof" => {
                    let first = args
                        .get(i + 1)
                        .ok_or("--replicaof flag requires a value")?;
                    // Accept both the quoted "<host> <port>" form and two
                    // separate arguments.
                    let (host, port_str, consumed) =
                        if let Some((host, port)) = first.split_once(' ') {
                            (host.to_string(), port.to_string(), 2)
                        } else {
                            let port = args
                                .get(i + 2)
                                .ok_or("--replicaof requires \"<host> <port>\"")?;
                            (first.clone(), port.clone(), 3)
                        };
                    let port: u16 = port_str
                        .parse()
                        .map_err(|_| format!("invalid replicaof port: {port_str}"))?;
                    if port == 0 {
                        return Err(format!("invalid replicaof port: {port_str}"));
                    }
                    config.replication = ReplicationRole::Follower { host, port };
                    i += consumed;
                }
                "--dir" => {
                    config.dir = args
                        .get(i + 1)
                        .ok_or("--dir flag requires a value")?
                        .clone();
                    i += 2;
                }
                "--dbfilename" => {
                    config.dbfilename = args
                        .get(i + 1)
                        .ok_or("--dbfilename flag requires a value")?
                        .clone();
                    i += 2;
                }
                other => return Err(format!("unknown flag: {other}")),
            }
        }

        Ok(Some(config))
    }
}

pub const USAGE: &str = "\
Usage: opaldb [OPTIONS]

Options:
  --port <n>                  TCP port to listen on (default 6379)
  --replicaof \"<host> <port>\" Run as a follower of the given leader
  --dir <path>                Snapshot directory (default /tmp)
  --dbfilename <name>         Snapshot file name (default dump.rdb)
  --help, -h                  Print this help
";

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_args(&[]).unwrap().unwrap();
        assert_eq!(config.port, 6379);
        assert_eq!(config.replication, ReplicationRole::Leader);
        assert_eq!(config.snapshot_path(), PathBuf::from("/tmp/dump.rdb"));
    }

    #[test]
    fn parses_all_flags() {
        let config = Config::from_args(&args(&[
            "--port",
            "7000",
            "--dir",
            "/var/data",
            "--dbfilename",
            "snap.rdb",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.snapshot_path(), PathBuf::from("/var/data/snap.rdb"));
    }

    #[test]
    fn replicaof_quoted_and_split_forms() {
        let quoted = Config::from_args(&args(&["--replicaof", "10.0.0.5 6379"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            quoted.replication,
            ReplicationRole::Follower {
                host: "10.0.0.5".to_string(),
                port: 6379
            }
        );

        let split = Config::from_args(&args(&["--replicaof", "localhost", "7001"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            split.replication,
            ReplicationRole::Follower {
                host: "localhost".to_string(),
                port: 7001
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Config::from_args(&args(&["--port", "0"])).is_err());
        assert!(Config::from_args(&args(&["--port", "99999"])).is_err());
        assert!(Config::from_args(&args(&["--port"])).is_err());
        assert!(Config::from_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn help_short_circuits() {
        assert!(Config::from_args(&args(&["--help"])).unwrap().is_none());
        assert!(Config::from_args(&args(&["-h"])).unwrap().is_none());
    }
}
