// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod spawner;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize server state, load the snapshot, and bind the listener.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn the background tasks (saver, replication role, purger).
    spawner::spawn_all(&mut server_context);

    // 3. Run the accept loop until shutdown.
    connection_loop::run(server_context).await;

    Ok(())
}
