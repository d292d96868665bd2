//! Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use admin::AdminQueryService;
use corelib::Placement;
use registry::{MemoryStore, NodeRegistry, OperationLog};
use server::chat::ChatStore;
use server::AppState;

/// Run the chat-cluster API server.
#[derive(Parser, Debug)]
#[command(name = "chat-cluster", about = "Ring-placed chat cluster server")]
pub struct CliConfig {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Number of positions on the ring.
    #[arg(long, default_value_t = corelib::DEFAULT_RING_SIZE)]
    pub ring_size: u32,

    /// Nodes (primary included) assigned to each key.
    #[arg(long, default_value_t = 3)]
    pub replication_factor: usize,
}

impl CliConfig {
    /// Wire up the stores and services, then serve until shutdown.
    ///
    /// Seeding and log restoration are awaited here, before the listener
    /// starts: no request can observe a half-initialized node table.
    pub async fn run(self) -> anyhow::Result<()> {
        let placement = Placement::new(self.ring_size, self.replication_factor);

        let store = Arc::new(MemoryStore::new());
        let log = Arc::new(OperationLog::new(store.clone()));
        log.load().await?;

        let registry = Arc::new(NodeRegistry::new(store.clone(), log.clone(), placement));
        registry.init().await?;

        let chat = Arc::new(ChatStore::new(store));
        let admin = Arc::new(AdminQueryService::new(
            registry.clone(),
            chat.clone(),
            chat.clone(),
        ));

        let app = server::router(AppState {
            registry,
            log,
            admin,
            chat,
        });

        info!(listen = %self.listen, ring_size = self.ring_size, "starting server");
        let listener = tokio::net::TcpListener::bind(self.listen).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}
