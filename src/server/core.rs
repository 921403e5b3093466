use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use crate::auth::{CredentialStore, JsonCredentialStore};
use crate::client::{ClientRegistry, handle_client};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::protocol::{CommandDispatcher, Response};
use crate::storage::FileStorage;

pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<CommandDispatcher>,
    config: Arc<ServerConfig>,
}

impl Server {
    /// Opens storage and the JSON credential store named by `config`, then binds.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let storage = FileStorage::from_config(&config)?;
        let credentials = Arc::new(JsonCredentialStore::open(config.users_file_path())?);
        Self::with_credentials(config, storage, credentials).await
    }

    /// Binds the listener around an already opened storage and credential store.
    pub async fn with_credentials(
        config: ServerConfig,
        storage: FileStorage,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServerError> {
        let address = config.socket_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", address, e);
                return Err(e.into());
            }
        };
        info!("Server bound to {}", listener.local_addr()?);

        let config = Arc::new(config);
        let registry = ClientRegistry::shared(config.max_clients);
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&config),
            storage,
            credentials,
            registry,
        ));

        Ok(Self {
            listener,
            dispatcher,
            config,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn start(&self) {
        info!(
            "Starting RAX Store server on {} (max {} clients)",
            self.config.socket_address(),
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let dispatcher = Arc::clone(&self.dispatcher);

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_new_client(stream, addr, dispatcher).await {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}

/// Admits a new client against the connection limit and runs its session.
async fn handle_new_client(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    dispatcher: Arc<CommandDispatcher>,
) -> Result<(), ServerError> {
    let admitted = {
        let mut registry = dispatcher.registry().lock().await;
        let admitted = registry.admit(client_addr);
        if admitted {
            info!(
                "Client connected: {} ({}/{} clients)",
                client_addr,
                registry.len(),
                registry.max_clients()
            );
        }
        admitted
    };

    if !admitted {
        warn!("Rejecting {}: too many connections", client_addr);
        dispatcher
            .codec()
            .write_control_frame(&mut stream, &Response::error("Too many connections"))
            .await?;
        return Ok(());
    }

    handle_client(stream, client_addr, dispatcher).await;
    Ok(())
}
