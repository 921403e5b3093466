//! Command handlers module for the RAX Store server.
//!
//! Routes each decoded request to its handler, enforces the authentication
//! gate, and sequences the extra frames some commands carry: GET answers with
//! a metadata frame followed by a data frame, PUT consumes exactly one data
//! frame from the client whether or not the upload is accepted.

use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::auth::{
    CredentialStore, UserId, validate_login, validate_password, validate_path, validate_required,
};
use crate::client::{Session, SharedRegistry};
use crate::config::ServerConfig;
use crate::error::handlers::client_message;
use crate::error::{CommandError, StorageError, TransportError};
use crate::protocol::codec::FrameCodec;
use crate::protocol::commands::{Request, parse_request};
use crate::protocol::responses::Response;
use crate::storage::FileStorage;

/// What a successful command sends back.
#[derive(Debug)]
pub enum Reply {
    Frame(Response),
    /// Metadata control frame immediately followed by a data frame
    Download { metadata: Response, content: Vec<u8> },
}

/// Executes commands for every connection of one server.
pub struct CommandDispatcher {
    config: Arc<ServerConfig>,
    codec: FrameCodec,
    storage: FileStorage,
    credentials: Arc<dyn CredentialStore>,
    registry: SharedRegistry,
}

impl CommandDispatcher {
    pub fn new(
        config: Arc<ServerConfig>,
        storage: FileStorage,
        credentials: Arc<dyn CredentialStore>,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            codec: FrameCodec::from_config(&config),
            config,
            storage,
            credentials,
            registry,
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Executes the command carried by `frame` and writes its response.
    ///
    /// Command failures become ERROR responses and the session continues.
    /// Only transport failures are returned; the caller must then close the
    /// connection.
    pub async fn dispatch<R, W>(
        &self,
        session: &mut Session,
        frame: &Value,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let outcome = match parse_request(frame) {
            Ok(request) => {
                info!("Received from {}: {}", session.peer(), request.name());
                self.execute(session, request, reader).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Reply::Frame(response)) => self.codec.write_control_frame(writer, &response).await,
            Ok(Reply::Download { metadata, content }) => {
                self.codec.write_control_frame(writer, &metadata).await?;
                self.codec.write_data_frame(writer, &content).await
            }
            Err(CommandError::Transport(e)) => Err(e),
            Err(e) => {
                warn!("Command from {} failed: {}", session.peer(), e);
                let response = Response::error(client_message(&e));
                self.codec.write_control_frame(writer, &response).await
            }
        }
    }

    async fn execute<R>(
        &self,
        session: &mut Session,
        request: Request,
        reader: &mut R,
    ) -> Result<Reply, CommandError>
    where
        R: AsyncRead + Unpin,
    {
        match request {
            // PUT drains its data frame even when it is refused
            Request::Put { path, size } => self.handle_put(session, &path, size, reader).await,
            other if other.requires_auth() && !session.is_authenticated() => {
                Err(CommandError::Unauthorized)
            }
            Request::Register { login, password } => self.handle_register(&login, &password),
            Request::Auth { login, password } => {
                self.handle_auth(session, &login, &password).await
            }
            Request::Logout => self.handle_logout(session).await,
            Request::List { path } => self.handle_list(session, &path),
            Request::Get { path } => self.handle_get(session, &path),
            Request::Delete { path } => self.handle_delete(session, &path),
            Request::Move {
                source,
                destination,
            } => self.handle_move(session, &source, &destination),
        }
    }

    /// Handles REGISTER: creates an account without touching the session.
    fn handle_register(&self, login: &str, password: &str) -> Result<Reply, CommandError> {
        let login = validate_login(login, self.config.max_login_length)?;
        validate_password(password, self.config.min_password_length)?;

        let user = self.credentials.register(&login, password)?;
        info!("Registered new user {} ({})", login, user);

        Ok(Reply::Frame(Response::registered(user.as_str())))
    }

    /// Handles AUTH: on success the session becomes `Authenticated`.
    async fn handle_auth(
        &self,
        session: &mut Session,
        login: &str,
        password: &str,
    ) -> Result<Reply, CommandError> {
        let login = validate_required(login, "Login", None)?;
        if password.is_empty() {
            return Err(CommandError::Validation("Password is required".into()));
        }

        let user = match self.credentials.authenticate(&login, password) {
            Ok(user) => user,
            Err(e) => {
                warn!("Failed login for {} from {}", login, session.peer());
                return Err(e.into());
            }
        };

        session.authenticate(user.clone());
        let mut registry = self.registry.lock().await;
        registry.bind(session.peer(), user.clone());
        info!(
            "Client {} authenticated as {} ({} active sessions for this user)",
            session.peer(),
            login,
            registry.sessions_for(&user)
        );

        Ok(Reply::Frame(Response::message("Authenticated")))
    }

    /// Handles LOGOUT. Succeeds whether or not the session was authenticated.
    async fn handle_logout(&self, session: &mut Session) -> Result<Reply, CommandError> {
        if let Some(user) = session.logout() {
            self.registry.lock().await.unbind(&session.peer());
            info!("Client {} logged out from {}", session.peer(), user);
        }

        Ok(Reply::Frame(Response::message("Logged out")))
    }

    fn handle_list(&self, session: &Session, path: &str) -> Result<Reply, CommandError> {
        let user = authenticated_user(session)?;
        let entries = self.storage.list(user, path.trim())?;
        Ok(Reply::Frame(Response::listing(&entries)))
    }

    fn handle_get(&self, session: &Session, path: &str) -> Result<Reply, CommandError> {
        let user = authenticated_user(session)?;
        let path = validate_path(path, "Path", self.config.max_path_length)?;

        let content = self.storage.read(user, &path)?;
        info!("Sending {} ({} bytes) to user {}", path, content.len(), user);

        Ok(Reply::Download {
            metadata: Response::download(file_name(&path), content.len() as u64),
            content,
        })
    }

    /// Handles PUT: validates, then always consumes the announced data frame.
    async fn handle_put<R>(
        &self,
        session: &Session,
        path: &str,
        size: Option<u64>,
        reader: &mut R,
    ) -> Result<Reply, CommandError>
    where
        R: AsyncRead + Unpin,
    {
        let (user, path, size) = match self.check_put(session, path, size) {
            Ok(checked) => checked,
            Err(e) => {
                self.codec.discard_data_frame(reader, size).await?;
                return Err(e);
            }
        };

        let data = self.codec.read_data_frame(reader, size).await?;
        self.storage.write(&user, &path, &data)?;

        Ok(Reply::Frame(Response::message("File saved")))
    }

    fn check_put(
        &self,
        session: &Session,
        path: &str,
        size: Option<u64>,
    ) -> Result<(UserId, String, u64), CommandError> {
        let user = authenticated_user(session)?.clone();
        let path = validate_path(path, "Path", self.config.max_path_length)?;

        let size = size.ok_or_else(|| CommandError::Validation("Invalid file size".into()))?;
        if size > self.storage.max_file_size() {
            return Err(StorageError::FileTooLarge {
                size,
                max: self.storage.max_file_size(),
            }
            .into());
        }

        // Reject bad paths before the payload is buffered
        self.storage.resolve(&user, &path)?;

        Ok((user, path, size))
    }

    fn handle_delete(&self, session: &Session, path: &str) -> Result<Reply, CommandError> {
        let user = authenticated_user(session)?;
        let path = validate_path(path, "Path", self.config.max_path_length)?;

        self.storage.delete(user, &path)?;
        Ok(Reply::Frame(Response::message("Deleted")))
    }

    fn handle_move(
        &self,
        session: &Session,
        source: &str,
        destination: &str,
    ) -> Result<Reply, CommandError> {
        let user = authenticated_user(session)?;
        let max = self.config.max_path_length;
        let source = validate_path(source, "Source path", max)?;
        let destination = validate_path(destination, "Destination path", max)?;

        self.storage.move_entry(user, &source, &destination)?;
        Ok(Reply::Frame(Response::message("Moved")))
    }
}

fn authenticated_user(session: &Session) -> Result<&UserId, CommandError> {
    session.user().ok_or(CommandError::Unauthorized)
}

/// Last segment of a logical path.
fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
