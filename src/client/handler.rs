use log::{info, warn};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::TcpStream;

use crate::client::Session;
use crate::error::TransportError;
use crate::protocol::CommandDispatcher;

/// Handles one client connection using the Tokio async runtime.
///
/// - Reads control frames one at a time and dispatches each to completion
///   before reading the next.
/// - Ends on clean disconnect, read timeout or any transport error.
/// - Removes the connection from the shared registry on the way out.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    dispatcher: Arc<CommandDispatcher>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    let mut session = Session::new(client_addr);

    serve_connection(&dispatcher, &mut session, &mut reader, &mut writer).await;

    dispatcher.registry().lock().await.remove(&client_addr);
    info!("Client {} disconnected", client_addr);
}

/// Runs the command loop until the connection ends.
pub async fn serve_connection<R, W>(
    dispatcher: &CommandDispatcher,
    session: &mut Session,
    reader: &mut R,
    writer: &mut W,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let client_addr = session.peer();

    loop {
        let frame: Value = match dispatcher.codec().read_control_frame(reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Err(TransportError::Timeout) => {
                info!("Client {} idle past read timeout", client_addr);
                break;
            }
            Err(e) => {
                warn!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        if let Err(e) = dispatcher.dispatch(session, &frame, reader, writer).await {
            warn!("Dropping client {}: {}", client_addr, e);
            break;
        }
    }

    if let Some(user) = session.logout() {
        info!("Session of {} for user {} ended", client_addr, user);
    }
}
