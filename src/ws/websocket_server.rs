use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{error, info, warn};

use crate::control::control::{BrewController, ControlCommand, ControlResponse};
use crate::display::BrewDisplay;
use crate::errors::BrewResult;

pub async fn start_websocket_server<D>(addr: SocketAddr, controller: BrewController<D>) -> BrewResult<()>
where
    D: BrewDisplay + Send + 'static,
{
    let listener = TcpListener::bind(&addr).await?;
    info!("WebSocket server listening on: {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!("New WebSocket connection from: {}", peer_addr);
        tokio::spawn(handle_connection(stream, peer_addr, controller.clone()));
    }

    Ok(())
}

/// Decode one text frame and run it against the brew.
pub fn handle_text<D: BrewDisplay>(text: &str, controller: &BrewController<D>) -> ControlResponse {
    match serde_json::from_str::<ControlCommand>(text) {
        Ok(command) => ControlResponse::from_result(controller.apply(command)),
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            ControlResponse::error(format!("Parse error: {}", e))
        }
    }
}

async fn handle_connection<D>(stream: TcpStream, peer_addr: SocketAddr, controller: BrewController<D>)
where
    D: BrewDisplay + Send + 'static,
{
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed with {}: {}", peer_addr, e);
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let response = handle_text(&text, &controller);
                match serde_json::to_string(&response) {
                    Ok(response_json) => {
                        if let Err(e) = ws_sender.send(Message::Text(response_json)).await {
                            warn!("Failed to send WebSocket response: {}", e);
                            break;
                        }
                    }
                    Err(e) => error!("Failed to encode response: {}", e),
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed by {}", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                    warn!("Failed to send pong: {}", e);
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    info!("WebSocket connection with {} terminated", peer_addr);
}
