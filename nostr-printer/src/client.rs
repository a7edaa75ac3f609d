//! Websocket transport. Owns the connection, reconnects on a fixed interval and turns
//! everything that happens on the socket into [`TransportEvent`]s.

use crate::client_command::{ClientCommand, Generation, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type SocketType = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const CHANNEL_SIZE: usize = 32;

pub struct Client {
    url: String,
    reconnect_interval: Duration,
}

/// Handles returned by [`Client::spawn`].
pub struct ClientChannels {
    pub commands: Sender<ClientCommand>,
    pub events: Receiver<TransportEvent>,
    pub handle: JoinHandle<()>,
}

enum Exit {
    Lost(String),
    Shutdown,
}

impl Client {
    pub fn new(url: &str, reconnect_interval: Duration) -> Self {
        Self {
            url: url.to_string(),
            reconnect_interval,
        }
    }

    /// Starts the connection task. It stops once both channel ends are dropped.
    pub fn spawn(self) -> ClientChannels {
        let (commands, command_rx) = mpsc::channel(CHANNEL_SIZE);
        let (event_tx, events) = mpsc::channel(CHANNEL_SIZE);
        let handle = tokio::spawn(self.run(event_tx, command_rx));
        ClientChannels {
            commands,
            events,
            handle,
        }
    }

    async fn run(self, events: Sender<TransportEvent>, mut commands: Receiver<ClientCommand>) {
        let mut generation: Generation = 0;
        loop {
            if events.send(TransportEvent::Connecting).await.is_err() {
                return;
            }

            match connect_async(self.url.as_str()).await {
                Ok((socket, _)) => {
                    generation += 1;
                    tracing::info!(url = %self.url, generation, "connection established");
                    if events.send(TransportEvent::Connected(generation)).await.is_err() {
                        return;
                    }

                    let reason = match Self::pump(socket, generation, &events, &mut commands).await
                    {
                        Exit::Lost(reason) => reason,
                        Exit::Shutdown => return,
                    };
                    tracing::warn!(url = %self.url, "connection lost: {reason}");
                    if events
                        .send(TransportEvent::Disconnected(reason))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(err) => tracing::warn!(url = %self.url, "cannot connect: {err}"),
            }

            tokio::time::sleep(self.reconnect_interval).await;
        }
    }

    async fn pump(
        socket: SocketType,
        generation: Generation,
        events: &Sender<TransportEvent>,
        commands: &mut Receiver<ClientCommand>,
    ) -> Exit {
        let (mut write, mut read) = socket.split();
        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Frame(text)).await.is_err() {
                            return Exit::Shutdown;
                        }
                    }
                    Some(Ok(Message::Close(_))) => return Exit::Lost("closed by relay".to_string()),
                    Some(Ok(_)) => {} // tungstenite answers pings already
                    Some(Err(err)) => return Exit::Lost(err.to_string()),
                    None => return Exit::Lost("stream ended".to_string()),
                },
                command = commands.recv() => match command {
                    Some(ClientCommand::Req((req, for_generation))) => {
                        if for_generation != generation {
                            tracing::debug!(for_generation, generation, "dropping stale subscription");
                            continue;
                        }
                        let text = req.to_string();
                        tracing::info!("sending {text}");
                        if let Err(err) = write.send(Message::Text(text)).await {
                            return Exit::Lost(err.to_string());
                        }
                    }
                    None => return Exit::Shutdown,
                },
            }
        }
    }
}
