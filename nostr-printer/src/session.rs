//! Subscription session: reacts to transport lifecycle events, sends the subscription on
//! every connect and runs each inbound frame through classification, cursor advancement
//! and actuation before looking at the next one.

use crate::__private::metrics;
use crate::actuator::{Actuator, Indicator, Printer};
use crate::classifier::{classify, Classification, CursorAdvancer};
use crate::client_command::{ClientCommand, Generation, TransportEvent};
use crate::errors::{CursorError, SessionError, SetupError};
use crate::payment::extract_receipt;
use crate::request::Request;
use crate::store::CursorStore;
use nostr_printer_common::wire::EventOnWire;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Connected, but the cursor could not be read so no subscription was sent.
    Degraded,
    /// Connected and subscribed.
    Streaming,
    /// Connected, but the relay ended the subscription. Idle until the next connection.
    Closed,
}

/// Per-session counters, the in-process side of the diagnostic channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub connections: u64,
    pub subscriptions_sent: u64,
    pub degraded_connections: u64,
    pub frames: u64,
    pub malformed_frames: u64,
    pub stream_ends: u64,
    pub delivered: u64,
    pub cursor_failures: u64,
    pub payload_errors: u64,
    pub receipts: u64,
    pub actuator_failures: u64,
    pub last_error: Option<String>,
}

pub struct Session<S, P, I> {
    subscription_id: String,
    store: S,
    advancer: CursorAdvancer,
    actuator: Actuator<P, I>,
    state: SessionState,
    diagnostics: Diagnostics,
}

impl<S, P, I> Session<S, P, I>
where
    S: CursorStore,
    P: Printer,
    I: Indicator,
{
    pub fn new(
        subscription_id: &str,
        store: S,
        advancer: CursorAdvancer,
        actuator: Actuator<P, I>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            store,
            advancer,
            actuator,
            state: SessionState::Disconnected,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn actuator(&self) -> &Actuator<P, I> {
        &self.actuator
    }

    /// Handles one transport event. Returns the command to hand back to the transport,
    /// if any.
    pub async fn handle(&mut self, event: TransportEvent) -> Option<ClientCommand> {
        match event {
            TransportEvent::Connecting => {
                self.state = SessionState::Connecting;
                None
            }
            TransportEvent::Connected(generation) => self.on_connected(generation),
            TransportEvent::Disconnected(reason) => {
                tracing::info!("disconnected: {reason}");
                self.state = SessionState::Disconnected;
                None
            }
            TransportEvent::Frame(frame) => {
                self.on_frame(&frame).await;
                None
            }
        }
    }

    /// Envelope for the current persisted cursor.
    pub fn subscription(&self) -> Result<Request, SessionError> {
        let filter = self
            .store
            .read_document(self.advancer.key())
            .map_err(|err| SessionError::CursorUnavailable(err.to_string()))?;
        Request::new(self.subscription_id.clone(), &filter)
            .map_err(|err| SessionError::CursorUnavailable(err.to_string()))
    }

    fn on_connected(&mut self, generation: Generation) -> Option<ClientCommand> {
        self.diagnostics.connections += 1;
        metrics::CONNECTIONS.inc();

        match self.subscription() {
            Ok(req) => {
                tracing::info!(generation, "subscribing as {}", self.subscription_id);
                self.state = SessionState::Streaming;
                self.diagnostics.subscriptions_sent += 1;
                Some(ClientCommand::Req((req, generation)))
            }
            Err(err) => {
                tracing::error!(generation, "{err}");
                self.state = SessionState::Degraded;
                self.diagnostics.degraded_connections += 1;
                self.diagnostics.last_error = Some(err.to_string());
                metrics::DEGRADED_CONNECTIONS.inc();
                None
            }
        }
    }

    async fn on_frame(&mut self, frame: &str) {
        self.diagnostics.frames += 1;

        let classification = match classify(frame) {
            Ok(classification) => classification,
            Err(err) => {
                tracing::warn!("{err}: {frame}");
                metrics::track_frame("malformed");
                self.diagnostics.malformed_frames += 1;
                self.diagnostics.last_error = Some(err.to_string());
                return;
            }
        };

        match classification {
            Classification::StreamEnd => {
                tracing::debug!("end of stored events");
                metrics::track_frame("eose");
                self.diagnostics.stream_ends += 1;
            }
            Classification::Notice(message) => {
                tracing::warn!("relay notice: {message}");
                metrics::track_frame("notice");
            }
            Classification::Closed(message) => {
                tracing::warn!("subscription closed by relay: {message}");
                metrics::track_frame("closed");
                self.state = SessionState::Closed;
                self.diagnostics.last_error = Some(format!("subscription closed: {message}"));
            }
            Classification::Delivered(event) => {
                metrics::track_frame("event");
                self.on_event(event).await;
            }
        }
    }

    async fn on_event(&mut self, event: EventOnWire) {
        self.diagnostics.delivered += 1;
        tracing::debug!(id = %event.id, kind = event.kind, created_at = event.created_at, "event");

        // Every observed event moves the cursor, whether or not it prints
        match self.advancer.advance(&mut self.store, event.created_at) {
            Ok(since) => metrics::CURSOR_SINCE.set(i64::try_from(since).unwrap_or(i64::MAX)),
            Err(err) => self.cursor_failure(err),
        }

        match extract_receipt(&event) {
            Ok(Some(receipt)) => {
                tracing::info!(id = %event.id, topic = %receipt.topic, "{}", receipt.line());
                match self.actuator.actuate(&receipt).await {
                    Ok(()) => {
                        self.diagnostics.receipts += 1;
                        metrics::RECEIPTS_PRINTED.inc();
                    }
                    Err(err) => {
                        tracing::error!(id = %event.id, "actuator failed: {err}");
                        self.diagnostics.actuator_failures += 1;
                        self.diagnostics.last_error = Some(err.to_string());
                    }
                }
            }
            Ok(None) => tracing::debug!(id = %event.id, "not a settled payment"),
            Err(err) => {
                tracing::warn!(id = %event.id, "{err}");
                self.diagnostics.payload_errors += 1;
                self.diagnostics.last_error = Some(err.to_string());
                metrics::PAYLOAD_ERRORS.inc();
            }
        }
    }

    fn cursor_failure(&mut self, err: CursorError) {
        let reason = match &err {
            CursorError::CursorReadFailure(_) => "read",
            CursorError::CursorWriteFailure(_) => "write",
            CursorError::CursorInvalid(_) => "invalid",
            CursorError::Overflow(_) => "overflow",
        };
        tracing::error!("{err}");
        metrics::track_cursor_failure(reason);
        self.diagnostics.cursor_failures += 1;
        self.diagnostics.last_error = Some(err.to_string());
    }

    /// Handles one event and forwards the resulting command. Fails if the transport is gone.
    async fn dispatch(
        &mut self,
        event: TransportEvent,
        commands: &Sender<ClientCommand>,
    ) -> Result<(), SetupError> {
        if let Some(command) = self.handle(event).await {
            commands
                .send(command)
                .await
                .map_err(|_| SetupError::TransportClosed)?;
        }
        Ok(())
    }

    /// Processes events until the first connection is up, blinking while waiting.
    pub async fn await_connected(
        &mut self,
        events: &mut Receiver<TransportEvent>,
        commands: &Sender<ClientCommand>,
        timeout: Duration,
        blink_every: Duration,
    ) -> Result<(), SetupError> {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(SetupError::ConnectTimeout(timeout.as_secs()));
            }
            let wait = blink_every.min(deadline - now);

            match tokio::time::timeout(wait, events.recv()).await {
                Ok(Some(event)) => {
                    let connected = matches!(event, TransportEvent::Connected(_));
                    self.dispatch(event, commands).await?;
                    if connected {
                        return Ok(());
                    }
                }
                Ok(None) => return Err(SetupError::TransportClosed),
                Err(_) => {
                    if let Err(err) = self.actuator.blink(1).await {
                        tracing::warn!("indicator: {err}");
                    }
                }
            }
        }
    }

    /// Main loop: one event at a time, in arrival order, until the transport goes away.
    pub async fn run(
        &mut self,
        events: &mut Receiver<TransportEvent>,
        commands: &Sender<ClientCommand>,
    ) {
        while let Some(event) = events.recv().await {
            if self.dispatch(event, commands).await.is_err() {
                break;
            }
        }
        tracing::info!("transport closed, session stopped");
    }
}
