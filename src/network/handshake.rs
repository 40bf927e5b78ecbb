//! Version/verack handshake with a single peer
//!
//! Three tasks share the connection:
//! - the reader cuts frames off the stream and queues them inbound
//! - the writer drains the outbound queue, one frame at a time, and reports
//!   every completed write back
//! - the coordinator (the caller's task) validates inbound frames, owns the
//!   [`HandshakeState`] and decides when the exchange is over
//!
//! All three watch one cancellation token. The stream is reassembled and
//! shut down once, after both spawned tasks have returned.

use crate::network::config::HandshakeConfig;
use crate::network::error::{HandshakeError, ProtocolViolation};
use crate::network::frame::{decode_frame, FrameCodec, RawFrame};
use crate::network::message::{Command, OutboundMessage, VersionMessage};
use crate::network::transport::Transport;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

/// Capacity of the inbound, outbound and write-confirmation queues
const QUEUE_CAPACITY: usize = 16;

/// Handshake progress, owned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandshakeState {
    Idle,
    VersionSent,
    PeerVersionReceived,
    /// Our verack is on the wire, the peer's has not arrived
    AckSent,
    /// The peer's verack arrived, ours is not on the wire yet
    AckReceived,
    Complete,
    Failed,
}

impl HandshakeState {
    /// Our version message was written
    pub fn on_version_written(self) -> Self {
        match self {
            HandshakeState::Idle => HandshakeState::VersionSent,
            other => other,
        }
    }

    /// The peer's version message was accepted
    pub fn on_peer_version(self) -> Self {
        match self {
            HandshakeState::Idle | HandshakeState::VersionSent => {
                HandshakeState::PeerVersionReceived
            }
            other => other,
        }
    }

    /// Our verack was written
    pub fn on_ack_written(self) -> Self {
        match self {
            HandshakeState::AckReceived => HandshakeState::Complete,
            HandshakeState::Complete | HandshakeState::Failed => self,
            _ => HandshakeState::AckSent,
        }
    }

    /// The peer's verack arrived
    pub fn on_peer_ack(self) -> Self {
        match self {
            HandshakeState::AckSent => HandshakeState::Complete,
            HandshakeState::Complete | HandshakeState::Failed => self,
            _ => HandshakeState::AckReceived,
        }
    }

    /// One of our messages was written
    pub fn on_written(self, command: &Command) -> Self {
        match command {
            Command::Version => self.on_version_written(),
            Command::VerAck => self.on_ack_written(),
            _ => self,
        }
    }

    pub fn fail(self) -> Self {
        HandshakeState::Failed
    }

    pub fn own_ack_sent(&self) -> bool {
        matches!(self, HandshakeState::AckSent | HandshakeState::Complete)
    }

    pub fn peer_ack_received(&self) -> bool {
        matches!(self, HandshakeState::AckReceived | HandshakeState::Complete)
    }

    pub fn is_complete(&self) -> bool {
        *self == HandshakeState::Complete
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Complete | HandshakeState::Failed)
    }
}

/// Result of a completed handshake
///
/// A failed exchange never produces a report: the [`HandshakeError`] returned
/// by [`Handshaker::run`] stands for [`HandshakeState::Failed`].
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeReport {
    pub state: HandshakeState,
    /// The version message the peer announced
    pub peer_version: Option<VersionMessage>,
    /// Inbound frames processed, including ignored ones
    pub frames_received: usize,
}

/// Runs one handshake attempt per call
pub struct Handshaker {
    config: HandshakeConfig,
    shutdown: CancellationToken,
}

impl Handshaker {
    pub fn new(config: HandshakeConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Abort running handshakes when `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Perform the handshake over `stream`, closing it before returning
    pub async fn run<T: Transport>(&self, stream: T) -> Result<HandshakeReport, HandshakeError> {
        // Encoding problems surface before a single byte is written
        self.config.validate()?;
        let version = OutboundMessage::version(&VersionMessage::new_now(&self.config))?;

        let magic = self.config.magic();
        let cancel = self.shutdown.child_token();
        let (read_half, write_half) = tokio::io::split(stream);

        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (written_tx, written_rx) = mpsc::channel(QUEUE_CAPACITY);
        // One slot per spawned task
        let (failure_tx, failure_rx) = mpsc::channel(2);

        let reader = tokio::spawn(read_frames(
            FramedRead::new(read_half, FrameCodec::new(magic)),
            inbound_tx,
            failure_tx.clone(),
            cancel.clone(),
        ));
        let writer = tokio::spawn(write_frames(
            FramedWrite::new(write_half, FrameCodec::new(magic)),
            outbound_rx,
            written_tx,
            failure_tx,
            cancel.clone(),
        ));

        let mut coordinator = Coordinator {
            config: &self.config,
            state: HandshakeState::Idle,
            outbound: outbound_tx,
            inbound: inbound_rx,
            written: written_rx,
            failures: failure_rx,
            cancel: cancel.clone(),
            peer_version: None,
            frames_received: 0,
        };
        let exchange = coordinator.run(version);
        let result = match self.config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(HandshakeError::HandshakeTimeout(limit))),
            None => exchange.await,
        };

        if let Err(e) = &result {
            log::error!("Handshake failed in state {:?}: {}", coordinator.state, e);
        }

        cancel.cancel();
        close(reader.await, writer.await).await;

        result.map(|()| HandshakeReport {
            state: coordinator.state,
            peer_version: coordinator.peer_version,
            frames_received: coordinator.frames_received,
        })
    }
}

/// Reunite the halves and shut the stream down
async fn close<T: Transport>(
    reader: Result<ReadHalf<T>, tokio::task::JoinError>,
    writer: Result<WriteHalf<T>, tokio::task::JoinError>,
) {
    match (reader, writer) {
        (Ok(read_half), Ok(write_half)) => {
            let mut stream = read_half.unsplit(write_half);
            match stream.shutdown().await {
                Ok(()) => log::debug!("Connection closed"),
                Err(e) => log::warn!("Error closing connection: {}", e),
            }
        }
        (reader, writer) => {
            // Dropping the surviving half releases the stream
            for e in [reader.err(), writer.err()].into_iter().flatten() {
                log::error!("Connection task panicked: {}", e);
            }
        }
    }
}

/// Coordinator-side handshake logic
struct Coordinator<'a> {
    config: &'a HandshakeConfig,
    state: HandshakeState,
    outbound: mpsc::Sender<OutboundMessage>,
    inbound: mpsc::Receiver<RawFrame>,
    written: mpsc::Receiver<Command>,
    failures: mpsc::Receiver<HandshakeError>,
    cancel: CancellationToken,
    peer_version: Option<VersionMessage>,
    frames_received: usize,
}

impl<'a> Coordinator<'a> {
    async fn run(&mut self, version: OutboundMessage) -> Result<(), HandshakeError> {
        self.send(version).await?;

        loop {
            tokio::select! {
                biased;

                Some(raw) = self.inbound.recv() => self.handle_frame(raw).await?,
                Some(command) = self.written.recv() => self.state = self.state.on_written(&command),
                Some(e) = self.failures.recv() => return Err(e),
                _ = self.cancel.cancelled() => return Err(HandshakeError::Cancelled),
            }

            if self.state.is_complete() {
                log::info!("Handshake completed successfully. Closing connection.");
                return Ok(());
            }
        }
    }

    /// Queue `message` for the writer
    ///
    /// A full queue means the writer is stuck on the stream. While waiting for
    /// room, write confirmations keep draining so the writer cannot block on
    /// them in turn.
    async fn send(&mut self, message: OutboundMessage) -> Result<(), HandshakeError> {
        loop {
            tokio::select! {
                biased;

                Some(e) = self.failures.recv() => return Err(e),
                _ = self.cancel.cancelled() => return Err(HandshakeError::Cancelled),
                Some(command) = self.written.recv() => self.state = self.state.on_written(&command),
                permit = self.outbound.reserve() => {
                    let permit =
                        permit.map_err(|_| HandshakeError::Task("writer stopped".to_string()))?;
                    permit.send(message);
                    return Ok(());
                }
            }
        }
    }

    async fn handle_frame(&mut self, raw: RawFrame) -> Result<(), HandshakeError> {
        self.frames_received += 1;

        let frame = decode_frame(self.config.magic(), &raw.header, raw.payload)?;
        log::info!("Received {} message. Checksum is valid.", frame.command);

        match frame.command {
            Command::Version => {
                let version = VersionMessage::decode(&frame.payload)?;
                log::debug!(
                    "Peer version {} ({}), services {:#x}, height {}, relay {}",
                    version.protocol_version,
                    version.user_agent,
                    version.services.bits(),
                    version.start_height,
                    version.relay
                );

                if self.config.is_reserved_identity(&version.user_agent) {
                    return Err(ProtocolViolation::InvalidPeerIdentity(version.user_agent).into());
                }

                self.state = self.state.on_peer_version();
                self.peer_version = Some(version);
                self.send(OutboundMessage::verack()).await?;
            }
            Command::VerAck => {
                self.state = self.state.on_peer_ack();
            }
            command @ (Command::WtxidRelay | Command::SendAddrV2) => {
                log::debug!("Ignoring {} announcement", command);
            }
            Command::Other(name) => {
                if self
                    .config
                    .unknown_commands
                    .rejects(self.state.peer_ack_received())
                {
                    log::error!("Received unknown command: {}. Closing connection.", name);
                    return Err(ProtocolViolation::UnexpectedCommand(name).into());
                }
                log::debug!("Ignoring {} message after verack", name);
            }
        }

        Ok(())
    }
}

/// Reader task: stream → inbound queue
async fn read_frames<T: Transport>(
    mut frames: FramedRead<ReadHalf<T>, FrameCodec>,
    inbound: mpsc::Sender<RawFrame>,
    failures: mpsc::Sender<HandshakeError>,
    cancel: CancellationToken,
) -> ReadHalf<T> {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        let error = match next {
            Some(Ok(raw)) => {
                log::debug!(
                    "Read {} frame ({} bytes)",
                    raw.header.command_name(),
                    raw.payload.len()
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = inbound.send(raw) => match sent {
                        Ok(()) => continue,
                        Err(_) => break,
                    },
                }
            }
            Some(Err(e)) => e,
            None => HandshakeError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the connection",
            )),
        };

        log::warn!("Failed to read from connection: {}", error);
        let _ = failures.try_send(error);
        cancel.cancel();
        break;
    }

    frames.into_inner()
}

/// Writer task: outbound queue → stream, in submission order
async fn write_frames<T: Transport>(
    mut sink: FramedWrite<WriteHalf<T>, FrameCodec>,
    mut outbound: mpsc::Receiver<OutboundMessage>,
    written: mpsc::Sender<Command>,
    failures: mpsc::Sender<HandshakeError>,
    cancel: CancellationToken,
) -> WriteHalf<T> {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = outbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let command = message.command.clone();
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = sink.send(message) => result,
        };

        match result {
            Ok(()) => {
                log::info!("Sent {} message", command);
                let confirmed = tokio::select! {
                    _ = cancel.cancelled() => break,
                    confirmed = written.send(command) => confirmed,
                };
                if confirmed.is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("Failed to send {} message: {}", command, e);
                let _ = failures.try_send(e);
                cancel.cancel();
                break;
            }
        }
    }

    sink.into_inner()
}
