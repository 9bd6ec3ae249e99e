//! The shared core node connection.
//!
//! # Responsibilities
//! - Establish the single TCP connection to the core node
//! - Transmit tagged request frames (serialized writes)
//! - Run the inbound reader task that drains tagged responses and hands
//!   each to the correlator
//! - Fire-and-forget session handshakes (register / unregister)
//!
//! # Design Decisions
//! - Exactly one connection; the write half sits behind an async mutex
//!   held only for the duration of one frame write, never across a wait
//! - The reader task owns the read half outright and never blocks on
//!   handler tasks; delivery is a oneshot send
//! - Connection loss fails every in-flight wait and poisons the client;
//!   it never takes the gateway process down. Re-establishment is the
//!   caller's concern, not ours.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

use crate::config::{CoreConfig, TimeoutConfig};
use crate::core::correlator::QueryCorrelator;
use crate::core::wire::{
    read_frame, write_frame, CoreCommand, DomainId, QueryId, RequestFrame, ResponseEnvelope,
    UserId,
};
use crate::error::{GatewayError, GatewayResult};

/// Client side of the core node protocol.
pub struct CoreClient {
    /// Write half of the shared stream. Locked per frame write.
    writer: Mutex<OwnedWriteHalf>,
    /// Pending-wait registry shared with the reader task.
    correlator: Arc<QueryCorrelator>,
    /// Deadline applied to every awaited query.
    query_deadline: Duration,
    /// Set by the reader task when the stream dies.
    connection_lost: Arc<AtomicBool>,
}

impl CoreClient {
    /// Connect to the core node and spawn the inbound reader task.
    pub async fn connect(core: &CoreConfig, timeouts: &TimeoutConfig) -> GatewayResult<Arc<Self>> {
        let addr = (core.host.as_str(), core.port);
        let connect = TcpStream::connect(addr);
        let stream = tokio::time::timeout(Duration::from_secs(timeouts.connect_secs), connect)
            .await
            .map_err(|_| GatewayError::Timeout(Duration::from_secs(timeouts.connect_secs)))??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let correlator = Arc::new(QueryCorrelator::new());
        let connection_lost = Arc::new(AtomicBool::new(false));

        let client = Arc::new(Self {
            writer: Mutex::new(write_half),
            correlator: correlator.clone(),
            query_deadline: Duration::from_secs(timeouts.query_secs),
            connection_lost: connection_lost.clone(),
        });

        tokio::spawn(reader_task(read_half, correlator, connection_lost));

        tracing::info!(
            host = %core.host,
            port = core.port,
            "Connected to core node"
        );

        Ok(client)
    }

    /// Build a client around an already-connected stream. Test seam.
    pub fn from_stream(stream: TcpStream, query_deadline: Duration) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let correlator = Arc::new(QueryCorrelator::new());
        let connection_lost = Arc::new(AtomicBool::new(false));
        let client = Arc::new(Self {
            writer: Mutex::new(write_half),
            correlator: correlator.clone(),
            query_deadline,
            connection_lost: connection_lost.clone(),
        });
        tokio::spawn(reader_task(read_half, correlator, connection_lost));
        client
    }

    /// Mint a query id, install its waiter, and transmit the tagged
    /// request. Never blocks on the response.
    pub async fn submit(
        &self,
        command: CoreCommand,
    ) -> GatewayResult<(QueryId, oneshot::Receiver<ResponseEnvelope>)> {
        let (query_id, rx) = self.correlator.register();
        let frame = RequestFrame { query_id, command };

        if let Err(e) = self.send_frame(&frame).await {
            // The wait will never resolve; remove it before reporting.
            self.correlator.discard(query_id);
            return Err(e);
        }

        tracing::debug!(
            query_id = %query_id,
            command = frame.command.name(),
            "Submitted request"
        );
        Ok((query_id, rx))
    }

    /// Submit a command and suspend until its response arrives or the
    /// configured deadline elapses.
    pub async fn call(&self, command: CoreCommand) -> GatewayResult<ResponseEnvelope> {
        let (query_id, rx) = self.submit(command).await?;
        self.correlator
            .await_response(query_id, rx, self.query_deadline)
            .await
    }

    /// Register the connection's active identity. The core does not
    /// answer this handshake, so no wait is installed.
    pub async fn register(&self, domain_id: DomainId, user_id: UserId) -> GatewayResult<()> {
        self.send_fire_and_forget(CoreCommand::Register { domain_id, user_id })
            .await
    }

    /// Clear the connection's active identity. Fire-and-forget as well.
    pub async fn unregister(&self) -> GatewayResult<()> {
        self.send_fire_and_forget(CoreCommand::Unregister).await
    }

    /// Whether the shared stream is known to be gone.
    pub fn is_connected(&self) -> bool {
        !self.connection_lost.load(Ordering::Relaxed)
    }

    pub fn correlator(&self) -> &QueryCorrelator {
        &self.correlator
    }

    async fn send_fire_and_forget(&self, command: CoreCommand) -> GatewayResult<()> {
        let frame = RequestFrame {
            query_id: QueryId::new(),
            command,
        };
        self.send_frame(&frame).await?;
        tracing::debug!(command = frame.command.name(), "Sent handshake frame");
        Ok(())
    }

    async fn send_frame(&self, frame: &RequestFrame) -> GatewayResult<()> {
        if self.connection_lost.load(Ordering::Relaxed) {
            return Err(GatewayError::ConnectionLost);
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, frame)
            .await
            .map_err(|_| GatewayError::ConnectionLost)
    }
}

impl std::fmt::Debug for CoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreClient")
            .field("query_deadline", &self.query_deadline)
            .field("pending", &self.correlator.pending_count())
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Drain the inbound stream, handing every tagged envelope to the
/// correlator. Runs until the stream closes or yields garbage, then fails
/// all in-flight waits and exits; the gateway process keeps serving (every
/// later call reports `ConnectionLost`).
async fn reader_task(
    mut read_half: OwnedReadHalf,
    correlator: Arc<QueryCorrelator>,
    connection_lost: Arc<AtomicBool>,
) {
    loop {
        match read_frame::<_, ResponseEnvelope>(&mut read_half).await {
            Ok(envelope) => {
                correlator.deliver(envelope);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Core connection closed");
                connection_lost.store(true, Ordering::Relaxed);
                correlator.fail_all();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection and answer every request frame by echoing
    /// the query id in an empty success envelope.
    async fn spawn_echo_core(listener: TcpListener) {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut rd, mut wr) = stream.into_split();
            while let Ok(frame) = read_frame::<_, RequestFrame>(&mut rd).await {
                match frame.command {
                    CoreCommand::Register { .. } | CoreCommand::Unregister => {}
                    _ => {
                        let envelope = ResponseEnvelope::for_query(frame.query_id);
                        write_frame(&mut wr, &envelope).await.unwrap();
                    }
                }
            }
        });
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        spawn_echo_core(listener).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let client = CoreClient::from_stream(stream, Duration::from_secs(1));

        let envelope = client
            .call(CoreCommand::SearchTransaction {
                transaction_id: vec![9; 32],
            })
            .await
            .unwrap();
        assert_eq!(envelope.result, crate::core::wire::RESULT_SUCCESS);
        assert_eq!(client.correlator().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_handshakes_receive_no_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        spawn_echo_core(listener).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let client = CoreClient::from_stream(stream, Duration::from_millis(200));

        let domain = DomainId::from_hex(&"aa".repeat(32)).unwrap();
        client.register(domain, UserId::empty()).await.unwrap();
        client.unregister().await.unwrap();

        // A real query on the same stream still correlates correctly.
        let envelope = client
            .call(CoreCommand::CloseDomain { domain_id: domain })
            .await
            .unwrap();
        assert_eq!(envelope.reason, None);
    }

    #[tokio::test]
    async fn test_disconnect_fails_in_flight_waits() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            // Hold the socket briefly, then drop it without answering.
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(stream);
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let client = CoreClient::from_stream(stream, Duration::from_secs(5));

        let err = client
            .call(CoreCommand::SearchTransaction {
                transaction_id: vec![1; 32],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionLost));
        assert!(!client.is_connected());

        accept.await.unwrap();
    }
}
