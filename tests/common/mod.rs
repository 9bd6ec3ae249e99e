//! Shared utilities for integration testing.
//!
//! Provides an in-process mock core node speaking the framed, tagged
//! protocol on a loopback port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use ledger_gateway::core::wire::{read_frame, write_frame, RequestFrame, ResponseEnvelope};

/// Start a programmable mock core node.
///
/// For every inbound request frame the responder decides whether to
/// answer; `None` means stay silent (used for handshakes and for
/// timeout injection). The returned address accepts any number of
/// connections, each served independently.
pub async fn start_mock_core<F>(respond: F) -> SocketAddr
where
    F: Fn(&RequestFrame) -> Option<ResponseEnvelope> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let respond = respond.clone();
                    tokio::spawn(async move {
                        let (mut rd, mut wr) = stream.into_split();
                        while let Ok(frame) = read_frame::<_, RequestFrame>(&mut rd).await {
                            if let Some(envelope) = respond(&frame) {
                                if write_frame(&mut wr, &envelope).await.is_err() {
                                    break;
                                }
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Success envelope tagged with the request's query id.
#[allow(dead_code)]
pub fn success_for(frame: &RequestFrame) -> ResponseEnvelope {
    ResponseEnvelope::for_query(frame.query_id)
}

/// Native transaction envelope bytes: format tag 1, then the content.
#[allow(dead_code)]
pub fn native_tx(content: &[u8]) -> Vec<u8> {
    let mut out = 1u16.to_le_bytes().to_vec();
    out.extend_from_slice(content);
    out
}
