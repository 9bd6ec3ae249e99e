//! End-to-end tests: real router, real core client, mock core node.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::net::TcpListener;

use ledger_gateway::config::GatewayConfig;
use ledger_gateway::core::client::CoreClient;
use ledger_gateway::core::wire::CoreCommand;
use ledger_gateway::http::HttpServer;
use ledger_gateway::lifecycle::Shutdown;

mod common;

const DOMAIN_HEX_LEN: usize = 64;

fn domain_hex() -> String {
    "ab".repeat(DOMAIN_HEX_LEN / 2)
}

/// Boot the full gateway against a mock core and return its base URL.
async fn start_gateway(core_addr: std::net::SocketAddr) -> (String, Shutdown) {
    let mut config = GatewayConfig::default();
    config.core.host = core_addr.ip().to_string();
    config.core.port = core_addr.port();
    config.timeouts.query_secs = 1;

    let client = CoreClient::connect(&config.core, &config.timeouts)
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, client);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (format!("http://{}", addr), shutdown)
}

#[tokio::test]
async fn test_insert_transaction_round_trip() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::InsertTransaction { transaction } => {
            assert_eq!(&transaction[..2], &1u16.to_le_bytes());
            let mut envelope = common::success_for(frame);
            envelope.transaction_id = Some(vec![0xAB; 32]);
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/insert_transaction/{}", base, domain_hex()))
        .json(&serde_json::json!({
            "source_user_id": "01".repeat(32),
            "transaction": BASE64.encode(b"opaque transaction bytes"),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["result"], "success");
    assert_eq!(body["transaction_id"], "ab".repeat(32));

    shutdown.trigger();
}

#[tokio::test]
async fn test_search_transaction_returns_reencoded_record() {
    let content = b"ledger entry #42".to_vec();
    let payload = common::native_tx(&content);
    let core = common::start_mock_core(move |frame| match &frame.command {
        CoreCommand::SearchTransaction { transaction_id } => {
            assert_eq!(transaction_id, &vec![0xCD; 32]);
            let mut envelope = common::success_for(frame);
            envelope.transaction = Some(payload.clone());
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/search_transaction/{}", base, domain_hex()))
        .json(&serde_json::json!({
            "transaction_id": "cd".repeat(32),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    // The native header is stripped; only content bytes travel.
    assert_eq!(body["transaction"], BASE64.encode(b"ledger entry #42"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_response_yields_gateway_timeout() {
    // The mock stays silent for searches: the wait must expire, not hang.
    let core = common::start_mock_core(|_| None).await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let start = Instant::now();
    let res = client
        .post(format!("{}/search_transaction/{}", base, domain_hex()))
        .json(&serde_json::json!({ "transaction_id": "00".repeat(32) }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 504);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "returned before deadline");
    assert!(elapsed < Duration::from_secs(5), "wait did not respect deadline");

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no response from core");

    shutdown.trigger();
}

#[tokio::test]
async fn test_conditional_search_partitions_results() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::SearchWithCondition { count, .. } => {
            assert_eq!(*count, 5);
            let mut envelope = common::success_for(frame);
            envelope.transactions =
                Some(vec![common::native_tx(b"ok-1"), common::native_tx(b"ok-2")]);
            envelope.compromised_transactions = Some(vec![common::native_tx(b"bad-1")]);
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!(
            "{}/search_transaction_with_condition/{}",
            base,
            domain_hex()
        ))
        .json(&serde_json::json!({
            "asset_group_id": "11".repeat(32),
            "count": 5,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body["transactions"],
        serde_json::json!([BASE64.encode(b"ok-1"), BASE64.encode(b"ok-2")])
    );
    assert_eq!(
        body["compromised_transactions"],
        serde_json::json!([BASE64.encode(b"bad-1")])
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_traverse_returns_levels_and_flag() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::TraverseTransactions {
            direction,
            hop_count,
            ..
        } => {
            assert_eq!(*direction, 1);
            assert_eq!(*hop_count, 2);
            let mut envelope = common::success_for(frame);
            envelope.transaction_tree = Some(vec![
                vec![common::native_tx(b"a")],
                vec![common::native_tx(b"b"), common::native_tx(b"c")],
                vec![common::native_tx(b"d")],
            ]);
            envelope.all_included = Some(false);
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/traverse_transactions/{}", base, domain_hex()))
        .json(&serde_json::json!({
            "transaction_id": "ee".repeat(32),
            "direction": 1,
            "hop_count": 2,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["include_all_flag"], false);
    let tree = body["transaction_tree"].as_array().unwrap();
    assert_eq!(tree.len(), 3);
    assert_eq!(tree[1].as_array().unwrap().len(), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_backend_reason_passes_through() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::TraverseTransactions { .. } => {
            let mut envelope = common::success_for(frame);
            envelope.result = 1;
            envelope.reason = Some("transaction not found".to_string());
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/traverse_transactions/{}", base, domain_hex()))
        .json(&serde_json::json!({ "transaction_id": "ee".repeat(32) }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 502);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "transaction not found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_validation_fails_before_any_core_call() {
    let frames_seen = Arc::new(AtomicU32::new(0));
    let seen = frames_seen.clone();
    let core = common::start_mock_core(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        None
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();

    // Domain id of the wrong length.
    let res = client
        .post(format!("{}/search_transaction/abcd", base))
        .json(&serde_json::json!({ "transaction_id": "00".repeat(32) }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // Transaction payload that is not valid base64.
    let res = client
        .post(format!("{}/insert_transaction/{}", base, domain_hex()))
        .json(&serde_json::json!({ "transaction": "!!not-base64!!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    assert_eq!(frames_seen.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_domain_setup_ack_carries_result_and_reason() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::SetupDomain { config, .. } => {
            assert!(config.as_deref().unwrap_or("").contains("storage"));
            let mut envelope = common::success_for(frame);
            envelope.result = 1;
            envelope.reason = Some("already exists".to_string());
            Some(envelope)
        }
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/domain_setup", base))
        .json(&serde_json::json!({
            "domain_id": domain_hex(),
            "config": { "storage": "default" },
        }))
        .send()
        .await
        .unwrap();

    // Acks report the core's verdict in the body, not via HTTP status.
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["result"], 1);
    assert_eq!(body["reason"], "already exists");

    shutdown.trigger();
}

#[tokio::test]
async fn test_domain_close_by_path_parameter() {
    let core = common::start_mock_core(|frame| match &frame.command {
        CoreCommand::CloseDomain { .. } => Some(common::success_for(frame)),
        _ => None,
    })
    .await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/domain_close/{}", base, domain_hex()))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["result"], 0);
    assert!(body.get("reason").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_signature_flow_endpoints_are_unimplemented() {
    let core = common::start_mock_core(|_| None).await;
    let (base, shutdown) = start_gateway(core).await;

    let client = reqwest::Client::new();
    for route in [
        "gather_signatures",
        "sendback_signature",
        "sendback_denial_of_sign",
    ] {
        let res = client
            .post(format!("{}/{}", base, route))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 501, "route {}", route);
    }

    shutdown.trigger();
}
