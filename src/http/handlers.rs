//! One handler per exposed operation.
//!
//! Each handler validates its required fields, drives the session gate,
//! submits one tagged request, and hands the resolved envelope to the
//! assembler. Validation failures never reach the core.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::assemble;
use crate::codec;
use crate::core::wire::{CoreCommand, DomainId, ResponseEnvelope, UserId};
use crate::error::{GatewayError, GatewayResult};
use crate::http::server::AppState;

/// Bind the caller's identity, run one query, and always unbind.
///
/// The session guard spans the whole unit of work, so concurrent callers
/// serialize here. The unbind runs even when the query fails; the query's
/// error takes precedence when both fail.
async fn scoped_call(
    state: &AppState,
    domain_id: DomainId,
    user_id: UserId,
    command: CoreCommand,
) -> GatewayResult<ResponseEnvelope> {
    let mut session = state.session.acquire().await;
    session.bind(domain_id, user_id).await?;
    let outcome = state.client.call(command).await;
    let unbind = session.unbind().await;
    let envelope = outcome?;
    unbind?;
    Ok(envelope)
}

fn parse_hex_field(field: &str, value: &str) -> GatewayResult<Vec<u8>> {
    hex::decode(value).map_err(|e| GatewayError::BadRequest(format!("{}: {}", field, e)))
}

fn parse_opt_hex_field(field: &str, value: Option<&str>) -> GatewayResult<Option<Vec<u8>>> {
    value.map(|v| parse_hex_field(field, v)).transpose()
}

fn default_count() -> u32 {
    1
}

fn default_hop_count() -> u32 {
    3
}

#[derive(Debug, Deserialize)]
pub struct DomainSetupRequest {
    pub domain_id: String,
    /// Opaque domain configuration, passed through to the core untouched.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AckBody {
    pub result: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /domain_setup
pub async fn domain_setup(
    State(state): State<AppState>,
    Json(body): Json<DomainSetupRequest>,
) -> Result<Json<AckBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&body.domain_id)?;
    let envelope = state
        .client
        .call(CoreCommand::SetupDomain {
            domain_id,
            config: body.config.map(|v| v.to_string()),
        })
        .await?;

    let ack = assemble::ack(&envelope);
    tracing::debug!(cmd = "domain_setup", result = ack.result, "Operation complete");
    Ok(Json(AckBody {
        result: ack.result,
        reason: ack.reason,
    }))
}

/// GET /domain_close/{domain_id}
pub async fn domain_close(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
) -> Result<Json<AckBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&domain_id)?;
    let envelope = state
        .client
        .call(CoreCommand::CloseDomain { domain_id })
        .await?;

    let ack = assemble::ack(&envelope);
    tracing::debug!(cmd = "domain_close", result = ack.result, "Operation complete");
    Ok(Json(AckBody {
        result: ack.result,
        reason: ack.reason,
    }))
}

#[derive(Debug, Deserialize)]
pub struct InsertTransactionRequest {
    #[serde(default)]
    pub source_user_id: Option<String>,
    /// Header-stripped, text-safe transaction payload.
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct InsertTransactionBody {
    pub result: &'static str,
    pub transaction_id: String,
}

/// POST /insert_transaction/{domain_id}
pub async fn insert_transaction(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
    Json(body): Json<InsertTransactionRequest>,
) -> Result<Json<InsertTransactionBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&domain_id)?;
    let user_id = UserId::from_hex(body.source_user_id.as_deref())?;
    let record = codec::decode(&body.transaction)?;

    let envelope = scoped_call(
        &state,
        domain_id,
        user_id,
        CoreCommand::InsertTransaction {
            transaction: record.to_native(),
        },
    )
    .await?;

    let receipt = assemble::insert_receipt(&envelope)?;
    tracing::debug!(
        cmd = "insert_transaction",
        transaction_id = %receipt.transaction_id,
        "Operation complete"
    );
    Ok(Json(InsertTransactionBody {
        result: "success",
        transaction_id: receipt.transaction_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchTransactionRequest {
    #[serde(default)]
    pub source_user_id: Option<String>,
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct SearchTransactionBody {
    pub result: &'static str,
    pub transaction: String,
}

/// POST /search_transaction/{domain_id}
pub async fn search_transaction(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
    Json(body): Json<SearchTransactionRequest>,
) -> Result<Json<SearchTransactionBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&domain_id)?;
    let user_id = UserId::from_hex(body.source_user_id.as_deref())?;
    let transaction_id = parse_hex_field("transaction_id", &body.transaction_id)?;

    let envelope = scoped_call(
        &state,
        domain_id,
        user_id,
        CoreCommand::SearchTransaction { transaction_id },
    )
    .await?;

    let single = assemble::single_transaction(&envelope)?;
    tracing::debug!(cmd = "search_transaction", "Operation complete");
    Ok(Json(SearchTransactionBody {
        result: "success",
        transaction: single.transaction,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchWithConditionRequest {
    #[serde(default)]
    pub source_user_id: Option<String>,
    #[serde(default)]
    pub asset_group_id: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchWithConditionBody {
    pub result: &'static str,
    pub transactions: Vec<String>,
    pub compromised_transactions: Vec<String>,
}

/// POST /search_transaction_with_condition/{domain_id}
pub async fn search_transaction_with_condition(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
    Json(body): Json<SearchWithConditionRequest>,
) -> Result<Json<SearchWithConditionBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&domain_id)?;
    let user_id = UserId::from_hex(body.source_user_id.as_deref())?;

    let command = CoreCommand::SearchWithCondition {
        asset_group_id: parse_opt_hex_field("asset_group_id", body.asset_group_id.as_deref())?,
        asset_id: parse_opt_hex_field("asset_id", body.asset_id.as_deref())?,
        user_id: parse_opt_hex_field("user_id", body.user_id.as_deref())?,
        count: body.count,
    };

    let envelope = scoped_call(&state, domain_id, user_id, command).await?;

    let parts = assemble::partitioned(&envelope)?;
    tracing::debug!(
        cmd = "search_transaction_with_condition",
        valid = parts.valid.len(),
        compromised = parts.compromised.len(),
        "Operation complete"
    );
    Ok(Json(SearchWithConditionBody {
        result: "success",
        transactions: parts.valid,
        compromised_transactions: parts.compromised,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TraverseTransactionsRequest {
    #[serde(default)]
    pub source_user_id: Option<String>,
    pub transaction_id: String,
    #[serde(default)]
    pub asset_group_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub direction: u8,
    #[serde(default = "default_hop_count")]
    pub hop_count: u32,
}

#[derive(Debug, Serialize)]
pub struct TraverseTransactionsBody {
    pub result: &'static str,
    pub include_all_flag: bool,
    pub transaction_tree: Vec<Vec<String>>,
}

/// POST /traverse_transactions/{domain_id}
pub async fn traverse_transactions(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
    Json(body): Json<TraverseTransactionsRequest>,
) -> Result<Json<TraverseTransactionsBody>, GatewayError> {
    let domain_id = DomainId::from_hex(&domain_id)?;
    let user_id = UserId::from_hex(body.source_user_id.as_deref())?;
    let transaction_id = parse_hex_field("transaction_id", &body.transaction_id)?;

    if body.direction > 1 {
        return Err(GatewayError::BadRequest(format!(
            "direction must be 0 or 1, got {}",
            body.direction
        )));
    }
    if body.hop_count == 0 {
        return Err(GatewayError::BadRequest(
            "hop_count must be positive".to_string(),
        ));
    }

    let command = CoreCommand::TraverseTransactions {
        transaction_id,
        asset_group_id: parse_opt_hex_field("asset_group_id", body.asset_group_id.as_deref())?,
        user_id: parse_opt_hex_field("user_id", body.user_id.as_deref())?,
        direction: body.direction,
        hop_count: body.hop_count,
    };

    let envelope = scoped_call(&state, domain_id, user_id, command).await?;

    let tree = assemble::tree(&envelope)?;
    tracing::debug!(
        cmd = "traverse_transactions",
        levels = tree.levels.len(),
        all_included = tree.all_included,
        "Operation complete"
    );
    Ok(Json(TraverseTransactionsBody {
        result: "success",
        include_all_flag: tree.all_included,
        transaction_tree: tree.levels,
    }))
}

/// The signature-gathering flow exists in the exposed surface but has no
/// working implementation upstream; report that honestly instead of
/// echoing a canned success.
pub async fn not_implemented() -> Response {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(crate::http::response::ErrorBody {
            error: "operation not implemented".to_string(),
        }),
    )
        .into_response()
}
