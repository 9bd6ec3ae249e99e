//! Response envelope assembly.
//!
//! # Responsibilities
//! - Turn raw response envelopes into the structured shapes the HTTP
//!   boundary exposes: plain acks, single transactions, valid/compromised
//!   partitions, and multi-level traversal trees
//! - Re-encode every native transaction payload for the boundary
//!
//! # Design Decisions
//! - Absence of a payload field is "not applicable", never an error; a
//!   missing collection yields an empty sequence
//! - A reason field on a payload-bearing envelope means the core failed
//!   the operation: assembly short-circuits to a backend error before any
//!   payload is touched
//! - Input order of payloads and levels is preserved exactly

use crate::codec;
use crate::core::wire::ResponseEnvelope;
use crate::error::{GatewayError, GatewayResult};

/// Result code plus optional reason, for operations with no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub result: u8,
    pub reason: Option<String>,
}

/// Receipt for an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertReceipt {
    /// Hex-encoded identifier assigned to the inserted transaction.
    pub transaction_id: String,
}

/// One re-encoded transaction from a direct lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleTransaction {
    /// Boundary encoding of the located transaction.
    pub transaction: String,
}

/// Search results split by the core's integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedList {
    /// Payloads that passed, in core-reported order.
    pub valid: Vec<String>,
    /// Payloads flagged as compromised, in core-reported order.
    pub compromised: Vec<String>,
}

/// A traversal tree: levels outward from the starting transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeResult {
    /// False when the walk was truncated by the hop-count bound.
    pub all_included: bool,
    /// Level 0 is the starting transaction; each level re-encoded.
    pub levels: Vec<Vec<String>>,
}

/// Assemble an ack. The reason, if any, is data here, not an error: the
/// caller decides how to surface a non-success result code.
pub fn ack(envelope: &ResponseEnvelope) -> Ack {
    Ack {
        result: envelope.result,
        reason: envelope.reason.clone(),
    }
}

/// Assemble an insert receipt from the envelope's transaction identifier.
pub fn insert_receipt(envelope: &ResponseEnvelope) -> GatewayResult<InsertReceipt> {
    fail_on_reason(envelope)?;
    let id = envelope
        .transaction_id
        .as_ref()
        .ok_or_else(|| GatewayError::Backend("response carried no transaction id".to_string()))?;
    Ok(InsertReceipt {
        transaction_id: hex::encode(id),
    })
}

/// Assemble a single re-encoded transaction from a direct lookup.
pub fn single_transaction(envelope: &ResponseEnvelope) -> GatewayResult<SingleTransaction> {
    fail_on_reason(envelope)?;
    let payload = envelope
        .transaction
        .as_ref()
        .ok_or_else(|| GatewayError::Backend("response carried no transaction".to_string()))?;
    Ok(SingleTransaction {
        transaction: codec::encode_native(payload)?,
    })
}

/// Assemble the valid/compromised partition from a conditional search.
///
/// An envelope lacking either collection yields an empty sequence for
/// that side.
pub fn partitioned(envelope: &ResponseEnvelope) -> GatewayResult<PartitionedList> {
    fail_on_reason(envelope)?;
    Ok(PartitionedList {
        valid: encode_all(envelope.transactions.as_deref())?,
        compromised: encode_all(envelope.compromised_transactions.as_deref())?,
    })
}

/// Assemble a traversal tree.
///
/// A reason instead of a tree signals a traversal failure and
/// short-circuits before any level is assembled.
pub fn tree(envelope: &ResponseEnvelope) -> GatewayResult<TreeResult> {
    fail_on_reason(envelope)?;
    let raw_levels = envelope
        .transaction_tree
        .as_ref()
        .ok_or_else(|| GatewayError::Backend("response carried no transaction tree".to_string()))?;

    let mut levels = Vec::with_capacity(raw_levels.len());
    for raw_level in raw_levels {
        let mut level = Vec::with_capacity(raw_level.len());
        for payload in raw_level {
            level.push(codec::encode_native(payload)?);
        }
        levels.push(level);
    }

    Ok(TreeResult {
        all_included: envelope.all_included.unwrap_or(false),
        levels,
    })
}

fn fail_on_reason(envelope: &ResponseEnvelope) -> GatewayResult<()> {
    match &envelope.reason {
        Some(reason) => Err(GatewayError::Backend(reason.clone())),
        None => Ok(()),
    }
}

fn encode_all(payloads: Option<&[Vec<u8>]>) -> GatewayResult<Vec<String>> {
    payloads
        .unwrap_or(&[])
        .iter()
        .map(|p| codec::encode_native(p))
        .collect()
}
