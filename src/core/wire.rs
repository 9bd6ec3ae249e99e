//! Wire protocol for the core node connection.
//!
//! # Responsibilities
//! - Define the tagged frame format (query id + command / response envelope)
//! - Define the identity types carried in the session handshake
//! - Read and write length-prefixed frames on the shared stream
//!
//! # Design Decisions
//! - Frames are 4-byte little-endian length + bincode payload
//! - Every outbound request and inbound response carries a QueryId;
//!   the id space is the sole correlation key between the two
//! - A frame length cap bounds allocation on a misbehaving peer

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};

/// Length of domain and user identifiers in bytes.
pub const ID_LENGTH: usize = 32;

/// Upper bound on a single frame's payload.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Result code signalled by the core for a successful operation.
pub const RESULT_SUCCESS: u8 = 0;

/// Correlation token binding one outbound request to its future response.
///
/// A random 128-bit token: process-unique, never reused while a wait is
/// pending, and opaque to both sides of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(Uuid);

impl QueryId {
    /// Mint a fresh query identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Namespace identifier scoping which core dataset a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId([u8; ID_LENGTH]);

impl DomainId {
    /// Parse from a hex-encoded string, enforcing the identifier length.
    pub fn from_hex(s: &str) -> GatewayResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| GatewayError::InvalidIdentity(format!("domain id: {}", e)))?;
        let arr: [u8; ID_LENGTH] = bytes.try_into().map_err(|v: Vec<u8>| {
            GatewayError::InvalidIdentity(format!(
                "domain id must be {} bytes, got {}",
                ID_LENGTH,
                v.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.0
    }

    /// Hex encoding of the identifier.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for DomainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Per-request user identifier. May be empty when a request is not
/// attributed to a specific user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId(Vec<u8>);

impl UserId {
    /// The empty (anonymous) user identifier.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parse from an optional hex-encoded string. Absent means empty.
    pub fn from_hex(s: Option<&str>) -> GatewayResult<Self> {
        match s {
            None => Ok(Self::empty()),
            Some(s) if s.is_empty() => Ok(Self::empty()),
            Some(s) => {
                let bytes = hex::decode(s)
                    .map_err(|e| GatewayError::InvalidIdentity(format!("user id: {}", e)))?;
                if bytes.len() != ID_LENGTH {
                    return Err(GatewayError::InvalidIdentity(format!(
                        "user id must be {} bytes, got {}",
                        ID_LENGTH,
                        bytes.len()
                    )));
                }
                Ok(Self(bytes))
            }
        }
    }

    /// Raw identifier bytes (empty for the anonymous user).
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Operations the gateway issues against the core node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoreCommand {
    /// Create or update a domain on the core node. `config` is an opaque
    /// JSON document passed through untouched.
    SetupDomain {
        domain_id: DomainId,
        config: Option<String>,
    },
    /// Remove a domain from the core node.
    CloseDomain { domain_id: DomainId },
    /// Register the connection's active identity. Fire-and-forget: the
    /// core does not answer this handshake.
    Register { domain_id: DomainId, user_id: UserId },
    /// Clear the connection's active identity. Also fire-and-forget.
    Unregister,
    /// Insert one transaction (native byte form) into the active domain.
    InsertTransaction { transaction: Vec<u8> },
    /// Look up one transaction by identifier.
    SearchTransaction { transaction_id: Vec<u8> },
    /// Search transactions matching any of the given condition fields.
    SearchWithCondition {
        asset_group_id: Option<Vec<u8>>,
        asset_id: Option<Vec<u8>>,
        user_id: Option<Vec<u8>>,
        count: u32,
    },
    /// Walk predecessor/successor links from a starting transaction.
    TraverseTransactions {
        transaction_id: Vec<u8>,
        asset_group_id: Option<Vec<u8>>,
        user_id: Option<Vec<u8>>,
        direction: u8,
        hop_count: u32,
    },
}

impl CoreCommand {
    /// Short operation name for logging and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            CoreCommand::SetupDomain { .. } => "setup_domain",
            CoreCommand::CloseDomain { .. } => "close_domain",
            CoreCommand::Register { .. } => "register",
            CoreCommand::Unregister => "unregister",
            CoreCommand::InsertTransaction { .. } => "insert_transaction",
            CoreCommand::SearchTransaction { .. } => "search_transaction",
            CoreCommand::SearchWithCondition { .. } => "search_with_condition",
            CoreCommand::TraverseTransactions { .. } => "traverse_transactions",
        }
    }
}

/// One outbound tagged request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub query_id: QueryId,
    pub command: CoreCommand,
}

/// One inbound tagged response: a mapping of well-known optional fields.
///
/// Absence of a field means "not applicable to this operation", never a
/// protocol violation. Readers must handle every `None` explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation tag; matches the request's QueryId.
    pub query_id: QueryId,
    /// Operation result code. Zero is success.
    pub result: u8,
    /// Failure reason, present when the core rejects the operation.
    pub reason: Option<String>,
    /// Identifier of an inserted or located transaction.
    pub transaction_id: Option<Vec<u8>>,
    /// Single transaction payload in native byte form.
    pub transaction: Option<Vec<u8>>,
    /// Transaction payloads that passed the core's integrity check.
    pub transactions: Option<Vec<Vec<u8>>>,
    /// Transaction payloads the core flagged as compromised.
    pub compromised_transactions: Option<Vec<Vec<u8>>>,
    /// Tree of traversal levels, level 0 first.
    pub transaction_tree: Option<Vec<Vec<Vec<u8>>>>,
    /// Whether the traversal covered every reachable transaction.
    pub all_included: Option<bool>,
}

impl ResponseEnvelope {
    /// Minimal envelope tagged with a query id.
    pub fn for_query(query_id: QueryId) -> Self {
        Self {
            query_id,
            ..Self::default()
        }
    }
}

/// Write one length-prefixed frame to the stream.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(message)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"))?;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame too large",
        ));
    }
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Read one length-prefixed frame from the stream.
pub async fn read_frame<R, T>(reader: &mut R) -> std::io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame exceeds length cap",
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_id_unique() {
        assert_ne!(QueryId::new(), QueryId::new());
    }

    #[test]
    fn test_domain_id_hex_round_trip() {
        let hex = "ab".repeat(ID_LENGTH);
        let id = DomainId::from_hex(&hex).unwrap();
        assert_eq!(id.to_hex(), hex);
    }

    #[test]
    fn test_domain_id_rejects_wrong_length() {
        assert!(matches!(
            DomainId::from_hex("abcd"),
            Err(GatewayError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_domain_id_rejects_non_hex() {
        let bad = "zz".repeat(ID_LENGTH);
        assert!(matches!(
            DomainId::from_hex(&bad),
            Err(GatewayError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_user_id_may_be_empty() {
        assert!(UserId::from_hex(None).unwrap().is_empty());
        assert!(UserId::from_hex(Some("")).unwrap().is_empty());

        let hex = "01".repeat(ID_LENGTH);
        let id = UserId::from_hex(Some(&hex)).unwrap();
        assert_eq!(id.as_bytes().len(), ID_LENGTH);
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let frame = RequestFrame {
            query_id: QueryId::new(),
            command: CoreCommand::SearchTransaction {
                transaction_id: vec![1, 2, 3],
            },
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: RequestFrame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded, frame);
    }

    #[tokio::test]
    async fn test_read_frame_rejects_oversized_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let result: std::io::Result<RequestFrame> = read_frame(&mut cursor).await;
        assert!(result.is_err());
    }
}
