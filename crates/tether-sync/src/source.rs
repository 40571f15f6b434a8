//! The seam between the scheduler and the request layer.
//!
//! [`TransferSource`] is what the scheduler polls; [`DaemonSource`] is the
//! production implementation over [`DaemonClient`]. Tests drive the
//! scheduler with a scripted source instead of a live daemon.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use tether_core::fields;
use tether_core::{DaemonStats, Transfer, TransferDetail, TransferId};
use tether_rpc::DaemonClient;

use crate::errors::{Result, SyncError};

/// Summary fields requested on every list fetch.
pub const SUMMARY_FIELDS: &[&str] = &[
    "id",
    "slot",
    "name",
    "sizeBytes",
    "addedAt",
    "status",
    "errorCode",
    "errorMessage",
    "progress",
    "rateDown",
    "rateUp",
    "peersConnected",
    "peersSending",
    "peersReceiving",
];

/// One list response from the daemon.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchResponse {
    /// Parsed transfer records.
    pub transfers: Vec<Transfer>,
    /// Transport-local refs removed since the last recent query. Only
    /// meaningful on recent fetches.
    pub removed_slots: Vec<u64>,
    /// Aggregate stats when the response carried them.
    pub stats: Option<DaemonStats>,
}

impl FetchResponse {
    /// Parse a `transfer.list` payload.
    ///
    /// Individual records degrade per field; records without a stable id
    /// are dropped with a diagnostic. A malformed stats object degrades to
    /// zeroes rather than failing the fetch.
    #[must_use]
    pub fn from_arguments(arguments: &Value) -> Self {
        let raw = fields::array_or_empty(arguments, "transfers");
        let transfers: Vec<Transfer> = raw.iter().filter_map(Transfer::from_value).collect();
        let dropped = raw.len() - transfers.len();
        if dropped > 0 {
            warn!(dropped, "dropped transfer records without a stable id");
        }
        Self {
            transfers,
            removed_slots: fields::array_or_empty(arguments, "removed")
                .iter()
                .filter_map(Value::as_u64)
                .collect(),
            stats: arguments.get("stats").map(DaemonStats::from_value),
        }
    }
}

/// What the scheduler needs from the transport.
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// Authoritative full fetch: the complete transfer set.
    async fn fetch_all(&self) -> Result<FetchResponse>;

    /// Delta fetch: recently-changed transfers plus explicit removals.
    async fn fetch_recent(&self) -> Result<FetchResponse>;

    /// Extended record for exactly one transfer. Hard-fails when the
    /// daemon does not return it.
    async fn fetch_detail(&self, id: &TransferId) -> Result<TransferDetail>;

    /// Abort in-flight work during engine destruction.
    fn shutdown(&self) {}
}

/// Production source backed by the RPC client.
pub struct DaemonSource {
    client: DaemonClient,
}

impl DaemonSource {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: DaemonClient) -> Self {
        Self { client }
    }

    fn summary_arguments() -> Value {
        json!({ "fields": SUMMARY_FIELDS })
    }
}

#[async_trait]
impl TransferSource for DaemonSource {
    async fn fetch_all(&self) -> Result<FetchResponse> {
        let arguments = self
            .client
            .call_read("transfer.list", Self::summary_arguments())
            .await?;
        Ok(FetchResponse::from_arguments(&arguments))
    }

    async fn fetch_recent(&self) -> Result<FetchResponse> {
        let mut args = Self::summary_arguments();
        args["ids"] = Value::String("recently-active".into());
        let arguments = self.client.call_read("transfer.list", args).await?;
        Ok(FetchResponse::from_arguments(&arguments))
    }

    async fn fetch_detail(&self, id: &TransferId) -> Result<TransferDetail> {
        let arguments = self
            .client
            .call_read("transfer.detail", json!({ "ids": [id.as_str()] }))
            .await?;
        let transfers = fields::array_or_empty(&arguments, "transfers");
        TransferDetail::from_response(id, transfers).map_err(|e| SyncError::Detail {
            id: id.clone(),
            message: e.to_string(),
        })
    }

    fn shutdown(&self) {
        self.client.destroy();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;
    use tether_rpc::DaemonClientConfig;
    use url::Url;
    use wiremock::matchers::{body_partial_json, method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_list_payload() {
        let resp = FetchResponse::from_arguments(&json!({
            "transfers": [{"id": "a", "slot": 1}, {"id": "b", "slot": 2}, {"noId": true}],
            "removed": [3, 4],
            "stats": {"transferCount": 2}
        }));
        assert_eq!(resp.transfers.len(), 2);
        assert_eq!(resp.removed_slots, vec![3, 4]);
        assert_eq!(resp.stats.unwrap().transfer_count, 2);
    }

    #[test]
    fn empty_payload_parses_to_defaults() {
        let resp = FetchResponse::from_arguments(&Value::Null);
        assert!(resp.transfers.is_empty());
        assert!(resp.removed_slots.is_empty());
        assert!(resp.stats.is_none());
    }

    #[test]
    fn malformed_stats_degrade_to_zero() {
        let resp = FetchResponse::from_arguments(&json!({"stats": "broken"}));
        assert_eq!(resp.stats.unwrap(), DaemonStats::default());
    }

    async fn source_for(server: &MockServer) -> DaemonSource {
        Mock::given(http_method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(json!({"method": "session.open"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .mount(server)
            .await;
        let client = DaemonClient::new(DaemonClientConfig {
            endpoint: Url::parse(&format!("{}/rpc", server.uri())).unwrap(),
            handshake_method: "session.open".into(),
            request_timeout: Duration::from_secs(5),
            read_cache_ttl: Duration::from_millis(50),
            username: None,
            password: None,
        })
        .unwrap();
        DaemonSource::new(client)
    }

    #[tokio::test]
    async fn fetch_recent_requests_recently_active() {
        let server = MockServer::start().await;
        let source = source_for(&server).await;
        Mock::given(http_method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(
                json!({"method": "transfer.list", "arguments": {"ids": "recently-active"}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "arguments": {"transfers": [{"id": "a"}], "removed": [9]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = source.fetch_recent().await.unwrap();
        assert_eq!(resp.transfers.len(), 1);
        assert_eq!(resp.removed_slots, vec![9]);
    }

    #[tokio::test]
    async fn fetch_detail_hard_fails_when_absent() {
        let server = MockServer::start().await;
        let source = source_for(&server).await;
        Mock::given(http_method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(json!({"method": "transfer.detail"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "arguments": {"transfers": []}
            })))
            .mount(&server)
            .await;

        let err = source
            .fetch_detail(&TransferId::from("ghost"))
            .await
            .unwrap_err();
        assert_matches!(err, SyncError::Detail { id, .. } => assert_eq!(id.as_str(), "ghost"));
    }

    #[tokio::test]
    async fn fetch_detail_returns_record() {
        let server = MockServer::start().await;
        let source = source_for(&server).await;
        Mock::given(http_method("POST"))
            .and(path("/rpc"))
            .and(body_partial_json(json!({"method": "transfer.detail"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "arguments": {"transfers": [{"id": "t1", "files": ["a.bin"]}]}
            })))
            .mount(&server)
            .await;

        let detail = source.fetch_detail(&TransferId::from("t1")).await.unwrap();
        assert_eq!(detail.record["files"][0], "a.bin");
    }
}
