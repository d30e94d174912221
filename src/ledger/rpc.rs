use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use reqwest::StatusCode;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use super::{LedgerClient, LedgerError, LedgerRequest, LedgerResponse};

#[derive(Serialize)]
struct RpcCall<'a> {
    jsonrpc: &'static str,
    id: u64,
    #[serde(flatten)]
    request: &'a LedgerRequest,
}

#[derive(Deserialize)]
struct RpcReply {
    result: Option<LedgerResponse>,
    error: Option<RpcFault>,
}

#[derive(Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
}

/// A [`LedgerClient`] speaking JSON-RPC 2.0 over HTTP.
pub struct RpcLedgerClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }
}

/// Turn an HTTP reply into the outcome of `method`. A JSON-RPC fault is
/// reported as such whatever the HTTP status; any other non-2xx reply keeps
/// its body.
fn interpret(
    method: &'static str,
    status: StatusCode,
    body: &str,
) -> Result<LedgerResponse, LedgerError> {
    match serde_json::from_str::<RpcReply>(body) {
        Ok(RpcReply {
            error: Some(fault), ..
        }) => Err(LedgerError::Rejected {
            method,
            code: fault.code,
            message: fault.message,
        }),
        Ok(RpcReply {
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        _ if !status.is_success() => Err(LedgerError::Http {
            method,
            status: status.as_u16(),
            body: body.to_string(),
        }),
        Ok(_) => Err(LedgerError::Malformed(format!(
            "reply to {method} has neither result nor error"
        ))),
        Err(e) => Err(LedgerError::Malformed(format!("reply to {method}: {e}"))),
    }
}

#[rocket::async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn submit(&self, request: LedgerRequest) -> Result<LedgerResponse, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        debug!("ledger#{id} -> {method}");
        let call = RpcCall {
            jsonrpc: "2.0",
            id,
            request: &request,
        };
        let response = self.client.post(&self.url).json(&call).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let outcome = interpret(method, status, &body);
        if let Err(ref e) = outcome {
            warn!("ledger#{id} {method} failed: {e}");
        }
        outcome
    }
}
