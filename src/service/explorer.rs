use rocket::serde::json::Value;

use crate::{
    error::{Error, Result},
    ledger::{LedgerClient, LedgerRequest},
    model::common::tx::TxRef,
};

/// Read-only view of the ledger's own records. Nothing here is cached or
/// cross-checked against the store.
pub struct LedgerExplorer<'a> {
    ledger: &'a dyn LedgerClient,
}

impl<'a> LedgerExplorer<'a> {
    pub fn new(ledger: &'a dyn LedgerClient) -> Self {
        Self { ledger }
    }

    /// The chain as the ledger reports it.
    pub async fn chain(&self) -> Result<Value> {
        let response = self.ledger.submit(LedgerRequest::QueryBlockchain {}).await?;
        Ok(response.data)
    }

    pub async fn transaction(&self, id: &str) -> Result<Value> {
        let id = TxRef::new(id)
            .ok_or_else(|| Error::Validation("transaction id must not be empty".to_string()))?;
        let request = LedgerRequest::GetTransaction { id: id.clone() };
        match self.ledger.submit(request).await?.data {
            Value::Null => Err(Error::not_found(format!("Transaction '{id}'"))),
            transaction => Ok(transaction),
        }
    }
}
