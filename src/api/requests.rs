use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AccountType;
use crate::recon::SourceParams;

/// Body of `POST /ledger/account/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub currency: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub metadata: Option<serde_json::Value>,
}

/// Query parameters for `GET /ledger/events/`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    pub account_id: Uuid,
    pub limit: Option<i64>,
}

/// Body of `POST /recon/run` and `POST /recon/validate-source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReconRequest {
    pub date: NaiveDate,
    pub source: String,
    pub file_path: Option<String>,
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl RunReconRequest {
    pub fn source_params(&self) -> SourceParams {
        SourceParams {
            file_path: self.file_path.clone(),
            base_url: self.base_url.clone(),
            auth_token: self.auth_token.clone(),
        }
    }
}

/// Query parameters for `GET /recon/status/{date}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub source: Option<String>,
}

/// Query parameters for `GET /recon/logs`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogsQuery {
    pub date: NaiveDate,
    pub source: Option<String>,
    pub matched: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
