use crate::error::{AppError, Result};
use crate::models::ExternalTxn;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use std::time::Duration;

use super::value_as_string;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The external populations we can reconcile against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    BankCsv,
    Api,
    PaymentProcessor,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Csv,
        SourceKind::BankCsv,
        SourceKind::Api,
        SourceKind::PaymentProcessor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Csv => "csv",
            SourceKind::BankCsv => "bank_csv",
            SourceKind::Api => "api",
            SourceKind::PaymentProcessor => "payment_processor",
        }
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(SourceKind::Csv),
            "bank_csv" => Ok(SourceKind::BankCsv),
            "api" => Ok(SourceKind::Api),
            "payment_processor" => Ok(SourceKind::PaymentProcessor),
            other => Err(AppError::validation(format!("Unknown source: {}", other))),
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied parameters for a source load.
#[derive(Debug, Clone, Default)]
pub struct SourceParams {
    pub file_path: Option<String>,
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
}

impl SourceParams {
    /// Checks that the parameters required by the source kind are present.
    pub fn validate_for(&self, kind: SourceKind) -> Result<()> {
        match kind {
            SourceKind::Csv | SourceKind::BankCsv => self.required_file_path(kind).map(|_| ()),
            SourceKind::Api | SourceKind::PaymentProcessor => {
                self.required_base_url(kind).map(|_| ())
            }
        }
    }

    fn required_file_path(&self, kind: SourceKind) -> Result<String> {
        self.file_path.clone().ok_or_else(|| {
            AppError::validation(format!("file_path required for {} source", kind))
        })
    }

    fn required_base_url(&self, kind: SourceKind) -> Result<String> {
        self.base_url.clone().ok_or_else(|| {
            AppError::validation(format!("base_url required for {} source", kind))
        })
    }
}

/// A configured reader producing normalised external transactions for a
/// date. One variant per source kind; all of them surface load problems as
/// a single fatal error for the whole load.
pub enum SourceLoader {
    Csv { file_path: String },
    BankCsv { file_path: String },
    Api(HttpSource),
    PaymentProcessor(HttpSource),
}

impl SourceLoader {
    pub fn new(kind: SourceKind, params: &SourceParams) -> Result<Self> {
        let loader = match kind {
            SourceKind::Csv => SourceLoader::Csv {
                file_path: params.required_file_path(kind)?,
            },
            SourceKind::BankCsv => SourceLoader::BankCsv {
                file_path: params.required_file_path(kind)?,
            },
            SourceKind::Api => SourceLoader::Api(HttpSource::new(
                params.required_base_url(kind)?,
                params.auth_token.clone(),
            )?),
            SourceKind::PaymentProcessor => SourceLoader::PaymentProcessor(HttpSource::new(
                params.required_base_url(kind)?,
                params.auth_token.clone(),
            )?),
        };
        Ok(loader)
    }

    pub async fn load(&self, date: NaiveDate) -> Result<Vec<ExternalTxn>> {
        match self {
            SourceLoader::Csv { file_path } => {
                let content = tokio::fs::read_to_string(file_path).await?;
                parse_csv(&content)
            }
            SourceLoader::BankCsv { file_path } => {
                let content = tokio::fs::read_to_string(file_path).await?;
                parse_bank_csv(&content)
            }
            SourceLoader::Api(source) => source.fetch_transactions(date).await,
            SourceLoader::PaymentProcessor(source) => source.fetch_settlements(date).await,
        }
    }
}

/// Shared HTTP plumbing for the API-shaped sources.
pub struct HttpSource {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSource {
    fn new(base_url: String, auth_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::source_io(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// `GET {base_url}/transactions?date=YYYY-MM-DD`, expecting
    /// `{"transactions": [{id, amount, currency, timestamp, ...}]}`.
    async fn fetch_transactions(&self, date: NaiveDate) -> Result<Vec<ExternalTxn>> {
        let response = self
            .get("/transactions")
            .query(&[("date", date.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let items = body
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::source_io("API response missing 'transactions' array"))?;

        items.iter().map(parse_api_transaction).collect()
    }

    /// `GET {base_url}/settlements?settlement_date=...&status=settled`.
    /// Each settlement becomes one transaction with the net amount.
    async fn fetch_settlements(&self, date: NaiveDate) -> Result<Vec<ExternalTxn>> {
        let response = self
            .get("/settlements")
            .query(&[
                ("settlement_date", date.to_string()),
                ("status", "settled".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let items = body
            .get("settlements")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::source_io("API response missing 'settlements' array"))?;

        items.iter().map(parse_settlement).collect()
    }
}

fn required_str<'a>(item: &'a Value, key: &str) -> Result<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::validation(format!("Invalid API transaction data: missing {}", key)))
}

fn parse_api_transaction(item: &Value) -> Result<ExternalTxn> {
    let txn_id = required_str(item, "id")?.to_string();
    let amount_raw = item
        .get("amount")
        .ok_or_else(|| AppError::validation("Invalid API transaction data: missing amount"))?;
    let amount = parse_amount(&value_as_string(amount_raw))
        .map_err(|e| AppError::validation(format!("Invalid API transaction data: {}", e)))?;
    let currency = required_str(item, "currency")?.to_uppercase();
    let timestamp = parse_timestamp(required_str(item, "timestamp")?)
        .map_err(|e| AppError::validation(format!("Invalid API transaction data: {}", e)))?;

    let description = item
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    let metadata = item
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(ExternalTxn {
        txn_id,
        amount,
        currency,
        timestamp,
        description,
        metadata,
    })
}

fn parse_settlement(item: &Value) -> Result<ExternalTxn> {
    let txn_id = required_str(item, "settlement_id")?.to_string();
    let amount_raw = item
        .get("net_amount")
        .ok_or_else(|| AppError::validation("Invalid settlement data: missing net_amount"))?;
    let amount = parse_amount(&value_as_string(amount_raw))
        .map_err(|e| AppError::validation(format!("Invalid settlement data: {}", e)))?;
    let currency = required_str(item, "currency")?.to_uppercase();
    let timestamp = parse_timestamp(required_str(item, "settled_at")?)
        .map_err(|e| AppError::validation(format!("Invalid settlement data: {}", e)))?;

    let transaction_count = item
        .get("transaction_count")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let mut metadata = Map::new();
    metadata.insert(
        "settlement_type".to_string(),
        item.get("type").cloned().unwrap_or(Value::Null),
    );
    metadata.insert(
        "transaction_count".to_string(),
        Value::from(transaction_count),
    );
    metadata.insert(
        "fees".to_string(),
        item.get("fees").cloned().unwrap_or(Value::from(0)),
    );

    Ok(ExternalTxn {
        txn_id,
        amount,
        currency,
        timestamp,
        description: Some(format!("Settlement for {} transactions", transaction_count)),
        metadata,
    })
}

const CSV_REQUIRED: [&str; 4] = ["txn_id", "amount", "currency", "timestamp"];
const BANK_CSV_REQUIRED: [&str; 5] = ["transaction_id", "amount", "currency", "date", "description"];

/// Parses the generic CSV format. Required columns per `CSV_REQUIRED`;
/// any other non-empty column lands in the metadata bag. A single bad row
/// fails the whole load.
pub fn parse_csv(content: &str) -> Result<Vec<ExternalTxn>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = validate_headers(&mut reader, &CSV_REQUIRED)?;

    let mut transactions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row_num = index + 2;
        let record =
            record.map_err(|e| AppError::validation(format!("Error parsing row {}: {}", row_num, e)))?;
        let txn = parse_csv_row(&headers, &record)
            .map_err(|e| AppError::validation(format!("Error parsing row {}: {}", row_num, e)))?;
        transactions.push(txn);
    }

    Ok(transactions)
}

/// Parses the bank-statement CSV format. Statements report debits as
/// negative amounts, so the amount is absolute-valued.
pub fn parse_bank_csv(content: &str) -> Result<Vec<ExternalTxn>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = validate_headers(&mut reader, &BANK_CSV_REQUIRED)?;

    let mut transactions = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row_num = index + 2;
        let record =
            record.map_err(|e| AppError::validation(format!("Invalid bank CSV row {}: {}", row_num, e)))?;
        let txn = parse_bank_csv_row(&headers, &record)
            .map_err(|e| AppError::validation(format!("Invalid bank CSV row {}: {}", row_num, e)))?;
        transactions.push(txn);
    }

    Ok(transactions)
}

fn validate_headers(
    reader: &mut csv::Reader<&[u8]>,
    required: &[&str],
) -> Result<Vec<String>> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::validation(format!("Invalid CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<&str> = required
        .iter()
        .filter(|r| !headers.iter().any(|h| h == *r))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(AppError::validation(format!(
            "Missing required columns: {:?}",
            missing
        )));
    }

    Ok(headers)
}

fn field<'a>(headers: &[String], record: &'a csv::StringRecord, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|i| record.get(i))
}

fn parse_csv_row(
    headers: &[String],
    record: &csv::StringRecord,
) -> std::result::Result<ExternalTxn, String> {
    let txn_id = field(headers, record, "txn_id")
        .ok_or("missing txn_id")?
        .trim()
        .to_string();
    let amount = parse_amount(field(headers, record, "amount").ok_or("missing amount")?)?;
    if amount <= Decimal::ZERO {
        return Err(format!("amount must be positive, got {}", amount));
    }
    let currency = field(headers, record, "currency")
        .ok_or("missing currency")?
        .trim()
        .to_uppercase();
    let timestamp = parse_timestamp(field(headers, record, "timestamp").ok_or("missing timestamp")?)?;

    let description = field(headers, record, "description")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut metadata = Map::new();
    for (index, header) in headers.iter().enumerate() {
        if CSV_REQUIRED.contains(&header.as_str()) || header == "description" {
            continue;
        }
        if let Some(value) = record.get(index) {
            let value = value.trim();
            if !value.is_empty() {
                metadata.insert(header.clone(), Value::String(value.to_string()));
            }
        }
    }

    Ok(ExternalTxn {
        txn_id,
        amount,
        currency,
        timestamp,
        description,
        metadata,
    })
}

fn parse_bank_csv_row(
    headers: &[String],
    record: &csv::StringRecord,
) -> std::result::Result<ExternalTxn, String> {
    let txn_id = field(headers, record, "transaction_id")
        .ok_or("missing transaction_id")?
        .trim()
        .to_string();
    let amount_raw = field(headers, record, "amount").ok_or("missing amount")?;
    let amount = parse_amount(amount_raw)?.abs();
    let currency = field(headers, record, "currency")
        .ok_or("missing currency")?
        .trim()
        .to_uppercase();
    let timestamp = parse_timestamp(field(headers, record, "date").ok_or("missing date")?)?;

    let description = field(headers, record, "description")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut metadata = Map::new();
    metadata.insert(
        "source_format".to_string(),
        Value::String("bank_csv".to_string()),
    );
    metadata.insert(
        "original_amount".to_string(),
        Value::String(amount_raw.trim().to_string()),
    );

    Ok(ExternalTxn {
        txn_id,
        amount,
        currency,
        timestamp,
        description,
        metadata,
    })
}

/// Accepts statement-style amounts: currency symbol and thousands
/// separators are stripped before the decimal parse.
fn parse_amount(raw: &str) -> std::result::Result<Decimal, String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    Decimal::from_str(&cleaned).map_err(|_| format!("invalid amount '{}'", raw.trim()))
}

/// Permissive timestamp parse, ISO-8601 preferred. Naive timestamps are
/// taken as UTC; bare dates mean midnight.
fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)));
        }
    }

    Err(format!("invalid timestamp '{}'", trimmed))
}
