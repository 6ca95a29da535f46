//! Backtest surface models.
//!
//! The backend only stubs these endpoints today, so every field the client
//! does not itself send is optional and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BacktestRequest {
    #[serde(rename = "fileId")]
    pub file_id: String,
    pub strategy: String,
    #[cfg_attr(feature = "ts", ts(type = "Record<string, unknown>"))]
    pub parameters: Map<String, Value>,
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Strategy {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "isPublic", default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct BacktestResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "strategyId", default)]
    pub strategy_id: Option<String>,
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(rename = "initialBalance", default)]
    pub initial_balance: Option<f64>,
    #[serde(rename = "finalBalance", default)]
    pub final_balance: Option<f64>,
    #[serde(rename = "totalTrades", default)]
    pub total_trades: Option<i64>,
    #[serde(rename = "winRate", default)]
    pub win_rate: Option<f64>,
    #[serde(rename = "profitFactor", default)]
    pub profit_factor: Option<f64>,
    #[serde(rename = "maxDrawdown", default)]
    pub max_drawdown: Option<f64>,
}

impl BacktestResult {
    /// Net return as a percentage of the initial balance
    pub fn return_pct(&self) -> Option<f64> {
        match (self.initial_balance, self.final_balance) {
            (Some(initial), Some(fin)) if initial != 0.0 => Some((fin - initial) / initial * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UploadResponse {
    #[serde(rename = "fileId", alias = "id", default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
