use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Candidate fall signalled by the alerting service in an event response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAlert {
    pub alert_id: String,
    /// Absolute epoch ms after which silence counts as "help requested".
    pub expiry_at: i64,
    /// Absolute epoch ms at which the confirmation prompt surfaces.
    pub confirm_starts_at: i64,
}

impl PendingAlert {
    pub fn new(alert_id: impl Into<String>, expiry_at: i64, confirm_starts_at: i64) -> Self {
        Self {
            alert_id: alert_id.into(),
            expiry_at,
            confirm_starts_at,
        }
    }

    /// Extract a candidate alert from a `POST /events` response body.
    ///
    /// Anything short of `alert: true` with a usable id and expiry is treated as
    /// "no alert signalled". Ids may arrive as strings or numbers. A missing
    /// `confirmStartsAt` surfaces the prompt immediately.
    pub fn from_event_response(body: &Value) -> Option<Self> {
        if body.get("alert").and_then(Value::as_bool) != Some(true) {
            return None;
        }

        let alert_id = match body.get("alertId")? {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let expiry_at = as_epoch_ms(body.get("expiryAt")?)?;
        let confirm_starts_at = match body.get("confirmStartsAt") {
            None | Some(Value::Null) => 0,
            Some(v) => as_epoch_ms(v)?,
        };

        Some(Self {
            alert_id,
            expiry_at,
            confirm_starts_at,
        })
    }
}

fn as_epoch_ms(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// How a confirmation prompt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertOutcome {
    /// User marked themselves safe.
    Okay,
    /// User asked for help.
    HelpRequested,
    /// Countdown ran out. Reported to the service as help requested.
    Expired,
}

impl AlertOutcome {
    /// Value sent as `ok=` to the confirm endpoint.
    pub fn is_ok(&self) -> bool {
        matches!(self, AlertOutcome::Okay)
    }
}
