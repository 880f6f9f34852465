//! The uniform JSON envelope shared by success and failure outcomes.

use crate::executor::ExecutionResult;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// The sole externally visible response contract. `success == false`
/// always carries `data: null`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub data: Option<Vec<Value>>,
    pub message: String,
    pub rows_affected: u64,
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn from_result(result: ExecutionResult, execution_time: f64) -> Self {
        match result {
            ExecutionResult::Rows(records) => {
                let count = records.len() as u64;
                Self {
                    success: true,
                    data: Some(records),
                    message: format!("query executed successfully, {count} rows returned"),
                    rows_affected: count,
                    execution_time,
                    error: None,
                }
            }
            ExecutionResult::Affected(count) => Self {
                success: true,
                data: None,
                message: format!("statement executed successfully, {count} rows affected"),
                rows_affected: count,
                execution_time,
                error: None,
            },
        }
    }

    pub fn failure(kind: &str, message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
            rows_affected: 0,
            execution_time: 0.0,
            error: Some(kind.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub success: bool,
    pub message: String,
    pub version: String,
    pub status: String,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn current() -> Self {
        Self {
            success: true,
            message: "dbrelay is ready".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_results_carry_rows_and_their_count() {
        let records = vec![json!({"id": 1}), json!({"id": 2})];
        let envelope = Envelope::from_result(ExecutionResult::Rows(records), 0.0125);

        assert!(envelope.success);
        assert_eq!(envelope.rows_affected, 2);
        assert_eq!(envelope.data.as_ref().map(Vec::len), Some(2));
        assert!(envelope.error.is_none());
    }

    #[test]
    fn write_results_carry_only_a_count() {
        let envelope = Envelope::from_result(ExecutionResult::Affected(7), 0.5);

        assert!(envelope.success);
        assert_eq!(envelope.rows_affected, 7);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn failures_never_carry_data() {
        let envelope = Envelope::failure("SQLError", "relation does not exist".to_string());
        let rendered = serde_json::to_value(&envelope).unwrap();

        assert_eq!(rendered["success"], json!(false));
        assert_eq!(rendered["data"], json!(null));
        assert_eq!(rendered["error"], json!("SQLError"));
        assert_eq!(rendered["rows_affected"], json!(0));
    }

    #[test]
    fn success_envelope_omits_the_error_field() {
        let envelope = Envelope::from_result(ExecutionResult::Affected(0), 0.0);
        let rendered = serde_json::to_value(&envelope).unwrap();
        assert!(rendered.get("error").is_none());
    }
}
