//! Composes extracted predicates into a parameterized query against the
//! fixed `project` relation.

use crate::phrase::{Predicate, PredicateField, PredicateOp, PredicateValue};
use serde::Serialize;
use tokio_postgres::types::ToSql;

pub const TARGET_RELATION: &str = "project";

/// A bound scalar. Values always travel next to the query text, never
/// inside it; the driver performs the binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum BindParam {
    Text(String),
    Int(i64),
}

impl BindParam {
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            BindParam::Text(value) => value,
            BindParam::Int(value) => value,
        }
    }
}

/// A query template plus its positional parameters. Built once per
/// request and discarded after execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuiltQuery {
    pub text: String,
    pub params: Vec<BindParam>,
}

impl BuiltQuery {
    pub fn raw(statement: impl Into<String>) -> Self {
        Self {
            text: statement.into(),
            params: Vec::new(),
        }
    }
}

/// AND-joins the predicates in extraction order. An empty list still
/// produces the neutral all-rows query.
pub fn build(predicates: &[Predicate]) -> BuiltQuery {
    if predicates.is_empty() {
        return BuiltQuery {
            text: format!("SELECT * FROM {TARGET_RELATION}"),
            params: Vec::new(),
        };
    }

    let mut clauses = Vec::with_capacity(predicates.len());
    let mut params = Vec::with_capacity(predicates.len());

    for predicate in predicates {
        let column = match predicate.field {
            PredicateField::Region => "area",
            PredicateField::Year | PredicateField::YearRange => "year",
            PredicateField::Category => "type",
        };
        let op = match predicate.op {
            PredicateOp::Eq => "=",
            PredicateOp::Gte => ">=",
        };

        params.push(match &predicate.value {
            PredicateValue::Text(value) => BindParam::Text(value.clone()),
            PredicateValue::Int(value) => BindParam::Int(*value),
        });
        clauses.push(format!("\"{column}\" {op} ${}", params.len()));
    }

    BuiltQuery {
        text: format!(
            "SELECT * FROM {TARGET_RELATION} WHERE {}",
            clauses.join(" AND ")
        ),
        params,
    }
}

#[cfg(test)]
fn max_dollar_placeholder(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        i += 1;
        if i >= bytes.len() || !bytes[i].is_ascii_digit() {
            continue;
        }

        let mut value = 0usize;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            value = value * 10 + (bytes[i] - b'0') as usize;
            i += 1;
        }

        max = max.max(value);
    }

    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phrase;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_predicates_produce_the_neutral_query() {
        let query = build(&[]);
        assert_eq!(query.text, "SELECT * FROM project");
        assert!(query.params.is_empty());
    }

    #[test]
    fn predicates_join_with_and_in_extraction_order() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let predicates = phrase::extract(
            "query machine-learning projects in City-A over the last 3 years",
            now,
        );
        let query = build(&predicates);

        assert_eq!(
            query.text,
            "SELECT * FROM project WHERE \"area\" = $1 AND \"year\" >= $2 AND \"type\" = $3"
        );
        assert_eq!(
            query.params,
            vec![
                BindParam::Text("City-A".into()),
                BindParam::Int(2023),
                BindParam::Text("machine-learning".into()),
            ]
        );
    }

    #[test]
    fn explicit_year_binds_with_equality() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let predicates = phrase::extract("2024 reports", now);
        let query = build(&predicates);

        assert_eq!(query.text, "SELECT * FROM project WHERE \"year\" = $1");
        assert_eq!(query.params, vec![BindParam::Int(2024)]);
    }

    #[test]
    fn values_never_appear_in_the_query_text() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let predicates = phrase::extract(
            "query machine-learning projects in City-A over the last 3 years",
            now,
        );
        let query = build(&predicates);

        assert!(!query.text.contains("City-A"));
        assert!(!query.text.contains("machine-learning"));
        assert!(!query.text.contains("2023"));
    }

    #[test]
    fn placeholder_arity_matches_the_bind_list() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let phrases = [
            "",
            "2024 reports",
            "projects in the Lakeside district",
            "query machine-learning projects in City-A over the last 3 years",
        ];

        for text in phrases {
            let query = build(&phrase::extract(text, now));
            assert_eq!(
                max_dollar_placeholder(&query.text),
                query.params.len(),
                "placeholders must match params for phrase '{text}': {}",
                query.text
            );
        }
    }
}
