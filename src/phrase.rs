//! Phrase scanner that lifts filter predicates out of free-text data requests.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateField {
    Region,
    Year,
    YearRange,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateOp {
    Eq,
    Gte,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredicateValue {
    Text(String),
    Int(i64),
}

/// One extracted filter condition. The extractor emits predicates in
/// fixed scan order: region, year, category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub field: PredicateField,
    pub op: PredicateOp,
    pub value: PredicateValue,
}

const REGION_SUFFIXES: &[&str] = &["region", "district", "province", "county", "city", "area"];
const CATEGORY_KEYWORDS: &[&str] = &["project", "projects", "type", "types"];

/// Scans `input` for recognized fragments and returns zero or more
/// predicates. Each scan walks the whole token stream independently, so
/// a single token may feed more than one predicate. Unrecognized text
/// simply yields nothing; extraction never fails.
pub fn extract(input: &str, now: DateTime<Utc>) -> Vec<Predicate> {
    let tokens = tokenize(input);
    let mut predicates = Vec::new();

    if let Some(region) = scan_region(&tokens) {
        predicates.push(Predicate {
            field: PredicateField::Region,
            op: PredicateOp::Eq,
            value: PredicateValue::Text(region),
        });
    }

    if let Some(predicate) = scan_year(&tokens, now.year()) {
        predicates.push(predicate);
    }

    if let Some(category) = scan_category(&tokens) {
        predicates.push(Predicate {
            field: PredicateField::Category,
            op: PredicateOp::Eq,
            value: PredicateValue::Text(category),
        });
    }

    predicates
}

fn tokenize(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .map(|raw| {
            raw.trim_matches(|ch: char| ch.is_ascii_punctuation() && ch != '-')
                .to_string()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// First token followed by an administrative suffix keyword wins;
/// otherwise the first bare proper-noun token does. No match means no
/// region filter, not an error.
fn scan_region(tokens: &[String]) -> Option<String> {
    for pair in tokens.windows(2) {
        if REGION_SUFFIXES
            .iter()
            .any(|suffix| pair[1].eq_ignore_ascii_case(suffix))
        {
            return Some(pair[0].clone());
        }
    }

    tokens
        .iter()
        .find(|token| {
            token
                .chars()
                .next()
                .is_some_and(|ch| ch.is_ascii_uppercase())
        })
        .cloned()
}

/// Two mutually exclusive sub-patterns, tried in fixed order: an
/// explicit 4-digit year, then a "last N years" window anchored to the
/// wall-clock year. Only the first match fires.
fn scan_year(tokens: &[String], current_year: i32) -> Option<Predicate> {
    for token in tokens {
        if token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()) {
            let year = token.parse::<i64>().ok()?;
            return Some(Predicate {
                field: PredicateField::Year,
                op: PredicateOp::Eq,
                value: PredicateValue::Int(year),
            });
        }
    }

    for (idx, token) in tokens.iter().enumerate() {
        if !token.eq_ignore_ascii_case("last") && !token.eq_ignore_ascii_case("past") {
            continue;
        }
        let Some(count) = tokens.get(idx + 1).and_then(|t| t.parse::<i64>().ok()) else {
            continue;
        };
        if count <= 0 {
            continue;
        }
        let Some(unit) = tokens.get(idx + 2) else {
            continue;
        };
        if unit.eq_ignore_ascii_case("year") || unit.eq_ignore_ascii_case("years") {
            let start = i64::from(current_year) - count + 1;
            return Some(Predicate {
                field: PredicateField::YearRange,
                op: PredicateOp::Gte,
                value: PredicateValue::Int(start),
            });
        }
    }

    None
}

/// First category keyword with a preceding token yields that token. A
/// keyword opening the phrase has nothing before it and is skipped.
fn scan_category(tokens: &[String]) -> Option<String> {
    tokens.windows(2).find_map(|pair| {
        CATEGORY_KEYWORDS
            .iter()
            .any(|keyword| pair[1].eq_ignore_ascii_case(keyword))
            .then(|| pair[0].clone())
    })
}
