//! Transform engine
//!
//! Turns raw rows into normalized rows for one category:
//!
//! 1. every header is trimmed, lowercased and has spaces replaced by `_`
//! 2. rows are aligned on the union of all columns and missing or null
//!    cells become `""`
//! 3. the category's rule (if any) runs on each row
//!
//! Category rules live in a [`RuleRegistry`]. Adding a category means
//! registering one more entry; the existing entries are never touched and
//! the engine cannot be mutated once built.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde_json::{Map, Number, Value};

use crate::error::TransformError;

/// One row of a sheet: ordered column name -> cell value
pub type Row = Map<String, Value>;

/// A category rule rewrites a single, already normalized row in place
pub type CategoryRule = fn(&mut Row);

/// Stock level strictly below which `low_stock_alert` is raised
pub const LOW_STOCK_THRESHOLD: f64 = 10.0;

/// Closed mapping from category tag to its rule
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, CategoryRule>,
}

impl RuleRegistry {
    /// Registry holding the `financial` and `inventory` rules
    pub fn builtin() -> Self {
        let mut rules: BTreeMap<String, CategoryRule> = BTreeMap::new();
        rules.insert("financial".to_string(), rules::financial);
        rules.insert("inventory".to_string(), rules::inventory);
        Self { rules }
    }

    /// Add a rule for a category that has none yet
    pub fn with_rule(
        mut self,
        category: impl Into<String>,
        rule: CategoryRule,
    ) -> Result<Self, TransformError> {
        let category = category.into();
        if self.rules.contains_key(&category) {
            return Err(TransformError::DuplicateCategory(category));
        }
        self.rules.insert(category, rule);
        Ok(self)
    }

    pub fn get(&self, category: &str) -> Option<CategoryRule> {
        self.rules.get(category).copied()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.rules.contains_key(category)
    }

    /// Registered category tags in sorted order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("categories", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Applies header normalization, the missing-value policy and category rules
#[derive(Debug, Clone)]
pub struct TransformEngine {
    registry: RuleRegistry,
}

impl TransformEngine {
    pub fn new(registry: RuleRegistry) -> Self {
        Self { registry }
    }

    /// Engine over [`RuleRegistry::builtin`]
    pub fn builtin() -> Self {
        Self::new(RuleRegistry::builtin())
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Transform `rows` under `category`.
    ///
    /// Unknown categories only get the common steps.
    pub fn transform(&self, rows: Vec<Row>, category: &str) -> Vec<Row> {
        let rule = self.registry.get(category);
        if rule.is_none() {
            tracing::debug!(category, "No rule registered for category, applying common steps only");
        }

        let normalized: Vec<Row> = rows.into_iter().map(normalize_headers).collect();
        let columns = column_union(&normalized);

        normalized
            .into_iter()
            .map(|row| {
                let mut row = fill_missing(row, &columns);
                if let Some(rule) = rule {
                    rule(&mut row);
                }
                row
            })
            .collect()
    }

    /// Transform rows that arrive as loose JSON values (e.g. a JSON array file)
    pub fn transform_values(
        &self,
        rows: Vec<Value>,
        category: &str,
    ) -> Result<Vec<Row>, TransformError> {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, value)| match value {
                Value::Object(row) => Ok(row),
                other => Err(TransformError::NonObjectRow {
                    index,
                    found: json_kind(&other),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.transform(rows, category))
    }
}

/// Transform with the built-in rules
pub fn transform(rows: Vec<Row>, category: &str) -> Vec<Row> {
    static ENGINE: OnceLock<TransformEngine> = OnceLock::new();
    ENGINE.get_or_init(TransformEngine::builtin).transform(rows, category)
}

/// `" Unit Price "` -> `"unit_price"`
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn normalize_headers(row: Row) -> Row {
    row.into_iter()
        .map(|(name, value)| (normalize_header(&name), value))
        .collect()
}

fn column_union(rows: &[Row]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for name in rows.iter().flat_map(|row| row.keys()) {
        if seen.insert(name.as_str()) {
            columns.push(name.clone());
        }
    }
    columns
}

fn fill_missing(mut row: Row, columns: &[String]) -> Row {
    let mut filled = Row::with_capacity(columns.len());
    for column in columns {
        let value = match row.remove(column) {
            Some(Value::Null) | None => Value::String(String::new()),
            Some(value) => value,
        };
        filled.insert(column.clone(), value);
    }
    filled
}

/// Numeric reading of a cell, `None` when it is not a number.
///
/// Integral values come back as JSON integers, the rest as floats.
pub fn coerce_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) if n.is_f64() => n.as_f64().and_then(number_from_f64),
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(number_from_f64),
        Value::Bool(b) => Some(Number::from(u8::from(*b))),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn number_from_f64(f: f64) -> Option<Number> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Number::from(f as i64))
    } else {
        Number::from_f64(f)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Built-in category rules
pub mod rules {
    use super::{coerce_number, Row, LOW_STOCK_THRESHOLD};
    use serde_json::{Number, Value};

    /// `amount` becomes numeric, unparseable amounts become 0
    pub fn financial(row: &mut Row) {
        if let Some(amount) = row.get_mut("amount") {
            let number = coerce_number(amount).unwrap_or_else(|| Number::from(0));
            *amount = Value::Number(number);
        }
    }

    /// Derives `low_stock_alert` from `stock`; unparseable stock is not low
    pub fn inventory(row: &mut Row) {
        let Some(stock) = row.get("stock") else {
            return;
        };
        let low = coerce_number(stock)
            .and_then(|n| n.as_f64())
            .is_some_and(|level| level < LOW_STOCK_THRESHOLD);
        row.insert("low_stock_alert".to_string(), Value::Bool(low));
    }
}
