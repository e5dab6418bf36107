//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Exa.
//! The Exa project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Exa Data Processor Module
//!
//! The processor turns a cleaned dataset into the canonical intermediate
//! state every serializer consumes: normalized column descriptors, one
//! processed row per input row (formatters applied, nulls replaced), then
//! configured filtering and sorting.
//!
//! Order of operations:
//!
//! 1. Resolve metadata and derived counters
//! 2. Normalize columns (auto-detecting when absent)
//! 3. Format cell values (custom formatter, falling back to the kind's
//!    default rendering on failure; never fatal)
//! 4. Apply the configured filter conjunction
//! 5. Apply the configured single-column sort (stable)

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{ExaFilterOp, ExaFilterRule, ExaResolvedConfig, ExaSortDirection};
use crate::dataset::{ExaAlign, ExaColumn, ExaColumnKind, ExaColumnSpec, ExaDataset, ExaRow};
use crate::errors::Result;
use crate::validate::{detect_columns, infer_kind, parse_date};

/// Resolved dataset metadata plus derived counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaResolvedMeta {
    pub title: String,
    pub author: String,
    pub created_at: String,
    pub description: Option<String>,
    pub row_count: usize,
    pub column_count: usize,
}

/// Per-column numeric summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExaNumericSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Per-column string-length summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExaLengthSummary {
    pub min: usize,
    pub max: usize,
    pub avg: f64,
}

/// Statistics for one column.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExaColumnStats {
    pub present: usize,
    pub empty: usize,
    pub unique: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<ExaNumericSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<ExaLengthSummary>,
}

/// Per-column statistics keyed by column key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExaStatistics {
    pub columns: HashMap<String, ExaColumnStats>,
}

/// Output of the processor: the canonical state serializers consume.
#[derive(Clone, Debug)]
pub struct ExaProcessedData {
    metadata: ExaResolvedMeta,
    columns: Vec<ExaColumn>,
    rows: Vec<ExaRow>,
}

impl ExaProcessedData {
    /// Processed rows, in output order.
    pub fn data(&self) -> &[ExaRow] {
        &self.rows
    }

    /// All normalized columns, visible and hidden.
    pub fn columns(&self) -> &[ExaColumn] {
        &self.columns
    }

    /// Only the columns that appear in generated output.
    pub fn visible_columns(&self) -> Vec<&ExaColumn> {
        self.columns.iter().filter(|c| c.visible).collect()
    }

    /// Resolved metadata with refreshed counters.
    pub fn metadata(&self) -> &ExaResolvedMeta {
        &self.metadata
    }

    /// Copy limited to the first `limit` rows, counters refreshed. Used by
    /// preview and size-estimation paths.
    pub fn truncated(&self, limit: usize) -> ExaProcessedData {
        let rows: Vec<ExaRow> = self.rows.iter().take(limit).cloned().collect();
        let mut metadata = self.metadata.clone();
        metadata.row_count = rows.len();
        ExaProcessedData {
            metadata,
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Computes per-column statistics over the processed rows.
    pub fn statistics(&self) -> ExaStatistics {
        let mut stats = ExaStatistics::default();

        for column in &self.columns {
            let mut entry = ExaColumnStats::default();
            let mut numbers: Vec<f64> = Vec::new();
            let mut lengths: Vec<usize> = Vec::new();
            let mut distinct: HashSet<String> = HashSet::new();

            for row in &self.rows {
                let value = row.get(&column.key).unwrap_or(&Value::Null);
                if is_empty_value(value) {
                    entry.empty += 1;
                    continue;
                }
                entry.present += 1;
                distinct.insert(comparable_string(value));
                match value {
                    Value::Number(n) => {
                        if let Some(f) = n.as_f64() {
                            numbers.push(f);
                        }
                    }
                    Value::String(s) => lengths.push(s.chars().count()),
                    _ => {}
                }
            }

            entry.unique = distinct.len();
            if !numbers.is_empty() {
                let sum: f64 = numbers.iter().sum();
                entry.numeric = Some(ExaNumericSummary {
                    min: numbers.iter().cloned().fold(f64::INFINITY, f64::min),
                    max: numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                    avg: sum / numbers.len() as f64,
                });
            }
            if !lengths.is_empty() {
                let sum: usize = lengths.iter().sum();
                entry.text = Some(ExaLengthSummary {
                    min: *lengths.iter().min().unwrap_or(&0),
                    max: *lengths.iter().max().unwrap_or(&0),
                    avg: sum as f64 / lengths.len() as f64,
                });
            }
            stats.columns.insert(column.key.clone(), entry);
        }

        stats
    }
}

/// Stateless data processor.
pub struct ExaProcessor;

impl ExaProcessor {
    /// Runs the full processing pipeline over a cleaned dataset.
    pub fn process(dataset: &ExaDataset, config: &ExaResolvedConfig) -> Result<ExaProcessedData> {
        let columns = Self::normalize_columns(dataset);

        let mut rows: Vec<ExaRow> = dataset
            .rows
            .iter()
            .map(|row| Self::process_row(row, &columns))
            .collect();

        if !config.common.filters.is_empty() {
            rows.retain(|row| {
                config
                    .common
                    .filters
                    .iter()
                    .all(|rule| row_passes(row, rule))
            });
        }

        if let Some(sort) = &config.common.sort {
            if let Some(column) = columns.iter().find(|c| c.key == sort.column) {
                if column.sortable {
                    let kind = column.kind;
                    let key = column.key.clone();
                    rows.sort_by(|a, b| {
                        let ordering = compare_values(
                            a.get(&key).unwrap_or(&Value::Null),
                            b.get(&key).unwrap_or(&Value::Null),
                            kind,
                        );
                        match sort.direction {
                            ExaSortDirection::Asc => ordering,
                            ExaSortDirection::Desc => ordering.reverse(),
                        }
                    });
                } else {
                    warn!("sort skipped: column '{}' is not sortable", sort.column);
                }
            }
        }

        let metadata = Self::resolve_metadata(dataset, rows.len(), columns.len());

        Ok(ExaProcessedData {
            metadata,
            columns,
            rows,
        })
    }

    /// Normalizes column specs into full descriptors, auto-detecting when
    /// the dataset carries none.
    pub fn normalize_columns(dataset: &ExaDataset) -> Vec<ExaColumn> {
        let specs = match &dataset.columns {
            Some(columns) => columns.clone(),
            None => detect_columns(&dataset.rows),
        };

        specs
            .into_iter()
            .map(|spec| Self::normalize_spec(spec, &dataset.rows))
            .collect()
    }

    fn normalize_spec(spec: ExaColumnSpec, rows: &[ExaRow]) -> ExaColumn {
        const SAMPLE: usize = 50;
        let kind = spec.kind.unwrap_or_else(|| {
            infer_kind(
                rows.iter()
                    .take(SAMPLE)
                    .filter_map(|row| row.get(&spec.key)),
            )
        });
        let align = spec.alignment.unwrap_or(match kind {
            ExaColumnKind::Number => ExaAlign::Right,
            ExaColumnKind::Boolean | ExaColumnKind::Date => ExaAlign::Center,
            ExaColumnKind::String => ExaAlign::Left,
        });
        ExaColumn {
            header: spec.header.unwrap_or_else(|| spec.key.clone()),
            key: spec.key,
            kind,
            visible: spec.visible.unwrap_or(true),
            sortable: spec.sortable.unwrap_or(true),
            align,
            width: spec.width,
            formatter: spec.formatter,
        }
    }

    fn process_row(row: &ExaRow, columns: &[ExaColumn]) -> ExaRow {
        let mut processed = Map::new();
        for column in columns {
            let raw = row.get(&column.key).unwrap_or(&Value::Null);

            let formatted = match &column.formatter {
                Some(formatter) => match formatter(raw) {
                    Ok(value) => value,
                    Err(message) => {
                        warn!(
                            "formatter for column '{}' failed ({}); using default",
                            column.key, message
                        );
                        default_format(column.kind, raw)
                    }
                },
                None => default_format(column.kind, raw),
            };

            processed.insert(column.key.clone(), replace_null(column.kind, formatted));
        }
        processed
    }

    fn resolve_metadata(
        dataset: &ExaDataset,
        row_count: usize,
        column_count: usize,
    ) -> ExaResolvedMeta {
        let meta = dataset.metadata.clone().unwrap_or_default();
        ExaResolvedMeta {
            title: meta.title.unwrap_or_else(|| "Datos".to_string()),
            author: meta.author.unwrap_or_else(|| "Exa".to_string()),
            created_at: meta
                .created_at
                .unwrap_or_else(|| Utc::now().to_rfc3339()),
            description: meta.description,
            row_count,
            column_count,
        }
    }
}

/// Default per-kind rendering applied when no custom formatter is set or a
/// custom formatter fails.
pub fn default_format(kind: ExaColumnKind, value: &Value) -> Value {
    match (kind, value) {
        (_, Value::Null) => Value::Null,
        (ExaColumnKind::Number, Value::Number(_)) => value.clone(),
        (ExaColumnKind::Number, Value::String(text)) => match text.trim().parse::<f64>() {
            Ok(parsed) => serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(text.clone())),
            Err(_) => Value::String(text.clone()),
        },
        (ExaColumnKind::Number, Value::Bool(b)) => Value::Number((*b as i64).into()),
        (ExaColumnKind::Boolean, Value::Bool(_)) => value.clone(),
        (ExaColumnKind::Boolean, Value::String(text)) => match text.trim() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text.clone()),
        },
        (ExaColumnKind::Boolean, Value::Number(n)) => Value::Bool(n.as_f64() != Some(0.0)),
        (ExaColumnKind::Date, Value::String(text)) => match parse_date(text) {
            Some(parsed) => Value::String(parsed.format("%Y-%m-%d").to_string()),
            None => Value::String(text.clone()),
        },
        (ExaColumnKind::String, Value::String(_)) => value.clone(),
        (_, other) => Value::String(comparable_string(other)),
    }
}

fn replace_null(kind: ExaColumnKind, value: Value) -> Value {
    if !value.is_null() {
        return value;
    }
    match kind {
        ExaColumnKind::Number => Value::Number(0.into()),
        ExaColumnKind::Boolean => Value::Bool(false),
        _ => Value::String(String::new()),
    }
}

/// True for null and empty-string cells.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Canonical string form used for comparisons and uniqueness counting.
pub fn comparable_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(*b as i64 as f64),
        _ => None,
    }
}

fn row_passes(row: &ExaRow, rule: &ExaFilterRule) -> bool {
    let cell = row.get(&rule.column).unwrap_or(&Value::Null);
    let target = rule.value.as_ref().unwrap_or(&Value::Null);

    let cell_text = comparable_string(cell);
    let target_text = comparable_string(target);

    match rule.op {
        ExaFilterOp::Equals => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a == b,
            _ => cell_text == target_text,
        },
        ExaFilterOp::NotEquals => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a != b,
            _ => cell_text != target_text,
        },
        ExaFilterOp::Contains => cell_text.contains(&target_text),
        ExaFilterOp::NotContains => !cell_text.contains(&target_text),
        ExaFilterOp::StartsWith => cell_text.starts_with(&target_text),
        ExaFilterOp::EndsWith => cell_text.ends_with(&target_text),
        ExaFilterOp::GreaterThan => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        },
        ExaFilterOp::GreaterOrEqual => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        },
        ExaFilterOp::LessThan => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        },
        ExaFilterOp::LessOrEqual => match (as_number(cell), as_number(target)) {
            (Some(a), Some(b)) => a <= b,
            _ => false,
        },
        ExaFilterOp::IsEmpty => is_empty_value(cell),
        ExaFilterOp::NotEmpty => !is_empty_value(cell),
        // Unknown operators are no-ops: the row passes.
        ExaFilterOp::Unknown => true,
    }
}

fn compare_values(a: &Value, b: &Value, kind: ExaColumnKind) -> Ordering {
    match kind {
        ExaColumnKind::Number => {
            let left = as_number(a).unwrap_or(f64::NEG_INFINITY);
            let right = as_number(b).unwrap_or(f64::NEG_INFINITY);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
        ExaColumnKind::Date => {
            let left = parse_date(&comparable_string(a)).map(|d| d.and_utc().timestamp());
            let right = parse_date(&comparable_string(b)).map(|d| d.and_utc().timestamp());
            left.cmp(&right)
        }
        ExaColumnKind::Boolean => {
            let left = matches!(a, Value::Bool(true));
            let right = matches!(b, Value::Bool(true));
            left.cmp(&right)
        }
        ExaColumnKind::String => comparable_string(a)
            .to_lowercase()
            .cmp(&comparable_string(b).to_lowercase()),
    }
}
