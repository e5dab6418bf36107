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

//! # Exa Validation Module
//!
//! The validation engine runs before any generation work: it checks dataset
//! shape, configuration shape and system limits, and produces a *cleaned*
//! copy of the dataset (nested values stringified, columns auto-detected)
//! without ever mutating the caller's original.
//!
//! Failure policy: any fatal error aborts the pipeline before the processor
//! runs; warnings are carried through to the final result but do not block
//! generation.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::config::ExaResolvedConfig;
use crate::dataset::{ExaBlock, ExaColumnKind, ExaColumnSpec, ExaDataset, ExaRow};
use crate::deliver::is_plain_filename;
use crate::errors::ExaError;
use crate::formats::ExaFormat;

/// Outcome of a validation pass.
#[derive(Clone, Debug, Default)]
pub struct ExaValidationReport {
    /// False when at least one fatal error was recorded.
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Cleaned dataset, present only when validation passed.
    pub cleaned: Option<ExaDataset>,
}

/// Stateless validation engine.
pub struct ExaValidator;

impl ExaValidator {
    /// Validates a dataset and its resolved configuration for one format.
    pub fn validate(
        dataset: &ExaDataset,
        format: ExaFormat,
        config: &ExaResolvedConfig,
    ) -> ExaValidationReport {
        let mut report = ExaValidationReport::default();

        Self::check_structure(dataset, &mut report);
        Self::check_config(format, config, &mut report);
        Self::check_limits(dataset, config, &mut report);

        report.valid = report.errors.is_empty();
        if report.valid {
            report.cleaned = Some(Self::clean(dataset, config, &mut report.warnings));
        }
        report
    }

    fn check_structure(dataset: &ExaDataset, report: &mut ExaValidationReport) {
        if dataset.is_empty() {
            report.warnings.push("empty data".to_string());
        }

        if let Some(columns) = &dataset.columns {
            let mut seen = std::collections::HashSet::new();
            for spec in columns {
                if spec.key.is_empty() {
                    report.errors.push("column with empty key".to_string());
                    continue;
                }
                if !seen.insert(spec.key.as_str()) {
                    report
                        .errors
                        .push(format!("duplicate column key '{}'", spec.key));
                }
                let referenced = dataset.rows.iter().any(|row| row.contains_key(&spec.key));
                if !dataset.rows.is_empty() && !referenced {
                    report.warnings.push(format!(
                        "column '{}' does not match any row key",
                        spec.key
                    ));
                }
            }
        }

        if let Some(meta) = &dataset.metadata {
            if let Some(created) = &meta.created_at {
                if parse_date(created).is_none() {
                    report.errors.push(format!(
                        "metadata createdAt '{}' is not a valid date",
                        created
                    ));
                }
            }
        }

        if let Some(sheets) = &dataset.sheets {
            for (index, sheet) in sheets.iter().enumerate() {
                if sheet.name.trim().is_empty() {
                    report
                        .errors
                        .push(format!("sheet {} is missing a name", index));
                }
            }
        }

        if let Some(content) = &dataset.content {
            for (index, block) in content.iter().enumerate() {
                match block {
                    ExaBlock::Cover { title, .. } if title.trim().is_empty() => {
                        report
                            .errors
                            .push(format!("cover block {} requires a title", index));
                    }
                    ExaBlock::Title { text } if text.trim().is_empty() => {
                        report
                            .errors
                            .push(format!("title block {} requires text", index));
                    }
                    ExaBlock::Image { source, .. } if source.trim().is_empty() => {
                        report
                            .errors
                            .push(format!("image block {} requires a source", index));
                    }
                    ExaBlock::Table { headers, rows } if headers.is_empty() && rows.is_empty() => {
                        report
                            .warnings
                            .push(format!("table block {} is empty", index));
                    }
                    _ => {}
                }
            }
        }
    }

    fn check_config(
        format: ExaFormat,
        config: &ExaResolvedConfig,
        report: &mut ExaValidationReport,
    ) {
        let filename = &config.common.filename;
        if !is_plain_filename(filename) {
            report
                .errors
                .push("filename must not contain path separators".to_string());
        }

        match format {
            ExaFormat::Csv => {
                if config.csv.delimiter.chars().count() != 1 {
                    report
                        .errors
                        .push("csv delimiter must be a single character".to_string());
                }
                if config.csv.line_break != "\n" && config.csv.line_break != "\r\n" {
                    report
                        .warnings
                        .push("unusual line break; expected \\n or \\r\\n".to_string());
                }
            }
            ExaFormat::Xlsx => {
                for (label, color) in [
                    ("headerStyle.backgroundColor", &config.xlsx.header_style.background_color),
                    ("headerStyle.textColor", &config.xlsx.header_style.text_color),
                ] {
                    if !is_hex_color(color) {
                        report
                            .warnings
                            .push(format!("{} '{}' is not a #RRGGBB color", label, color));
                    }
                }
                if config.xlsx.zoom < 10 || config.xlsx.zoom > 400 {
                    report
                        .warnings
                        .push("zoom outside 10-400 will be clamped".to_string());
                }
                if config.xlsx.sheet_name.trim().is_empty() {
                    report.errors.push("sheetName must not be empty".to_string());
                }
            }
            ExaFormat::Pdf => {
                for (label, color) in [
                    ("branding.primaryColor", &config.pdf.branding.primary_color),
                    ("branding.secondaryColor", &config.pdf.branding.secondary_color),
                ] {
                    if !is_hex_color(color) {
                        report
                            .warnings
                            .push(format!("{} '{}' is not a #RRGGBB color", label, color));
                    }
                }
                if config.pdf.page_margins.iter().any(|m| *m < 0.0) {
                    report
                        .warnings
                        .push("negative page margins are treated as zero".to_string());
                }
            }
            ExaFormat::Txt => {
                if config.txt.min_column_width > config.txt.max_column_width {
                    report.errors.push(
                        "minColumnWidth may not exceed maxColumnWidth".to_string(),
                    );
                }
            }
            ExaFormat::Json => {
                if config.json.indent > 16 {
                    report
                        .warnings
                        .push("indent larger than 16 is unusual".to_string());
                }
            }
        }
    }

    fn check_limits(
        dataset: &ExaDataset,
        config: &ExaResolvedConfig,
        report: &mut ExaValidationReport,
    ) {
        let limits = &config.limits;

        if dataset.rows.len() > limits.max_rows {
            report.errors.push(
                ExaError::limit(format!(
                    "row count {} exceeds the maximum of {}",
                    dataset.rows.len(),
                    limits.max_rows
                ))
                .to_string(),
            );
        }

        let column_count = match &dataset.columns {
            Some(columns) => columns.len(),
            None => detect_columns(&dataset.rows).len(),
        };
        if column_count > limits.max_columns {
            report.errors.push(
                ExaError::limit(format!(
                    "column count {} exceeds the maximum of {}",
                    column_count, limits.max_columns
                ))
                .to_string(),
            );
        }

        if let Some(sheets) = &dataset.sheets {
            for sheet in sheets {
                if sheet.rows.len() > limits.max_rows {
                    report.errors.push(
                        ExaError::limit(format!(
                            "sheet '{}' row count {} exceeds the maximum of {}",
                            sheet.name,
                            sheet.rows.len(),
                            limits.max_rows
                        ))
                        .to_string(),
                    );
                }
            }
        }
    }

    /// Produces the cleaned copy handed to the processor.
    ///
    /// Nested objects become canonical JSON strings, arrays become
    /// ", "-joined strings, and missing column descriptors are auto-detected
    /// from the data.
    fn clean(
        dataset: &ExaDataset,
        config: &ExaResolvedConfig,
        warnings: &mut Vec<String>,
    ) -> ExaDataset {
        let mut cleaned = dataset.clone();

        let max_cell = config.limits.max_cell_length;
        let mut oversized = 0usize;
        for row in &mut cleaned.rows {
            clean_row(row, max_cell, &mut oversized);
        }
        if let Some(sheets) = &mut cleaned.sheets {
            for sheet in sheets {
                for row in &mut sheet.rows {
                    clean_row(row, max_cell, &mut oversized);
                }
            }
        }
        if oversized > 0 {
            warnings.push(format!(
                "{} cell(s) exceed {} characters and may be truncated by readers",
                oversized, max_cell
            ));
        }

        if cleaned.columns.is_none() && !cleaned.rows.is_empty() {
            cleaned.columns = Some(detect_columns(&cleaned.rows));
        }

        cleaned
    }
}

fn clean_row(row: &mut ExaRow, max_cell: usize, oversized: &mut usize) {
    for (_, value) in row.iter_mut() {
        match value {
            Value::Object(_) => {
                let text = value.to_string();
                *value = Value::String(text);
            }
            Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                *value = Value::String(joined);
            }
            _ => {}
        }
        if let Value::String(text) = value {
            if text.chars().count() > max_cell {
                *oversized += 1;
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Auto-detects column descriptors from the union of row keys.
///
/// Keys appear in first-seen order; the kind is inferred by sampling the
/// first non-null values of each key. Deterministic: two runs over the same
/// rows yield identical descriptors in identical order.
pub fn detect_columns(rows: &[ExaRow]) -> Vec<ExaColumnSpec> {
    const SAMPLE: usize = 50;

    let mut order: Vec<String> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.clone()) {
                order.push(key.clone());
            }
        }
    }

    order
        .into_iter()
        .map(|key| {
            let kind = infer_kind(rows.iter().take(SAMPLE).filter_map(|row| row.get(&key)));
            ExaColumnSpec::new(&key).kind(kind)
        })
        .collect()
}

pub(crate) fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ExaColumnKind {
    let mut sampled = 0usize;
    let mut numbers = 0usize;
    let mut booleans = 0usize;
    let mut dates = 0usize;

    for value in values {
        match value {
            Value::Null => continue,
            Value::Number(_) => numbers += 1,
            Value::Bool(_) => booleans += 1,
            Value::String(text) if parse_date(text).is_some() => dates += 1,
            _ => {}
        }
        sampled += 1;
    }

    if sampled == 0 {
        ExaColumnKind::String
    } else if numbers == sampled {
        ExaColumnKind::Number
    } else if booleans == sampled {
        ExaColumnKind::Boolean
    } else if dates == sampled {
        ExaColumnKind::Date
    } else {
        ExaColumnKind::String
    }
}

/// Parses the date spellings the engine accepts: RFC 3339, `YYYY-MM-DD`
/// and `DD/MM/YYYY`.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%d/%m/%Y") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

fn is_hex_color(text: &str) -> bool {
    // Compiled per call; validation runs once per export.
    Regex::new(r"^#[0-9a-fA-F]{6}$")
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
