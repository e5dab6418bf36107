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

//! # Exa Delimited-Text Serializer
//!
//! CSV generation and its round-trip companion parser. Fields are quoted
//! when they contain the delimiter, a line break or a quote; with
//! `quoteStrings` enabled every non-numeric field is quoted. Embedded
//! quotes are doubled when `escapeQuotes` is on, backslash-escaped
//! otherwise. Before writing, a sample of rows is scanned for cells
//! containing the chosen delimiter and a conflict warning is raised when
//! any are found.

use async_trait::async_trait;

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use serde_json::Value;

use crate::dataset::{ExaDataset, ExaRow};
use crate::config::ExaCsvOptions;
use crate::errors::{ExaError, Result};
use crate::transform::{ExaTable, ExaTransformer};

use super::{ExaArtifact, ExaSerializeInput, ExaSerializer};

/// Rows scanned for delimiter conflicts and size estimation.
const SAMPLE_ROWS: usize = 100;

pub struct ExaCsvSerializer;

#[async_trait]
impl ExaSerializer for ExaCsvSerializer {
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact> {
        let table = ExaTransformer::to_table(input.processed);
        let options = &input.config.csv;

        let mut artifact = ExaArtifact::text(write_table(&table, options)?);
        let conflicts = count_delimiter_conflicts(&table, &options.delimiter);
        if conflicts > 0 {
            artifact = artifact.with_warning(format!(
                "{} cell(s) contain the delimiter '{}' and were quoted",
                conflicts, options.delimiter
            ));
        }
        Ok(artifact)
    }

    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize {
        let table = ExaTransformer::to_table(input.processed);
        let header: usize = table
            .headers
            .iter()
            .map(|h| h.len() + 1)
            .sum();
        let sample: usize = table
            .rows
            .iter()
            .take(SAMPLE_ROWS)
            .map(|row| {
                row.iter()
                    .map(|cell| render_cell(cell).len() + 1)
                    .sum::<usize>()
            })
            .sum();
        let sampled = table.rows.len().min(SAMPLE_ROWS).max(1);
        header + sample / sampled * table.rows.len() + table.rows.len()
    }

    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String> {
        let mut table = ExaTransformer::to_table(input.processed);
        let truncated = table.rows.len() > limit;
        table.rows.truncate(limit);
        let mut text = write_table(&table, &input.config.csv)?;
        if truncated {
            text.push_str("...\n");
        }
        Ok(text)
    }
}

/// Writes a flat table with the configured delimiter, quoting and line
/// break.
pub fn write_table(table: &ExaTable, options: &ExaCsvOptions) -> Result<String> {
    let delimiter = single_byte_delimiter(&options.delimiter)?;

    let mut builder = WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(if options.quote_strings {
            QuoteStyle::NonNumeric
        } else {
            QuoteStyle::Necessary
        })
        .double_quote(options.escape_quotes)
        .terminator(match options.line_break.as_str() {
            "\r\n" => Terminator::CRLF,
            _ => Terminator::Any(b'\n'),
        });
    if !options.escape_quotes {
        builder.escape(b'\\');
    }

    let mut writer = builder.from_writer(Vec::new());

    if options.include_header {
        writer.write_record(&table.headers)?;
    }
    for row in &table.rows {
        let record: Vec<String> = row.iter().map(render_cell).collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ExaError::format("csv", err.to_string()))?;
    let mut text = String::from_utf8(bytes)
        .map_err(|err| ExaError::format("csv", err.to_string()))?;

    // Custom line breaks other than \n and \r\n are substituted after the
    // fact. This rewrites newlines inside quoted fields as well; parse_csv
    // applies the reverse substitution, so round trips hold.
    if options.line_break != "\n" && options.line_break != "\r\n" {
        text = text.replace('\n', &options.line_break);
    }
    Ok(text)
}

/// Counts sampled cells whose value contains the delimiter.
pub fn count_delimiter_conflicts(table: &ExaTable, delimiter: &str) -> usize {
    table
        .rows
        .iter()
        .take(SAMPLE_ROWS)
        .flat_map(|row| row.iter())
        .filter(|cell| matches!(cell, Value::String(s) if s.contains(delimiter)))
        .count()
}

/// Parses CSV text back into a dataset, all values string-typed.
///
/// Honors the configured delimiter, quoting and escaping, so output of
/// [`write_table`] round-trips.
pub fn parse_csv(text: &str, options: &ExaCsvOptions) -> Result<ExaDataset> {
    let delimiter = single_byte_delimiter(&options.delimiter)?;

    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(delimiter)
        .has_headers(options.include_header)
        .double_quote(options.escape_quotes)
        .flexible(true);
    if !options.escape_quotes {
        builder.escape(Some(b'\\'));
    }

    let normalized = if options.line_break != "\n" && options.line_break != "\r\n" {
        text.replace(&options.line_break, "\n")
    } else {
        text.to_string()
    };

    let mut reader = builder.from_reader(normalized.as_bytes());

    let headers: Vec<String> = if options.include_header {
        reader
            .headers()
            .map_err(ExaError::from)?
            .iter()
            .map(str::to_string)
            .collect()
    } else {
        Vec::new()
    };

    let mut rows: Vec<ExaRow> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = ExaRow::new();
        for (index, field) in record.iter().enumerate() {
            let key = headers
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("column{}", index + 1));
            row.insert(key, Value::String(field.to_string()));
        }
        rows.push(row);
    }

    Ok(ExaDataset {
        rows,
        ..Default::default()
    })
}

/// Detects the most likely delimiter by counting candidate occurrences in
/// the first line.
pub fn detect_delimiter(text: &str) -> char {
    let first_line = text.lines().next().unwrap_or("");
    [',', ';', '\t', '|']
        .into_iter()
        .map(|candidate| (candidate, first_line.matches(candidate).count()))
        .max_by_key(|(_, count)| *count)
        .filter(|(_, count)| *count > 0)
        .map(|(candidate, _)| candidate)
        .unwrap_or(',')
}

/// Renders one cell for delimited output.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn single_byte_delimiter(delimiter: &str) -> Result<u8> {
    let mut bytes = delimiter.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(byte), None) => Ok(byte),
        _ => Err(ExaError::format(
            "csv",
            format!("delimiter must be a single character, got '{}'", delimiter),
        )),
    }
}
