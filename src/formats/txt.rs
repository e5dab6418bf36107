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

//! # Exa Tagged-Text Serializer
//!
//! Plain-text output in four layouts:
//!
//! - `delimited`: separator-joined cells, no quoting
//! - `fixed`: every cell padded or truncated to a pre-computed width
//! - `aligned`: fixed widths joined with a separator string, for reading
//! - `report`: banner, summary section, aligned table, closing banner
//!
//! Column widths are computed once per run as the maximum of the header
//! length and all sampled cell lengths, clamped to the configured minimum
//! and maximum.

use async_trait::async_trait;

use crate::config::{ExaTxtLayout, ExaTxtOptions};
use crate::dataset::{ExaAlign, ExaColumn};
use crate::errors::Result;
use crate::process::{ExaProcessedData, ExaResolvedMeta};
use crate::transform::{ExaTable, ExaTransformer};

use super::csv::render_cell;
use super::{ExaArtifact, ExaSerializeInput, ExaSerializer};

pub struct ExaTxtSerializer;

#[async_trait]
impl ExaSerializer for ExaTxtSerializer {
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact> {
        Ok(ExaArtifact::text(render(
            input.processed,
            &input.config.txt,
        )))
    }

    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize {
        let options = &input.config.txt;
        let table = ExaTransformer::to_table(input.processed);
        let columns = input.processed.visible_columns();
        let widths = compute_widths(&columns, &table, options);
        let line = widths.iter().sum::<usize>()
            + match options.layout {
                ExaTxtLayout::Delimited => options.delimiter.len() * widths.len(),
                ExaTxtLayout::Fixed => 0,
                _ => options.column_separator.len() * widths.len().saturating_sub(1),
            }
            + 1;
        let overhead = match options.layout {
            ExaTxtLayout::Report => options.report_width * 6,
            _ => 0,
        };
        line * (table.rows.len() + 1) + overhead
    }

    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String> {
        let truncated = input.processed.data().len() > limit;
        let sample = input.processed.truncated(limit);
        let mut text = render(&sample, &input.config.txt);
        if truncated {
            text.push_str("...\n");
        }
        Ok(text)
    }
}

/// Renders the configured layout.
pub fn render(processed: &ExaProcessedData, options: &ExaTxtOptions) -> String {
    let table = ExaTransformer::to_table(processed);
    let columns = processed.visible_columns();
    match options.layout {
        ExaTxtLayout::Delimited => render_delimited(&table, options),
        ExaTxtLayout::Fixed => render_padded(&columns, &table, options, ""),
        ExaTxtLayout::Aligned => {
            render_padded(&columns, &table, options, &options.column_separator)
        }
        ExaTxtLayout::Report => render_report(processed.metadata(), &columns, &table, options),
    }
}

/// Width per visible column: `max(header, sampled cells)` clamped to the
/// configured bounds. An explicit width hint on the column wins, clamped
/// the same way.
pub fn compute_widths(
    columns: &[&ExaColumn],
    table: &ExaTable,
    options: &ExaTxtOptions,
) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let width = match column.width {
                Some(hint) => hint as usize,
                None => {
                    let header = table.headers.get(index).map_or(0, |h| h.chars().count());
                    table
                        .rows
                        .iter()
                        .map(|row| {
                            row.get(index)
                                .map_or(0, |cell| render_cell(cell).chars().count())
                        })
                        .fold(header, usize::max)
                }
            };
            width.clamp(options.min_column_width, options.max_column_width)
        })
        .collect()
}

fn render_delimited(table: &ExaTable, options: &ExaTxtOptions) -> String {
    let mut out = String::new();
    out.push_str(&table.headers.join(&options.delimiter));
    out.push('\n');
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        out.push_str(&cells.join(&options.delimiter));
        out.push('\n');
    }
    out
}

fn render_padded(
    columns: &[&ExaColumn],
    table: &ExaTable,
    options: &ExaTxtOptions,
    separator: &str,
) -> String {
    let widths = compute_widths(columns, table, options);
    let mut out = String::new();

    let header_cells: Vec<String> = table
        .headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width, ExaAlign::Left, options.fill_char))
        .collect();
    out.push_str(&header_cells.join(separator));
    out.push('\n');

    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let align = columns.get(index).map_or(ExaAlign::Left, |c| c.align);
                pad(&render_cell(cell), widths[index], align, options.fill_char)
            })
            .collect();
        out.push_str(&cells.join(separator));
        out.push('\n');
    }
    out
}

fn render_report(
    meta: &ExaResolvedMeta,
    columns: &[&ExaColumn],
    table: &ExaTable,
    options: &ExaTxtOptions,
) -> String {
    let banner = "=".repeat(options.report_width);
    let mut out = String::new();

    out.push_str(&banner);
    out.push('\n');
    out.push_str(&center(&meta.title, options.report_width));
    out.push('\n');
    out.push_str(&banner);
    out.push_str("\n\n");

    out.push_str(&format!("Generado: {}\n", meta.created_at));
    out.push_str(&format!("Autor: {}\n", meta.author));
    if let Some(description) = &meta.description {
        out.push_str(description);
        out.push('\n');
    }
    out.push_str(&format!(
        "Registros: {} | Columnas: {}\n\n",
        meta.row_count, meta.column_count
    ));

    out.push_str("Columnas:\n");
    for column in columns {
        out.push_str(&format!("  - {} ({})\n", column.header, column.key));
    }
    out.push('\n');

    out.push_str(&render_padded(
        columns,
        table,
        options,
        &options.column_separator,
    ));

    out.push('\n');
    out.push_str(&banner);
    out.push('\n');
    out
}

fn pad(text: &str, width: usize, align: ExaAlign, fill: char) -> String {
    let truncated: String = text.chars().take(width).collect();
    let missing = width.saturating_sub(truncated.chars().count());
    match align {
        ExaAlign::Left => format!(
            "{}{}",
            truncated,
            fill.to_string().repeat(missing)
        ),
        ExaAlign::Right => format!(
            "{}{}",
            fill.to_string().repeat(missing),
            truncated
        ),
        ExaAlign::Center => {
            let left = missing / 2;
            format!(
                "{}{}{}",
                fill.to_string().repeat(left),
                truncated,
                fill.to_string().repeat(missing - left)
            )
        }
    }
}

fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let left = (width - len) / 2;
    format!("{}{}", " ".repeat(left), text)
}
