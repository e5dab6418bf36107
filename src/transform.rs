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

//! # Exa Data Transformer Module
//!
//! Pure reshaping functions from processed state into the representation
//! each format family consumes: a flat table for delimited and tagged
//! text, a structured object for JSON, a named sheet group for workbooks,
//! and a block list for paginated documents.

use serde_json::{json, Map, Value};

use crate::config::{ExaJsonShape, ExaResolvedConfig};
use crate::dataset::{ExaBlock, ExaDataset};
use crate::errors::Result;
use crate::process::{ExaProcessedData, ExaProcessor};

/// Flat tabular shape consumed by the CSV and TXT serializers.
#[derive(Clone, Debug, Default)]
pub struct ExaTable {
    /// Display labels, visible columns only.
    pub headers: Vec<String>,
    /// Column keys aligned with `headers`.
    pub keys: Vec<String>,
    /// One cell vector per processed row, aligned with `keys`.
    pub rows: Vec<Vec<Value>>,
}

/// One processed sheet for workbook output.
#[derive(Debug)]
pub struct ExaSheet {
    pub name: String,
    pub data: ExaProcessedData,
}

/// Stateless transformer.
pub struct ExaTransformer;

impl ExaTransformer {
    /// Flattens processed data into headers, keys and row vectors.
    pub fn to_table(processed: &ExaProcessedData) -> ExaTable {
        let visible = processed.visible_columns();
        let headers = visible.iter().map(|c| c.header.clone()).collect();
        let keys: Vec<String> = visible.iter().map(|c| c.key.clone()).collect();
        let rows = processed
            .data()
            .iter()
            .map(|row| {
                keys.iter()
                    .map(|key| row.get(key).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        ExaTable {
            headers,
            keys,
            rows,
        }
    }

    /// Builds one of the three structured JSON shapes.
    ///
    /// `array` is a bare row array; `envelope` wraps rows with a success
    /// flag and timestamp; `structured` carries rows, column descriptors,
    /// metadata and statistics.
    pub fn to_structured(processed: &ExaProcessedData, shape: ExaJsonShape) -> Value {
        let rows = Self::visible_rows(processed);
        match shape {
            ExaJsonShape::Array => Value::Array(rows),
            ExaJsonShape::Envelope => json!({
                "success": true,
                "data": rows,
                "metadata": processed.metadata(),
                "timestamp": processed.metadata().created_at,
            }),
            ExaJsonShape::Structured => {
                let columns: Vec<Value> = processed
                    .visible_columns()
                    .iter()
                    .map(|c| {
                        json!({
                            "key": c.key,
                            "header": c.header,
                            "type": c.kind,
                        })
                    })
                    .collect();
                json!({
                    "data": rows,
                    "columns": columns,
                    "metadata": processed.metadata(),
                    "statistics": processed.statistics(),
                })
            }
        }
    }

    /// Resolves the sheet group for workbook output.
    ///
    /// Declared sheets are each processed independently; otherwise a single
    /// sheet is synthesized from the main dataset under the configured name.
    pub fn to_workbook_sheets(
        dataset: &ExaDataset,
        processed: &ExaProcessedData,
        config: &ExaResolvedConfig,
    ) -> Result<Vec<ExaSheet>> {
        if let Some(sheets) = &dataset.sheets {
            if !sheets.is_empty() {
                let mut result = Vec::with_capacity(sheets.len());
                for sheet in sheets {
                    let sub = ExaDataset {
                        rows: sheet.rows.clone(),
                        columns: sheet.columns.clone(),
                        metadata: dataset.metadata.clone(),
                        sheets: None,
                        content: None,
                    };
                    result.push(ExaSheet {
                        name: sheet.name.clone(),
                        data: ExaProcessor::process(&sub, config)?,
                    });
                }
                return Ok(result);
            }
        }
        Ok(vec![ExaSheet {
            name: config.xlsx.sheet_name.clone(),
            data: processed.clone(),
        }])
    }

    /// Resolves the block list for document output.
    ///
    /// Explicit `content` is returned unchanged; otherwise blocks are
    /// synthesized in fixed order: optional cover, title, description
    /// paragraph, data summary, and a single table of visible columns.
    pub fn to_document_blocks(
        dataset: &ExaDataset,
        processed: &ExaProcessedData,
        config: &ExaResolvedConfig,
    ) -> Vec<ExaBlock> {
        if let Some(content) = &dataset.content {
            if !content.is_empty() {
                return content.clone();
            }
        }

        let meta = processed.metadata();
        let mut blocks = Vec::new();

        if config.pdf.cover.enabled {
            blocks.push(ExaBlock::Cover {
                title: config
                    .pdf
                    .cover
                    .title
                    .clone()
                    .unwrap_or_else(|| meta.title.clone()),
                subtitle: config.pdf.cover.subtitle.clone(),
                logo: config.pdf.cover.logo.clone(),
            });
        }

        blocks.push(ExaBlock::Title {
            text: meta.title.clone(),
        });

        if let Some(description) = &meta.description {
            blocks.push(ExaBlock::Paragraph {
                text: description.clone(),
            });
        }

        blocks.push(ExaBlock::Paragraph {
            text: format!(
                "{} registros, {} columnas. Generado: {}",
                meta.row_count, meta.column_count, meta.created_at
            ),
        });

        let table = Self::to_table(processed);
        blocks.push(ExaBlock::Table {
            headers: table.headers,
            rows: table.rows,
        });

        blocks
    }

    fn visible_rows(processed: &ExaProcessedData) -> Vec<Value> {
        let keys: Vec<&str> = processed
            .visible_columns()
            .iter()
            .map(|c| c.key.as_str())
            .collect();
        processed
            .data()
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for key in &keys {
                    object.insert(
                        (*key).to_string(),
                        row.get(*key).cloned().unwrap_or(Value::Null),
                    );
                }
                Value::Object(object)
            })
            .collect()
    }
}
