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

//! # Exa Data Transformer Tests
//!
//! Tests for the four reshaping targets: flat table, structured JSON,
//! workbook sheet group and document block list.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test transform
//! ```

use exa::dataset::{ExaBlock, ExaSheetSpec};
use exa::{
    ExaColumnKind, ExaColumnSpec, ExaDataset, ExaDatasetMeta, ExaJsonShape, ExaPresets,
    ExaProcessor, ExaResolvedConfig, ExaTransformer,
};
use serde_json::{json, Value};

fn config(overrides: Value) -> ExaResolvedConfig {
    ExaResolvedConfig::resolve(&overrides, &ExaPresets::new()).unwrap()
}

fn sample_dataset() -> ExaDataset {
    ExaDataset::from_rows(vec![
        json!({"id": 1, "name": "Ada", "secret": "x"}),
        json!({"id": 2, "name": "Grace", "secret": "y"}),
    ])
    .with_columns(vec![
        ExaColumnSpec::new("id").kind(ExaColumnKind::Number),
        ExaColumnSpec::new("name").header("Nombre"),
        ExaColumnSpec::new("secret").hidden(),
    ])
}

/// Tests that the flat table carries visible columns only, with headers
/// and keys aligned.
#[test]
fn test_table_excludes_hidden_columns() {
    let dataset = sample_dataset();
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let table = ExaTransformer::to_table(&processed);

    assert_eq!(table.headers, vec!["id", "Nombre"]);
    assert_eq!(table.keys, vec!["id", "name"]);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0], vec![json!(1), json!("Ada")]);
}

/// Tests the bare array shape.
#[test]
fn test_structured_array_shape() {
    let dataset = sample_dataset();
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let value = ExaTransformer::to_structured(&processed, ExaJsonShape::Array);

    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], json!({"id": 1, "name": "Ada"}));
}

/// Tests the envelope shape: success flag, data, metadata and timestamp.
#[test]
fn test_structured_envelope_shape() {
    let dataset = sample_dataset();
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let value = ExaTransformer::to_structured(&processed, ExaJsonShape::Envelope);

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["data"].as_array().unwrap().len(), 2);
    assert_eq!(value["metadata"]["rowCount"], json!(2));
    assert_eq!(value["timestamp"], value["metadata"]["createdAt"]);
}

/// Tests the structured shape: data, column descriptors, metadata and
/// statistics.
#[test]
fn test_structured_full_shape() {
    let dataset = sample_dataset();
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let value = ExaTransformer::to_structured(&processed, ExaJsonShape::Structured);

    let columns = value["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[1], json!({"key": "name", "header": "Nombre", "type": "string"}));
    assert!(value["statistics"]["columns"]["id"].is_object());
    assert_eq!(value["metadata"]["columnCount"], json!(3));
}

/// Tests that a dataset without declared sheets synthesizes one sheet
/// under the configured name.
#[test]
fn test_single_synthesized_sheet() {
    let dataset = sample_dataset();
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let sheets =
        ExaTransformer::to_workbook_sheets(&dataset, &processed, &config(json!({}))).unwrap();

    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, "Datos");
    assert_eq!(sheets[0].data.data().len(), 2);
}

/// Tests that declared sheets are each processed independently, with
/// their own columns.
#[test]
fn test_declared_sheets_processed_independently() {
    let dataset = ExaDataset::new().with_sheets(vec![
        ExaSheetSpec {
            name: "Ventas".to_string(),
            rows: vec![
                json!({"mes": "enero", "total": 100}).as_object().unwrap().clone(),
                json!({"mes": "febrero", "total": 200}).as_object().unwrap().clone(),
            ],
            columns: None,
        },
        ExaSheetSpec {
            name: "Gastos".to_string(),
            rows: vec![json!({"concepto": "luz"}).as_object().unwrap().clone()],
            columns: Some(vec![ExaColumnSpec::new("concepto").header("Concepto")]),
        },
    ]);
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let sheets =
        ExaTransformer::to_workbook_sheets(&dataset, &processed, &config(json!({}))).unwrap();

    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[0].name, "Ventas");
    assert_eq!(sheets[0].data.data().len(), 2);
    assert_eq!(sheets[1].name, "Gastos");
    assert_eq!(sheets[1].data.columns()[0].header, "Concepto");
}

/// Tests that explicit document content passes through unchanged.
#[test]
fn test_explicit_content_passthrough() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": 1})]).with_content(vec![
        ExaBlock::Title {
            text: "Informe".to_string(),
        },
        ExaBlock::PageBreak,
    ]);
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let blocks = ExaTransformer::to_document_blocks(&dataset, &processed, &config(json!({})));

    assert_eq!(blocks.len(), 2);
    assert!(matches!(&blocks[0], ExaBlock::Title { text } if text == "Informe"));
    assert!(matches!(blocks[1], ExaBlock::PageBreak));
}

/// Tests the synthesized block order: title, description, summary, table.
#[test]
fn test_synthesized_blocks_without_cover() {
    let dataset = sample_dataset().with_metadata(ExaDatasetMeta {
        title: Some("Informe".to_string()),
        description: Some("Resumen mensual".to_string()),
        ..Default::default()
    });
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let blocks = ExaTransformer::to_document_blocks(&dataset, &processed, &config(json!({})));

    assert_eq!(blocks.len(), 4);
    assert!(matches!(&blocks[0], ExaBlock::Title { text } if text == "Informe"));
    assert!(matches!(&blocks[1], ExaBlock::Paragraph { text } if text == "Resumen mensual"));
    assert!(
        matches!(&blocks[2], ExaBlock::Paragraph { text } if text.starts_with("2 registros, 3 columnas."))
    );
    match &blocks[3] {
        ExaBlock::Table { headers, rows } => {
            assert_eq!(headers, &vec!["id".to_string(), "Nombre".to_string()]);
            assert_eq!(rows.len(), 2);
        }
        other => panic!("expected table block, got {:?}", other),
    }
}

/// Tests that the cover block leads when enabled, falling back to the
/// resolved title.
#[test]
fn test_cover_block_when_enabled() {
    let dataset = sample_dataset().with_metadata(ExaDatasetMeta {
        title: Some("Informe".to_string()),
        ..Default::default()
    });
    let processed = ExaProcessor::process(&dataset, &config(json!({}))).unwrap();
    let blocks = ExaTransformer::to_document_blocks(
        &dataset,
        &processed,
        &config(json!({"cover": {"enabled": true, "subtitle": "2026"}})),
    );

    match &blocks[0] {
        ExaBlock::Cover { title, subtitle, .. } => {
            assert_eq!(title, "Informe");
            assert_eq!(subtitle.as_deref(), Some("2026"));
        }
        other => panic!("expected cover block, got {:?}", other),
    }
}
