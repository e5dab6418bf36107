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

//! # Exa Document Format Tests
//!
//! Tests for document generation: the full codec path, the simulated-text
//! fallback, cell formatting and previews.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test pdf
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use exa::formats::pdf::{format_document_cell, ExaPdfSerializer};
use exa::{
    ExaCodecCache, ExaCodecHandle, ExaCodecKey, ExaCodecProvider, ExaDataset, ExaDatasetMeta,
    ExaError, ExaPresets, ExaProcessor, ExaResolvedConfig, ExaSerializeInput, ExaSerializer,
};
use serde_json::{json, Value};

/// Provider that never yields a codec, forcing the fallback path.
struct FailingProvider;

#[async_trait]
impl ExaCodecProvider for FailingProvider {
    async fn acquire(&self, key: ExaCodecKey) -> exa::Result<ExaCodecHandle> {
        Err(ExaError::codec(key.name(), "unavailable in this test"))
    }
}

fn config(overrides: Value) -> ExaResolvedConfig {
    ExaResolvedConfig::resolve(&overrides, &ExaPresets::new()).unwrap()
}

fn sample_dataset() -> ExaDataset {
    ExaDataset::from_rows(vec![
        json!({"id": 1, "name": "Ada", "active": true}),
        json!({"id": 2, "name": "Grace", "active": false}),
    ])
    .with_metadata(ExaDatasetMeta {
        title: Some("Informe".to_string()),
        created_at: Some("2026-01-15".to_string()),
        ..Default::default()
    })
}

/// Tests boolean rendering and ellipsis truncation of long cells.
#[test]
fn test_format_document_cell() {
    assert_eq!(format_document_cell(&json!(true)), "Sí");
    assert_eq!(format_document_cell(&json!(false)), "No");
    assert_eq!(format_document_cell(&json!(2.5)), "2.5");
    assert_eq!(format_document_cell(&Value::Null), "");

    let long = "x".repeat(60);
    let formatted = format_document_cell(&json!(long));
    assert_eq!(formatted.chars().count(), 40);
    assert!(formatted.ends_with("..."));
}

/// Tests the full codec path: real document bytes, no warnings.
#[cfg(feature = "pdf")]
#[tokio::test]
async fn test_full_codec_produces_document() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::with_builtin();

    let artifact = ExaPdfSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    assert!(artifact.warnings.is_empty());
    let bytes = artifact.content.as_bytes();
    assert_eq!(&bytes[0..5], b"%PDF-");
    assert!(codecs.is_loaded(ExaCodecKey::Document).await);
}

/// Tests the degraded fallback: simulated text artifact with a warning.
#[tokio::test]
async fn test_fallback_simulated_document() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaPdfSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    assert_eq!(artifact.warnings.len(), 1);
    assert!(artifact.warnings[0].contains("simulated text artifact"));

    let text = artifact.content.as_text().unwrap();
    assert!(text.contains("DOCUMENTO SIMULADO (sin códec de maquetación)"));
    assert!(text.contains("Informe\n-------\n"));
    assert!(text.contains("2 registros, 3 columnas."));
    assert!(text.contains("id | name | active"));
    assert!(text.contains("1 | Ada | Sí"));
    assert!(text.contains("2 | Grace | No"));
    assert!(text.contains("Generado: 2026-01-15\n"));
}

/// Tests that explicit content blocks drive the simulated rendition.
#[tokio::test]
async fn test_fallback_explicit_blocks() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": 1})]).with_content(vec![
        exa::dataset::ExaBlock::Cover {
            title: "Memoria anual".to_string(),
            subtitle: Some("2026".to_string()),
            logo: None,
        },
        exa::dataset::ExaBlock::PageBreak,
        exa::dataset::ExaBlock::Paragraph {
            text: "Texto libre.".to_string(),
        },
        exa::dataset::ExaBlock::Image {
            source: "logo.png".to_string(),
            width: None,
            height: None,
        },
    ]);
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaPdfSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    let text = artifact.content.as_text().unwrap();
    assert!(text.contains("[PORTADA] Memoria anual"));
    assert!(text.contains("          2026"));
    assert!(text.contains("----- salto de página -----"));
    assert!(text.contains("Texto libre.\n"));
    assert!(text.contains("[imagen: logo.png]"));
}

/// Tests that the footer page marker appears when page numbering is on.
#[tokio::test]
async fn test_fallback_page_marker() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaPdfSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    let text = artifact.content.as_text().unwrap();
    assert!(text.contains("Página 1 de 1\n"));
}

/// Tests the preview: simulated rendition over a truncated row set.
#[tokio::test]
async fn test_preview_truncates() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let preview = ExaPdfSerializer
        .preview(
            &ExaSerializeInput {
                dataset: &dataset,
                processed: &processed,
                config: &cfg,
                codecs: &codecs,
            },
            1,
        )
        .await
        .unwrap();

    assert!(preview.contains("1 | Ada | Sí"));
    assert!(!preview.contains("Grace"));
    assert!(preview.contains("1 registros, 3 columnas."));
    assert!(preview.ends_with("...\n"));
}

/// Tests the size estimate scales with row count.
#[test]
fn test_estimate_size_grows() {
    let cfg = config(json!({}));
    let small = ExaProcessor::process(&sample_dataset(), &cfg).unwrap();

    let rows: Vec<Value> = (0..200).map(|i| json!({"id": i, "name": "n"})).collect();
    let large_dataset = ExaDataset::from_rows(rows);
    let large = ExaProcessor::process(&large_dataset, &cfg).unwrap();

    let codecs = ExaCodecCache::with_builtin();
    let dataset = sample_dataset();
    let small_input = ExaSerializeInput {
        dataset: &dataset,
        processed: &small,
        config: &cfg,
        codecs: &codecs,
    };
    let large_input = ExaSerializeInput {
        dataset: &large_dataset,
        processed: &large,
        config: &cfg,
        codecs: &codecs,
    };

    assert!(
        ExaPdfSerializer.estimate_size(&large_input) > ExaPdfSerializer.estimate_size(&small_input)
    );
}
