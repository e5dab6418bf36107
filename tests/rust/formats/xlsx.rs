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

//! # Exa Workbook Format Tests
//!
//! Tests for the styled codec path, the lightweight ZIP fallback, codec
//! caching and sheet-name sanitization.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test xlsx
//! ```

use std::io::{Cursor, Read};
use std::sync::Arc;

use async_trait::async_trait;
use exa::formats::xlsx::{sanitize_sheet_name, ExaXlsxSerializer};
use exa::{
    ExaCodecCache, ExaCodecHandle, ExaCodecKey, ExaCodecProvider, ExaDataset, ExaError,
    ExaPresets, ExaResolvedConfig, ExaProcessor, ExaSerializeInput, ExaSerializer,
};
use serde_json::{json, Value};
use zip::ZipArchive;

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
}

fn read_member(bytes: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut member = archive.by_name(name).unwrap();
    let mut content = String::new();
    member.read_to_string(&mut content).unwrap();
    content
}

/// Tests that the built-in codec produces a ZIP container without
/// warnings.
#[cfg(feature = "xlsx")]
#[tokio::test]
async fn test_full_codec_produces_workbook() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::with_builtin();

    let artifact = ExaXlsxSerializer
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
    assert_eq!(&bytes[0..2], b"PK");
    assert!(codecs.is_loaded(ExaCodecKey::Workbook).await);
}

/// Tests the lightweight fallback: failing provider, degraded-generation
/// warning, structurally valid archive.
#[tokio::test]
async fn test_fallback_workbook_structure() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaXlsxSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    assert_eq!(artifact.warnings.len(), 1);
    assert!(artifact.warnings[0].contains("lightweight codec"));

    let bytes = artifact.content.as_bytes();
    assert_eq!(&bytes[0..2], b"PK");

    let types = read_member(bytes, "[Content_Types].xml");
    assert!(types.contains("/xl/worksheets/sheet1.xml"));

    let workbook = read_member(bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"<sheet name="Datos""#));

    let sheet = read_member(bytes, "xl/worksheets/sheet1.xml");
    assert!(sheet.contains(r#"<t xml:space="preserve">Ada</t>"#));
    assert!(sheet.contains("<c><v>1</v></c>"));
    assert!(sheet.contains(r#"<c t="b"><v>1</v></c>"#));
    // Frozen header pane is on by default.
    assert!(sheet.contains(r#"<pane ySplit="1" topLeftCell="A2" state="frozen"/>"#));
}

/// Tests that declared sheets each become a worksheet member.
#[tokio::test]
async fn test_fallback_multiple_sheets() {
    let dataset = ExaDataset::new().with_sheets(vec![
        exa::dataset::ExaSheetSpec {
            name: "Ventas".to_string(),
            rows: vec![json!({"total": 100}).as_object().unwrap().clone()],
            columns: None,
        },
        exa::dataset::ExaSheetSpec {
            name: "Gastos".to_string(),
            rows: vec![json!({"total": 40}).as_object().unwrap().clone()],
            columns: None,
        },
    ]);
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaXlsxSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    let bytes = artifact.content.as_bytes();
    let workbook = read_member(bytes, "xl/workbook.xml");
    assert!(workbook.contains(r#"<sheet name="Ventas""#));
    assert!(workbook.contains(r#"<sheet name="Gastos""#));
    assert!(read_member(bytes, "xl/worksheets/sheet2.xml").contains("<v>40</v>"));
}

/// Tests that XML-special characters in cells are escaped in the fallback.
#[tokio::test]
async fn test_fallback_escapes_xml() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": "5 < 6 & \"b\""})]);
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));

    let artifact = ExaXlsxSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &cfg,
            codecs: &codecs,
        })
        .await
        .unwrap();

    let sheet = read_member(artifact.content.as_bytes(), "xl/worksheets/sheet1.xml");
    assert!(sheet.contains("5 &lt; 6 &amp; &quot;b&quot;"));
}

/// Tests codec caching: one failed acquisition is not cached, but a
/// successful one is returned without re-acquiring.
#[tokio::test]
async fn test_codec_cache_reset() {
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));
    let timeout = std::time::Duration::from_millis(100);

    assert!(codecs.load(ExaCodecKey::Workbook, timeout).await.is_err());
    assert!(!codecs.is_loaded(ExaCodecKey::Workbook).await);

    let builtin = ExaCodecCache::with_builtin();
    if builtin.load(ExaCodecKey::Workbook, timeout).await.is_ok() {
        assert!(builtin.is_loaded(ExaCodecKey::Workbook).await);
        builtin.reset().await;
        assert!(!builtin.is_loaded(ExaCodecKey::Workbook).await);
    }
}

/// Tests forbidden-character replacement and the length cap for sheet
/// names.
#[test]
fn test_sanitize_sheet_name() {
    assert_eq!(sanitize_sheet_name("Ventas [2026]"), "Ventas _2026_");
    assert_eq!(sanitize_sheet_name("a/b\\c:d*e?f"), "a_b_c_d_e_f");
    assert_eq!(sanitize_sheet_name(""), "Datos");
    assert_eq!(sanitize_sheet_name("   "), "Datos");
    assert_eq!(sanitize_sheet_name(&"x".repeat(40)).chars().count(), 31);
}

/// Tests the size estimate and preview helpers.
#[tokio::test]
async fn test_estimate_and_preview() {
    let dataset = sample_dataset();
    let cfg = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &cfg).unwrap();
    let codecs = ExaCodecCache::new(Arc::new(FailingProvider));
    let input = ExaSerializeInput {
        dataset: &dataset,
        processed: &processed,
        config: &cfg,
        codecs: &codecs,
    };

    assert!(ExaXlsxSerializer.estimate_size(&input) > 2_000);

    let preview = ExaXlsxSerializer.preview(&input, 1).await.unwrap();
    assert!(preview.starts_with("[Datos]\n"));
    assert!(preview.contains("id | name | active"));
    assert!(preview.contains("1 | Ada | true"));
    assert!(preview.ends_with("...\n"));
}
