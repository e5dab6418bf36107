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

//! # Exa Export Engine Tests
//!
//! End-to-end tests for the export pipeline: result records, phase events,
//! strict mode, cancellation and the side-effect-free helpers.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test engine
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use exa::{
    ExaCodecHandle, ExaCodecKey, ExaCodecProvider, ExaColumnSpec, ExaContent, ExaDataset,
    ExaDeliveryOptions, ExaError, ExaExporter, ExaFormat, ExaPhase, ExaPresets,
};
use serde_json::json;
use tempfile::TempDir;

/// Provider that never yields a codec, forcing the fallback path.
struct FailingProvider;

#[async_trait]
impl ExaCodecProvider for FailingProvider {
    async fn acquire(&self, key: ExaCodecKey) -> exa::Result<ExaCodecHandle> {
        Err(ExaError::codec(key.name(), "unavailable in this test"))
    }
}

fn sample_dataset() -> ExaDataset {
    ExaDataset::from_rows(vec![
        json!({"a": 1, "b": "x"}),
        json!({"a": 2, "b": "y,z"}),
    ])
}

/// Tests a full CSV export without delivery: exact content, size and
/// filename.
#[tokio::test]
async fn test_csv_export_end_to_end() {
    let exporter = ExaExporter::new();
    let result = exporter
        .export(
            ExaFormat::Csv,
            &sample_dataset(),
            &json!({"timestamp": false, "autoDownload": false}),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.filename, "export.csv");
    assert!(!result.delivered);

    let content = result.content.unwrap();
    assert_eq!(content.as_text().unwrap(), "a,b\n1,x\n2,\"y,z\"\n");
    assert_eq!(result.size, content.len());
    assert_eq!(result.stats.rows_written, 2);
    assert_eq!(result.stats.bytes_written, result.size);
}

/// Tests that phase events arrive in pipeline order.
#[tokio::test]
async fn test_phase_event_order() {
    let exporter = ExaExporter::new();
    let mut events = exporter.subscribe();

    let result = exporter
        .export(
            ExaFormat::Json,
            &sample_dataset(),
            &json!({"autoDownload": false}),
        )
        .await
        .unwrap();
    assert!(result.success);

    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        phases.push(event.phase);
    }
    assert_eq!(
        phases,
        vec![
            ExaPhase::Validating,
            ExaPhase::Processing,
            ExaPhase::Transforming,
            ExaPhase::Serializing,
            ExaPhase::Completed,
        ]
    );
}

/// Tests that a validation failure yields a failed record, not an Err,
/// outside strict mode.
#[tokio::test]
async fn test_validation_failure_without_strict() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": 1})]).with_columns(vec![
        ExaColumnSpec::new("a"),
        ExaColumnSpec::new("a"),
    ]);
    let exporter = ExaExporter::new();
    let result = exporter
        .export(ExaFormat::Csv, &dataset, &json!({"autoDownload": false}))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.content.is_none());
    assert!(result.errors.iter().any(|e| e.contains("duplicate")));
}

/// Tests that strict mode turns the same failure into an Err.
#[tokio::test]
async fn test_validation_failure_with_strict() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": 1})]).with_columns(vec![
        ExaColumnSpec::new("a"),
        ExaColumnSpec::new("a"),
    ]);
    let exporter = ExaExporter::new();
    let result = exporter
        .export(
            ExaFormat::Csv,
            &dataset,
            &json!({"strict": true, "autoDownload": false}),
        )
        .await;
    assert!(result.is_err());
}

/// Tests that delivery writes into the configured directory and the
/// result records it.
#[tokio::test]
async fn test_export_with_delivery() {
    let dir = TempDir::new().unwrap();
    let exporter = ExaExporter::new().with_delivery(ExaDeliveryOptions {
        output_dir: Some(dir.path().to_path_buf()),
        picker: None,
    });

    let result = exporter
        .export(
            ExaFormat::Csv,
            &sample_dataset(),
            &json!({"filename": "ventas", "timestamp": false}),
        )
        .await
        .unwrap();

    assert!(result.delivered);
    let written = std::fs::read_to_string(dir.path().join("ventas.csv")).unwrap();
    assert_eq!(written, "a,b\n1,x\n2,\"y,z\"\n");
}

/// Tests that the cancel token is shared with callers and reset when a
/// new export starts.
#[tokio::test]
async fn test_cancel_token_resets_per_export() {
    let exporter = ExaExporter::new();
    let token = exporter.cancel_token();
    token.cancel();
    assert!(token.is_cancelled());

    let result = exporter
        .export(
            ExaFormat::Csv,
            &sample_dataset(),
            &json!({"autoDownload": false}),
        )
        .await
        .unwrap();

    // The stale cancellation does not leak into the new export.
    assert!(result.success);
    assert!(result.content.is_some());
    assert!(!token.is_cancelled());
}

/// Tests size estimation against the real artifact.
#[tokio::test]
async fn test_estimate_size() {
    let exporter = ExaExporter::new();
    let estimate = exporter
        .estimate_size(ExaFormat::Csv, &sample_dataset(), &json!({}))
        .await
        .unwrap();
    assert!(estimate > 0);

    let result = exporter
        .export(
            ExaFormat::Csv,
            &sample_dataset(),
            &json!({"autoDownload": false}),
        )
        .await
        .unwrap();
    assert_eq!(estimate, result.size);
}

/// Tests the preview helper: truncated, human-readable, no side effects.
#[tokio::test]
async fn test_preview() {
    let exporter = ExaExporter::new();
    let preview = exporter
        .preview(ExaFormat::Csv, &sample_dataset(), &json!({}), 1)
        .await
        .unwrap();

    assert!(preview.contains("a,b"));
    assert!(preview.contains("1,x"));
    assert!(!preview.contains("y,z"));
    assert!(exporter.delivery().deliveries().is_empty());
}

/// Tests that validation failures surface as Err from the preview path.
#[tokio::test]
async fn test_preview_rejects_invalid_dataset() {
    let dataset = ExaDataset::from_rows(vec![json!({"a": 1})]).with_columns(vec![
        ExaColumnSpec::new("a"),
        ExaColumnSpec::new("a"),
    ]);
    let exporter = ExaExporter::new();
    assert!(exporter
        .preview(ExaFormat::Csv, &dataset, &json!({}), 5)
        .await
        .is_err());
}

/// Tests that delivery failure is a warning on a successful result, never
/// an error.
#[tokio::test]
async fn test_failed_delivery_is_a_warning() {
    let exporter = ExaExporter::new().with_delivery(ExaDeliveryOptions {
        output_dir: Some("/nonexistent/exa-test-dir".into()),
        picker: None,
    });

    // Binary content has no inline fallback, so every mechanism fails.
    let result = exporter
        .export(ExaFormat::Xlsx, &sample_dataset(), &json!({}))
        .await
        .unwrap();

    assert!(result.success);
    assert!(!result.delivered);
    assert!(matches!(result.content, Some(ExaContent::Binary(_))));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("delivery failed")));
}

/// Tests that a mistyped configuration yields a failed record outside
/// strict mode and an Err inside it.
#[tokio::test]
async fn test_config_type_mismatch_is_a_failed_record() {
    let exporter = ExaExporter::new();
    let result = exporter
        .export(ExaFormat::Json, &sample_dataset(), &json!({"indent": "two"}))
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.content.is_none());
    assert!(result.errors.iter().any(|e| e.contains("json configuration")));

    let strict = exporter
        .export(
            ExaFormat::Json,
            &sample_dataset(),
            &json!({"indent": "two", "strict": true}),
        )
        .await;
    assert!(strict.is_err());
}

/// Tests that a registered preset reaches the export through the engine.
#[tokio::test]
async fn test_export_with_custom_preset() {
    let mut presets = ExaPresets::with_defaults();
    presets.register("plain", json!({"timestamp": false, "autoDownload": false}));

    let exporter = ExaExporter::new().with_presets(presets);
    let result = exporter
        .export(ExaFormat::Csv, &sample_dataset(), &json!({"preset": "plain"}))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.filename, "export.csv");
    assert!(!result.delivered);
}

/// Tests that an injected codec provider drives the fallback path and the
/// failed acquisition is never cached.
#[tokio::test]
async fn test_injected_codec_provider_falls_back() {
    let exporter = ExaExporter::new().with_codec_provider(Arc::new(FailingProvider));
    let result = exporter
        .export(
            ExaFormat::Xlsx,
            &sample_dataset(),
            &json!({"autoDownload": false}),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("lightweight codec")));
    assert!(!exporter.codecs().is_loaded(ExaCodecKey::Workbook).await);
}
