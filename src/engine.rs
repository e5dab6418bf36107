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

//! # Exa Export Engine
//!
//! The caller-facing surface. One export at a time per engine instance,
//! driven through a strictly forward phase machine:
//!
//! ```text
//! idle → validating → processing → transforming → serializing
//!      → delivering → {completed | failed | cancelled}
//! ```
//!
//! Phase transitions are emitted on an event channel so callers can render
//! progress without the engine knowing anything about presentation.
//! Cancellation is advisory: it stops event emission and suppresses
//! delivery, but already-started serialization runs to completion and its
//! bytes stay inspectable in the returned result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::codec::{ExaCodecCache, ExaCodecProvider};
use crate::config::{ExaPresets, ExaResolvedConfig};
use crate::dataset::ExaDataset;
use crate::deliver::{build_filename, ExaDeliveryManager, ExaDeliveryOptions};
use crate::errors::{ExaError, Result};
use crate::formats::{serializer_for, ExaContent, ExaFormat, ExaSerializeInput};
use crate::process::{ExaProcessedData, ExaProcessor};
use crate::validate::ExaValidator;

/// Pipeline phases, in transition order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaPhase {
    Idle,
    Validating,
    Processing,
    Transforming,
    Serializing,
    Delivering,
    Completed,
    Failed,
    Cancelled,
}

/// One progress event emitted during an export.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaEvent {
    pub phase: ExaPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Advisory cancellation handle for an in-flight export.
#[derive(Clone, Debug, Default)]
pub struct ExaCancelToken {
    flag: Arc<AtomicBool>,
}

impl ExaCancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of the current export.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Accounting for one export run.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaExportStats {
    /// Rows present after filtering.
    pub rows_written: usize,
    /// Byte size of the generated artifact.
    pub bytes_written: usize,
    /// Wall-clock pipeline duration in milliseconds.
    pub duration_ms: u64,
}

/// The caller-facing result record.
#[derive(Clone, Debug)]
pub struct ExaExportResult {
    pub success: bool,
    pub format: ExaFormat,
    pub filename: String,
    /// Generated content; kept even when delivery is skipped or fails.
    pub content: Option<ExaContent>,
    /// Byte size of the generated content.
    pub size: usize,
    /// Whether a delivery mechanism completed.
    pub delivered: bool,
    pub stats: ExaExportStats,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ExaExportResult {
    fn failed(format: ExaFormat, errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            format,
            filename: String::new(),
            content: None,
            size: 0,
            delivered: false,
            stats: ExaExportStats::default(),
            errors,
            warnings,
        }
    }
}

/// Releases the re-entrancy guard on every exit path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The export engine.
///
/// Owns the preset registry, the codec cache and the delivery manager;
/// every export runs against a private cleaned copy of the caller's
/// dataset, so no row-level locking is needed.
pub struct ExaExporter {
    presets: ExaPresets,
    codecs: ExaCodecCache,
    delivery: ExaDeliveryManager,
    busy: AtomicBool,
    cancel: ExaCancelToken,
    events: Mutex<Option<UnboundedSender<ExaEvent>>>,
}

impl Default for ExaExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExaExporter {
    pub fn new() -> Self {
        Self {
            presets: ExaPresets::with_defaults(),
            codecs: ExaCodecCache::with_builtin(),
            delivery: ExaDeliveryManager::new(ExaDeliveryOptions::default()),
            busy: AtomicBool::new(false),
            cancel: ExaCancelToken::new(),
            events: Mutex::new(None),
        }
    }

    /// Replaces the preset registry.
    pub fn with_presets(mut self, presets: ExaPresets) -> Self {
        self.presets = presets;
        self
    }

    /// Replaces the delivery configuration.
    pub fn with_delivery(mut self, options: ExaDeliveryOptions) -> Self {
        self.delivery = ExaDeliveryManager::new(options);
        self
    }

    /// Replaces the codec provider, resetting the cache.
    pub fn with_codec_provider(mut self, provider: Arc<dyn ExaCodecProvider>) -> Self {
        self.codecs = ExaCodecCache::new(provider);
        self
    }

    /// Opens the event channel, replacing any previous subscriber.
    pub fn subscribe(&self) -> UnboundedReceiver<ExaEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.events.lock() {
            *slot = Some(sender);
        }
        receiver
    }

    /// Handle for cancelling the in-flight export.
    pub fn cancel_token(&self) -> ExaCancelToken {
        self.cancel.clone()
    }

    /// Codec cache, exposed for inspection and test isolation.
    pub fn codecs(&self) -> &ExaCodecCache {
        &self.codecs
    }

    /// Delivery manager, exposed for inspecting tracked deliveries.
    pub fn delivery(&self) -> &ExaDeliveryManager {
        &self.delivery
    }

    /// Runs the full export pipeline.
    ///
    /// Failures surface in the result record's `errors`; with `strict`
    /// enabled they are returned as `Err` instead. A second call while one
    /// export is in flight is rejected with [`ExaError::Busy`].
    pub async fn export(
        &self,
        format: ExaFormat,
        dataset: &ExaDataset,
        overrides: &Value,
    ) -> Result<ExaExportResult> {
        let config = match ExaResolvedConfig::resolve(overrides, &self.presets) {
            Ok(config) => config,
            Err(err) => {
                // No resolved config to consult here, so the strict flag is
                // read from the raw overrides.
                let strict = overrides
                    .get("strict")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if strict {
                    return Err(err);
                }
                return Ok(ExaExportResult::failed(
                    format,
                    vec![err.to_string()],
                    Vec::new(),
                ));
            }
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            if config.common.strict {
                return Err(ExaError::Busy);
            }
            return Ok(ExaExportResult::failed(
                format,
                vec![ExaError::Busy.to_string()],
                Vec::new(),
            ));
        }
        let _guard = BusyGuard(&self.busy);
        self.cancel.reset();

        let outcome = self.run_pipeline(format, dataset, &config).await;
        match outcome {
            Ok(result) => {
                if !result.success && config.common.strict {
                    return Err(ExaError::validation(result.errors.join("; ")));
                }
                Ok(result)
            }
            Err(err) => {
                if config.common.strict {
                    return Err(err);
                }
                self.emit(ExaPhase::Failed, Some(err.to_string()));
                Ok(ExaExportResult::failed(
                    format,
                    vec![err.to_string()],
                    Vec::new(),
                ))
            }
        }
    }

    /// Approximates the artifact size in bytes, without side effects.
    pub async fn estimate_size(
        &self,
        format: ExaFormat,
        dataset: &ExaDataset,
        overrides: &Value,
    ) -> Result<usize> {
        let config = ExaResolvedConfig::resolve(overrides, &self.presets)?;
        let (cleaned, processed) = self.prepare(format, dataset, &config)?;
        let serializer = serializer_for(format);
        Ok(serializer.estimate_size(&ExaSerializeInput {
            dataset: &cleaned,
            processed: &processed,
            config: &config,
            codecs: &self.codecs,
        }))
    }

    /// Renders a truncated human-readable preview, without side effects.
    pub async fn preview(
        &self,
        format: ExaFormat,
        dataset: &ExaDataset,
        overrides: &Value,
        limit: usize,
    ) -> Result<String> {
        let config = ExaResolvedConfig::resolve(overrides, &self.presets)?;
        let (cleaned, processed) = self.prepare(format, dataset, &config)?;
        let serializer = serializer_for(format);
        serializer
            .preview(
                &ExaSerializeInput {
                    dataset: &cleaned,
                    processed: &processed,
                    config: &config,
                    codecs: &self.codecs,
                },
                limit,
            )
            .await
    }

    async fn run_pipeline(
        &self,
        format: ExaFormat,
        dataset: &ExaDataset,
        config: &ExaResolvedConfig,
    ) -> Result<ExaExportResult> {
        info!("export started: format={}", format);
        let started = Instant::now();

        self.emit(ExaPhase::Validating, None);
        let report = ExaValidator::validate(dataset, format, config);
        let mut warnings = report.warnings.clone();
        if !report.valid {
            self.emit(ExaPhase::Failed, Some("validation failed".to_string()));
            return Ok(ExaExportResult::failed(format, report.errors, warnings));
        }
        let cleaned = match report.cleaned {
            Some(cleaned) => cleaned,
            None => dataset.clone(),
        };

        self.emit(ExaPhase::Processing, None);
        let processed = ExaProcessor::process(&cleaned, config)?;

        // Reshaping happens inside the serializer; the phase is still
        // reported so progress displays see every stage.
        self.emit(ExaPhase::Transforming, None);

        self.emit(ExaPhase::Serializing, None);
        let serializer = serializer_for(format);
        let input = ExaSerializeInput {
            dataset: &cleaned,
            processed: &processed,
            config,
            codecs: &self.codecs,
        };
        let artifact = serializer.serialize(&input).await?;
        warnings.extend(artifact.warnings.clone());

        let filename = build_filename(&config.common.filename, format, config.common.timestamp);
        let size = artifact.content.len();

        let mut delivered = false;
        if self.cancel.is_cancelled() {
            debug!("export cancelled; delivery suppressed");
            warnings.push("export cancelled: delivery skipped".to_string());
            self.emit(ExaPhase::Cancelled, None);
        } else if config.common.auto_download {
            self.emit(ExaPhase::Delivering, None);
            delivered = self
                .delivery
                .deliver(&artifact.content, &filename, format)
                .await;
            if !delivered {
                warnings.push("delivery failed: content is still available in the result".to_string());
            }
            self.emit(ExaPhase::Completed, None);
        } else {
            self.emit(ExaPhase::Completed, None);
        }

        info!(
            "export finished: format={} size={} delivered={}",
            format, size, delivered
        );
        Ok(ExaExportResult {
            success: true,
            format,
            filename,
            content: Some(artifact.content),
            size,
            delivered,
            stats: ExaExportStats {
                rows_written: processed.metadata().row_count,
                bytes_written: size,
                duration_ms: started.elapsed().as_millis() as u64,
            },
            errors: Vec::new(),
            warnings,
        })
    }

    fn prepare(
        &self,
        format: ExaFormat,
        dataset: &ExaDataset,
        config: &ExaResolvedConfig,
    ) -> Result<(ExaDataset, ExaProcessedData)> {
        let report = ExaValidator::validate(dataset, format, config);
        if !report.valid {
            return Err(ExaError::validation(report.errors.join("; ")));
        }
        let cleaned = match report.cleaned {
            Some(cleaned) => cleaned,
            None => dataset.clone(),
        };
        let processed = ExaProcessor::process(&cleaned, config)?;
        Ok((cleaned, processed))
    }

    /// Emits a phase event. Cancellation stops further progress
    /// reporting; terminal phases are still delivered.
    fn emit(&self, phase: ExaPhase, detail: Option<String>) {
        let terminal = matches!(
            phase,
            ExaPhase::Completed | ExaPhase::Failed | ExaPhase::Cancelled
        );
        if self.cancel.is_cancelled() && !terminal {
            return;
        }
        if let Ok(slot) = self.events.lock() {
            if let Some(sender) = slot.as_ref() {
                let _ = sender.send(ExaEvent { phase, detail });
            }
        }
    }
}
