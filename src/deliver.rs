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

//! # Exa Delivery Manager Module
//!
//! Turns finished content into a deliverable file. Mechanisms are tried in
//! priority order, each wrapped so failure falls through to the next:
//!
//! 1. Caller-supplied interactive save-location picker
//! 2. Atomic temp-file persist into the output directory
//! 3. Direct write into the output directory
//! 4. Inline base64 data-URI emergency fallback (text payloads)
//!
//! Every attempt is tracked by a generated delivery id whose status moves
//! `starting → downloading → {completed | error | cancelled}`; terminal
//! records are pruned on the next delivery. Nothing thrown here escapes
//! this module's boundary: `deliver` reports `false` and the caller turns
//! that into a warning.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Local;
use log::{debug, info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::{ExaError, Result};
use crate::formats::{ExaContent, ExaFormat};

/// Cap applied to sanitized filenames, extension excluded.
const FILENAME_MAX: usize = 120;

/// Caller-supplied save-location chooser. Returns the chosen path, or
/// `None` when the caller dismissed the prompt.
pub type ExaPickerFn = Arc<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

/// Delivery configuration held by the engine.
#[derive(Clone, Default)]
pub struct ExaDeliveryOptions {
    /// Target directory for file-based mechanisms. Defaults to the
    /// process working directory.
    pub output_dir: Option<PathBuf>,
    /// Optional interactive picker, tried first when present.
    pub picker: Option<ExaPickerFn>,
}

impl fmt::Debug for ExaDeliveryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaDeliveryOptions")
            .field("output_dir", &self.output_dir)
            .field("picker", &self.picker.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Lifecycle of one tracked delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaDeliveryStatus {
    Starting,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl ExaDeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExaDeliveryStatus::Completed | ExaDeliveryStatus::Error | ExaDeliveryStatus::Cancelled
        )
    }
}

/// One tracked delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaDeliveryRecord {
    pub id: String,
    pub filename: String,
    pub media_type: String,
    pub status: ExaDeliveryStatus,
    /// Mechanism that completed the delivery, when any did.
    pub mechanism: Option<String>,
    /// Data URI produced by the inline emergency fallback.
    pub inline_uri: Option<String>,
}

/// Outcome of one mechanism attempt.
enum ExaDeliveryOutcome {
    /// Written to the filesystem at this path.
    File(PathBuf),
    /// Handed back inline as a data URI.
    Inline(String),
}

struct ExaDeliveryRequest<'a> {
    content: &'a ExaContent,
    filename: &'a str,
    media_type: &'a str,
}

#[async_trait]
trait ExaDeliveryMechanism: Send + Sync {
    fn name(&self) -> &'static str;
    async fn attempt(&self, request: &ExaDeliveryRequest<'_>) -> Result<ExaDeliveryOutcome>;
}

/// Interactive save-location picker.
struct PickerMechanism {
    picker: ExaPickerFn,
}

#[async_trait]
impl ExaDeliveryMechanism for PickerMechanism {
    fn name(&self) -> &'static str {
        "picker"
    }

    async fn attempt(&self, request: &ExaDeliveryRequest<'_>) -> Result<ExaDeliveryOutcome> {
        let target = (self.picker)(request.filename)
            .ok_or_else(|| ExaError::Cancelled)?;
        std::fs::write(&target, request.content.as_bytes())?;
        Ok(ExaDeliveryOutcome::File(target))
    }
}

/// Atomic write: temp file in the target directory, then persist.
struct TempPersistMechanism {
    dir: PathBuf,
}

#[async_trait]
impl ExaDeliveryMechanism for TempPersistMechanism {
    fn name(&self) -> &'static str {
        "temp-persist"
    }

    async fn attempt(&self, request: &ExaDeliveryRequest<'_>) -> Result<ExaDeliveryOutcome> {
        let target = self.dir.join(request.filename);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(request.content.as_bytes())?;
        temp.flush()?;
        temp.persist(&target)
            .map_err(|err| ExaError::delivery(err.to_string()))?;
        Ok(ExaDeliveryOutcome::File(target))
    }
}

/// Plain write into the target directory.
struct DirectWriteMechanism {
    dir: PathBuf,
}

#[async_trait]
impl ExaDeliveryMechanism for DirectWriteMechanism {
    fn name(&self) -> &'static str {
        "direct-write"
    }

    async fn attempt(&self, request: &ExaDeliveryRequest<'_>) -> Result<ExaDeliveryOutcome> {
        let target = self.dir.join(request.filename);
        std::fs::write(&target, request.content.as_bytes())?;
        Ok(ExaDeliveryOutcome::File(target))
    }
}

/// Emergency fallback: base64 data URI, text payloads only.
struct InlineDataMechanism;

#[async_trait]
impl ExaDeliveryMechanism for InlineDataMechanism {
    fn name(&self) -> &'static str {
        "inline-data"
    }

    async fn attempt(&self, request: &ExaDeliveryRequest<'_>) -> Result<ExaDeliveryOutcome> {
        let text = request.content.as_text().ok_or_else(|| {
            ExaError::delivery("inline fallback requires a text payload")
        })?;
        let uri = format!(
            "data:{};base64,{}",
            request.media_type,
            BASE64.encode(text.as_bytes())
        );
        Ok(ExaDeliveryOutcome::Inline(uri))
    }
}

/// Best-effort multi-mechanism delivery.
pub struct ExaDeliveryManager {
    options: ExaDeliveryOptions,
    records: Mutex<Vec<ExaDeliveryRecord>>,
}

impl ExaDeliveryManager {
    pub fn new(options: ExaDeliveryOptions) -> Self {
        Self {
            options,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Attempts delivery, trying each mechanism in order.
    ///
    /// Returns `true` when any mechanism completed. Never propagates a
    /// failure; the artifact stays valid regardless of the outcome.
    pub async fn deliver(
        &self,
        content: &ExaContent,
        filename: &str,
        format: ExaFormat,
    ) -> bool {
        self.prune();

        let id = generate_delivery_id();
        let media_type = format.media_type();
        self.track(ExaDeliveryRecord {
            id: id.clone(),
            filename: filename.to_string(),
            media_type: media_type.to_string(),
            status: ExaDeliveryStatus::Starting,
            mechanism: None,
            inline_uri: None,
        });

        let request = ExaDeliveryRequest {
            content,
            filename,
            media_type,
        };
        self.update(&id, ExaDeliveryStatus::Downloading, None, None);

        for mechanism in self.mechanisms() {
            match mechanism.attempt(&request).await {
                Ok(ExaDeliveryOutcome::File(path)) => {
                    info!(
                        "delivered '{}' via {} to {}",
                        filename,
                        mechanism.name(),
                        path.display()
                    );
                    self.update(
                        &id,
                        ExaDeliveryStatus::Completed,
                        Some(mechanism.name().to_string()),
                        None,
                    );
                    return true;
                }
                Ok(ExaDeliveryOutcome::Inline(uri)) => {
                    info!("delivered '{}' via {} inline", filename, mechanism.name());
                    self.update(
                        &id,
                        ExaDeliveryStatus::Completed,
                        Some(mechanism.name().to_string()),
                        Some(uri),
                    );
                    return true;
                }
                Err(ExaError::Cancelled) => {
                    debug!("delivery of '{}' cancelled at {}", filename, mechanism.name());
                    self.update(&id, ExaDeliveryStatus::Cancelled, None, None);
                    return false;
                }
                Err(err) => {
                    warn!(
                        "delivery mechanism {} failed for '{}': {}",
                        mechanism.name(),
                        filename,
                        err
                    );
                }
            }
        }

        self.update(&id, ExaDeliveryStatus::Error, None, None);
        false
    }

    /// Snapshot of the tracked deliveries.
    pub fn deliveries(&self) -> Vec<ExaDeliveryRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Drops terminal records.
    pub fn prune(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.retain(|record| !record.status.is_terminal());
        }
    }

    fn mechanisms(&self) -> Vec<Box<dyn ExaDeliveryMechanism>> {
        let dir = self
            .options
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let mut mechanisms: Vec<Box<dyn ExaDeliveryMechanism>> = Vec::new();
        if let Some(picker) = &self.options.picker {
            mechanisms.push(Box::new(PickerMechanism {
                picker: Arc::clone(picker),
            }));
        }
        mechanisms.push(Box::new(TempPersistMechanism { dir: dir.clone() }));
        mechanisms.push(Box::new(DirectWriteMechanism { dir }));
        mechanisms.push(Box::new(InlineDataMechanism));
        mechanisms
    }

    fn track(&self, record: ExaDeliveryRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }

    fn update(
        &self,
        id: &str,
        status: ExaDeliveryStatus,
        mechanism: Option<String>,
        inline_uri: Option<String>,
    ) {
        if let Ok(mut records) = self.records.lock() {
            if let Some(record) = records.iter_mut().find(|r| r.id == id) {
                record.status = status;
                if mechanism.is_some() {
                    record.mechanism = mechanism;
                }
                if inline_uri.is_some() {
                    record.inline_uri = inline_uri;
                }
            }
        }
    }
}

impl fmt::Debug for ExaDeliveryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaDeliveryManager")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn generate_delivery_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("dl_{}", hex::encode(bytes))
}

/// Replaces forbidden filesystem characters, collapses whitespace and caps
/// the length.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let collapsed = replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let capped: String = collapsed.chars().take(FILENAME_MAX).collect();
    let trimmed = capped.trim();
    // A name made only of replacement underscores carried no usable
    // characters to begin with.
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Final delivery name: sanitized base, optional timestamp suffix, format
/// extension.
pub fn build_filename(base: &str, format: ExaFormat, timestamp: bool) -> String {
    let stem = sanitize_filename(base);
    if timestamp {
        let suffix = Local::now().format("%Y%m%d_%H%M%S");
        format!("{}_{}.{}", stem, suffix, format.extension())
    } else {
        format!("{}.{}", stem, format.extension())
    }
}

/// True when `path` stays inside its parent directory (no separators).
pub fn is_plain_filename(name: &str) -> bool {
    !name.contains('/') && !name.contains('\\') && Path::new(name).components().count() <= 1
}
