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

//! # Exa Format Serializers
//!
//! One serializer per output format, all behind the [`ExaSerializer`]
//! contract: `serialize` produces final byte content, `estimate_size` gives
//! an approximate byte count without generating the artifact, and `preview`
//! renders a truncated human-readable string. Dispatch is a closed match on
//! [`ExaFormat`], resolved once per export call; adding a format means one
//! new variant and one new serializer implementation.

pub mod csv;
pub mod json;
pub mod pdf;
pub mod txt;
pub mod xlsx;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::ExaCodecCache;
use crate::config::ExaResolvedConfig;
use crate::dataset::ExaDataset;
use crate::errors::{ExaError, Result};
use crate::process::ExaProcessedData;

/// Supported output formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaFormat {
    Csv,
    Json,
    Txt,
    Xlsx,
    Pdf,
}

impl ExaFormat {
    /// Canonical lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExaFormat::Csv => "csv",
            ExaFormat::Json => "json",
            ExaFormat::Txt => "txt",
            ExaFormat::Xlsx => "xlsx",
            ExaFormat::Pdf => "pdf",
        }
    }

    /// Registered media type for delivery.
    pub fn media_type(&self) -> &'static str {
        match self {
            ExaFormat::Csv => "text/csv;charset=utf-8",
            ExaFormat::Json => "application/json;charset=utf-8",
            ExaFormat::Txt => "text/plain;charset=utf-8",
            ExaFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExaFormat::Pdf => "application/pdf",
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// True for formats whose artifact is binary rather than text.
    pub fn is_binary(&self) -> bool {
        matches!(self, ExaFormat::Xlsx | ExaFormat::Pdf)
    }
}

impl FromStr for ExaFormat {
    type Err = ExaError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Ok(ExaFormat::Csv),
            "json" => Ok(ExaFormat::Json),
            "txt" | "text" => Ok(ExaFormat::Txt),
            "xlsx" | "excel" => Ok(ExaFormat::Xlsx),
            "pdf" => Ok(ExaFormat::Pdf),
            other => Err(ExaError::validation(format!(
                "unsupported format '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ExaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final content of one export, text or binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExaContent {
    Text(String),
    Binary(Vec<u8>),
}

impl ExaContent {
    /// Byte length of the content.
    pub fn len(&self) -> usize {
        match self {
            ExaContent::Text(text) => text.len(),
            ExaContent::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content as bytes, encoding text as UTF-8.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ExaContent::Text(text) => text.as_bytes(),
            ExaContent::Binary(bytes) => bytes,
        }
    }

    /// Text view, when the content is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ExaContent::Text(text) => Some(text),
            ExaContent::Binary(_) => None,
        }
    }
}

/// Output of one serializer run.
#[derive(Clone, Debug)]
pub struct ExaArtifact {
    pub content: ExaContent,
    /// Advisory conditions raised while serializing (delimiter conflicts,
    /// codec fallbacks).
    pub warnings: Vec<String>,
}

impl ExaArtifact {
    pub fn text(content: String) -> Self {
        Self {
            content: ExaContent::Text(content),
            warnings: Vec::new(),
        }
    }

    pub fn binary(bytes: Vec<u8>) -> Self {
        Self {
            content: ExaContent::Binary(bytes),
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Everything a serializer needs for one run.
pub struct ExaSerializeInput<'a> {
    /// The cleaned dataset, for sheet groups and explicit content.
    pub dataset: &'a ExaDataset,
    /// The processed main table.
    pub processed: &'a ExaProcessedData,
    pub config: &'a ExaResolvedConfig,
    pub codecs: &'a ExaCodecCache,
}

/// Common serializer contract.
#[async_trait]
pub trait ExaSerializer: Send + Sync {
    /// Produces the final artifact.
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact>;

    /// Approximates the artifact's byte count without generating it.
    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize;

    /// Renders a truncated human-readable preview over at most `limit` rows.
    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String>;
}

/// Resolves the serializer for a format.
pub fn serializer_for(format: ExaFormat) -> Box<dyn ExaSerializer> {
    match format {
        ExaFormat::Csv => Box::new(csv::ExaCsvSerializer),
        ExaFormat::Json => Box::new(json::ExaJsonSerializer),
        ExaFormat::Txt => Box::new(txt::ExaTxtSerializer),
        ExaFormat::Xlsx => Box::new(xlsx::ExaXlsxSerializer),
        ExaFormat::Pdf => Box::new(pdf::ExaPdfSerializer),
    }
}
