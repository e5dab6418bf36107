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

//! # Exa Dataset Module
//!
//! This module provides the core data structures for representing the unit
//! of work handed to the Exa engine: a tabular dataset plus optional column
//! descriptors, metadata, workbook sheets and explicit document content.
//!
//! ## Design Principles
//!
//! - **Flexibility**: Rows use JSON objects (`serde_json::Map`) so callers
//!   can hand over structured and semi-structured data without a schema
//! - **Immutability**: A dataset is input only; every pipeline stage builds
//!   new derived structures and never mutates the caller's dataset
//! - **Partial specification**: Column descriptors may be omitted entirely
//!   or given only partially; the validation and processing stages fill in
//!   the rest
//!
//! ## Usage Example
//!
//! ```rust
//! use exa::dataset::{ExaDataset, ExaColumnSpec, ExaColumnKind};
//! use serde_json::json;
//!
//! let dataset = ExaDataset::from_rows(vec![
//!     json!({"id": 1, "name": "Ada"}),
//!     json!({"id": 2, "name": "Grace"}),
//! ]).with_columns(vec![
//!     ExaColumnSpec::new("id").kind(ExaColumnKind::Number),
//!     ExaColumnSpec::new("name").header("Nombre"),
//! ]);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ExaError, Result};

/// One flat record: column key to scalar value.
///
/// Nested objects and arrays are tolerated on input; the validation engine
/// stringifies them during cleaning so serializers only ever see scalars.
pub type ExaRow = Map<String, Value>;

/// Custom per-column value formatter supplied by the caller.
///
/// A formatter receives the raw cell value and returns the display value.
/// Failures are recoverable: the processor logs them and falls back to the
/// column kind's default rendering.
pub type ExaFormatter =
    Arc<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;

/// Logical type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaColumnKind {
    String,
    Number,
    Boolean,
    Date,
}

impl Default for ExaColumnKind {
    fn default() -> Self {
        ExaColumnKind::String
    }
}

/// Horizontal alignment of a column in layout-aware formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaAlign {
    Left,
    Center,
    Right,
}

/// Caller-facing, partially-specified column descriptor.
///
/// Every field except `key` is optional; normalization (see the processor)
/// resolves the missing pieces into an [`ExaColumn`]. Deserializes from
/// either an object or a bare string, which is shorthand for `{key}`.
#[derive(Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaColumnSpec {
    /// Unique column key. Required.
    pub key: String,
    /// Display label; defaults to the key.
    pub header: Option<String>,
    /// Logical type; inferred by sampling when absent.
    #[serde(rename = "type")]
    pub kind: Option<ExaColumnKind>,
    /// Whether the column appears in generated output. Defaults to true.
    pub visible: Option<bool>,
    /// Whether the column may drive sorting. Defaults to true.
    pub sortable: Option<bool>,
    /// Horizontal alignment override.
    pub alignment: Option<ExaAlign>,
    /// Fixed width hint, in characters/units depending on the format.
    pub width: Option<u32>,
    /// Optional custom value formatter. Never serialized.
    #[serde(skip)]
    pub formatter: Option<ExaFormatter>,
}

impl ExaColumnSpec {
    /// Creates a descriptor for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        ExaColumnSpec {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Sets the display header.
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Sets the logical type.
    pub fn kind(mut self, kind: ExaColumnKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Marks the column hidden.
    pub fn hidden(mut self) -> Self {
        self.visible = Some(false);
        self
    }

    /// Marks the column non-sortable.
    pub fn not_sortable(mut self) -> Self {
        self.sortable = Some(false);
        self
    }

    /// Sets the alignment.
    pub fn alignment(mut self, align: ExaAlign) -> Self {
        self.alignment = Some(align);
        self
    }

    /// Sets the width hint.
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Attaches a custom formatter.
    pub fn formatter(mut self, formatter: ExaFormatter) -> Self {
        self.formatter = Some(formatter);
        self
    }
}

impl<'de> Deserialize<'de> for ExaColumnSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Default, Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        struct Fields {
            key: String,
            header: Option<String>,
            #[serde(rename = "type")]
            kind: Option<ExaColumnKind>,
            visible: Option<bool>,
            sortable: Option<bool>,
            alignment: Option<ExaAlign>,
            width: Option<u32>,
        }

        // A bare string is shorthand for an object carrying only `key`.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Shorthand(String),
            Full(Fields),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Shorthand(key) => Ok(ExaColumnSpec::new(key)),
            Repr::Full(fields) => Ok(ExaColumnSpec {
                key: fields.key,
                header: fields.header,
                kind: fields.kind,
                visible: fields.visible,
                sortable: fields.sortable,
                alignment: fields.alignment,
                width: fields.width,
                formatter: None,
            }),
        }
    }
}

impl fmt::Debug for ExaColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaColumnSpec")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("kind", &self.kind)
            .field("visible", &self.visible)
            .field("sortable", &self.sortable)
            .field("alignment", &self.alignment)
            .field("width", &self.width)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Fully-normalized column descriptor produced by the processor.
#[derive(Clone)]
pub struct ExaColumn {
    pub key: String,
    pub header: String,
    pub kind: ExaColumnKind,
    pub visible: bool,
    pub sortable: bool,
    pub align: ExaAlign,
    pub width: Option<u32>,
    pub formatter: Option<ExaFormatter>,
}

impl fmt::Debug for ExaColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaColumn")
            .field("key", &self.key)
            .field("header", &self.header)
            .field("kind", &self.kind)
            .field("visible", &self.visible)
            .field("sortable", &self.sortable)
            .field("align", &self.align)
            .field("width", &self.width)
            .field("formatter", &self.formatter.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Dataset-level metadata, defaulted when absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaDatasetMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    /// ISO-8601 creation timestamp.
    pub created_at: Option<String>,
    pub description: Option<String>,
}

/// One named sub-dataset for workbook output.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaSheetSpec {
    pub name: String,
    pub rows: Vec<ExaRow>,
    pub columns: Option<Vec<ExaColumnSpec>>,
}

/// One typed unit composing a paginated document's content.
///
/// An unrecognized `type` tag fails deserialization, which the validation
/// engine reports as a fatal error.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExaBlock {
    Cover {
        title: String,
        #[serde(default)]
        subtitle: Option<String>,
        #[serde(default)]
        logo: Option<String>,
    },
    Title {
        text: String,
    },
    Paragraph {
        text: String,
    },
    Table {
        #[serde(default)]
        headers: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<Value>>,
    },
    PageBreak,
    Image {
        source: String,
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
}

/// The engine's unit of work.
///
/// Constructed by the caller for a single export call; the engine never
/// retains it beyond that call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaDataset {
    /// Ordered sequence of flat records.
    pub rows: Vec<ExaRow>,
    /// Optional explicit column descriptors; auto-detected when absent.
    pub columns: Option<Vec<ExaColumnSpec>>,
    /// Optional dataset metadata.
    pub metadata: Option<ExaDatasetMeta>,
    /// Optional named sub-datasets for workbook output.
    pub sheets: Option<Vec<ExaSheetSpec>>,
    /// Optional explicit document content, bypassing automatic generation.
    pub content: Option<Vec<ExaBlock>>,
}

impl ExaDataset {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dataset from JSON values; non-object values are rejected.
    pub fn from_rows(rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    map
                }
            })
            .collect();
        ExaDataset {
            rows,
            ..Default::default()
        }
    }

    /// Deserializes a dataset from an untyped JSON value.
    ///
    /// This is the entry point for callers holding raw configuration-style
    /// data; an unknown document block type surfaces here as an error.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| ExaError::validation(format!("invalid dataset: {}", err)))
    }

    /// Attaches explicit column descriptors.
    pub fn with_columns(mut self, columns: Vec<ExaColumnSpec>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Attaches metadata.
    pub fn with_metadata(mut self, metadata: ExaDatasetMeta) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attaches named workbook sheets.
    pub fn with_sheets(mut self, sheets: Vec<ExaSheetSpec>) -> Self {
        self.sheets = Some(sheets);
        self
    }

    /// Attaches explicit document content.
    pub fn with_content(mut self, content: Vec<ExaBlock>) -> Self {
        self.content = Some(content);
        self
    }

    /// True when the dataset carries neither rows nor explicit content.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
            && self.content.as_ref().map_or(true, |c| c.is_empty())
            && self.sheets.as_ref().map_or(true, |s| s.is_empty())
    }
}
