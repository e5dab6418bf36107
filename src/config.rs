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

//! # Exa Configuration Module
//!
//! Per-export options, merged as a cascade:
//!
//! ```text
//! struct defaults (global + format) ← named preset ← caller overrides
//! ```
//!
//! The cascade is one explicit recursive merge over `serde_json::Value`:
//! object-valued keys merge field-by-field, scalar and array-valued keys are
//! replaced wholesale (arrays replace, never concatenate). The merged value
//! then deserializes into [`ExaResolvedConfig`], whose `#[serde(default)]`
//! structs encode the global and format-specific default layers, so absent
//! keys always resolve and type mismatches surface as validation errors.
//!
//! Caller overrides are flat for the chosen format, e.g. for JSON:
//!
//! ```json
//! { "filename": "ventas", "format": "array", "indent": 0 }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::errors::{ExaError, Result};

/// Recursively merges `overlay` into `base`.
///
/// Objects merge field-by-field; every other value (scalars and arrays)
/// replaces the base value wholesale.
pub fn merge_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Registry of named configuration presets.
///
/// Mirrors the operator-factory registry pattern: presets are plain JSON
/// fragments merged between the defaults and the caller overrides.
#[derive(Clone, Debug, Default)]
pub struct ExaPresets {
    map: HashMap<String, Value>,
}

impl ExaPresets {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-loaded with the bundled presets.
    pub fn with_defaults() -> Self {
        let mut presets = Self::new();
        presets.register(
            "minimal",
            json!({
                "timestamp": false,
                "indent": 0,
                "includeMetadata": false,
                "autoFitColumns": false,
                "freezeHeader": false,
                "cover": { "enabled": false },
                "header": { "enabled": false },
                "footer": { "enabled": false, "pageNumbers": false }
            }),
        );
        presets.register(
            "report",
            json!({
                "layout": "report",
                "autoFilter": true,
                "showBorders": true,
                "cover": { "enabled": true },
                "footer": { "enabled": true, "pageNumbers": true }
            }),
        );
        presets
    }

    /// Registers (or replaces) a preset under the given name.
    pub fn register(&mut self, name: impl Into<String>, value: Value) {
        self.map.insert(name.into(), value);
    }

    /// Looks up a preset by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }
}

/// Filter comparison operators.
///
/// Unknown operator names deserialize to [`ExaFilterOp::Unknown`], which the
/// processor treats as a no-op (the row passes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExaFilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    IsEmpty,
    NotEmpty,
    #[serde(other)]
    Unknown,
}

/// One per-column filter predicate. Configured filters form a conjunction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaFilterRule {
    pub column: String,
    #[serde(alias = "operator")]
    pub op: ExaFilterOp,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaSortDirection {
    Asc,
    Desc,
}

/// Single-column sort rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaSortRule {
    pub column: String,
    #[serde(default = "default_sort_direction")]
    pub direction: ExaSortDirection,
}

fn default_sort_direction() -> ExaSortDirection {
    ExaSortDirection::Asc
}

/// System limits checked before any processing begins.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaLimits {
    pub max_rows: usize,
    pub max_columns: usize,
    pub max_cell_length: usize,
}

impl Default for ExaLimits {
    fn default() -> Self {
        Self {
            max_rows: 100_000,
            max_columns: 256,
            max_cell_length: 32_767,
        }
    }
}

/// Options shared by every format.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaCommonOptions {
    /// Base output filename, without extension.
    pub filename: String,
    /// Append a timestamp suffix before the extension.
    pub timestamp: bool,
    /// Attempt delivery after generation.
    pub auto_download: bool,
    /// Return `Err` on failure instead of a failed result record.
    pub strict: bool,
    /// Named preset merged below the caller overrides.
    pub preset: Option<String>,
    /// Conjunction of per-column filters applied by the processor.
    pub filters: Vec<ExaFilterRule>,
    /// Optional single-column sort applied by the processor.
    pub sort: Option<ExaSortRule>,
    /// Codec acquisition timeout in milliseconds.
    pub codec_timeout_ms: u64,
}

impl Default for ExaCommonOptions {
    fn default() -> Self {
        Self {
            filename: "export".to_string(),
            timestamp: true,
            auto_download: true,
            strict: false,
            preset: None,
            filters: Vec::new(),
            sort: None,
            codec_timeout_ms: 10_000,
        }
    }
}

/// Delimited-text options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaCsvOptions {
    pub delimiter: String,
    pub include_header: bool,
    /// Quote every non-numeric field, not only conflicting ones.
    pub quote_strings: bool,
    /// Double embedded quotes; disabled means backslash escaping.
    pub escape_quotes: bool,
    pub line_break: String,
    pub encoding: String,
}

impl Default for ExaCsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            include_header: true,
            quote_strings: false,
            escape_quotes: true,
            line_break: "\n".to_string(),
            encoding: "utf-8".to_string(),
        }
    }
}

/// Structured-text output shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaJsonShape {
    /// Bare row array.
    Array,
    /// `{data, columns, metadata, statistics}`.
    Structured,
    /// `{success, data, metadata, timestamp}`.
    Envelope,
}

/// Structured-text options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaJsonOptions {
    pub format: ExaJsonShape,
    pub indent: usize,
    pub include_metadata: bool,
    /// When false, every value is recursively stringified.
    pub preserve_types: bool,
}

impl Default for ExaJsonOptions {
    fn default() -> Self {
        Self {
            format: ExaJsonShape::Structured,
            indent: 2,
            include_metadata: true,
            preserve_types: true,
        }
    }
}

/// Tagged-text layout variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaTxtLayout {
    Delimited,
    Fixed,
    Aligned,
    Report,
}

/// Tagged-text options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaTxtOptions {
    pub layout: ExaTxtLayout,
    /// Field separator for the `delimited` layout. Shares the overrides key
    /// with the CSV delimiter but defaults to a tab.
    pub delimiter: String,
    pub min_column_width: usize,
    pub max_column_width: usize,
    pub fill_char: char,
    pub column_separator: String,
    pub report_width: usize,
}

impl Default for ExaTxtOptions {
    fn default() -> Self {
        Self {
            layout: ExaTxtLayout::Delimited,
            delimiter: "\t".to_string(),
            min_column_width: 5,
            max_column_width: 50,
            fill_char: ' ',
            column_separator: " | ".to_string(),
            report_width: 80,
        }
    }
}

/// Workbook header styling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaHeaderStyle {
    pub bold: bool,
    pub background_color: String,
    pub text_color: String,
    pub font_size: f64,
    pub height: f64,
}

impl Default for ExaHeaderStyle {
    fn default() -> Self {
        Self {
            bold: true,
            background_color: "#4472C4".to_string(),
            text_color: "#FFFFFF".to_string(),
            font_size: 11.0,
            height: 20.0,
        }
    }
}

/// Workbook options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaXlsxOptions {
    pub sheet_name: String,
    pub auto_fit_columns: bool,
    pub freeze_header: bool,
    pub auto_filter: bool,
    pub show_borders: bool,
    pub zoom: u16,
    pub header_style: ExaHeaderStyle,
    pub min_column_width: usize,
    pub max_column_width: usize,
}

impl Default for ExaXlsxOptions {
    fn default() -> Self {
        Self {
            sheet_name: "Datos".to_string(),
            auto_fit_columns: true,
            freeze_header: true,
            auto_filter: false,
            show_borders: false,
            zoom: 100,
            header_style: ExaHeaderStyle::default(),
            min_column_width: 8,
            max_column_width: 64,
        }
    }
}

/// Document page sizes, in PostScript points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaPageSize {
    A4,
    Letter,
    Legal,
}

impl ExaPageSize {
    /// Portrait (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            ExaPageSize::A4 => (595.28, 841.89),
            ExaPageSize::Letter => (612.0, 792.0),
            ExaPageSize::Legal => (612.0, 1008.0),
        }
    }
}

/// Document page orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExaOrientation {
    Portrait,
    Landscape,
}

/// Document cover page options.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaCoverOptions {
    pub enabled: bool,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub logo: Option<String>,
}

/// Running page header options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaPageHeaderOptions {
    pub enabled: bool,
    pub text: Option<String>,
}

impl Default for ExaPageHeaderOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            text: None,
        }
    }
}

/// Running page footer options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaPageFooterOptions {
    pub enabled: bool,
    pub text: Option<String>,
    pub page_numbers: bool,
}

impl Default for ExaPageFooterOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            text: None,
            page_numbers: true,
        }
    }
}

/// Organization branding applied to workbook and document output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaBranding {
    pub org_name: String,
    pub primary_color: String,
    pub secondary_color: String,
}

impl Default for ExaBranding {
    fn default() -> Self {
        Self {
            org_name: "Exa".to_string(),
            primary_color: "#1F4E79".to_string(),
            secondary_color: "#666666".to_string(),
        }
    }
}

/// Paginated-document options.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExaPdfOptions {
    pub page_size: ExaPageSize,
    pub page_orientation: ExaOrientation,
    /// `[top, right, bottom, left]`, in points.
    pub page_margins: [f64; 4],
    pub cover: ExaCoverOptions,
    pub header: ExaPageHeaderOptions,
    pub footer: ExaPageFooterOptions,
    pub branding: ExaBranding,
}

impl Default for ExaPdfOptions {
    fn default() -> Self {
        Self {
            page_size: ExaPageSize::A4,
            page_orientation: ExaOrientation::Portrait,
            page_margins: [40.0, 40.0, 40.0, 40.0],
            cover: ExaCoverOptions::default(),
            header: ExaPageHeaderOptions::default(),
            footer: ExaPageFooterOptions::default(),
            branding: ExaBranding::default(),
        }
    }
}

/// The fully-resolved configuration an export call runs with.
///
/// Every per-format section deserializes independently from the same merged
/// flat overrides object, so the caller passes the keys of the chosen
/// format without nesting; sections of other formats simply ignore keys
/// they do not recognize, and keys shared between sections (`delimiter`,
/// the width clamps) reach all of them.
#[derive(Clone, Debug, Default)]
pub struct ExaResolvedConfig {
    pub common: ExaCommonOptions,
    pub csv: ExaCsvOptions,
    pub json: ExaJsonOptions,
    pub txt: ExaTxtOptions,
    pub xlsx: ExaXlsxOptions,
    pub pdf: ExaPdfOptions,
    pub limits: ExaLimits,
}

impl ExaResolvedConfig {
    /// Resolves the cascade for one export call.
    ///
    /// Precedence, lowest to highest: struct defaults, the named preset (if
    /// `overrides` carries a `preset` key), the caller overrides.
    pub fn resolve(overrides: &Value, presets: &ExaPresets) -> Result<Self> {
        let mut merged = Value::Object(Map::new());

        if let Some(name) = overrides.get("preset").and_then(Value::as_str) {
            let preset = presets.get(name).ok_or_else(|| {
                ExaError::validation(format!("unknown preset '{}'", name))
            })?;
            merge_values(&mut merged, preset);
        }
        merge_values(&mut merged, overrides);

        Ok(Self {
            common: section(&merged, "common")?,
            csv: section(&merged, "csv")?,
            json: section(&merged, "json")?,
            txt: section(&merged, "txt")?,
            xlsx: section(&merged, "xlsx")?,
            pdf: section(&merged, "pdf")?,
            limits: match merged.get("limits") {
                Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                    ExaError::validation(format!("invalid limits configuration: {}", err))
                })?,
                None => ExaLimits::default(),
            },
        })
    }
}

fn section<T: serde::de::DeserializeOwned>(merged: &Value, name: &str) -> Result<T> {
    serde_json::from_value(merged.clone()).map_err(|err| {
        ExaError::validation(format!("invalid {} configuration: {}", name, err))
    })
}
