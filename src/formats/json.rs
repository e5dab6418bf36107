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

//! # Exa Structured-Text Serializer
//!
//! JSON output in one of three shapes (bare array, structured object,
//! response envelope) with configurable indentation. `includeMetadata`
//! strips the metadata key from object shapes; disabling `preserveTypes`
//! recursively stringifies every leaf value so the output parses in any
//! consumer regardless of its number handling.

use async_trait::async_trait;
use serde_json::ser::PrettyFormatter;
use serde_json::{Number, Serializer, Value};

use crate::config::ExaJsonOptions;
use crate::errors::{ExaError, Result};
use crate::process::ExaProcessedData;
use crate::transform::ExaTransformer;

use super::{ExaArtifact, ExaSerializeInput, ExaSerializer};

const SAMPLE_ROWS: usize = 50;

pub struct ExaJsonSerializer;

#[async_trait]
impl ExaSerializer for ExaJsonSerializer {
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact> {
        let text = render(input.processed, &input.config.json)?;
        Ok(ExaArtifact::text(text))
    }

    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize {
        let total = input.processed.data().len();
        let sample = input.processed.truncated(SAMPLE_ROWS);
        let sample_text = match render(&sample, &input.config.json) {
            Ok(text) => text,
            Err(_) => return 0,
        };
        let sampled = sample.data().len().max(1);
        if total <= sampled {
            return sample_text.len();
        }
        // Extrapolate the sampled body over the full row count.
        sample_text.len() / sampled * total
    }

    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String> {
        let truncated = input.processed.data().len() > limit;
        let sample = input.processed.truncated(limit);
        let mut text = render(&sample, &input.config.json)?;
        if truncated {
            text.push_str("\n...");
        }
        Ok(text)
    }
}

/// Renders the configured JSON shape as a string.
pub fn render(processed: &ExaProcessedData, options: &ExaJsonOptions) -> Result<String> {
    let mut value = ExaTransformer::to_structured(processed, options.format);

    if !options.include_metadata {
        if let Value::Object(object) = &mut value {
            object.remove("metadata");
        }
    }
    if !options.preserve_types {
        stringify_values(&mut value);
    }

    to_string_indented(&value, options.indent)
}

/// Serializes with a custom indent width; zero means compact output.
pub fn to_string_indented(value: &Value, indent: usize) -> Result<String> {
    if indent == 0 {
        return serde_json::to_string(value).map_err(ExaError::from);
    }
    let pad = " ".repeat(indent.min(16));
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(pad.as_bytes());
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    serde::Serialize::serialize(value, &mut serializer)?;
    String::from_utf8(buffer).map_err(|err| ExaError::Serde(err.to_string()))
}

/// Converts a float to a JSON value, mapping non-finite values to their
/// sentinel strings.
pub fn number_value(value: f64) -> Value {
    if value.is_nan() {
        return Value::String("NaN".to_string());
    }
    if value.is_infinite() {
        return Value::String(
            if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string(),
        );
    }
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Recursively replaces every leaf value with its string form.
pub fn stringify_values(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(stringify_values),
        Value::Object(object) => object.values_mut().for_each(stringify_values),
        Value::String(_) => {}
        scalar => {
            let text = match &*scalar {
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                _ => return,
            };
            *scalar = Value::String(text);
        }
    }
}
