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

//! # Exa Error Module
//!
//! This module defines the error types and utilities used throughout the Exa
//! engine for consistent error handling and reporting.
//!
//! ## Error Handling Philosophy
//!
//! Exa uses a structured error approach with the following principles:
//!
//! - **Explicit Error Types**: Each error variant represents a specific
//!   category of failure, making it easier to handle errors appropriately
//! - **Context-Rich**: Errors include relevant context (format names, codec
//!   names, detailed messages) to aid debugging
//! - **Recoverable**: Most errors are recoverable; the export pipeline turns
//!   them into failed result records instead of propagating panics
//! - **Serde Support**: Errors can be serialized/deserialized for logging
//!   and persistence
//!
//! ## Error Categories
//!
//! - **Io**: Filesystem errors raised while delivering artifacts
//! - **Validation**: Dataset or configuration shape failures
//! - **Limit**: Row/column counts exceeding configured maxima
//! - **Format**: Failures inside one format serializer
//! - **Codec**: Optional codec acquisition failures
//! - **Delivery**: Failures of individual delivery mechanisms
//! - **Busy**: A second export started while one is in flight
//! - **Cancelled**: The caller cancelled the export
//! - **Serde**: Serialization/deserialization errors

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::result::ZipError;

/// Convenience result type used throughout Exa.
pub type Result<T> = std::result::Result<T, ExaError>;

/// Canonical error enumeration for the Exa engine.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ExaError {
    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Validation errors triggered by invalid datasets or configuration.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// System limit violations (row count, column count, cell length).
    #[error("limit exceeded: {message}")]
    Limit { message: String },

    /// Any failure raised inside a format serializer.
    #[error("format '{format}' failed: {message}")]
    Format { format: String, message: String },

    /// Failure to acquire an optional codec dependency.
    #[error("codec '{codec}' unavailable: {message}")]
    Codec { codec: String, message: String },

    /// Failure of a delivery mechanism. Never escalates past the
    /// delivery manager's boundary.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// A second export was requested while one is in flight.
    #[error("an export is already in progress")]
    Busy,

    /// The export was cancelled by the caller.
    #[error("export cancelled")]
    Cancelled,

    /// Wrapper for serde-style serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<io::Error> for ExaError {
    fn from(err: io::Error) -> Self {
        ExaError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ExaError {
    fn from(err: serde_json::Error) -> Self {
        ExaError::Serde(err.to_string())
    }
}

impl From<csv::Error> for ExaError {
    fn from(err: csv::Error) -> Self {
        ExaError::Format {
            format: "csv".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ZipError> for ExaError {
    fn from(err: ZipError) -> Self {
        ExaError::Format {
            format: "xlsx".to_string(),
            message: format!("zip error: {}", err),
        }
    }
}

impl ExaError {
    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        ExaError::Validation {
            message: message.into(),
        }
    }

    /// Helper to construct limit errors.
    pub fn limit<T: Into<String>>(message: T) -> Self {
        ExaError::Limit {
            message: message.into(),
        }
    }

    /// Helper to construct format errors.
    pub fn format(format: impl Into<String>, message: impl Into<String>) -> Self {
        ExaError::Format {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Helper to construct codec errors.
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        ExaError::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Helper to construct delivery errors.
    pub fn delivery<T: Into<String>>(message: T) -> Self {
        ExaError::Delivery(message.into())
    }
}
