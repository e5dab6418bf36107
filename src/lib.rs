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

//! # Exa Core Library
//!
//! This is the main library entry point for the Exa export engine. It turns
//! tabular datasets into downloadable artifacts in five formats — CSV,
//! JSON, TXT, XLSX and PDF — through a single validated, observable
//! pipeline.
//!
//! ## Module Overview
//!
//! The library is organized into the following major modules:
//!
//! - **dataset**: Datasets, column descriptors, metadata, sheets and
//!   document blocks
//! - **config**: Per-export options, presets and the deep-merge cascade
//! - **validate**: Structural, configuration and limit checks plus dataset
//!   cleaning
//! - **process**: Column normalization, formatting, filtering, sorting and
//!   statistics
//! - **transform**: Reshaping processed data into format-ready shapes
//! - **formats**: One serializer per output format behind a common contract
//! - **codec**: Lazy acquisition and caching of the optional heavy codecs
//! - **deliver**: Best-effort multi-mechanism delivery of finished content
//! - **engine**: The caller-facing exporter and its phase machine
//!
//! ## Feature Flags
//!
//! - `xlsx`: Enables the fully-styled workbook codec
//! - `pdf`: Enables the page-layout document codec
//! - `full`: Enables all features
//!
//! Without a feature, the matching format still works through its
//! lightweight fallback codec, with a warning on the result.
//!
//! ## Quick Start
//!
//! ```rust
//! use exa::{ExaDataset, ExaExporter, ExaFormat};
//! use serde_json::json;
//!
//! # async fn demo() -> exa::Result<()> {
//! let exporter = ExaExporter::new();
//! let dataset = ExaDataset::from_rows(vec![
//!     json!({"id": 1, "name": "Ada"}),
//!     json!({"id": 2, "name": "Grace"}),
//! ]);
//!
//! let result = exporter
//!     .export(ExaFormat::Csv, &dataset, &json!({"filename": "people"}))
//!     .await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! Every export runs the same stages in strict order:
//! 1. **Validate**: dataset shape, configuration shape, system limits
//! 2. **Process**: normalize columns, format cells, filter, sort
//! 3. **Transform**: reshape into the format family's representation
//! 4. **Serialize**: produce final bytes, acquiring codecs lazily
//! 5. **Deliver**: hand the artifact over, falling back across mechanisms
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ExaError>`. The export operation turns
//! pipeline failures into a failed result record unless the caller opts
//! into strict behavior.

#![allow(non_snake_case)]

pub mod errors;

pub mod codec;
pub mod config;
pub mod dataset;
pub mod deliver;
pub mod engine;
pub mod formats;
pub mod process;
pub mod transform;
pub mod validate;

pub use errors::{ExaError, Result};

pub use codec::{ExaBuiltinProvider, ExaCodecCache, ExaCodecHandle, ExaCodecKey, ExaCodecProvider};
pub use config::{
    ExaCommonOptions, ExaCsvOptions, ExaFilterOp, ExaFilterRule, ExaJsonOptions, ExaJsonShape,
    ExaLimits, ExaPdfOptions, ExaPresets, ExaResolvedConfig, ExaSortDirection, ExaSortRule,
    ExaTxtLayout, ExaTxtOptions, ExaXlsxOptions,
};
pub use dataset::{
    ExaAlign, ExaBlock, ExaColumn, ExaColumnKind, ExaColumnSpec, ExaDataset, ExaDatasetMeta,
    ExaFormatter, ExaRow, ExaSheetSpec,
};
pub use deliver::{
    build_filename, sanitize_filename, ExaDeliveryManager, ExaDeliveryOptions, ExaDeliveryRecord,
    ExaDeliveryStatus, ExaPickerFn,
};
pub use engine::{
    ExaCancelToken, ExaEvent, ExaExporter, ExaExportResult, ExaExportStats, ExaPhase,
};
pub use formats::{
    serializer_for, ExaArtifact, ExaContent, ExaFormat, ExaSerializeInput, ExaSerializer,
};
pub use process::{ExaProcessedData, ExaProcessor, ExaResolvedMeta, ExaStatistics};
pub use transform::{ExaSheet, ExaTable, ExaTransformer};
pub use validate::{detect_columns, ExaValidationReport, ExaValidator};
