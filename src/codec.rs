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

//! # Exa Codec Loader Module
//!
//! Lazy acquisition of the heavy optional codecs needed only by the
//! workbook and document serializers. Acquisition is asynchronous, bounded
//! by a configurable timeout, and cached per engine instance: the first
//! `load` for a key acquires and stores the handle, subsequent loads return
//! the cached handle without re-acquiring. The cache resets as a whole,
//! never per key.
//!
//! The built-in provider resolves handles from compiled-in features; tests
//! and embedders can inject their own [`ExaCodecProvider`] to simulate slow
//! or failing acquisition.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use crate::errors::{ExaError, Result};

/// Keys of the optional codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExaCodecKey {
    /// Fully-styled workbook writer.
    Workbook,
    /// Page-layout document writer.
    Document,
}

impl ExaCodecKey {
    pub fn name(&self) -> &'static str {
        match self {
            ExaCodecKey::Workbook => "workbook",
            ExaCodecKey::Document => "document",
        }
    }
}

impl fmt::Display for ExaCodecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An acquired codec handle.
///
/// Handles are capability tokens: holding one proves the corresponding
/// codec is available in this build and ready to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExaCodecHandle {
    pub key: ExaCodecKey,
}

/// Source of codec handles.
#[async_trait]
pub trait ExaCodecProvider: Send + Sync {
    /// Acquires the codec for `key`, or fails with [`ExaError::Codec`].
    async fn acquire(&self, key: ExaCodecKey) -> Result<ExaCodecHandle>;
}

/// Provider backed by compiled-in features.
#[derive(Debug, Default)]
pub struct ExaBuiltinProvider;

#[async_trait]
impl ExaCodecProvider for ExaBuiltinProvider {
    async fn acquire(&self, key: ExaCodecKey) -> Result<ExaCodecHandle> {
        let available = match key {
            ExaCodecKey::Workbook => cfg!(feature = "xlsx"),
            ExaCodecKey::Document => cfg!(feature = "pdf"),
        };
        if available {
            Ok(ExaCodecHandle { key })
        } else {
            Err(ExaError::codec(
                key.name(),
                "not compiled into this build",
            ))
        }
    }
}

/// Per-instance codec cache.
pub struct ExaCodecCache {
    provider: Arc<dyn ExaCodecProvider>,
    cache: Mutex<HashMap<ExaCodecKey, ExaCodecHandle>>,
}

impl ExaCodecCache {
    /// Creates a cache over a custom provider.
    pub fn new(provider: Arc<dyn ExaCodecProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a cache over the built-in feature-backed provider.
    pub fn with_builtin() -> Self {
        Self::new(Arc::new(ExaBuiltinProvider))
    }

    /// Loads the codec for `key`, acquiring it on first use.
    ///
    /// The timeout bounds acquisition only; cached loads return at once.
    pub async fn load(&self, key: ExaCodecKey, timeout: Duration) -> Result<ExaCodecHandle> {
        let mut cache = self.cache.lock().await;
        if let Some(handle) = cache.get(&key) {
            return Ok(*handle);
        }

        debug!("acquiring codec '{}'", key);
        let handle = match tokio::time::timeout(timeout, self.provider.acquire(key)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExaError::codec(
                    key.name(),
                    format!("acquisition timed out after {} ms", timeout.as_millis()),
                ))
            }
        };

        cache.insert(key, handle);
        Ok(handle)
    }

    /// True when the codec for `key` has already been acquired.
    pub async fn is_loaded(&self, key: ExaCodecKey) -> bool {
        self.cache.lock().await.contains_key(&key)
    }

    /// Drops every cached handle. Intended for test isolation.
    pub async fn reset(&self) {
        self.cache.lock().await.clear();
    }
}

impl fmt::Debug for ExaCodecCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExaCodecCache").finish_non_exhaustive()
    }
}
