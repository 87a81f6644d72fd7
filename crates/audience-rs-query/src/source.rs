//! Sources of audience configurations.
//!
//! The surrounding service persists audiences, objects, and relationships;
//! the compiler only needs them assembled into an [`AudienceConfig`].

use std::collections::HashMap;
use std::sync::RwLock;

use audience_rs_core::{AudienceError, AudienceResult};

use crate::model::AudienceConfig;

/// Loads audience configurations by audience id.
#[async_trait::async_trait]
pub trait AudienceConfigSource: Send + Sync {
    /// Returns the validated configuration of an audience.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown audience and `ConfigurationError`
    /// for a configuration that fails validation.
    async fn load_audience(&self, audience_id: &str) -> AudienceResult<AudienceConfig>;
}

/// An in-process source backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryAudienceSource {
    audiences: RwLock<HashMap<String, AudienceConfig>>,
}

impl InMemoryAudienceSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an audience.
    pub fn insert(&self, audience_id: impl Into<String>, config: AudienceConfig) {
        self.audiences
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(audience_id.into(), config);
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with_audience(self, audience_id: impl Into<String>, config: AudienceConfig) -> Self {
        self.insert(audience_id, config);
        self
    }

    /// Removes an audience, returning its configuration.
    pub fn remove(&self, audience_id: &str) -> Option<AudienceConfig> {
        self.audiences
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(audience_id)
    }

    /// Returns the number of stored audiences.
    pub fn len(&self) -> usize {
        self.audiences
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no audience is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AudienceConfigSource for InMemoryAudienceSource {
    async fn load_audience(&self, audience_id: &str) -> AudienceResult<AudienceConfig> {
        let config = self
            .audiences
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(audience_id)
            .cloned()
            .ok_or_else(|| AudienceError::NotFound(format!("Audience '{audience_id}'")))?;
        config.validate()?;
        Ok(config)
    }
}
