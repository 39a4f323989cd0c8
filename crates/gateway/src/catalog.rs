//! Error catalog: identifier → [`ErrorDescriptor`].
//!
//! The catalog is built once at startup from the built-in taxonomy plus an
//! optional YAML file, then shared read-only between all requests.
//!
//! Catalog files are nested mappings. A mapping that has a `code` key is a
//! descriptor; anything else is a group whose key becomes part of the dotted
//! identifier:
//!
//! ```yaml
//! common:
//!   missing_required_parameter:
//!     code: 400
//!     message: A required parameter is missing.
//! channel:
//!   not_found:
//!     code: 404
//!     message: The channel does not exist.
//! ```

use std::{collections::HashMap, path::Path, sync::Arc};

use common::{ErrorDescriptor, ErrorKind};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::load_mapping;

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read or parsed.
    #[error("failed to load error catalog: {0:#}")]
    Load(#[from] anyhow::Error),

    /// The file's top level is not a mapping.
    #[error("error catalog root must be a mapping")]
    NotAMapping,

    /// A descriptor entry has a missing or out-of-range field.
    #[error("invalid descriptor {identifier}: {reason}")]
    InvalidEntry { identifier: String, reason: String },
}

/// Immutable, cheaply cloneable error catalog.
#[derive(Clone, Debug)]
pub struct ErrorCatalog {
    entries: Arc<HashMap<String, ErrorDescriptor>>,
}

impl ErrorCatalog {
    /// Catalog containing only the built-in descriptors.
    pub fn builtin() -> Self {
        Self {
            entries: Arc::new(builtin_entries()),
        }
    }

    /// Built-in descriptors with every entry of `mapping` merged over them.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the mapping is not a catalog.
    pub fn from_mapping(mapping: &Value) -> Result<Self, CatalogError> {
        let root = mapping.as_object().ok_or(CatalogError::NotAMapping)?;
        let mut entries = builtin_entries();
        for (key, value) in root {
            flatten_into(key, value, &mut entries)?;
        }
        Ok(Self {
            entries: Arc::new(entries),
        })
    }

    /// Load a catalog file and merge it over the built-in descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let catalog = Self::from_mapping(&load_mapping(path)?)?;
        info!(path = %path.display(), entries = catalog.len(), "error catalog loaded");
        Ok(catalog)
    }

    /// Look up a descriptor by identifier.
    pub fn get(&self, identifier: &str) -> Option<&ErrorDescriptor> {
        self.entries.get(identifier)
    }

    /// Descriptor for a built-in kind. Always present.
    pub fn kind(&self, kind: ErrorKind) -> ErrorDescriptor {
        self.get(kind.identifier())
            .cloned()
            .unwrap_or_else(|| kind.into())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_entries() -> HashMap<String, ErrorDescriptor> {
    ErrorKind::ALL
        .into_iter()
        .map(|kind| (kind.identifier().to_owned(), kind.into()))
        .collect()
}

fn flatten_into(
    identifier: &str,
    value: &Value,
    entries: &mut HashMap<String, ErrorDescriptor>,
) -> Result<(), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidEntry {
        identifier: identifier.to_owned(),
        reason: reason.to_owned(),
    };

    let map = value.as_object().ok_or_else(|| invalid("expected a mapping"))?;
    if !map.contains_key("code") {
        for (key, child) in map {
            flatten_into(&format!("{identifier}.{key}"), child, entries)?;
        }
        return Ok(());
    }

    let code = map
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .filter(|c| (100..=599).contains(c))
        .ok_or_else(|| invalid("code must be an HTTP status between 100 and 599"))?;
    let message = map
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("message must be a string"))?;
    let kind = map.get("type").and_then(Value::as_str).unwrap_or(identifier);

    entries.insert(
        identifier.to_owned(),
        ErrorDescriptor::new(kind, code, message),
    );
    Ok(())
}
