//! Property sources consulted at refresh time.
//!
//! Values are looked up on every call and never cached, so a refresh always
//! observes the latest external configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::{MenuError, Result};

/// A source of string properties keyed by dotted names such as `cart.coffees`.
pub trait PropertySource: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Looks up `key`, returning `None` when this source does not define it.
    fn get(&self, key: &str) -> Result<Option<String>>;
}

impl<T: PropertySource + ?Sized> PropertySource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }
}

/// Reads properties from process environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvPropertySource;

impl EnvPropertySource {
    /// Creates a source over the current process environment.
    pub fn new() -> Self {
        Self
    }

    /// Maps a dotted property name to its variable name: `cart.points-sink-url`
    /// becomes `CART_POINTS_SINK_URL`.
    pub fn variable_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                other => other.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(std::env::var(Self::variable_name(key)).ok())
    }
}

/// Reads properties from a JSON file, re-reading it on every lookup.
///
/// Keys may be stored flat (`{"cart.coffees": "..."}`) or nested
/// (`{"cart": {"coffees": "..."}}`). A missing file defines nothing.
#[derive(Debug, Clone)]
pub struct JsonFilePropertySource {
    path: PathBuf,
    name: String,
}

impl JsonFilePropertySource {
    /// Creates a source for `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }

    fn load(&self) -> Result<Option<Value>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(MenuError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| MenuError::Json {
                path: self.path.display().to_string(),
                source,
            })
    }
}

impl PropertySource for JsonFilePropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(root) = self.load()? else {
            return Ok(None);
        };

        let value = root
            .get(key)
            .or_else(|| key.split('.').try_fold(&root, |node, part| node.get(part)));

        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(MenuError::NotAString {
                key: key.to_string(),
                source_name: self.name.clone(),
            }),
        }
    }
}

/// In-memory properties, settable at runtime.
#[derive(Debug, Default)]
pub struct MapPropertySource {
    values: RwLock<HashMap<String, String>>,
}

impl MapPropertySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

/// Consults sources in order; the first one defining a key wins.
#[derive(Default)]
pub struct LayeredPropertySource {
    layers: Vec<Box<dyn PropertySource>>,
}

impl LayeredPropertySource {
    /// Creates a source with no layers, which defines nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer below the existing ones.
    pub fn with_layer(mut self, source: impl PropertySource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    /// Number of layers consulted on each lookup.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

impl PropertySource for LayeredPropertySource {
    fn name(&self) -> &str {
        "layered"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        for layer in &self.layers {
            if let Some(value) = layer.get(key)? {
                tracing::trace!(key, source = layer.name(), "property resolved");
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
