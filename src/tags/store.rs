use serde_json::Value;
use tracing::{debug, warn};

use super::ColorMap;
use super::color::{ColorParseError, normalize_color};
use super::storage::{KeyValueStorage, StorageError};

/// Storage key holding the JSON-encoded tag color mapping.
pub const TAG_COLORS_KEY: &str = "config_tag_colors";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("tag color storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("malformed color `{value}` for tag `{tag}`: {source}")]
    MalformedColorValue {
        tag: String,
        value: String,
        #[source]
        source: ColorParseError,
    },

    #[error("failed to encode tag colors: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Tag colors persisted under [`TAG_COLORS_KEY`]. Until the key is written,
/// reads see the configured defaults.
pub struct TagColorStore {
    storage: Box<dyn KeyValueStorage + Send>,
    defaults: ColorMap,
}

impl TagColorStore {
    pub fn new(storage: Box<dyn KeyValueStorage + Send>, defaults: ColorMap) -> Self {
        Self { storage, defaults }
    }

    pub fn defaults(&self) -> &ColorMap {
        &self.defaults
    }

    /// Seeds the defaults when nothing is stored yet. An existing mapping,
    /// even an empty one, is left alone.
    pub fn initialize(&mut self) -> Result<(), StoreError> {
        match self.storage.get_item(TAG_COLORS_KEY)? {
            Some(raw) if parse_color_map(&raw).is_some() => {
                debug!("tag color store already initialized");
                Ok(())
            }
            Some(_) => {
                warn!(key = TAG_COLORS_KEY, "stored tag colors are unreadable; reseeding defaults");
                self.write(&self.defaults.clone())
            }
            None => {
                debug!(defaults = self.defaults.len(), "seeding tag color store");
                self.write(&self.defaults.clone())
            }
        }
    }

    pub fn get(&self, tag: &str) -> Result<Option<String>, StoreError> {
        Ok(self.all()?.remove(tag))
    }

    /// Upserts a color, normalized to `#rrggbb`, and returns the stored value.
    pub fn set(&mut self, tag: &str, color: &str) -> Result<String, StoreError> {
        let normalized =
            normalize_color(color).map_err(|source| StoreError::MalformedColorValue {
                tag: tag.to_owned(),
                value: color.to_owned(),
                source,
            })?;

        let mut colors = self.all()?;
        colors.insert(tag.to_owned(), normalized.clone());
        self.write(&colors)?;
        Ok(normalized)
    }

    pub fn remove(&mut self, tag: &str) -> Result<bool, StoreError> {
        let mut colors = self.all()?;
        if colors.remove(tag).is_none() {
            return Ok(false);
        }

        self.write(&colors)?;
        Ok(true)
    }

    pub fn all(&self) -> Result<ColorMap, StoreError> {
        let Some(raw) = self.storage.get_item(TAG_COLORS_KEY)? else {
            return Ok(self.defaults.clone());
        };

        match parse_color_map(&raw) {
            Some(colors) => Ok(colors),
            None => {
                warn!(key = TAG_COLORS_KEY, "stored tag colors are unreadable; using defaults");
                Ok(self.defaults.clone())
            }
        }
    }

    /// Drops the stored mapping; the next read sees the defaults again.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.storage.remove_item(TAG_COLORS_KEY)?;
        Ok(())
    }

    fn write(&mut self, colors: &ColorMap) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(colors)?;
        self.storage.set_item(TAG_COLORS_KEY, &encoded)?;
        Ok(())
    }
}

/// Parses the stored flat object. Non-string values are skipped; anything
/// other than an object is rejected.
fn parse_color_map(raw: &str) -> Option<ColorMap> {
    let Value::Object(entries) = serde_json::from_str::<Value>(raw).ok()? else {
        return None;
    };

    let mut colors = ColorMap::new();
    for (tag, value) in entries {
        match value {
            Value::String(color) => {
                colors.insert(tag, color);
            }
            other => debug!(tag = %tag, value = %other, "skipping non-string tag color"),
        }
    }
    Some(colors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::storage::MemoryStorage;

    fn defaults() -> ColorMap {
        ColorMap::from([
            ("todo".to_owned(), "#ffc107".to_owned()),
            ("report:".to_owned(), "#dc3545".to_owned()),
        ])
    }

    fn store_with(storage: MemoryStorage) -> TagColorStore {
        TagColorStore::new(Box::new(storage), defaults())
    }

    #[test]
    fn initialize_seeds_defaults_once() {
        let mut store = store_with(MemoryStorage::new());
        store.initialize().unwrap();
        assert_eq!(store.all().unwrap(), defaults());

        store.set("reviewed", "#336699").unwrap();
        store.initialize().unwrap();
        store.initialize().unwrap();
        assert_eq!(store.get("reviewed").unwrap().as_deref(), Some("#336699"));
        assert_eq!(store.all().unwrap().len(), 3);
    }

    #[test]
    fn initialize_keeps_existing_mapping_from_previous_session() {
        let storage =
            MemoryStorage::new().with_item(TAG_COLORS_KEY, r##"{"custom":"#010203"}"##);
        let mut store = store_with(storage);
        store.initialize().unwrap();

        let colors = store.all().unwrap();
        assert_eq!(colors.len(), 1);
        assert_eq!(colors.get("custom").map(String::as_str), Some("#010203"));
    }

    #[test]
    fn initialize_keeps_an_emptied_mapping() {
        let storage = MemoryStorage::new().with_item(TAG_COLORS_KEY, "{}");
        let mut store = store_with(storage);
        store.initialize().unwrap();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn initialize_reseeds_unreadable_value() {
        let storage = MemoryStorage::new().with_item(TAG_COLORS_KEY, "[\"todo\"]");
        let mut store = store_with(storage);
        store.initialize().unwrap();
        assert_eq!(store.all().unwrap(), defaults());
    }

    #[test]
    fn set_then_get_round_trips_and_last_write_wins() {
        let mut store = store_with(MemoryStorage::new());
        store.set("reviewed", "#336699").unwrap();
        assert_eq!(store.get("reviewed").unwrap().as_deref(), Some("#336699"));

        store.set("reviewed", "#ABCDEF").unwrap();
        assert_eq!(store.get("reviewed").unwrap().as_deref(), Some("#abcdef"));
        assert_eq!(
            store.all().unwrap().keys().filter(|key| *key == "reviewed").count(),
            1
        );
    }

    #[test]
    fn set_rejects_malformed_color() {
        let mut store = store_with(MemoryStorage::new());
        let error = store.set("todo", "yellow").unwrap_err();
        assert!(matches!(error, StoreError::MalformedColorValue { .. }));
        assert_eq!(store.get("todo").unwrap().as_deref(), Some("#ffc107"));
    }

    #[test]
    fn remove_and_clear() {
        let mut store = store_with(MemoryStorage::new());
        store.initialize().unwrap();

        assert!(store.remove("todo").unwrap());
        assert!(!store.remove("todo").unwrap());
        assert_eq!(store.get("todo").unwrap(), None);

        store.clear().unwrap();
        assert_eq!(store.all().unwrap(), defaults());
    }

    #[test]
    fn non_string_values_are_skipped() {
        let storage = MemoryStorage::new()
            .with_item(TAG_COLORS_KEY, r##"{"todo":"#ffc107","broken":42}"##);
        let store = store_with(storage);
        let colors = store.all().unwrap();
        assert_eq!(colors.len(), 1);
        assert!(colors.contains_key("todo"));
    }

    #[test]
    fn unavailable_storage_surfaces_error() {
        let mut store = store_with(MemoryStorage::disabled());
        assert!(matches!(
            store.initialize(),
            Err(StoreError::StorageUnavailable(StorageError::Disabled))
        ));
        assert!(matches!(
            store.set("todo", "#000000"),
            Err(StoreError::StorageUnavailable(_))
        ));
        assert!(store.all().is_err());
    }
}
