use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use super::color::{
    ColorParseError, FALLBACK_BACKGROUND, color_for, invert, normalize_color,
};
use super::storage::FileStorage;
use super::store::{StoreError, TagColorStore};
use super::{ColorMap, configured_color};

/// What a tag looks like on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBadge {
    pub label: String,
    pub background: String,
    pub foreground: &'static str,
}

/// Resolves tag colors through the persistent store, allocating and
/// remembering colors for unseen tags.
///
/// Reads are served from an in-memory copy of the mapping; writes go to both
/// the copy and the store. When the store becomes unavailable the palette
/// keeps working from the copy for the rest of its lifetime.
pub struct TagPalette {
    store: TagColorStore,
    session: ColorMap,
    persistent: bool,
    reported_malformed: BTreeSet<String>,
}

impl TagPalette {
    pub fn new(mut store: TagColorStore) -> Self {
        let loaded = store.initialize().and_then(|()| store.all());
        let (session, persistent) = match loaded {
            Ok(colors) => (colors, true),
            Err(error) => {
                warn!(error = %error, "tag colors are session-only: storage unavailable");
                (store.defaults().clone(), false)
            }
        };

        Self {
            store,
            session,
            persistent,
            reported_malformed: BTreeSet::new(),
        }
    }

    /// Palette over a [`FileStorage`] at `path`, seeded with `defaults`.
    pub fn file_backed(path: &Path, defaults: ColorMap) -> Self {
        Self::new(TagColorStore::new(Box::new(FileStorage::new(path)), defaults))
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Re-reads the store, picking up changes written by other processes.
    pub fn refresh(&mut self) {
        if !self.persistent {
            return;
        }

        match self.store.all() {
            Ok(colors) => {
                self.session = colors;
                self.reported_malformed.clear();
            }
            Err(error) => self.degrade(error),
        }
    }

    /// Display color for `tag`, always `#rrggbb`. A configured value that
    /// does not parse is replaced by [`FALLBACK_BACKGROUND`].
    pub fn color(&mut self, tag: &str) -> String {
        if let Some(stored) = configured_color(tag, &self.session) {
            let stored = stored.to_owned();
            return self.checked(tag, stored);
        }

        let color = color_for(tag, &self.session);
        debug!(tag, color = %color, "allocated tag color");
        self.remember(tag, &color);
        color
    }

    pub fn badge(&mut self, tag: &str) -> TagBadge {
        let background = self.color(tag);
        TagBadge {
            label: tag.to_owned(),
            foreground: invert(&background),
            background,
        }
    }

    /// Explicit color choice for a tag or a `prefix:` key.
    pub fn set_color(&mut self, tag: &str, color: &str) -> Result<String, ColorParseError> {
        let normalized = normalize_color(color)?;
        self.remember(tag, &normalized);
        self.reported_malformed.remove(tag);
        Ok(normalized)
    }

    /// Pins the tag's current color (own, prefix or allocated) as its own
    /// entry.
    pub fn add_tag(&mut self, tag: &str) -> String {
        let color = self.color(tag);
        if !self.session.contains_key(tag) {
            self.remember(tag, &color);
        }
        color
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.session.remove(tag).is_some();
        if self.persistent {
            if let Err(error) = self.store.remove(tag) {
                self.degrade(error);
            }
        }
        removed
    }

    /// Stored mapping as is, malformed values included.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.session
            .iter()
            .map(|(tag, color)| (tag.clone(), color.clone()))
            .collect()
    }

    fn checked(&mut self, tag: &str, stored: String) -> String {
        match normalize_color(&stored) {
            Ok(color) => color,
            Err(error) => {
                if self.reported_malformed.insert(tag.to_owned()) {
                    warn!(
                        tag,
                        stored = %stored,
                        error = %error,
                        fallback = FALLBACK_BACKGROUND,
                        "stored tag color is malformed"
                    );
                }
                FALLBACK_BACKGROUND.to_owned()
            }
        }
    }

    fn remember(&mut self, tag: &str, color: &str) {
        self.session.insert(tag.to_owned(), color.to_owned());
        if !self.persistent {
            return;
        }

        if let Err(error) = self.store.set(tag, color) {
            self.degrade(error);
        }
    }

    fn degrade(&mut self, error: StoreError) {
        match error {
            StoreError::MalformedColorValue { .. } => {
                debug!(error = %error, "ignoring malformed tag color");
            }
            StoreError::StorageUnavailable(_) | StoreError::Encode(_) => {
                warn!(error = %error, "tag colors are session-only: storage unavailable");
                self.persistent = false;
            }
        }
    }
}
