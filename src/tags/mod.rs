//! Tag colors, their persistence and the transient UI state around them.

use std::collections::BTreeMap;

pub mod color;
pub mod interaction;
pub mod palette;
pub mod storage;
pub mod store;
pub mod vocabulary;

/// Flat tag name (or `prefix:`) to `#rrggbb` mapping, as persisted.
pub type ColorMap = BTreeMap<String, String>;

pub const PREFIX_SEPARATOR: char = ':';

/// Key under which a namespaced tag shares its color, e.g. `report:` for
/// `report:data`. Plain tags have no prefix key.
pub fn prefix_key(tag: &str) -> Option<String> {
    tag.split_once(PREFIX_SEPARATOR)
        .map(|(prefix, _)| format!("{prefix}{PREFIX_SEPARATOR}"))
}

pub fn is_prefix_key(key: &str) -> bool {
    key.ends_with(PREFIX_SEPARATOR)
}

/// Explicitly configured color for `tag`: its own entry first, then the entry
/// of its prefix.
pub fn configured_color<'a>(tag: &str, colors: &'a ColorMap) -> Option<&'a str> {
    if let Some(color) = colors.get(tag) {
        return Some(color.as_str());
    }

    prefix_key(tag)
        .and_then(|prefix| colors.get(&prefix))
        .map(String::as_str)
}
