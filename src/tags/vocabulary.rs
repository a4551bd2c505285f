use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use super::ColorMap;
use super::color::normalize_color;

/// Storage entities that carry tags and have a bulk tag endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Host,
    Service,
    Vuln,
    Note,
    VersionInfo,
    VulnSearch,
}

impl EntityKind {
    pub const ALL: [Self; 6] = [
        Self::Host,
        Self::Service,
        Self::Vuln,
        Self::Note,
        Self::VersionInfo,
        Self::VulnSearch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Service => "service",
            Self::Vuln => "vuln",
            Self::Note => "note",
            Self::VersionInfo => "versioninfo",
            Self::VulnSearch => "vulnsearch",
        }
    }

    pub fn table_id(self) -> String {
        format!("{}_list_table", self.as_str())
    }

    pub fn tag_endpoint(self) -> String {
        format!("/backend/storage/{}/tag_multiid", self.as_str())
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                anyhow!(
                    "invalid entity `{value}`; expected one of host, service, vuln, note, versioninfo, vulnsearch"
                )
            })
    }
}

/// Suggested tags per entity and the colors seeded into a fresh store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagVocabularies {
    pub host: Vec<String>,
    pub service: Vec<String>,
    pub vuln: Vec<String>,
    pub note: Vec<String>,
    pub annotate: Vec<String>,
    pub versioninfo: Vec<String>,
    pub vulnsearch: Vec<String>,
    pub colors: ColorMap,
}

impl Default for TagVocabularies {
    fn default() -> Self {
        let triage = || owned(&["reviewed", "todo"]);
        Self {
            host: triage(),
            service: triage(),
            vuln: owned(&["info", "report", "report:data", "todo", "falsepositive"]),
            note: triage(),
            annotate: owned(&["sslhell"]),
            versioninfo: triage(),
            vulnsearch: triage(),
            colors: ColorMap::from([
                ("todo".to_owned(), "#ffc107".to_owned()),
                ("report".to_owned(), "#dc3545".to_owned()),
                ("report:".to_owned(), "#dc3545".to_owned()),
            ]),
        }
    }
}

fn owned(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|tag| (*tag).to_owned()).collect()
}

impl TagVocabularies {
    /// Sections missing from the document keep their built-in values.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let mut vocabularies = serde_yaml::from_str::<Self>(raw)
            .context("failed to parse tag vocabulary YAML")?;

        let mut colors = ColorMap::new();
        for (tag, color) in vocabularies.colors {
            let normalized = normalize_color(&color)
                .with_context(|| format!("invalid default color for tag `{tag}`"))?;
            colors.insert(tag, normalized);
        }
        vocabularies.colors = colors;

        Ok(vocabularies)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read tag vocabulary `{}`", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("failed to load tag vocabulary `{}`", path.display()))
    }

    pub fn for_entity(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Host => &self.host,
            EntityKind::Service => &self.service,
            EntityKind::Vuln => &self.vuln,
            EntityKind::Note => &self.note,
            EntityKind::VersionInfo => &self.versioninfo,
            EntityKind::VulnSearch => &self.vulnsearch,
        }
    }

    pub fn annotate(&self) -> &[String] {
        &self.annotate
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, TagVocabularies};

    #[test]
    fn entity_kind_parses_and_derives_endpoints() {
        let kind = " VersionInfo ".parse::<EntityKind>().unwrap();
        assert_eq!(kind, EntityKind::VersionInfo);
        assert_eq!(kind.table_id(), "versioninfo_list_table");
        assert_eq!(
            EntityKind::Host.tag_endpoint(),
            "/backend/storage/host/tag_multiid"
        );
        assert!("planet".parse::<EntityKind>().is_err());
    }

    #[test]
    fn defaults_match_built_in_lists() {
        let vocabularies = TagVocabularies::default();
        assert_eq!(
            vocabularies.for_entity(EntityKind::Vuln),
            ["info", "report", "report:data", "todo", "falsepositive"]
        );
        assert_eq!(vocabularies.annotate(), ["sslhell"]);
        assert_eq!(
            vocabularies.colors.get("report:").map(String::as_str),
            Some("#dc3545")
        );
    }

    #[test]
    fn yaml_overrides_only_given_sections() {
        let raw = r##"
host: [reviewed, todo, pwned]
colors:
  pwned: "#F00"
"##;
        let vocabularies = TagVocabularies::from_yaml_str(raw).unwrap();

        assert_eq!(
            vocabularies.for_entity(EntityKind::Host),
            ["reviewed", "todo", "pwned"]
        );
        assert_eq!(
            vocabularies.for_entity(EntityKind::Note),
            ["reviewed", "todo"]
        );
        assert_eq!(vocabularies.colors.len(), 1);
        assert_eq!(
            vocabularies.colors.get("pwned").map(String::as_str),
            Some("#ff0000")
        );
    }

    #[test]
    fn yaml_rejects_bad_colors_and_unknown_sections() {
        assert!(TagVocabularies::from_yaml_str("colors:\n  todo: yellow\n").is_err());
        assert!(TagVocabularies::from_yaml_str("planets: [mars]\n").is_err());
    }
}
