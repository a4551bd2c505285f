use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, ensure};
use reqwest::Url;

use crate::tags::vocabulary::TagVocabularies;

pub const DEFAULT_BASE_URL: &str = "http://localhost:18000";
pub const DEFAULT_STORAGE_PATH: &str = ".sner_tags/local_storage.json";
pub const DEFAULT_FILE_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSettings {
    pub base_url: String,
    pub storage_path: PathBuf,
    pub vocabulary_file: Option<PathBuf>,
    pub http_timeout_ms: Option<u64>,
    pub log_dir: Option<PathBuf>,
    pub file_log_level: String,
}

impl TagSettings {
    pub fn from_env() -> Result<Self> {
        // Load .env if present, but do not fail if file does not exist.
        let _ = dotenvy::dotenv();

        let raw_base_url =
            env::var("SNER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let base_url = validate_base_url(&raw_base_url)
            .context("failed to parse SNER_BASE_URL")?
            .to_string();

        let storage_path = read_optional_env("SNER_TAGS_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));

        let vocabulary_file = read_optional_env("SNER_TAGS_VOCAB_FILE").map(PathBuf::from);

        let http_timeout_ms = parse_optional_u64_env("SNER_HTTP_TIMEOUT_MS")?;
        ensure!(
            http_timeout_ms != Some(0),
            "SNER_HTTP_TIMEOUT_MS must be greater than 0"
        );

        let log_dir = read_optional_env("SNER_TAGS_LOG_DIR").map(PathBuf::from);
        let file_log_level = read_optional_env("SNER_TAGS_FILE_LOG")
            .unwrap_or_else(|| DEFAULT_FILE_LOG_LEVEL.to_owned());

        Ok(Self {
            base_url,
            storage_path,
            vocabulary_file,
            http_timeout_ms,
            log_dir,
            file_log_level,
        })
    }

    pub fn load_vocabularies(&self) -> Result<TagVocabularies> {
        match &self.vocabulary_file {
            Some(path) => TagVocabularies::load(path),
            None => Ok(TagVocabularies::default()),
        }
    }
}

pub fn validate_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    ensure!(!trimmed.is_empty(), "base URL cannot be empty");

    let url = Url::parse(trimmed).with_context(|| format!("invalid base URL `{trimmed}`"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!(
            "base URL scheme `{other}` is not supported; expected `http` or `https`"
        )),
    }
}

fn read_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_owned())
        }
    })
}

fn parse_optional_u64_env(name: &str) -> Result<Option<u64>> {
    read_optional_env(name)
        .map(|raw| {
            raw.parse::<u64>()
                .with_context(|| format!("failed to parse {name} as u64"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::validate_base_url;

    #[test]
    fn base_url_accepts_http_and_https() {
        assert_eq!(
            validate_base_url(" http://localhost:18000 ").unwrap().as_str(),
            "http://localhost:18000/"
        );
        assert!(validate_base_url("https://sner.example.org/app/").is_ok());
    }

    #[test]
    fn base_url_rejects_empty_and_foreign_schemes() {
        assert!(validate_base_url("   ").is_err());
        assert!(validate_base_url("ftp://sner.example.org").is_err());
        assert!(validate_base_url("not a url").is_err());
    }
}
