//! Bulk tag set/unset requests against the backend.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::config::TagSettings;
use crate::tags::vocabulary::EntityKind;

pub mod tables;

pub use self::tables::InMemoryTables;

pub type RowKey = u64;

pub const NO_ITEMS_SELECTED: &str = "No items selected";
const UNEXPECTED_ERROR: &str = "An unexpected error occurred.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Set,
    Unset,
}

impl TagAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Unset => "unset",
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Self::Set => "Tag set",
            Self::Unset => "Tag removed",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Set => "Error while adding a tag",
            Self::Unset => "Error while removing a tag",
        }
    }
}

impl Display for TagAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user request to tag or untag the selected rows of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkTagAction {
    pub table_id: String,
    /// One tag, or several separated by newlines.
    pub tag: String,
    pub url: String,
    pub action: TagAction,
}

impl BulkTagAction {
    pub fn new(
        table_id: impl Into<String>,
        tag: impl Into<String>,
        url: impl Into<String>,
        action: TagAction,
    ) -> Self {
        Self {
            table_id: table_id.into(),
            tag: tag.into(),
            url: url.into(),
            action,
        }
    }

    pub fn with_tags(
        table_id: impl Into<String>,
        tags: &[String],
        url: impl Into<String>,
        action: TagAction,
    ) -> Self {
        Self::new(table_id, tags.join("\n"), url, action)
    }

    /// Targets the entity's list table and its `tag_multiid` endpoint.
    pub fn for_entity(kind: EntityKind, tags: &[String], action: TagAction) -> Self {
        Self::with_tags(kind.table_id(), tags, kind.tag_endpoint(), action)
    }
}

/// The data table component the service works against.
pub trait TableRegistry: Send + Sync {
    fn selected_row_keys(&self, table_id: &str) -> BTreeSet<RowKey>;

    fn redraw(&self, table_id: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Fire-and-forget user notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Success => info!(notification = message, "user notified"),
            NotificationKind::Warning => warn!(notification = message, "user notified"),
            NotificationKind::Error => error!(notification = message, "user notified"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TagMutationError {
    #[error("invalid tag endpoint `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
}

impl TagMutationError {
    /// Messages worth showing to the user, taken from the backend error body
    /// when it has one.
    pub fn user_messages(&self, action: TagAction) -> Vec<String> {
        match self {
            Self::HttpStatus { body, .. } => {
                let messages = backend_error_messages(body);
                if messages.is_empty() {
                    vec![action.failure_message().to_owned()]
                } else {
                    messages
                }
            }
            Self::Transport(_) | Self::InvalidUrl { .. } => {
                vec![action.failure_message().to_owned()]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied {
        rows: usize,
        message: Option<String>,
    },
    NothingSelected,
}

#[derive(Clone)]
pub struct TagMutationService {
    http_client: reqwest::Client,
    base_url: Url,
    tables: Arc<dyn TableRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl TagMutationService {
    pub fn new(
        http_client: reqwest::Client,
        base_url: Url,
        tables: Arc<dyn TableRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http_client,
            base_url,
            tables,
            notifier,
        }
    }

    pub fn from_settings(
        settings: &TagSettings,
        tables: Arc<dyn TableRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, TagMutationError> {
        let base_url =
            Url::parse(&settings.base_url).map_err(|error| TagMutationError::InvalidUrl {
                url: settings.base_url.clone(),
                reason: error.to_string(),
            })?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = settings.http_timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(Self::new(builder.build()?, base_url, tables, notifier))
    }

    /// Applies the action to the rows currently selected in its table.
    pub async fn apply(&self, action: &BulkTagAction) -> Result<MutationOutcome, TagMutationError> {
        let rows = self.tables.selected_row_keys(&action.table_id);
        self.apply_to_rows(action, &rows).await
    }

    /// Applies the action to explicitly given rows. The table is redrawn only
    /// after the backend accepted the change; failures are notified and never
    /// retried.
    pub async fn apply_to_rows(
        &self,
        action: &BulkTagAction,
        rows: &BTreeSet<RowKey>,
    ) -> Result<MutationOutcome, TagMutationError> {
        if rows.is_empty() {
            warn!(table_id = %action.table_id, "bulk tag action without selected rows");
            self.notifier
                .notify(NotificationKind::Warning, NO_ITEMS_SELECTED);
            return Ok(MutationOutcome::NothingSelected);
        }

        match self.submit(action, rows).await {
            Ok(message) => {
                info!(
                    table_id = %action.table_id,
                    tag = %action.tag,
                    action = %action.action,
                    rows = rows.len(),
                    "bulk tag action applied"
                );
                self.tables.redraw(&action.table_id);
                let text = message
                    .as_deref()
                    .unwrap_or_else(|| action.action.success_message());
                self.notifier.notify(NotificationKind::Success, text);

                Ok(MutationOutcome::Applied {
                    rows: rows.len(),
                    message,
                })
            }
            Err(error) => {
                warn!(
                    table_id = %action.table_id,
                    tag = %action.tag,
                    action = %action.action,
                    error = %error,
                    "bulk tag action failed"
                );
                for message in error.user_messages(action.action) {
                    self.notifier.notify(NotificationKind::Error, &message);
                }
                Err(error)
            }
        }
    }

    async fn submit(
        &self,
        action: &BulkTagAction,
        rows: &BTreeSet<RowKey>,
    ) -> Result<Option<String>, TagMutationError> {
        let url = endpoint_url(&self.base_url, &action.url)?;
        let form = build_tag_form(action, rows);

        debug!(url = %url, fields = form.len(), "sending bulk tag request");

        let response = self.http_client.post(url).form(&form).send().await?;
        let response = ensure_success(response).await?;
        let body = response.text().await?;
        Ok(success_message(&body))
    }
}

/// Resolves an endpoint below the base URL. A leading `/` does not escape the
/// base path, so `http://host/app/` + `/backend/x` is `http://host/app/backend/x`.
pub fn endpoint_url(base_url: &Url, endpoint: &str) -> Result<Url, TagMutationError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(endpoint.trim_start_matches('/'))
        .map_err(|error| TagMutationError::InvalidUrl {
            url: endpoint.to_owned(),
            reason: error.to_string(),
        })
}

/// Form fields understood by the `tag_multiid` endpoints.
pub fn build_tag_form(action: &BulkTagAction, rows: &BTreeSet<RowKey>) -> Vec<(String, String)> {
    let mut form = Vec::with_capacity(rows.len() + 2);
    form.push(("tag".to_owned(), action.tag.clone()));
    form.push(("action".to_owned(), action.action.as_str().to_owned()));
    form.extend(
        rows.iter()
            .enumerate()
            .map(|(index, row)| (format!("ids-{index}"), row.to_string())),
    );
    form
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, TagMutationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(TagMutationError::HttpStatus { status, body })
}

#[derive(Debug, Deserialize)]
struct SuccessBody {
    message: Option<String>,
}

fn success_message(body: &str) -> Option<String> {
    serde_json::from_str::<SuccessBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .map(|message| message.trim().to_owned())
        .filter(|message| !message.is_empty())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, serde_json::Value>,
}

fn backend_error_messages(body: &str) -> Vec<String> {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    if let Some(message) = envelope.error.message.filter(|text| !text.trim().is_empty()) {
        messages.push(message);
    }

    for (field, value) in envelope.error.errors {
        match value {
            serde_json::Value::Array(items) => {
                messages.extend(items.iter().map(|item| field_message(&field, item)));
            }
            other => messages.push(field_message(&field, &other)),
        }
    }

    if messages.is_empty() {
        messages.push(UNEXPECTED_ERROR.to_owned());
    }
    messages
}

fn field_message(field: &str, value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => format!("{field}: {text}"),
        other => format!("{field}: {other}"),
    }
}
