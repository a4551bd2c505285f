use std::collections::BTreeSet;

use tokio::sync::mpsc::UnboundedSender;

use crate::mutation::{BulkTagAction, MutationOutcome, NotificationKind, Notifier, RowKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioCommand {
    ApplyBulkTag {
        action: BulkTagAction,
        rows: BTreeSet<RowKey>,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioEvent {
    MutationStarted {
        action: BulkTagAction,
    },
    MutationFinished {
        action: BulkTagAction,
        rows: BTreeSet<RowKey>,
        result: Result<MutationOutcome, String>,
    },
    Notification {
        kind: NotificationKind,
        message: String,
    },
}

/// Forwards notifications from the runtime worker to the UI thread.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    event_tx: UnboundedSender<StudioEvent>,
}

impl ChannelNotifier {
    pub fn new(event_tx: UnboundedSender<StudioEvent>) -> Self {
        Self { event_tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        let _ = self.event_tx.send(StudioEvent::Notification {
            kind,
            message: message.to_owned(),
        });
    }
}
