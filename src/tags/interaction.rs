use tokio::sync::watch;

/// The tag currently targeted by the color editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInteractionState {
    pub tag: String,
    pub color: String,
    pub show: bool,
}

/// Session-wide, memory-only interaction state with a single writer.
///
/// Readers observe changes through [`TagInteraction::subscribe`]; the owner is
/// the only one able to mutate it.
#[derive(Debug)]
pub struct TagInteraction {
    state_tx: watch::Sender<TagInteractionState>,
}

impl Default for TagInteraction {
    fn default() -> Self {
        Self::new()
    }
}

impl TagInteraction {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(TagInteractionState::default());
        Self { state_tx }
    }

    /// Replaces any previous interaction.
    pub fn open(&mut self, tag: impl Into<String>, color: impl Into<String>) {
        self.state_tx.send_replace(TagInteractionState {
            tag: tag.into(),
            color: color.into(),
            show: true,
        });
    }

    /// Hides the editor, keeping the last tag and color. Closing an already
    /// closed interaction is silent.
    pub fn close(&mut self) {
        self.state_tx.send_if_modified(|state| {
            if !state.show {
                return false;
            }
            state.show = false;
            true
        });
    }

    pub fn current(&self) -> TagInteractionState {
        self.state_tx.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.state_tx.borrow().show
    }

    pub fn subscribe(&self) -> watch::Receiver<TagInteractionState> {
        self.state_tx.subscribe()
    }
}
