use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, ensure};
use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::TagSettings;
use crate::mutation::{
    BulkTagAction, InMemoryTables, MutationOutcome, NotificationKind, RowKey, TagAction,
    TagMutationService,
};
use crate::tags::color::{HexColor, invert};
use crate::tags::interaction::{TagInteraction, TagInteractionState};
use crate::tags::palette::{TagBadge, TagPalette};
use crate::tags::vocabulary::{EntityKind, TagVocabularies};

pub mod events;

use self::events::{ChannelNotifier, StudioCommand, StudioEvent};

const APP_TITLE: &str = "sner tag studio";
const MAX_ACTIVITY_ENTRIES: usize = 64;
const FALLBACK_EDITOR_RGB: [u8; 3] = [0x6c, 0x75, 0x7d];

pub fn run_studio(settings: &TagSettings) -> Result<()> {
    let runtime_handle = Handle::try_current().context("studio requires a tokio runtime")?;
    let vocabularies = settings.load_vocabularies()?;
    let palette = TagPalette::file_backed(&settings.storage_path, vocabularies.colors.clone());

    let (command_tx, command_rx) = unbounded_channel::<StudioCommand>();
    let (event_tx, event_rx) = unbounded_channel::<StudioEvent>();
    let tables = Arc::new(InMemoryTables::new());
    let notifier = Arc::new(ChannelNotifier::new(event_tx.clone()));
    let service = TagMutationService::from_settings(settings, tables.clone(), notifier)
        .context("failed to build tag mutation service")?;

    spawn_runtime_worker(&runtime_handle, service, command_rx, event_tx);
    info!(
        base_url = %settings.base_url,
        storage = %settings.storage_path.display(),
        persistent = palette.is_persistent(),
        "starting tag studio"
    );

    eframe::run_native(
        APP_TITLE,
        eframe::NativeOptions::default(),
        Box::new(move |_cc| {
            Ok(Box::new(StudioApp::new(
                palette,
                vocabularies,
                tables,
                command_tx,
                event_rx,
            )))
        }),
    )
    .map_err(|error| anyhow!("studio UI exited with error: {error}"))
}

/// Each bulk action runs in its own task on the rows captured at submit time;
/// completions may arrive in any order.
fn spawn_runtime_worker(
    handle: &Handle,
    service: TagMutationService,
    mut command_rx: UnboundedReceiver<StudioCommand>,
    event_tx: UnboundedSender<StudioEvent>,
) {
    let _task = handle.spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                StudioCommand::ApplyBulkTag { action, rows } => {
                    if event_tx
                        .send(StudioEvent::MutationStarted {
                            action: action.clone(),
                        })
                        .is_err()
                    {
                        break;
                    }

                    let service = service.clone();
                    let event_tx = event_tx.clone();
                    tokio::spawn(async move {
                        let result = service
                            .apply_to_rows(&action, &rows)
                            .await
                            .map_err(|error| error.to_string());
                        let _ = event_tx.send(StudioEvent::MutationFinished {
                            action,
                            rows,
                            result,
                        });
                    });
                }
                StudioCommand::Shutdown => break,
            }
        }
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivityEntry {
    kind: NotificationKind,
    text: String,
}

struct StudioApp {
    palette: TagPalette,
    interaction: TagInteraction,
    interaction_rx: watch::Receiver<TagInteractionState>,
    editor_rgb: [u8; 3],
    editor_hex: String,
    new_tag: String,
    vocabularies: TagVocabularies,
    entity: EntityKind,
    selected_tag: String,
    row_ids_input: String,
    tables: Arc<InMemoryTables>,
    command_tx: UnboundedSender<StudioCommand>,
    event_rx: UnboundedReceiver<StudioEvent>,
    activity: Vec<ActivityEntry>,
    mutations_in_flight: usize,
    runtime_disconnected: bool,
}

impl StudioApp {
    fn new(
        palette: TagPalette,
        vocabularies: TagVocabularies,
        tables: Arc<InMemoryTables>,
        command_tx: UnboundedSender<StudioCommand>,
        event_rx: UnboundedReceiver<StudioEvent>,
    ) -> Self {
        let interaction = TagInteraction::new();
        let interaction_rx = interaction.subscribe();
        let entity = EntityKind::Host;
        let selected_tag = vocabularies
            .for_entity(entity)
            .first()
            .cloned()
            .unwrap_or_default();

        let mut app = Self {
            palette,
            interaction,
            interaction_rx,
            editor_rgb: FALLBACK_EDITOR_RGB,
            editor_hex: String::new(),
            new_tag: String::new(),
            vocabularies,
            entity,
            selected_tag,
            row_ids_input: String::new(),
            tables,
            command_tx,
            event_rx,
            activity: Vec::new(),
            mutations_in_flight: 0,
            runtime_disconnected: false,
        };
        if !app.palette.is_persistent() {
            app.record(
                NotificationKind::Warning,
                "Tag color storage unavailable; colors last for this session only.",
            );
        }
        app
    }

    fn drain_events(&mut self) {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.runtime_disconnected {
                        warn!("studio runtime worker disconnected");
                        self.record(
                            NotificationKind::Error,
                            "Runtime worker disconnected. Restart studio to continue.",
                        );
                    }
                    self.runtime_disconnected = true;
                    self.mutations_in_flight = 0;
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: StudioEvent) {
        match event {
            StudioEvent::MutationStarted { .. } => {
                self.mutations_in_flight = self.mutations_in_flight.saturating_add(1);
            }
            StudioEvent::MutationFinished {
                action,
                rows,
                result,
            } => {
                self.mutations_in_flight = self.mutations_in_flight.saturating_sub(1);
                if let Ok(MutationOutcome::Applied { .. }) = result {
                    let cleared = self.tables.clear_selection_matching(&action.table_id, &rows);
                    info!(
                        table_id = %action.table_id,
                        rows = rows.len(),
                        cleared,
                        "studio bulk action done"
                    );
                }
            }
            StudioEvent::Notification { kind, message } => self.record(kind, message),
        }
    }

    fn record(&mut self, kind: NotificationKind, text: impl Into<String>) {
        self.activity.push(ActivityEntry {
            kind,
            text: text.into(),
        });
        if self.activity.len() > MAX_ACTIVITY_ENTRIES {
            let extra = self.activity.len() - MAX_ACTIVITY_ENTRIES;
            self.activity.drain(0..extra);
        }
    }

    /// Mirrors a freshly opened interaction into the editor fields.
    fn sync_editor(&mut self) {
        if !self.interaction_rx.has_changed().unwrap_or(false) {
            return;
        }

        let state = self.interaction_rx.borrow_and_update().clone();
        if state.show {
            self.editor_rgb = state
                .color
                .parse::<HexColor>()
                .map(HexColor::rgb)
                .unwrap_or(FALLBACK_EDITOR_RGB);
            self.editor_hex = state.color;
        }
    }

    fn add_tag(&mut self) {
        let tag = self.new_tag.trim().to_owned();
        if tag.is_empty() {
            return;
        }

        let color = self.palette.add_tag(&tag);
        self.new_tag.clear();
        self.record(NotificationKind::Success, format!("Added `{tag}` ({color})"));
    }

    fn remove_tag(&mut self, tag: &str) {
        if self.palette.remove_tag(tag) {
            self.record(NotificationKind::Success, format!("Removed color for `{tag}`"));
        }
    }

    fn change_color(&mut self) {
        let state = self.interaction.current();
        match self.palette.set_color(&state.tag, &self.editor_hex) {
            Ok(color) => {
                self.record(
                    NotificationKind::Success,
                    format!("Color of `{}` set to {color}", state.tag),
                );
                self.interaction.close();
            }
            Err(error) => self.record(NotificationKind::Error, error.to_string()),
        }
    }

    fn select_entity(&mut self, entity: EntityKind) {
        self.entity = entity;
        let suggestions = self.vocabularies.for_entity(entity);
        if !suggestions.contains(&self.selected_tag) {
            self.selected_tag = suggestions.first().cloned().unwrap_or_default();
        }
    }

    fn submit_bulk(&mut self, action: TagAction) {
        let rows = match parse_row_ids(&self.row_ids_input) {
            Ok(rows) => rows,
            Err(error) => {
                self.record(NotificationKind::Error, error.to_string());
                return;
            }
        };

        let tag = self.selected_tag.trim().to_owned();
        if tag.is_empty() {
            self.record(NotificationKind::Warning, "Pick a tag first");
            return;
        }

        let bulk = BulkTagAction::for_entity(self.entity, &[tag], action);
        self.tables.select(&bulk.table_id, rows.iter().copied());

        if let Err(error) = self.command_tx.send(StudioCommand::ApplyBulkTag {
            action: bulk,
            rows,
        }) {
            self.runtime_disconnected = true;
            self.record(
                NotificationKind::Error,
                format!("Failed to submit bulk action to runtime worker: {error}"),
            );
        }
    }

    fn render_config_pane(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Tag colors");
            if ui.small_button("Reload").clicked() {
                self.palette.refresh();
            }
        });
        if !self.palette.is_persistent() {
            ui.colored_label(
                egui::Color32::from_rgb(173, 33, 33),
                "Storage unavailable: session-only colors.",
            );
        }

        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.new_tag)
                    .hint_text("add tag")
                    .desired_width(180.0),
            );
            let submitted =
                response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
            if ui.button("Add").clicked() || submitted {
                self.add_tag();
            }
        });
        ui.separator();

        let mut edit_target = None;
        let mut removal = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (tag, _) in self.palette.entries() {
                let badge = self.palette.badge(&tag);
                ui.horizontal(|ui| {
                    if badge_label(ui, &badge)
                        .on_hover_text("Edit color")
                        .clicked()
                    {
                        edit_target = Some((tag.clone(), badge.background.clone()));
                    }
                    if ui.small_button("Delete").clicked() {
                        removal = Some(tag.clone());
                    }
                });
            }
        });

        if let Some((tag, color)) = edit_target {
            self.interaction.open(tag, color);
        }
        if let Some(tag) = removal {
            self.remove_tag(&tag);
        }
    }

    fn render_editor_window(&mut self, ctx: &egui::Context) {
        let state = self.interaction.current();
        if !state.show {
            return;
        }

        let mut change = false;
        let mut cancel = false;
        egui::Window::new("Tag Configuration")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                let subject = if state.tag.contains(crate::tags::PREFIX_SEPARATOR) {
                    "prefix"
                } else {
                    "tag"
                };
                ui.horizontal(|ui| {
                    ui.label(format!("Change color for {subject}"));
                    let preview = TagBadge {
                        label: state.tag.clone(),
                        foreground: invert(&self.editor_hex),
                        background: self.editor_hex.clone(),
                    };
                    badge_label(ui, &preview);
                });

                if egui::color_picker::color_edit_button_srgb(ui, &mut self.editor_rgb).changed() {
                    let [r, g, b] = self.editor_rgb;
                    self.editor_hex = HexColor::new(r, g, b).to_string();
                }
                if ui.text_edit_singleline(&mut self.editor_hex).changed() {
                    if let Ok(parsed) = self.editor_hex.trim().parse::<HexColor>() {
                        self.editor_rgb = parsed.rgb();
                    }
                }

                ui.horizontal(|ui| {
                    change = ui.button("Change").clicked();
                    cancel = ui.button("Cancel").clicked();
                });
            });

        if change {
            self.editor_hex = self.editor_hex.trim().to_owned();
            self.change_color();
        } else if cancel {
            self.interaction.close();
        }
    }

    fn render_bulk_pane(&mut self, ui: &mut egui::Ui) {
        ui.heading("Bulk tagging");

        let mut entity = self.entity;
        egui::ComboBox::from_label("Entity")
            .selected_text(entity.as_str())
            .show_ui(ui, |ui| {
                for kind in EntityKind::ALL {
                    ui.selectable_value(&mut entity, kind, kind.as_str());
                }
            });
        if entity != self.entity {
            self.select_entity(entity);
        }

        let suggestions = self.vocabularies.for_entity(self.entity).to_vec();
        egui::ComboBox::from_label("Tag")
            .selected_text(self.selected_tag.as_str())
            .show_ui(ui, |ui| {
                for tag in &suggestions {
                    ui.selectable_value(&mut self.selected_tag, tag.clone(), tag.as_str());
                }
            });
        if !self.selected_tag.is_empty() {
            let badge = self.palette.badge(&self.selected_tag);
            badge_label(ui, &badge);
        }

        ui.label("Row ids");
        ui.add(
            egui::TextEdit::singleline(&mut self.row_ids_input)
                .hint_text("e.g. 1, 2, 7")
                .desired_width(240.0),
        );

        let table_id = self.entity.table_id();
        ui.label(format!("Table: {table_id}"));
        ui.label(format!("Endpoint: {}", self.entity.tag_endpoint()));
        ui.label(format!("Redraws: {}", self.tables.redraw_count(&table_id)));

        let can_send = !self.runtime_disconnected;
        ui.horizontal(|ui| {
            if ui.add_enabled(can_send, egui::Button::new("Set tag")).clicked() {
                self.submit_bulk(TagAction::Set);
            }
            if ui
                .add_enabled(can_send, egui::Button::new("Unset tag"))
                .clicked()
            {
                self.submit_bulk(TagAction::Unset);
            }
        });
        if self.mutations_in_flight > 0 {
            ui.label(format!("Requests in flight: {}", self.mutations_in_flight));
        }

        ui.separator();
        ui.label(egui::RichText::new("Activity").strong());
        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in &self.activity {
                    ui.colored_label(activity_color(entry.kind), entry.text.as_str());
                }
            });
    }
}

fn badge_label(ui: &mut egui::Ui, badge: &TagBadge) -> egui::Response {
    let text = egui::RichText::new(format!(" {} ", badge.label))
        .monospace()
        .background_color(color32(&badge.background))
        .color(color32(badge.foreground));
    ui.add(egui::Label::new(text).sense(egui::Sense::click()))
}

fn color32(hex: &str) -> egui::Color32 {
    hex.parse::<HexColor>()
        .map(|color| egui::Color32::from_rgb(color.r, color.g, color.b))
        .unwrap_or(egui::Color32::GRAY)
}

fn activity_color(kind: NotificationKind) -> egui::Color32 {
    match kind {
        NotificationKind::Success => egui::Color32::from_rgb(26, 103, 64),
        NotificationKind::Warning => egui::Color32::from_rgb(140, 84, 0),
        NotificationKind::Error => egui::Color32::from_rgb(173, 33, 33),
    }
}

/// Row ids separated by commas and/or whitespace.
fn parse_row_ids(input: &str) -> Result<BTreeSet<RowKey>> {
    let rows = input
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<RowKey>()
                .with_context(|| format!("invalid row id `{part}`"))
        })
        .collect::<Result<BTreeSet<_>>>()?;
    ensure!(!rows.is_empty(), "enter at least one row id");
    Ok(rows)
}

impl Drop for StudioApp {
    fn drop(&mut self) {
        let _ = self.command_tx.send(StudioCommand::Shutdown);
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.sync_editor();

        egui::SidePanel::left("studio_tag_colors")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.render_config_pane(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.render_bulk_pane(ui));

        self.render_editor_window(ctx);

        ctx.request_repaint_after(Duration::from_millis(120));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use reqwest::Url;
    use tokio::runtime::Handle;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    use super::events::{ChannelNotifier, StudioCommand, StudioEvent};
    use super::{MAX_ACTIVITY_ENTRIES, StudioApp, parse_row_ids, spawn_runtime_worker};
    use crate::mutation::{
        BulkTagAction, InMemoryTables, MutationOutcome, NO_ITEMS_SELECTED, NotificationKind,
        TableRegistry, TagAction, TagMutationService,
    };
    use crate::tags::palette::TagPalette;
    use crate::tags::storage::MemoryStorage;
    use crate::tags::store::TagColorStore;
    use crate::tags::vocabulary::{EntityKind, TagVocabularies};

    struct Harness {
        app: StudioApp,
        tables: Arc<InMemoryTables>,
        command_rx: UnboundedReceiver<StudioCommand>,
        event_tx: UnboundedSender<StudioEvent>,
    }

    fn harness(storage: MemoryStorage) -> Harness {
        let vocabularies = TagVocabularies::default();
        let palette = TagPalette::new(TagColorStore::new(
            Box::new(storage),
            vocabularies.colors.clone(),
        ));
        let tables = Arc::new(InMemoryTables::new());
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        let app = StudioApp::new(palette, vocabularies, tables.clone(), command_tx, event_rx);

        Harness {
            app,
            tables,
            command_rx,
            event_tx,
        }
    }

    #[test]
    fn parse_row_ids_accepts_commas_and_spaces() {
        assert_eq!(
            parse_row_ids("3, 1 2,,3").unwrap(),
            BTreeSet::from([1, 2, 3])
        );
        assert!(parse_row_ids("  ").is_err());
        assert!(parse_row_ids("1, x").is_err());
        assert!(parse_row_ids("-4").is_err());
    }

    #[test]
    fn submit_bulk_selects_rows_and_queues_command() {
        let mut h = harness(MemoryStorage::new());
        h.app.select_entity(EntityKind::Vuln);
        h.app.selected_tag = "report:data".to_owned();
        h.app.row_ids_input = "5, 6".to_owned();

        h.app.submit_bulk(TagAction::Set);

        assert_eq!(
            h.tables.selected_row_keys("vuln_list_table"),
            BTreeSet::from([5, 6])
        );
        assert_eq!(
            h.command_rx.try_recv().unwrap(),
            StudioCommand::ApplyBulkTag {
                action: BulkTagAction::new(
                    "vuln_list_table",
                    "report:data",
                    "/backend/storage/vuln/tag_multiid",
                    TagAction::Set,
                ),
                rows: BTreeSet::from([5, 6]),
            }
        );
    }

    #[test]
    fn queued_submits_carry_their_own_rows() {
        let mut h = harness(MemoryStorage::new());
        h.app.selected_tag = "todo".to_owned();

        h.app.row_ids_input = "1".to_owned();
        h.app.submit_bulk(TagAction::Set);
        h.app.row_ids_input = "2".to_owned();
        h.app.submit_bulk(TagAction::Unset);

        let StudioCommand::ApplyBulkTag {
            action: first,
            rows: first_rows,
        } = h.command_rx.try_recv().unwrap()
        else {
            panic!("expected a bulk tag command");
        };
        let StudioCommand::ApplyBulkTag {
            action: second,
            rows: second_rows,
        } = h.command_rx.try_recv().unwrap()
        else {
            panic!("expected a bulk tag command");
        };
        assert_eq!(first.action, TagAction::Set);
        assert_eq!(first_rows, BTreeSet::from([1]));
        assert_eq!(second.action, TagAction::Unset);
        assert_eq!(second_rows, BTreeSet::from([2]));

        let applied = |rows: usize| -> Result<MutationOutcome, String> {
            Ok(MutationOutcome::Applied {
                rows,
                message: None,
            })
        };
        h.app.apply_event(StudioEvent::MutationFinished {
            action: first,
            rows: first_rows,
            result: applied(1),
        });
        assert_eq!(
            h.tables.selected_row_keys("host_list_table"),
            BTreeSet::from([2])
        );

        h.app.apply_event(StudioEvent::MutationFinished {
            action: second,
            rows: second_rows,
            result: applied(1),
        });
        assert!(h.tables.selected_row_keys("host_list_table").is_empty());
    }

    #[tokio::test]
    async fn worker_applies_captured_rows_not_current_selection() {
        let tables = Arc::new(InMemoryTables::new());
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, mut event_rx) = unbounded_channel();
        let service = TagMutationService::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/").unwrap(),
            tables.clone(),
            Arc::new(ChannelNotifier::new(event_tx.clone())),
        );
        spawn_runtime_worker(&Handle::current(), service, command_rx, event_tx);

        let action = BulkTagAction::for_entity(EntityKind::Host, &["todo".to_owned()], TagAction::Set);
        tables.select("host_list_table", [7]);
        command_tx
            .send(StudioCommand::ApplyBulkTag {
                action: action.clone(),
                rows: BTreeSet::new(),
            })
            .unwrap();

        assert!(matches!(
            event_rx.recv().await,
            Some(StudioEvent::MutationStarted { .. })
        ));
        assert_eq!(
            event_rx.recv().await,
            Some(StudioEvent::Notification {
                kind: NotificationKind::Warning,
                message: NO_ITEMS_SELECTED.to_owned(),
            })
        );
        assert_eq!(
            event_rx.recv().await,
            Some(StudioEvent::MutationFinished {
                action,
                rows: BTreeSet::new(),
                result: Ok(MutationOutcome::NothingSelected),
            })
        );

        command_tx.send(StudioCommand::Shutdown).unwrap();
    }

    #[test]
    fn submit_bulk_rejects_bad_row_ids() {
        let mut h = harness(MemoryStorage::new());
        h.app.row_ids_input = "one".to_owned();
        h.app.submit_bulk(TagAction::Unset);

        assert!(h.command_rx.try_recv().is_err());
        assert_eq!(
            h.app.activity.last().map(|entry| entry.kind),
            Some(NotificationKind::Error)
        );
    }

    #[test]
    fn select_entity_keeps_tag_when_still_suggested() {
        let mut h = harness(MemoryStorage::new());
        h.app.selected_tag = "todo".to_owned();
        h.app.select_entity(EntityKind::Vuln);
        assert_eq!(h.app.selected_tag, "todo");

        h.app.selected_tag = "falsepositive".to_owned();
        h.app.select_entity(EntityKind::Host);
        assert_eq!(h.app.selected_tag, "reviewed");
    }

    #[test]
    fn events_update_in_flight_count_and_activity() {
        let mut h = harness(MemoryStorage::new());
        let action = BulkTagAction::new("host_list_table", "todo", "/x", TagAction::Set);
        h.tables.select("host_list_table", [1]);

        h.event_tx
            .send(StudioEvent::MutationStarted {
                action: action.clone(),
            })
            .unwrap();
        h.event_tx
            .send(StudioEvent::Notification {
                kind: NotificationKind::Success,
                message: "Tag set".to_owned(),
            })
            .unwrap();
        h.app.drain_events();
        assert_eq!(h.app.mutations_in_flight, 1);

        h.event_tx
            .send(StudioEvent::MutationFinished {
                action,
                rows: BTreeSet::from([1]),
                result: Ok(MutationOutcome::Applied {
                    rows: 1,
                    message: None,
                }),
            })
            .unwrap();
        h.app.drain_events();

        assert_eq!(h.app.mutations_in_flight, 0);
        assert!(h.tables.selected_row_keys("host_list_table").is_empty());
        assert_eq!(
            h.app.activity.last().map(|entry| entry.text.as_str()),
            Some("Tag set")
        );
    }

    #[test]
    fn disconnected_runtime_is_reported_once() {
        let mut h = harness(MemoryStorage::new());
        drop(h.event_tx);
        h.app.drain_events();
        h.app.drain_events();

        assert!(h.app.runtime_disconnected);
        assert_eq!(h.app.activity.len(), 1);
    }

    #[test]
    fn activity_log_is_bounded() {
        let mut h = harness(MemoryStorage::new());
        for index in 0..(MAX_ACTIVITY_ENTRIES + 5) {
            h.app.record(NotificationKind::Success, format!("entry {index}"));
        }
        assert_eq!(h.app.activity.len(), MAX_ACTIVITY_ENTRIES);
        assert_eq!(h.app.activity[0].text, "entry 5");
    }

    #[test]
    fn editor_follows_interaction_and_change_stores_color() {
        let mut h = harness(MemoryStorage::new());
        h.app.interaction.open("todo", "#ffc107");
        h.app.sync_editor();
        assert_eq!(h.app.editor_hex, "#ffc107");
        assert_eq!(h.app.editor_rgb, [0xff, 0xc1, 0x07]);

        h.app.editor_hex = "#336699".to_owned();
        h.app.change_color();

        assert!(!h.app.interaction.is_open());
        assert_eq!(h.app.palette.color("todo"), "#336699");
    }

    #[test]
    fn invalid_editor_color_keeps_interaction_open() {
        let mut h = harness(MemoryStorage::new());
        h.app.interaction.open("todo", "#ffc107");
        h.app.editor_hex = "yellow".to_owned();
        h.app.change_color();

        assert!(h.app.interaction.is_open());
        assert_eq!(h.app.palette.color("todo"), "#ffc107");
    }

    #[test]
    fn add_and_remove_tag_through_config_pane_actions() {
        let mut h = harness(MemoryStorage::new());
        h.app.new_tag = "  pwned  ".to_owned();
        h.app.add_tag();

        assert!(h.app.new_tag.is_empty());
        assert!(h.app.palette.entries().iter().any(|(tag, _)| tag == "pwned"));

        h.app.remove_tag("pwned");
        assert!(!h.app.palette.entries().iter().any(|(tag, _)| tag == "pwned"));
    }

    #[test]
    fn unavailable_storage_is_announced() {
        let h = harness(MemoryStorage::disabled());
        assert_eq!(
            h.app.activity.first().map(|entry| entry.kind),
            Some(NotificationKind::Warning)
        );
    }
}
