use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, ensure};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use sner_tags::config::TagSettings;
use sner_tags::mutation::{
    BulkTagAction, InMemoryTables, MutationOutcome, RowKey, TagAction, TagMutationService,
    TracingNotifier,
};
use sner_tags::studio::run_studio;
use sner_tags::tags::ColorMap;
use sner_tags::tags::palette::TagPalette;
use sner_tags::tags::storage::FileStorage;
use sner_tags::tags::store::TagColorStore;
use sner_tags::tags::vocabulary::EntityKind;

#[derive(Debug, Parser)]
#[command(name = "sner_tags", about = "Tag colors and bulk tagging for sner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List stored tag colors.
    Colors,
    /// Print the badge colors of the given tags, allocating unseen ones.
    Show {
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Store a color (`#rrggbb` or `#rgb`) for a tag or a `prefix:`.
    SetColor { tag: String, color: String },
    /// Forget the stored color of a tag.
    Remove { tag: String },
    /// Drop all stored colors and reseed the defaults.
    Reset,
    /// Print suggested tags, for one entity or all of them.
    Vocab { entity: Option<EntityKind> },
    /// Set or unset tags on rows of an entity list.
    Tag {
        entity: EntityKind,
        #[arg(required = true)]
        tags: Vec<String>,
        /// Comma separated row ids.
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<RowKey>,
        #[arg(long)]
        unset: bool,
        /// Override the entity's tag endpoint.
        #[arg(long)]
        url: Option<String>,
    },
    /// Open the tag studio window.
    Studio,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = TagSettings::from_env().context("failed to load configuration")?;
    let _log_guard = init_tracing(&settings)?;

    match cli.command {
        Commands::Colors => {
            let colors = open_store(&settings)?.all()?;
            print_colors(&colors);
        }
        Commands::Show { tags } => {
            let vocabularies = settings.load_vocabularies()?;
            let mut palette = TagPalette::file_backed(&settings.storage_path, vocabularies.colors);
            for tag in tags {
                let badge = palette.badge(&tag);
                println!("{}\t{}\t{}", badge.label, badge.background, badge.foreground);
            }
        }
        Commands::SetColor { tag, color } => {
            let stored = open_store(&settings)?.set(&tag, &color)?;
            println!("{tag}\t{stored}");
        }
        Commands::Remove { tag } => {
            ensure!(
                open_store(&settings)?.remove(&tag)?,
                "no stored color for `{tag}`"
            );
        }
        Commands::Reset => {
            let mut store = open_store(&settings)?;
            store.clear()?;
            store.initialize()?;
            print_colors(&store.all()?);
        }
        Commands::Vocab { entity } => {
            let vocabularies = settings.load_vocabularies()?;
            match entity {
                Some(kind) => println!("{}", vocabularies.for_entity(kind).join(" ")),
                None => {
                    for kind in EntityKind::ALL {
                        println!("{kind}\t{}", vocabularies.for_entity(kind).join(" "));
                    }
                    println!("annotate\t{}", vocabularies.annotate().join(" "));
                }
            }
        }
        Commands::Tag {
            entity,
            tags,
            ids,
            unset,
            url,
        } => {
            let action = if unset { TagAction::Unset } else { TagAction::Set };
            let mut bulk = BulkTagAction::for_entity(entity, &tags, action);
            if let Some(url) = url {
                bulk.url = url;
            }
            run_bulk_tag(&settings, bulk, ids.into_iter().collect()).await?;
        }
        Commands::Studio => run_studio(&settings)?,
    }

    Ok(())
}

fn open_store(settings: &TagSettings) -> Result<TagColorStore> {
    let vocabularies = settings.load_vocabularies()?;
    let mut store = TagColorStore::new(
        Box::new(FileStorage::new(&settings.storage_path)),
        vocabularies.colors,
    );
    store
        .initialize()
        .with_context(|| format!("failed to open {}", settings.storage_path.display()))?;
    Ok(store)
}

fn print_colors(colors: &ColorMap) {
    for (tag, color) in colors {
        println!("{tag}\t{color}");
    }
}

async fn run_bulk_tag(
    settings: &TagSettings,
    action: BulkTagAction,
    rows: BTreeSet<RowKey>,
) -> Result<()> {
    let tables = Arc::new(InMemoryTables::new());
    tables.select(&action.table_id, rows);

    let service = TagMutationService::from_settings(
        settings,
        tables.clone(),
        Arc::new(TracingNotifier),
    )?;
    match service.apply(&action).await? {
        MutationOutcome::Applied { rows, message } => {
            info!(
                rows,
                redraws = tables.redraw_count(&action.table_id),
                "bulk tag finished"
            );
            println!(
                "{}: {rows} row(s)",
                message.as_deref().unwrap_or(action.action.as_str())
            );
            Ok(())
        }
        MutationOutcome::NothingSelected => Err(anyhow!("no rows selected")),
    }
}

fn init_tracing(settings: &TagSettings) -> Result<Option<WorkerGuard>> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sner_tags=debug"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(stderr_filter);

    let (file_layer, guard) = match &settings.log_dir {
        Some(dir) => {
            let file_filter = EnvFilter::try_new(&settings.file_log_level)
                .with_context(|| format!("invalid SNER_TAGS_FILE_LOG `{}`", settings.file_log_level))?;
            let appender = tracing_appender::rolling::daily(dir, "sner_tags.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(file_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(guard)
}
