///
/// This module implements the command line interface for deckwright: argument
/// parsing, session loading/saving and the mapping of each wizard step onto a
/// subcommand.
///
/// All business logic (generation, editing state, export) lives in the
/// [`deckwright-core`] crate; this module is glue.
///
/// ## How To Use
/// - Command line: `deckwright --help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// Every command reads the session file, applies its change and writes it back,
/// so a sequence of invocations behaves like one editing session.
///
/// [`deckwright-core`]: ../../deckwright-core/
use crate::load_config::{load_config, CliConfig};
use crate::service::{HttpCompletionClient, HttpRenderService};
use crate::session::{load_session, save_session, DEFAULT_SESSION_FILE};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deckwright_core::export::Exporter;
use deckwright_core::generate::DeckGenerator;
use deckwright_core::ingest::UploadedFile;
use deckwright_core::regenerate::Regenerator;
use deckwright_core::store::DeckStore;
use deckwright_core::template::{builtin_templates, find_template};
use deckwright_core::workflow::{
    generate_into_store, regenerate_all_bullets, BulletEdit, InFlightTracker, NewBulletEdit,
    TitleEdit,
};
use std::path::PathBuf;

/// CLI for deckwright: turn documents into an editable, exportable slide deck.
#[derive(Parser)]
#[clap(
    name = "deckwright",
    version,
    about = "Generate, edit, version and export slide decks from source documents"
)]
pub struct Cli {
    /// Path to the YAML config file; defaults apply when omitted
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Session file holding the current deck and its versions
    #[clap(long, global = true, default_value = DEFAULT_SESSION_FILE)]
    pub session: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the available templates
    Templates,
    /// Generate a new deck from source files
    Generate {
        /// Files to ingest (PDF, Word, Excel, images, text)
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// Template id (see `templates`)
        #[clap(long)]
        template: Option<String>,
    },
    /// Print the current deck
    Show,
    /// Rewrite a title or bullet of a slide, or draft a new bullet
    Regenerate {
        /// Slide number, starting at 1
        #[clap(long)]
        slide: usize,
        /// Bullet number, starting at 1; rewrites the title when omitted
        #[clap(long, conflicts_with_all = ["all_bullets", "new_bullet"])]
        bullet: Option<usize>,
        /// Rewrite every bullet of the slide
        #[clap(long, conflicts_with = "new_bullet")]
        all_bullets: bool,
        /// Append a newly drafted bullet
        #[clap(long)]
        new_bullet: bool,
    },
    /// Save the current deck as a new version
    Snapshot,
    /// List saved versions, newest first
    Versions,
    /// Make a saved version the current deck
    Restore { version_id: String },
    /// Compare the current deck with a saved version
    Compare {
        version_id: Option<String>,
        /// Clear the compare selection
        #[clap(long, conflicts_with = "version_id")]
        clear: bool,
    },
    /// Export the current deck into the output directory
    Export {
        /// Overrides `export.output_dir` from the config
        #[clap(long)]
        output_dir: Option<PathBuf>,
        /// Sets the confidentiality flag before exporting
        #[clap(long)]
        internal_use_only: Option<bool>,
    },
    /// Delete all session data
    Reset,
}

fn load_cli_config(path: Option<&PathBuf>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(CliConfig::from_env()),
    }
}

fn slide_index(store: &DeckStore, number: usize) -> Result<usize> {
    let count = store
        .deck()
        .map(|d| d.slides.len())
        .context("No deck in session; run `generate` first")?;
    if number == 0 || number > count {
        anyhow::bail!("Slide {number} does not exist; the deck has {count} slides");
    }
    Ok(number - 1)
}

fn print_deck(store: &DeckStore) {
    let Some(deck) = store.deck() else {
        println!("No deck in session");
        return;
    };
    println!("{} ({} slides)", deck.title, deck.slides.len());
    for (i, slide) in deck.slides.iter().enumerate() {
        println!();
        println!("{:>2}. {}  [confidence {}%]", i + 1, slide.title, slide.confidence);
        if let Some(subtitle) = &slide.subtitle {
            println!("    {subtitle}");
        }
        for (j, bullet) in slide.bullets.iter().enumerate() {
            println!("    {}. {}", j + 1, bullet);
        }
        if let Some(image) = &slide.image_ref {
            println!("    [image: {image}, {:?}]", slide.image_position);
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let session_path = cli.session;
    match cli.command {
        Commands::Templates => {
            let config = load_cli_config(cli.config.as_ref())?;
            let layouts = config.layout_map()?;
            for t in builtin_templates() {
                let export = if layouts.contains(&t.id) {
                    "template export"
                } else {
                    "local export"
                };
                println!(
                    "{:<20} {:<24} {:<22} {:>3} slides  ({export})",
                    t.id, t.name, t.category, t.slides
                );
            }
            Ok(())
        }
        Commands::Generate { files, template } => {
            let config = load_cli_config(cli.config.as_ref())?;
            let template = match template {
                Some(id) => Some(
                    find_template(&id)
                        .with_context(|| format!("Unknown template '{id}'; see `templates`"))?,
                ),
                None => None,
            };
            let client = HttpCompletionClient::new(
                &config.services.completion_url,
                config.require_api_key()?,
                config.pipeline.generation.timeout(),
            )?;
            let generator = DeckGenerator::new(
                client,
                config.layout_map()?,
                config.pipeline.generation.clone(),
            );

            let mut store = load_session(&session_path)?;
            store.clear_files();
            for file in files {
                store.add_file(UploadedFile::from_path(file));
            }
            if let Some(t) = &template {
                store.set_template_theme(t.id.clone());
            }
            store.set_template(template);

            tracing::info!(command = "generate", files = store.uploaded_files().len(), "Starting generation");
            generate_into_store(&mut store, &generator, |percent, message| {
                println!("[{percent:>3}%] {message}");
            })
            .await
            .map_err(|e| {
                tracing::error!(command = "generate", error = %e, "Generation failed");
                anyhow::anyhow!("Generation failed: {e}")
            })?;
            store.set_current_slide_index(0);
            save_session(&session_path, &store)?;
            print_deck(&store);
            Ok(())
        }
        Commands::Show => {
            let store = load_session(&session_path)?;
            print_deck(&store);
            Ok(())
        }
        Commands::Regenerate {
            slide,
            bullet,
            all_bullets,
            new_bullet,
        } => {
            let config = load_cli_config(cli.config.as_ref())?;
            let mut store = load_session(&session_path)?;
            let index = slide_index(&store, slide)?;
            if bullet == Some(0) {
                anyhow::bail!("Bullet 0 does not exist; bullets are numbered from 1");
            }
            let client = HttpCompletionClient::new(
                &config.services.completion_url,
                config.require_api_key()?,
                config.pipeline.regeneration.timeout(),
            )?;
            let regenerator = Regenerator::new(client, config.pipeline.regeneration.clone());
            let tracker = InFlightTracker::new();

            if all_bullets {
                let written =
                    regenerate_all_bullets(&mut store, &tracker, &regenerator, index).await?;
                println!("Rewrote {written} bullets on slide {slide}");
            } else if new_bullet {
                let edit = NewBulletEdit::prepare(&store, index)?;
                let text = edit.run(&regenerator).await;
                edit.apply(&mut store, text.clone());
                println!("Added: {text}");
            } else if let Some(number) = bullet {
                let edit = BulletEdit::prepare(&store, &tracker, index, number - 1)?;
                let text = edit.run(&regenerator).await;
                edit.apply(&mut store, text.clone());
                println!("Bullet {number}: {text}");
            } else {
                let edit = TitleEdit::prepare(&store, &tracker, index)?;
                let text = edit.run(&regenerator).await;
                edit.apply(&mut store, text.clone());
                println!("Title: {text}");
            }
            store.set_current_slide_index(index);
            save_session(&session_path, &store)
        }
        Commands::Snapshot => {
            let mut store = load_session(&session_path)?;
            let version = store
                .save_snapshot()
                .context("No deck in session; run `generate` first")?;
            println!("Saved {} ({})", version.name, version.id);
            save_session(&session_path, &store)
        }
        Commands::Versions => {
            let store = load_session(&session_path)?;
            if store.versions().is_empty() {
                println!("No versions saved");
            }
            for v in store.versions() {
                let marker = if store.compare_version_id() == Some(v.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}  {}", v.id, v.timestamp, v.name);
            }
            Ok(())
        }
        Commands::Restore { version_id } => {
            let mut store = load_session(&session_path)?;
            if !store.restore_version(&version_id) {
                anyhow::bail!("Unknown version '{version_id}'");
            }
            println!("Restored {version_id}");
            save_session(&session_path, &store)
        }
        Commands::Compare { version_id, clear } => {
            let mut store = load_session(&session_path)?;
            if clear || version_id.is_some() {
                store.set_compare_version(version_id);
                save_session(&session_path, &store)?;
            }
            let Some(version) = store.compare_version() else {
                println!("No version selected for comparison");
                return Ok(());
            };
            println!("Comparing with {} ({})", version.name, version.id);
            let current = store.deck().map(|d| d.slides.len()).unwrap_or(0);
            for i in 0..current.max(version.deck.slides.len()) {
                let now = store.slide(i).map(|s| s.title.as_str()).unwrap_or("-");
                let then = store.compare_slide(i).map(|s| s.title.as_str()).unwrap_or("-");
                let mark = if now == then { " " } else { "~" };
                println!("{mark} {:>2}. {now}  |  {then}", i + 1);
            }
            Ok(())
        }
        Commands::Export {
            output_dir,
            internal_use_only,
        } => {
            let config = load_cli_config(cli.config.as_ref())?;
            let mut store = load_session(&session_path)?;
            if let Some(flag) = internal_use_only {
                store.set_internal_use_only(flag);
                save_session(&session_path, &store)?;
            }
            let renderer = HttpRenderService::new(
                &config.services.render_url,
                config.pipeline.export.timeout(),
            )?;
            let exporter = Exporter::new(
                renderer,
                config.layout_map()?,
                config.pipeline.export.clone(),
            );
            let file = exporter.export_store(&store).await.map_err(|e| {
                tracing::error!(command = "export", error = %e, "Export failed");
                anyhow::anyhow!("Export failed: {e}")
            })?;
            let dir = output_dir.unwrap_or_else(|| config.pipeline.export.output_dir.clone());
            let path = file
                .save_to(&dir)
                .with_context(|| format!("Failed to write export into {dir:?}"))?;
            if let Some(reason) = &file.fallback_reason {
                println!("Template export unavailable ({reason}); wrote local PDF");
            }
            println!("Exported {}", path.display());
            Ok(())
        }
        Commands::Reset => {
            let mut store = load_session(&session_path)?;
            store.reset();
            save_session(&session_path, &store)?;
            println!("Session cleared");
            Ok(())
        }
    }
}
