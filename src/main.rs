use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};

use maskmix::codec::{Export, Upload};
use maskmix::config::{Config, SessionScript};
use maskmix::session::{EditingSession, Level, LoadSlot};
use maskmix::stroke::ClientRect;
use maskmix::surface::Point;

#[derive(Parser)]
#[command(
    name = "maskmix",
    version,
    about = "Paint a mask over an image and composite a replacement into it"
)]
struct Cli {
    /// Path to session file
    #[arg(short, long, default_value = "session.toml")]
    config: PathBuf,

    /// Print the final session status as JSON
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;

    // Initialize logging with level from config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.settings.log_level)),
        )
        .init();

    tracing::info!(
        "maskmix v{} starting with {} stroke{}",
        env!("CARGO_PKG_VERSION"),
        config.session.stroke.len(),
        if config.session.stroke.len() == 1 { "" } else { "s" }
    );

    let mut session = EditingSession::with_brush(config.session_options(), config.brush_settings());
    let result = run(&mut session, &config.session).await;

    print_notifications(&mut session);
    if cli.status {
        println!("{}", session.status().to_json()?);
    }
    result
}

async fn run(session: &mut EditingSession, script: &SessionScript) -> anyhow::Result<()> {
    let base_ticket = session.begin_load(LoadSlot::Base);
    let replacement_ticket = script
        .replacement
        .as_ref()
        .map(|_| session.begin_load(LoadSlot::Replacement));

    // Read both uploads concurrently; pixels are only touched once both arrive
    let (base, replacement) = tokio::join!(
        Upload::from_path(&script.base),
        read_optional(script.replacement.as_deref())
    );
    let base = base.with_context(|| format!("Failed to read {}", script.base.display()))?;
    let replacement = replacement.context("Failed to read replacement image")?;

    session.complete_base_load(base_ticket, &base)?;
    if let (Some(ticket), Some(upload)) = (replacement_ticket, replacement) {
        session.complete_replacement_load(ticket, &upload)?;
    }

    let defaults = *session.brush();
    let rect = ClientRect::unscaled(session.layers().canvas_size());
    for stroke in &script.stroke {
        let brush = stroke.brush(&defaults);
        session.set_tool(brush.tool);
        session.set_brush_size(brush.size());
        session.set_brush_color(brush.color);

        let mut points = stroke.points.iter().map(|[x, y]| Point::new(*x, *y));
        if let Some(first) = points.next() {
            session.pointer_down(first, &rect)?;
            for p in points {
                session.pointer_move(p, &rect);
            }
            session.pointer_up();
        }
    }

    if script.apply {
        session.apply_mask()?;
    }

    tokio::fs::create_dir_all(&script.output)
        .await
        .with_context(|| format!("Failed to create {}", script.output.display()))?;

    let export = session.export()?;
    write_export(&script.output, &export).await?;
    if script.export_mask {
        write_export(&script.output, &session.export_mask()?).await?;
    }
    Ok(())
}

async fn read_optional(path: Option<&Path>) -> std::io::Result<Option<Upload>> {
    match path {
        Some(p) => Upload::from_path(p).await.map(Some),
        None => Ok(None),
    }
}

async fn write_export(dir: &Path, export: &Export) -> anyhow::Result<()> {
    let path = dir.join(&export.filename);
    tokio::fs::write(&path, &export.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_notifications(session: &mut EditingSession) {
    for note in session.drain_notifications() {
        let marker = match note.level {
            Level::Success => "\x1b[32m+\x1b[0m",
            Level::Error => "\x1b[31m!\x1b[0m",
        };
        println!("  {} {}: {}", marker, note.title, note.message);
    }
}
