mod capacity;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use sprite_atlas::{AtlasConfig, AtlasSystem, DEFAULT_CAPACITY_BYTES, ImageSheetLoader};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::capacity::{format_bytes, parse_capacity};

#[derive(Parser)]
#[command(author, version, about = "Inspect and warm kyx sprite atlases")]
struct Cli {
    /// Directory containing the `Atlas` folder.
    #[arg(long, short = 'w', global = true, default_value = ".")]
    working_dir: PathBuf,
    /// Sheet budget, in bytes or with a KiB/MiB/GiB suffix.
    #[arg(long, short = 'c', global = true, value_parser = parse_capacity, default_value_t = DEFAULT_CAPACITY_BYTES)]
    capacity: u64,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the manifest version, sprite table and sheet table.
    Inspect,
    /// Load every sheet used by the named sprites and report cache state.
    Warm {
        #[arg(required = true)]
        sprites: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AtlasConfig::new(&cli.working_dir)
        .with_capacity(cli.capacity)
        .with_debug(cli.debug);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut atlas = AtlasSystem::new(ImageSheetLoader);
    atlas
        .init(&config)
        .with_context(|| format!("initialize atlas under {}", config.working_dir.display()))?;

    let outcome = match cli.command {
        Command::Inspect => inspect(&atlas),
        Command::Warm { sprites } => warm(&atlas, &sprites),
    };
    atlas.shutdown();
    outcome
}

fn inspect(atlas: &AtlasSystem<ImageSheetLoader>) -> Result<()> {
    let version = atlas.version().context("atlas is not running")?;
    println!("atlas version {version}");

    println!("sprites ({}):", atlas.sprites().len());
    for (position, sprite) in atlas.sprites().iter().enumerate() {
        println!(
            "  {position:>4}  {:<32} {:>5}x{:<5} {} fragment(s)",
            sprite.name(),
            sprite.width(),
            sprite.height(),
            sprite.fragments().len()
        );
    }

    println!("sheets ({}):", atlas.sheet_count());
    for raw in 0..atlas.sheet_count() as u32 {
        let Some(sheet) = atlas.sheet(raw.into()) else {
            continue;
        };
        println!(
            "  {:>4}  {:>12}  {}",
            sheet.index,
            format_bytes(sheet.byte_size),
            sheet.locator.display()
        );
    }
    Ok(())
}

fn warm(atlas: &AtlasSystem<ImageSheetLoader>, names: &[String]) -> Result<()> {
    for name in names {
        let Some(sprite) = atlas.sprite(name) else {
            bail!("unknown sprite {name:?}");
        };
        debug!(sprite = %name, sheets = sprite.sheets().len(), "allocating sprite");
        atlas
            .allocate(sprite)
            .with_context(|| format!("allocate sprite {name:?}"))?;
    }
    let snapshot = atlas.flush().context("wait for sheet cache")?;
    if let Some(violation) = snapshot.violation {
        bail!("sheet cache is inconsistent: {violation}");
    }

    println!(
        "resident {} of {}",
        format_bytes(snapshot.resident_bytes),
        format_bytes(snapshot.capacity)
    );
    for index in &snapshot.recency {
        let size = atlas
            .sheet(*index)
            .map(|sheet| format_bytes(sheet.byte_size))
            .unwrap_or_default();
        println!("  sheet {index:>4}  {size}");
    }

    if let Some(stats) = atlas.stats() {
        println!(
            "touches {}  loads {}  evictions {}  load failures {}  over budget {}  utilization {:.1}%",
            stats.touches,
            stats.loads,
            stats.evictions,
            stats.load_failures,
            stats.capacity_rejections,
            stats.utilization() * 100.0
        );
    }
    Ok(())
}
