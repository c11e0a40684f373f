//! wand_caster: interactive entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use wand_caster::app::{build_registry, run, Launch};
use wand_caster::config::CasterConfig;
use wand_caster::AppError;

#[derive(Parser, Debug)]
#[command(name = "wand_caster", version, about = "Trace spells with your fingertip")]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Spell id to start on
    #[arg(short, long)]
    spell: Option<String>,

    /// Start in teaching mode
    #[arg(short, long)]
    teach: bool,

    /// Seed the particle RNG (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Print the curriculum and exit
    #[arg(long)]
    list: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    if let Err(e) = try_main(args) {
        error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn try_main(args: Args) -> Result<(), AppError> {
    let mut cfg = match &args.config {
        Some(path) => CasterConfig::load(path)?,
        None       => CasterConfig::default(),
    };
    if let Some(seed) = args.seed { cfg.burst.seed = Some(seed); }

    let registry = build_registry(&cfg)?;

    if args.list {
        for (i, id) in cfg.curriculum_ids(&registry)?.iter().enumerate() {
            if let Some(p) = registry.lookup(id) {
                println!("  {}. {:<20} {:<14} {}", i + 1, p.name, p.incantation, p.description);
            }
        }
        return Ok(());
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Wand Caster - gesture spell trainer             ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    #[cfg(feature = "leap")]
    println!("  Input: LeapMotion hardware (mouse still works)");
    #[cfg(not(feature = "leap"))]
    println!("  Input: mouse simulation  (use --features leap for hardware)");
    println!();

    run(&cfg, registry, Launch { initial_spell: args.spell, teach: args.teach })
}
