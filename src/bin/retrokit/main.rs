//! retrokit CLI
//!
//! Index, inspect and extract the resources of a game's `.pak` packages.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use retrokit::formats::txtr::{DecodeMode, TextureOptions};
use retrokit::{AssetId, ExtractOptions, Game, Resource, ResourceIndex, ResourceLookup, ResourceStore};

#[derive(Parser)]
#[command(name = "retrokit")]
#[command(about = "Extract cooked resources from .pak packages")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages, named resources and every indexed resource
    List {
        /// Game the packages belong to (mp1, mp2, mp3, dkcr, ...)
        #[arg(short, long)]
        game: Game,

        /// Directory holding the .pak files
        dir: PathBuf,

        /// Only show resources of this type (e.g. TXTR)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Write every resource's cooked bytes to a directory
    Extract {
        #[arg(short, long)]
        game: Game,

        dir: PathBuf,

        /// Output directory
        out: PathBuf,

        /// Worker threads (defaults to one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },

    /// Decode a texture and print its mip chain
    Texture {
        #[arg(short, long)]
        game: Game,

        dir: PathBuf,

        /// Resource id in hex
        #[arg(value_parser = parse_id)]
        id: AssetId,

        /// Expand to RGBA8 instead of the native format
        #[arg(long)]
        rgba: bool,

        /// Write the largest mip level to this PNG file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the resources one resource references
    Deps {
        #[arg(short, long)]
        game: Game,

        dir: PathBuf,

        /// Resource id in hex
        #[arg(value_parser = parse_id)]
        id: AssetId,
    },

    /// Decode an animation and print a channel summary
    Anim {
        #[arg(short, long)]
        game: Game,

        dir: PathBuf,

        /// Resource id in hex
        #[arg(value_parser = parse_id)]
        id: AssetId,
    },
}

fn parse_id(s: &str) -> Result<AssetId, String> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map(AssetId)
        .map_err(|e| format!("invalid id '{s}': {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> retrokit::Result<()> {
    match cli.command {
        Commands::List { game, dir, kind } => {
            let index = ResourceIndex::scan_dir(game, &dir)?;
            for package in index.packages() {
                println!("{} ({} named)", package.name, package.named_resources.len());
                for named in &package.named_resources {
                    println!("  {} {} {}", named.id, named.kind, named.name);
                }
            }
            for record in index.records() {
                if kind.as_deref().is_some_and(|k| !k.eq_ignore_ascii_case(&record.kind.to_string())) {
                    continue;
                }
                let pak = record.pak_path.file_name().unwrap_or_default().to_string_lossy();
                let compressed = if record.compressed { " (compressed)" } else { "" };
                println!("{} {} {:>10} {pak}{compressed}", record.id, record.kind, record.size);
            }
            for path in index.skipped() {
                println!("skipped: {}", path.display());
            }
            for path in index.failed() {
                println!("failed: {}", path.display());
            }
        }

        Commands::Extract { game, dir, out, threads } => {
            let store = ResourceStore::new(ResourceIndex::scan_dir(game, &dir)?);
            let report = store.extract(&out, &ExtractOptions { threads }, &AtomicBool::new(false))?;
            println!("{} written, {} failed", report.written, report.failed);
        }

        Commands::Texture { game, dir, id, rgba, output } => {
            let options = TextureOptions {
                mode: if rgba { DecodeMode::Rgba8 } else { DecodeMode::Native },
                ..Default::default()
            };
            let store = ResourceStore::new(ResourceIndex::scan_dir(game, &dir)?).with_texture_options(options);
            let resource = store.load(id)?;
            let Resource::Texture(texture) = &*resource else {
                return Err(retrokit::Error::Parse("resource is not a texture"));
            };
            println!(
                "{id}: {:?} -> {:?}, {}x{}, {} of {} mips{}",
                texture.source_format,
                texture.format,
                texture.width,
                texture.height,
                texture.mips.len(),
                texture.declared_mip_count,
                if texture.truncated { " (truncated)" } else { "" }
            );
            for (i, level) in texture.mips.iter().enumerate() {
                println!("  mip {i}: {}x{}, {} bytes", level.width, level.height, level.data.len());
            }
            if let Some(output) = output {
                texture.save_png(&output)?;
                println!("wrote {}", output.display());
            }
        }

        Commands::Deps { game, dir, id } => {
            let store = ResourceStore::new(ResourceIndex::scan_dir(game, &dir)?);
            let resource = store.load(id)?;
            for dep in resource.dependencies() {
                match store.find_resource(dep) {
                    Some(record) => println!("{dep} {}", record.kind),
                    None => println!("{dep} (not in index)"),
                }
            }
        }

        Commands::Anim { game, dir, id } => {
            let store = ResourceStore::new(ResourceIndex::scan_dir(game, &dir)?);
            let resource = store.load(id)?;
            let Some(anim) = resource.as_animation() else {
                return Err(retrokit::Error::Parse("resource is not an animation"));
            };
            let animated = anim.bones.iter().filter(|b| b.is_animated()).count();
            println!(
                "{id}: {} layout, {:.3}s, {} keys every {:.4}s, {animated} animated bones",
                anim.game, anim.duration, anim.num_keys, anim.tick_interval
            );
            println!(
                "channels: {} rotation, {} translation, {} scale",
                anim.rotation_channels.len(),
                anim.translation_channels.len(),
                anim.scale_channels.len()
            );
            if let Some(evnt) = anim.event_data {
                println!("event data: {evnt}");
            }
        }
    }
    Ok(())
}
