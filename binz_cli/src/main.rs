use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};

use binz_codecs::codec_by_name;
use binz_core::{CompressOutcome, Container, ContainerOptions, MountedVfs, MODFS_SCHEME};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "binz",
    about = "Compress, probe, and unpack BINZ asset containers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory served under modfs:// URIs
    #[arg(long, global = true)]
    mount: Option<PathBuf>,

    /// Largest modfs:// resource accepted, in bytes
    #[arg(long, global = true, default_value_t = u32::MAX as u64)]
    max_resource_len: u64,

    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress asset files in place
    ///
    /// Files that would not get smaller are left untouched.
    Compress {
        /// Files to compress
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Codec to use: zlib
        #[arg(short, long, default_value = "zlib")]
        codec: String,
        /// Compression level (0–9)
        #[arg(short, long, default_value_t = 9)]
        level: u32,
    },
    /// Load an asset (wrapped or raw) and write its payload out
    Decompress {
        /// Source file, or a modfs:// uri when --mount is set
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Report whether each file carries the container header
    Probe {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print header metadata and sizes
    Inspect {
        /// File or modfs:// uri to inspect
        file: PathBuf,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_container(cli: &Cli, codec: &str, level: u32) -> anyhow::Result<Container> {
    let codec = codec_by_name(codec, level)?;
    let options = ContainerOptions::default().max_resource_len(cli.max_resource_len);
    let mut container = Container::new(codec).with_options(options);
    if let Some(root) = &cli.mount {
        anyhow::ensure!(root.is_dir(), "mount root {:?} is not a directory", root);
        log::debug!("serving {MODFS_SCHEME} from {}", root.display());
        container = container.with_vfs(Box::new(MountedVfs::new(root)));
    }
    Ok(container)
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn ratio(raw: u64, stored: u64) -> f64 {
    if stored == 0 {
        return 1.0;
    }
    raw as f64 / stored as f64
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(container: &Container, paths: &[PathBuf]) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let mut failed = 0usize;
    let (mut total_raw, mut total_stored) = (0u64, 0u64);

    for path in paths {
        match container.compress(path) {
            Ok(outcome) => {
                total_raw += outcome.uncompressed_len();
                total_stored += outcome.stored_len();
                match outcome {
                    CompressOutcome::Written { uncompressed_len, .. } => eprintln!(
                        "  written  {:?}: {} -> {} ({:.2}x)",
                        path,
                        human_bytes(uncompressed_len),
                        human_bytes(outcome.stored_len()),
                        ratio(uncompressed_len, outcome.stored_len())
                    ),
                    CompressOutcome::Skipped {
                        uncompressed_len,
                        compressed_len,
                    } => eprintln!(
                        "  skipped  {:?}: {} would grow to {}",
                        path,
                        human_bytes(uncompressed_len),
                        human_bytes(compressed_len + binz_core::HEADER_SIZE as u64)
                    ),
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  failed   {:?}: {}", path, e);
            }
        }
    }

    eprintln!("  files       : {} ({} failed)", paths.len(), failed);
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!("  on disk     : {}", human_bytes(total_stored));
    eprintln!("  ratio       : {:.2}x", ratio(total_raw, total_stored));
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());

    if failed > 0 {
        anyhow::bail!("{} of {} files could not be compressed", failed, paths.len());
    }
    Ok(())
}

fn run_decompress(container: &Container, input: &Path, output: &Path) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let payload = container
        .decompress(input)
        .with_context(|| format!("loading {:?}", input))?;
    let wrapped = payload.was_wrapped();
    let bytes = payload.into_bytes();

    if output.to_str() == Some("-") {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(&bytes)?;
        lock.flush()?;
    } else {
        let mut dst =
            File::create(output).with_context(|| format!("creating output file {:?}", output))?;
        dst.write_all(&bytes)
            .with_context(|| format!("writing output file {:?}", output))?;
    }

    eprintln!("  source      : {}", if wrapped { "container" } else { "raw" });
    eprintln!("  payload     : {}", human_bytes(bytes.len() as u64));
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_probe(container: &Container, paths: &[PathBuf]) {
    for path in paths {
        let state = if container.is_compressed(path) {
            "wrapped"
        } else {
            "raw"
        };
        println!("{state}\t{}", path.display());
    }
}

fn run_inspect(container: &Container, file: &Path) -> anyhow::Result<()> {
    let info = container
        .inspect(file)
        .with_context(|| format!("inspecting {:?}", file))?;

    println!("=== BINZ file: {:?} ===", file);
    println!();
    println!("  backend        : {}", container.backend_for(file).name());
    println!("  on disk        : {}", human_bytes(info.stored_len));
    match info.header {
        Some(header) => {
            println!("  wrapped        : yes");
            println!("  payload size   : {}", human_bytes(header.uncompressed_size));
            println!(
                "  ratio          : {:.2}x",
                ratio(header.uncompressed_size, info.stored_len)
            );
        }
        None => println!("  wrapped        : no"),
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose, cli.quiet)),
    )
    .init();

    match &cli.command {
        Commands::Compress {
            paths,
            codec,
            level,
        } => {
            let container = build_container(&cli, codec, *level)?;
            run_compress(&container, paths)
        }
        Commands::Decompress { input, output } => {
            let container = build_container(&cli, "zlib", 9)?;
            run_decompress(&container, input, output)
        }
        Commands::Probe { paths } => {
            let container = build_container(&cli, "zlib", 9)?;
            run_probe(&container, paths);
            Ok(())
        }
        Commands::Inspect { file } => {
            let container = build_container(&cli, "zlib", 9)?;
            run_inspect(&container, file)
        }
    }
}
