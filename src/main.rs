use clap::{Parser, Subcommand};
use codetab::batch::{build_all, BuildOptions, StateBackend, DEFAULT_OUTPUT_DIR};
use codetab::digest::file_digest;
use codetab::encoding::LegacyEncoding;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codetab", about = "Legacy double-byte code table generator")]
struct Cli {
    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Defaults to `build` with default options
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate tables whose recorded digest no longer matches
    Build {
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        out_dir: PathBuf,
        /// Encoding to generate; repeatable (default: all)
        #[arg(short, long = "target")]
        targets: Vec<String>,
        /// Regenerate even if the table is current
        #[arg(short, long)]
        force: bool,
        /// Record the digest in this marker file instead of the manifest
        #[arg(long)]
        marker: Option<PathBuf>,
    },
    /// List supported encodings
    List,
    /// Print the SHA-1 digest of files
    Digest {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    let command = cli.command.unwrap_or(Commands::Build {
        out_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        targets: Vec::new(),
        force:   false,
        marker:  None,
    });

    match command {

        // ── Build ────────────────────────────────────────────────────────────
        Commands::Build { out_dir, targets, force, marker } => {
            let mut opts = BuildOptions { output_dir: out_dir, force, ..Default::default() };
            if !targets.is_empty() {
                opts.targets = targets
                    .iter()
                    .map(|t| LegacyEncoding::from_name(t))
                    .collect::<Result<Vec<_>, _>>()?;
            }
            if let Some(path) = marker {
                opts.state = StateBackend::Marker(path);
            }

            let reports = build_all(&opts)?;
            let failed = reports.iter().filter(|r| !r.is_ok()).count();
            for r in &reports {
                match &r.result {
                    Ok(outcome) => println!("[codetab] {:<12} {outcome}", r.encoding.name()),
                    Err(e)      => eprintln!("[codetab] {:<12} failed: {e}", r.encoding.name()),
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} target(s) failed", reports.len()).into());
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List => {
            for e in LegacyEncoding::ALL {
                println!("{}", e.name());
            }
        }

        // ── Digest ───────────────────────────────────────────────────────────
        Commands::Digest { files } => {
            for path in &files {
                println!("{}  {}", file_digest(path)?, path.display());
            }
        }
    }

    Ok(())
}
