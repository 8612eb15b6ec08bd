// Command-line front end for the sync engine.
//
// Subcommands map one-to-one onto the file-level API: `sign`, `diff`,
// `apply`, plus `info` for inspecting artifact headers. Reconstruction
// over an actual network transport is a host-application concern (it owns
// the range-fetch client), so no `sync` subcommand is offered here.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use crate::error::{Result, SyncError};
use crate::format::SyncHeader;
use crate::io::{apply_file, diff_file, sign_file};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Block-based binary delta sync.
#[derive(Parser, Debug)]
#[command(
    name = "blocksync",
    version,
    about = "Block-based binary delta sync",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write the block-checksum signature of a file.
    Sign {
        /// File to sign (the "new" side of a future sync).
        new_file: PathBuf,
        /// Signature output path.
        signature: PathBuf,
    },
    /// Build a self-contained patch turning an old file into a new file.
    Diff {
        /// Old file (the base the receiver already has).
        old_file: PathBuf,
        /// New file (the target to reconstruct).
        new_file: PathBuf,
        /// Patch output path.
        patch: PathBuf,
    },
    /// Apply a patch to an old file, reconstructing the new file.
    Apply {
        /// Old file the patch was built against.
        old_file: PathBuf,
        /// Patch input path.
        patch: PathBuf,
        /// Reconstructed output path.
        output: PathBuf,
    },
    /// Print the header of a signature or patch file.
    Info {
        /// Signature or patch file.
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run the CLI: parse arguments, dispatch, report, set the exit code.
pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = dispatch(&cli) {
        eprintln!("blocksync: {e}");
        process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Cmd::Sign {
            new_file,
            signature,
        } => {
            let stats = sign_file(new_file, signature)?;
            if cli.json_output {
                let json = serde_json::json!({
                    "command": "sign",
                    "file_size": stats.file_size,
                    "block_size": stats.block_size,
                    "block_count": stats.block_count,
                    "signature_size": stats.signature_size,
                });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
            } else if !cli.quiet {
                println!(
                    "{}: {} bytes in {} blocks of {} -> {} ({} bytes)",
                    new_file.display(),
                    stats.file_size,
                    stats.block_count,
                    stats.block_size,
                    signature.display(),
                    stats.signature_size
                );
            }
        }
        Cmd::Diff {
            old_file,
            new_file,
            patch,
        } => {
            let stats = diff_file(old_file, new_file, patch)?;
            if cli.json_output {
                let json = serde_json::json!({
                    "command": "diff",
                    "old_size": stats.old_size,
                    "new_size": stats.new_size,
                    "patch_size": stats.patch_size,
                    "records": stats.patch.record_count,
                    "matched_blocks": stats.patch.matched_blocks,
                    "literal_bytes": stats.patch.literal_bytes,
                });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
            } else if !cli.quiet {
                println!(
                    "{} -> {}: {} records, {} literal bytes, patch {} bytes",
                    old_file.display(),
                    new_file.display(),
                    stats.patch.record_count,
                    stats.patch.literal_bytes,
                    stats.patch_size
                );
            }
        }
        Cmd::Apply {
            old_file,
            patch,
            output,
        } => {
            let stats = apply_file(old_file, patch, output)?;
            if cli.json_output {
                let json = serde_json::json!({
                    "command": "apply",
                    "local_bytes": stats.local_bytes,
                    "literal_bytes": stats.literal_bytes,
                    "output_size": stats.output_len,
                });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
            } else if !cli.quiet {
                println!(
                    "{}: {} bytes ({} from old file, {} from patch)",
                    output.display(),
                    stats.output_len,
                    stats.local_bytes,
                    stats.literal_bytes
                );
            }
        }
        Cmd::Info { file } => {
            let header = read_header(file)?;
            if cli.json_output {
                let json = serde_json::json!({
                    "command": "info",
                    "file_hash": hex(&header.file_hash),
                    "file_length": header.file_length,
                    "block_size": header.block_size,
                    "block_count": header.block_count,
                });
                eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
            } else {
                println!("file hash:   {}", hex(&header.file_hash));
                println!("file length: {}", header.file_length);
                println!("block size:  {}", header.block_size);
                println!("block count: {}", header.block_count);
            }
        }
    }
    Ok(())
}

fn read_header(path: &Path) -> Result<SyncHeader> {
    let file =
        File::open(path).map_err(|e| SyncError::io(format!("opening {}", path.display()), e))?;
    SyncHeader::decode(&mut BufReader::new(file))
}

fn hex(bytes: &[u8; 16]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
