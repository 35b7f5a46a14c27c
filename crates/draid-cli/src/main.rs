//! Inspection and diagnostic binary for the dRAID engine: geometry
//! derivation, permutation-table lookup, and distributed-spare path
//! parsing/formatting.
//!
//! Grounded on the CLI-over-engine-crates pattern (a thin `clap`-derive
//! binary with one subcommand per diagnostic query, printing structured
//! output rather than driving any actual I/O).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use draid_core::{Config, PermMap};
use draid_error::DraidResult;
use draid_types::{Ashift, DistributedSparePath};

#[derive(Parser)]
#[command(name = "draid-cli", author, version, about = "Inspect dRAID geometry and permutation maps")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Derive and print the full geometry for a set of top-level parameters.
    Geometry {
        /// Total member devices, including spares.
        children: u16,
        /// Parity columns per group (1..=3).
        nparity: u8,
        /// Reserved distributed-spare slots.
        nspares: u16,
        /// Data columns per group.
        ndata: u16,
        /// Permutation repeats per device slice.
        #[arg(default_value_t = 1)]
        ngroups: u64,
        /// `log2` of the sector size, e.g. 12 for 4 KiB.
        #[arg(long, default_value_t = 12)]
        ashift: u8,
    },
    /// Look up the built-in permutation-map table entry for a child count.
    PermTable {
        /// Total member devices.
        children: u16,
        /// Print this permutation row (0-indexed) in addition to the summary.
        #[arg(long)]
        row: Option<u64>,
    },
    /// Derive and print geometry from a TOML snippet instead of flags, for
    /// repeatable diagnostic scripts.
    GeometryFile {
        /// Path to a TOML file with `children`, `nparity`, `nspares`,
        /// `ndata`, and optionally `ngroups`/`ashift` keys.
        path: PathBuf,
    },
    /// Parse a distributed-spare path string into its fields.
    ParseSparePath {
        /// e.g. `draid2-0-1`.
        path: String,
    },
    /// Format a distributed-spare path from its fields.
    FormatSparePath {
        nparity: u8,
        vdev_id: u64,
        spare_id: u16,
    },
}

#[derive(Serialize)]
struct GeometryReport {
    children: u16,
    nparity: u8,
    nspares: u16,
    ndata: u16,
    ngroups: u64,
    ashift: u8,
    groupwidth: u16,
    ndisks: u16,
    groupsz: u64,
    devslicesz: u64,
}

/// A small TOML geometry snippet for [`Command::GeometryFile`], grounded
/// in the teacher CLI's "config file plus flag overrides" pattern:
/// `ngroups`/`ashift` default the same way their flag counterparts do.
#[derive(Deserialize)]
struct GeometryFile {
    children: u16,
    nparity: u8,
    nspares: u16,
    ndata: u16,
    #[serde(default = "default_ngroups")]
    ngroups: u64,
    #[serde(default = "default_ashift")]
    ashift: u8,
}

const fn default_ngroups() -> u64 {
    1
}

const fn default_ashift() -> u8 {
    12
}

#[derive(Serialize)]
struct PermTableReport {
    children: u16,
    nperms: u16,
    seed: String,
    checksum: String,
    row: Option<Vec<u16>>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::try_init().ok();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> DraidResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Geometry { children, nparity, nspares, ndata, ngroups, ashift } => {
            tracing::debug!(children, nparity, nspares, ndata, ngroups, ashift, "deriving geometry");
            let cfg = Config::configure(children, nparity, nspares, ndata, ngroups, Ashift(ashift))?;
            let report = GeometryReport {
                children: cfg.children(),
                nparity: cfg.nparity(),
                nspares: cfg.nspares(),
                ndata: cfg.ndata(),
                ngroups: cfg.ngroups(),
                ashift: cfg.ashift().0,
                groupwidth: cfg.groupwidth(),
                ndisks: cfg.ndisks(),
                groupsz: cfg.groupsz(),
                devslicesz: cfg.devslicesz(),
            };
            print_json(&report);
        }
        Command::PermTable { children, row } => {
            let map = PermMap::from_table(children)?;
            let report = PermTableReport {
                children: map.children(),
                nperms: map.nperms(),
                seed: format!("{:#x}", map.seed()),
                checksum: format!("{:#x}", map.checksum()),
                row: row.map(|r| map.row(r)),
            };
            print_json(&report);
        }
        Command::GeometryFile { path } => {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| draid_error::DraidError::einval(format!("reading {}: {e}", path.display())))?;
            let file: GeometryFile = toml::from_str(&text)
                .map_err(|e| draid_error::DraidError::einval(format!("parsing {}: {e}", path.display())))?;
            tracing::debug!(path = %path.display(), "deriving geometry from file");
            let cfg = Config::configure(file.children, file.nparity, file.nspares, file.ndata, file.ngroups, Ashift(file.ashift))?;
            let report = GeometryReport {
                children: cfg.children(),
                nparity: cfg.nparity(),
                nspares: cfg.nspares(),
                ndata: cfg.ndata(),
                ngroups: cfg.ngroups(),
                ashift: cfg.ashift().0,
                groupwidth: cfg.groupwidth(),
                ndisks: cfg.ndisks(),
                groupsz: cfg.groupsz(),
                devslicesz: cfg.devslicesz(),
            };
            print_json(&report);
        }
        Command::ParseSparePath { path } => {
            let parsed: DistributedSparePath =
                path.parse().map_err(|e| draid_error::DraidError::einval(e))?;
            println!("nparity={} vdev_id={} spare_id={}", parsed.nparity, parsed.vdev_id, parsed.spare_id);
        }
        Command::FormatSparePath { nparity, vdev_id, spare_id } => {
            println!("{}", DistributedSparePath { nparity, vdev_id, spare_id });
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to format output: {e}"),
    }
}
