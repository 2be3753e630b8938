//! seatbind command-line tool
//!
//! Usage:
//!   seatbind keygen --out seatbind-keys.json
//!   seatbind collect
//!   seatbind attest --keys seatbind-keys.json [--identifiers device.json]
//!   seatbind verify --keys seatbind-keys.json --commitment <hex> --proof <blob>
//!   seatbind simulate --keys seatbind-keys.json --devices 4
//!
//! Raw identifiers are only ever printed as a list of missing fields; the
//! attestation output carries the public commitment and proof.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use seatbind_circuit::{commitment_of, encode};
use seatbind_cli::{KeyFile, attest_identifiers, simulate, verify_identifiers};
use seatbind_device::RawIdentifierSet;
use seatbind_ledger::LedgerConfig;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "seatbind")]
#[command(about = "Device binding proofs and ledger settlement")]
struct Args {
    /// Ledger config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate prover and settlement keys
    Keygen {
        #[arg(short, long, default_value = "seatbind-keys.json")]
        out: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
    /// Collect this host's identifiers and report which are usable
    Collect,
    /// Attest this host (or an identifier file) and print the proof
    Attest {
        #[arg(short, long, default_value = "seatbind-keys.json")]
        keys: PathBuf,

        /// Identifier set as JSON instead of collecting from the host
        #[arg(long)]
        identifiers: Option<PathBuf>,
    },
    /// Check an attestation proof blob against a commitment
    Verify {
        #[arg(short, long, default_value = "seatbind-keys.json")]
        keys: PathBuf,

        #[arg(long)]
        commitment: String,

        #[arg(long)]
        proof: String,
    },
    /// Run register, rotate and replay against a ledger
    Simulate {
        #[arg(short, long, default_value = "seatbind-keys.json")]
        keys: PathBuf,

        #[arg(short, long, default_value = "4")]
        devices: u8,

        /// Concurrent proving workers
        #[arg(short, long, default_value = "4")]
        workers: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Keygen { out, force } => {
            if out.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", out.display());
            }
            KeyFile::generate().save(&out)?;
            info!("Wrote keys to {:?}", out);
        }
        Command::Collect => {
            let raw = RawIdentifierSet::collect();
            let missing = raw.missing_fields();
            if missing.is_empty() {
                println!("All identifiers present");
            } else {
                for field in &missing {
                    println!("missing: {field}");
                }
            }
            match encode(&raw) {
                Ok(ids) => println!("commitment: {}", commitment_of(&ids)),
                Err(e) => println!("not attestable: {e}"),
            }
        }
        Command::Attest { keys, identifiers } => {
            let keys = KeyFile::load(&keys)?;
            let raw = match identifiers {
                Some(path) => RawIdentifierSet::from_json_file(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => RawIdentifierSet::collect(),
            };
            let attestation = attest_identifiers(&keys, &raw)?;
            println!("{}", serde_json::to_string_pretty(&attestation)?);
        }
        Command::Verify { keys, commitment, proof } => {
            let keys = KeyFile::load(&keys)?;
            if verify_identifiers(&keys, &commitment, &proof)? {
                println!("valid");
            } else {
                bail!("attestation does not verify");
            }
        }
        Command::Simulate { keys, devices, workers } => {
            let keys = KeyFile::load_or_generate(&keys)?;
            let config = match &args.config {
                Some(path) => LedgerConfig::from_json_file(path)?,
                None => LedgerConfig::default(),
            };
            let report = simulate(config, &keys, devices, workers).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
