// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! `trustctl` - inspect and maintain memorized certificate chains.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use composite_trust::chain::ChainHash;
use composite_trust::config::StoreConfig;
use composite_trust::logging::{init_tracing, LogFormat};
use composite_trust::storage::MemorizedCertificateStore;
use composite_trust::TrustError;

/// trustctl - memorized certificate chain maintenance
#[derive(Parser, Debug)]
#[command(name = "trustctl")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List approved chains in the configured namespace
    List,

    /// Forget one approved chain
    Forget {
        /// Chain hash (64 hex characters)
        hash: ChainHash,
    },

    /// Remove every approval in the configured namespace
    Clear {
        /// Clear every namespace in the database
        #[arg(long)]
        all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(LogFormat::from_env());

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("trustctl: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), TrustError> {
    let config = StoreConfig::from_env()?;
    let database = config.open_database()?;
    let store = MemorizedCertificateStore::open(database, &config.namespace, config.secret.clone())
        .map_err(|e| TrustError::Configuration(e.to_string()))?;
    let store = match config.max_age {
        Some(max_age) => store.with_max_age(max_age),
        None => store,
    };

    match command {
        Commands::List => {
            for entry in store.entries().map_err(TrustError::StoreRead)? {
                let leaf_len = entry.chain.leaf().map_or(0, |leaf| leaf.as_ref().len());
                println!(
                    "{}  {}  {} cert(s), leaf {} bytes",
                    entry.hash,
                    entry.approved_at.to_rfc3339(),
                    entry.chain.len(),
                    leaf_len
                );
            }
        }
        Commands::Forget { hash } => {
            store.forget_hash(&hash).map_err(TrustError::StoreWrite)?;
            println!("forgot {hash}");
        }
        Commands::Clear { all } => {
            store.clear(all).map_err(TrustError::StoreWrite)?;
            if all {
                println!("cleared all namespaces");
            } else {
                println!("cleared namespace {}", config.namespace);
            }
        }
    }
    Ok(())
}
