#![forbid(unsafe_code)]
//! Command-line front end over a ledger snapshot file

use clap::{Parser, Subcommand};
use colored::*;
use hashledger::blockchain::Blockchain;
use hashledger::cli::{
    init_tracing, load_blockchain_from_config, resolve_ledger_path, save_blockchain,
};
use hashledger::config::load_config;
use hashledger::miner::{self, CancelToken};
use hashledger::persistence;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Hash-chained proof-of-work ledger", long_about = None)]
struct Cli {
    /// Snapshot file to operate on (defaults to [storage] snapshot_path or ledger.json)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates a new ledger holding only the genesis block
    Init {
        /// Replace an existing snapshot file
        #[arg(long)]
        force: bool,
    },
    /// Queues a transfer in the pending pool
    Send {
        sender: String,
        recipient: String,
        amount: f64,
    },
    /// Mines every pending transaction into a new block
    Mine {
        /// Address credited with the mining reward
        miner_address: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Shows the balance of an address
    Balance { address: String },
    /// Shows a block by index
    Block { index: u64 },
    /// Looks up a mined transaction by id
    Tx { id: String },
    /// Lists pending transactions
    Pending,
    /// Shows chain statistics
    Stats,
    /// Checks hashes and links of the whole chain
    Validate,
    /// Writes the ledger as JSON to a file or stdout
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("warn");
    let cli = Cli::parse();
    let ledger = cli.ledger.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let config = load_config()?;
            let path = resolve_ledger_path(ledger, &config);
            if path.exists() && !force {
                eprintln!(
                    "{} {} already exists (use --force to replace it)",
                    "Error:".bright_red().bold(),
                    path.display()
                );
                std::process::exit(1);
            }
            let chain = Blockchain::from_config(&config)?;
            save_blockchain(&path, &chain)?;
            println!(
                "{} {}",
                "Created new ledger at".bright_green(),
                path.display().to_string().bright_white()
            );
            println!("Genesis: {}", chain.latest_block().hash.bright_yellow());
        }
        Commands::Send {
            sender,
            recipient,
            amount,
        } => {
            if !amount.is_finite() {
                return Err("amount must be a finite number".into());
            }
            let (_config, path, mut chain) = load_blockchain_from_config(ledger)?;
            let id = chain.submit_transaction(sender.as_str(), recipient.as_str(), amount);
            save_blockchain(&path, &chain)?;
            println!("{}", "Transaction added to pending pool".bright_green());
            println!("ID: {}", id.bright_yellow());
        }
        Commands::Mine {
            miner_address,
            timeout,
        } => {
            let (config, path, mut chain) = load_blockchain_from_config(ledger)?;
            let timeout = timeout
                .map(Duration::from_secs)
                .or_else(|| config.miner.mining_timeout());
            let cancel = match timeout {
                Some(limit) => CancelToken::with_timeout(limit),
                None => CancelToken::new(),
            };

            let job = chain.mining_job(&miner_address)?;
            println!(
                "{} block {} ({} transactions, difficulty {})",
                "Mining".bright_cyan().bold(),
                job.index,
                job.transactions.len(),
                job.difficulty
            );

            let (block, stats) =
                miner::mine_cancellable(&job, &cancel, chain.cancel_check_interval())?;
            let block = chain.commit_mined(&job, block)?;
            save_blockchain(&path, &chain)?;

            println!("{}", "Block mined".bright_green().bold());
            println!("  Index:      {}", block.index);
            println!("  Hash:       {}", block.hash.bright_yellow());
            println!("  Previous:   {}", block.previous_hash);
            println!("  Nonce:      {}", block.nonce);
            println!(
                "  Time:       {:.3}s ({:.0} H/s)",
                stats.elapsed.as_secs_f64(),
                stats.hash_rate()
            );
        }
        Commands::Balance { address } => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            println!(
                "{}: {}",
                address.bright_white(),
                chain.balance_of(&address).to_string().bright_green()
            );
        }
        Commands::Block { index } => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            match chain.find_block(index) {
                Some(block) => println!("{}", serde_json::to_string_pretty(block)?),
                None => {
                    eprintln!("{} block {} not found", "Error:".bright_red().bold(), index);
                    std::process::exit(1);
                }
            }
        }
        Commands::Tx { id } => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            match chain.find_transaction(&id) {
                Some(tx) => println!("{}", serde_json::to_string_pretty(tx)?),
                None => {
                    eprintln!("{} transaction {} not found", "Error:".bright_red().bold(), id);
                    std::process::exit(1);
                }
            }
        }
        Commands::Pending => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            let pending = chain.pending_transactions();
            if pending.is_empty() {
                println!("{}", "No pending transactions".yellow());
            }
            for tx in pending {
                println!(
                    "{}  {} -> {}  {}",
                    tx.id.bright_yellow(),
                    tx.sender,
                    tx.recipient,
                    tx.amount
                );
            }
        }
        Commands::Stats => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            let stats = chain.stats();
            println!("{}", "Chain statistics".bright_cyan().bold());
            println!("  Blocks:               {}", stats.total_blocks);
            println!("  Transactions:         {}", stats.total_transactions);
            println!("  Pending transactions: {}", stats.pending_transactions);
            println!("  Difficulty:           {}", stats.difficulty);
            println!("  Mining reward:        {}", stats.mining_reward);
        }
        Commands::Validate => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            match chain.validation_report() {
                Ok(()) => println!("{}", "Chain is valid".bright_green().bold()),
                Err(violation) => {
                    println!("{} {}", "Chain is INVALID:".bright_red().bold(), violation);
                    std::process::exit(1);
                }
            }
        }
        Commands::Export { output } => {
            let (_config, _path, chain) = load_blockchain_from_config(ledger)?;
            match output {
                Some(out) => {
                    persistence::save_snapshot(&out, &chain.export())?;
                    println!("Exported {} blocks to {}", chain.len(), out.display());
                }
                None => println!("{}", chain.export_json()?),
            }
        }
    }

    Ok(())
}
