// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU CLI - Node operator & developer command line
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ndau")]
#[command(about = "ndau CLI - SCP whitelist, node queries and key tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Node home directory (reads NDAU_HOME, defaults to ~/.ndau)
    #[arg(long, env = "NDAU_HOME", global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the node-local SCP whitelist
    Whitelist {
        /// Whitelist file (defaults to the node config's whitelist_path)
        #[arg(long, env = "NDAU_WHITELIST")]
        file: Option<PathBuf>,

        #[command(subcommand)]
        action: WhitelistCommands,
    },

    /// Generate a keypair with a BIP39 recovery phrase
    Keygen {
        /// Address kind: user, node, endowment, exchange, bpc, market-maker
        #[arg(short, long, default_value = "user")]
        kind: String,
    },

    /// Derive the address of a hex public key
    Address {
        pubkey: String,

        #[arg(short, long, default_value = "user")]
        kind: String,
    },

    /// Transaction hash of base64 signable bytes
    TxHash { signable: String },

    /// EAI rate for an age and optional lock (default rate tables)
    EaiRate {
        /// Weighted average age, e.g. 3m or 1y1m5d
        #[arg(long)]
        age: String,

        /// Lock notice period
        #[arg(long)]
        lock: Option<String>,
    },

    /// Chaincode tools
    Script {
        #[command(subcommand)]
        action: ScriptCommands,
    },

    /// Create the node home and commit genesis height 0
    Init {
        /// Genesis JSON
        #[arg(short, long)]
        genesis: PathBuf,
    },

    /// Read sysvars from the node home
    Sysvar {
        #[command(subcommand)]
        action: SysvarCommands,
    },

    /// Read accounts from the node home
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },

    /// Read blocks from the node home
    Block {
        #[command(subcommand)]
        action: BlockCommands,
    },
}

#[derive(Subcommand)]
enum WhitelistCommands {
    /// Print the whitelist file location
    Path,

    /// Allow an SCP writing VALUE to KEY
    Add {
        key: String,

        #[arg(short, long)]
        value: String,
    },

    /// Withdraw an allowance
    Remove {
        key: String,

        #[arg(short, long)]
        value: String,
    },

    /// Print true if the pair is whitelisted, else false
    Check {
        key: String,

        #[arg(short, long)]
        value: String,
    },

    /// List whitelisted keys
    List {
        /// Show values too
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum ScriptCommands {
    /// Disassemble a base64 script
    Disassemble { script: String },
}

#[derive(Subcommand)]
enum SysvarCommands {
    /// Current value as base64 (empty if unset)
    Get { name: String },

    /// Every value the sysvar has held, oldest first
    History { name: String },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Account data as JSON
    Query { address: String },
}

#[derive(Subcommand)]
enum BlockCommands {
    /// Latest committed block
    Current,

    /// Block at a height
    Height { height: u64 },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let home = cli.home.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ndau")
    });

    match cli.command {
        Commands::Whitelist { file, action } => commands::whitelist::handle(action, file, &home)?,
        Commands::Keygen { kind } => commands::keys::keygen(&kind)?,
        Commands::Address { pubkey, kind } => commands::keys::address(&pubkey, &kind)?,
        Commands::TxHash { signable } => commands::tools::tx_hash(&signable)?,
        Commands::EaiRate { age, lock } => commands::tools::eai_rate(&age, lock.as_deref())?,
        Commands::Script { action } => match action {
            ScriptCommands::Disassemble { script } => commands::tools::disassemble(&script)?,
        },
        Commands::Init { genesis } => commands::node::init(&home, &genesis)?,
        Commands::Sysvar { action } => commands::node::sysvar(action, &home)?,
        Commands::Account { action } => commands::node::account(action, &home)?,
        Commands::Block { action } => commands::node::block(action, &home)?,
    }
    Ok(())
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────
