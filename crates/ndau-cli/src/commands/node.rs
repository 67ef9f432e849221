use crate::{print_success, AccountCommands, BlockCommands, SysvarCommands};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ndau_node::{GenesisConfig, LocalChain, NdauApp, NodeConfig, QueryService};
use std::path::Path;

fn open_query(home: &Path) -> Result<QueryService, Box<dyn std::error::Error>> {
    let config = NodeConfig::load_home(home)?;
    log::debug!("opening node db at {}", config.db_path().display());
    let app = NdauApp::open(config)?;
    if !app.is_initialized()? {
        return Err(format!("{} has no chain; run `ndau init` first", home.display()).into());
    }
    Ok(app.query())
}

pub fn init(home: &Path, genesis_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let genesis = GenesisConfig::load(genesis_path)?;
    let mut config = NodeConfig::load_home(home)?;
    config.chain_id = genesis.chain_id.clone();
    config.genesis_path = Some(genesis_path.to_path_buf());
    config.save_to_file(&config.config_path())?;

    let chain = LocalChain::init(config, &genesis)?;
    let summary = chain.app().query().summary();
    print_success(&format!(
        "{} initialized at height {} with {} accounts",
        genesis.chain_id, summary.height, summary.num_accounts
    ));
    Ok(())
}

pub fn sysvar(action: SysvarCommands, home: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let q = open_query(home)?;
    match action {
        SysvarCommands::Get { name } => println!("{}", B64.encode(q.sysvar(&name))),
        SysvarCommands::History { name } => {
            println!("{}", serde_json::to_string_pretty(&q.sysvar_history(&name))?)
        }
    }
    Ok(())
}

pub fn account(action: AccountCommands, home: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let q = open_query(home)?;
    match action {
        AccountCommands::Query { address } => {
            println!("{}", serde_json::to_string_pretty(&q.account(&address)?)?)
        }
    }
    Ok(())
}

pub fn block(action: BlockCommands, home: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let q = open_query(home)?;
    let block = match action {
        BlockCommands::Current => q.block_current()?,
        BlockCommands::Height { height } => q.block_at(height)?,
    };
    match block {
        Some(b) => println!("{}", serde_json::to_string_pretty(&b)?),
        None => return Err("no such block".into()),
    }
    Ok(())
}
