use crate::{print_info, print_success, WhitelistCommands};
use ndau_chaos::Whitelist;
use ndau_node::NodeConfig;
use std::path::{Path, PathBuf};

/// `--file` if given, otherwise the whitelist named by the node config.
pub fn resolve_path(file: Option<PathBuf>, home: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match file {
        Some(f) => Ok(f),
        None => Ok(NodeConfig::load_home(home)?.whitelist_path),
    }
}

pub fn handle(
    action: WhitelistCommands,
    file: Option<PathBuf>,
    home: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = resolve_path(file, home)?;
    let mut whitelist = Whitelist::open(&path)?;

    match action {
        WhitelistCommands::Path => println!("{}", whitelist.path().display()),
        WhitelistCommands::Add { key, value } => {
            if whitelist.add(key.as_bytes(), value.as_bytes())? {
                print_success(&format!("Successfully whitelisted {} = {}", key, value));
            } else {
                print_info(&format!("{} = {} was already whitelisted", key, value));
            }
        }
        WhitelistCommands::Remove { key, value } => {
            if whitelist.remove(key.as_bytes(), value.as_bytes())? {
                print_success(&format!("Removed {} = {} from the whitelist", key, value));
            } else {
                print_info(&format!("{} = {} was not whitelisted", key, value));
            }
        }
        // plain output for scripts
        WhitelistCommands::Check { key, value } => {
            println!("{}", whitelist.check(key.as_bytes(), value.as_bytes()));
        }
        WhitelistCommands::List { verbose } => {
            for entry in whitelist.list() {
                let key = String::from_utf8_lossy(&entry.key);
                if verbose {
                    println!("{}: {}", key, String::from_utf8_lossy(&entry.value));
                } else {
                    println!("{}", key);
                }
            }
        }
    }
    Ok(())
}
