/// NDAU Devnet Genesis Generator
///
/// Generates fresh BIP39 keys for the endowment (RFE), governance (BPC) and
/// node-rules accounts plus any number of purchasers, then writes:
///   <out>/genesis.json  - GenesisConfig consumed by `ndau init`
///   <out>/keys.json     - recovery phrases and public keys
///
/// SECURITY: devnet only. keys.json holds every secret needed to run
/// genesis and must never be used for a public network.
use bip39::{Language, Mnemonic};
use clap::Parser;
use ndau_core::eai::{EaiFeeEntry, EaiFeeTable};
use ndau_core::sysvar::{self, encode};
use ndau_core::{FEE_TABLE_DENOMINATOR, NAPU_PER_NDAU};
use ndau_crypto::{AddressKind, KeyPair};
use ndau_node::genesis::GenesisPurchaser;
use ndau_node::GenesisConfig;
use rand::RngCore;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devnet_generator", about = "Generate an ndau devnet genesis")]
struct Args {
    /// Output directory
    #[arg(short, long, default_value = "genesis/devnet")]
    out: PathBuf,

    #[arg(long, default_value = "ndau-devnet")]
    chain_id: String,

    /// Purchaser accounts to create
    #[arg(short, long, default_value_t = 4)]
    purchasers: usize,

    /// ndau released to each purchaser
    #[arg(long, default_value_t = 10_000)]
    purchase: u64,

    /// ndau released to each of the RFE and BPC accounts
    #[arg(long, default_value_t = 1_000)]
    system_funding: u64,

    /// Post-genesis flat fee in napu
    #[arg(long, default_value_t = 1)]
    fee: i64,

    /// Genesis time, unix seconds (default: now)
    #[arg(long)]
    time: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyRecord {
    role: String,
    address: String,
    public_key: String,
    seed_phrase: String,
}

fn generate_key(role: &str, kind: AddressKind) -> Result<(KeyPair, KeyRecord), Box<dyn std::error::Error>> {
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)?;
    let keypair = ndau_crypto::generate_keypair_from_seed(&mnemonic.to_seed(""))?;
    let record = KeyRecord {
        role: role.to_string(),
        address: keypair.address(kind),
        public_key: hex::encode(&keypair.public_key),
        seed_phrase: mnemonic.to_string(),
    };
    println!("✓ {:<14} {}", role, record.address);
    Ok((keypair, record))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║   NDAU DEVNET GENESIS GENERATOR                            ║");
    println!("║   DEVNET ONLY - keys.json holds every genesis secret       ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");

    let time = args
        .time
        .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64);
    let mut genesis = GenesisConfig::new(&args.chain_id, time);
    genesis.system_funding = args
        .system_funding
        .checked_mul(NAPU_PER_NDAU)
        .ok_or("system funding overflows")?;
    genesis.post_genesis_fee_script = {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(ndau_vm::constant_script(args.fee))
    };

    let mut records = Vec::new();

    // 1. SYSTEM ACCOUNTS
    let (rfe, rec) = generate_key("endowment", AddressKind::Endowment)?;
    let rfe_addr = rec.address.clone();
    records.push(rec);
    let (bpc, rec) = generate_key("governance", AddressKind::Bpc)?;
    let bpc_addr = rec.address.clone();
    records.push(rec);
    let (_, rec) = generate_key("node-rules", AddressKind::Node)?;
    let rules_addr = rec.address.clone();
    records.push(rec);

    genesis.add_account(&rfe_addr, &rfe.public_key);
    genesis.add_account(&bpc_addr, &bpc.public_key);

    // 2. AUTHORITY SYSVARS
    genesis.set_address(sysvar::RELEASE_FROM_ENDOWMENT_ADDRESS, &rfe_addr)?;
    for name in [
        sysvar::SET_SYSVAR_ADDRESS,
        sysvar::NOMINATE_NODE_REWARD_ADDRESS,
        sysvar::COMMAND_VALIDATOR_CHANGE_ADDRESS,
        sysvar::RECORD_PRICE_ADDRESS,
    ] {
        genesis.set_address(name, &bpc_addr)?;
    }
    genesis.set_address(sysvar::NODE_RULES_ACCOUNT_ADDRESS, &rules_addr)?;

    // 3. EAI FEE TABLE: 15 % to the crediting node, 5 % to governance
    let table = EaiFeeTable(vec![
        EaiFeeEntry {
            fee: FEE_TABLE_DENOMINATOR * 15 / 100,
            to: None,
        },
        EaiFeeEntry {
            fee: FEE_TABLE_DENOMINATOR * 5 / 100,
            to: Some(vec![bpc_addr.clone()]),
        },
    ]);
    genesis.set_sysvar(sysvar::EAI_FEE_TABLE, &encode(&table)?);

    // 4. PURCHASERS
    let qty = args
        .purchase
        .checked_mul(NAPU_PER_NDAU)
        .ok_or("purchase overflows")?;
    for i in 1..=args.purchasers {
        let (_, rec) = generate_key(&format!("purchaser-{}", i), AddressKind::User)?;
        genesis.purchasers.push(GenesisPurchaser {
            address: rec.address.clone(),
            qty,
        });
        records.push(rec);
    }

    // sanity: the config must build
    let state = genesis.build_state()?;
    log::info!(
        "genesis state builds: {} accounts, {} sysvars, {} purchasers",
        state.accounts.len(),
        genesis.sysvars.len(),
        genesis.purchasers.len()
    );

    fs::create_dir_all(&args.out)?;
    let genesis_path = args.out.join("genesis.json");
    let keys_path = args.out.join("keys.json");
    genesis.save(&genesis_path)?;
    fs::write(&keys_path, serde_json::to_string_pretty(&records)?)?;

    println!();
    println!("✅ Genesis config saved: {}", genesis_path.display());
    println!("⚠️  Keys saved: {} (devnet only, keep out of version control)", keys_path.display());
    println!("\nNext: ndau --home <dir> init --genesis {}", genesis_path.display());
    Ok(())
}
