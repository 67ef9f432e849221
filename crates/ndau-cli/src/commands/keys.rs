use crate::print_info;
use bip39::{Language, Mnemonic};
use ndau_crypto::AddressKind;
use rand::RngCore;

pub fn parse_kind(kind: &str) -> Result<AddressKind, String> {
    match kind {
        "user" | "a" => Ok(AddressKind::User),
        "node" | "n" => Ok(AddressKind::Node),
        "endowment" | "e" => Ok(AddressKind::Endowment),
        "exchange" | "x" => Ok(AddressKind::Exchange),
        "bpc" | "b" => Ok(AddressKind::Bpc),
        "market-maker" | "m" => Ok(AddressKind::MarketMaker),
        other => Err(format!("unknown address kind {:?}", other)),
    }
}

pub fn keygen(kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kind = parse_kind(kind)?;
    let mut entropy = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)?;
    let keypair = ndau_crypto::generate_keypair_from_seed(&mnemonic.to_seed(""))?;

    print_info("Store the recovery phrase offline; it is the only backup.");
    println!("phrase:     {}", mnemonic);
    println!("public key: {}", hex::encode(&keypair.public_key));
    println!("address:    {}", keypair.address(kind));
    Ok(())
}

pub fn address(pubkey: &str, kind: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kind = parse_kind(kind)?;
    let bytes = hex::decode(pubkey)?;
    if !ndau_crypto::is_valid_public_key(&bytes) {
        return Err(format!("{} is not an ed25519 public key", pubkey).into());
    }
    println!("{}", ndau_crypto::public_key_to_address(&bytes, kind));
    Ok(())
}
