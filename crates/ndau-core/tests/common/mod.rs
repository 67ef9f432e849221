// Shared ledger harness for the ndau-core test suites: a State with the
// endowment and governance accounts claimed and funded, one block per
// transaction and a block clock advancing 60 s per block.

#![allow(dead_code)]

use ndau_core::sysvar::{self, encode};
use ndau_core::{State, SignedTx, Timestamp, Transaction, TxError, TxReceipt, NAPU_PER_NDAU};
use ndau_crypto::{generate_keypair_from_seed, AddressKind, KeyPair};
use ndau_core::tx::Signer;

pub const BLOCK_SECS: u64 = 60;
pub const GENESIS_TIME: Timestamp = 1_600_000_000;
pub const SYSTEM_FUNDING_NDAU: u64 = 1_000;

pub fn seed_key(tag: &str) -> KeyPair {
    let mut seed = [0x5au8; 32];
    for (i, b) in tag.bytes().enumerate() {
        seed[i % 32] ^= b.wrapping_add(i as u8);
    }
    generate_keypair_from_seed(&seed).unwrap()
}

pub struct Ledger {
    pub state: State,
    pub now: Timestamp,
    pub rfe: KeyPair,
    pub rfe_addr: String,
    pub bpc: KeyPair,
    pub bpc_addr: String,
    pub rules_addr: String,
}

impl Ledger {
    pub fn new() -> Self {
        let rfe = seed_key("rfe");
        let bpc = seed_key("bpc");
        let rfe_addr = rfe.address(AddressKind::Endowment);
        let bpc_addr = bpc.address(AddressKind::Bpc);
        let rules_addr = seed_key("rules").address(AddressKind::Node);

        let mut state = State::new();
        state.block_time = GENESIS_TIME;
        state
            .insert_genesis_account(&rfe_addr, &[rfe.public_key.clone()])
            .unwrap();
        state
            .insert_genesis_account(&bpc_addr, &[bpc.public_key.clone()])
            .unwrap();
        let authorities = [
            (sysvar::RELEASE_FROM_ENDOWMENT_ADDRESS, &rfe_addr),
            (sysvar::SET_SYSVAR_ADDRESS, &bpc_addr),
            (sysvar::NOMINATE_NODE_REWARD_ADDRESS, &bpc_addr),
            (sysvar::COMMAND_VALIDATOR_CHANGE_ADDRESS, &bpc_addr),
            (sysvar::RECORD_PRICE_ADDRESS, &bpc_addr),
            (sysvar::NODE_RULES_ACCOUNT_ADDRESS, &rules_addr),
        ];
        for (name, addr) in authorities {
            state.sysvars.set(name, encode(addr).unwrap(), 0).unwrap();
        }
        let mut ledger = Ledger {
            state,
            now: GENESIS_TIME,
            rfe,
            rfe_addr,
            bpc,
            bpc_addr,
            rules_addr,
        };
        // system accounts pay their own fees once a fee script is set
        for addr in [ledger.rfe_addr.clone(), ledger.bpc_addr.clone()] {
            ledger.rfe(&addr, SYSTEM_FUNDING_NDAU * NAPU_PER_NDAU);
        }
        ledger
    }

    pub fn signer_of(&self, tx: &Transaction) -> String {
        match tx.signer() {
            Signer::Account(a) => a,
            Signer::Ownership { target, .. } => target,
            Signer::System(name) => self.state.sysvars.address(name).unwrap().unwrap(),
        }
    }

    pub fn next_sequence(&self, addr: &str) -> u64 {
        self.state.account(addr).map_or(0, |a| a.sequence) + 1
    }

    pub fn sign(&self, tx: Transaction, keys: &[&KeyPair]) -> SignedTx {
        let seq = self.next_sequence(&self.signer_of(&tx));
        SignedTx::sign(tx, seq, keys).unwrap()
    }

    /// Deliver `tx` alone in a new block.
    pub fn submit(&mut self, tx: Transaction, keys: &[&KeyPair]) -> Result<TxReceipt, TxError> {
        let stx = self.sign(tx, keys);
        self.next_block();
        self.state.apply(&stx)
    }

    pub fn next_block(&mut self) {
        self.now += BLOCK_SECS;
        self.state.begin_block(self.now);
    }

    pub fn advance(&mut self, secs: u64) {
        self.now += secs;
    }

    pub fn balance(&self, addr: &str) -> u64 {
        self.state.account(addr).map_or(0, |a| a.balance)
    }

    pub fn rfe(&mut self, dest: &str, napu: u64) {
        let tx = Transaction::ReleaseFromEndowment {
            destination: dest.to_string(),
            qty: napu,
        };
        let rfe = seed_key("rfe");
        self.submit(tx, &[&rfe]).unwrap();
    }

    pub fn claim(&mut self, kp: &KeyPair, addr: &str) -> Result<TxReceipt, TxError> {
        let tx = Transaction::SetValidation {
            target: addr.to_string(),
            ownership: kp.public_key.clone(),
            validation_keys: vec![kp.public_key.clone()],
            validation_script: None,
        };
        self.submit(tx, &[kp])
    }

    /// A claimed user account holding `ndau` (before the claim fee).
    pub fn funded(&mut self, tag: &str, ndau: u64) -> (KeyPair, String) {
        self.funded_kind(tag, ndau, AddressKind::User)
    }

    pub fn funded_kind(&mut self, tag: &str, ndau: u64, kind: AddressKind) -> (KeyPair, String) {
        let kp = seed_key(tag);
        let addr = kp.address(kind);
        if ndau > 0 {
            self.rfe(&addr, ndau * NAPU_PER_NDAU);
        }
        self.claim(&kp, &addr).unwrap();
        (kp, addr)
    }

    pub fn set_sysvar(&mut self, name: &str, value: Vec<u8>) -> Result<TxReceipt, TxError> {
        let bpc = seed_key("bpc");
        self.submit(
            Transaction::SetSysvar {
                name: name.to_string(),
                value,
            },
            &[&bpc],
        )
    }

    pub fn set_fee(&mut self, napu: i64) {
        self.set_sysvar(
            sysvar::TRANSACTION_FEE_SCRIPT,
            ndau_vm::constant_script(napu),
        )
        .unwrap();
    }
}
