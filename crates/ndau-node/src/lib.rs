// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU NODE
//
// Drives the ndau-core state machine block by block: mempool admission,
// block application, sled persistence of every committed height, snapshot
// reads for queries, a single-validator devnet chain and the genesis
// bootstrap.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod app;
pub mod chain;
pub mod config;
pub mod db;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod query;
pub mod snapshot;

pub use app::NdauApp;
pub use chain::{LocalChain, ProducedBlock};
pub use config::NodeConfig;
pub use db::{BlockRecord, NodeDb, TxRecord};
pub use error::NodeError;
pub use genesis::{perform_genesis, GenesisConfig, GenesisOutcome};
pub use mempool::Mempool;
pub use query::{AccountHistory, AccountResponse, QueryService};
pub use snapshot::SnapshotReader;
