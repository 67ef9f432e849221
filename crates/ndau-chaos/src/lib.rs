//! Chaos side chain: every identity owns the namespace named by its base64
//! public key, plus a `sysvar` namespace reachable only through whitelisted
//! state change proposals.

pub mod app;
pub mod error;
pub mod store;
pub mod tx;
pub mod whitelist;

pub use app::ChaosApp;
pub use error::ChaosError;
pub use store::{ChaosStore, SYSVAR_NAMESPACE};
pub use tx::{ChaosTx, SignedChaosTx};
pub use whitelist::{Whitelist, WhitelistEntry};
