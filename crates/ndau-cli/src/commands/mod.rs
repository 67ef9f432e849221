pub mod keys;
pub mod node;
pub mod tools;
pub mod whitelist;
