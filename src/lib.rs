pub mod abis;
pub mod chain;
pub mod config;
pub mod db;
pub mod utils;
pub mod worker;

pub use chain::{ChainClient, RpcChainClient};
pub use config::Settings;
pub use db::Database;
pub use worker::{ContractManager, ContractPipeline, HealthRegistry};
