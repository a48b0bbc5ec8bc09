mod config;

pub use config::{
    ContractKind, ContractSettings, IndexerSettings, PostgresSettings, Settings,
};
