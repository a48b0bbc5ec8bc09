mod client;

pub use client::{ChainClient, ChainError, RawLog, RetryPolicy, RpcChainClient};
