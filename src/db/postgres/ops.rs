//! PostgreSQL operations for the event collections and checkpoints.
//!
//! All event inserts go through `ON CONFLICT (tx_hash, log_index) DO
//! NOTHING` on each collection's unique index: a redelivered log is a silent
//! no-op, never an error. A pipeline window's events are written inside one
//! transaction, so the window is either durable in full before the
//! checkpoint advances, or not at all.

use anyhow::Context;
use async_trait::async_trait;
use log::error;
use tokio_postgres::{Row, Transaction};

use crate::db::models::{
    Checkpoint, DomainEvent, LiquidityEvent, LiquidityKind, NftMintEvent, PriceUpdateEvent,
    SwapDirection, SwapEvent, TransferEvent,
};
use crate::db::postgres::PostgresClient;
use crate::db::store::{CheckpointStore, EventStore, StoreError};

/// Rows per multi-row INSERT. Each event row binds 10 parameters and
/// PostgreSQL caps bind parameters at 65535.
const INSERT_BATCH_SIZE: usize = 500;

const EVENT_COLS: usize = 10;

type SqlParam<'a> = &'a (dyn tokio_postgres::types::ToSql + Sync);

fn values_clauses(rows: usize) -> String {
    (0..rows)
        .map(|i| {
            let start = i * EVENT_COLS + 1;
            let placeholders: Vec<String> =
                (start..start + EVENT_COLS).map(|n| format!("${n}")).collect();
            format!("({})", placeholders.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_u256(value: &str) -> anyhow::Result<alloy::primitives::U256> {
    value
        .parse()
        .with_context(|| format!("invalid stored U256: {value}"))
}

async fn execute_batch_insert(
    tx: &Transaction<'_>,
    query: &str,
    params: &[SqlParam<'_>],
    rows: usize,
) -> anyhow::Result<u64> {
    tx.execute(query, params).await.map_err(|e| {
        error!("Failed to batch insert {rows} event rows: {e:?}");
        anyhow::Error::new(e)
    })
}

async fn insert_swaps(tx: &Transaction<'_>, events: &[&SwapEvent]) -> anyhow::Result<u64> {
    struct Params {
        log_index: i32,
        block_number: i64,
        block_timestamp: i64,
        direction: &'static str,
        eth_amount: String,
        token_amount: String,
        event_timestamp: i64,
    }

    let mut inserted = 0u64;

    for chunk in events.chunks(INSERT_BATCH_SIZE) {
        let query = format!(
            "INSERT INTO indexer.swaps (contract_address, tx_hash, log_index, block_number, \
             block_timestamp, trader, direction, eth_amount, token_amount, event_timestamp) \
             VALUES {} ON CONFLICT (tx_hash, log_index) DO NOTHING",
            values_clauses(chunk.len())
        );

        let owned: Vec<Params> = chunk
            .iter()
            .map(|e| Params {
                log_index: e.log_index as i32,
                block_number: e.block_number as i64,
                block_timestamp: e.block_timestamp as i64,
                direction: e.direction.as_str(),
                eth_amount: e.eth_amount.to_string(),
                token_amount: e.token_amount.to_string(),
                event_timestamp: e.timestamp as i64,
            })
            .collect();

        let mut params: Vec<SqlParam> = Vec::with_capacity(chunk.len() * EVENT_COLS);
        for (e, p) in chunk.iter().zip(&owned) {
            params.push(&e.contract_address);
            params.push(&e.tx_hash);
            params.push(&p.log_index);
            params.push(&p.block_number);
            params.push(&p.block_timestamp);
            params.push(&e.trader);
            params.push(&p.direction);
            params.push(&p.eth_amount);
            params.push(&p.token_amount);
            params.push(&p.event_timestamp);
        }

        inserted += execute_batch_insert(tx, &query, &params, chunk.len()).await?;
    }

    Ok(inserted)
}

async fn insert_liquidity(tx: &Transaction<'_>, events: &[&LiquidityEvent]) -> anyhow::Result<u64> {
    struct Params {
        log_index: i32,
        block_number: i64,
        block_timestamp: i64,
        kind: &'static str,
        token_amount: String,
        eth_amount: String,
        liquidity_tokens: String,
    }

    let mut inserted = 0u64;

    for chunk in events.chunks(INSERT_BATCH_SIZE) {
        let query = format!(
            "INSERT INTO indexer.liquidity (contract_address, tx_hash, log_index, block_number, \
             block_timestamp, provider, kind, token_amount, eth_amount, liquidity_tokens) \
             VALUES {} ON CONFLICT (tx_hash, log_index) DO NOTHING",
            values_clauses(chunk.len())
        );

        let owned: Vec<Params> = chunk
            .iter()
            .map(|e| Params {
                log_index: e.log_index as i32,
                block_number: e.block_number as i64,
                block_timestamp: e.block_timestamp as i64,
                kind: e.kind.as_str(),
                token_amount: e.token_amount.to_string(),
                eth_amount: e.eth_amount.to_string(),
                liquidity_tokens: e.liquidity_tokens.to_string(),
            })
            .collect();

        let mut params: Vec<SqlParam> = Vec::with_capacity(chunk.len() * EVENT_COLS);
        for (e, p) in chunk.iter().zip(&owned) {
            params.push(&e.contract_address);
            params.push(&e.tx_hash);
            params.push(&p.log_index);
            params.push(&p.block_number);
            params.push(&p.block_timestamp);
            params.push(&e.provider);
            params.push(&p.kind);
            params.push(&p.token_amount);
            params.push(&p.eth_amount);
            params.push(&p.liquidity_tokens);
        }

        inserted += execute_batch_insert(tx, &query, &params, chunk.len()).await?;
    }

    Ok(inserted)
}

async fn insert_transfers(tx: &Transaction<'_>, events: &[&TransferEvent]) -> anyhow::Result<u64> {
    struct Params {
        log_index: i32,
        block_number: i64,
        block_timestamp: i64,
        value: String,
    }

    let mut inserted = 0u64;

    for chunk in events.chunks(INSERT_BATCH_SIZE) {
        let query = format!(
            "INSERT INTO indexer.transfers (contract_address, tx_hash, log_index, block_number, \
             block_timestamp, from_address, to_address, value, minted, burned) \
             VALUES {} ON CONFLICT (tx_hash, log_index) DO NOTHING",
            values_clauses(chunk.len())
        );

        let owned: Vec<Params> = chunk
            .iter()
            .map(|e| Params {
                log_index: e.log_index as i32,
                block_number: e.block_number as i64,
                block_timestamp: e.block_timestamp as i64,
                value: e.value.to_string(),
            })
            .collect();

        let mut params: Vec<SqlParam> = Vec::with_capacity(chunk.len() * EVENT_COLS);
        for (e, p) in chunk.iter().zip(&owned) {
            params.push(&e.contract_address);
            params.push(&e.tx_hash);
            params.push(&p.log_index);
            params.push(&p.block_number);
            params.push(&p.block_timestamp);
            params.push(&e.from);
            params.push(&e.to);
            params.push(&p.value);
            params.push(&e.minted);
            params.push(&e.burned);
        }

        inserted += execute_batch_insert(tx, &query, &params, chunk.len()).await?;
    }

    Ok(inserted)
}

async fn insert_nft_mints(tx: &Transaction<'_>, events: &[&NftMintEvent]) -> anyhow::Result<u64> {
    struct Params {
        log_index: i32,
        block_number: i64,
        block_timestamp: i64,
        token_id: String,
        valuation: String,
        event_timestamp: i64,
    }

    let mut inserted = 0u64;

    for chunk in events.chunks(INSERT_BATCH_SIZE) {
        let query = format!(
            "INSERT INTO indexer.nft_mints (contract_address, tx_hash, log_index, block_number, \
             block_timestamp, token_id, owner, name, valuation, event_timestamp) \
             VALUES {} ON CONFLICT (tx_hash, log_index) DO NOTHING",
            values_clauses(chunk.len())
        );

        let owned: Vec<Params> = chunk
            .iter()
            .map(|e| Params {
                log_index: e.log_index as i32,
                block_number: e.block_number as i64,
                block_timestamp: e.block_timestamp as i64,
                token_id: e.token_id.to_string(),
                valuation: e.valuation.to_string(),
                event_timestamp: e.timestamp as i64,
            })
            .collect();

        let mut params: Vec<SqlParam> = Vec::with_capacity(chunk.len() * EVENT_COLS);
        for (e, p) in chunk.iter().zip(&owned) {
            params.push(&e.contract_address);
            params.push(&e.tx_hash);
            params.push(&p.log_index);
            params.push(&p.block_number);
            params.push(&p.block_timestamp);
            params.push(&p.token_id);
            params.push(&e.owner);
            params.push(&e.name);
            params.push(&p.valuation);
            params.push(&p.event_timestamp);
        }

        inserted += execute_batch_insert(tx, &query, &params, chunk.len()).await?;
    }

    Ok(inserted)
}

async fn insert_prices(tx: &Transaction<'_>, events: &[&PriceUpdateEvent]) -> anyhow::Result<u64> {
    struct Params {
        log_index: i32,
        block_number: i64,
        block_timestamp: i64,
        token_id: Option<String>,
        old_price: String,
        new_price: String,
        event_timestamp: i64,
    }

    let mut inserted = 0u64;

    for chunk in events.chunks(INSERT_BATCH_SIZE) {
        let query = format!(
            "INSERT INTO indexer.prices (contract_address, tx_hash, log_index, block_number, \
             block_timestamp, token_address, token_id, old_price, new_price, event_timestamp) \
             VALUES {} ON CONFLICT (tx_hash, log_index) DO NOTHING",
            values_clauses(chunk.len())
        );

        let owned: Vec<Params> = chunk
            .iter()
            .map(|e| Params {
                log_index: e.log_index as i32,
                block_number: e.block_number as i64,
                block_timestamp: e.block_timestamp as i64,
                token_id: e.token_id.map(|id| id.to_string()),
                old_price: e.old_price.to_string(),
                new_price: e.new_price.to_string(),
                event_timestamp: e.timestamp as i64,
            })
            .collect();

        let mut params: Vec<SqlParam> = Vec::with_capacity(chunk.len() * EVENT_COLS);
        for (e, p) in chunk.iter().zip(&owned) {
            params.push(&e.contract_address);
            params.push(&e.tx_hash);
            params.push(&p.log_index);
            params.push(&p.block_number);
            params.push(&p.block_timestamp);
            params.push(&e.token_address);
            params.push(&p.token_id);
            params.push(&p.old_price);
            params.push(&p.new_price);
            params.push(&p.event_timestamp);
        }

        inserted += execute_batch_insert(tx, &query, &params, chunk.len()).await?;
    }

    Ok(inserted)
}

impl PostgresClient {
    // ==================== CHECKPOINTS ====================

    pub async fn get_sync_checkpoint(&self, contract: &str) -> anyhow::Result<Option<Checkpoint>> {
        let client = self.pool.get().await?;
        let query = "SELECT contract_name, last_processed_block, updated_at \
                     FROM indexer.sync_checkpoints WHERE contract_name = $1";

        let row = client.query_opt(query, &[&contract]).await?;

        Ok(row.map(|r| Checkpoint {
            contract_name: r.get("contract_name"),
            last_processed_block: r.get::<_, i64>("last_processed_block") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn set_sync_checkpoint(
        &self,
        checkpoint: &Checkpoint,
        force: bool,
    ) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        let guarded = r#"
            INSERT INTO indexer.sync_checkpoints (contract_name, last_processed_block, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (contract_name) DO UPDATE SET
                last_processed_block = EXCLUDED.last_processed_block,
                updated_at = EXCLUDED.updated_at
            WHERE sync_checkpoints.last_processed_block <= EXCLUDED.last_processed_block
        "#;
        let forced = r#"
            INSERT INTO indexer.sync_checkpoints (contract_name, last_processed_block, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (contract_name) DO UPDATE SET
                last_processed_block = EXCLUDED.last_processed_block,
                updated_at = EXCLUDED.updated_at
        "#;

        let block = checkpoint.last_processed_block as i64;
        let rows = client
            .execute(
                if force { forced } else { guarded },
                &[&checkpoint.contract_name, &block, &checkpoint.updated_at],
            )
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        if rows == 0 {
            // The guard refused to move the watermark backwards.
            let current = self
                .get_sync_checkpoint(&checkpoint.contract_name)
                .await
                .map_err(StoreError::Backend)?
                .map(|c| c.last_processed_block)
                .unwrap_or(0);
            return Err(StoreError::NonMonotonicCheckpoint {
                contract: checkpoint.contract_name.clone(),
                current,
                requested: checkpoint.last_processed_block,
            });
        }

        Ok(())
    }

    // ==================== QUERY READS ====================
    // Consumed by the external query API: recency-ordered, paginated, with
    // countDocuments-equivalent totals.

    pub async fn get_swaps(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<SwapEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM indexer.swaps \
                 ORDER BY block_number DESC, log_index DESC LIMIT $1 OFFSET $2",
                &[&limit, &skip],
            )
            .await?;
        rows.iter().map(row_to_swap).collect()
    }

    pub async fn count_swaps(&self) -> anyhow::Result<u64> {
        self.count_table("swaps").await
    }

    pub async fn get_transfers(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<TransferEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM indexer.transfers \
                 ORDER BY block_number DESC, log_index DESC LIMIT $1 OFFSET $2",
                &[&limit, &skip],
            )
            .await?;
        rows.iter().map(row_to_transfer).collect()
    }

    pub async fn count_transfers(&self) -> anyhow::Result<u64> {
        self.count_table("transfers").await
    }

    pub async fn get_nft_mints(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<NftMintEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM indexer.nft_mints \
                 ORDER BY block_number DESC, log_index DESC LIMIT $1 OFFSET $2",
                &[&limit, &skip],
            )
            .await?;
        rows.iter().map(row_to_nft_mint).collect()
    }

    pub async fn count_nft_mints(&self) -> anyhow::Result<u64> {
        self.count_table("nft_mints").await
    }

    pub async fn get_prices(&self, limit: i64, skip: i64) -> anyhow::Result<Vec<PriceUpdateEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM indexer.prices \
                 ORDER BY block_number DESC, log_index DESC LIMIT $1 OFFSET $2",
                &[&limit, &skip],
            )
            .await?;
        rows.iter().map(row_to_price_update).collect()
    }

    pub async fn count_prices(&self) -> anyhow::Result<u64> {
        self.count_table("prices").await
    }

    pub async fn get_liquidity(
        &self,
        limit: i64,
        skip: i64,
    ) -> anyhow::Result<Vec<LiquidityEvent>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT * FROM indexer.liquidity \
                 ORDER BY block_number DESC, log_index DESC LIMIT $1 OFFSET $2",
                &[&limit, &skip],
            )
            .await?;
        rows.iter().map(row_to_liquidity).collect()
    }

    pub async fn count_liquidity(&self) -> anyhow::Result<u64> {
        self.count_table("liquidity").await
    }

    async fn count_table(&self, table: &str) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        // `table` is one of our five fixed collection names, never user input.
        let row = client
            .query_one(&format!("SELECT COUNT(*) FROM indexer.{table}"), &[])
            .await?;
        Ok(row.get::<_, i64>(0) as u64)
    }
}

#[async_trait]
impl EventStore for PostgresClient {
    async fn upsert_events(&self, events: &[DomainEvent]) -> Result<u64, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut swaps: Vec<&SwapEvent> = Vec::new();
        let mut liquidity: Vec<&LiquidityEvent> = Vec::new();
        let mut transfers: Vec<&TransferEvent> = Vec::new();
        let mut nft_mints: Vec<&NftMintEvent> = Vec::new();
        let mut prices: Vec<&PriceUpdateEvent> = Vec::new();

        for event in events {
            match event {
                DomainEvent::Swap(e) => swaps.push(e),
                DomainEvent::Liquidity(e) => liquidity.push(e),
                DomainEvent::Transfer(e) => transfers.push(e),
                DomainEvent::NftMint(e) => nft_mints.push(e),
                DomainEvent::PriceUpdate(e) => prices.push(e),
            }
        }

        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        let mut inserted = 0u64;
        inserted += insert_swaps(&tx, &swaps).await?;
        inserted += insert_liquidity(&tx, &liquidity).await?;
        inserted += insert_transfers(&tx, &transfers).await?;
        inserted += insert_nft_mints(&tx, &nft_mints).await?;
        inserted += insert_prices(&tx, &prices).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(inserted)
    }
}

#[async_trait]
impl CheckpointStore for PostgresClient {
    async fn get_checkpoint(&self, contract: &str) -> Result<Option<Checkpoint>, StoreError> {
        self.get_sync_checkpoint(contract)
            .await
            .map_err(StoreError::Backend)
    }

    async fn advance_checkpoint(
        &self,
        contract: &str,
        block: u64,
        force: bool,
    ) -> Result<(), StoreError> {
        self.set_sync_checkpoint(&Checkpoint::new(contract, block), force)
            .await
    }
}

// ==================== ROW MAPPING ====================

fn row_to_swap(row: &Row) -> anyhow::Result<SwapEvent> {
    let direction = match row.get::<_, String>("direction").as_str() {
        "buy" => SwapDirection::Buy,
        _ => SwapDirection::Sell,
    };
    Ok(SwapEvent {
        contract_address: row.get("contract_address"),
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<_, i32>("log_index") as u32,
        block_number: row.get::<_, i64>("block_number") as u64,
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        trader: row.get("trader"),
        direction,
        eth_amount: parse_u256(&row.get::<_, String>("eth_amount"))?,
        token_amount: parse_u256(&row.get::<_, String>("token_amount"))?,
        timestamp: row.get::<_, i64>("event_timestamp") as u64,
    })
}

fn row_to_liquidity(row: &Row) -> anyhow::Result<LiquidityEvent> {
    let kind = match row.get::<_, String>("kind").as_str() {
        "added" => LiquidityKind::Added,
        _ => LiquidityKind::Removed,
    };
    Ok(LiquidityEvent {
        contract_address: row.get("contract_address"),
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<_, i32>("log_index") as u32,
        block_number: row.get::<_, i64>("block_number") as u64,
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        provider: row.get("provider"),
        kind,
        token_amount: parse_u256(&row.get::<_, String>("token_amount"))?,
        eth_amount: parse_u256(&row.get::<_, String>("eth_amount"))?,
        liquidity_tokens: parse_u256(&row.get::<_, String>("liquidity_tokens"))?,
    })
}

fn row_to_transfer(row: &Row) -> anyhow::Result<TransferEvent> {
    Ok(TransferEvent {
        contract_address: row.get("contract_address"),
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<_, i32>("log_index") as u32,
        block_number: row.get::<_, i64>("block_number") as u64,
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        from: row.get("from_address"),
        to: row.get("to_address"),
        value: parse_u256(&row.get::<_, String>("value"))?,
        minted: row.get("minted"),
        burned: row.get("burned"),
    })
}

fn row_to_nft_mint(row: &Row) -> anyhow::Result<NftMintEvent> {
    Ok(NftMintEvent {
        contract_address: row.get("contract_address"),
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<_, i32>("log_index") as u32,
        block_number: row.get::<_, i64>("block_number") as u64,
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        token_id: parse_u256(&row.get::<_, String>("token_id"))?,
        owner: row.get("owner"),
        name: row.get("name"),
        valuation: parse_u256(&row.get::<_, String>("valuation"))?,
        timestamp: row.get::<_, i64>("event_timestamp") as u64,
    })
}

fn row_to_price_update(row: &Row) -> anyhow::Result<PriceUpdateEvent> {
    let token_id = row
        .get::<_, Option<String>>("token_id")
        .map(|s| parse_u256(&s))
        .transpose()?;
    Ok(PriceUpdateEvent {
        contract_address: row.get("contract_address"),
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<_, i32>("log_index") as u32,
        block_number: row.get::<_, i64>("block_number") as u64,
        block_timestamp: row.get::<_, i64>("block_timestamp") as u64,
        token_address: row.get("token_address"),
        token_id,
        old_price: parse_u256(&row.get::<_, String>("old_price"))?,
        new_price: parse_u256(&row.get::<_, String>("new_price"))?,
        timestamp: row.get::<_, i64>("event_timestamp") as u64,
    })
}
