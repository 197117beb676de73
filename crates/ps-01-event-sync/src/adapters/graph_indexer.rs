//! GraphQL subgraph indexer client.
//!
//! Pages through `deposits`, `withdrawals` or `encryptedNotes` with a
//! `blockNumber_gte` cursor. `_meta.block.number` is reported as the sync
//! height; a subgraph flagging `hasIndexingErrors` is treated as a failure.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use shared_types::{
    BlockNumber, DepositEvent, EncryptedNoteEvent, Event, EventKind, InstanceKey, WithdrawalEvent,
    U256,
};
use tracing::debug;

use crate::domain::{EventSyncError, IndexedEvents};
use crate::ports::{EventIndexer, IndexerRequest};

const DEPOSITS_QUERY: &str = r#"
query getAllDeposits($currency: String!, $amount: String!, $first: Int!, $fromBlock: Int!) {
  records: deposits(
    first: $first
    orderBy: index
    orderDirection: asc
    where: { currency: $currency, amount: $amount, blockNumber_gte: $fromBlock }
  ) {
    blockNumber
    commitment
    index
    timestamp
    transactionHash
  }
  _meta { block { number } hasIndexingErrors }
}"#;

const WITHDRAWALS_QUERY: &str = r#"
query getAllWithdrawals($currency: String!, $amount: String!, $first: Int!, $fromBlock: Int!) {
  records: withdrawals(
    first: $first
    orderBy: blockNumber
    orderDirection: asc
    where: { currency: $currency, amount: $amount, blockNumber_gte: $fromBlock }
  ) {
    blockNumber
    nullifier
    to
    fee
    transactionHash
  }
  _meta { block { number } hasIndexingErrors }
}"#;

const NOTES_QUERY: &str = r#"
query getAllEncryptedNotes($first: Int!, $fromBlock: Int!) {
  records: encryptedNotes(
    first: $first
    orderBy: blockNumber
    orderDirection: asc
    where: { blockNumber_gte: $fromBlock }
  ) {
    blockNumber
    encryptedNote
    transactionHash
  }
  _meta { block { number } hasIndexingErrors }
}"#;

/// Numeric field that may arrive as a JSON number or a BigInt string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(u64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Result<u64, EventSyncError> {
        match self {
            Numeric::Number(n) => Ok(*n),
            Numeric::Text(s) => s
                .parse()
                .map_err(|_| EventSyncError::Decode(format!("invalid number: {s}"))),
        }
    }

    /// Decimal string of a wei amount, which may exceed `u64`.
    fn amount(&self) -> Result<String, EventSyncError> {
        match self {
            Numeric::Number(n) => Ok(n.to_string()),
            Numeric::Text(s) => U256::from_dec_str(s)
                .map(|value| value.to_string())
                .map_err(|_| EventSyncError::Decode(format!("invalid amount: {s}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecord {
    block_number: Numeric,
    transaction_hash: String,
    commitment: Option<String>,
    index: Option<Numeric>,
    timestamp: Option<Numeric>,
    nullifier: Option<String>,
    to: Option<String>,
    fee: Option<Numeric>,
    encrypted_note: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaBlock {
    number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    block: MetaBlock,
    #[serde(default)]
    has_indexing_errors: bool,
}

#[derive(Debug, Deserialize)]
struct PageData {
    records: Vec<GraphRecord>,
    #[serde(rename = "_meta")]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<PageData>,
    errors: Option<Vec<GraphError>>,
}

/// Subgraph-backed `EventIndexer`.
pub struct GraphIndexer {
    http_client: reqwest::Client,
    url: String,
    page_size: usize,
}

impl GraphIndexer {
    /// Create a client for one subgraph endpoint.
    pub fn new(url: impl Into<String>, page_size: usize, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http_client,
            url: url.into(),
            page_size: page_size.max(1),
        }
    }

    async fn fetch_page(
        &self,
        kind: EventKind,
        instance: &InstanceKey,
        from_block: BlockNumber,
    ) -> Result<PageData, EventSyncError> {
        let body = json!({
            "query": query_for(kind),
            "variables": variables(instance, self.page_size, from_block),
        });

        let response: GraphResponse = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EventSyncError::Indexer(e.to_string()))?
            .json()
            .await
            .map_err(|e| EventSyncError::Indexer(format!("invalid response: {e}")))?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(EventSyncError::Indexer(messages.join("; ")));
        }
        let page = response
            .data
            .ok_or_else(|| EventSyncError::Indexer("response missing data".to_string()))?;
        if page.meta.has_indexing_errors {
            return Err(EventSyncError::Indexer("subgraph has indexing errors".to_string()));
        }
        Ok(page)
    }
}

#[async_trait]
impl EventIndexer for GraphIndexer {
    async fn query_events(
        &self,
        request: &IndexerRequest,
    ) -> Result<IndexedEvents, EventSyncError> {
        let indexed = paginate(request.kind, request.from_block, self.page_size, |cursor| {
            self.fetch_page(request.kind, &request.instance, cursor)
        })
        .await?;

        debug!(
            method = request.kind.indexer_method(),
            instance = %request.instance,
            count = indexed.events.len(),
            last_sync_block = indexed.last_sync_block,
            "Indexer query complete"
        );
        Ok(indexed)
    }
}

/// Walk pages with a `blockNumber_gte` cursor until a short page.
///
/// The cursor restarts at the last seen block, so a full page made only of
/// already-seen records means one block holds a page or more of events. The
/// cursor cannot move past it, so the query fails rather than report a sync
/// height that skips them.
async fn paginate<F, Fut>(
    kind: EventKind,
    from_block: BlockNumber,
    page_size: usize,
    mut fetch_page: F,
) -> Result<IndexedEvents, EventSyncError>
where
    F: FnMut(BlockNumber) -> Fut,
    Fut: Future<Output = Result<PageData, EventSyncError>>,
{
    let mut cursor = from_block;
    let mut seen = HashSet::new();
    let mut events = Vec::new();

    loop {
        let page = fetch_page(cursor).await?;
        let page_len = page.records.len();

        let mut added = 0;
        for record in page.records {
            let event = into_event(kind, record)?;
            if seen.insert(event.natural_key()) {
                events.push(event);
                added += 1;
            }
        }

        if page_len < page_size {
            return Ok(IndexedEvents {
                events,
                last_sync_block: page.meta.block.number,
            });
        }
        if added == 0 {
            return Err(EventSyncError::Indexer(format!(
                "{} page stuck at block {cursor}",
                kind.indexer_method()
            )));
        }
        cursor = events.last().map(Event::block_number).unwrap_or(cursor);
    }
}

fn query_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Deposit => DEPOSITS_QUERY,
        EventKind::Withdrawal => WITHDRAWALS_QUERY,
        EventKind::EncryptedNote => NOTES_QUERY,
    }
}

fn variables(instance: &InstanceKey, first: usize, from_block: BlockNumber) -> Value {
    json!({
        "currency": instance.currency,
        "amount": instance.denomination,
        "first": first,
        "fromBlock": from_block,
    })
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, EventSyncError> {
    value.ok_or_else(|| EventSyncError::Decode(format!("indexer record missing {field}")))
}

fn into_event(kind: EventKind, record: GraphRecord) -> Result<Event, EventSyncError> {
    let block_number = record.block_number.value()?;
    let transaction_hash = record.transaction_hash;
    Ok(match kind {
        EventKind::Deposit => Event::Deposit(DepositEvent {
            timestamp: required(record.timestamp, "timestamp")?.value()?,
            commitment: required(record.commitment, "commitment")?,
            block_number,
            transaction_hash,
            leaf_index: u32::try_from(required(record.index, "index")?.value()?)
                .map_err(|_| EventSyncError::Decode("index exceeds u32".to_string()))?,
        }),
        EventKind::Withdrawal => Event::Withdrawal(WithdrawalEvent {
            to: required(record.to, "to")?,
            fee: required(record.fee, "fee")?.amount()?,
            block_number,
            nullifier_hash: required(record.nullifier, "nullifier")?,
            transaction_hash,
        }),
        EventKind::EncryptedNote => Event::EncryptedNote(EncryptedNoteEvent {
            transaction_hash,
            block_number,
            encrypted_note: required(record.encrypted_note, "encryptedNote")?,
        }),
    })
}
