//! # Core Domain Entities
//!
//! Defines the event model tracked for every privacy-pool instance.
//!
//! ## Clusters
//!
//! - **Instances**: `InstanceKey`, `NetworkId`, `EventKind`
//! - **Events**: `DepositEvent`, `WithdrawalEvent`, `EncryptedNoteEvent`,
//!   `Event`, `EventSet`
//! - **Lookups**: `IndexedField`, `EventQuery`
//!
//! JSON field names and field order follow the bundled snapshot files, so
//! serializing a parsed snapshot reproduces it byte for byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use crate::errors::ParseError;

/// Chain identifier (EIP-155 chain id).
pub type NetworkId = u64;

/// Block height on the source chain.
pub type BlockNumber = u64;

// =============================================================================
// INSTANCES
// =============================================================================

/// The kind of contract event tracked per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// `Deposit(bytes32 indexed commitment, uint32 leafIndex, uint256 timestamp)`.
    Deposit,
    /// `Withdrawal(address to, bytes32 nullifierHash, address indexed relayer, uint256 fee)`.
    Withdrawal,
    /// `EncryptedNote(address indexed sender, bytes encryptedNote)`.
    EncryptedNote,
}

impl EventKind {
    /// Every tracked kind, in sync order.
    pub const ALL: [EventKind; 3] = [
        EventKind::Deposit,
        EventKind::Withdrawal,
        EventKind::EncryptedNote,
    ];

    /// Collection / snapshot file prefix.
    pub fn collection_prefix(&self) -> &'static str {
        match self {
            EventKind::Deposit => "deposits",
            EventKind::Withdrawal => "withdrawals",
            EventKind::EncryptedNote => "encrypted_notes",
        }
    }

    /// Event name as declared in the contract ABI.
    pub fn contract_event_name(&self) -> &'static str {
        match self {
            EventKind::Deposit => "Deposit",
            EventKind::Withdrawal => "Withdrawal",
            EventKind::EncryptedNote => "EncryptedNote",
        }
    }

    /// Indexer query method for this kind.
    pub fn indexer_method(&self) -> &'static str {
        match self {
            EventKind::Deposit => "getAllDeposits",
            EventKind::Withdrawal => "getAllWithdrawals",
            EventKind::EncryptedNote => "getAllEncryptedNotes",
        }
    }

    /// Whether events of this kind carry a `leafIndex`.
    pub fn has_leaf_index(&self) -> bool {
        matches!(self, EventKind::Deposit)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.contract_event_name())
    }
}

impl FromStr for EventKind {
    type Err = ParseError;

    /// Accepts `deposit`, `Deposits`, `encrypted_notes`, `encryptedNote`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        let normalized = normalized.trim_end_matches('s');
        match normalized {
            "deposit" => Ok(EventKind::Deposit),
            "withdrawal" => Ok(EventKind::Withdrawal),
            "encryptednote" | "note" => Ok(EventKind::EncryptedNote),
            _ => Err(ParseError::UnknownEventKind(s.to_string())),
        }
    }
}

/// Identifies one pool contract: `(network, currency, denomination)`.
///
/// The partition key for every event collection, cache file and tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    /// Chain id of the network the contract lives on.
    pub network_id: NetworkId,
    /// Lower-case currency symbol (`eth`, `dai`, ...).
    pub currency: String,
    /// Denomination as written in the network config (`0.1`, `100`, ...).
    pub denomination: String,
}

impl InstanceKey {
    /// Create a key, normalizing the currency to lower case.
    pub fn new(
        network_id: NetworkId,
        currency: impl Into<String>,
        denomination: impl Into<String>,
    ) -> Self {
        Self {
            network_id,
            currency: currency.into().to_lowercase(),
            denomination: denomination.into(),
        }
    }

    /// Name of the collection / snapshot holding `kind` events.
    ///
    /// Encrypted notes come from one network-wide contract, so their
    /// collection is shared by every instance on the network.
    pub fn collection_name(&self, kind: EventKind) -> String {
        match kind {
            EventKind::EncryptedNote => {
                format!("{}_{}", kind.collection_prefix(), self.network_id)
            }
            _ => format!(
                "{}_{}_{}_{}",
                kind.collection_prefix(),
                self.network_id,
                self.currency,
                self.denomination
            ),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.network_id, self.currency, self.denomination)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// A deposit into the pool. `leaf_index` is the commitment's tree position.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositEvent {
    /// Unix timestamp emitted by the contract (stored as a decimal string).
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub timestamp: u64,
    /// Hex commitment (tree leaf).
    pub commitment: String,
    /// Block containing the deposit.
    pub block_number: BlockNumber,
    /// Transaction hash.
    pub transaction_hash: String,
    /// Position of the commitment in the append-only tree.
    pub leaf_index: u32,
}

/// A withdrawal from the pool. `nullifier_hash` is unique per deposit spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalEvent {
    /// Recipient address.
    pub to: String,
    /// Relayer fee in wei (decimal string).
    pub fee: String,
    /// Block containing the withdrawal.
    pub block_number: BlockNumber,
    /// Hex nullifier hash revealed by the proof.
    pub nullifier_hash: String,
    /// Transaction hash.
    pub transaction_hash: String,
}

/// An encrypted note backup published alongside a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedNoteEvent {
    /// Transaction hash.
    pub transaction_hash: String,
    /// Block containing the note.
    pub block_number: BlockNumber,
    /// Hex payload; empty payloads are malformed.
    pub encrypted_note: String,
}

/// One tracked contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    /// Deposit event.
    Deposit(DepositEvent),
    /// Withdrawal event.
    Withdrawal(WithdrawalEvent),
    /// Encrypted note event.
    EncryptedNote(EncryptedNoteEvent),
}

impl Event {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Deposit(_) => EventKind::Deposit,
            Event::Withdrawal(_) => EventKind::Withdrawal,
            Event::EncryptedNote(_) => EventKind::EncryptedNote,
        }
    }

    /// Block the event was emitted in.
    pub fn block_number(&self) -> BlockNumber {
        match self {
            Event::Deposit(e) => e.block_number,
            Event::Withdrawal(e) => e.block_number,
            Event::EncryptedNote(e) => e.block_number,
        }
    }

    /// Transaction hash of the emitting transaction.
    pub fn transaction_hash(&self) -> &str {
        match self {
            Event::Deposit(e) => &e.transaction_hash,
            Event::Withdrawal(e) => &e.transaction_hash,
            Event::EncryptedNote(e) => &e.transaction_hash,
        }
    }

    /// Tree position, for deposits only.
    pub fn leaf_index(&self) -> Option<u32> {
        match self {
            Event::Deposit(e) => Some(e.leaf_index),
            _ => None,
        }
    }

    /// Borrow as a deposit.
    pub fn as_deposit(&self) -> Option<&DepositEvent> {
        match self {
            Event::Deposit(e) => Some(e),
            _ => None,
        }
    }

    /// Value of an indexed lookup field, if this event carries it.
    pub fn field(&self, field: IndexedField) -> Option<&str> {
        match (field, self) {
            (IndexedField::TransactionHash, e) => Some(e.transaction_hash()),
            (IndexedField::Commitment, Event::Deposit(e)) => Some(&e.commitment),
            (IndexedField::NullifierHash, Event::Withdrawal(e)) => Some(&e.nullifier_hash),
            _ => None,
        }
    }

    /// Key under which the persisted store upserts this event.
    pub fn natural_key(&self) -> String {
        match self {
            Event::Deposit(e) => format!("{:010}", e.leaf_index),
            Event::Withdrawal(e) => e.nullifier_hash.to_lowercase(),
            Event::EncryptedNote(e) => format!("{}:{}", e.transaction_hash, e.encrypted_note),
        }
    }
}

impl From<DepositEvent> for Event {
    fn from(e: DepositEvent) -> Self {
        Event::Deposit(e)
    }
}

impl From<WithdrawalEvent> for Event {
    fn from(e: WithdrawalEvent) -> Self {
        Event::Withdrawal(e)
    }
}

impl From<EncryptedNoteEvent> for Event {
    fn from(e: EncryptedNoteEvent) -> Self {
        Event::EncryptedNote(e)
    }
}

/// An ordered event sequence plus the highest block known to be covered.
///
/// `last_block` is the merge boundary for the next incremental fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSet {
    /// Events in canonical order.
    pub events: Vec<Event>,
    /// Highest fully covered block.
    pub last_block: BlockNumber,
}

impl EventSet {
    /// Create a set from parts.
    pub fn new(events: Vec<Event>, last_block: BlockNumber) -> Self {
        Self { events, last_block }
    }

    /// An empty set covering nothing past `last_block`.
    pub fn empty(last_block: BlockNumber) -> Self {
        Self {
            events: Vec::new(),
            last_block,
        }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Block number of the final event, if any.
    pub fn last_event_block(&self) -> Option<BlockNumber> {
        self.events.last().map(Event::block_number)
    }

    /// First event matching `query`.
    pub fn find(&self, query: &EventQuery) -> Option<&Event> {
        self.events.iter().find(|e| query.matches(e))
    }

    /// Deposit commitments in sequence order.
    pub fn commitments(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(Event::as_deposit)
            .map(|d| d.commitment.as_str())
            .collect()
    }
}

// =============================================================================
// LOOKUPS
// =============================================================================

/// Secondary index available on persisted event collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexedField {
    /// Deposit commitment.
    Commitment,
    /// Withdrawal nullifier hash.
    NullifierHash,
    /// Transaction hash (all kinds).
    TransactionHash,
}

impl IndexedField {
    /// Index name as used by the persisted store.
    pub fn index_name(&self) -> &'static str {
        match self {
            IndexedField::Commitment => "commitment",
            IndexedField::NullifierHash => "nullifierHash",
            IndexedField::TransactionHash => "transactionHash",
        }
    }
}

impl FromStr for IndexedField {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commitment" => Ok(IndexedField::Commitment),
            "nullifierHash" | "nullifier_hash" => Ok(IndexedField::NullifierHash),
            "transactionHash" | "transaction_hash" => Ok(IndexedField::TransactionHash),
            _ => Err(ParseError::UnknownField(s.to_string())),
        }
    }
}

/// Point lookup: the event whose `field` equals `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Field to match.
    pub field: IndexedField,
    /// Expected value (hex values compare case-insensitively).
    pub value: String,
}

impl EventQuery {
    /// Create a query.
    pub fn new(field: IndexedField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Whether `event` satisfies this query.
    pub fn matches(&self, event: &Event) -> bool {
        event
            .field(self.field)
            .map(|v| v.eq_ignore_ascii_case(&self.value))
            .unwrap_or(false)
    }
}
