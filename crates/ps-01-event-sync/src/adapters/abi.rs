//! # Pool Events
//!
//! ABI bindings for the events emitted by the pool contracts and their
//! conversion into stored `Event`s.
//!
//! | Event | Indexed | Data |
//! |-------|---------|------|
//! | `Deposit(bytes32,uint32,uint256)` | commitment | leafIndex, timestamp |
//! | `Withdrawal(address,bytes32,address,uint256)` | relayer | to, nullifierHash, fee |
//! | `EncryptedNote(address,bytes)` | sender | encryptedNote |

use ethers::abi::RawLog;
use ethers::contract::EthEvent;
use ethers::types::{Address, Bytes, Log, H256, U256};
use ethers::utils::to_checksum;
use shared_types::{DepositEvent, EncryptedNoteEvent, Event, EventKind, WithdrawalEvent};

use crate::domain::EventSyncError;

/// `Deposit` emitted by `deposit()`.
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "Deposit", abi = "Deposit(bytes32,uint32,uint256)")]
pub struct DepositLog {
    #[ethevent(indexed)]
    pub commitment: [u8; 32],
    pub leaf_index: u32,
    pub timestamp: U256,
}

/// `Withdrawal` emitted by `withdraw()`.
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "Withdrawal", abi = "Withdrawal(address,bytes32,address,uint256)")]
pub struct WithdrawalLog {
    pub to: Address,
    pub nullifier_hash: [u8; 32],
    #[ethevent(indexed)]
    pub relayer: Address,
    pub fee: U256,
}

/// `EncryptedNote` emitted by the echoer contract.
#[derive(Debug, Clone, PartialEq, Eq, EthEvent)]
#[ethevent(name = "EncryptedNote", abi = "EncryptedNote(address,bytes)")]
pub struct EncryptedNoteLog {
    #[ethevent(indexed)]
    pub sender: Address,
    pub encrypted_note: Bytes,
}

/// Canonical event signature used for the topic hash.
pub fn event_signature(kind: EventKind) -> String {
    match kind {
        EventKind::Deposit => DepositLog::abi_signature(),
        EventKind::Withdrawal => WithdrawalLog::abi_signature(),
        EventKind::EncryptedNote => EncryptedNoteLog::abi_signature(),
    }
    .into_owned()
}

/// `topics[0]` of an event kind.
pub fn event_topic(kind: EventKind) -> H256 {
    match kind {
        EventKind::Deposit => DepositLog::signature(),
        EventKind::Withdrawal => WithdrawalLog::signature(),
        EventKind::EncryptedNote => EncryptedNoteLog::signature(),
    }
}

fn chain_position(log: &Log) -> (u64, u64) {
    let block = log.block_number.map_or(u64::MAX, |b| b.as_u64());
    let index = log.log_index.map_or(0, |i| i.low_u64());
    (block, index)
}

/// Decode every non-removed log of `kind`, in chain order.
pub fn decode_logs(kind: EventKind, mut logs: Vec<Log>) -> Result<Vec<Event>, EventSyncError> {
    logs.retain(|log| log.removed != Some(true));
    logs.sort_by_key(chain_position);
    logs.iter().map(|log| decode_log(kind, log)).collect()
}

/// Decode one log into an event.
pub fn decode_log(kind: EventKind, log: &Log) -> Result<Event, EventSyncError> {
    let block_number = log
        .block_number
        .ok_or_else(|| EventSyncError::Decode("log without block number".to_string()))?
        .as_u64();
    let transaction_hash = log
        .transaction_hash
        .map(|hash| format!("{hash:#x}"))
        .ok_or_else(|| EventSyncError::Decode("log without transaction hash".to_string()))?;
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    let invalid = |e: ethers::abi::Error| EventSyncError::Decode(format!("{kind} log: {e}"));

    let event = match kind {
        EventKind::Deposit => {
            let decoded = DepositLog::decode_log(&raw).map_err(invalid)?;
            Event::Deposit(DepositEvent {
                commitment: format!("0x{}", hex::encode(decoded.commitment)),
                leaf_index: decoded.leaf_index,
                timestamp: u64::try_from(decoded.timestamp)
                    .map_err(|_| EventSyncError::Decode("timestamp exceeds u64".to_string()))?,
                block_number,
                transaction_hash,
            })
        }
        EventKind::Withdrawal => {
            let decoded = WithdrawalLog::decode_log(&raw).map_err(invalid)?;
            Event::Withdrawal(WithdrawalEvent {
                to: to_checksum(&decoded.to, None),
                nullifier_hash: format!("0x{}", hex::encode(decoded.nullifier_hash)),
                fee: decoded.fee.to_string(),
                block_number,
                transaction_hash,
            })
        }
        EventKind::EncryptedNote => {
            let decoded = EncryptedNoteLog::decode_log(&raw).map_err(invalid)?;
            Event::EncryptedNote(EncryptedNoteEvent {
                encrypted_note: format!("0x{}", hex::encode(&decoded.encrypted_note)),
                block_number,
                transaction_hash,
            })
        }
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{encode, Token};
    use ethers::types::U64;
    use ethers::utils::keccak256;

    fn log(kind: EventKind, indexed: H256, data: Vec<u8>, block: u64, index: u64) -> Log {
        Log {
            topics: vec![event_topic(kind), indexed],
            data: data.into(),
            block_number: Some(U64::from(block)),
            transaction_hash: Some(H256::from_low_u64_be(block * 100 + index)),
            log_index: Some(U256::from(index)),
            ..Default::default()
        }
    }

    fn note_log(data: Vec<u8>, block: u64, index: u64) -> Log {
        log(EventKind::EncryptedNote, H256::zero(), data, block, index)
    }

    fn word(value: u64) -> [u8; 32] {
        let mut word = [0u8; 32];
        U256::from(value).to_big_endian(&mut word);
        word
    }

    #[test]
    fn test_topics_match_signatures() {
        for kind in EventKind::ALL {
            let expected = H256::from(keccak256(event_signature(kind).as_bytes()));
            assert_eq!(event_topic(kind), expected);
        }
        assert_eq!(
            event_signature(EventKind::Withdrawal),
            "Withdrawal(address,bytes32,address,uint256)"
        );
    }

    #[test]
    fn test_decode_deposit() {
        let commitment = H256::repeat_byte(0xab);
        let data = encode(&[
            Token::Uint(U256::from(7)),
            Token::Uint(U256::from(1_600_000_000u64)),
        ]);
        let event = decode_log(EventKind::Deposit, &log(EventKind::Deposit, commitment, data, 100, 0))
            .unwrap();
        let deposit = event.as_deposit().unwrap();
        assert_eq!(deposit.commitment, format!("0x{}", "ab".repeat(32)));
        assert_eq!(deposit.leaf_index, 7);
        assert_eq!(deposit.timestamp, 1_600_000_000);
        assert_eq!(deposit.block_number, 100);
        assert_eq!(deposit.transaction_hash.len(), 66);
    }

    #[test]
    fn test_decode_withdrawal_keeps_wide_fee() {
        let to: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        let fee = U256::from_dec_str("100000000000000000000").unwrap();
        let data = encode(&[
            Token::Address(to),
            Token::FixedBytes(vec![0xcd; 32]),
            Token::Uint(fee),
        ]);
        let event = decode_log(
            EventKind::Withdrawal,
            &log(EventKind::Withdrawal, H256::zero(), data, 16, 0),
        )
        .unwrap();
        let Event::Withdrawal(w) = event else {
            panic!("expected withdrawal");
        };
        assert_eq!(w.to, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(w.nullifier_hash, format!("0x{}", "cd".repeat(32)));
        assert_eq!(w.fee, "100000000000000000000");
    }

    #[test]
    fn test_decode_encrypted_note() {
        let data = encode(&[Token::Bytes(vec![0xde, 0xad, 0xbe, 0xef])]);
        let Event::EncryptedNote(note) = decode_log(EventKind::EncryptedNote, &note_log(data, 1, 0)).unwrap()
        else {
            panic!("expected note");
        };
        assert_eq!(note.encrypted_note, "0xdeadbeef");
    }

    #[test]
    fn test_short_data_is_decode_error() {
        let deposit = log(EventKind::Deposit, H256::zero(), vec![0], 1, 0);
        assert!(matches!(
            decode_log(EventKind::Deposit, &deposit),
            Err(EventSyncError::Decode(_))
        ));
    }

    #[test]
    fn test_wrong_topic_is_decode_error() {
        let mut deposit = log(EventKind::Deposit, H256::zero(), vec![0; 64], 1, 0);
        deposit.topics[0] = event_topic(EventKind::Withdrawal);
        assert!(matches!(
            decode_log(EventKind::Deposit, &deposit),
            Err(EventSyncError::Decode(_))
        ));
    }

    #[test]
    fn test_huge_bytes_offset_is_decode_error() {
        let mut data = vec![0u8; 24];
        data.extend_from_slice(&[0xff; 8]);
        let result = decode_log(EventKind::EncryptedNote, &note_log(data, 1, 0));
        assert!(matches!(result, Err(EventSyncError::Decode(_))));
    }

    #[test]
    fn test_huge_bytes_length_is_decode_error() {
        let mut data = word(32).to_vec();
        data.extend_from_slice(&[0xff; 32]);
        data.extend_from_slice(&[0xde, 0xad]);
        let result = decode_log(EventKind::EncryptedNote, &note_log(data, 1, 0));
        assert!(matches!(result, Err(EventSyncError::Decode(_))));

        let mut data = word(32).to_vec();
        data.extend_from_slice(&word(u64::from(u32::MAX)));
        let result = decode_log(EventKind::EncryptedNote, &note_log(data, 1, 0));
        assert!(matches!(result, Err(EventSyncError::Decode(_))));
    }

    #[test]
    fn test_removed_logs_skipped_and_sorted() {
        let data = encode(&[Token::Bytes(vec![0xff])]);
        let mut removed = note_log(data.clone(), 1, 1);
        removed.removed = Some(true);
        let logs = vec![note_log(data.clone(), 2, 0), removed, note_log(data, 1, 0)];
        let events = decode_logs(EventKind::EncryptedNote, logs).unwrap();
        let blocks: Vec<_> = events.iter().map(Event::block_number).collect();
        assert_eq!(blocks, vec![1, 2]);
    }
}
