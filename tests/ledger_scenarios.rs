//! End-to-end ledger behaviour: mining, balances, tampering and interchange.

use hashledger::blockchain::{Blockchain, LedgerSnapshot};
use hashledger::error::LedgerError;
use hashledger::transaction::REWARD_SENDER;

fn ledger(difficulty: u32, reward: f64) -> Blockchain {
    Blockchain::new(difficulty, reward).expect("Failed to create ledger")
}

/// Export `chain`, apply `edit`, import into a fresh ledger and validate it.
fn tampered(chain: &Blockchain, edit: impl FnOnce(&mut LedgerSnapshot)) -> bool {
    let mut snapshot = chain.export();
    edit(&mut snapshot);
    let mut copy = ledger(1, 10.0);
    copy.import(snapshot).unwrap();
    copy.validate()
}

#[test]
fn test_alice_bob_charlie_scenario() {
    let mut chain = ledger(2, 10.0);
    chain.submit_transaction("Alice", "Bob", 50.0);
    chain.submit_transaction("Bob", "Charlie", 30.0);
    let block = chain.mine_pending("M1").unwrap();

    assert!(block.hash.starts_with("00"));
    assert_eq!(block.transactions.len(), 3);
    assert_eq!(block.transactions[2].sender, REWARD_SENDER);

    assert_eq!(chain.balance_of("Alice"), -50.0);
    assert_eq!(chain.balance_of("Bob"), 20.0);
    assert_eq!(chain.balance_of("Charlie"), 30.0);
    assert_eq!(chain.balance_of("M1"), 10.0);

    let stats = chain.stats();
    assert_eq!(stats.total_blocks, 2);
    assert_eq!(stats.pending_transactions, 0);
    assert!(chain.validate());
}

#[test]
fn test_indexed_ledger_gives_same_answers() {
    let mut plain = ledger(1, 10.0);
    let mut indexed = ledger(1, 10.0).with_index(true);
    for chain in [&mut plain, &mut indexed] {
        chain.submit_transaction("Alice", "Bob", 50.0);
        chain.submit_transaction("Bob", "Charlie", 30.0);
        chain.mine_pending("M1").unwrap();
    }

    for address in ["Alice", "Bob", "Charlie", "M1", "Nobody"] {
        assert_eq!(indexed.balance_of(address), plain.balance_of(address));
    }
    let id = &indexed.blocks()[1].transactions[1].id;
    assert_eq!(
        indexed.find_transaction(id).map(|tx| tx.amount),
        Some(30.0)
    );
}

#[test]
fn test_balances_conserve_mining_rewards() {
    let mut chain = ledger(1, 7.5);
    let addresses = ["A", "B", "C", "M1", "M2"];

    chain.submit_transaction("A", "B", 12.0);
    chain.submit_transaction("B", "C", 4.25);
    chain.mine_pending("M1").unwrap();
    chain.submit_transaction("C", "A", 1.0);
    chain.submit_transaction("M1", "B", 3.0);
    chain.mine_pending("M2").unwrap();

    let total: f64 = addresses.iter().map(|a| chain.balance_of(a)).sum();
    let rewards = 2.0 * 7.5;
    // the sender sink "Blockchain" is outside the closed set
    assert!((total - rewards).abs() < 1e-9);
    assert_eq!(chain.balance_of(REWARD_SENDER), -rewards);
}

#[test]
fn test_empty_pool_leaves_chain_unchanged() {
    let mut chain = ledger(2, 10.0);
    assert_eq!(chain.mine_pending("M1"), Err(LedgerError::EmptyPendingPool));
    assert_eq!(chain.len(), 1);
    assert!(chain.validate());
}

#[test]
fn test_tampering_via_interchange_is_detected() {
    let mut chain = ledger(1, 10.0);
    chain.submit_transaction("Alice", "Bob", 50.0);
    chain.mine_pending("M1").unwrap();
    chain.submit_transaction("Bob", "Carol", 5.0);
    chain.mine_pending("M1").unwrap();

    assert!(tampered(&chain, |_| {}));
    assert!(!tampered(&chain, |s| s.chain[1].transactions[0].amount = 500.0));
    assert!(!tampered(&chain, |s| {
        s.chain[1].transactions[0].recipient = "Mallory".into()
    }));
    assert!(!tampered(&chain, |s| s.chain[2].timestamp += 1.0));
    assert!(!tampered(&chain, |s| s.chain[2].nonce += 1));
    assert!(!tampered(&chain, |s| s.chain[1].previous_hash = "f".repeat(64)));
    assert!(!tampered(&chain, |s| s.chain[1].transactions[0].sender = "Mallory".into()));
    assert!(!tampered(&chain, |s| s.chain[1].transactions[0].timestamp += 1.0));
    assert!(!tampered(&chain, |s| s.chain[1].transactions[0].id = "0".repeat(64)));
    assert!(!tampered(&chain, |s| s.chain[2].transactions[1].amount = 1000.0));
    assert!(!tampered(&chain, |s| s.chain[1].index = 5));
    assert!(!tampered(&chain, |s| s.chain[2].hash = "0".repeat(64)));
    assert!(!tampered(&chain, |s| {
        s.chain[1].transactions.pop();
    }));
    // a block re-hashed after editing still breaks its successor's link
    assert!(!tampered(&chain, |s| {
        s.chain[1].transactions[0].amount = 500.0;
        s.chain[1].hash = s.chain[1].calculate_hash();
    }));
}

#[test]
fn test_export_import_is_idempotent() {
    let mut chain = ledger(1, 10.0);
    chain.submit_transaction("Alice", "Bob", 0.1);
    chain.mine_pending("M1").unwrap();
    chain.submit_transaction("Bob", "Carol", 1.0 / 3.0);

    let json = chain.export_json().unwrap();
    let mut restored = ledger(3, 1.0);
    restored.import_json(&json).unwrap();

    assert_eq!(restored.export(), chain.export());
    assert_eq!(restored.export_json().unwrap(), json);
    assert_eq!(restored.difficulty(), 1);
    assert_eq!(restored.mining_reward(), 10.0);
    assert!(restored.validate());
}

#[test]
fn test_non_finite_amounts_survive_export_import() {
    let mut chain = ledger(1, 10.0);
    chain.submit_transaction("Alice", "Bob", f64::INFINITY);
    chain.mine_pending("M1").unwrap();
    chain.submit_transaction("Bob", "Carol", f64::NEG_INFINITY);

    let json = chain.export_json().unwrap();
    let mut restored = ledger(1, 10.0);
    restored.import_json(&json).unwrap();

    assert_eq!(restored.export(), chain.export());
    assert_eq!(restored.blocks()[1].transactions[0].amount, f64::INFINITY);
    assert!(restored.validate());
}

#[test]
fn test_malformed_import_leaves_ledger_untouched() {
    let mut chain = ledger(1, 10.0);
    chain.submit_transaction("Alice", "Bob", 2.0);
    let before = chain.export();

    for data in [
        "not json",
        r#"{"chain": [], "pending_transactions": [], "difficulty": 1, "mining_reward": 1.0}"#,
        r#"{"pending_transactions": [], "difficulty": 1, "mining_reward": 1.0}"#,
    ] {
        assert!(matches!(
            chain.import_json(data),
            Err(LedgerError::MalformedImport(_))
        ));
        assert_eq!(chain.export(), before);
    }
}

#[test]
fn test_mining_continues_after_import() {
    let mut source = ledger(1, 10.0);
    source.submit_transaction("Alice", "Bob", 5.0);
    source.mine_pending("M1").unwrap();

    let mut chain = ledger(1, 10.0);
    chain.import(source.export()).unwrap();
    chain.submit_transaction("Bob", "Carol", 1.0);
    let block = chain.mine_pending("M2").unwrap();

    assert_eq!(block.index, 2);
    assert_eq!(block.previous_hash, source.latest_block().hash);
    assert!(chain.validate());
}
