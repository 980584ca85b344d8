//! Transaction records and their content ids

pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_matches_reference_digest() {
        let tx = Transaction::new("Alice", "Bob", 50.0, 1700000000.5);
        assert_eq!(
            tx.id,
            "672042c1265abcbf725df5753746ea4758e2415d11fdb63199718ff9fd487420"
        );
    }

    #[test]
    fn test_reward_transaction() {
        let tx = Transaction::reward("M1", 10.0, 1700000001.25);
        assert_eq!(tx.sender, REWARD_SENDER);
        assert_eq!(tx.recipient, "M1");
        assert!(tx.is_reward());
        assert_eq!(
            tx.id,
            "fdac07b3ebf30b93193a2e03b5877315383e90954f3acdd8bc367416b0e28463"
        );
    }

    #[test]
    fn test_hash_is_stable() {
        let tx = Transaction::new("Alice", "Bob", 12.75, 1700000000.0);
        assert_eq!(tx.hash(), tx.hash());
        assert_eq!(tx.hash(), tx.id);
        assert!(tx.has_valid_id());
    }

    #[test]
    fn test_identical_fields_share_an_id() {
        let a = Transaction::new("Alice", "Bob", 5.0, 42.0);
        let b = Transaction::new("Alice", "Bob", 5.0, 42.0);
        assert_eq!(a.id, b.id);

        let c = Transaction::new("Alice", "Bob", 5.0, 43.0);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_no_field_validation() {
        // negative amounts and self-transfers are accepted at this layer
        let tx = Transaction::new("Alice", "Alice", -5.0, 1.0);
        assert_eq!(tx.amount, -5.0);
        assert_eq!(tx.sender, tx.recipient);
        assert!(tx.has_valid_id());
    }

    #[test]
    fn test_tampered_fields_invalidate_id() {
        let mut tx = Transaction::new("Alice", "Bob", 50.0, 1.0);
        tx.amount = 500.0;
        assert!(!tx.has_valid_id());
    }

    #[test]
    fn test_json_field_names() {
        let tx = Transaction::new("Alice", "Bob", 50.0, 1.0);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["sender"], "Alice");
        assert_eq!(json["recipient"], "Bob");
        assert_eq!(json["amount"], 50.0);
        assert_eq!(json["timestamp"], 1.0);
        assert_eq!(json["transaction_id"], tx.id.as_str());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_now_timestamp_is_recent() {
        let ts = now_timestamp();
        // 2023-01-01 in seconds
        assert!(ts > 1_672_531_200.0);
    }
}
