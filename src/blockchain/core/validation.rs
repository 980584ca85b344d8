use super::chain::Block;
use thiserror::Error;

/// First structural violation found while walking the chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("Invalid hash in block {index}: stored {stored}, computed {computed}")]
    HashMismatch {
        index: usize,
        stored: String,
        computed: String,
    },
    #[error("Invalid previous hash in block {index}: expected {expected}, found {found}")]
    BrokenLink {
        index: usize,
        expected: String,
        found: String,
    },
}

/// Walk blocks 1.. in order. Each block must hash to its stored hash and
/// point at its predecessor's stored hash. The genesis block has no
/// predecessor and is not re-hashed.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainViolation> {
    for (i, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = i + 1;

        let computed = current.calculate_hash();
        if current.hash != computed {
            return Err(ChainViolation::HashMismatch {
                index,
                stored: current.hash.clone(),
                computed,
            });
        }

        if current.previous_hash != previous.hash {
            return Err(ChainViolation::BrokenLink {
                index,
                expected: previous.hash.clone(),
                found: current.previous_hash.clone(),
            });
        }
    }
    Ok(())
}
