pub mod chain;
pub mod snapshot;
pub mod state;
pub mod validation;

pub use chain::*;
pub use snapshot::*;
pub use state::*;
pub use validation::*;
