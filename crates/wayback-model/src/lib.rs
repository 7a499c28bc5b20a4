pub mod snapshot;
pub mod outcome;
pub mod tally;
pub mod storage;
pub mod range;

pub use snapshot::*;
pub use outcome::*;
pub use tally::*;
pub use storage::*;
pub use range::*;
