pub mod algorithms;
pub mod enricher;
pub mod memory;
pub mod schema;
pub mod store;

pub use algorithms::*;
pub use enricher::*;
pub use memory::{GraphStats, NodeId, NodeRecord, RelRecord};
pub use schema::*;
pub use store::*;
