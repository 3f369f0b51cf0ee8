pub mod coordinator;
pub mod group;
pub mod slots;
pub mod topology;

pub use coordinator::{BroadcastFuture, Coordinator};
pub use group::ShardGroup;
pub use slots::SlotTable;
pub use topology::{StaticTopology, TopologyProvider};
