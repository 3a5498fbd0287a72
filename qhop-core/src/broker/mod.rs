mod errors;
pub use errors::{BrokerError, DrainError, Result};

mod client;
pub use client::{BrokerClient, BrokerOp, QueueDeclaration};

mod memory_broker;
pub use memory_broker::MemoryBroker;
