pub mod client;
pub mod idempotency;
pub mod subjects;

pub use client::{to_value, BusClient, BusError, InMemoryBusClient, NatsBusClient};
pub use idempotency::{IdempotencyKey, SeenSet};
