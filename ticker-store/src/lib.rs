//! Persistence layer: the `Store` trait, its `sqlx`/Postgres implementation,
//! and an in-memory test double. No other workspace crate talks to a
//! database directly.

pub mod memory;
pub mod pg;
mod scale;
pub mod store;

pub use memory::InMemoryStore;
pub use pg::PgStore;
pub use scale::{from_scaled, from_scaled_opt, to_scaled, to_scaled_opt};
pub use store::Store;
