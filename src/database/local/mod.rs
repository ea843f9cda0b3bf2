pub mod database;
pub mod documents;
pub mod estates;
pub mod guidance;
pub mod journal;
pub mod sync_state;
pub mod tasks;

pub use database::{connect, connect_in_memory, Db};
