pub mod local;
pub mod remote;

pub use local::{connect, connect_in_memory, Db};
