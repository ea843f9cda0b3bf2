pub mod documents;
pub mod estates;
pub mod journal;
pub mod tasks;
