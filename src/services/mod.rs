pub mod cloud_sync;
pub mod documents;
pub mod resolve;
pub mod writes;
