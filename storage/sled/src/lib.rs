pub mod database;
pub mod engine;
pub mod error;

pub use engine::SledStore;
pub use error::SledStoreError;
