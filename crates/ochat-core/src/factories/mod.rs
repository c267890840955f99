pub mod client_factory;
pub mod storage_factory;

pub use client_factory::ClientFactory;
pub use storage_factory::{StorageFactory, Stores};
