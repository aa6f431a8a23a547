//! src/solana/mod.rs

pub mod detection;
pub mod engine;
pub mod factory;
pub mod normalize;
pub mod pool_store;
pub mod publisher;

pub use engine::SolanaArbitrageEngine;
pub use factory::OpportunityFactory;
pub use pool_store::PoolStore;
pub use publisher::OpportunityPublisher;
