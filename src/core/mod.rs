//! Shared infrastructure

pub mod cache;

pub use cache::CacheManager;
