//! Optimistic local cache and sync layer for a shared recommendation board.

pub mod cache;
pub mod config;
pub mod error;
pub mod reco;
