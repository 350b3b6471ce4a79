// src/services/mod.rs

pub mod cache;
pub mod metrics;
pub mod payout;
pub mod trends;
pub mod validators;
