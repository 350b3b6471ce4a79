// src/models/mod.rs

pub mod dataset;
pub mod ledger;
pub mod payout;
