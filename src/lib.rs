// src/lib.rs

//! Shelfwatch Library
//!
//! Watches a product listing page, reports new listings, removals and price
//! changes, and keeps the last seen listing as a JSON snapshot.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
