//! HTTP request handlers

pub mod admin;
pub mod generate;
pub mod health;
pub mod keys;
pub mod usage;
