// src/infra/mod.rs

pub mod atomic;
pub mod config;
pub mod errors;
pub mod logger;
pub mod paths;
