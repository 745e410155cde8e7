pub mod config;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod judge;
pub mod model;
pub mod progress;
pub mod query;
pub mod safety;
pub mod sandbox;
pub mod seed;
pub mod storage;
pub mod validate;
