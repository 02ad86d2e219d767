//! Core library for the `weatherboard` CLI.
//!
//! This crate defines:
//! - Configuration handling (API key, endpoint, data file location)
//! - A weather fetch client with a typed failure taxonomy
//! - A persistent high-score store on top of SQLite
//!
//! It is used by `weatherboard-cli`, but can also be reused by other front ends.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use client::{FetchClient, HttpTransport, ReqwestTransport};
pub use config::{Config, ConfigProvider};
pub use error::{FetchError, StoreError};
pub use model::{
    DEFAULT_LEVEL, DEFAULT_LIMIT, Measurements, ScoreRecord, WeatherCondition, WeatherRecord,
};
pub use store::RecordStore;
