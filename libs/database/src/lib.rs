//! MongoDB connectivity for the outfit finder.
//!
//! # Features
//!
//! - `config` - implements `core_config::FromEnv` for [`mongodb::MongoConfig`]
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017", "produit");
//! let client = connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```
//!
//! The [`common::retry`] helpers are shared with the HTTP clients of the
//! outfit domain so every upstream call backs off the same way.

pub mod common;
pub mod mongodb;
