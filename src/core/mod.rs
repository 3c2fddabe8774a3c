//! Store client, encoder pipeline, image writer and the pieces around them.

pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod output;
pub mod payload;
pub mod scan;
pub mod schemas;
pub mod store;
pub mod symbol;
pub mod writer;
