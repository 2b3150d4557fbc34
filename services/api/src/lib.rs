pub mod adapters;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod web;
