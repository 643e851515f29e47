pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod collector;
pub mod config;
pub mod data_models;
pub mod error;
pub mod fetcher;
pub mod qualifier;
pub mod query;
pub mod retry;
pub mod search;
