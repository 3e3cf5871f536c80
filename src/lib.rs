pub mod app;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod domain;
pub mod error;
pub mod error_log;
pub mod fasta;
pub mod fs_util;
pub mod links;
pub mod manifest;
pub mod ncbi;
pub mod output;
pub mod registry;
pub mod select;
pub mod store;
pub mod taxonomy;
