//! Corpus crawling: directory walk, path filtering, and per-file extraction.
//!
//! This crate provides:
//! - [`PathFilter`]: OR-combined regular expressions over full file paths
//! - [`Crawler`]: sequential walker that turns matching files into documents

pub mod engine;

pub use engine::{CrawlProgress, CrawlReport, Crawler, PathFilter, SilentCrawlProgress};
