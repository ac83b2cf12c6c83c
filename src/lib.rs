//! Translate MTool JSON exports from Japanese to English with the DeepL API.

pub mod config;
pub mod deepl;
pub mod filter;
pub mod mtool;
pub mod retry;
pub mod stats;
pub mod translator;
