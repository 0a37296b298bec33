//! Natural-language questions answered with generated SQL.
//!
//! A request flows through [`db::SchemaInspector`], the prompt composer and a
//! language model ([`llm::LlmManager`]), then [`db::QueryExecutor`].
//! [`chat::ChatService`] ties them together and decides which failures are
//! returned to the caller as errors and which as diagnostic responses.

pub mod chat;
pub mod config;
pub mod db;
pub mod llm;
pub mod util;
pub mod web;
