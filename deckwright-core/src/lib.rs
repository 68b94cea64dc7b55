#![doc = "deckwright-core: core logic library for deckwright."]

//! This crate holds the deck pipeline: ingestion, prompt construction, reply
//! normalization, regeneration, the deck/version store and export.
//! HTTP clients for the external services live in the `deckwright` CLI crate,
//! which implements the traits in [`contract`].
//!
//! # Usage
//! Build a [`generate::DeckGenerator`] around a [`contract::CompletionClient`],
//! feed the result into a [`store::DeckStore`], edit through the store and the
//! [`workflow`] helpers, then hand the store to an [`export::Exporter`].

pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod generate;
pub mod ingest;
pub mod model;
pub mod normalize;
pub mod prompt;
pub mod regenerate;
pub mod render;
pub mod store;
pub mod template;
pub mod workflow;
