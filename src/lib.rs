//! # docquery
//!
//! Multi-source document ingestion, vector indexing, and retrieval-augmented
//! question answering.
//!
//! Heterogeneous sources (JSON record files, CSV tables, PDF, DOCX and plain
//! text files, SQL query results, web pages) are normalized into
//! [`models::Document`]s, embedded, and appended to a named collection in a
//! persistent vector store. Questions are answered by retrieving the
//! top-K most similar documents and handing them to a completion model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Readers    │──▶│  Ingest     │──▶│ IndexBuilder│──▶│  SQLite  │
//! │ json/csv/.. │   │ (in order)  │   │ batch embed │   │ vectors  │
//! └─────────────┘   └─────────────┘   └─────────────┘   └────┬─────┘
//!        ▲                                                   │
//! ┌──────┴──────┐                        ┌───────────────────┤
//! │   Upload    │                        ▼                   ▼
//! │   intake    │                   ┌──────────┐       ┌──────────┐
//! └─────────────┘                   │   CLI    │       │   HTTP   │
//!                                   │  (docq)  │       │  /get    │
//!                                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docq init                      # create database and collection
//! docq admit                     # move validated uploads into the data folder
//! docq ingest                    # read all sources and index them
//! docq query "what changed in v2?"
//! docq serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`sources`] | Source descriptors and kinds |
//! | [`reader`] | Document reader trait and dispatch |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`ingest`] | Ingestion orchestration |
//! | [`upload`] | Upload intake |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`completion`] | Completion provider abstraction |
//! | [`prompt`] | Prompt assembly |
//! | [`store`] | Vector store trait, SQLite and in-memory stores |
//! | [`index`] | Index builder |
//! | [`query`] | Retrieval query engine |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Error types |

pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod query;
pub mod reader;
pub mod reader_csv;
pub mod reader_db;
pub mod reader_docx;
pub mod reader_json;
pub mod reader_pdf;
pub mod reader_text;
pub mod reader_web;
pub mod retry;
pub mod server;
pub mod sources;
pub mod store;
pub mod upload;
