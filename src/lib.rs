//! # chefdesk
//!
//! A PDF summarizer and cooking assistant behind one small web server.
//!
//! Uploaded PDFs are stored in Azure Blob Storage and summarized by a hosted
//! multimodal model (title, author, three-sentence summary). The cooking
//! assistant is a chat agent with three tools over built-in lookup tables:
//! recipe search by ingredients, ingredient extraction from recipe text, and
//! nutrition lookup by dish.
//!
//! ## Architecture
//!
//! ```text
//!        ┌────────────────── HTTP (axum) ──────────────────┐
//!        │  /upload        /api/cooking/*        /         │
//!        └────┬──────────────────┬──────────────────────────┘
//!             │                  │
//!   ┌─────────▼────────┐   ┌─────▼────────┐     ┌──────────────┐
//!   │ BlobStore (Azure)│   │ CookingAgent │────▶│ ToolRegistry │
//!   │ DocumentModel    │   │ (ChatBackend)│     │ recipes /    │
//!   │ (Gemini)         │   └──────────────┘     │ ingredients /│
//!   └──────────────────┘                        │ nutrition    │
//!                                               └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=...  GEMINI_API_KEY=...
//! export AZURE_STORAGE_CONN="UseDevelopmentStorage=true"
//! chefdesk serve
//! chefdesk recipes --ingredients tomato,garlic --cuisine italian
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed errors |
//! | [`models`] | Core data types |
//! | [`catalog`] | Built-in recipe and nutrition tables |
//! | [`recipes`] | Recipe matching by ingredients |
//! | [`ingredients`] | Keyword-based ingredient extraction |
//! | [`nutrition`] | Nutrition lookup |
//! | [`traits`] | Function-calling tools and their registry |
//! | [`document`] | PDF summarization via Gemini |
//! | [`chat`] | Streaming chat completions |
//! | [`agent`] | The cooking agent and its lazy singleton |
//! | [`storage`] | Azure Blob Storage uploads |
//! | [`page`] | HTML page rendering |
//! | [`server`] | HTTP server |

pub mod agent;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod document;
pub mod error;
pub mod ingredients;
pub mod models;
pub mod nutrition;
pub mod page;
pub mod recipes;
pub mod server;
pub mod storage;
pub mod traits;
