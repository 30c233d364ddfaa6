//! # escape-ngg
//!
//! Migrates NextGen Gallery (NGG) shortcode galleries embedded in WordPress
//! posts into native `[gallery]` shortcodes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ ContentStore │──▶│   Migrator   │◀──│ LegacyStore  │
//! │ posts/meta   │◀──│ select,      │   │ ngg_gallery  │
//! └──────────────┘   │ resolve,     │   │ ngg_pictures │
//!                    │ import,      │   └──────────────┘
//!                    │ rewrite      │
//!                    └──────┬───────┘
//!                           ▼
//!                   ┌───────────────┐
//!                   │ MediaImporter │
//!                   │ REST /media   │
//!                   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Posts, attachments, legacy gallery rows |
//! | [`options`] | Command-line options and their validators |
//! | [`gallery`] | Gallery id extraction and lookup |
//! | [`marker`] | Correlation markers for sideloaded attachments |
//! | [`shortcode`] | Native shortcode building and body rewriting |
//! | [`store`] | Collaborator traits and MySQL/REST/in-memory backends |
//! | [`migrate`] | The migration driver |
//! | [`progress`] | Progress reporting |
//! | [`status`] | Remaining-work and connectivity report |
//! | [`db`] | Database connection |
//! | [`logging`] | Tracing setup |

pub mod config;
pub mod db;
pub mod gallery;
pub mod logging;
pub mod marker;
pub mod migrate;
pub mod models;
pub mod options;
pub mod progress;
pub mod shortcode;
pub mod status;
pub mod store;
