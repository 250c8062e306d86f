//! Pagination module
//!
//! Cursor-based pagination over the remote query API.
//!
//! # Overview
//!
//! - `PageSource` - the two remote calls: run a query, follow a cursor
//! - `QueryClient` - HTTP implementation of `PageSource`
//! - `pages` - lazy stream of pages that stops once no cursor remains

mod client;
mod types;

pub use client::{pages, PageSource, QueryClient, DEFAULT_API_VERSION};
pub use types::{NextPage, Page};
