#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Overview
//!
//! A request goes through four steps, each its own module:
//!
//! 1. **Normalize** - loosely-typed [`RawParams`] become validated [`Parameters`]
//! 2. **Open** - a [`Transport`](client::Transport) starts the exchange and
//!    returns a [`PendingRequest`]
//! 3. **Settle** - the first of load, error, timeout, abort or remote abort
//!    wins and becomes a [`Response`]
//! 4. **Materialize** - pipeline stages move the body forward:
//!    [`to_complete`], [`to_string`], [`from_json`], then the assertions
//!    [`only_ok`] and [`only_complete`]
//!
//! Every reason produces the same [`Response`] shape. A 404 is a response,
//! not an error; callers opt into treating it as one.
//!
//! ## Client Usage
//!
//! ```ignore
//! use unifetch::{only_ok, Client, RawParams};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new()?;
//!     let response = client
//!         .fetch_json(
//!             RawParams::new("http://localhost:3000/items")
//!                 .query("page", 2i64)
//!                 .timeout_ms(5_000),
//!         )
//!         .await?;
//!     let response = only_ok(response)?;
//!     println!("{:?}", response.body.as_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[params]** - Parameter normalization and JSON encoding
//! - **[protocol]** - Header and query codecs, content-type constants
//! - **[client]** - Client, transports and middleware
//! - **[response]** - Response value, lifecycle and body pipeline
//! - **[error]** - Error types and result handling

pub mod client;
pub mod error;
pub mod params;
pub mod protocol;
pub mod response;

pub use client::{Client, ClientConfig, TransportKind};
pub use error::{Error, ResponseError, Result, ValidationError};
pub use params::{normalize, params_to_json, Parameters, RawParams, RequestBody};
pub use protocol::{HeaderFields, HeaderValue, QueryValue};
pub use response::{
    from_json, from_json_if_json, only_complete, only_ok, to_complete, to_string, Body,
    PendingRequest, Reason, RequestHandle, Response,
};
