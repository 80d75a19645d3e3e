//! `kaart` is a library for looking up Dutch address suggestions.
//! "Hello world" example:
//! ```no_run
//! use kaart::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   // Reads the API key from the `KAART_API_KEY` env var
//!   let results = kaart::lookup("prins hendrikkade 33").await?;
//!   println!("{}", results[0].freeform_address);
//!   Ok(())
//! }
//! ```
//!
//! For more specific use-cases you can build a kaart client yourself,
//! using the `ClientBuilder` which can be used to
//! configure your own lookup client and grants full flexibility:
//!
//! ```no_run
//! use kaart::{ClientBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .api_key(String::from("my-api-key"))
//!       .limit(10_u32)
//!       .build()
//!       .client()?;
//!   let results = client.lookup("prins hendrikkade 33").await?;
//!   println!("{} suggestions", results.len());
//!   Ok(())
//! }
//! ```
//!
//! The client transparently recovers from upstream rate limiting: the
//! first lookup that hits HTTP 429 opens a delay window, every lookup
//! submitted during that window joins a single batch, and after the delay
//! the whole batch is retried in one wave. Each caller awaits its own
//! independent outcome. There is exactly one retry wave per window; see
//! [`Client`] for the full contract.

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

mod client;
mod ratelimit;
mod search;
mod types;

#[cfg(test)]
pub mod test_utils;

pub use client::lookup;
pub use client::{Client, ClientBuilder};
pub use client::{DEFAULT_BASE_URL, DEFAULT_RETRY_DELAY_SECS, DEFAULT_USER_AGENT};
pub use types::*;
