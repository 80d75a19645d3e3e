#![allow(unreachable_pub)]

mod error;
mod options;
mod params;
pub(crate) mod response;
mod result;

pub use error::ErrorKind;
pub use options::CallOptions;
pub use params::{API_KEY_ENV, COUNTRY_SET, LookupParams, MAX_LIMIT};
pub use result::LookupResult;

/// The kaart `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
