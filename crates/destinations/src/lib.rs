//! Upload destinations for the relay pipeline.
//!
//! Two destination families are supported behind one contract:
//!
//! - **Gofile**: server discovery, multipart `POST` upload.
//! - **Buzzheavier**: no discovery, raw-body `PUT` to a name-derived URL.
//!
//! [`DestinationResolver`] picks a destination once per run and never
//! fails: discovery errors degrade to a fixed fallback server.
//! [`UploadClient`] streams a body to the resolved destination and parses
//! the family-specific completion response.

pub mod client;
pub mod error;
pub mod resolver;
pub mod response;
pub mod types;

pub use client::UploadClient;
pub use error::DestinationError;
pub use resolver::DestinationResolver;
pub use response::{ParseFailure, UploadResponseParser, parser_for};
pub use types::{
    Destination, DestinationFamily, DestinationProfile, Endpoints, Reachability, UploadOutcome,
};
