pub mod client;
pub mod error;
pub mod token;

pub use client::{RadioApiClient, SearchResult, VoteDirection};
pub use error::{ApiError, Result};
pub use token::{StaticTokenProvider, TokenProvider};
