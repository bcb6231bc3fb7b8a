mod client;
mod content;
mod hash;

pub use client::{
    BatchReport, Downloader, FetchProgress, FetchTransport, HttpTransport, DEFAULT_CONCURRENCY,
};
pub use content::ContentReference;
pub use hash::{ExpectedHash, HashAlgorithm};
