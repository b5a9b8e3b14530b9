//! Async client for the Compass school portal.
//!
//! The portal authenticates through a form-based login endpoint that
//! issues a `cpssid_*` session cookie, and serves data from JSON service
//! endpoints plus authenticated binary downloads. [`CompassClient`] is
//! the entry point; it owns a shared [`Session`] that handles login,
//! lazy expiry detection and automatic renewal.
//!
//! ```no_run
//! use compass_edu::{CompassClient, NewsFeedQuery};
//!
//! # async fn run() -> compass_edu::Result<()> {
//! let client = CompassClient::new("https://myschool.compass.education")?;
//! client.session().authenticate("user.name", "secret").await?;
//!
//! let news = client
//!     .get_news_feed_items_by_activity_id(789, NewsFeedQuery::default())
//!     .await?;
//! for item in &news {
//!     println!("{}: {}", item.id, item.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod files;
pub mod session;
pub mod types;

pub use client::{CompassClient, NewsFeedQuery};
pub use error::{AuthFailure, Error, Result};
pub use files::{FileAssetData, FileDownload, FileReference};
pub use session::Session;
pub use types::{
    ChronicleRating, Location, NewsItem, NewsItemCustomGroupTargets, NewsItemGroupTarget,
    NewsItemSender,
};
