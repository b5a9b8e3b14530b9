//! Facade client over the portal's data services.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::COOKIE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{Error, Result};
use crate::files::FileReference;
use crate::session::Session;
use crate::types::{
    ChronicleRating, Envelope, Location, NewsFeedPage, NewsItem, NewsItemSender, RawLocation,
    RawNewsItem,
};

const LOCATIONS_PATH: &str = "/Services/ReferenceDataCache.svc/GetAllLocations?sessionstate=readonly";
const CHRONICLE_RATINGS_PATH: &str = "/Services/ReferenceDataCache.svc/GetChronicleRatings";
const NEWS_FEED_PATH: &str = "/Services/NewsFeed.svc/GetActivityNewsFeedPaged?sessionstate=readonly";

/// Options for a news-feed page fetch.
#[derive(Debug, Clone, Copy)]
pub struct NewsFeedQuery {
    /// Return only the items strictly after the item with this id.
    pub since: Option<i64>,
    pub limit: u32,
    pub start: u32,
}

impl Default for NewsFeedQuery {
    fn default() -> Self {
        Self {
            since: None,
            limit: 10,
            start: 0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsFeedRequest {
    activity_id: i64,
    limit: u32,
    start: u32,
}

/// Client for a school-specific portal instance.
///
/// Composes a shared [`Session`] and exposes the domain operations;
/// authenticate through [`CompassClient::session`].
#[derive(Debug, Clone)]
pub struct CompassClient {
    session: Arc<Session>,
}

impl CompassClient {
    /// Creates a client for the given portal base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            session: Arc::new(Session::new(base_url)?),
        })
    }

    /// The session shared by this client and any file references it maps.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The normalized base URL requests are issued against.
    pub fn base_url(&self) -> &Url {
        self.session.base_url()
    }

    /// Fetches all locations at the school.
    ///
    /// Public-session endpoint; no authentication required. Response
    /// order is preserved.
    pub async fn get_all_locations(&self) -> Result<Vec<Location>> {
        let raw: Vec<RawLocation> = self
            .fetch_reference_data(LOCATIONS_PATH, "locations")
            .await?;
        Ok(raw.into_iter().map(Location::from).collect())
    }

    /// Fetches the available chronicle ratings.
    ///
    /// Response order is preserved.
    pub async fn get_chronicle_ratings(&self) -> Result<Vec<ChronicleRating>> {
        self.fetch_reference_data(CHRONICLE_RATINGS_PATH, "chronicle ratings")
            .await
    }

    /// Fetches a page of an activity's news feed.
    ///
    /// Requires a usable session: expired sessions are renewed first, and
    /// any failure to obtain a valid authorisation header is reported as
    /// [`Error::Unauthorised`].
    ///
    /// With `query.since` set, only the items strictly after the matching
    /// id are returned, in response order. If the id is not on the fetched
    /// page, the page is returned unfiltered rather than dropped.
    pub async fn get_news_feed_items_by_activity_id(
        &self,
        activity_id: i64,
        query: NewsFeedQuery,
    ) -> Result<Vec<NewsItem>> {
        if self.session.ensure_authenticated().await.is_err() {
            return Err(Error::Unauthorised);
        }
        let Some(header) = self.session.auth_header() else {
            return Err(Error::Unauthorised);
        };

        let url = self.session.endpoint(NEWS_FEED_PATH)?;
        let request = NewsFeedRequest {
            activity_id,
            limit: query.limit,
            start: query.start,
        };

        let response = self
            .session
            .http()
            .post(url)
            .header(COOKIE, header)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::request_failed(status));
        }

        let envelope: Envelope<NewsFeedPage> = response.json().await.map_err(|err| {
            Error::invalid_response(format!("Failed to decode news feed response: {err}"))
        })?;

        let mut items = Vec::with_capacity(envelope.d.data.len());
        for raw in envelope.d.data {
            items.push(self.map_news_item(raw)?);
        }
        Ok(items_since(items, query.since))
    }

    /// Fetches a `{d: [...]}` reference-data endpoint, accepting only 200.
    async fn fetch_reference_data<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &str,
    ) -> Result<Vec<T>> {
        let url = self.session.endpoint(path)?;
        let response = self.session.http().get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::request_failed(status));
        }

        let envelope: Envelope<Vec<T>> = response.json().await.map_err(|err| {
            Error::invalid_response(format!("Failed to decode {what} response: {err}"))
        })?;
        Ok(envelope.d)
    }

    fn map_news_item(&self, raw: RawNewsItem) -> Result<NewsItem> {
        let user_image_url = self
            .session
            .base_url()
            .join(&raw.user_image_url)
            .map_err(|err| {
                Error::invalid_response(format!(
                    "Invalid sender image link {:?}: {err}",
                    raw.user_image_url
                ))
            })?;

        let mut attachments = Vec::with_capacity(raw.attachments.len());
        for attachment in raw.attachments {
            attachments.push(FileReference::from_attachment(attachment, &self.session)?);
        }

        Ok(NewsItem {
            id: raw.news_item_id,
            title: raw.title,
            content: raw.content,
            post_date: raw.post_date_time,
            email_sent_date: raw.email_sent_date,
            start: raw.start,
            end: raw.end,
            created_by_admin: raw.created_by_admin,
            locked: raw.locked,
            custom_group_targets: raw.news_item_custom_group_targets.into(),
            group_targets: raw
                .news_item_group_targets
                .into_iter()
                .map(Into::into)
                .collect(),
            sender: NewsItemSender {
                user_id: raw.user_id,
                user_name: raw.user_name,
                user_image_url,
            },
            attachments,
        })
    }
}

/// Applies the `since` cut: everything up to and including the matching
/// id has been seen. An id that is not on the page leaves it untouched.
fn items_since(items: Vec<NewsItem>, since: Option<i64>) -> Vec<NewsItem> {
    let Some(since) = since else {
        return items;
    };
    match items.iter().position(|item| item.id == since) {
        Some(index) => items.into_iter().skip(index + 1).collect(),
        None => items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewsItemCustomGroupTargets;
    use chrono::{TimeZone, Utc};

    fn news_item(id: i64) -> NewsItem {
        let timestamp = Utc.with_ymd_and_hms(2019, 10, 5, 11, 32, 0).unwrap();
        NewsItem {
            id,
            title: format!("Item {id}"),
            content: String::new(),
            post_date: timestamp,
            email_sent_date: timestamp,
            start: timestamp,
            end: timestamp,
            created_by_admin: false,
            locked: false,
            custom_group_targets: NewsItemCustomGroupTargets {
                campus_ids: Vec::new(),
                custom_group_ids: Vec::new(),
            },
            group_targets: Vec::new(),
            sender: NewsItemSender {
                user_id: 1,
                user_name: "Test User".to_string(),
                user_image_url: Url::parse("https://test.compass.education/img.png").unwrap(),
            },
            attachments: Vec::new(),
        }
    }

    /// Test: a matching `since` id drops it and everything before it.
    #[test]
    fn test_items_since_drops_through_match() {
        let items = vec![news_item(1), news_item(2), news_item(3)];
        let remaining = items_since(items, Some(2));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 3);
    }

    /// Test: `since` matching the only item yields an empty page.
    #[test]
    fn test_items_since_single_match_is_empty() {
        let items = vec![news_item(1)];
        assert!(items_since(items, Some(1)).is_empty());
    }

    /// Test: an id absent from the page leaves the page unfiltered.
    #[test]
    fn test_items_since_unknown_id_keeps_page() {
        let items = vec![news_item(1), news_item(2)];
        let remaining = items_since(items, Some(99));
        assert_eq!(remaining.len(), 2);
    }

    /// Test: no `since` means no filtering.
    #[test]
    fn test_items_since_none_keeps_page() {
        let items = vec![news_item(1), news_item(2)];
        assert_eq!(items_since(items, None).len(), 2);
    }

    /// Test: query defaults match the service's paging defaults.
    #[test]
    fn test_news_feed_query_defaults() {
        let query = NewsFeedQuery::default();
        assert_eq!(query.since, None);
        assert_eq!(query.limit, 10);
        assert_eq!(query.start, 0);
    }
}
