//! Wire shapes and public records for the portal's data services.
//!
//! The reference-data and news-feed services wrap payloads in a `{d: ...}`
//! envelope and use a mix of camelCase and PascalCase field names. Raw
//! structs here mirror the wire exactly; the public records expose the
//! stable, renamed field sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// === Envelopes ===

/// The `{d: ...}` wrapper every service response carries.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) d: T,
}

/// Inner page object of the news-feed service (`{d: {data: [...]}}`).
#[derive(Debug, Deserialize)]
pub(crate) struct NewsFeedPage {
    pub(crate) data: Vec<RawNewsItem>,
}

// === Reference data ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLocation {
    pub(crate) id: u32,
    pub(crate) archived: bool,
    pub(crate) building: String,
    pub(crate) long_name: String,
    pub(crate) n: String,
    pub(crate) room_name: String,
}

/// A room or teaching space from the school's reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub id: u32,
    pub archived: bool,
    /// Name of the building the room is in.
    pub building: String,
    /// The long name of the building.
    pub description: String,
    /// The short name of the room.
    pub name: String,
    /// The long name of the room.
    pub long_name: String,
}

impl From<RawLocation> for Location {
    fn from(raw: RawLocation) -> Self {
        // The service's field names do not line up with their meaning:
        // `longName` carries the description, `n` the short room name and
        // `roomName` the long display name.
        Self {
            id: raw.id,
            archived: raw.archived,
            building: raw.building,
            description: raw.long_name,
            name: raw.n,
            long_name: raw.room_name,
        }
    }
}

/// A chronicle rating option from the school's reference data.
///
/// Deserialized straight off the wire; the `__type` discriminator some
/// responses carry is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChronicleRating {
    pub name: String,
    pub description: String,
    pub enum_value: i64,
    pub group: Option<i64>,
}

// === News feed ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawNewsItem {
    pub(crate) news_item_id: i64,
    pub(crate) title: String,
    #[serde(rename = "Content1")]
    pub(crate) content: String,
    pub(crate) post_date_time: DateTime<Utc>,
    pub(crate) email_sent_date: DateTime<Utc>,
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) created_by_admin: bool,
    pub(crate) locked: bool,
    pub(crate) news_item_custom_group_targets: RawCustomGroupTargets,
    #[serde(default)]
    pub(crate) news_item_group_targets: Vec<RawGroupTarget>,
    pub(crate) user_id: i64,
    pub(crate) user_name: String,
    pub(crate) user_image_url: String,
    #[serde(default)]
    pub(crate) attachments: Vec<RawAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawCustomGroupTargets {
    pub(crate) campus_ids: Vec<i64>,
    pub(crate) custom_group_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawGroupTarget {
    pub(crate) activity_ids: Vec<i64>,
    pub(crate) base_role: i64,
    pub(crate) campus_ids: Vec<i64>,
    pub(crate) form_groups: Vec<String>,
    pub(crate) future: bool,
    pub(crate) houses: Vec<String>,
    pub(crate) user_ids: Vec<i64>,
    pub(crate) year_levels: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawAttachment {
    pub(crate) asset_id: i64,
    pub(crate) file_asset_type: i64,
    pub(crate) is_image: bool,
    pub(crate) name: String,
    pub(crate) original_file_name: String,
    pub(crate) ui_link: String,
}

/// Campus/custom-group targeting of a news item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItemCustomGroupTargets {
    pub campus_ids: Vec<i64>,
    pub custom_group_ids: Vec<i64>,
}

impl From<RawCustomGroupTargets> for NewsItemCustomGroupTargets {
    fn from(raw: RawCustomGroupTargets) -> Self {
        Self {
            campus_ids: raw.campus_ids,
            custom_group_ids: raw.custom_group_ids,
        }
    }
}

/// A single audience rule a news item is targeted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItemGroupTarget {
    pub activity_ids: Vec<i64>,
    pub base_role: i64,
    pub campus_ids: Vec<i64>,
    pub form_groups: Vec<String>,
    pub future: bool,
    pub houses: Vec<String>,
    pub user_ids: Vec<i64>,
    pub year_levels: Vec<i64>,
}

impl From<RawGroupTarget> for NewsItemGroupTarget {
    fn from(raw: RawGroupTarget) -> Self {
        Self {
            activity_ids: raw.activity_ids,
            base_role: raw.base_role,
            campus_ids: raw.campus_ids,
            form_groups: raw.form_groups,
            future: raw.future,
            houses: raw.houses,
            user_ids: raw.user_ids,
            year_levels: raw.year_levels,
        }
    }
}

/// The staff member who posted a news item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItemSender {
    pub user_id: i64,
    pub user_name: String,
    /// Profile image, resolved to an absolute URL against the portal base.
    pub user_image_url: Url,
}

/// One item of an activity's news feed.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    /// Item body as HTML, exactly as the portal serves it.
    pub content: String,
    pub post_date: DateTime<Utc>,
    pub email_sent_date: DateTime<Utc>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_by_admin: bool,
    pub locked: bool,
    pub custom_group_targets: NewsItemCustomGroupTargets,
    pub group_targets: Vec<NewsItemGroupTarget>,
    pub sender: NewsItemSender,
    /// Downloadable attachments, bound to the same session as the client.
    pub attachments: Vec<crate::files::FileReference>,
}
