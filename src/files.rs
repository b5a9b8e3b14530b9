//! Downloadable handles to portal file assets.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE};
use url::Url;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::RawAttachment;

/// Metadata of a file asset as the news-feed service reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAssetData {
    /// Asset id on the portal's servers.
    pub id: i64,
    pub file_asset_type: i64,
    pub is_image: bool,
    /// Display name (the link text).
    pub name: String,
    /// Name of the file as originally uploaded.
    pub original_file_name: String,
}

/// A downloaded file asset.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub data: Bytes,
    /// Filename from the `Content-Disposition` header.
    pub name: String,
    /// MIME type from the `Content-Type` header.
    pub content_type: String,
}

/// A lazily-downloadable handle to a remote attachment.
///
/// Holds a shared handle to the owning [`Session`] purely to obtain auth
/// headers; the reference never controls the session's lifetime and many
/// references may share one session.
#[derive(Debug, Clone)]
pub struct FileReference {
    url: Url,
    session: Arc<Session>,
    data: FileAssetData,
}

impl FileReference {
    /// Creates a file reference for an asset URL, resolved against the
    /// session's base URL.
    pub fn new(url: &str, session: Arc<Session>, data: FileAssetData) -> Result<Self> {
        let url = session
            .base_url()
            .join(url)
            .map_err(|err| Error::configuration(format!("Invalid asset URL {url:?}: {err}")))?;
        Ok(Self { url, session, data })
    }

    pub(crate) fn from_attachment(raw: RawAttachment, session: &Arc<Session>) -> Result<Self> {
        let url = session.base_url().join(&raw.ui_link).map_err(|err| {
            Error::invalid_response(format!("Invalid attachment link {:?}: {err}", raw.ui_link))
        })?;
        Ok(Self {
            url,
            session: Arc::clone(session),
            data: FileAssetData {
                id: raw.asset_id,
                file_asset_type: raw.file_asset_type,
                is_image: raw.is_image,
                name: raw.name,
                original_file_name: raw.original_file_name,
            },
        })
    }

    /// The absolute URL of the asset.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The asset id on the portal's servers.
    pub fn id(&self) -> i64 {
        self.data.id
    }

    /// The asset metadata reported by the news-feed service.
    pub fn data(&self) -> &FileAssetData {
        &self.data
    }

    /// Downloads the asset with the session's auth header attached.
    ///
    /// Session renewal is attempted first on a best-effort basis: if the
    /// renewal itself fails the download is still issued, and the request
    /// surfaces the real failure. Only a `200` response is accepted.
    pub async fn download(&self) -> Result<FileDownload> {
        if let Err(err) = self.session.ensure_authenticated().await {
            tracing::debug!(error = %err, "session renewal before download failed");
        }

        let mut request = self.session.http().get(self.url.clone());
        if let Some(header) = self.session.auth_header() {
            request = request.header(COOKIE, header);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::request_failed(status));
        }

        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_disposition)
            .ok_or_else(|| {
                Error::invalid_response("Response carries no usable Content-Disposition filename")
            })?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::invalid_response("Response carries no Content-Type header"))?;

        let data = response.bytes().await?;
        Ok(FileDownload {
            data,
            name,
            content_type,
        })
    }
}

/// Pulls the `filename=` parameter out of a `Content-Disposition` value.
fn file_name_from_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|part| {
        let (key, name) = part.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("filename") {
            Some(name.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}
