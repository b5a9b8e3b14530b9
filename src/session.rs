//! Cookie-session lifecycle for the portal: login, liveness probing and
//! automatic renewal.
//!
//! The portal issues a `cpssid_*` session cookie from a form-based login
//! endpoint and expires it server-side without notice. Expiry is detected
//! lazily: a probe of the portal root either returns the page (valid) or
//! redirects to the login form (expired).

use std::fmt;
use std::sync::{Mutex, PoisonError};

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{AuthFailure, Error, Result};

/// Login form endpoint, relative to the portal base.
const LOGIN_PATH: &str = "/login.aspx?sessionstate=disabled";

/// Form field identifying the login button postback.
const EVENT_TARGET: &str = "button1";

/// Prefix of the session cookie issued on successful login.
const SESSION_COOKIE_PREFIX: &str = "cpssid_";

/// Prefix of the username echo cookie expected alongside the session cookie.
const USERNAME_COOKIE_PREFIX: &str = "username=";

/// Element id carrying the failure reason on the returned login page.
const ERROR_ELEMENT_SELECTOR: &str = "#username-error";

/// Portal copy for the login-attempt lockout. Exact-string matched;
/// best effort only, a copy change degrades to the unknown failure.
const LOCKOUT_COPY: &str = "Your account has been temporarily disabled due to a large number of \
                            login attempts. <br>Please wait a moment and try again.";

/// Portal copy for a rejected username/password pair.
const BAD_CREDENTIALS_COPY: &str = "Sorry - your username and/or password was incorrect.";

#[derive(Default)]
struct SessionState {
    username: Option<String>,
    password: Option<String>,
    auth_header: Option<String>,
}

/// Stateful holder of base URL, credentials and the current session cookie.
///
/// A session is shared (`Arc`) between the facade client and any file
/// references built from news-feed attachments; all of them observe a
/// renewed cookie after any successful re-login. Mutating operations are
/// serialized by a login gate so concurrent renewals cannot race.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    state: Mutex<SessionState>,
    /// Held across the login request; probes never take it.
    login_gate: tokio::sync::Mutex<()>,
}

impl Session {
    /// Creates a session for the given portal base URL.
    ///
    /// The URL must be absolute; it is stored in normalized form (the
    /// root path keeps its trailing slash). Redirect following is
    /// disabled on the underlying client: the login and probe protocols
    /// depend on observing `302` responses directly.
    pub fn new(base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(Error::configuration("A base URL is required"));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|err| Error::configuration(format!("Invalid base URL {trimmed:?}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "Base URL {trimmed:?} cannot carry request paths"
            )));
        }

        let http = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            http,
            base_url,
            state: Mutex::new(SessionState::default()),
            login_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The normalized base URL requests are issued against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The stored `name=value` session cookie, if a login ever succeeded.
    pub fn auth_header(&self) -> Option<String> {
        self.lock_state().auth_header.clone()
    }

    /// The username the session was last authenticated as.
    pub fn username(&self) -> Option<String> {
        self.lock_state().username.clone()
    }

    /// Logs in with the supplied credentials.
    ///
    /// On success the session cookie and the credentials are stored; the
    /// credentials are kept in memory only, for automatic renewal.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() {
            return Err(Error::configuration("A username is required"));
        }
        if password.is_empty() {
            return Err(Error::configuration("A password is required"));
        }

        let _gate = self.login_gate.lock().await;
        self.login(username, password).await
    }

    /// Whether the stored session cookie is currently accepted.
    ///
    /// Returns `false` without touching the network if no login ever
    /// succeeded. Otherwise probes the portal root: a `200` means the
    /// session is live, a redirect means it expired. The result is not
    /// cached; every call is one probe.
    pub async fn is_authenticated(&self) -> Result<bool> {
        let Some(header) = self.auth_header() else {
            return Ok(false);
        };

        let response = self
            .http
            .get(self.base_url.clone())
            .header(COOKIE, header)
            .send()
            .await?;

        let status = response.status();
        if !accepted(status) {
            return Err(Error::request_failed(status));
        }

        let live = status == StatusCode::OK;
        tracing::trace!(status = status.as_u16(), live, "session probe");
        Ok(live)
    }

    /// Ensures the session is usable, renewing it if the probe fails.
    ///
    /// A failed renewal surfaces to the caller; the session keeps its
    /// previous state and nothing is retried beyond the single re-login.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated().await? {
            return Ok(());
        }

        let (username, password) = {
            let state = self.lock_state();
            (state.username.clone(), state.password.clone())
        };
        let (Some(username), Some(password)) = (username, password) else {
            return Err(Error::configuration(
                "No stored credentials to renew the session",
            ));
        };

        tracing::debug!("session expired, renewing");
        let _gate = self.login_gate.lock().await;
        self.login(&username, &password).await
    }

    /// Resolves a request path (with optional query) against the base URL.
    pub(crate) fn endpoint(&self, path_and_query: &str) -> Result<Url> {
        self.base_url.join(path_and_query).map_err(|err| {
            Error::configuration(format!("Invalid request path {path_and_query:?}: {err}"))
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        let url = self.endpoint(LOGIN_PATH)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("__EVENTTARGET", EVENT_TARGET)
            .append_pair("username", username)
            .append_pair("password", password)
            .finish();

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !accepted(status) {
            return Err(Error::request_failed(status));
        }

        let cookies: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        let has_username_cookie = cookies
            .iter()
            .any(|cookie| cookie.starts_with(USERNAME_COOKIE_PREFIX));

        if status == StatusCode::FOUND && has_username_cookie {
            let Some(cookie) = cookies
                .iter()
                .find(|cookie| cookie.starts_with(SESSION_COOKIE_PREFIX))
            else {
                return Err(Error::Auth(AuthFailure::InvalidCredentials));
            };

            // Only the leading name=value pair is retained; attributes
            // such as expires/path/HttpOnly are not replayed.
            let header = session_cookie_pair(cookie).to_string();
            tracing::debug!(username, "login accepted");

            let mut state = self.lock_state();
            state.auth_header = Some(header);
            state.username = Some(username.to_string());
            state.password = Some(password.to_string());
            return Ok(());
        }

        // Not a cookie-bearing redirect: the portal re-served the login
        // page. The failure reason, if any, is in the page body.
        let page = response.text().await?;
        if page.is_empty() {
            return Err(Error::Auth(AuthFailure::Unknown));
        }
        Err(Error::Auth(classify_login_page(&page)))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Credentials and the cookie never appear in debug output.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("logged_in", &self.lock_state().auth_header.is_some())
            .finish_non_exhaustive()
    }
}

/// Range of statuses treated as a portal response rather than a failure.
fn accepted(status: StatusCode) -> bool {
    (200..=302).contains(&status.as_u16())
}

/// Extracts the `name=value` pair from a `Set-Cookie` value, dropping
/// cookie attributes after the first `;`.
fn session_cookie_pair(cookie: &str) -> &str {
    match cookie.find(';') {
        Some(end) => &cookie[..end],
        None => cookie,
    }
}

/// Maps the `username-error` element of a re-served login page onto a
/// failure kind. Exact-string classification of portal copy; anything
/// unrecognized is the unknown failure.
fn classify_login_page(page: &str) -> AuthFailure {
    let document = Html::parse_document(page);
    let Ok(selector) = Selector::parse(ERROR_ELEMENT_SELECTOR) else {
        return AuthFailure::Unknown;
    };
    let Some(element) = document.select(&selector).next() else {
        return AuthFailure::Unknown;
    };

    match element.inner_html().as_str() {
        LOCKOUT_COPY => AuthFailure::TooManyAttempts,
        BAD_CREDENTIALS_COPY => AuthFailure::InvalidCredentials,
        _ => AuthFailure::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: base URLs normalize to the trailing-slash form.
    #[test]
    fn test_base_url_normalization() {
        let session = Session::new("https://test.compass.education").unwrap();
        assert_eq!(
            session.base_url().as_str(),
            "https://test.compass.education/"
        );

        let session = Session::new("https://test.compass.education/").unwrap();
        assert_eq!(
            session.base_url().as_str(),
            "https://test.compass.education/"
        );
    }

    /// Test: missing or relative base URLs are configuration errors.
    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            Session::new(""),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Session::new("not a url"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Session::new("/relative/path"),
            Err(Error::Configuration(_))
        ));
    }

    /// Test: empty credentials are rejected before any request.
    #[tokio::test]
    async fn test_empty_credentials_rejected() {
        let session = Session::new("https://test.compass.education").unwrap();
        assert!(matches!(
            session.authenticate("", "secret").await,
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            session.authenticate("user", "").await,
            Err(Error::Configuration(_))
        ));
    }

    /// Test: probe short-circuits to `false` before any login.
    #[tokio::test]
    async fn test_probe_false_without_login() {
        let session = Session::new("https://test.compass.education").unwrap();
        assert!(!session.is_authenticated().await.unwrap());
        assert_eq!(session.auth_header(), None);
        assert_eq!(session.username(), None);
    }

    /// Test: cookie attributes are stripped from the stored pair.
    #[test]
    fn test_session_cookie_pair() {
        assert_eq!(
            session_cookie_pair(
                "cpssid_test=testToken123; expires=Sat, 05 Sep 2026 11:32:00 GMT; path=/; HttpOnly"
            ),
            "cpssid_test=testToken123"
        );
        assert_eq!(
            session_cookie_pair("cpssid_test=testToken123"),
            "cpssid_test=testToken123"
        );
    }

    /// Test: login-page classification branches on the exact portal copy.
    #[test]
    fn test_classify_login_page() {
        let incorrect = format!(
            "<!DOCTYPE html><html><body><span id=\"username-error\">{BAD_CREDENTIALS_COPY}</span></body></html>"
        );
        assert_eq!(
            classify_login_page(&incorrect),
            AuthFailure::InvalidCredentials
        );

        // The lockout copy embeds a <br>; a self-closing <br /> in the
        // served page serializes back to the same inner HTML.
        let lockout = "<!DOCTYPE html><html><body><span id=\"username-error\">\
                       Your account has been temporarily disabled due to a large number of \
                       login attempts. <br />Please wait a moment and try again.\
                       </span></body></html>";
        assert_eq!(classify_login_page(lockout), AuthFailure::TooManyAttempts);

        let empty =
            "<!DOCTYPE html><html><body><span id=\"username-error\"></span></body></html>";
        assert_eq!(classify_login_page(empty), AuthFailure::Unknown);

        let absent = "<!DOCTYPE html><html><body></body></html>";
        assert_eq!(classify_login_page(absent), AuthFailure::Unknown);

        let unrecognized = "<!DOCTYPE html><html><body>\
                            <span id=\"username-error\">Scheduled maintenance.</span>\
                            </body></html>";
        assert_eq!(classify_login_page(unrecognized), AuthFailure::Unknown);
    }

    /// Test: the accepted status range is 200 through 302 inclusive.
    #[test]
    fn test_accepted_status_range() {
        assert!(accepted(StatusCode::OK));
        assert!(accepted(StatusCode::FOUND));
        assert!(accepted(StatusCode::MOVED_PERMANENTLY));
        assert!(!accepted(StatusCode::SEE_OTHER));
        assert!(!accepted(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!accepted(StatusCode::CONTINUE));
    }
}
