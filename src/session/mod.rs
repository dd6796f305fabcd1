// src/session/mod.rs — Authenticated session lifecycle
//
// Login is a small state machine driven over plain reqwest: redirects are
// followed by hand so that every Set-Cookie along the chain lands in the
// jar and a bounce to the sign-in page is observable. The resulting
// Session is an explicit value; nothing here holds ambient login state.

pub mod cookies;
pub mod page;
pub mod store;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, LOCATION, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::infra::config::{AccountConfig, SiteConfig};
use crate::infra::errors::{AuthError, FetchError, SourceError, StoreError};
use crate::slots::Listing;
use cookies::CookieJar;
use page::{extract_csrf_token, is_captcha_page, is_login_page_for};
use store::SessionStore;

const MAX_REDIRECTS: usize = 10;
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";
const LANGUAGE: &str = "ja,en-US;q=0.9,en;q=0.8";
const SUBMIT_LABEL: &str = "ログイン";

/// Where a Session came from. Decides whether a rejection earns a re-login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionOrigin {
    /// Loaded from disk; may have been revoked server-side.
    #[default]
    Restored,
    /// Produced by a login during this process.
    Fresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub cookies: CookieJar,
    pub csrf_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub origin: SessionOrigin,
}

impl Session {
    /// A freshly authenticated session valid for `ttl`.
    pub fn new(
        cookies: CookieJar,
        csrf_token: Option<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            cookies,
            csrf_token,
            created_at: now,
            expires_at: now + ttl,
            origin: SessionOrigin::Fresh,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Unexpired and carrying at least one cookie.
    pub fn is_usable(&self) -> bool {
        !self.is_expired() && !self.cookies.is_empty()
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl From<&AccountConfig> for Credentials {
    fn from(account: &AccountConfig) -> Self {
        Self::new(account.email.clone(), account.password.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Login progress. `Failed` is reachable from every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    FetchingLoginPage,
    TokenExtracted,
    Submitting,
    Authenticated,
    Failed,
}

struct LoginFlow {
    state: LoginState,
}

impl LoginFlow {
    fn new() -> Self {
        Self {
            state: LoginState::Unauthenticated,
        }
    }

    fn advance(&mut self, next: LoginState) {
        tracing::debug!("Login: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        tracing::debug!("Login: {:?} -> Failed ({})", self.state, err);
        self.state = LoginState::Failed;
        err
    }
}

/// The end of a redirect chain.
struct FinalResponse {
    url: Url,
    status: StatusCode,
    content_type: String,
    body: String,
    /// Some hop redirected to the sign-in path.
    hit_login: bool,
}

pub struct SessionManager {
    client: Client,
    site: SiteConfig,
    store: SessionStore,
    submit_delay: (Duration, Duration),
}

impl SessionManager {
    pub fn new(site: SiteConfig, store: SessionStore) -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(site.timeout_secs))
            .user_agent(site.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            site,
            store,
            submit_delay: (Duration::from_secs(1), Duration::from_secs(2)),
        })
    }

    /// Pause between reading the login form and submitting it.
    pub fn with_submit_delay(mut self, min: Duration, max: Duration) -> Self {
        self.submit_delay = (min, max);
        self
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Perform a full login and persist the resulting session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let mut flow = LoginFlow::new();
        let mut jar = CookieJar::new();
        let login_url = self.site.login_url();

        tracing::info!("Logging in as {}", credentials.email);
        flow.advance(LoginState::FetchingLoginPage);

        let request = self.client.get(&login_url).header(ACCEPT, HTML_ACCEPT);
        let form_page = self
            .send_following(request, &mut jar)
            .await
            .map_err(|e| flow.fail(AuthError::NetworkFailure(e)))?;

        if is_captcha_page(&form_page.body) {
            return Err(flow.fail(AuthError::CaptchaDetected));
        }
        if !form_page.status.is_success() {
            return Err(flow.fail(AuthError::NetworkFailure(format!(
                "login page returned HTTP {}",
                form_page.status.as_u16()
            ))));
        }
        let Some(token) = extract_csrf_token(&form_page.body) else {
            return Err(flow.fail(AuthError::TokenNotFound));
        };
        flow.advance(LoginState::TokenExtracted);

        let (min, max) = self.submit_delay;
        let delay = crate::util::random_duration_between(min, max);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        flow.advance(LoginState::Submitting);
        let form = [
            ("authenticity_token", token.as_str()),
            ("user[email]", credentials.email.as_str()),
            ("user[password]", credentials.password.as_str()),
            ("user[remember_me]", "1"),
            ("commit", SUBMIT_LABEL),
        ];
        let request = self
            .client
            .post(&login_url)
            .header(ACCEPT, HTML_ACCEPT)
            .header(REFERER, login_url.as_str())
            .form(&form);
        let landing = self
            .send_following(request, &mut jar)
            .await
            .map_err(|e| flow.fail(AuthError::NetworkFailure(e)))?;

        if is_captcha_page(&landing.body) {
            return Err(flow.fail(AuthError::CaptchaDetected));
        }
        if landing.status.is_server_error() {
            return Err(flow.fail(AuthError::NetworkFailure(format!(
                "login submit returned HTTP {}",
                landing.status.as_u16()
            ))));
        }
        if matches!(
            landing.status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT
        ) {
            return Err(flow.fail(AuthError::NetworkFailure(format!(
                "login submit returned HTTP {}",
                landing.status.as_u16()
            ))));
        }
        let on_login_path = landing.url.path() == self.site.login_path;
        if on_login_path
            || is_login_page_for(&landing.body, &self.site.login_path)
            || !landing.status.is_success()
        {
            return Err(flow.fail(AuthError::CredentialsRejected));
        }
        if jar.is_empty() {
            tracing::warn!("Login succeeded but the site set no cookies");
        }

        flow.advance(LoginState::Authenticated);
        let ttl = self.site.session_ttl();
        let session = Session::new(jar, Some(token), Utc::now(), ttl);
        tracing::info!(
            cookies = session.cookies.len(),
            "Login successful; session valid until {}",
            session.expires_at.format("%Y-%m-%d %H:%M UTC")
        );

        if let Err(e) = self.persist(&session) {
            tracing::warn!("Failed to persist session: {}", e);
        }
        Ok(session)
    }

    /// Fetch the raw availability payload for `listing`.
    pub async fn fetch(&self, session: &Session, listing: &Listing) -> Result<Value, FetchError> {
        let url = self.site.api_url(listing.id());
        tracing::debug!(listing = listing.id(), "GET {}", url);

        let mut jar = session.cookies.clone();
        let request = self.client.get(&url).header(ACCEPT, JSON_ACCEPT);
        let response = self
            .send_following(request, &mut jar)
            .await
            .map_err(|message| FetchError::Network {
                url: url.clone(),
                message,
            })?;

        if response.hit_login || response.url.path() == self.site.login_path {
            return Err(FetchError::LoginRequired);
        }

        let looks_html = response.content_type.contains("text/html")
            || response.body.trim_start().starts_with('<');
        if looks_html {
            if is_captcha_page(&response.body) {
                return Err(FetchError::CaptchaDetected);
            }
            if is_login_page_for(&response.body, &self.site.login_path) {
                return Err(FetchError::LoginRequired);
            }
        }

        match response.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::LoginRequired)
            }
            s if !s.is_success() => {
                return Err(FetchError::Status {
                    status: s.as_u16(),
                    url,
                })
            }
            _ => {}
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| FetchError::InvalidPayload(e.to_string()))
    }

    pub fn persist(&self, session: &Session) -> Result<(), StoreError> {
        self.store.save(session)
    }

    /// A stored session that is still usable, if any.
    pub fn load(&self) -> Option<Session> {
        match self.store.load() {
            Ok(Some(session)) if session.is_usable() => {
                tracing::debug!(
                    "Restored session from {} (expires {})",
                    self.store.path().display(),
                    session.expires_at
                );
                Some(session)
            }
            Ok(Some(_)) => {
                tracing::debug!("Stored session is expired or empty; ignoring");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not read stored session: {}", e);
                None
            }
        }
    }

    /// Forget the stored session.
    pub fn invalidate(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!("Failed to remove stored session: {}", e);
        }
    }

    /// Reuse a stored session when possible, otherwise log in.
    pub async fn ensure_session(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        if let Some(session) = self.load() {
            tracing::info!("Using saved session");
            return Ok(session);
        }
        self.login(credentials).await
    }

    /// Fetch with a single bounded re-login.
    ///
    /// A restored session that the server rejects is discarded and replaced
    /// by one fresh login, then the fetch is retried once. A fresh session
    /// that is rejected is fatal. A captcha anywhere is fatal.
    pub async fn fetch_authenticated(
        &self,
        session: &mut Session,
        credentials: &Credentials,
        listing: &Listing,
    ) -> Result<Value, SourceError> {
        match self.fetch(session, listing).await {
            Err(FetchError::LoginRequired) => {}
            Err(FetchError::CaptchaDetected) => return Err(AuthError::CaptchaDetected.into()),
            other => return other.map_err(SourceError::from),
        }

        if session.origin == SessionOrigin::Fresh {
            tracing::error!("Freshly established session was rejected");
            return Err(AuthError::SessionRejected.into());
        }

        tracing::warn!("Stored session rejected; logging in again");
        self.invalidate();
        *session = self.login(credentials).await?;

        match self.fetch(session, listing).await {
            Err(FetchError::LoginRequired) => Err(AuthError::SessionRejected.into()),
            Err(FetchError::CaptchaDetected) => Err(AuthError::CaptchaDetected.into()),
            other => other.map_err(SourceError::from),
        }
    }

    /// Send `request`, then follow redirects by hand, capturing cookies at
    /// every hop. Transport failures are reported as a message.
    async fn send_following(
        &self,
        request: RequestBuilder,
        jar: &mut CookieJar,
    ) -> Result<FinalResponse, String> {
        let origin = Url::parse(&self.site.base_url).map_err(|e| e.to_string())?;
        let mut request = with_cookies(request, jar);
        let mut hit_login = false;

        for _ in 0..=MAX_REDIRECTS {
            let response = request
                .header(ACCEPT_LANGUAGE, LANGUAGE)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            jar.absorb(response.headers());

            let url = response.url().clone();
            let status = response.status();

            let location = status
                .is_redirection()
                .then(|| response.headers().get(LOCATION))
                .flatten()
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let Some(location) = location else {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                let body = response.text().await.map_err(|e| e.to_string())?;
                return Ok(FinalResponse {
                    url,
                    status,
                    content_type,
                    body,
                    hit_login,
                });
            };

            let next = url.join(&location).map_err(|e| e.to_string())?;
            tracing::debug!("Redirect {} -> {}", status.as_u16(), next);
            if next.path() == self.site.login_path {
                hit_login = true;
            }

            let next_request = self.client.get(next.clone());
            request = if same_origin(&next, &origin) {
                with_cookies(next_request, jar)
            } else {
                next_request
            };
        }

        Err(format!("too many redirects (>{MAX_REDIRECTS})"))
    }
}

fn with_cookies(request: RequestBuilder, jar: &CookieJar) -> RequestBuilder {
    match jar.header_value() {
        Some(value) => request.header(COOKIE, value),
        None => request,
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let mut jar = CookieJar::new();
        jar.insert("s", "1");
        let live = Session::new(jar.clone(), None, now, chrono::Duration::hours(1));
        assert!(live.is_usable());
        assert_eq!(live.origin, SessionOrigin::Fresh);

        let dead = Session::new(jar, None, now - chrono::Duration::hours(3), chrono::Duration::hours(1));
        assert!(dead.is_expired());
        assert!(!dead.is_usable());
    }

    #[test]
    fn test_empty_jar_not_usable() {
        let s = Session::new(CookieJar::new(), None, Utc::now(), chrono::Duration::hours(1));
        assert!(!s.is_usable());
    }

    #[test]
    fn test_origin_not_serialized() {
        let s = Session::new(CookieJar::new(), None, Utc::now(), chrono::Duration::hours(1));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("origin"));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.origin, SessionOrigin::Restored);
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let c = Credentials::new("me@example.com", "hunter2");
        let dbg = format!("{c:?}");
        assert!(dbg.contains("me@example.com"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn test_login_flow_states() {
        let mut flow = LoginFlow::new();
        flow.advance(LoginState::FetchingLoginPage);
        assert_eq!(flow.state, LoginState::FetchingLoginPage);
        let err = flow.fail(AuthError::TokenNotFound);
        assert_eq!(err, AuthError::TokenNotFound);
        assert_eq!(flow.state, LoginState::Failed);
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://omakase.in/a").unwrap();
        assert!(same_origin(&a, &Url::parse("https://omakase.in:443/b").unwrap()));
        assert!(!same_origin(&a, &Url::parse("https://evil.example/").unwrap()));
        assert!(!same_origin(&a, &Url::parse("http://omakase.in/").unwrap()));
    }
}
