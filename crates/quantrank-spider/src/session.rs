use crate::error::{Error, Result};
use crate::http::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, SET_COOKIE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A stateful session against the remote API.
///
/// The session is a single resource (cookies, rate limits); callers drive it sequentially.
/// `close` must persist whatever authentication state `open` needs to resume.
#[allow(async_fn_in_trait)]
pub trait SessionTransport {
    /// Establish the session and load `landing_url`.
    async fn open(&mut self, landing_url: &str) -> Result<()>;

    /// Issue a request inside the session.
    async fn send(&mut self, request: TransportRequest) -> Result<TransportResponse>;

    /// Tear the session down, persisting its state.
    async fn close(&mut self) -> Result<()>;
}

// state
// -------------------------------------------------------------------------------------------------

/// Session state carried across restarts, stored as JSON.
///
/// {
///     "user_agent": "Mozilla/5.0 ...",
///     "cookies": { "session_id": "..." },
///     "headers": { "accept-language": "en-US" }
/// }
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SessionState {
    pub user_agent: Option<String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl SessionState {
    /// Absorb one `Set-Cookie` header value (`name=value; Path=/; ...`).
    ///
    /// A cookie sent with `Max-Age<=0` or an `Expires` in the past is removed from the jar.
    pub fn absorb_cookie(&mut self, set_cookie: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        if parts.any(cookie_expired) {
            trace!("cookie {name} expired");
            self.cookies.remove(name);
        } else {
            self.cookies.insert(name.to_string(), value.trim().to_string());
        }
    }

    /// `Cookie` request header for the current jar.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }
}

fn cookie_expired(attribute: &str) -> bool {
    let Some((key, value)) = attribute.split_once('=') else {
        return false;
    };
    let value = value.trim();
    match key.trim().to_ascii_lowercase().as_str() {
        "max-age" => value.parse::<i64>().is_ok_and(|age| age <= 0),
        "expires" => chrono::DateTime::parse_from_rfc2822(value)
            .is_ok_and(|expires| expires.with_timezone(&chrono::Utc) < chrono::Utc::now()),
        _ => false,
    }
}

// http session
// -------------------------------------------------------------------------------------------------

/// [`SessionTransport`] over a [`reqwest`] client, with cookies & headers kept in a state file.
pub struct HttpSession {
    state_file: String,
    user_agent: Option<String>,
    timeout: Duration,
    state: SessionState,
    client: Option<HttpClient>,
}

impl HttpSession {
    pub fn new(state_file: &str, user_agent: Option<String>, timeout: Duration) -> Self {
        Self {
            state_file: state_file.to_string(),
            user_agent,
            timeout,
            state: SessionState::default(),
            client: None,
        }
    }

    fn build_client(&self) -> Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.state.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("ignoring invalid persisted header {name}"),
            }
        }

        let user_agent = self
            .user_agent
            .clone()
            .or_else(|| self.state.user_agent.clone());
        if let Some(user_agent) = user_agent {
            let value = HeaderValue::from_str(&user_agent)
                .map_err(|err| Error::TransportFailure(format!("invalid user agent, {err}")))?;
            headers.insert(USER_AGENT, value);
        }

        reqwest::ClientBuilder::new()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|err| {
                error!("failed to build http client, error({err})");
                Error::TransportFailure(err.to_string())
            })
    }

    fn absorb_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(value) = value.to_str() {
                self.state.absorb_cookie(value);
            }
        }
    }
}

impl SessionTransport for HttpSession {
    async fn open(&mut self, landing_url: &str) -> Result<()> {
        self.state = match crate::fs::read_json::<SessionState>(&self.state_file).await {
            Ok(state) => {
                debug!(
                    "session state loaded from {}, {} cookies",
                    self.state_file,
                    state.cookies.len()
                );
                state
            }
            Err(err) => {
                warn!(
                    "no usable session state at {}, starting empty, error({err})",
                    self.state_file
                );
                SessionState::default()
            }
        };
        self.client = Some(self.build_client()?);

        let response = self.send(TransportRequest::get(landing_url)).await?;
        if !(200..300).contains(&response.status) {
            error!("could not load {landing_url}, status {}", response.status);
            return Err(Error::TransportFailure(format!(
                "landing page {landing_url} returned status {}",
                response.status
            )));
        }

        info!("session opened at {landing_url}");
        Ok(())
    }

    async fn send(&mut self, request: TransportRequest) -> Result<TransportResponse> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| Error::TransportFailure("session is not open".into()))?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        if let Some(cookies) = self.state.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        trace!("{:?} {}", request.method, request.url);
        let response = builder.send().await.map_err(|err| {
            error!("request to {} failed, error({err})", request.url);
            Error::TransportFailure(err.to_string())
        })?;

        self.absorb_cookies(response.headers());
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| Error::TransportFailure(err.to_string()))?
            .to_vec();

        Ok(TransportResponse { status, body })
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        info!(
            "saving session state, {} cookies",
            self.state.cookies.len()
        );
        crate::fs::write_json(&self.state_file, &self.state)
            .await
            .map_err(|err| {
                error!("could not save session state, error({err})");
                Error::TransportFailure(err.to_string())
            })
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[test]
fn set_cookie_attributes_are_dropped() {
    let mut state = SessionState::default();
    state.absorb_cookie("session_id=abc123; Path=/; HttpOnly");
    state.absorb_cookie("machine_cookie=42");
    state.absorb_cookie("; Path=/");

    assert_eq!(state.cookies.len(), 2);
    assert_eq!(
        state.cookie_header().as_deref(),
        Some("machine_cookie=42; session_id=abc123")
    );
}

#[test]
fn expired_cookies_leave_the_jar() {
    let mut state = SessionState::default();
    state.absorb_cookie("session_id=abc123");
    state.absorb_cookie("machine_cookie=42");
    state.absorb_cookie("tracker=1; Path=/");

    state.absorb_cookie("session_id=; Path=/; Max-Age=0");
    state.absorb_cookie("machine_cookie=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
    state.absorb_cookie("tracker=2; Expires=Fri, 01 Jan 2100 00:00:00 GMT; Max-Age=3600");

    assert_eq!(state.cookie_header().as_deref(), Some("tracker=2"));
}

#[tokio::test]
async fn close_persists_state_for_the_next_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let path = path.to_str().unwrap();

    let mut session = HttpSession::new(path, None, Duration::from_secs(1));
    session.state.absorb_cookie("session_id=abc123");
    session.close().await.unwrap();

    let state: SessionState = crate::fs::read_json(path).await.unwrap();
    assert_eq!(state.cookies.get("session_id").map(String::as_str), Some("abc123"));
}

#[tokio::test]
async fn send_before_open_is_a_transport_failure() {
    let mut session = HttpSession::new("unused.json", None, Duration::from_secs(1));
    let result = session.send(TransportRequest::get("http://localhost/")).await;
    assert!(matches!(result, Err(Error::TransportFailure(_))));
}
