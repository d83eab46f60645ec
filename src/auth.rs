//! OAuth 2.0 credentials for the Drive and Slides APIs.
//!
//! Credential material is never read from a hidden global: the client
//! secrets path and the token cache path are both explicit, and every load,
//! refresh and save is a method call on [`OAuthCredentials`] or
//! [`TokenStore`].
//!
//! ## Token lifecycle
//!
//! ```text
//! access_token()
//!   ├─ cached token valid for > 60 s?      → use it
//!   ├─ cached token has a refresh token?   → refresh, save, use
//!   └─ otherwise                           → loopback consent flow, save, use
//! ```

use crate::error::{truncate, Pdf2SlidesError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Scope limited to files this application creates.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Tokens expiring within this many seconds are refreshed early.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Yields a bearer token for API calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, Pdf2SlidesError>;
}

/// A bearer token supplied by the caller and used as-is.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String, Pdf2SlidesError> {
        Ok(self.0.clone())
    }
}

// ── Client secrets ───────────────────────────────────────────────────────

/// OAuth client identity from a Google client-secrets JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Load the `installed` (or `web`) section of a client-secrets file.
    pub fn load(path: &Path) -> Result<Self, Pdf2SlidesError> {
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Pdf2SlidesError::CredentialsMissing {
                path: path.to_path_buf(),
            },
            _ => Pdf2SlidesError::InvalidCredentials {
                path: path.to_path_buf(),
                detail: e.to_string(),
            },
        })?;
        Self::parse(&raw).map_err(|detail| Pdf2SlidesError::InvalidCredentials {
            path: path.to_path_buf(),
            detail,
        })
    }

    fn parse(raw: &str) -> Result<Self, String> {
        let file: SecretsFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" section".to_string())
    }
}

// ── Token store ──────────────────────────────────────────────────────────

/// Persisted token material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Absolute expiry, Unix seconds.
    pub expires_at: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_fresh(&self, now: u64) -> bool {
        self.expires_at > now + EXPIRY_MARGIN_SECS
    }
}

/// JSON token cache at an explicit path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<StoredToken>, Pdf2SlidesError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Pdf2SlidesError::InvalidCredentials {
                    path: self.path.clone(),
                    detail: e.to_string(),
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Pdf2SlidesError::InvalidCredentials {
                path: self.path.clone(),
                detail: e.to_string(),
            })
    }

    /// Write the token atomically (temp file in the same directory + rename).
    pub fn save(&self, token: &StoredToken) -> Result<(), Pdf2SlidesError> {
        let save_err = |source: std::io::Error| Pdf2SlidesError::TokenSaveFailed {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(save_err)?;

        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| Pdf2SlidesError::Internal(format!("token serialisation: {e}")))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(save_err)?;
        tmp.write_all(&json).map_err(save_err)?;
        tmp.persist(&self.path).map_err(|e| save_err(e.error))?;
        debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}

// ── OAuth installed-app credentials ──────────────────────────────────────

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

/// Installed-application OAuth credentials backed by a [`TokenStore`].
pub struct OAuthCredentials {
    secrets: ClientSecrets,
    store: TokenStore,
    scope: String,
    http: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl OAuthCredentials {
    pub fn new(secrets: ClientSecrets, store: TokenStore, scope: impl Into<String>) -> Self {
        Self {
            secrets,
            store,
            scope: scope.into(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Load client secrets from `secrets_path` and cache tokens at `token_path`.
    pub fn from_files(
        secrets_path: &Path,
        token_path: &Path,
        scope: impl Into<String>,
    ) -> Result<Self, Pdf2SlidesError> {
        let secrets = ClientSecrets::load(secrets_path)?;
        Ok(Self::new(secrets, TokenStore::new(token_path), scope))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Google does not always return a new refresh token; the old one is
    /// kept in that case.
    pub async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, Pdf2SlidesError> {
        info!("Refreshing access token");
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let mut token = self.token_request(&params).await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    /// Run the loopback consent flow: print the consent URL, wait for the
    /// browser redirect to `127.0.0.1`, exchange the code.
    pub async fn authorize(&self) -> Result<StoredToken, Pdf2SlidesError> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| auth_err(format!("cannot bind loopback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| auth_err(e.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let url = reqwest::Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| auth_err(format!("invalid auth_uri: {e}")))?;

        eprintln!("Please visit this URL to authorize this application:\n{url}");
        info!("Waiting for OAuth redirect on {}", redirect_uri);

        let code = receive_code(&listener).await?;
        let params = [
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<StoredToken, Pdf2SlidesError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| Pdf2SlidesError::AuthUnavailable {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {}: {}", status, truncate(&body, 300));
            return Err(match status.as_u16() {
                408 | 429 | 500..=599 => Pdf2SlidesError::AuthUnavailable { detail },
                _ => auth_err(detail),
            });
        }
        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_err(format!("invalid token response: {e}")))?;

        Ok(StoredToken {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            expires_at: unix_now() + parsed.expires_in,
            scope: parsed.scope,
        })
    }
}

#[async_trait]
impl CredentialProvider for OAuthCredentials {
    async fn access_token(&self) -> Result<String, Pdf2SlidesError> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load()?;
        }

        let now = unix_now();
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
        }

        let refresh_token = cached.as_ref().and_then(|t| t.refresh_token.clone());
        let token = match refresh_token {
            Some(rt) => self.refresh(&rt).await?,
            None => self.authorize().await?,
        };
        self.store.save(&token)?;
        let access = token.access_token.clone();
        *cached = Some(token);
        Ok(access)
    }
}

/// Accept one redirect on the loopback listener and extract `code`.
async fn receive_code(listener: &TcpListener) -> Result<String, Pdf2SlidesError> {
    let (mut stream, _) = listener
        .accept()
        .await
        .map_err(|e| auth_err(format!("redirect not received: {e}")))?;

    let mut buf = vec![0u8; 8192];
    let mut len = 0;
    while len < buf.len() {
        let n = stream
            .read(&mut buf[len..])
            .await
            .map_err(|e| auth_err(e.to_string()))?;
        if n == 0 {
            break;
        }
        len += n;
        if buf[..len].windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let request = String::from_utf8_lossy(&buf[..len]);
    let result = parse_redirect(&request);

    let page = match &result {
        Ok(_) => "Authorization complete. You may close this window.",
        Err(_) => "Authorization failed. Return to the terminal for details.",
    };
    let reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    );
    stream.write_all(reply.as_bytes()).await.ok();
    stream.shutdown().await.ok();

    result
}

/// Pull the authorization code out of the redirect's request line.
fn parse_redirect(request: &str) -> Result<String, Pdf2SlidesError> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| auth_err("malformed redirect request".to_string()))?;
    let url = reqwest::Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| auth_err(format!("malformed redirect target: {e}")))?;

    let mut code = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (Some(code), _) => Ok(code),
        (None, Some(err)) => Err(auth_err(format!("consent denied: {err}"))),
        (None, None) => Err(auth_err("redirect carried no authorization code".to_string())),
    }
}

fn auth_err(detail: String) -> Pdf2SlidesError {
    Pdf2SlidesError::AuthFailed { detail }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
