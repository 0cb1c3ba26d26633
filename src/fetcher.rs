//! Resilient client for the text-generation endpoint.
//!
//! One call to [`ResilientFetcher::fetch`] makes up to `max_attempts` sequential
//! attempts. Only transport failures are retried, with an exponential backoff of
//! `backoff_unit * 2^attempt` between attempts. Every other outcome (bad status,
//! undecodable body, refusal, answer) ends the loop at once.
//!
//! ```no_run
//! # use dashfeed::fetcher::ResilientFetcher;
//! # use dashfeed::CallOutcome;
//! let fetcher = ResilientFetcher::http("https://example.invalid/generate", None)?;
//! match fetcher.fetch("Return CSV only.", "GDP grew 3% in 2020.") {
//!     CallOutcome::Success(text) => println!("{text}"),
//!     CallOutcome::Failure(f) => eprintln!("{f}"),
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```
use crate::models::{CallOutcome, FailureKind, GenerateResponse, RequestPayload};
use anyhow::{Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Status and body of a response that made it over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (connect, reset, timeout, DNS...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends one JSON POST. Implementations must not retry on their own.
pub trait Transport {
    fn post_json(&self, body: &Value) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    pub url: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_timeout(url, api_key, Duration::from_secs(60))
    }

    pub fn with_timeout(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("dashfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            url: url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            http,
        })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, body: &Value) -> Result<TransportResponse, TransportError> {
        let mut req = self.http.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            req = req.header("x-goog-api-key", key);
        }
        let resp = req.send().map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(TransportResponse { status, body })
    }
}

/// Attempt budget and backoff unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (0-based): `unit * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type SleepFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Bounded-retry caller for the text-generation endpoint.
///
/// Holds no per-call state, so one instance can serve concurrent callers; each
/// call runs its own retry/backoff timeline on the calling thread.
#[derive(Clone)]
pub struct ResilientFetcher<T = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
    sleep: SleepFn,
}

impl<T> std::fmt::Debug for ResilientFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResilientFetcher<HttpTransport> {
    pub fn http(url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(url, api_key)?))
    }
}

impl<T: Transport> ResilientFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            sleep: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the blocking sleep used for backoff (tests record delays with this).
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Arc::new(sleep);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn fetch(&self, instruction: &str, content: &str) -> CallOutcome {
        self.fetch_with_cancel(instruction, content, &CancelToken::new())
    }

    pub fn fetch_payload(&self, payload: &RequestPayload) -> CallOutcome {
        self.fetch(&payload.instruction, &payload.content)
    }

    /// Like [`fetch`](Self::fetch), but gives up between attempts once `cancel` is set.
    pub fn fetch_with_cancel(
        &self,
        instruction: &str,
        content: &str,
        cancel: &CancelToken,
    ) -> CallOutcome {
        if content.trim().is_empty() {
            return CallOutcome::failure(FailureKind::Malformed, "empty input");
        }
        let body = RequestPayload::new(instruction, content).to_body();
        let max = self.policy.max_attempts;

        for attempt in 0..max {
            if cancel.is_cancelled() {
                return cancelled(attempt);
            }
            log::debug!("ai request attempt {}/{}", attempt + 1, max);
            let resp = match self.transport.post_json(&body) {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("ai transport failure on attempt {}: {}", attempt + 1, e);
                    if attempt + 1 >= max {
                        return CallOutcome::failure(
                            FailureKind::NetworkError,
                            format!("request failed after {} attempts: {}", max, e),
                        );
                    }
                    if cancel.is_cancelled() {
                        return cancelled(attempt + 1);
                    }
                    (self.sleep)(self.policy.delay_for(attempt));
                    continue;
                }
            };
            let outcome = classify(resp);
            if let CallOutcome::Failure(f) = &outcome {
                log::warn!("ai call failed: {}", f.kind);
            }
            return outcome;
        }

        CallOutcome::failure(
            FailureKind::Exhausted,
            format!("no response after {} attempts", max),
        )
    }
}

fn cancelled(attempts: u32) -> CallOutcome {
    CallOutcome::failure(
        FailureKind::Exhausted,
        format!("cancelled after {} attempts", attempts),
    )
}

/// Map a transport-level success into an outcome. Never retried.
pub fn classify(resp: TransportResponse) -> CallOutcome {
    if !resp.is_success() {
        return CallOutcome::failure(
            FailureKind::HttpStatus,
            format!("status {}: {}", resp.status, resp.body),
        );
    }
    let parsed: GenerateResponse = match serde_json::from_str(&resp.body) {
        Ok(p) => p,
        Err(_) => return CallOutcome::failure(FailureKind::Malformed, resp.body),
    };
    if let Some(text) = parsed.first_text() {
        return CallOutcome::Success(text.to_string());
    }
    if !parsed.has_candidates()
        && let Some(reason) = parsed.block_reason()
    {
        return CallOutcome::failure(FailureKind::Blocked, reason);
    }
    CallOutcome::failure(
        FailureKind::Malformed,
        format!("unexpected shape: {}", resp.body),
    )
}
