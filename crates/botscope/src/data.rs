//! Data structures shared by the backend and its clients.
//!
//! A [`Session`] is one record of bot-detection telemetry. Requests that build
//! a record come in two flavours: [`NewSession`] is validated strictly and
//! rejected when the score is out of range, while [`SessionPatch`] is lenient
//! and silently drops any field it cannot read.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::SessionError;
use crate::id::SessionId;

/// Environment label used when the caller does not send one.
pub const DEFAULT_ENVIRONMENT: &str = "Unknown";

/// Free-form metadata attached to a session.
pub type Details = serde_json::Map<String, Value>;

/// A flat snapshot of HTTP request headers, keyed by lower-case header name.
pub type HeaderSnapshot = BTreeMap<String, String>;

/// Bot-detection score, always within `0..=100`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 100;

    pub fn new(value: i64) -> Result<Self, SessionError> {
        match u8::try_from(value) {
            Ok(score) if score <= Self::MAX => Ok(Self(score)),
            _ => Err(SessionError::ScoreOutOfRange(value)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = SessionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Seconds since the Unix epoch.
///
/// On the wire a timestamp is written as a JSON number. It is read either from
/// a number or from an ISO-8601 string; strings without an offset are taken
/// as UTC. Both forms end up as epoch seconds so records always compare on
/// the same scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0.0);

    /// The current time at millisecond precision.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_epoch_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp_millis() as f64 / 1000.0)
    }

    /// Parses an RFC 3339 string, or an ISO-8601 date-time without offset.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let text = text.trim();
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Ok(Self::from_datetime(datetime.with_timezone(&Utc)));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .ok_or_else(|| SessionError::InvalidTimestamp(text.to_string()))
    }

    pub fn as_epoch_seconds(self) -> f64 {
        self.0
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(seconds) => Ok(Self(seconds)),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// One bot-detection session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub timestamp: Timestamp,
    pub environment: String,
    pub score: Score,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub headers: HeaderSnapshot,
}

impl Session {
    /// A bare record stamped with the current time and default fields.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            timestamp: Timestamp::now(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            score: Score::default(),
            issues: Vec::new(),
            details: Details::new(),
            headers: HeaderSnapshot::new(),
        }
    }

    /// The zero-valued record returned for ids the store does not know.
    pub fn placeholder(id: SessionId) -> Self {
        Self {
            id,
            timestamp: Timestamp::ZERO,
            environment: String::new(),
            score: Score::default(),
            issues: Vec::new(),
            details: Details::new(),
            headers: HeaderSnapshot::new(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
        }
    }

    /// Appends the issues not already recorded, keeping their order.
    pub fn add_issues(&mut self, issues: impl IntoIterator<Item = String>) {
        for issue in issues {
            if !self.issues.contains(&issue) {
                self.issues.push(issue);
            }
        }
    }

    /// Shallow key-by-key merge; incoming keys overwrite existing ones.
    pub fn merge_details(&mut self, details: Details) {
        self.details.extend(details);
    }

    /// Applies a patch field by field. Absent fields are left untouched.
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(issues) = patch.issues {
            self.add_issues(issues);
        }
        if let Some(details) = patch.details {
            self.merge_details(details);
        }
        if let Some(headers) = patch.headers {
            self.headers = headers;
        }
        if let Some(environment) = patch.environment {
            self.environment = environment;
        }
        if let Some(timestamp) = patch.timestamp {
            self.timestamp = timestamp;
        }
        if let Some(score) = patch.score {
            self.score = score;
        }
    }
}

/// The `{id, timestamp}` view returned when listing sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub timestamp: Timestamp,
}

/// A full session record submitted for strict creation.
///
/// Every field may be left out: the id and timestamp are generated, the
/// environment falls back to [`DEFAULT_ENVIRONMENT`] and the score to 0.
/// A field sent as `null` is rejected.
/// The score stays a raw integer until [`NewSession::into_session`] checks it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    #[serde(default, deserialize_with = "non_null")]
    pub id: Option<SessionId>,
    #[serde(default, deserialize_with = "non_null")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, deserialize_with = "non_null")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub score: Option<i64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub details: Details,
    #[serde(default)]
    pub headers: HeaderSnapshot,
}

impl NewSession {
    pub fn into_session(self) -> Result<Session, SessionError> {
        let score = Score::new(self.score.unwrap_or_default())?;
        Ok(Session {
            id: non_empty(self.id).unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            environment: self
                .environment
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            score,
            issues: self.issues,
            details: self.details,
            headers: self.headers,
        })
    }
}

/// Minimal input for `/api/sessions/create`. Id and timestamp are always
/// generated, whatever else the payload carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSession {
    #[serde(default, deserialize_with = "non_null")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub score: Option<i64>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl From<CreateSession> for NewSession {
    fn from(create: CreateSession) -> Self {
        Self {
            environment: create.environment,
            score: create.score,
            issues: create.issues,
            ..Self::default()
        }
    }
}

// A key that is present must carry a value: `null` is a type error, not a default.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn non_empty(id: Option<SessionId>) -> Option<SessionId> {
    id.filter(|id| !id.as_str().is_empty())
}

/// A partial update. Each field is present or absent; a field that cannot be
/// read (wrong type, out-of-range score) counts as absent.
///
/// The target may be named by `id` or `session_id`; `id` wins when both are
/// sent. Use [`SessionPatch::target`] rather than either field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionPatch {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<SessionId>,
    #[serde(default, deserialize_with = "lenient")]
    pub session_id: Option<SessionId>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<Timestamp>,
    #[serde(default, deserialize_with = "lenient")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub score: Option<Score>,
    #[serde(default, deserialize_with = "lenient")]
    pub issues: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub details: Option<Details>,
    #[serde(default, deserialize_with = "lenient")]
    pub headers: Option<HeaderSnapshot>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

impl SessionPatch {
    /// The session this patch applies to, if it names a non-empty one.
    pub fn target(&self) -> Option<SessionId> {
        non_empty(self.id.clone())
            .or_else(|| non_empty(self.session_id.clone()))
    }
}

/// Query string of `/api/headers`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadersQuery {
    pub session_id: Option<SessionId>,
}

impl HeadersQuery {
    /// The session to save the snapshot into, if a non-empty id was given.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref().filter(|id| !id.as_str().is_empty())
    }
}

/// Response body of the two creation routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub message: String,
    pub id: SessionId,
}

/// Response body carrying only a session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRef {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearStatus {
    pub status: String,
}

impl ClearStatus {
    pub fn cleared() -> Self {
        Self {
            status: "cleared".to_string(),
        }
    }
}

/// Body of every client error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeInfo {
    pub seconds: i64,
    pub human: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub sessions: String,
    pub active_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: String,
    pub started_at: String,
    pub uptime: UptimeInfo,
    pub services: ServiceInfo,
}
