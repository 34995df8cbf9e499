use async_trait::async_trait;
use dashmap::DashMap;

use botscope::data::{HeaderSnapshot, NewSession, Session, SessionPatch, SessionSummary};
use botscope::errors::SessionError;
use botscope::id::SessionId;

/// A trait for recording and reading session telemetry.
///
/// Only strict creation can fail. Every other operation is defensive: unknown
/// ids are created on write and answered with a placeholder on read.
///
/// # Examples
///
/// ```rust,ignore
/// async fn example_usage<S: SessionService>(service: &S) -> Result<(), S::Error> {
///     let id = service.create_empty().await?;
///
///     let patch = SessionPatch {
///         id: Some(id.clone()),
///         issues: Some(vec!["webdriver".to_string()]),
///         ..SessionPatch::default()
///     };
///     service.patch(patch).await?;
///
///     let session = service.get(&id).await?;
///     assert_eq!(session.issues, vec!["webdriver"]);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SessionService {
    /// The error type returned by operations on this service.
    type Error;

    /// Inserts a bare record under a freshly generated id and returns the id.
    async fn create_empty(&self) -> Result<SessionId, Self::Error>;

    /// Validates and stores a full record, overwriting any record with the
    /// same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the score is outside `0..=100`. The store is left
    /// untouched in that case.
    async fn create(&self, session: NewSession) -> Result<Session, Self::Error>;

    /// Applies a partial update and returns the id it was applied to.
    ///
    /// A patch without an id gets a generated one, and an unknown id gets a
    /// bare record before the patch is applied.
    async fn patch(&self, patch: SessionPatch) -> Result<SessionId, Self::Error>;

    /// Stores `headers` as the session's header snapshot when an id is given,
    /// creating the session if needed. Returns the snapshot unchanged.
    async fn capture_headers(
        &self,
        session_id: Option<&SessionId>,
        headers: HeaderSnapshot,
    ) -> Result<HeaderSnapshot, Self::Error>;

    /// Returns the full record, or a zero-valued placeholder carrying the
    /// requested id when the session is unknown.
    async fn get(&self, session_id: &SessionId) -> Result<Session, Self::Error>;

    /// Returns the id and timestamp of every session, most recent first.
    async fn list(&self) -> Result<Vec<SessionSummary>, Self::Error>;

    /// Removes every session.
    async fn clear(&self) -> Result<(), Self::Error>;

    async fn count(&self) -> Result<usize, Self::Error>;
}

/// An in-memory implementation of the `SessionService` trait.
///
/// Sessions live in a `DashMap`, so handlers can share one instance without
/// an outer lock. Nothing survives a restart.
pub struct SessionServiceInMemory {
    sessions: DashMap<SessionId, Session>,
}

impl SessionServiceInMemory {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

impl Default for SessionServiceInMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionService for SessionServiceInMemory {
    type Error = SessionError;

    async fn create_empty(&self) -> Result<SessionId, Self::Error> {
        let session_id = SessionId::new();
        self.sessions
            .insert(session_id.clone(), Session::new(session_id.clone()));
        Ok(session_id)
    }

    async fn create(&self, session: NewSession) -> Result<Session, Self::Error> {
        let session = session.into_session()?;
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn patch(&self, patch: SessionPatch) -> Result<SessionId, Self::Error> {
        let session_id = patch.target().unwrap_or_default();

        // The entry guard is held for the whole merge.
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(|| Session::new(session_id.clone()));
        entry.apply(patch);

        Ok(session_id)
    }

    async fn capture_headers(
        &self,
        session_id: Option<&SessionId>,
        headers: HeaderSnapshot,
    ) -> Result<HeaderSnapshot, Self::Error> {
        if let Some(session_id) = session_id {
            let mut entry = self
                .sessions
                .entry(session_id.clone())
                .or_insert_with(|| Session::new(session_id.clone()));
            entry.headers = headers.clone();
        }
        Ok(headers)
    }

    async fn get(&self, session_id: &SessionId) -> Result<Session, Self::Error> {
        Ok(self
            .sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Session::placeholder(session_id.clone())))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, Self::Error> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        summaries.sort_by(|a, b| {
            b.timestamp
                .total_cmp(&a.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.sessions.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, Self::Error> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botscope::data::{Score, Timestamp};
    use botscope::serde_json::{self, Value, json};

    fn patch(value: Value) -> SessionPatch {
        serde_json::from_value(value).unwrap()
    }

    fn new_session(value: Value) -> NewSession {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn create_empty_inserts_a_bare_record() {
        let service = SessionServiceInMemory::new();
        let id = service.create_empty().await.unwrap();

        let session = service.get(&id).await.unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.environment, "Unknown");
        assert_eq!(session.score, Score::default());
        assert!(session.issues.is_empty());
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_stores_every_valid_score() {
        let service = SessionServiceInMemory::new();
        for score in 0..=100 {
            let created = service
                .create(new_session(json!({"environment": "RBI", "score": score})))
                .await
                .unwrap();
            let stored = service.get(&created.id).await.unwrap();
            assert_eq!(i64::from(stored.score.value()), score);
        }
        assert_eq!(service.count().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_scores_without_mutating() {
        let service = SessionServiceInMemory::new();
        for score in [-1, 101, 1000] {
            let result = service
                .create(new_session(json!({"id": "bad", "score": score})))
                .await;
            assert_eq!(result, Err(SessionError::ScoreOutOfRange(score)));
        }
        assert_eq!(service.count().await.unwrap(), 0);
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_overwrites_an_existing_id() {
        let service = SessionServiceInMemory::new();
        service
            .create(new_session(json!({"id": "s1", "score": 10, "issues": ["a"]})))
            .await
            .unwrap();
        service
            .create(new_session(json!({"id": "s1", "score": 20})))
            .await
            .unwrap();

        let stored = service.get(&"s1".into()).await.unwrap();
        assert_eq!(stored.score.value(), 20);
        assert!(stored.issues.is_empty());
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn patch_merges_issues_in_order_without_duplicates() {
        let service = SessionServiceInMemory::new();
        let id = service
            .patch(patch(json!({"id": "s1", "issues": ["a", "b"]})))
            .await
            .unwrap();
        service
            .patch(patch(json!({"id": "s1", "issues": ["b", "c"]})))
            .await
            .unwrap();

        assert_eq!(service.get(&id).await.unwrap().issues, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn patch_merges_details_key_by_key() {
        let service = SessionServiceInMemory::new();
        for details in [json!({"x": 1}), json!({"y": 2}), json!({"x": 3})] {
            service
                .patch(patch(json!({"id": "s1", "details": details})))
                .await
                .unwrap();
        }

        let details = service.get(&"s1".into()).await.unwrap().details;
        assert_eq!(Value::Object(details), json!({"x": 3, "y": 2}));
    }

    #[tokio::test]
    async fn patch_replaces_headers_wholesale() {
        let service = SessionServiceInMemory::new();
        service
            .patch(patch(json!({"id": "s1", "headers": {"a": "1"}})))
            .await
            .unwrap();
        service
            .patch(patch(json!({"id": "s1", "headers": {"b": "2"}})))
            .await
            .unwrap();

        let headers = service.get(&"s1".into()).await.unwrap().headers;
        assert_eq!(
            headers,
            HeaderSnapshot::from([("b".to_string(), "2".to_string())])
        );
    }

    #[tokio::test]
    async fn patch_without_id_creates_a_new_session() {
        let service = SessionServiceInMemory::new();
        let id = service
            .patch(patch(json!({"environment": "Browser", "score": 55})))
            .await
            .unwrap();

        let stored = service.get(&id).await.unwrap();
        assert_eq!(stored.environment, "Browser");
        assert_eq!(stored.score.value(), 55);
    }

    #[tokio::test]
    async fn patch_with_empty_id_generates_one() {
        let service = SessionServiceInMemory::new();
        let id = service.patch(patch(json!({"id": ""}))).await.unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn patch_with_both_id_keys_reaches_the_named_session() {
        let service = SessionServiceInMemory::new();
        let id = service
            .patch(patch(json!({"id": "s2", "session_id": "s2", "score": 55})))
            .await
            .unwrap();

        assert_eq!(id.as_str(), "s2");
        assert_eq!(service.get(&id).await.unwrap().score.value(), 55);
        assert_eq!(service.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn create_with_empty_id_generates_one() {
        let service = SessionServiceInMemory::new();
        let created = service
            .create(new_session(json!({"id": ""})))
            .await
            .unwrap();

        assert!(!created.id.as_str().is_empty());
        let empty: SessionId = "".into();
        assert_eq!(
            service.get(&empty).await.unwrap(),
            Session::placeholder(empty)
        );
    }

    #[tokio::test]
    async fn patch_skips_malformed_fields() {
        let service = SessionServiceInMemory::new();
        service
            .patch(patch(json!({"id": "s1", "score": 40, "environment": "RBI"})))
            .await
            .unwrap();
        service
            .patch(patch(json!({"id": "s1", "score": 400, "environment": ["x"]})))
            .await
            .unwrap();

        let stored = service.get(&"s1".into()).await.unwrap();
        assert_eq!(stored.score.value(), 40);
        assert_eq!(stored.environment, "RBI");
    }

    #[tokio::test]
    async fn capture_headers_stores_snapshot_for_known_and_unknown_ids() {
        let service = SessionServiceInMemory::new();
        let first = HeaderSnapshot::from([("user-agent".to_string(), "curl".to_string())]);
        let second = HeaderSnapshot::from([("accept".to_string(), "*/*".to_string())]);

        let id: SessionId = "fresh".into();
        let returned = service
            .capture_headers(Some(&id), first.clone())
            .await
            .unwrap();
        assert_eq!(returned, first);
        assert_eq!(service.get(&id).await.unwrap().headers, first);

        service
            .capture_headers(Some(&id), second.clone())
            .await
            .unwrap();
        assert_eq!(service.get(&id).await.unwrap().headers, second);
    }

    #[tokio::test]
    async fn capture_headers_without_id_leaves_store_alone() {
        let service = SessionServiceInMemory::new();
        let headers = HeaderSnapshot::from([("host".to_string(), "localhost".to_string())]);
        let returned = service.capture_headers(None, headers.clone()).await.unwrap();
        assert_eq!(returned, headers);
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_unknown_returns_placeholder() {
        let service = SessionServiceInMemory::new();
        let id: SessionId = "missing".into();
        let session = service.get(&id).await.unwrap();
        assert_eq!(session, Session::placeholder(id));
        assert_eq!(session.timestamp, Timestamp::ZERO);
        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_orders_by_timestamp_descending() {
        let service = SessionServiceInMemory::new();
        for (id, timestamp) in [("one", 1), ("three", 3), ("two", 2)] {
            service
                .create(new_session(json!({"id": id, "timestamp": timestamp})))
                .await
                .unwrap();
        }

        let listed: Vec<f64> = service
            .list()
            .await
            .unwrap()
            .iter()
            .map(|summary| summary.timestamp.as_epoch_seconds())
            .collect();
        assert_eq!(listed, vec![3.0, 2.0, 1.0]);
    }

    #[tokio::test]
    async fn list_breaks_ties_by_id() {
        let service = SessionServiceInMemory::new();
        for id in ["b", "c", "a"] {
            service
                .create(new_session(json!({"id": id, "timestamp": 5})))
                .await
                .unwrap();
        }

        let ids: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.id.into_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let service = SessionServiceInMemory::new();
        service.create_empty().await.unwrap();
        service.create_empty().await.unwrap();

        service.clear().await.unwrap();

        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(service.count().await.unwrap(), 0);
    }
}
