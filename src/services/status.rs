use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, StatusSource};
use crate::models::StatusUpdate;
use crate::services::database::Database;

/// What a polling loop reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// The fetched list differs from the previous fetch.
    Updates(Vec<StatusUpdate>),
    /// A completion record arrived. Polling has stopped.
    Complete(Vec<StatusUpdate>),
    /// One fetch failed. Polling carries on.
    Error(String),
}

/// Poll `source` for a conversation until a completion record shows up or
/// `cancel` fires. The first fetch happens immediately.
pub async fn run_polling<F>(
    source: Arc<dyn StatusSource>,
    conversation_id: String,
    interval: Duration,
    cancel: CancellationToken,
    mut on_event: F,
) where
    F: FnMut(PollEvent) + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<Vec<StatusUpdate>> = None;

    tracing::info!(
        "Polling status for {} every {}ms",
        conversation_id,
        interval.as_millis()
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Status polling for {} cancelled", conversation_id);
                return;
            }
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Status polling for {} cancelled", conversation_id);
                return;
            }
            result = source.read(&conversation_id) => result,
        };

        match fetched {
            Ok(updates) => {
                if find_completion(&updates).is_some() {
                    tracing::info!("Trip plan ready for {}", conversation_id);
                    on_event(PollEvent::Complete(updates));
                    return;
                }
                if last.as_ref() != Some(&updates) {
                    last = Some(updates.clone());
                    on_event(PollEvent::Updates(updates));
                }
            }
            Err(e) => {
                tracing::warn!("Status fetch for {} failed: {}", conversation_id, e);
                on_event(PollEvent::Error(e.to_string()));
            }
        }
    }
}

pub fn find_completion(updates: &[StatusUpdate]) -> Option<&StatusUpdate> {
    updates.iter().find(|u| u.is_task_complete())
}

/// Rough completion percentage for the progress bar. Never reaches 100
/// before the completion record.
pub fn progress(updates: &[StatusUpdate]) -> u8 {
    if find_completion(updates).is_some() {
        return 100;
    }
    let distinct: HashSet<&str> = updates.iter().map(|u| u.id.as_str()).collect();
    (distinct.len() * 15).min(90) as u8
}

/// Status source that writes every fetched record to the local cache so the
/// activity overview can work offline.
pub struct CachedStatusSource<S> {
    inner: S,
    db: Database,
}

impl<S> CachedStatusSource<S> {
    pub fn new(inner: S, db: Database) -> Self {
        Self { inner, db }
    }
}

#[async_trait]
impl<S: StatusSource> StatusSource for CachedStatusSource<S> {
    async fn read(&self, conversation_id: &str) -> Result<Vec<StatusUpdate>, ApiError> {
        let updates = self.inner.read(conversation_id).await?;
        match self.db.insert_status_updates(&updates).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Cached {} new status updates", n),
            Err(e) => tracing::warn!("Failed to cache status updates: {}", e),
        }
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::models::TASK_COMPLETE;

    fn update(id: &str, text: &str) -> StatusUpdate {
        StatusUpdate {
            id: id.to_string(),
            agent_id: "agent".to_string(),
            agent_type: "flight_agent".to_string(),
            conversation_id: "c1".to_string(),
            update: text.to_string(),
            timestamp: "2024-07-01T10:00:00Z".to_string(),
        }
    }

    /// Replays scripted responses, then repeats the last one.
    struct Scripted {
        responses: Mutex<VecDeque<Result<Vec<StatusUpdate>, ApiError>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<StatusUpdate>, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        async fn read(&self, _conversation_id: &str) -> Result<Vec<StatusUpdate>, ApiError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                match responses.front() {
                    Some(Ok(updates)) => Ok(updates.clone()),
                    Some(Err(e)) => Err(ApiError::NetworkError(e.to_string())),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    async fn collect(source: Arc<Scripted>, cancel: CancellationToken) -> Vec<PollEvent> {
        let mut events = Vec::new();
        run_polling(
            source,
            "c1".to_string(),
            Duration::from_millis(5),
            cancel,
            |event| events.push(event),
        )
        .await;
        events
    }

    #[tokio::test]
    async fn test_stops_on_completion() {
        let source = Arc::new(Scripted::new(vec![
            Ok(vec![]),
            Ok(vec![update("1", "Searching flights")]),
            Ok(vec![update("1", "Searching flights")]),
            Err(ApiError::NetworkError("timeout".into())),
            Ok(vec![update("1", "Searching flights"), update("2", TASK_COMPLETE)]),
            Ok(vec![update("3", "should never be read")]),
        ]));

        let events = collect(source.clone(), CancellationToken::new()).await;

        assert_eq!(
            events,
            vec![
                PollEvent::Updates(vec![]),
                PollEvent::Updates(vec![update("1", "Searching flights")]),
                PollEvent::Error("Network error: timeout".into()),
                PollEvent::Complete(vec![
                    update("1", "Searching flights"),
                    update("2", TASK_COMPLETE)
                ]),
            ]
        );
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test]
    async fn test_cancel_stops_silently() {
        let source = Arc::new(Scripted::new(vec![Ok(vec![update("1", "Still working")])]));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            trigger.cancel();
        });

        let events = collect(source.clone(), cancel).await;
        assert_eq!(events, vec![PollEvent::Updates(vec![update("1", "Still working")])]);
        assert!(source.calls() > 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_fetches() {
        let source = Arc::new(Scripted::new(vec![Ok(vec![])]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let events = collect(source.clone(), cancel).await;
        assert!(events.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress(&[]), 0);
        assert_eq!(progress(&[update("1", "a"), update("2", "b")]), 30);
        let many: Vec<_> = (0..10).map(|i| update(&i.to_string(), "x")).collect();
        assert_eq!(progress(&many), 90);
        assert_eq!(progress(&[update("1", "a"), update("2", TASK_COMPLETE)]), 100);
        assert_eq!(
            find_completion(&[update("1", "a"), update("9", TASK_COMPLETE)]).map(|u| u.id.as_str()),
            Some("9")
        );
    }

    #[tokio::test]
    async fn test_cached_source_stores_records() {
        let db = Database::new_in_memory().unwrap();
        let inner = Scripted::new(vec![Ok(vec![update("1", "Booked hotel")])]);
        let cached = CachedStatusSource::new(inner, db.clone());

        cached.read("c1").await.unwrap();
        cached.read("c1").await.unwrap();
        assert_eq!(db.list_status_updates("c1").await.unwrap().len(), 1);
    }
}
