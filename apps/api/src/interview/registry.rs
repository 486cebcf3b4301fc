use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::controller::{
    Collaborators, InterviewController, InterviewSettings, SpeechDevices,
};
use crate::interview::models::{InterviewTarget, SessionId};
use crate::interview::relay::relay_pair;
use crate::interview::runner::SessionHandle;
use crate::interview::speech::event_channel;

/// Lower bound on how often idle sessions are looked for.
const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

struct TrackedSession {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Live interview sessions, in memory only. Sessions do not survive a restart.
///
/// A client that leaves without closing its session stops polling it; such
/// sessions are evicted by the sweeper started with `spawn_idle_sweeper`.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, TrackedSession>>>,
}

impl SessionRegistry {
    /// Creates a relay-backed session and starts its task. Question
    /// generation begins immediately in the background.
    pub async fn open(
        &self,
        target: InterviewTarget,
        settings: InterviewSettings,
        collaborators: Collaborators,
    ) -> SessionHandle {
        let id = SessionId::new();
        let (sink, signals) = event_channel(id);
        let (input, output, directives) = relay_pair();
        let devices = SpeechDevices {
            input: Box::new(input),
            output: Box::new(output),
        };

        info!(
            session = %id,
            "Opening interview session for {} ({})",
            target.role_title, target.difficulty
        );
        let controller = InterviewController::new(id, target, settings, collaborators, devices);
        let handle = SessionHandle::spawn(controller, sink, signals, directives);

        self.sessions.write().await.insert(
            id,
            TrackedSession {
                handle: handle.clone(),
                last_seen: Instant::now(),
            },
        );
        handle
    }

    /// Looks a session up and marks it as seen.
    pub async fn get(&self, id: SessionId) -> Result<SessionHandle, AppError> {
        let mut sessions = self.sessions.write().await;
        let tracked = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        tracked.last_seen = Instant::now();
        Ok(tracked.handle.clone())
    }

    pub async fn remove(&self, id: SessionId) -> Result<SessionHandle, AppError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|tracked| tracked.handle)
            .ok_or_else(|| not_found(id))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Disposes and removes every session not seen for longer than `idle_timeout`.
    /// Returns how many were evicted.
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, tracked)| now.duration_since(tracked.last_seen) > idle_timeout)
                .map(|(id, _)| *id)
                .collect();
            ids.iter()
                .filter_map(|id| sessions.remove(id))
                .map(|tracked| tracked.handle)
                .collect()
        };

        for handle in &expired {
            if let Err(e) = handle.dispose().await {
                warn!(session = %handle.id(), "idle session already ended: {e}");
            }
            info!(session = %handle.id(), "Evicted idle interview session");
        }
        expired.len()
    }

    /// Runs `evict_idle` periodically for the lifetime of the process.
    pub fn spawn_idle_sweeper(&self, idle_timeout: Duration) {
        let registry = self.clone();
        let period = (idle_timeout / 4).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.evict_idle(idle_timeout).await;
            }
        });
    }
}

fn not_found(id: SessionId) -> AppError {
    AppError::NotFound(format!("Interview session {id} not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::controller::tests::{target, FakeEvaluator, FakeGenerator};
    use crate::interview::relay::Directive;
    use crate::interview::runner::Action;

    fn collaborators() -> Collaborators {
        Collaborators {
            generator: FakeGenerator::returning(&["Q1?"]),
            evaluator: FakeEvaluator::scoring(),
        }
    }

    #[tokio::test]
    async fn test_open_get_remove() {
        let registry = SessionRegistry::default();
        let handle = registry
            .open(target(), InterviewSettings::default(), collaborators())
            .await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(handle.id()).await.unwrap().id(), handle.id());

        registry.remove(handle.id()).await.unwrap();
        assert!(registry.get(handle.id()).await.is_err());
        assert!(registry.remove(handle.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_relay_session_queues_directives_for_client() {
        let registry = SessionRegistry::default();
        let handle = registry
            .open(target(), InterviewSettings::default(), collaborators())
            .await;

        handle.act(Action::Start).await.unwrap();
        let directives = handle.drain_directives().await;
        assert_eq!(directives.len(), 1);
        assert!(matches!(&directives[0], Directive::Speak { text } if text.ends_with("Q1?")));

        handle.dispose().await.unwrap();
        assert_eq!(handle.drain_directives().await, vec![Directive::CancelSpeech]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_evicted_and_disposed() {
        let registry = SessionRegistry::default();
        let idle = registry
            .open(target(), InterviewSettings::default(), collaborators())
            .await;
        let polled = registry
            .open(target(), InterviewSettings::default(), collaborators())
            .await;
        registry.spawn_idle_sweeper(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(30)).await;
        registry.get(polled.id()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(50)).await;

        // 80s since the idle one was opened, 50s since the other was polled.
        assert!(registry.get(idle.id()).await.is_err());
        assert!(idle.snapshot().await.is_err());
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(registry.get(polled.id()).await.is_err());
        assert!(polled.snapshot().await.is_err());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_keeps_recent_sessions() {
        let registry = SessionRegistry::default();
        let handle = registry
            .open(target(), InterviewSettings::default(), collaborators())
            .await;

        assert_eq!(registry.evict_idle(Duration::from_secs(60)).await, 0);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.evict_idle(Duration::from_secs(60)).await, 1);
        assert!(registry.get(handle.id()).await.is_err());
    }
}
