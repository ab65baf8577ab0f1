use crate::config::MemotionConfig;
use crate::engine::{EngineOutput, SessionEngine};
use crate::error::RegistryError;
use crate::landmarks::LandmarkSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A live session and when it last received a frame
struct SessionHandle {
    engine: Arc<Mutex<SessionEngine>>,
    user_id: String,
    last_activity: Instant,
}

/// Multi-session front door: one engine per id, idle sessions evicted
pub struct SessionRegistry {
    config: MemotionConfig,
    timeout: Duration,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(config: MemotionConfig) -> Self {
        let timeout = Duration::from_secs(config.session.timeout_s);
        Self {
            config,
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create an engine for `user_id` and return its session id
    pub fn create_session(&self, user_id: &str) -> String {
        let engine = SessionEngine::new(self.config.clone()).with_user_id(user_id);
        let id = engine.instance_id().to_string();

        self.sessions.lock().insert(
            id.clone(),
            SessionHandle {
                engine: Arc::new(Mutex::new(engine)),
                user_id: user_id.to_string(),
                last_activity: Instant::now(),
            },
        );
        info!("Created session {} for user {}", id, user_id);
        id
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<SessionEngine>>> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|handle| Arc::clone(&handle.engine))
    }

    pub fn process_frame(
        &self,
        session_id: &str,
        landmarks: &LandmarkSet,
        face_landmarks: Option<&LandmarkSet>,
        timestamp_ms: u64,
    ) -> Result<EngineOutput, RegistryError> {
        self.process_frame_at(
            session_id,
            landmarks,
            face_landmarks,
            timestamp_ms,
            Instant::now(),
        )
    }

    fn process_frame_at(
        &self,
        session_id: &str,
        landmarks: &LandmarkSet,
        face_landmarks: Option<&LandmarkSet>,
        timestamp_ms: u64,
        now: Instant,
    ) -> Result<EngineOutput, RegistryError> {
        let engine = {
            let mut sessions = self.sessions.lock();
            let handle =
                sessions
                    .get_mut(session_id)
                    .ok_or_else(|| RegistryError::SessionNotFound {
                        session_id: session_id.to_string(),
                    })?;

            if now.saturating_duration_since(handle.last_activity) > self.timeout {
                sessions.remove(session_id);
                info!("Session {} expired", session_id);
                return Err(RegistryError::SessionExpired {
                    session_id: session_id.to_string(),
                });
            }

            handle.last_activity = now;
            Arc::clone(&handle.engine)
        };

        // The map lock is released before the frame is processed
        let mut engine = engine.lock();
        Ok(engine.process_frame(landmarks, face_landmarks, timestamp_ms))
    }

    pub fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().remove(session_id);
        if let Some(handle) = &removed {
            info!("Removed session {} ({})", session_id, handle.user_id);
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    /// Evict sessions idle longer than the timeout; returns their ids
    pub fn sweep_expired(&self, now: Instant) -> Vec<String> {
        let mut sessions = self.sessions.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| now.saturating_duration_since(handle.last_activity) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            info!("Evicted {} idle sessions", expired.len());
        }
        expired
    }

    /// Run `sweep_expired` every `interval` until `token` is cancelled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Session sweeper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let expired = registry.sweep_expired(Instant::now());
                        debug!("Sweep finished, {} sessions evicted", expired.len());
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::standing_pose;

    fn create_test_config(timeout_s: u64) -> MemotionConfig {
        let mut config = MemotionConfig::default();
        config.session.timeout_s = timeout_s;
        config
    }

    #[test]
    fn test_create_and_process() {
        let registry = SessionRegistry::new(create_test_config(3600));
        let id = registry.create_session("u1");

        assert_eq!(registry.len(), 1);
        assert!(uuid::Uuid::parse_str(&id).is_ok());

        let output = registry
            .process_frame(&id, &standing_pose(), None, 0)
            .unwrap();
        assert_eq!(output.phase, 1);

        let engine = registry.get(&id).unwrap();
        assert_eq!(engine.lock().user_id(), "u1");
        assert_eq!(engine.lock().last_activity_ms(), Some(0));
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new(create_test_config(3600));
        let result = registry.process_frame("nope", &standing_pose(), None, 0);

        assert_eq!(
            result,
            Err(RegistryError::SessionNotFound {
                session_id: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_idle_session_expires() {
        let registry = SessionRegistry::new(create_test_config(60));
        let id = registry.create_session("u1");
        let later = Instant::now() + Duration::from_secs(120);

        let result = registry.process_frame_at(&id, &standing_pose(), None, 0, later);
        assert_eq!(
            result,
            Err(RegistryError::SessionExpired {
                session_id: id.clone()
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_keeps_active_sessions() {
        let registry = SessionRegistry::new(create_test_config(60));
        let idle = registry.create_session("idle");
        let active = registry.create_session("active");

        let soon = Instant::now() + Duration::from_secs(45);
        registry
            .process_frame_at(&active, &standing_pose(), None, 0, soon)
            .unwrap();

        let expired = registry.sweep_expired(soon + Duration::from_secs(30));
        assert_eq!(expired, vec![idle]);
        assert_eq!(registry.session_ids(), vec![active.clone()]);

        assert!(registry.remove(&active));
        assert!(!registry.remove(&active));
    }

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops() {
        let registry = Arc::new(SessionRegistry::new(create_test_config(0)));
        registry.create_session("u1");

        let token = CancellationToken::new();
        let handle = registry.spawn_sweeper(Duration::from_millis(10), token.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.is_empty());

        token.cancel();
        handle.await.unwrap();
    }
}
