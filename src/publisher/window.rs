//! Bounded FIFO of live seeding sessions.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use magnetcast_common::{ContentId, EventBus, EventPayload, SessionId};
use magnetcast_content::{ContentPublisher, SeedHandle};

/// An artifact being seeded because its segment was resolved in this process.
#[derive(Debug, Clone)]
pub struct SeedingSession {
    pub id: SessionId,
    pub path: PathBuf,
    pub handle: SeedHandle,
    pub admitted_at: DateTime<Utc>,
}

impl SeedingSession {
    pub fn new(path: PathBuf, handle: SeedHandle) -> Self {
        Self {
            id: SessionId::new(),
            path,
            handle,
            admitted_at: Utc::now(),
        }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.handle.content_id
    }
}

/// Keeps at most `capacity` sessions alive, destroying the oldest on overflow.
pub struct SeedingWindow {
    capacity: usize,
    sessions: VecDeque<SeedingSession>,
    provider: Arc<dyn ContentPublisher>,
    events: Option<Arc<EventBus>>,
}

impl SeedingWindow {
    pub fn new(capacity: usize, provider: Arc<dyn ContentPublisher>) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: VecDeque::with_capacity(capacity.max(1) + 1),
            provider,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Add a session at the tail; returns the sessions evicted to stay within
    /// capacity, oldest first.
    pub async fn admit(&mut self, session: SeedingSession) -> Vec<SeedingSession> {
        tracing::debug!(
            session_id = %session.id,
            path = %session.path.display(),
            "Admitting seeding session"
        );
        self.broadcast(EventPayload::SessionAdmitted {
            session_id: session.id,
            content_id: session.content_id().clone(),
        });
        self.sessions.push_back(session);

        let mut evicted = Vec::new();
        while self.sessions.len() > self.capacity {
            let Some(oldest) = self.sessions.pop_front() else {
                break;
            };
            tracing::info!(
                session_id = %oldest.id,
                path = %oldest.path.display(),
                "Evicting oldest seeding session"
            );
            self.destroy(&oldest).await;
            evicted.push(oldest);
        }
        evicted
    }

    /// Destroy every remaining session.
    pub async fn shutdown(&mut self) {
        let count = self.sessions.len();
        while let Some(session) = self.sessions.pop_front() {
            self.destroy(&session).await;
        }
        if count > 0 {
            tracing::info!(sessions = count, "Seeding window shut down");
        }
    }

    /// Live sessions, oldest first.
    pub fn live(&self) -> impl Iterator<Item = &SeedingSession> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn destroy(&self, session: &SeedingSession) {
        self.provider.stop_seeding(&session.handle).await;
        self.broadcast(EventPayload::SessionEvicted {
            session_id: session.id,
            content_id: session.content_id().clone(),
        });
    }

    fn broadcast(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.broadcast(payload);
        }
    }
}
