#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tokio::sync::Notify;

use imt_core::clock::FixedClock;
use imt_core::domain::{IncidentDraft, IncidentType, NewIncident, PersistedIncident};
use imt_core::error::AppError;
use imt_core::store::IncidentStore;
use imt_core::validate::ValidationContext;

pub fn t0() -> OffsetDateTime {
    datetime!(2026-03-02 09:00 UTC)
}

/// Validation context whose clock reads ten minutes after `t0()`.
pub fn ctx() -> ValidationContext {
    ctx_at(t0() + Duration::minutes(10))
}

pub fn ctx_at(now: OffsetDateTime) -> ValidationContext {
    ValidationContext::new(Arc::new(FixedClock(now)))
}

pub fn valid_pre_incident() -> IncidentDraft {
    let mut d = IncidentDraft::new(t0());
    d.urgency = Some(3);
    d.impacted_users = Some(25);
    d.application_affected = "Mail".to_string();
    d.locations_affected = "HQ".to_string();
    d.incident_number = "INC100".to_string();
    d.title = "Mail outage".to_string();
    d.description = "Users cannot send mail".to_string();
    d.start_time = Some(t0());
    d.reported_time = Some(t0() + Duration::minutes(5));
    d
}

pub fn valid_major_incident() -> IncidentDraft {
    let mut d = valid_pre_incident();
    d.incident_type = IncidentType::MajorIncident;
    d.incident_number = "INC200".to_string();
    d.title = "Payments down".to_string();
    d.impacted_users = Some(800);
    d.urgency = Some(1);
    d.business_impact = "Card payments failing in all stores".to_string();
    d
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Hang,
}

/// Test double for the persistence collaborator.
pub struct RecordingStore {
    behavior: Behavior,
    calls: AtomicUsize,
    saved: Mutex<Vec<PersistedIncident>>,
    pub save_started: Notify,
}

impl RecordingStore {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            save_started: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn saved(&self) -> Vec<PersistedIncident> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl IncidentStore for RecordingStore {
    async fn save(&self, incident: NewIncident) -> Result<PersistedIncident, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.save_started.notify_one();
        match self.behavior {
            Behavior::Succeed => {
                let mut saved = self.saved.lock().unwrap();
                let persisted = PersistedIncident {
                    id: saved.len() as i64 + 1,
                    incident,
                };
                saved.push(persisted.clone());
                Ok(persisted)
            }
            Behavior::Fail => Err(AppError::new("DB_WRITE_FAILED", "Failed to insert incident")
                .with_details("disk I/O error")
                .with_retryable(true)),
            Behavior::Hang => std::future::pending().await,
        }
    }

    async fn get(&self, id: i64) -> Result<PersistedIncident, AppError> {
        self.saved()
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::new("DB_NOT_FOUND", "Incident not found"))
    }

    async fn list(&self) -> Result<Vec<PersistedIncident>, AppError> {
        Ok(self.saved())
    }
}
