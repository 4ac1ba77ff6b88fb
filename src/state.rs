use std::{
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    api::{ApiError, MortgageService},
    domain::{Mortgage, MortgageId, MortgageInput, RatingResult},
};

pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Fetch,
    Create,
    Update,
    Delete,
    Rate,
}

impl OpKind {
    fn success_message(self) -> Option<&'static str> {
        match self {
            Self::Create => Some("Mortgage application created successfully"),
            Self::Update => Some("Mortgage application updated successfully"),
            Self::Delete => Some("Mortgage application deleted successfully"),
            Self::Fetch | Self::Rate => None,
        }
    }

    fn failure_fallback(self) -> &'static str {
        match self {
            Self::Fetch => "Failed to fetch mortgage applications",
            Self::Create => "Failed to create mortgage application",
            Self::Update => "Failed to update mortgage application",
            Self::Delete => "Failed to delete mortgage application",
            Self::Rate => "Failed to calculate credit rating",
        }
    }

    fn notifies(self) -> bool {
        self.success_message().is_some()
    }
}

/// Outcome of the most recent request of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpStatus {
    #[default]
    Idle,
    Pending {
        seq: u64,
    },
    Ok {
        seq: u64,
    },
    Err {
        seq: u64,
        message: String,
    },
}

impl OpStatus {
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Pending { seq } | Self::Ok { seq } | Self::Err { seq, .. } => Some(*seq),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpTable {
    pub fetch: OpStatus,
    pub create: OpStatus,
    pub update: OpStatus,
    pub delete: OpStatus,
    pub rate: OpStatus,
}

impl OpTable {
    pub fn get(&self, kind: OpKind) -> &OpStatus {
        match kind {
            OpKind::Fetch => &self.fetch,
            OpKind::Create => &self.create,
            OpKind::Update => &self.update,
            OpKind::Delete => &self.delete,
            OpKind::Rate => &self.rate,
        }
    }

    fn get_mut(&mut self, kind: OpKind) -> &mut OpStatus {
        match kind {
            OpKind::Fetch => &mut self.fetch,
            OpKind::Create => &mut self.create,
            OpKind::Update => &mut self.update,
            OpKind::Delete => &mut self.delete,
            OpKind::Rate => &mut self.rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub visible: bool,
    pub message: String,
    pub severity: Severity,
    #[serde(skip)]
    pub seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppState {
    pub mortgages: Vec<Mortgage>,
    pub loading: bool,
    pub error: Option<String>,
    pub notification: Notification,
    /// Last record created in this session, or whatever the UI selected.
    pub current: Option<Mortgage>,
    pub ops: OpTable,
}

impl AppState {
    pub fn find(&self, id: &MortgageId) -> Option<&Mortgage> {
        self.mortgages.iter().find(|m| &m.id == id)
    }
}

/// What to do with a settlement when a newer request of the same kind has
/// been issued since.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Apply every settlement in the order it arrives.
    #[default]
    Apply,
    /// Drop settlements superseded by a newer request of the same kind.
    DiscardStale,
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub stale_policy: StalePolicy,
    /// `None` keeps notifications up until dismissed.
    pub notification_timeout: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            stale_policy: StalePolicy::Apply,
            notification_timeout: Some(DEFAULT_NOTIFICATION_TIMEOUT),
        }
    }
}

/// Shared handle to the application state.
///
/// Cloning is cheap; all clones observe and mutate the same state. Every
/// transition is a single `watch` update, so subscribers never see a
/// half-applied settlement.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<dyn MortgageService>,
    state: watch::Sender<AppState>,
    options: StoreOptions,
    next_seq: AtomicU64,
}

impl Store {
    pub fn new(service: Arc<dyn MortgageService>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(AppState::default());
        Self {
            inner: Arc::new(Inner {
                service,
                state,
                options,
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.subscribe()
    }

    pub async fn fetch_mortgages(&self) -> Result<Vec<Mortgage>, ApiError> {
        let seq = self.begin(OpKind::Fetch);
        let result = self.inner.service.list_mortgages().await;
        self.settle(OpKind::Fetch, seq, &result, |s, list| {
            s.mortgages = list.clone();
        });
        result
    }

    pub async fn create_mortgage(&self, input: MortgageInput) -> Result<Mortgage, ApiError> {
        let seq = self.begin(OpKind::Create);
        let result = self.inner.service.create_mortgage(input).await;
        self.settle(OpKind::Create, seq, &result, |s, created| {
            match s.mortgages.iter().position(|m| m.id == created.id) {
                Some(i) => s.mortgages[i] = created.clone(),
                None => s.mortgages.push(created.clone()),
            }
            s.current = Some(created.clone());
        });
        result
    }

    pub async fn update_mortgage(
        &self,
        id: MortgageId,
        input: MortgageInput,
    ) -> Result<Mortgage, ApiError> {
        let seq = self.begin(OpKind::Update);
        let result = self.inner.service.update_mortgage(id, input).await;
        self.settle(OpKind::Update, seq, &result, |s, updated| {
            if let Some(existing) = s.mortgages.iter_mut().find(|m| m.id == updated.id) {
                *existing = updated.clone();
            }
        });
        result
    }

    pub async fn delete_mortgage(&self, id: MortgageId) -> Result<(), ApiError> {
        let seq = self.begin(OpKind::Delete);
        let result = self.inner.service.delete_mortgage(id.clone()).await;
        self.settle(OpKind::Delete, seq, &result, |s, _| {
            s.mortgages.retain(|m| m.id != id);
        });
        result
    }

    pub async fn calculate_rating(&self, id: MortgageId) -> Result<RatingResult, ApiError> {
        let seq = self.begin(OpKind::Rate);
        let result = self.inner.service.calculate_rating(id).await;
        self.settle(OpKind::Rate, seq, &result, apply_rating);
        result
    }

    /// Reads the stored rating without asking the backend to recompute it.
    pub async fn refresh_rating(&self, id: MortgageId) -> Result<RatingResult, ApiError> {
        let seq = self.begin(OpKind::Rate);
        let result = self.inner.service.get_rating(id).await;
        self.settle(OpKind::Rate, seq, &result, apply_rating);
        result
    }

    pub fn dismiss_notification(&self) {
        self.inner.state.send_if_modified(|s| {
            let was_visible = s.notification.visible;
            s.notification.visible = false;
            was_visible
        });
    }

    pub fn show_notification(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        let seq = self.next_seq();
        self.inner.state.send_modify(|s| {
            s.notification = Notification {
                visible: true,
                message,
                severity,
                seq,
            };
        });
        self.schedule_dismiss(seq);
    }

    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|s| s.error.take().is_some());
    }

    pub fn set_current(&self, mortgage: Option<Mortgage>) {
        self.inner.state.send_modify(|s| s.current = mortgage);
    }

    /// Back to the empty initial state. Requests still in flight settle into
    /// the fresh state when they complete.
    pub fn reset(&self) {
        self.inner.state.send_replace(AppState::default());
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn begin(&self, kind: OpKind) -> u64 {
        let seq = self.next_seq();
        self.inner.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            *s.ops.get_mut(kind) = OpStatus::Pending { seq };
        });
        debug!(?kind, seq, "request pending");
        seq
    }

    fn settle<T>(
        &self,
        kind: OpKind,
        seq: u64,
        result: &Result<T, ApiError>,
        apply: impl FnOnce(&mut AppState, &T),
    ) {
        let stale_policy = self.inner.options.stale_policy;
        let mut shown = None;
        self.inner.state.send_if_modified(|s| {
            if stale_policy == StalePolicy::DiscardStale
                && s.ops.get(kind).seq().is_some_and(|latest| latest > seq)
            {
                debug!(?kind, seq, "dropping superseded response");
                return false;
            }

            s.loading = false;
            match result {
                Ok(value) => {
                    apply(s, value);
                    *s.ops.get_mut(kind) = OpStatus::Ok { seq };
                    if let Some(message) = kind.success_message() {
                        let nseq = self.next_seq();
                        s.notification = Notification {
                            visible: true,
                            message: message.to_string(),
                            severity: Severity::Success,
                            seq: nseq,
                        };
                        shown = Some(nseq);
                    }
                    debug!(?kind, seq, "request fulfilled");
                }
                Err(err) => {
                    let message = err
                        .message()
                        .unwrap_or_else(|| kind.failure_fallback().to_string());
                    s.error = Some(message.clone());
                    if kind.notifies() {
                        let nseq = self.next_seq();
                        s.notification = Notification {
                            visible: true,
                            message: message.clone(),
                            severity: Severity::Error,
                            seq: nseq,
                        };
                        shown = Some(nseq);
                    }
                    *s.ops.get_mut(kind) = OpStatus::Err { seq, message };
                    debug!(?kind, seq, error = %err, "request rejected");
                }
            }
            true
        });

        if let Some(nseq) = shown {
            self.schedule_dismiss(nseq);
        }
    }

    fn schedule_dismiss(&self, seq: u64) {
        let Some(timeout) = self.inner.options.notification_timeout else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                inner.state.send_if_modified(|s| {
                    if s.notification.visible && s.notification.seq == seq {
                        s.notification.visible = false;
                        true
                    } else {
                        false
                    }
                });
            }
        });
    }
}

fn apply_rating(s: &mut AppState, rating: &RatingResult) {
    match s.mortgages.iter_mut().find(|m| m.id == rating.mortgage_id) {
        Some(m) => m.credit_rating = Some(rating.rating),
        None => debug!(
            mortgage_id = %rating.mortgage_id,
            "rating for a record not held locally; ignored"
        ),
    }
}
