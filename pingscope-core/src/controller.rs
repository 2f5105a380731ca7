//! Query lifecycle: validate, fetch, normalize, build the scene, display.
//!
//! The view state only changes through [`transition`], a pure function of
//! the current state and one [`Event`]. [`InferenceController`] feeds it:
//! every accepted submission gets the next sequence number and runs on its
//! own worker thread, and completions are applied back on the owner's
//! thread in arrival order. A completion that is not newer than the last
//! applied one is dropped, so a slow early request cannot overwrite a newer
//! answer. Requests are never cancelled or retried.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Field, FieldError, NetworkFailure, QueryError};
use crate::model::{decode_inference_body, InferenceQuery, InferenceResult, ModelId};
use crate::scene::{MapScene, SceneBuilder};
use crate::source::InferenceSource;

pub const SUBSCRIBER_REQUIRED: &str = "Subscriber is required";
pub const MODEL_REQUIRED: &str = "Model selection is required";

/// Form contents as the analyst left them; every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryForm {
    pub subscriber_id: Option<u64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub model_id: Option<ModelId>,
}

impl QueryForm {
    pub fn new(subscriber_id: u64, model_id: ModelId) -> Self {
        Self {
            subscriber_id: Some(subscriber_id),
            model_id: Some(model_id),
            ..Self::default()
        }
    }
}

/// Only presence is checked. Time bounds are optional and their order is
/// left to the service.
pub fn validate(form: &QueryForm) -> Result<InferenceQuery, Vec<FieldError>> {
    let mut errors = Vec::new();
    if form.subscriber_id.is_none() {
        errors.push(FieldError::new(Field::SubscriberId, SUBSCRIBER_REQUIRED));
    }
    if form.model_id.is_none() {
        errors.push(FieldError::new(Field::ModelId, MODEL_REQUIRED));
    }
    match (form.subscriber_id, form.model_id) {
        (Some(subscriber_id), Some(model_id)) if errors.is_empty() => Ok(InferenceQuery {
            subscriber_id,
            start_time: form.start_time,
            end_time: form.end_time,
            model_id,
        }),
        _ => Err(errors),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub result: InferenceResult,
    pub scene: MapScene,
}

/// Runs a response body through decode, normalize and scene building.
pub fn process_body(
    body: &str,
    max_pings: usize,
    builder: &SceneBuilder,
) -> Result<Rendered, QueryError> {
    let raw = decode_inference_body(body)?.ok_or(QueryError::NoInference)?;
    let result = InferenceResult::from_raw(raw, max_pings)?;
    let scene = builder.build(&result)?;
    Ok(Rendered { result, scene })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Network trouble or an empty window; dismissible.
    Transient,
    /// The service broke its contract; stays until dismissed.
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub phase: Phase,
    pub displayed: Option<Arc<Rendered>>,
    pub field_errors: Vec<FieldError>,
    pub notice: Option<Notice>,
    pub in_flight: usize,
    pub last_applied: u64,
}

#[derive(Debug, Clone)]
pub enum Event {
    Edited,
    SubmitRequested,
    Rejected(Vec<FieldError>),
    Dispatched { seq: u64 },
    Resolved {
        seq: u64,
        outcome: Result<Arc<Rendered>, QueryError>,
    },
    NoticeDismissed,
}

pub fn transition(mut state: ViewState, event: Event) -> ViewState {
    match event {
        Event::Edited => {
            state.field_errors.clear();
            if matches!(state.phase, Phase::Succeeded | Phase::Failed) {
                state.phase = Phase::Idle;
            }
        }
        Event::SubmitRequested => {
            state.field_errors.clear();
            state.phase = Phase::Validating;
        }
        Event::Rejected(errors) => {
            state.field_errors = errors;
            state.phase = if state.in_flight > 0 {
                Phase::Submitting
            } else {
                Phase::Idle
            };
        }
        Event::Dispatched { .. } => {
            state.in_flight += 1;
            state.notice = None;
            state.phase = Phase::Submitting;
        }
        Event::Resolved { seq, outcome } => {
            state.in_flight = state.in_flight.saturating_sub(1);
            if seq <= state.last_applied {
                return state;
            }
            state.last_applied = seq;
            match outcome {
                Ok(rendered) => {
                    state.displayed = Some(rendered);
                    state.notice = None;
                    state.phase = Phase::Succeeded;
                }
                Err(err) => {
                    let kind = match err {
                        QueryError::Schema(_) => NoticeKind::Fatal,
                        QueryError::Network(_) | QueryError::NoInference => NoticeKind::Transient,
                    };
                    state.notice = Some(Notice {
                        kind,
                        message: err.to_string(),
                    });
                    state.phase = Phase::Failed;
                }
            }
        }
        Event::NoticeDismissed => {
            state.notice = None;
            if state.phase == Phase::Failed {
                state.phase = Phase::Idle;
            }
        }
    }
    state
}

struct Completion {
    seq: u64,
    outcome: Result<String, NetworkFailure>,
}

pub struct InferenceController<S> {
    source: Arc<S>,
    builder: SceneBuilder,
    max_pings: usize,
    state: ViewState,
    next_seq: u64,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl<S: InferenceSource> InferenceController<S> {
    pub fn new(source: S, config: &Config) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source: Arc::new(source),
            builder: SceneBuilder::new(config.map.clone()),
            max_pings: config.max_pings,
            state: ViewState::default(),
            next_seq: 0,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn displayed(&self) -> Option<&Rendered> {
        self.state.displayed.as_deref()
    }

    pub fn edit(&mut self) {
        self.apply(Event::Edited);
    }

    pub fn dismiss_notice(&mut self) {
        self.apply(Event::NoticeDismissed);
    }

    /// Validates the form and, if it passes, starts a request. Returns the
    /// request's sequence number. A submission while others are in flight
    /// starts another independent request.
    pub fn submit(&mut self, form: &QueryForm) -> Result<u64, Vec<FieldError>> {
        self.apply(Event::SubmitRequested);
        let query = match validate(form) {
            Ok(query) => query,
            Err(errors) => {
                debug!(errors = errors.len(), "query rejected");
                self.apply(Event::Rejected(errors.clone()));
                return Err(errors);
            }
        };
        if let (Some(start), Some(end)) = (query.start_time, query.end_time) {
            if start > end {
                warn!(%start, %end, "start is after end; forwarding as given");
            }
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.apply(Event::Dispatched { seq });
        info!(
            seq,
            subscriber = query.subscriber_id,
            model = %query.model_id,
            "submitting inference query"
        );

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| source.fetch(&query)))
                .unwrap_or_else(|_| {
                    Err(NetworkFailure::Transport {
                        reason: "worker panicked".to_string(),
                    })
                });
            // The controller may be gone by now; nothing left to notify.
            let _ = tx.send(Completion { seq, outcome });
        });
        Ok(seq)
    }

    /// Applies whatever completions have already arrived.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.complete(completion);
            applied += 1;
        }
        applied
    }

    /// Blocks for at most `timeout` waiting for one completion.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.complete(completion);
                true
            }
            Err(_) => false,
        }
    }

    /// Waits until nothing is in flight. Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.state.in_flight > 0 {
            let now = Instant::now();
            if now >= deadline || !self.wait(deadline - now) {
                return self.state.in_flight == 0;
            }
        }
        true
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { seq, outcome } = completion;
        let outcome = outcome
            .map_err(QueryError::from)
            .and_then(|body| process_body(&body, self.max_pings, &self.builder))
            .map(Arc::new);
        if seq <= self.state.last_applied {
            debug!(seq, last_applied = self.state.last_applied, "discarding stale response");
        } else {
            match &outcome {
                Ok(rendered) => info!(
                    seq,
                    pings = rendered.result.pings.len(),
                    confidence = rendered.result.confidence_pct,
                    "inference applied"
                ),
                Err(err) => warn!(seq, %err, "inference failed"),
            }
        }
        self.apply(Event::Resolved { seq, outcome });
    }

    fn apply(&mut self, event: Event) {
        let current = std::mem::take(&mut self.state);
        self.state = transition(current, event);
    }
}
