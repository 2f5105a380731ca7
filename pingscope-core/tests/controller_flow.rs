use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pingscope_core::{
    ColorToken, Config, Field, InferenceController, InferenceQuery, InferenceSource, ModelId,
    NetworkFailure, NoticeKind, Phase, QueryForm,
};

const WAIT: Duration = Duration::from_secs(5);

const MIXED_BODY: &str = r#"{
    "interval_start": "2024-11-26T00:10:00Z",
    "interval_end": "2024-11-26T04:50:00Z",
    "ping_count": 3,
    "confidence_pct": "72.50",
    "method": 1,
    "subscriber": 12,
    "state": "NY",
    "pings": [
        {"ping_id": 1, "subscriber": 12, "utc_time": "2024-11-26T00:10:00Z",
         "cell_type": "voice", "geom": "SRID=4326;POINT (-74.0060 40.7128)", "state": "NY"},
        {"ping_id": 2, "subscriber": 12, "utc_time": "2024-11-26T02:00:00Z",
         "cell_type": "data", "geom": "POINT(???)", "state": "NY"},
        {"ping_id": 3, "subscriber": 12, "utc_time": "2024-11-26T04:50:00Z",
         "cell_type": "sms", "geom": "SRID=4326;POINT (-73.7781 40.6413)", "state": "NY"}
    ]
}"#;

fn body_for(subscriber: u64, state: &str, cell_type: &str) -> String {
    format!(
        r#"{{"interval_start": "2024-11-26T00:00:00Z", "interval_end": "2024-11-26T01:00:00Z",
            "ping_count": 1, "confidence_pct": 91.0, "method": 2, "subscriber": {subscriber},
            "state": "{state}",
            "pings": [{{"utc_time": "2024-11-26T00:30:00Z", "cell_type": "{cell_type}",
                        "geom": "POINT (-97.74 30.27)", "state": "{state}"}}]}}"#
    )
}

#[derive(Default)]
struct MockSource {
    replies: HashMap<u64, (Duration, Result<String, NetworkFailure>)>,
    seen: Mutex<Vec<InferenceQuery>>,
}

impl MockSource {
    fn reply(mut self, subscriber: u64, body: &str) -> Self {
        self.replies
            .insert(subscriber, (Duration::ZERO, Ok(body.to_string())));
        self
    }

    fn slow_reply(mut self, subscriber: u64, delay: Duration, body: &str) -> Self {
        self.replies.insert(subscriber, (delay, Ok(body.to_string())));
        self
    }

    fn fail(mut self, subscriber: u64, status: u16) -> Self {
        self.replies.insert(
            subscriber,
            (
                Duration::ZERO,
                Err(NetworkFailure::Status {
                    status,
                    url: format!("/api/subscribers/{subscriber}/infer/"),
                }),
            ),
        );
        self
    }
}

impl InferenceSource for MockSource {
    fn fetch(&self, query: &InferenceQuery) -> Result<String, NetworkFailure> {
        self.seen.lock().unwrap().push(query.clone());
        let (delay, reply) = self
            .replies
            .get(&query.subscriber_id)
            .cloned()
            .unwrap_or((Duration::ZERO, Ok("null".to_string())));
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        reply
    }
}

fn controller(source: MockSource) -> (InferenceController<Arc<MockSource>>, Arc<MockSource>) {
    let source = Arc::new(source);
    let ctl = InferenceController::new(Arc::clone(&source), &Config::default());
    (ctl, source)
}

#[test]
fn end_to_end_query_builds_scene() {
    let (mut ctl, source) = controller(MockSource::default().reply(12, MIXED_BODY));
    let form = QueryForm {
        start_time: Some("2024-11-26T00:00:00Z".parse().unwrap()),
        end_time: Some("2024-11-26T05:00:00Z".parse().unwrap()),
        ..QueryForm::new(12, ModelId::MajorityVote)
    };

    let seq = ctl.submit(&form).unwrap();
    assert_eq!(seq, 1);
    assert_eq!(ctl.state().phase, Phase::Submitting);
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.phase, Phase::Succeeded);
    assert!(state.notice.is_none());
    let shown = ctl.displayed().unwrap();
    assert_eq!(shown.result.pings.len(), 2);
    assert_eq!(shown.result.confidence_pct, 72.5);
    assert_eq!(shown.scene.markers.len(), 2);
    let overlay = shown.scene.overlay.as_ref().unwrap();
    assert!(overlay.radius_meters > 0.0);
    assert_eq!(shown.scene.overlay_color, ColorToken::Yellow);
    assert!(shown.scene.badge.text.contains("72.5"));
    assert_eq!(shown.scene.auto_fit_to(), Some(overlay));

    let seen = source.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        seen[0].query_pairs(),
        vec![
            ("start", "2024-11-26T00:00:00Z".to_string()),
            ("end", "2024-11-26T05:00:00Z".to_string()),
            ("model_id", "1".to_string()),
        ]
    );
}

#[test]
fn missing_subscriber_never_hits_the_network() {
    let (mut ctl, source) = controller(MockSource::default().reply(12, MIXED_BODY));
    let form = QueryForm {
        model_id: Some(ModelId::MajorityVote),
        ..QueryForm::default()
    };

    let errors = ctl.submit(&form).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, Field::SubscriberId);
    assert_eq!(ctl.state().phase, Phase::Idle);
    assert_eq!(ctl.state().field_errors, errors);
    assert_eq!(ctl.state().in_flight, 0);
    assert_eq!(ctl.poll(), 0);
    assert!(source.seen.lock().unwrap().is_empty());
}

#[test]
fn slow_earlier_request_does_not_overwrite_newer_result() {
    let (mut ctl, _source) = controller(
        MockSource::default()
            .slow_reply(1, Duration::from_millis(300), &body_for(1, "CA", "data"))
            .reply(2, &body_for(2, "TX", "voice")),
    );

    ctl.submit(&QueryForm::new(1, ModelId::Clustering)).unwrap();
    ctl.submit(&QueryForm::new(2, ModelId::Clustering)).unwrap();
    assert_eq!(ctl.state().in_flight, 2);
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.last_applied, 2);
    assert_eq!(state.phase, Phase::Succeeded);
    let shown = ctl.displayed().unwrap();
    assert_eq!(shown.result.subscriber_id, 2);
    assert_eq!(shown.result.predicted_state, "TX");
}

#[test]
fn failure_keeps_the_previous_result() {
    let (mut ctl, _source) = controller(
        MockSource::default()
            .reply(5, &body_for(5, "FL", "sms"))
            .fail(6, 502),
    );

    ctl.submit(&QueryForm::new(5, ModelId::MajorityVote)).unwrap();
    assert!(ctl.wait_idle(WAIT));
    ctl.edit();
    assert_eq!(ctl.state().phase, Phase::Idle);

    ctl.submit(&QueryForm::new(6, ModelId::MajorityVote)).unwrap();
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.phase, Phase::Failed);
    let notice = state.notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Transient);
    assert!(notice.message.contains("502"));
    assert_eq!(ctl.displayed().unwrap().result.subscriber_id, 5);

    ctl.dismiss_notice();
    assert_eq!(ctl.state().phase, Phase::Idle);
    assert_eq!(ctl.displayed().unwrap().result.subscriber_id, 5);
}

#[test]
fn unknown_cell_type_surfaces_without_partial_scene() {
    let (mut ctl, _source) = controller(MockSource::default().reply(8, &body_for(8, "WA", "fax")));

    ctl.submit(&QueryForm::new(8, ModelId::MajorityVote)).unwrap();
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.phase, Phase::Failed);
    assert!(state.displayed.is_none());
    let notice = state.notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Fatal);
    assert!(notice.message.contains("fax"));
}

#[test]
fn empty_window_is_reported_not_rendered() {
    let (mut ctl, _source) = controller(MockSource::default().reply(9, "[]"));

    ctl.submit(&QueryForm::new(9, ModelId::MajorityVote)).unwrap();
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.phase, Phase::Failed);
    assert!(state.displayed.is_none());
    assert_eq!(state.notice.as_ref().unwrap().kind, NoticeKind::Transient);
}

struct PanickingSource;

impl InferenceSource for PanickingSource {
    fn fetch(&self, _query: &InferenceQuery) -> Result<String, NetworkFailure> {
        panic!("collaborator blew up");
    }
}

#[test]
fn panicking_source_still_resolves_the_request() {
    let mut ctl = InferenceController::new(PanickingSource, &Config::default());

    ctl.submit(&QueryForm::new(4, ModelId::MajorityVote)).unwrap();
    assert!(ctl.wait_idle(WAIT));

    let state = ctl.state();
    assert_eq!(state.in_flight, 0);
    assert_eq!(state.phase, Phase::Failed);
    let notice = state.notice.as_ref().unwrap();
    assert_eq!(notice.kind, NoticeKind::Transient);
    assert!(notice.message.contains("worker panicked"));
}
