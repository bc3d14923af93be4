use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::{info, warn};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use uuid::Uuid;

use crate::{
    backend::{ResultSink, SubmissionResult},
    bridge::TrackingEvent,
    errors::SessionError,
    permissions::CapabilityGate,
};

use super::{SessionPhase, SessionSnapshot, SessionState};

/// Orchestrates the workout session lifecycle: Start/Stop transitions, the
/// 1 Hz elapsed-time ticker, inbound tracking events, and result submission.
///
/// The controller is the sole owner of `SessionState`; everything else feeds
/// it inputs. UI layers observe state through the watch channel.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    gate: Arc<dyn CapabilityGate>,
    sink: Arc<dyn ResultSink>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    updates: Arc<watch::Sender<SessionState>>,
}

impl SessionController {
    pub fn new(gate: Arc<dyn CapabilityGate>, sink: Arc<dyn ResultSink>) -> Self {
        let (updates, _) = watch::channel(SessionState::new());
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            gate,
            sink,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            updates: Arc::new(updates),
        }
    }

    /// Observe session state changes (phase transitions, readiness, ticks).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    pub async fn get_state(&self) -> SessionState {
        let mut guard = self.state.lock().await;
        guard.sync_elapsed_from_anchor();
        guard.clone()
    }

    /// Start a workout. Refused unless camera and microphone are granted
    /// (missing ones are requested once) and the tracker reported ready.
    pub async fn start(&self) -> Result<SessionState, SessionError> {
        let mut status = self.gate.check().await;
        if !status.all_granted() {
            status = self.gate.request_missing().await;
        }
        if !status.all_granted() {
            return Err(SessionError::PermissionDenied {
                missing: status.missing(),
            });
        }

        let session_id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().await;
            if state.phase != SessionPhase::Idle {
                return Err(SessionError::AlreadyActive);
            }
            if !state.ready {
                return Err(SessionError::NotReady {
                    posture_direction: state.posture_direction.clone(),
                });
            }
            state.begin(session_id.clone(), Utc::now(), Instant::now());
        }

        self.spawn_ticker().await;

        // Re-anchor right before publishing so ticker setup time is not
        // counted against the session.
        {
            let mut state = self.state.lock().await;
            state.running_anchor = Some(Instant::now());
            state.elapsed_seconds = 0;
        }

        info!("workout session {session_id} started");
        self.publish().await;
        Ok(self.get_state().await)
    }

    /// Stop the workout: snapshot the final values, cancel the ticker,
    /// submit exactly once, and return to Idle regardless of the outcome.
    pub async fn stop(&self) -> Result<(SessionSnapshot, SubmissionResult), SessionError> {
        let stopped_at = Utc::now();

        let snapshot = {
            let mut state = self.state.lock().await;
            state
                .capture_snapshot(stopped_at)
                .ok_or(SessionError::NotActive)?
        };

        self.cancel_ticker().await;
        self.publish().await;

        info!(
            "workout session {} stopped: {} reps in {}s, submitting",
            snapshot.session_id, snapshot.rep_count, snapshot.elapsed_seconds
        );
        let result = self.sink.submit(&snapshot).await;
        if !result.accepted {
            warn!(
                "workout session {} submission not accepted: {}",
                snapshot.session_id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        {
            let mut state = self.state.lock().await;
            state.settle();
        }
        self.publish().await;

        Ok((snapshot, result))
    }

    /// Apply a decoded tracking event. Counter updates are discarded outside
    /// the Active phase; readiness applies in any phase but never
    /// force-stops a running session.
    pub async fn handle_event(&self, event: TrackingEvent) {
        match event {
            TrackingEvent::Counter { count } => {
                let applied = self.state.lock().await.apply_counter(count);
                if applied {
                    self.publish().await;
                }
            }
            TrackingEvent::Readiness {
                ready,
                posture_direction,
            } => {
                self.state
                    .lock()
                    .await
                    .apply_readiness(ready, posture_direction);
                self.publish().await;
            }
            TrackingEvent::Unknown { raw } => {
                // Info carrier without usable fields; prior readiness stays
                // in force.
                log::debug!("unhandled tracker message: {raw}");
            }
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let updates = self.updates.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            loop {
                interval.tick().await;

                let snapshot = {
                    let mut guard = state.lock().await;
                    if guard.phase != SessionPhase::Active {
                        break;
                    }
                    guard.sync_elapsed_from_anchor();
                    guard.clone()
                };

                updates.send_replace(snapshot);
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn publish(&self) {
        let mut guard = self.state.lock().await;
        guard.sync_elapsed_from_anchor();
        self.updates.send_replace(guard.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SubmissionResult;
    use crate::permissions::{CapabilityGate, CapabilityStatus};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct ScriptedGate {
        on_check: CapabilityStatus,
        on_request: CapabilityStatus,
    }

    impl ScriptedGate {
        fn granted() -> Self {
            Self {
                on_check: CapabilityStatus::granted(),
                on_request: CapabilityStatus::granted(),
            }
        }

        fn denied() -> Self {
            let denied = CapabilityStatus {
                camera_granted: false,
                microphone_granted: false,
            };
            Self {
                on_check: denied,
                on_request: denied,
            }
        }

        fn granted_on_request() -> Self {
            Self {
                on_check: CapabilityStatus {
                    camera_granted: true,
                    microphone_granted: false,
                },
                on_request: CapabilityStatus::granted(),
            }
        }
    }

    #[async_trait]
    impl CapabilityGate for ScriptedGate {
        async fn check(&self) -> CapabilityStatus {
            self.on_check
        }

        async fn request_missing(&self) -> CapabilityStatus {
            self.on_request
        }
    }

    struct RecordingSink {
        accepted: bool,
        submissions: StdMutex<Vec<SessionSnapshot>>,
    }

    impl RecordingSink {
        fn accepting() -> Self {
            Self {
                accepted: true,
                submissions: StdMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                accepted: false,
                submissions: StdMutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<SessionSnapshot> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultSink for RecordingSink {
        async fn submit(&self, snapshot: &SessionSnapshot) -> SubmissionResult {
            self.submissions.lock().unwrap().push(snapshot.clone());
            if self.accepted {
                SubmissionResult::accepted(Some(90))
            } else {
                SubmissionResult::failed("network down")
            }
        }
    }

    fn controller(gate: ScriptedGate, sink: Arc<RecordingSink>) -> SessionController {
        SessionController::new(Arc::new(gate), sink)
    }

    async fn mark_ready(controller: &SessionController) {
        controller
            .handle_event(TrackingEvent::Readiness {
                ready: true,
                posture_direction: None,
            })
            .await;
    }

    /// Let spawned tasks (the ticker) run after a paused-clock advance.
    async fn drain_tasks() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn counter_before_start_is_discarded() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);

        controller
            .handle_event(TrackingEvent::Counter { count: 7 })
            .await;

        assert_eq!(controller.get_state().await.rep_count, 0);
    }

    #[tokio::test]
    async fn start_refused_until_tracker_ready() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);

        controller
            .handle_event(TrackingEvent::Readiness {
                ready: false,
                posture_direction: Some("left".to_string()),
            })
            .await;

        match controller.start().await {
            Err(SessionError::NotReady { posture_direction }) => {
                assert_eq!(posture_direction.as_deref(), Some("left"));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }

        mark_ready(&controller).await;
        let state = controller.start().await.expect("start");
        assert_eq!(state.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn start_refused_when_permissions_stay_denied() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::denied(), sink);
        mark_ready(&controller).await;

        match controller.start().await {
            Err(SessionError::PermissionDenied { missing }) => {
                assert_eq!(missing, "camera and microphone");
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
        assert_eq!(controller.get_state().await.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn start_requests_missing_permissions_once() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted_on_request(), sink);
        mark_ready(&controller).await;

        let state = controller.start().await.expect("start after request");
        assert_eq!(state.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn second_start_is_refused_while_active() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        assert!(matches!(
            controller.start().await,
            Err(SessionError::AlreadyActive)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_resets_counter_and_elapsed() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        controller
            .handle_event(TrackingEvent::Counter { count: 9 })
            .await;
        time::advance(Duration::from_secs(20)).await;
        drain_tasks().await;
        controller.stop().await.expect("stop");

        let state = controller.start().await.expect("restart");
        assert_eq!(state.rep_count, 0);
        assert_eq!(state.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_snapshot_is_deterministic_and_late_counters_are_discarded() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink.clone());
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        controller
            .handle_event(TrackingEvent::Counter { count: 12 })
            .await;
        time::advance(Duration::from_secs(45)).await;
        drain_tasks().await;

        let (snapshot, result) = controller.stop().await.expect("stop");
        assert_eq!(snapshot.rep_count, 12);
        assert_eq!(snapshot.elapsed_seconds, 45);
        assert!(result.accepted);
        assert_eq!(result.server_score, Some(90));

        // A counter sent before Stop but delivered after it must not land.
        controller
            .handle_event(TrackingEvent::Counter { count: 13 })
            .await;
        let state = controller.get_state().await;
        assert_eq!(state.rep_count, 0);
        assert_eq!(state.phase, SessionPhase::Idle);

        let recorded = sink.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].rep_count, 12);
        assert_eq!(recorded[0].elapsed_seconds, 45);
    }

    #[tokio::test]
    async fn stop_without_active_session_is_refused() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        assert!(matches!(
            controller.stop().await,
            Err(SessionError::NotActive)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_reports_elapsed_and_stops_after_idle() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;
        let updates = controller.subscribe();

        controller.start().await.expect("start");
        time::advance(Duration::from_secs(3)).await;
        drain_tasks().await;

        assert_eq!(controller.get_state().await.elapsed_seconds, 3);
        assert_eq!(updates.borrow().elapsed_seconds, 3);

        controller.stop().await.expect("stop");
        time::advance(Duration::from_secs(5)).await;
        drain_tasks().await;

        // No tick is observable after the transition to Idle.
        let latest = updates.borrow().clone();
        assert_eq!(latest.phase, SessionPhase::Idle);
        assert_eq!(latest.elapsed_seconds, 0);
        assert_eq!(controller.get_state().await.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_produces_a_single_fresh_tick_stream() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        time::advance(Duration::from_secs(10)).await;
        drain_tasks().await;
        controller.stop().await.expect("stop");

        controller.start().await.expect("restart");
        time::advance(Duration::from_secs(2)).await;
        drain_tasks().await;

        // A doubled tick stream would overshoot the advanced time.
        assert_eq!(controller.get_state().await.elapsed_seconds, 2);
    }

    #[tokio::test]
    async fn submission_failure_still_returns_to_idle() {
        let sink = Arc::new(RecordingSink::failing());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        let (_, result) = controller.stop().await.expect("stop");
        assert!(!result.accepted);
        assert_eq!(result.error_message.as_deref(), Some("network down"));

        assert_eq!(controller.get_state().await.phase, SessionPhase::Idle);
        let state = controller.start().await.expect("start after failure");
        assert_eq!(state.phase, SessionPhase::Active);
    }

    #[tokio::test]
    async fn losing_readiness_does_not_stop_an_active_session() {
        let sink = Arc::new(RecordingSink::accepting());
        let controller = controller(ScriptedGate::granted(), sink);
        mark_ready(&controller).await;

        controller.start().await.expect("start");
        controller
            .handle_event(TrackingEvent::Readiness {
                ready: false,
                posture_direction: Some("right".to_string()),
            })
            .await;

        let state = controller.get_state().await;
        assert_eq!(state.phase, SessionPhase::Active);
        assert!(!state.ready);

        // The next session is what gets re-gated.
        controller.stop().await.expect("stop");
        assert!(matches!(
            controller.start().await,
            Err(SessionError::NotReady { .. })
        ));
    }
}
