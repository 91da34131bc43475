//! Frame-scheduling state machine tying analysis to deformation.

use std::time::Instant;

use crate::audio::{AudioAnalyzer, AudioSourceKind, AudioSourceManager};
use crate::deform::DeformationEngine;
use crate::error::AudioError;
use crate::mesh::SphereMesh;
use crate::noise::{NoiseField, NoiseSource};
use crate::params::SourceWeights;

/// Observable state of the visualizer.
///
/// `Idle` shows the rest pose with no audio session; `Active` has a session
/// and a running deformation loop. `Idle` is both the initial and the
/// quiescent state; there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerState {
    Idle,
    Active,
}

/// Identifies one scheduled tick so cancellation is always well-defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle(pub u64);

/// "Run on next display frame" primitive supplied by the host.
///
/// The loop holds at most one outstanding handle: a new tick is scheduled
/// only from within the current one, and the handle is cancelled on stop so
/// a stale tick can never fire after teardown.
pub trait FrameScheduler {
    fn schedule_next(&mut self) -> TickHandle;
    fn cancel(&mut self, handle: TickHandle);
}

/// Bookkeeping-only scheduler for hosts that drive ticks themselves (the
/// headless demo, tests). Hands out sequential handles and remembers which
/// one is outstanding.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    issued: u64,
    outstanding: Option<TickHandle>,
}

impl CountingScheduler {
    pub fn outstanding(&self) -> Option<TickHandle> {
        self.outstanding
    }
}

impl FrameScheduler for CountingScheduler {
    fn schedule_next(&mut self) -> TickHandle {
        self.issued += 1;
        let handle = TickHandle(self.issued);
        self.outstanding = Some(handle);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        if self.outstanding == Some(handle) {
            self.outstanding = None;
        }
    }
}

type FrameCallback = Box<dyn FnMut(&SphereMesh)>;
type ErrorCallback = Box<dyn FnMut(&AudioError)>;

/// The per-frame control loop: samples loudness, deforms the mesh, notifies
/// the renderer and reschedules itself while `Active`; releases the audio
/// session and restores the rest pose on stop.
///
/// All collaborators are injected; the loop owns them for its lifetime.
/// `toggle` takes `&mut self` and acquisition is synchronous, so user
/// intents are serialized by construction.
pub struct VisualizerLoop<N = NoiseField>
where
    N: NoiseSource,
{
    state: VisualizerState,
    mesh: SphereMesh,
    engine: DeformationEngine<N>,
    manager: AudioSourceManager,
    analyzer: AudioAnalyzer,
    weights: SourceWeights,
    scheduler: Box<dyn FrameScheduler>,
    scheduled: Option<TickHandle>,
    on_frame: FrameCallback,
    on_error: ErrorCallback,
    started_at: Option<Instant>,
    loudness: f32,
    file_pending: bool,
}

impl<N: NoiseSource> VisualizerLoop<N> {
    /// Wire the loop together and capture the mesh's rest pose.
    pub fn new(
        mut mesh: SphereMesh,
        engine: DeformationEngine<N>,
        manager: AudioSourceManager,
        analyzer: AudioAnalyzer,
        scheduler: Box<dyn FrameScheduler>,
        weights: SourceWeights,
    ) -> Self {
        engine.capture_rest_pose(&mut mesh);
        Self {
            state: VisualizerState::Idle,
            mesh,
            engine,
            manager,
            analyzer,
            weights,
            scheduler,
            scheduled: None,
            on_frame: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            started_at: None,
            loudness: 0.0,
            file_pending: false,
        }
    }

    /// Called after every `deform`/`reset` so the renderer can mark the
    /// vertex buffer dirty.
    pub fn set_on_frame(&mut self, callback: FrameCallback) {
        self.on_frame = callback;
    }

    /// Notification channel for every failure (toasts in a UI host). Each
    /// failure reaches it exactly once.
    pub fn set_on_error(&mut self, callback: ErrorCallback) {
        self.on_error = callback;
    }

    pub fn state(&self) -> VisualizerState {
        self.state
    }

    /// Last sampled loudness in [0, 1]; 0 while idle.
    pub fn loudness(&self) -> f32 {
        self.loudness
    }

    pub fn mesh(&self) -> &SphereMesh {
        &self.mesh
    }

    pub fn has_scheduled_tick(&self) -> bool {
        self.scheduled.is_some()
    }

    pub fn file_pending(&self) -> bool {
        self.file_pending
    }

    /// The UI opened the file picker: suppress microphone toggles until the
    /// selection resolves or is cancelled.
    pub fn begin_file_selection(&mut self) {
        self.file_pending = true;
    }

    pub fn cancel_file_selection(&mut self) {
        self.file_pending = false;
    }

    /// Flip between `Idle` and `Active` on user intent.
    ///
    /// From `Idle` this starts a microphone session (unless a file selection
    /// is pending, which is resolved by [`Self::on_file_selected`] instead).
    /// From `Active` it stops: release the session, restore the rest pose,
    /// cancel the scheduled tick.
    pub fn toggle(&mut self) -> VisualizerState {
        match self.state {
            VisualizerState::Idle => {
                if self.file_pending {
                    return self.state;
                }
                match self.manager.acquire_microphone() {
                    Ok(()) => self.enter_active(),
                    Err(err) => (self.on_error)(&err),
                }
            }
            VisualizerState::Active => self.stop_and_reset(),
        }
        self.state
    }

    /// A file's bytes arrived from the picker (valid in `Idle` only).
    ///
    /// On success playback starts immediately and the loop goes `Active`.
    /// While a session is already running the acquisition is rejected with
    /// `AlreadyActive` and the running session is left untouched.
    pub fn on_file_selected(&mut self, bytes: Vec<u8>) -> VisualizerState {
        self.file_pending = false;
        match self.manager.acquire_file(bytes) {
            Ok(()) => self.enter_active(),
            Err(err) => (self.on_error)(&err),
        }
        self.state
    }

    /// One animation frame: sample loudness, deform, notify the renderer,
    /// reschedule. Only meaningful while `Active`; a stale tick after
    /// teardown is ignored.
    pub fn tick(&mut self) {
        if self.state != VisualizerState::Active {
            debug_assert!(self.scheduled.is_none(), "stale tick fired after teardown");
            return;
        }
        self.scheduled = None;

        let loudness = match self.analyzer.sample_loudness(self.manager.session_mut()) {
            Ok(loudness) => loudness,
            Err(err) => {
                // Lost preconditions mid-loop: surface once, abort the loop
                // and fall back to the rest pose.
                (self.on_error)(&err);
                self.stop_and_reset();
                return;
            }
        };
        self.loudness = loudness;

        let kind = self
            .manager
            .session()
            .map(|s| s.kind())
            .unwrap_or(AudioSourceKind::Microphone);
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_secs_f32())
            .unwrap_or_default();

        self.engine
            .deform(&mut self.mesh, loudness, elapsed, self.weights.for_kind(kind));
        (self.on_frame)(&self.mesh);

        self.scheduled = Some(self.scheduler.schedule_next());
    }

    fn enter_active(&mut self) {
        self.started_at = Some(Instant::now());
        self.state = VisualizerState::Active;
        self.scheduled = Some(self.scheduler.schedule_next());
    }

    fn stop_and_reset(&mut self) {
        self.manager.release();
        self.engine.reset(&mut self.mesh);
        (self.on_frame)(&self.mesh);
        if let Some(handle) = self.scheduled.take() {
            self.scheduler.cancel(handle);
        }
        self.loudness = 0.0;
        self.started_at = None;
        self.state = VisualizerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::f32::consts::PI;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::audio::{ActiveSource, OpenedSource, SampleTap, SourceBackend};
    use crate::params::AnalyzerConfig;

    /// Hardware-free backend; microphone denial is scriptable.
    struct FakeBackend {
        deny_microphone: bool,
    }

    struct FakeSource;

    impl ActiveSource for FakeSource {
        fn stop(&mut self) {}
    }

    impl SourceBackend for FakeBackend {
        fn open_microphone(&mut self, _tap: SampleTap) -> Result<OpenedSource, AudioError> {
            if self.deny_microphone {
                return Err(AudioError::PermissionDenied);
            }
            Ok(OpenedSource {
                handle: Box::new(FakeSource),
                sample_rate: 48_000,
            })
        }

        fn open_file(&mut self, bytes: Vec<u8>, _tap: SampleTap) -> Result<OpenedSource, AudioError> {
            if bytes.is_empty() {
                return Err(AudioError::Decode("empty input".into()));
            }
            Ok(OpenedSource {
                handle: Box::new(FakeSource),
                sample_rate: 44_100,
            })
        }
    }

    fn build_loop(deny_microphone: bool) -> (VisualizerLoop, Rc<RefCell<Vec<String>>>) {
        let config = AnalyzerConfig {
            smoothing: 0.0,
            ..Default::default()
        };
        let manager = AudioSourceManager::with_backend(
            Box::new(FakeBackend { deny_microphone }),
            &config,
        );
        let mut visualizer = VisualizerLoop::new(
            SphereMesh::new(5.0, 1),
            DeformationEngine::new(42),
            manager,
            AudioAnalyzer::new(config),
            Box::new(CountingScheduler::default()),
            SourceWeights::default(),
        );

        let errors: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errors);
        visualizer.set_on_error(Box::new(move |err| sink.borrow_mut().push(err.to_string())));
        (visualizer, errors)
    }

    /// Fill the active session's feed with a full-scale sine window.
    fn feed_loud_signal(visualizer: &VisualizerLoop) {
        let session = visualizer
            .manager
            .session()
            .expect("active session required");
        let feed = session.feed();
        let mut guard = feed.lock().unwrap();
        for i in 0..256 {
            guard.push((2.0 * PI * 4.0 * i as f32 / 256.0).sin());
        }
    }

    #[test]
    fn test_toggle_starts_and_stops_microphone() {
        let (mut visualizer, errors) = build_loop(false);
        assert_eq!(visualizer.state(), VisualizerState::Idle);

        assert_eq!(visualizer.toggle(), VisualizerState::Active);
        assert!(visualizer.has_scheduled_tick());

        feed_loud_signal(&visualizer);
        visualizer.tick();
        assert!(visualizer.loudness() > 0.0);
        assert_ne!(
            visualizer.mesh().live_positions(),
            visualizer.mesh().rest_positions()
        );

        assert_eq!(visualizer.toggle(), VisualizerState::Idle);
        assert_eq!(
            visualizer.mesh().live_positions(),
            visualizer.mesh().rest_positions()
        );
        assert!(!visualizer.has_scheduled_tick());
        assert!(!visualizer.manager.is_active());
        assert_eq!(visualizer.loudness(), 0.0);
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn test_denied_microphone_stays_idle_with_one_notification() {
        let (mut visualizer, errors) = build_loop(true);
        let rest: Vec<_> = visualizer.mesh().live_positions().to_vec();

        assert_eq!(visualizer.toggle(), VisualizerState::Idle);

        assert_eq!(visualizer.state(), VisualizerState::Idle);
        assert!(!visualizer.has_scheduled_tick());
        assert_eq!(visualizer.mesh().live_positions(), rest.as_slice());
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("permission"));
    }

    #[test]
    fn test_file_selection_goes_active_and_switch_is_rejected() {
        let (mut visualizer, errors) = build_loop(false);

        visualizer.begin_file_selection();
        // Toggle is a no-op while the picker is open.
        assert_eq!(visualizer.toggle(), VisualizerState::Idle);
        assert!(errors.borrow().is_empty());

        assert_eq!(
            visualizer.on_file_selected(vec![1, 2, 3]),
            VisualizerState::Active
        );
        assert!(!visualizer.file_pending());

        // Selecting another file mid-session must not disturb the running
        // session.
        assert_eq!(
            visualizer.on_file_selected(vec![4, 5, 6]),
            VisualizerState::Active
        );
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("already active"));
        assert_eq!(
            visualizer.manager.session().unwrap().kind(),
            AudioSourceKind::File
        );
    }

    #[test]
    fn test_failed_decode_surfaces_and_stays_idle() {
        let (mut visualizer, errors) = build_loop(false);

        assert_eq!(visualizer.on_file_selected(Vec::new()), VisualizerState::Idle);
        assert_eq!(errors.borrow().len(), 1);
        assert!(!visualizer.has_scheduled_tick());
    }

    #[test]
    fn test_silent_session_holds_rest_pose() {
        let (mut visualizer, _errors) = build_loop(false);
        visualizer.toggle();

        // No samples at all: loudness 0, mesh pinned to the rest pose.
        for _ in 0..3 {
            visualizer.tick();
        }
        assert_eq!(visualizer.loudness(), 0.0);
        assert_eq!(
            visualizer.mesh().live_positions(),
            visualizer.mesh().rest_positions()
        );
    }

    #[test]
    fn test_stale_tick_after_stop_is_ignored() {
        let (mut visualizer, errors) = build_loop(false);
        visualizer.toggle();
        visualizer.toggle();

        let rest: Vec<_> = visualizer.mesh().live_positions().to_vec();
        visualizer.tick();
        assert_eq!(visualizer.state(), VisualizerState::Idle);
        assert_eq!(visualizer.mesh().live_positions(), rest.as_slice());
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn test_frame_callback_fires_on_deform_and_reset() {
        let (mut visualizer, _errors) = build_loop(false);
        let frames = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&frames);
        visualizer.set_on_frame(Box::new(move |_mesh| {
            *counter.lock().unwrap() += 1;
        }));

        visualizer.toggle();
        visualizer.tick();
        visualizer.tick();
        visualizer.toggle();

        // Two deforms plus the reset on stop.
        assert_eq!(*frames.lock().unwrap(), 3);
    }

    #[test]
    fn test_restart_after_stop_works() {
        let (mut visualizer, errors) = build_loop(false);

        visualizer.toggle();
        visualizer.tick();
        visualizer.toggle();
        visualizer.toggle();
        assert_eq!(visualizer.state(), VisualizerState::Active);
        visualizer.toggle();
        assert_eq!(visualizer.state(), VisualizerState::Idle);
        assert!(errors.borrow().is_empty());
    }
}
