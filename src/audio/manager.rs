//! Exclusive ownership of the single active audio session.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::AudioError;
use crate::params::AnalyzerConfig;

use super::{
    capture, playback, shared_feed, ActiveSource, AudioSession, AudioSourceKind, SampleTap,
    WavSlot,
};

/// What a backend hands back for a successfully opened source.
pub struct OpenedSource {
    /// Keeps the device-side resources alive; stopped on release.
    pub handle: Box<dyn ActiveSource>,
    /// Native sample rate of the opened source.
    pub sample_rate: u32,
}

/// Device access behind the manager, so its ownership rules can be
/// exercised without hardware.
pub trait SourceBackend {
    /// Open the capture device and route its samples into `tap`.
    fn open_microphone(&mut self, tap: SampleTap) -> Result<OpenedSource, AudioError>;

    /// Decode `bytes`, start audible playback, and route the played samples
    /// into `tap`.
    fn open_file(&mut self, bytes: Vec<u8>, tap: SampleTap) -> Result<OpenedSource, AudioError>;
}

/// Default backend: cpal capture, rodio playback.
#[derive(Debug, Default)]
pub struct DeviceBackend;

impl SourceBackend for DeviceBackend {
    fn open_microphone(&mut self, tap: SampleTap) -> Result<OpenedSource, AudioError> {
        capture::open_microphone(tap)
    }

    fn open_file(&mut self, bytes: Vec<u8>, tap: SampleTap) -> Result<OpenedSource, AudioError> {
        playback::open_file(bytes, tap)
    }
}

/// Owns acquisition and teardown of the active [`AudioSession`].
///
/// At most one session exists at any instant; acquiring while one is active
/// fails with [`AudioError::AlreadyActive`]. Callers release explicitly
/// before switching source kinds.
pub struct AudioSourceManager {
    backend: Box<dyn SourceBackend>,
    session: Option<AudioSession>,
    record_path: Option<PathBuf>,
    bin_count: usize,
    feed_capacity: usize,
}

impl AudioSourceManager {
    /// Manager driving the real audio devices.
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_backend(Box::new(DeviceBackend), config)
    }

    /// Manager with an injected backend.
    pub fn with_backend(backend: Box<dyn SourceBackend>, config: &AnalyzerConfig) -> Self {
        Self {
            backend,
            session: None,
            record_path: None,
            bin_count: config.bin_count(),
            feed_capacity: config.feed_capacity(),
        }
    }

    /// Record the mono analysis feed of every subsequent session to a WAV
    /// file at `path`. `None` disables recording.
    pub fn set_record_path(&mut self, path: Option<PathBuf>) {
        self.record_path = path;
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&AudioSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut AudioSession> {
        self.session.as_mut()
    }

    /// Acquire the microphone as the active source.
    pub fn acquire_microphone(&mut self) -> Result<(), AudioError> {
        self.acquire(AudioSourceKind::Microphone, None)
    }

    /// Decode and play `bytes` as the active source.
    pub fn acquire_file(&mut self, bytes: Vec<u8>) -> Result<(), AudioError> {
        self.acquire(AudioSourceKind::File, Some(bytes))
    }

    fn acquire(&mut self, kind: AudioSourceKind, bytes: Option<Vec<u8>>) -> Result<(), AudioError> {
        if self.session.is_some() {
            return Err(AudioError::AlreadyActive);
        }

        let feed = shared_feed(self.feed_capacity);
        // The WAV slot starts empty; the writer is created once the source
        // reports its sample rate. Samples arriving in between are analysis
        // only.
        let wav: Option<WavSlot> = self
            .record_path
            .as_ref()
            .map(|_| Arc::new(Mutex::new(None)));
        let tap = SampleTap::new(Arc::clone(&feed), wav.clone());

        let opened = match kind {
            AudioSourceKind::Microphone => self.backend.open_microphone(tap),
            AudioSourceKind::File => {
                let bytes = bytes.expect("file acquisition requires bytes");
                self.backend.open_file(bytes, tap)
            }
        }?;

        if let (Some(slot), Some(path)) = (&wav, &self.record_path) {
            let spec = hound::WavSpec {
                channels: 1,
                sample_rate: opened.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let writer = hound::WavWriter::create(path, spec)
                .map_err(|e| AudioError::Backend(e.to_string()))?;
            *slot.lock().unwrap() = Some(writer);
            tracing::info!(path = %path.display(), "recording analysis feed");
        }

        self.session = Some(AudioSession::new(
            kind,
            feed,
            opened.handle,
            opened.sample_rate,
            self.bin_count,
            wav,
        ));
        Ok(())
    }

    /// Stop and drop the active session, releasing device handles and
    /// finalizing any recording. Safe to call with no session (no-op).
    pub fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend with scripted outcomes and no hardware.
    struct FakeBackend {
        deny_microphone: bool,
        opened: u32,
        stopped: Arc<Mutex<u32>>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                deny_microphone: false,
                opened: 0,
                stopped: Arc::new(Mutex::new(0)),
            }
        }
    }

    struct FakeSource {
        stopped: Arc<Mutex<u32>>,
    }

    impl ActiveSource for FakeSource {
        fn stop(&mut self) {
            *self.stopped.lock().unwrap() += 1;
        }
    }

    impl SourceBackend for FakeBackend {
        fn open_microphone(&mut self, _tap: SampleTap) -> Result<OpenedSource, AudioError> {
            if self.deny_microphone {
                return Err(AudioError::PermissionDenied);
            }
            self.opened += 1;
            Ok(OpenedSource {
                handle: Box::new(FakeSource {
                    stopped: Arc::clone(&self.stopped),
                }),
                sample_rate: 48_000,
            })
        }

        fn open_file(&mut self, bytes: Vec<u8>, _tap: SampleTap) -> Result<OpenedSource, AudioError> {
            if bytes.is_empty() {
                return Err(AudioError::Decode("empty input".into()));
            }
            self.opened += 1;
            Ok(OpenedSource {
                handle: Box::new(FakeSource {
                    stopped: Arc::clone(&self.stopped),
                }),
                sample_rate: 44_100,
            })
        }
    }

    fn manager_with(backend: FakeBackend) -> AudioSourceManager {
        AudioSourceManager::with_backend(Box::new(backend), &AnalyzerConfig::default())
    }

    #[test]
    fn test_single_session_invariant() {
        let mut manager = manager_with(FakeBackend::new());

        manager.acquire_microphone().unwrap();
        assert!(manager.is_active());
        assert_eq!(
            manager.session().unwrap().kind(),
            AudioSourceKind::Microphone
        );

        // Switching source kinds without a release is rejected and the
        // active session stays untouched.
        let err = manager.acquire_file(vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, AudioError::AlreadyActive));
        assert_eq!(
            manager.session().unwrap().kind(),
            AudioSourceKind::Microphone
        );

        let err = manager.acquire_microphone().unwrap_err();
        assert!(matches!(err, AudioError::AlreadyActive));
    }

    #[test]
    fn test_release_allows_reacquire() {
        let stopped = {
            let backend = FakeBackend::new();
            let stopped = Arc::clone(&backend.stopped);
            let mut manager = manager_with(backend);

            manager.acquire_microphone().unwrap();
            manager.release();
            assert!(!manager.is_active());

            manager.acquire_file(vec![1, 2, 3]).unwrap();
            assert_eq!(manager.session().unwrap().kind(), AudioSourceKind::File);
            manager.release();
            stopped
        };
        assert_eq!(*stopped.lock().unwrap(), 2);
    }

    #[test]
    fn test_release_without_session_is_noop() {
        let mut manager = manager_with(FakeBackend::new());
        manager.release();
        manager.release();
        assert!(!manager.is_active());
    }

    #[test]
    fn test_denied_microphone_leaves_no_session() {
        let mut backend = FakeBackend::new();
        backend.deny_microphone = true;
        let mut manager = manager_with(backend);

        let err = manager.acquire_microphone().unwrap_err();
        assert!(matches!(err, AudioError::PermissionDenied));
        assert!(!manager.is_active());
    }

    #[test]
    fn test_failed_decode_leaves_no_session() {
        let mut manager = manager_with(FakeBackend::new());

        let err = manager.acquire_file(Vec::new()).unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
        assert!(!manager.is_active());
    }
}
