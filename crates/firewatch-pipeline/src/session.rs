//! Realtime session manager.
//!
//! One webcam session at a time. The slot owns the opened device until a
//! feed claims it; the feed's loop owns it afterwards and clears the slot
//! when it exits.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info};

use firewatch_media::{FrameSource, MediaResult};
use firewatch_models::{StartStatus, StopStatus};

enum Slot {
    Idle,
    Running {
        generation: u64,
        device: Option<Box<dyn FrameSource>>,
        stop: watch::Sender<bool>,
    },
}

/// A claimed device handed to the feed that will run the loop.
pub struct SessionClaim {
    pub generation: u64,
    pub device: Box<dyn FrameSource>,
    pub stop: watch::Receiver<bool>,
}

#[derive(Default)]
struct Inner {
    slot: Option<Slot>,
    next_generation: u64,
}

/// Lock-guarded session slot.
#[derive(Default)]
pub struct RealtimeSessions {
    inner: Mutex<Inner>,
}

impl RealtimeSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a session with a device from `open`. `open` is only called when
    /// idle; if it fails the slot stays idle.
    pub fn start_with<F>(&self, open: F) -> MediaResult<StartStatus>
    where
        F: FnOnce() -> MediaResult<Box<dyn FrameSource>>,
    {
        let mut inner = self.lock();
        if matches!(inner.slot, Some(Slot::Running { .. })) {
            return Ok(StartStatus::AlreadyRunning);
        }

        let device = open()?;
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (stop, _) = watch::channel(false);
        inner.slot = Some(Slot::Running {
            generation,
            device: Some(device),
            stop,
        });

        info!(generation, "Webcam session started");
        Ok(StartStatus::Started)
    }

    /// Hand the running session's device to a feed. `None` when idle or
    /// when another feed already holds it.
    pub fn claim(&self) -> Option<SessionClaim> {
        let mut inner = self.lock();
        match inner.slot.as_mut() {
            Some(Slot::Running {
                generation,
                device,
                stop,
            }) => {
                let device = device.take()?;
                debug!(generation = *generation, "Webcam device claimed");
                Some(SessionClaim {
                    generation: *generation,
                    device,
                    stop: stop.subscribe(),
                })
            }
            _ => None,
        }
    }

    /// Signal the running loop to stop. An unclaimed device is released here.
    pub fn stop(&self) -> StopStatus {
        let mut inner = self.lock();
        match inner.slot.take() {
            Some(Slot::Running {
                generation,
                device,
                stop,
            }) => {
                let _ = stop.send(true);
                if let Some(mut device) = device {
                    device.release();
                }
                info!(generation, "Webcam session stopped");
                StopStatus::Stopped
            }
            other => {
                inner.slot = other;
                StopStatus::NotRunning
            }
        }
    }

    /// Called by the loop on exit; clears the slot if it still belongs to
    /// `generation`.
    pub fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        if let Some(Slot::Running { generation: g, .. }) = inner.slot.as_ref() {
            if *g == generation {
                inner.slot = None;
                info!(generation, "Webcam session ended");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lock().slot, Some(Slot::Running { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use firewatch_media::MediaError;
    use image::RgbImage;

    struct CountingDevice {
        releases: Arc<AtomicUsize>,
        open: bool,
    }

    impl FrameSource for CountingDevice {
        fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
            Ok(self.open.then(|| RgbImage::new(2, 2)))
        }
        fn is_open(&self) -> bool {
            self.open
        }
        fn fps(&self) -> f64 {
            30.0
        }
        fn dimensions(&self) -> (u32, u32) {
            (2, 2)
        }
        fn release(&mut self) {
            if self.open {
                self.open = false;
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn opener(releases: &Arc<AtomicUsize>) -> impl FnOnce() -> MediaResult<Box<dyn FrameSource>> {
        let releases = releases.clone();
        move || {
            Ok(Box::new(CountingDevice {
                releases,
                open: true,
            }) as Box<dyn FrameSource>)
        }
    }

    #[test]
    fn test_start_stop_messages() {
        let releases = Arc::new(AtomicUsize::new(0));
        let sessions = RealtimeSessions::new();

        assert_eq!(sessions.start_with(opener(&releases)).unwrap(), StartStatus::Started);
        assert_eq!(
            sessions.start_with(opener(&releases)).unwrap(),
            StartStatus::AlreadyRunning
        );
        assert_eq!(sessions.stop(), StopStatus::Stopped);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(sessions.stop(), StopStatus::NotRunning);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_when_idle_touches_nothing() {
        let sessions = RealtimeSessions::new();
        assert_eq!(sessions.stop(), StopStatus::NotRunning);
        assert!(!sessions.is_running());
    }

    #[test]
    fn test_failed_open_stays_idle() {
        let sessions = RealtimeSessions::new();
        let result = sessions.start_with(|| Err(MediaError::CameraUnavailable("none".into())));
        assert!(result.is_err());
        assert!(!sessions.is_running());
    }

    #[test]
    fn test_claim_once_and_stop_signals_loop() {
        let releases = Arc::new(AtomicUsize::new(0));
        let sessions = RealtimeSessions::new();
        sessions.start_with(opener(&releases)).unwrap();

        let claim = sessions.claim().unwrap();
        assert!(sessions.claim().is_none());
        assert!(!*claim.stop.borrow());

        assert_eq!(sessions.stop(), StopStatus::Stopped);
        assert!(*claim.stop.borrow());
        // claimed device belongs to the loop, not released by stop
        assert_eq!(releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_finish_only_clears_own_generation() {
        let releases = Arc::new(AtomicUsize::new(0));
        let sessions = RealtimeSessions::new();
        sessions.start_with(opener(&releases)).unwrap();
        let old = sessions.claim().unwrap();
        sessions.stop();
        sessions.start_with(opener(&releases)).unwrap();

        sessions.finish(old.generation);
        assert!(sessions.is_running());

        let current = sessions.claim().unwrap();
        sessions.finish(current.generation);
        assert!(!sessions.is_running());
    }
}
