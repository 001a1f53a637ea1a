use super::state::{BoothSnapshot, BoothState, CaptureMode, PrintingState};
use super::SceneHooks;
use crate::animation::AnimationExporter;
use crate::camera::{CameraBackend, CameraSession, SessionState};
use crate::capture::{placeholder_frames, take_snapshot, SequencerEffect, SequencerEvent, SequencerState};
use crate::clock::TimestampFormatter;
use crate::config::PhotoboothConfig;
use crate::error::{CameraError, PhotoboothError, Result};
use crate::events::{BoothEvent, EventBus};
use crate::export::{ArtifactKind, DownloadReceipt, ExportAdapter};
use crate::frame::{CapturedFrame, FrameVariant};
use crate::strip::{CompositeStrip, StripCompositor};
use crate::stylize::stylize_set_async;
use crate::typography::Fonts;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capture flow controller: owns the photo set and drives every pipeline
///
/// Cloning is cheap and every clone drives the same booth.
#[derive(Clone)]
pub struct PhotoBooth {
    inner: Arc<BoothInner>,
}

struct BoothInner {
    config: PhotoboothConfig,
    hooks: SceneHooks,
    fonts: Fonts,
    camera: CameraSession,
    compositor: StripCompositor,
    animator: AnimationExporter,
    exporter: ExportAdapter,
    event_bus: Arc<EventBus>,
    state: Mutex<BoothState>,
    snapshot_tx: watch::Sender<BoothSnapshot>,
    cancellation_token: CancellationToken,
}

impl PhotoBooth {
    pub fn new(config: PhotoboothConfig, backend: Arc<dyn CameraBackend>, hooks: SceneHooks) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let fonts = Fonts::load(&config.strip.font_path, &config.strip.mono_font_path);
        let timestamps = TimestampFormatter::system(config.system.timestamp_timezone.as_deref());

        let camera = CameraSession::with_event_bus(backend, config.camera.clone(), Some(Arc::clone(&event_bus)));
        let compositor = StripCompositor::new(&config.strip, fonts.clone(), timestamps.clone());
        let animator = AnimationExporter::new(
            &config.animation,
            config.capture.frame_size,
            config.strip.decode_timeout(),
            fonts.clone(),
            timestamps,
        );
        let exporter = ExportAdapter::new(&config.export);

        let state = BoothState::new(config.capture.max_photos, config.capture.countdown_from);
        let (snapshot_tx, _) = watch::channel(state.snapshot(camera.state(), hooks.test_mode));

        Self {
            inner: Arc::new(BoothInner {
                config,
                hooks,
                fonts,
                camera,
                compositor,
                animator,
                exporter,
                event_bus,
                state: Mutex::new(state),
                snapshot_tx,
                cancellation_token: CancellationToken::new(),
            }),
        }
    }

    /// Enter the booth
    ///
    /// In test mode the placeholder set is loaded and printed without a
    /// camera; otherwise the camera is requested. A camera failure is not an
    /// error here, it shows up in the snapshot with its retry offer.
    pub async fn start(&self) -> Result<()> {
        self.spawn_camera_watcher();
        self.spawn_preview_cycler();

        if self.inner.hooks.test_mode {
            let config = &self.inner.config.capture;
            let frames = placeholder_frames(config.max_photos, config.frame_size, &self.inner.fonts)?;

            let epoch = {
                let mut state = self.inner.state.lock();
                for frame in frames {
                    state.photos.push(frame)?;
                }
                state.sequencer = SequencerState::completed(config.max_photos, config.countdown_from);
                state.epoch
            };
            self.publish();
            info!("Test mode: {} placeholder photos loaded", config.max_photos);

            let booth = self.clone();
            let delay = config.test_mode_delay();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                booth.finish_capture(epoch).await;
            });
            return Ok(());
        }

        if let Err(e) = self.start_camera().await {
            warn!("Camera unavailable at start: {}", e);
        }
        Ok(())
    }

    async fn start_camera(&self) -> std::result::Result<(), CameraError> {
        if self.inner.hooks.test_mode {
            return Ok(());
        }
        let result = self.inner.camera.acquire(self.inner.config.camera.facing).await;
        self.publish();
        result
    }

    /// Ask for the camera again after a refusal
    pub async fn retry_camera(&self) -> std::result::Result<bool, CameraError> {
        let allowed = {
            let state = self.inner.state.lock();
            !state.exited && state.mode == CaptureMode::Camera
        };
        if !allowed || self.inner.hooks.test_mode {
            debug!("Camera retry ignored");
            return Ok(false);
        }
        info!("Retrying camera");
        self.start_camera().await?;
        Ok(true)
    }

    /// Start the countdown for the next photo
    ///
    /// Returns false when capture is not possible right now: wrong mode,
    /// camera not ready, a countdown already running or the set full.
    pub fn trigger_capture(&self) -> bool {
        if self.inner.hooks.test_mode {
            return false;
        }
        let camera = self.inner.camera.state();

        let started = {
            let mut state = self.inner.state.lock();
            if !state.can_capture(&camera) {
                None
            } else {
                let (next, effect) = state.sequencer.step(SequencerEvent::Trigger);
                state.sequencer = next;
                match effect {
                    SequencerEffect::CountdownStarted(n) => Some((state.epoch, n)),
                    _ => None,
                }
            }
        };

        let Some((epoch, from)) = started else {
            debug!("Capture trigger ignored");
            return false;
        };

        self.publish();
        self.inner.event_bus.notify(BoothEvent::CountdownTick { remaining: from });

        let booth = self.clone();
        tokio::spawn(async move {
            booth.run_countdown(epoch).await;
        });
        true
    }

    async fn run_countdown(&self, epoch: u64) {
        let interval = self.inner.config.capture.countdown_interval();
        let mut pause = true;

        loop {
            if pause {
                tokio::time::sleep(interval).await;
            }
            let Some(effect) = self.step_sequencer(epoch, SequencerEvent::Tick) else {
                debug!("Countdown for a discarded set dropped");
                return;
            };
            match effect {
                SequencerEffect::CountdownTick(remaining) => {
                    self.inner.event_bus.notify(BoothEvent::CountdownTick { remaining });
                    // The shot follows the last beat without another pause
                    pause = remaining > 0;
                }
                SequencerEffect::TakeSnapshot => break,
                other => {
                    warn!("Countdown stopped on unexpected transition {:?}", other);
                    return;
                }
            }
        }

        self.capture_single_frame(epoch).await;
    }

    async fn capture_single_frame(&self, epoch: u64) {
        let live = self.inner.camera.read_frame().await;
        let index = self.inner.state.lock().photos.next_index();
        let size = self.inner.config.capture.frame_size;

        let shot = tokio::task::spawn_blocking(move || take_snapshot(live.as_ref(), index, size)).await;
        let shot = match shot {
            Ok(shot) => shot,
            Err(e) => {
                error!("Snapshot task failed: {}", e);
                self.step_sequencer(epoch, SequencerEvent::SnapshotSkipped);
                return;
            }
        };

        let outcome = self.update(epoch, |state| {
            let taken = match shot {
                Ok(frame) => state.photos.push(frame).map_err(|e| e.to_string()),
                Err(reason) => Err(reason.to_string()),
            };
            let event = match taken {
                Ok(_) => SequencerEvent::SnapshotTaken,
                Err(_) => SequencerEvent::SnapshotSkipped,
            };
            let (next, effect) = state.sequencer.step(event);
            state.sequencer = next;
            (effect, taken.err(), state.photos.max_photos())
        });

        let Some((effect, skipped, total)) = outcome else {
            debug!("Snapshot for a discarded set dropped");
            return;
        };

        if let Some(reason) = skipped {
            self.inner.event_bus.notify(BoothEvent::SnapshotSkipped { reason });
            return;
        }

        match effect {
            SequencerEffect::Captured(n) => {
                self.inner.event_bus.notify(BoothEvent::PhotoCaptured { index: n, total });
            }
            SequencerEffect::Completed(n) => {
                self.inner.event_bus.notify(BoothEvent::PhotoCaptured { index: n, total });
                self.inner.event_bus.notify(BoothEvent::CaptureCompleted { count: n });
                self.finish_capture(epoch).await;
            }
            other => debug!("Snapshot transition {:?}", other),
        }
    }

    /// Release the camera, print the strip and, in test mode, save it
    pub(super) async fn finish_capture(&self, epoch: u64) {
        // A retake bumps the epoch before it reacquires, so its stream is never released here
        if !self.inner.camera.release_if(|| self.is_current(epoch)).await {
            debug!("Finish for a discarded set dropped");
            return;
        }

        let frames = self.update(epoch, |state| {
            state.mode = CaptureMode::PreviewNormal;
            state.printing = PrintingState::Generating;
            state.preview_index = 0;
            state.photos.originals().to_vec()
        });
        let Some(frames) = frames else {
            return;
        };
        info!("Printing strip of {} photos", frames.len());

        let strip = match self.inner.compositor.compose(&frames).await {
            Ok(strip) => Arc::new(strip),
            Err(e) => {
                error!("Failed to print strip: {}", e);
                self.inner.event_bus.notify(BoothEvent::SystemError {
                    component: "strip".to_string(),
                    error: e.to_string(),
                });
                self.update(epoch, |state| state.printing = PrintingState::Idle);
                return;
            }
        };

        if self
            .update(epoch, |state| state.printed_strip = Some(Arc::clone(&strip)))
            .is_none()
        {
            return;
        }

        tokio::time::sleep(self.inner.config.strip.print_start_delay()).await;
        if self.update(epoch, |state| state.printing = PrintingState::Animating).is_none() {
            return;
        }

        tokio::time::sleep(self.inner.config.strip.print_duration()).await;
        if self.update(epoch, |state| state.printing = PrintingState::Done).is_none() {
            return;
        }

        if self.inner.hooks.test_mode {
            let filename = self.inner.config.export.test_strip_filename.clone();
            match self.save_strip(&strip, &filename, FrameVariant::Original).await {
                Ok(receipt) => info!("Test strip saved to {}", receipt.path.display()),
                Err(e) => error!("Failed to save test strip: {}", e),
            }
        }
    }

    /// Pixelate the whole set, then show it
    ///
    /// Allowed only from the original preview. Returns false when refused or
    /// when a retake discarded the set before the transform finished.
    pub async fn make_pixel(&self) -> Result<bool> {
        let started = {
            let mut state = self.inner.state.lock();
            if state.can_stylize() {
                state.mode = CaptureMode::Processing;
                Some((state.epoch, state.photos.originals().to_vec()))
            } else {
                None
            }
        };
        let Some((epoch, originals)) = started else {
            debug!("Stylize request ignored");
            return Ok(false);
        };
        self.publish();
        self.inner.event_bus.notify(BoothEvent::ModeChanged {
            mode: CaptureMode::Processing,
        });

        tokio::time::sleep(self.inner.config.stylize.processing_delay()).await;
        if !self.is_current(epoch) {
            return Ok(false);
        }

        let stylized = match stylize_set_async(originals, self.inner.config.stylize.pixel_factor).await {
            Ok(stylized) => stylized,
            Err(e) => {
                self.update(epoch, |state| state.mode = CaptureMode::PreviewNormal);
                return Err(e.into());
            }
        };
        let count = stylized.len();

        let stored = self.update(epoch, |state| match state.photos.set_stylized(stylized) {
            Ok(()) => {
                state.mode = CaptureMode::PreviewPixel;
                state.preview_index = 0;
                Ok(())
            }
            Err(e) => {
                state.mode = CaptureMode::PreviewNormal;
                Err(PhotoboothError::from(e))
            }
        });
        match stored {
            Some(result) => result?,
            None => return Ok(false),
        }

        self.inner.event_bus.notify(BoothEvent::StylizeCompleted { count });
        Ok(true)
    }

    /// Compose the strip of `variant` and save it under its download name
    pub async fn download_strip(&self, variant: FrameVariant) -> Result<DownloadReceipt> {
        let (epoch, frames) = self.frames_for(variant)?;
        let strip = self.inner.compositor.compose(&frames).await?;

        if !self.is_current(epoch) {
            return Err(PhotoboothError::export("photo set was discarded"));
        }
        let filename = self.inner.exporter.filename_for(ArtifactKind::Strip, variant);
        self.save_strip(&strip, &filename, variant).await
    }

    /// Encode the animation of `variant` and save it under its download name
    pub async fn download_animation(&self, variant: FrameVariant) -> Result<DownloadReceipt> {
        let (epoch, frames) = self.frames_for(variant)?;

        let claimed = self.update(epoch, |state| {
            if state.generating_animation {
                false
            } else {
                state.generating_animation = true;
                true
            }
        });
        if claimed != Some(true) {
            return Err(PhotoboothError::export("an animation is already being generated"));
        }

        let encoded = self.inner.animator.encode(&frames).await;
        if self
            .update(epoch, |state| state.generating_animation = false)
            .is_none()
        {
            return Err(PhotoboothError::export("photo set was discarded"));
        }
        let artifact = encoded?;

        let filename = self.inner.exporter.filename_for(ArtifactKind::Animation, variant);
        let receipt = self.inner.exporter.download_as_file(&artifact.bytes, &filename).await?;
        self.inner.event_bus.notify(BoothEvent::ArtifactExported {
            filename: receipt.filename.clone(),
            variant,
            bytes: receipt.bytes,
        });
        Ok(receipt)
    }

    async fn save_strip(&self, strip: &CompositeStrip, filename: &str, variant: FrameVariant) -> Result<DownloadReceipt> {
        let strip = strip.clone();
        let bytes = tokio::task::spawn_blocking(move || strip.encode_png())
            .await
            .map_err(|e| PhotoboothError::system(format!("strip encode task failed: {}", e)))??;

        let receipt = self.inner.exporter.download_as_file(&bytes, filename).await?;
        self.inner.event_bus.notify(BoothEvent::ArtifactExported {
            filename: receipt.filename.clone(),
            variant,
            bytes: receipt.bytes,
        });
        Ok(receipt)
    }

    fn frames_for(&self, variant: FrameVariant) -> Result<(u64, Vec<CapturedFrame>)> {
        let state = self.inner.state.lock();
        if state.exited || !state.photos.is_full() {
            return Err(PhotoboothError::export("the photo set is not complete"));
        }
        match state.photos.frames(variant) {
            Some(frames) => Ok((state.epoch, frames.to_vec())),
            None => Err(PhotoboothError::export(format!("no {} photos yet", variant.label()))),
        }
    }

    /// Discard the set and go back to the camera
    ///
    /// Refused while stylizing, while the strip prints or while an animation
    /// is being generated.
    pub async fn retake(&self) -> bool {
        let accepted = {
            let mut state = self.inner.state.lock();
            if state.can_retake() {
                state.reset();
                true
            } else {
                false
            }
        };
        if !accepted {
            debug!("Retake refused");
            return false;
        }

        info!("Retake: photo set discarded");
        self.publish();
        self.inner.event_bus.notify(BoothEvent::RetakeRequested {
            timestamp: SystemTime::now(),
        });
        self.inner.event_bus.notify(BoothEvent::ModeChanged {
            mode: CaptureMode::Camera,
        });

        if let Err(e) = self.start_camera().await {
            warn!("Camera unavailable after retake: {}", e);
        }
        true
    }

    /// Leave the booth and hand control back to the scene controller
    pub async fn restart(&self) {
        info!("Restart requested");
        self.exit().await;
        self.inner.event_bus.notify(BoothEvent::RestartRequested {
            timestamp: SystemTime::now(),
        });
        if let Some(on_restart) = &self.inner.hooks.on_restart {
            on_restart();
        }
    }

    /// Stop every task and release the camera; safe to call repeatedly
    pub async fn exit(&self) {
        let first = {
            let mut state = self.inner.state.lock();
            let first = !state.exited;
            state.exited = true;
            state.epoch += 1;
            first
        };
        self.inner.cancellation_token.cancel();
        self.inner.camera.release().await;
        self.publish();
        if first {
            info!("Photobooth closed");
        }
    }

    pub fn snapshot(&self) -> BoothSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoothSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.event_bus)
    }

    pub fn camera(&self) -> &CameraSession {
        &self.inner.camera
    }

    pub fn exporter(&self) -> &ExportAdapter {
        &self.inner.exporter
    }

    /// Strip printed for the current set
    pub fn printed_strip(&self) -> Option<Arc<CompositeStrip>> {
        self.inner.state.lock().printed_strip.clone()
    }

    /// Frames of the current set in capture order
    pub fn photos(&self, variant: FrameVariant) -> Vec<CapturedFrame> {
        self.inner
            .state
            .lock()
            .photos
            .frames(variant)
            .map(|frames| frames.to_vec())
            .unwrap_or_default()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.state.lock().epoch == epoch
    }

    /// Apply `f` if no retake happened since `epoch`, then publish
    fn update<R>(&self, epoch: u64, f: impl FnOnce(&mut BoothState) -> R) -> Option<R> {
        let (result, mode_change, printing_change) = {
            let mut state = self.inner.state.lock();
            if state.epoch != epoch {
                return None;
            }
            let (mode, printing) = (state.mode, state.printing);
            let result = f(&mut state);
            (
                result,
                (state.mode != mode).then_some(state.mode),
                (state.printing != printing).then_some(state.printing),
            )
        };

        self.publish();
        if let Some(mode) = mode_change {
            self.inner.event_bus.notify(BoothEvent::ModeChanged { mode });
        }
        if let Some(state) = printing_change {
            self.inner.event_bus.notify(BoothEvent::PrintingChanged { state });
        }
        Some(result)
    }

    fn step_sequencer(&self, epoch: u64, event: SequencerEvent) -> Option<SequencerEffect> {
        self.update(epoch, |state| {
            let (next, effect) = state.sequencer.step(event);
            state.sequencer = next;
            effect
        })
    }

    fn publish(&self) {
        let camera = self.inner.camera.state();
        let snapshot = self.inner.state.lock().snapshot(camera, self.inner.hooks.test_mode);
        self.inner.snapshot_tx.send_replace(snapshot);
    }

    /// Mirror camera session changes into the booth snapshot
    fn spawn_camera_watcher(&self) {
        let booth = self.clone();
        let mut camera_rx = self.inner.camera.subscribe();
        let token = self.inner.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = camera_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let camera: SessionState = *camera_rx.borrow_and_update();
                        debug!("Booth sees camera {}", camera);
                        booth.publish();
                    }
                }
            }
        });
    }

    /// Advance the preview frame while a preview is showing
    fn spawn_preview_cycler(&self) {
        let booth = self.clone();
        let token = self.inner.cancellation_token.clone();
        let period = self.inner.config.system.preview_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let advanced = {
                            let mut state = booth.inner.state.lock();
                            let len = state.photos.len();
                            if state.is_previewing() && len > 0 {
                                state.preview_index = (state.preview_index + 1) % len;
                                true
                            } else {
                                false
                            }
                        };
                        if advanced {
                            booth.publish();
                        }
                    }
                }
            }
        });
    }
}
