use super::{ExitReason, KeyCommand, KeyboardInputHandler};
use crate::booth::{PhotoBooth, SceneHooks};
use crate::camera::create_backend;
use crate::config::PhotoboothConfig;
use crate::error::{PhotoboothError, Result};
use crate::frame::FrameVariant;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs booths until the user quits, building a fresh one after every restart
pub struct BoothApp {
    config: PhotoboothConfig,
    test_mode: bool,
    keyboard_enabled: bool,
    cancellation_token: CancellationToken,
}

impl BoothApp {
    pub fn new(config: PhotoboothConfig, test_mode: bool) -> Self {
        Self {
            config,
            test_mode,
            keyboard_enabled: false,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Read commands from the terminal while running
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Cancelling this token ends [`BoothApp::run`] as a user request
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Booth whose restart hook signals `restart_tx`
    pub fn build_booth(&self, restart_tx: mpsc::UnboundedSender<()>) -> PhotoBooth {
        let backend = create_backend(&self.config.camera);
        info!("Camera backend: {}", backend.name());

        let hooks = SceneHooks::new(self.test_mode).with_restart(move || {
            let _ = restart_tx.send(());
        });
        PhotoBooth::new(self.config.clone(), backend, hooks)
    }

    /// Run the main application loop with signal handling
    pub async fn run(&self) -> Result<ExitReason> {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        let (restart_tx, mut restart_rx) = mpsc::unbounded_channel();

        let keyboard = self.keyboard_enabled.then(|| {
            let handler = KeyboardInputHandler::new(command_tx.clone());
            handler.start();
            handler
        });

        self.setup_signal_handlers();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let reason = loop {
            let booth = self.build_booth(restart_tx.clone());
            booth.start().await?;
            info!(
                "Photobooth running{}",
                if self.test_mode { " in test mode" } else { "" }
            );
            let reporter = spawn_event_reporter(&booth);

            let outcome = loop {
                tokio::select! {
                    _ = self.cancellation_token.cancelled() => break Some(ExitReason::UserRequest),
                    signal = &mut ctrl_c => {
                        if let Err(e) = signal {
                            warn!("Ctrl-C handler failed: {}", e);
                        }
                        info!("Received SIGINT signal (Ctrl+C)");
                        break Some(ExitReason::Signal("SIGINT".to_string()));
                    }
                    Some(()) = restart_rx.recv() => break None,
                    Some(command) = command_rx.recv() => {
                        if command == KeyCommand::Quit {
                            info!("Quit requested from keyboard");
                            break Some(ExitReason::UserRequest);
                        }
                        dispatch(&booth, command);
                    }
                }
            };

            reporter.abort();
            booth.exit().await;

            match outcome {
                Some(reason) => break reason,
                None => info!("Restart requested; building a fresh booth"),
            }
        };

        if let Some(keyboard) = keyboard {
            keyboard.stop().await;
        }
        drop(command_tx);

        info!("Photobooth stopped: {:?}", reason);
        Ok(reason)
    }

    /// SIGTERM ends the loop like a user request
    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let token = self.cancellation_token.clone();
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::spawn(async move {
                        tokio::select! {
                            _ = token.cancelled() => {}
                            received = sigterm.recv() => {
                                if received.is_some() {
                                    info!("Received SIGTERM signal");
                                    token.cancel();
                                }
                            }
                        }
                    });
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        }
    }
}

/// Run one key command against the booth
pub fn dispatch(booth: &PhotoBooth, command: KeyCommand) {
    match command {
        KeyCommand::Capture => {
            if !booth.trigger_capture() {
                info!("Capture is not available right now");
            }
        }
        KeyCommand::MakePixel => spawn_action(booth, "pixelate", |b| async move {
            b.make_pixel().await.map(|started| {
                if !started {
                    info!("Pixelate is only available from the photo preview");
                }
            })
        }),
        KeyCommand::DownloadStripOriginal => spawn_download(booth, false, FrameVariant::Original),
        KeyCommand::DownloadAnimationOriginal => spawn_download(booth, true, FrameVariant::Original),
        KeyCommand::DownloadStripPixel => spawn_download(booth, false, FrameVariant::Stylized),
        KeyCommand::DownloadAnimationPixel => spawn_download(booth, true, FrameVariant::Stylized),
        KeyCommand::Retake => spawn_action(booth, "retake", |b| async move {
            if !b.retake().await {
                info!("Retake is not available while processing");
            }
            Ok::<(), PhotoboothError>(())
        }),
        KeyCommand::RetryCamera => spawn_action(booth, "camera retry", |b| async move {
            b.retry_camera().await.map(|_| ()).map_err(PhotoboothError::from)
        }),
        KeyCommand::Restart => spawn_action(booth, "restart", |b| async move {
            b.restart().await;
            Ok::<(), PhotoboothError>(())
        }),
        KeyCommand::Quit => debug!("Quit is handled by the application loop"),
    }
}

fn spawn_download(booth: &PhotoBooth, animation: bool, variant: FrameVariant) {
    spawn_action(booth, "download", move |b| async move {
        let receipt = if animation {
            b.download_animation(variant).await?
        } else {
            b.download_strip(variant).await?
        };
        info!("Downloaded {}", receipt.path.display());
        Ok::<(), PhotoboothError>(())
    });
}

fn spawn_action<F, Fut>(booth: &PhotoBooth, name: &'static str, action: F)
where
    F: FnOnce(PhotoBooth) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let task = action(booth.clone());
    tokio::spawn(async move {
        if let Err(e) = task.await {
            error!("{} failed: {}", name, e);
        }
    });
}

/// Log every booth event until aborted
fn spawn_event_reporter(booth: &PhotoBooth) -> JoinHandle<()> {
    let mut events = booth.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!("{}", event.description()),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Event reporter skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
