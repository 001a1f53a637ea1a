use super::KeyCommand;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reads booth commands from the terminal
pub struct KeyboardInputHandler {
    commands: mpsc::UnboundedSender<KeyCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::UnboundedSender<KeyCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub fn start(&self) {
        info!("Keys: SPACE capture, p pixelate, 1-4 download, r retake, c retry camera, x restart, q quit");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        // Blocking task so terminal polling never stalls the runtime
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle presses, not releases
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        let Some(command) = KeyCommand::from_key(key_event.code) else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        debug!("Key command: {:?}", command);
                        if commands.send(command).is_err() {
                            debug!("Command receiver gone");
                            break;
                        }
                        if command == KeyCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to leave raw mode itself
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
