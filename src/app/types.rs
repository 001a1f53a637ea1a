use crossterm::event::KeyCode;

/// Why the application loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Signal(String),
    UserRequest,
}

/// Booth actions bound to keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Capture,
    MakePixel,
    DownloadStripOriginal,
    DownloadAnimationOriginal,
    DownloadStripPixel,
    DownloadAnimationPixel,
    Retake,
    RetryCamera,
    Restart,
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char(' ') => Some(KeyCommand::Capture),
            KeyCode::Char('p') => Some(KeyCommand::MakePixel),
            KeyCode::Char('1') => Some(KeyCommand::DownloadStripOriginal),
            KeyCode::Char('2') => Some(KeyCommand::DownloadAnimationOriginal),
            KeyCode::Char('3') => Some(KeyCommand::DownloadStripPixel),
            KeyCode::Char('4') => Some(KeyCommand::DownloadAnimationPixel),
            KeyCode::Char('r') => Some(KeyCommand::Retake),
            KeyCode::Char('c') => Some(KeyCommand::RetryCamera),
            KeyCode::Char('x') => Some(KeyCommand::Restart),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
            _ => None,
        }
    }
}
