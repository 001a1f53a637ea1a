mod keyboard;
mod runtime;
mod types;


pub use keyboard::KeyboardInputHandler;
pub use runtime::{dispatch, BoothApp};
pub use types::{ExitReason, KeyCommand};
