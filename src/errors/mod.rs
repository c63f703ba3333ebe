pub mod app_error;
pub mod voice_error;

pub use app_error::{AppError, AppResult};
pub use voice_error::{VoiceError, VoiceResult};
