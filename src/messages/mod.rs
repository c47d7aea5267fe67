mod classify;
mod session_score;

pub use classify::ClassifyMessage;
pub use session_score::SessionScoreMessage;
