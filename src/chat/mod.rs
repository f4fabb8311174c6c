pub mod error;
pub mod history;
pub mod session;
pub mod settings;
pub mod sink;
pub mod turn;

pub use error::{ERROR_GLYPH, TurnError};
pub use history::ConversationHistory;
pub use session::{ClientSession, TurnOutcome, TurnPhase};
pub use settings::{RequestConfig, SessionSettings, SettingsProvider};
pub use sink::{MessageId, MessageUpdate, RenderSink};
pub use turn::{TurnState, TurnStatus};
