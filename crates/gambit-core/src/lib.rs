pub mod errors;
pub mod events;
pub mod game;
pub mod ids;
pub mod oracle;
pub mod transport;

pub use errors::{OracleError, TransportError};
pub use game::{MoveToken, Side, TerminalStatus};
pub use ids::{ChallengeId, SessionId};
pub use oracle::{Feedback, MoveOracle};
pub use transport::{DeclineReason, Identity, RecordStream, Transport};
