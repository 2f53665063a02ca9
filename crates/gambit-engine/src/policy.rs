use std::fmt;

use gambit_core::events::Challenge;
use gambit_core::transport::DeclineReason;

/// The only variant we play.
pub const STANDARD_VARIANT: &str = "standard";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeDecision {
    Accept,
    Decline(DeclineReason),
}

impl ChallengeDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accepted",
            Self::Decline(_) => "declined",
        }
    }
}

impl fmt::Display for ChallengeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("accept"),
            Self::Decline(reason) => write!(f, "decline ({reason})"),
        }
    }
}

/// Accept standard games from humans other than ourselves.
pub fn evaluate(challenge: &Challenge, local_id: &str) -> ChallengeDecision {
    if challenge.variant.as_deref() != Some(STANDARD_VARIANT) {
        return ChallengeDecision::Decline(DeclineReason::StandardOnly);
    }
    if let Some(challenger) = &challenge.challenger {
        if challenger.bot || challenger.id.as_deref() == Some(local_id) {
            return ChallengeDecision::Decline(DeclineReason::NoBot);
        }
    }
    ChallengeDecision::Accept
}
