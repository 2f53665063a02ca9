use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifiers here are assigned by the remote authority, never minted locally.
macro_rules! remote_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_owned()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

remote_id!(SessionId);
remote_id!(ChallengeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_preserves_value() {
        let id = SessionId::from_raw("abcd1234");
        assert_eq!(id.as_str(), "abcd1234");
        assert_eq!(id.to_string(), "abcd1234");
    }

    #[test]
    fn deserializes_from_bare_string() {
        let id: ChallengeId = serde_json::from_str("\"Xy7pQ\"").unwrap();
        assert_eq!(id, ChallengeId::from_raw("Xy7pQ"));
    }

    #[test]
    fn parse_is_infallible() {
        let id: SessionId = "g1".parse().unwrap();
        assert_eq!(id.as_ref(), "g1");
    }
}
