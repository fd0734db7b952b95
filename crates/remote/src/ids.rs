use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::error::{InvalidIdSnafu, RemoteError, RemoteResult};

// Server-assigned ids are opaque strings; every wrapper shares one shape.
macro_rules! define_remote_id {
    ($name:ident, $id_type:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> RemoteResult<Self> {
                let trimmed = raw.trim();
                ensure!(
                    !trimmed.is_empty(),
                    InvalidIdSnafu {
                        stage: "parse-remote-id",
                        id_type: $id_type,
                        raw: raw.to_string(),
                    }
                );
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = RemoteError;

            fn from_str(raw: &str) -> RemoteResult<Self> {
                Self::parse(raw)
            }
        }
    };
}

define_remote_id!(UserId, "user-id");
define_remote_id!(ThreadId, "thread-id");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let parsed = ThreadId::parse("  3f2a-11  ").map(|id| id.to_string());
        assert_eq!(parsed.ok().as_deref(), Some("3f2a-11"));
    }

    #[test]
    fn parse_rejects_blank_input() {
        let error = UserId::parse("   ").err();
        assert!(matches!(
            error,
            Some(RemoteError::InvalidId {
                id_type: "user-id",
                ..
            })
        ));
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ThreadId::parse("chat-7").ok();
        let json = id.and_then(|id| serde_json::to_string(&id).ok());
        assert_eq!(json.as_deref(), Some("\"chat-7\""));
    }
}
