use std::fmt::{self, Display};
use std::str::FromStr;

/// Which completion policy decides when the survey should end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolicyKind {
    /// End once the answers cover enough topics.
    #[default]
    Content,
    /// End once the session runs out of time.
    Duration,
}

/// Returned when a policy name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsePolicyError(String);

impl Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown completion policy `{}`, expected `content` or `duration`",
            self.0
        )
    }
}

impl std::error::Error for ParsePolicyError {}

impl FromStr for PolicyKind {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "content" => Ok(PolicyKind::Content),
            "duration" => Ok(PolicyKind::Duration),
            _ => Err(ParsePolicyError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("content".parse(), Ok(PolicyKind::Content));
        assert_eq!(" Duration ".parse(), Ok(PolicyKind::Duration));
        assert_eq!("".parse(), Ok(PolicyKind::Content));
        let err = "keywords".parse::<PolicyKind>().unwrap_err();
        assert!(err.to_string().contains("`keywords`"));
    }
}
