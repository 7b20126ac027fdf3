use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The fixed status categories partitioning the board.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    #[default]
    Todo,
    #[serde(alias = "in-progress")]
    InProgress,
    Completed,
}

impl Group {
    /// Display order of the columns.
    pub const ALL: [Group; 3] = [Group::Todo, Group::InProgress, Group::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s.trim() {
            "todo" => Ok(Self::Todo),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(CoreError::validation(
                "group",
                format!("unknown group: {other:?}"),
            )),
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Todo => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_legacy_spelling() {
        assert_eq!(Group::parse("in-progress").unwrap(), Group::InProgress);
        assert_eq!(Group::parse("in_progress").unwrap(), Group::InProgress);
        assert_eq!(Group::parse(" todo ").unwrap(), Group::Todo);
    }

    #[test]
    fn unknown_group_is_validation_error() {
        match Group::parse("archived") {
            Err(CoreError::Validation { field, .. }) => assert_eq!(field, "group"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn as_str_roundtrips_through_parse() {
        for group in Group::ALL {
            assert_eq!(Group::parse(group.as_str()).unwrap(), group);
        }
    }
}
