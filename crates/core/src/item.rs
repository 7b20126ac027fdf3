use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::group::Group;
use crate::ids::ItemId;
use crate::time::Timestamp;

pub const DEFAULT_TITLE_MAX: usize = 50;
pub const DEFAULT_DESCRIPTION_MAX: usize = 200;

/// One persisted work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub group: Group,
    pub position: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Item {
    /// Read order within a group. Position first; ties (only possible while a
    /// group is transiently inconsistent) fall back to creation time, then id.
    pub fn order_key(&self) -> (u32, Timestamp, ItemId) {
        (self.position, self.created_at, self.id)
    }
}

/// Text bounds applied to user input before any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub title_max: usize,
    pub description_max: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            title_max: DEFAULT_TITLE_MAX,
            description_max: DEFAULT_DESCRIPTION_MAX,
        }
    }
}

impl Limits {
    /// Returns the trimmed title, or a validation error when it is empty or too long.
    pub fn check_title(&self, title: &str) -> Result<String, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        let len = title.chars().count();
        if len > self.title_max {
            return Err(CoreError::validation(
                "title",
                format!("{len} characters exceeds limit of {}", self.title_max),
            ));
        }
        Ok(title.to_string())
    }

    /// Blank descriptions normalize to `None`.
    pub fn check_description(&self, description: Option<&str>) -> Result<Option<String>, CoreError> {
        let Some(text) = description.map(str::trim).filter(|d| !d.is_empty()) else {
            return Ok(None);
        };
        let len = text.chars().count();
        if len > self.description_max {
            return Err(CoreError::validation(
                "description",
                format!("{len} characters exceeds limit of {}", self.description_max),
            ));
        }
        Ok(Some(text.to_string()))
    }
}

/// Input for creating an item. `group` defaults to [`Group::Todo`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub group: Option<Group>,
}

impl NewItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn in_group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    pub fn validate(self, limits: &Limits) -> Result<NewItem, CoreError> {
        Ok(NewItem {
            title: limits.check_title(&self.title)?,
            description: limits.check_description(self.description.as_deref())?,
            group: Some(self.group.unwrap_or_default()),
        })
    }
}

/// Text-only update. Fields left `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEdit {
    pub title: Option<String>,
    pub description: Option<String>,
}
