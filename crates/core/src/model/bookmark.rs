use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::model::ids::{BookmarkId, MessageId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BookmarkError {
    #[error("bookmark title cannot be empty")]
    EmptyTitle,
}

impl BookmarkError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// A bookmark request that has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBookmark {
    title: String,
    description: String,
    tags: Vec<String>,
    message_id: Option<MessageId>,
}

impl NewBookmark {
    /// Blank tags are dropped and the rest trimmed.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError::EmptyTitle` if the title is blank.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
        message_id: Option<MessageId>,
    ) -> Result<Self, BookmarkError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(BookmarkError::EmptyTitle);
        }
        let tags = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(Self {
            title,
            description: description.into(),
            tags,
            message_id,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    #[must_use]
    pub fn assign_id(self, id: BookmarkId, created_at: DateTime<Utc>) -> Bookmark {
        Bookmark {
            id,
            title: self.title,
            description: self.description,
            tags: self.tags,
            message_id: self.message_id,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn rejects_blank_title() {
        let err = NewBookmark::new("  ", "", Vec::new(), None).unwrap_err();
        assert_eq!(err, BookmarkError::EmptyTitle);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn trims_title_and_drops_blank_tags() {
        let draft = NewBookmark::new(
            "  Two pointers ",
            "classic trick",
            vec!["arrays".to_string(), "  ".to_string(), " dsa ".to_string()],
            Some(MessageId::new(4)),
        )
        .unwrap();
        assert_eq!(draft.title(), "Two pointers");
        assert_eq!(draft.tags(), ["arrays", "dsa"]);

        let bookmark = draft.assign_id(BookmarkId::new(9), fixed_now());
        assert_eq!(bookmark.id, BookmarkId::new(9));
        assert_eq!(bookmark.message_id, Some(MessageId::new(4)));
        assert_eq!(bookmark.created_at, fixed_now());
    }
}
