use crate::{thread_slug, validate_field, DocumentId, Error, ThreadStatus, Time};

pub const TITLE_MAX_LEN: usize = 200;
pub const CONTENT_MAX_LEN: usize = 10_000;
pub const MAX_TAGS_PER_THREAD: usize = 3;

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewThread {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub category: DocumentId,
    #[serde(default)]
    pub tags: Vec<DocumentId>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub view_count: u64,
}

impl NewThread {
    pub fn new(
        title: &str,
        content: &str,
        category: DocumentId,
        tags: Vec<DocumentId>,
        now: Time,
    ) -> NewThread {
        NewThread {
            title: title.trim().to_string(),
            slug: thread_slug(title, now),
            content: content.trim().to_string(),
            category,
            tags,
            is_pinned: false,
            is_locked: false,
            is_answered: false,
            view_count: 0,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_field("title", &self.title, TITLE_MAX_LEN)?;
        validate_field("content", &self.content, CONTENT_MAX_LEN)?;
        validate_field("category", &self.category.0, TITLE_MAX_LEN)?;
        if self.tags.len() > MAX_TAGS_PER_THREAD {
            return Err(Error::TooManyTags(self.tags.len()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    pub content: String,
    pub thread: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_post: Option<DocumentId>,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub is_accepted_answer: bool,
}

impl NewPost {
    pub fn new(content: &str, thread: DocumentId, parent_post: Option<DocumentId>) -> NewPost {
        NewPost {
            content: content.trim().to_string(),
            thread,
            parent_post,
            upvote_count: 0,
            is_accepted_answer: false,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_field("content", &self.content, CONTENT_MAX_LEN)
    }
}

/// Partial update of a thread; absent fields are left untouched
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ThreadUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ThreadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_answered: Option<bool>,
}

impl ThreadUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(title) = &self.title {
            validate_field("title", title, TITLE_MAX_LEN)?;
        }
        if let Some(content) = &self.content {
            validate_field("content", content, CONTENT_MAX_LEN)?;
        }
        Ok(())
    }
}

/// Partial update of a post; absent fields are left untouched
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_accepted_answer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<Time>,
}

impl PostUpdate {
    /// New content for the post, stamped as edited at `now`
    pub fn edit(content: &str, now: Time) -> PostUpdate {
        PostUpdate {
            content: Some(content.trim().to_string()),
            is_accepted_answer: None,
            edited_at: Some(now),
        }
    }

    pub fn accept(accepted: bool) -> PostUpdate {
        PostUpdate {
            is_accepted_answer: Some(accepted),
            ..PostUpdate::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(content) = &self.content {
            validate_field("content", content, CONTENT_MAX_LEN)?;
        }
        Ok(())
    }
}
