use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Deserializer};

mod auth;
pub use auth::{validate_email, AuthResponse, AuthToken, NewSession, NewUser};

mod envelope;
pub use envelope::{Envelope, Meta, Pagination, Payload, DEFAULT_PAGE_SIZE};

mod error;
pub use error::Error;

pub mod query;

mod slug;
pub use slug::{slugify, thread_slug, SLUG_MAX_LEN};

mod submit;
pub use submit::{
    NewPost, NewThread, PostUpdate, ThreadUpdate, CONTENT_MAX_LEN, MAX_TAGS_PER_THREAD,
    TITLE_MAX_LEN,
};

pub type Time = chrono::DateTime<Utc>;

pub const DEFAULT_TAG_COLOR: &str = "#6366f1";

macro_rules! numeric_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Eq,
            Hash,
            Ord,
            PartialEq,
            PartialOrd,
            serde::Deserialize,
            serde::Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(UserId);
numeric_id!(CategoryId);
numeric_id!(ThreadId);
numeric_id!(PostId);
numeric_id!(TagId);

/// Stable string identifier the content store assigns to every record
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> DocumentId {
        DocumentId(String::from(s))
    }
}

/// Treats an explicit `null` the same as a missing field
fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Reference to another record
///
/// The content API sends relations either as a bare numeric id, a bare document
/// id, or a (possibly partially) populated object. All three end up here.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct Ref<I> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<I>,
    #[serde(rename = "documentId", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

#[derive(serde::Deserialize)]
#[serde(untagged, bound(deserialize = "I: Deserialize<'de>"))]
enum RawRef<I> {
    Id(I),
    Document(DocumentId),
    Object {
        #[serde(default)]
        id: Option<I>,
        #[serde(rename = "documentId", default)]
        document_id: Option<DocumentId>,
    },
}

impl<'de, I: Deserialize<'de>> Deserialize<'de> for Ref<I> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match RawRef::deserialize(d)? {
            RawRef::Id(id) => Ref {
                id: Some(id),
                document_id: None,
            },
            RawRef::Document(doc) => Ref {
                id: None,
                document_id: Some(doc),
            },
            RawRef::Object { id, document_id } => Ref { id, document_id },
        })
    }
}

impl<I: PartialEq> Ref<I> {
    pub fn to(id: I, document_id: DocumentId) -> Ref<I> {
        Ref {
            id: Some(id),
            document_id: Some(document_id),
        }
    }

    /// Whether this reference designates the record with these identifiers
    pub fn points_to(&self, id: &I, document_id: &DocumentId) -> bool {
        self.id.as_ref() == Some(id) || self.document_id.as_ref() == Some(document_id)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "documentId", default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    MembersOnly,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(rename = "documentId")]
    pub document_id: DocumentId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub visibility: Visibility,
    #[serde(default, deserialize_with = "nullable")]
    pub sort_order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<Vec<Thread>>,
}

impl Category {
    /// Members-only categories are hidden from anonymous visitors
    pub fn is_visible_to(&self, user: Option<&User>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::MembersOnly => user.is_some(),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.as_ref().map(|t| t.len()).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Tag {
    pub id: TagId,
    #[serde(rename = "documentId")]
    pub document_id: DocumentId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub usage_count: u64,
}

impl Tag {
    pub fn color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Thread {
    pub id: ThreadId,
    #[serde(rename = "documentId")]
    pub document_id: DocumentId,
    pub title: String,
    pub slug: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, deserialize_with = "nullable")]
    pub status: ThreadStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub is_pinned: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_locked: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub is_answered: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub view_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Box<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<Post>>,
    #[serde(rename = "createdAt")]
    pub created_at: Time,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Time>,
}

impl Thread {
    /// Zero when the posts were not populated
    pub fn reply_count(&self) -> usize {
        self.posts.as_ref().map(|p| p.len()).unwrap_or(0)
    }

    /// Latest of the thread's own timestamps and those of its populated posts
    pub fn last_activity(&self) -> Time {
        let own = self
            .updated_at
            .map_or(self.created_at, |u| u.max(self.created_at));
        self.posts
            .iter()
            .flatten()
            .map(Post::last_activity)
            .fold(own, Time::max)
    }

    pub fn accepts_replies(&self) -> bool {
        !self.is_locked && self.status == ThreadStatus::Open
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    #[serde(rename = "documentId")]
    pub document_id: DocumentId,
    #[serde(default, deserialize_with = "nullable")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_post: Option<Ref<PostId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<Ref<ThreadId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_accepted_answer: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub upvote_count: i64,
    #[serde(rename = "createdAt")]
    pub created_at: Time,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<Time>,

    /// `None` if the content API did not populate this relation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_posts: Option<Vec<Post>>,
}

impl Post {
    pub fn last_activity(&self) -> Time {
        let own = self
            .edited_at
            .map_or(self.created_at, |e| e.max(self.created_at));
        self.child_posts
            .iter()
            .flatten()
            .map(Post::last_activity)
            .fold(own, Time::max)
    }

    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|a| &a.username as &str)
            .unwrap_or("Anonymous")
    }
}

pub(crate) fn validate_field(field: &str, value: &str, max_len: usize) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::EmptyField(String::from(field)));
    }
    if value.contains('\0') {
        return Err(Error::Validation(format!("{field} contains a null byte")));
    }
    if value.chars().count() > max_len {
        return Err(Error::TooLong {
            field: String::from(field),
            max: max_len,
        });
    }
    Ok(())
}
