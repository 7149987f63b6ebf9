//! Query strings understood by the content API
//!
//! Nested parameters use the framework's bracket syntax, eg.
//! `populate[posts][populate][author]=true`. Pairs are kept unencoded;
//! percent-encoding is the HTTP client's business.

use crate::{DocumentId, DEFAULT_PAGE_SIZE};

pub const FILTER_SLUG: &str = "filters[slug][$eq]";
pub const FILTER_CATEGORY: &str = "filters[category][documentId][$eq]";
pub const FILTER_THREAD: &str = "filters[thread][documentId][$eq]";
pub const FILTER_ROOT_POSTS: &str = "filters[parent_post][$null]";
pub const PAGE: &str = "pagination[page]";
pub const PAGE_SIZE: &str = "pagination[pageSize]";
pub const SORT: &str = "sort";
pub const PUBLICATION_STATE: &str = "publicationState";

/// How many levels of `child_posts` are requested along with a thread
pub const POPULATED_REPLY_DEPTH: usize = 3;

/// Posts fetched per request when loading every post of a thread
pub const POSTS_PAGE_SIZE: u64 = 100;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryString(Vec<(String, String)>);

impl QueryString {
    pub fn new() -> QueryString {
        QueryString(Vec::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> QueryString {
        self.0.push((key.into(), value.to_string()));
        self
    }

    /// Asks for the relation at `path` to be populated
    pub fn populate(self, path: &[&str]) -> QueryString {
        let mut key = String::new();
        for (i, rel) in path.iter().enumerate() {
            match i {
                0 => key.push_str("populate"),
                _ => key.push_str("[populate]"),
            }
            key.push('[');
            key.push_str(rel);
            key.push(']');
        }
        self.with(key, "true")
    }

    pub fn live(self) -> QueryString {
        self.with(PUBLICATION_STATE, "live")
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v as &str)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

pub fn categories() -> QueryString {
    QueryString::new()
        .populate(&["threads"])
        .with(SORT, "sort_order:asc")
        .live()
}

pub fn category_by_slug(slug: &str) -> QueryString {
    QueryString::new()
        .with(FILTER_SLUG, slug)
        .populate(&["threads", "author"])
        .populate(&["threads", "tags"])
        .populate(&["threads", "posts"])
        .live()
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadListQuery {
    pub category: Option<DocumentId>,
    pub page: u64,
    pub page_size: u64,
    /// Server-side sort key, eg. `createdAt:desc`
    pub sort: String,
}

impl Default for ThreadListQuery {
    fn default() -> ThreadListQuery {
        ThreadListQuery {
            category: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: String::from("createdAt:desc"),
        }
    }
}

impl ThreadListQuery {
    pub fn to_query(&self) -> QueryString {
        let mut q = QueryString::new()
            .populate(&["author"])
            .populate(&["category"])
            .populate(&["tags"])
            .populate(&["posts"])
            .with(PAGE, self.page)
            .with(PAGE_SIZE, self.page_size)
            .with(SORT, &self.sort)
            .live();
        if let Some(category) = &self.category {
            q = q.with(FILTER_CATEGORY, category);
        }
        q
    }
}

pub fn thread_by_slug(slug: &str) -> QueryString {
    let mut q = QueryString::new()
        .with(FILTER_SLUG, slug)
        .populate(&["author"])
        .populate(&["category"])
        .populate(&["tags"])
        .populate(&["posts", "author"])
        .populate(&["posts", "parent_post"]);
    let mut path = vec!["posts"];
    for _ in 1..POPULATED_REPLY_DEPTH {
        path.push("child_posts");
        let mut with_author = path.clone();
        with_author.push("author");
        q = q.populate(&with_author);
    }
    q.live()
}

/// One page of every post of a thread, replies included, each with its parent reference
pub fn posts_by_thread(thread: &DocumentId, page: u64) -> QueryString {
    QueryString::new()
        .with(FILTER_THREAD, thread)
        .populate(&["author"])
        .populate(&["parent_post"])
        .with(SORT, "createdAt:asc")
        .with(PAGE, page)
        .with(PAGE_SIZE, POSTS_PAGE_SIZE)
}

pub fn tags() -> QueryString {
    QueryString::new().with(SORT, "name:asc")
}
