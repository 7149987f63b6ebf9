use std::{cmp::Reverse, fmt, str::FromStr};

use crate::api::{Category, Tag, Thread};

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ThreadOrder {
    /// Latest activity first
    #[default]
    Recent,
    /// Most viewed first
    Popular,
    /// Most replied-to first
    Replies,
}

impl ThreadOrder {
    pub const ALL: [ThreadOrder; 3] = [
        ThreadOrder::Recent,
        ThreadOrder::Popular,
        ThreadOrder::Replies,
    ];

    /// Sort key to ask the content API for when fetching a page
    pub fn server_sort(&self) -> &'static str {
        match self {
            ThreadOrder::Recent => "createdAt:desc",
            ThreadOrder::Popular => "view_count:desc",
            ThreadOrder::Replies => "createdAt:desc",
        }
    }

    /// Pinned threads first, then by this order, then newest first
    ///
    /// The sort is stable: threads that compare equal keep their relative order.
    pub fn sort(&self, threads: &mut [Thread]) {
        match self {
            ThreadOrder::Recent => threads.sort_by_cached_key(|t| {
                (
                    Reverse(t.is_pinned),
                    Reverse(t.last_activity()),
                    Reverse(t.created_at),
                )
            }),
            ThreadOrder::Popular => threads.sort_by_key(|t| {
                (
                    Reverse(t.is_pinned),
                    Reverse(t.view_count),
                    Reverse(t.created_at),
                )
            }),
            ThreadOrder::Replies => threads.sort_by_key(|t| {
                (
                    Reverse(t.is_pinned),
                    Reverse(t.reply_count()),
                    Reverse(t.created_at),
                )
            }),
        }
    }

    pub fn sorted(&self, mut threads: Vec<Thread>) -> Vec<Thread> {
        self.sort(&mut threads);
        threads
    }
}

impl fmt::Display for ThreadOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThreadOrder::Recent => "recent",
            ThreadOrder::Popular => "popular",
            ThreadOrder::Replies => "replies",
        })
    }
}

impl FromStr for ThreadOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<ThreadOrder, String> {
        match s {
            "recent" => Ok(ThreadOrder::Recent),
            "popular" => Ok(ThreadOrder::Popular),
            "replies" => Ok(ThreadOrder::Replies),
            _ => Err(format!("unknown sort mode {s:?}, expected recent, popular or replies")),
        }
    }
}

pub fn sort_categories(categories: &mut [Category]) {
    categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
}

pub fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| a.name.cmp(&b.name));
}
