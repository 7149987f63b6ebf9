//! Initial content for the mock server, as produced by `generate-test-data`

use anyhow::anyhow;
use forum_client::api::{
    slugify, thread_slug, Category, CategoryId, DocumentId, NewUser, Post, PostId, Ref, Tag,
    TagId, Thread, ThreadId, ThreadStatus, Time, UserId, Visibility,
};

use crate::{DbPost, DbThread, Error, MockServer};

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub tags: Vec<SeedTag>,
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub threads: Vec<SeedThread>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SeedTag {
    pub name: String,
    /// Derived from the name when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Relations are given by slug (category, tags) and username (author)
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SeedThread {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub content: String,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub view_count: u64,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    pub created_at: Time,
    #[serde(default)]
    pub posts: Vec<SeedPost>,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SeedPost {
    pub content: String,
    pub author: String,
    pub created_at: Time,
    #[serde(default)]
    pub is_accepted_answer: bool,
    #[serde(default)]
    pub upvote_count: i64,
    #[serde(default)]
    pub replies: Vec<SeedPost>,
}

impl MockServer {
    pub fn from_seed(seed: Seed) -> Result<MockServer, Error> {
        let mut server = MockServer::new();
        server.load_seed(seed)?;
        Ok(server)
    }

    /// Adds the seed's content; records whose slug or username already
    /// exists are skipped
    pub fn load_seed(&mut self, seed: Seed) -> Result<(), Error> {
        for u in seed.users {
            if self.user_by_name(&u.username).is_some() {
                tracing::info!(username = %u.username, "user exists");
                continue;
            }
            self.register(NewUser::new(u.username, u.email, u.password))?;
        }

        for t in seed.tags {
            let slug = t.slug.unwrap_or_else(|| slugify(&t.name));
            if self.tags.iter().any(|tag| tag.slug == slug) {
                tracing::info!(%slug, "tag exists");
                continue;
            }
            let (id, document_id) = self.next_ids();
            self.tags.push(Tag {
                id: TagId(id),
                document_id,
                name: t.name,
                slug,
                color: t.color,
                usage_count: 0,
            });
        }

        for c in seed.categories {
            let slug = c.slug.unwrap_or_else(|| slugify(&c.name));
            if self.categories.iter().any(|cat| cat.slug == slug) {
                tracing::info!(%slug, "category exists");
                continue;
            }
            let (id, document_id) = self.next_ids();
            self.categories.push(Category {
                id: CategoryId(id),
                document_id,
                name: c.name,
                slug,
                description: c.description,
                icon: c.icon,
                visibility: c.visibility,
                sort_order: c.sort_order,
                threads: None,
            });
        }

        for t in seed.threads {
            self.seed_thread(t)?;
        }
        Ok(())
    }

    fn user_by_name(&self, username: &str) -> Option<UserId> {
        self.users
            .values()
            .find(|u| u.user.username == username)
            .map(|u| u.user.id)
    }

    fn seed_thread(&mut self, t: SeedThread) -> Result<(), Error> {
        let slug = t.slug.unwrap_or_else(|| thread_slug(&t.title, t.created_at));
        if self.threads.iter().any(|th| th.thread.slug == slug) {
            tracing::info!(%slug, "thread exists");
            return Ok(());
        }
        let author = self
            .user_by_name(&t.author)
            .ok_or_else(|| anyhow!("thread {slug} has unknown author {:?}", t.author))?;
        let category = self
            .categories
            .iter()
            .find(|c| c.slug == t.category)
            .map(|c| c.document_id.clone())
            .ok_or_else(|| anyhow!("thread {slug} has unknown category {:?}", t.category))?;
        let mut tags = Vec::with_capacity(t.tags.len());
        for tag_slug in &t.tags {
            let tag = self
                .tags
                .iter_mut()
                .find(|tag| tag.slug == *tag_slug)
                .ok_or_else(|| anyhow!("thread {slug} has unknown tag {tag_slug:?}"))?;
            tag.usage_count += 1;
            tags.push(tag.document_id.clone());
        }

        let (id, document_id) = self.next_ids();
        let thread_ref = Ref::to(ThreadId(id), document_id.clone());
        let mut answered = false;
        for p in t.posts {
            answered |= self.seed_post(&document_id, &thread_ref, None, p)?;
        }
        let last_post = self
            .posts
            .iter()
            .filter(|p| p.thread == document_id)
            .map(|p| p.post.created_at)
            .max();
        self.threads.push(DbThread {
            thread: Thread {
                id: ThreadId(id),
                document_id,
                title: t.title,
                slug,
                content: t.content,
                status: t.status,
                is_pinned: t.is_pinned,
                is_locked: t.is_locked,
                is_answered: answered,
                view_count: t.view_count,
                author: None,
                category: None,
                tags: None,
                posts: None,
                created_at: t.created_at,
                updated_at: Some(last_post.map_or(t.created_at, |p| p.max(t.created_at))),
            },
            author,
            category,
            tags,
        });
        Ok(())
    }

    /// Returns whether this post or one of its replies is an accepted answer
    fn seed_post(
        &mut self,
        thread: &DocumentId,
        thread_ref: &Ref<ThreadId>,
        parent: Option<Ref<PostId>>,
        p: SeedPost,
    ) -> Result<bool, Error> {
        let author = self
            .user_by_name(&p.author)
            .ok_or_else(|| anyhow!("post in thread {thread} has unknown author {:?}", p.author))?;
        let (id, document_id) = self.next_ids();
        let this = Ref::to(PostId(id), document_id.clone());
        self.posts.push(DbPost {
            post: Post {
                id: PostId(id),
                document_id,
                content: p.content,
                parent_post: parent.clone(),
                thread: Some(thread_ref.clone()),
                author: None,
                is_accepted_answer: p.is_accepted_answer,
                upvote_count: p.upvote_count,
                created_at: p.created_at,
                edited_at: None,
                child_posts: None,
            },
            author,
            thread: thread.clone(),
            parent: parent.and_then(|r| r.document_id),
        });
        let mut answered = p.is_accepted_answer;
        for r in p.replies {
            answered |= self.seed_post(thread, thread_ref, Some(this.clone()), r)?;
        }
        Ok(answered)
    }
}
