//! In-memory stand-in for the forum's content and auth APIs
//!
//! Only what the forum client needs is implemented: the same routes, query
//! parameters, envelopes and error bodies, over state that lives as long as
//! the process. Populating `child_posts` nests replies only as many levels
//! down as the query names `[populate][child_posts]`, and posts always carry a
//! reference to their parent.

use std::{
    collections::{BTreeMap, HashMap},
    net::SocketAddr,
    sync::Arc,
};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use forum_client::{
    api::{
        AuthResponse, AuthToken, Category, DocumentId, Envelope, NewPost,
        NewSession, NewThread, NewUser, Pagination, Post, PostId, PostUpdate, Ref, Tag,
        Thread, ThreadId, ThreadStatus, ThreadUpdate, Time, User, UserId,
        DEFAULT_PAGE_SIZE,
    },
    api::query,
};

mod error;
pub use error::Error;

mod extractors;
mod handlers;

pub mod seed;

#[cfg(test)]
mod fuzz;

/// Query string of a request, keys left in their bracketed form
pub type Params = HashMap<String, String>;

pub type Shared = Arc<tokio::sync::Mutex<MockServer>>;

const MAX_PAGE_SIZE: u64 = 100;

// Cheapest cost bcrypt accepts, the mock is not meant to protect anything
const BCRYPT_COST: u32 = 4;

#[derive(Default)]
pub struct MockServer {
    users: BTreeMap<UserId, DbUser>,
    sessions: HashMap<AuthToken, UserId>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    threads: Vec<DbThread>,
    posts: Vec<DbPost>,
    last_id: u64,
}

#[derive(Debug)]
struct DbUser {
    user: User,
    pass_hash: String,
}

/// Thread with its relations stored as identifiers
#[derive(Debug)]
struct DbThread {
    thread: Thread,
    author: UserId,
    category: DocumentId,
    tags: Vec<DocumentId>,
}

#[derive(Debug)]
struct DbPost {
    post: Post,
    author: UserId,
    thread: DocumentId,
    parent: Option<DocumentId>,
}

fn populates(q: &Params, path: &[&str]) -> bool {
    if q.get("populate").map(String::as_str) == Some("*") && path.len() == 1 {
        return true;
    }
    let mut prefix = String::new();
    for (i, rel) in path.iter().enumerate() {
        if i > 0 {
            prefix.push_str("[populate]");
        } else {
            prefix.push_str("populate");
        }
        prefix.push('[');
        prefix.push_str(rel);
        prefix.push(']');
    }
    q.keys().any(|k| k.starts_with(&prefix))
}

fn join<'a>(prefix: &[&'a str], rel: &'a str) -> Vec<&'a str> {
    let mut res = prefix.to_vec();
    res.push(rel);
    res
}

fn param_u64(q: &Params, key: &str, default: u64) -> Result<u64, Error> {
    match q.get(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| Error::invalid(format!("{key} must be a number, got {v:?}"))),
    }
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::default()
    }

    /// Number of users, threads and posts
    pub fn test_counts(&self) -> (usize, usize, usize) {
        (self.users.len(), self.threads.len(), self.posts.len())
    }

    fn next_ids(&mut self) -> (u64, DocumentId) {
        self.last_id += 1;
        let doc = DocumentId(uuid::Uuid::new_v4().simple().to_string());
        (self.last_id, doc)
    }

    fn resolve(&self, tok: &AuthToken) -> Result<UserId, Error> {
        self.sessions
            .get(tok)
            .copied()
            .ok_or_else(Error::unauthorized)
    }

    fn new_session(&mut self, user: UserId) -> Result<AuthResponse, Error> {
        let jwt = AuthToken(uuid::Uuid::new_v4().to_string());
        self.sessions.insert(jwt.clone(), user);
        let user = self
            .users
            .get(&user)
            .map(|u| u.user.clone())
            .ok_or_else(|| anyhow::anyhow!("session opened for unknown user {user}"))?;
        Ok(AuthResponse { jwt, user })
    }

    /// Public view of a user: no email
    fn public_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|u| User {
            email: None,
            ..u.user.clone()
        })
    }

    pub fn register(&mut self, u: NewUser) -> Result<AuthResponse, Error> {
        u.validate()?;
        let taken = self.users.values().any(|db| {
            db.user.username == u.username
                || db.user.email.as_deref().map(|e| e.eq_ignore_ascii_case(&u.email)) == Some(true)
        });
        if taken {
            return Err(Error::invalid("Email or Username are already taken"));
        }
        let pass_hash = bcrypt::hash(&u.password, BCRYPT_COST).context("hashing password")?;
        let (id, document_id) = self.next_ids();
        let id = UserId(id);
        tracing::debug!(%id, username = %u.username, "registering user");
        self.users.insert(
            id,
            DbUser {
                user: User {
                    id,
                    document_id: Some(document_id),
                    username: u.username,
                    email: Some(u.email),
                },
                pass_hash,
            },
        );
        self.new_session(id)
    }

    pub fn login(&mut self, s: NewSession) -> Result<AuthResponse, Error> {
        s.validate()?;
        let user = self.users.values().find(|db| {
            let email = db.user.email.as_deref();
            db.user.username == s.identifier
                || email.map_or(false, |e| e.eq_ignore_ascii_case(&s.identifier))
        });
        let invalid = || Error::invalid("Invalid identifier or password");
        let user = user.ok_or_else(invalid)?;
        let ok = bcrypt::verify(&s.password, &user.pass_hash).context("checking password")?;
        if !ok {
            return Err(invalid());
        }
        let id = user.user.id;
        self.new_session(id)
    }

    pub fn me(&self, tok: &AuthToken) -> Result<User, Error> {
        let id = self.resolve(tok)?;
        self.users
            .get(&id)
            .map(|u| u.user.clone())
            .ok_or_else(Error::unauthorized)
    }

    fn category_record(&self, cat: &Category, q: &Params, prefix: &[&str]) -> Category {
        let mut cat = cat.clone();
        let path = join(prefix, "threads");
        if populates(q, &path) {
            cat.threads = Some(
                self.threads
                    .iter()
                    .filter(|t| t.category == cat.document_id)
                    .map(|t| self.thread_record(t, q, &path))
                    .collect(),
            );
        }
        cat
    }

    fn thread_record(&self, t: &DbThread, q: &Params, prefix: &[&str]) -> Thread {
        let mut res = t.thread.clone();
        let path = |rel| join(prefix, rel);
        if populates(q, &path("author")) {
            res.author = self.public_user(t.author);
        }
        if populates(q, &path("category")) {
            res.category = self
                .categories
                .iter()
                .find(|c| c.document_id == t.category)
                .map(|c| Box::new(c.clone()));
        }
        if populates(q, &path("tags")) {
            res.tags = Some(
                self.tags
                    .iter()
                    .filter(|tag| t.tags.contains(&tag.document_id))
                    .cloned()
                    .collect(),
            );
        }
        let posts = path("posts");
        if populates(q, &posts) {
            res.posts = Some(
                self.posts
                    .iter()
                    .filter(|p| p.thread == t.thread.document_id)
                    .map(|p| self.post_record(p, q, &posts))
                    .collect(),
            );
        }
        res
    }

    fn post_record(&self, p: &DbPost, q: &Params, prefix: &[&str]) -> Post {
        let mut res = p.post.clone();
        let children_path = join(prefix, "child_posts");
        if populates(q, &join(prefix, "author")) {
            res.author = self.public_user(p.author);
        }
        if populates(q, &children_path) {
            let mut children = self
                .posts
                .iter()
                .filter(|c| c.parent.as_ref() == Some(&p.post.document_id))
                .collect::<Vec<_>>();
            children.sort_by_key(|c| c.post.created_at);
            res.child_posts = Some(
                children
                    .into_iter()
                    .map(|c| self.post_record(c, q, &children_path))
                    .collect(),
            );
        }
        res
    }

    pub fn categories(&self, q: &Params) -> Envelope<Vec<Category>> {
        let mut cats = self
            .categories
            .iter()
            .filter(|c| match q.get(query::FILTER_SLUG) {
                Some(slug) => c.slug == *slug,
                None => true,
            })
            .map(|c| self.category_record(c, q, &[]))
            .collect::<Vec<_>>();
        cats.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        let total = cats.len() as u64;
        Envelope::paginated(cats, Pagination::for_total(1, total.max(1), total))
    }

    pub fn threads(&self, q: &Params) -> Result<Envelope<Vec<Thread>>, Error> {
        let page = param_u64(q, query::PAGE, 1)?.max(1);
        let page_size = param_u64(q, query::PAGE_SIZE, DEFAULT_PAGE_SIZE)?.clamp(1, MAX_PAGE_SIZE);
        let mut threads = self
            .threads
            .iter()
            .filter(|t| match q.get(query::FILTER_SLUG) {
                Some(slug) => t.thread.slug == *slug,
                None => true,
            })
            .filter(|t| match q.get(query::FILTER_CATEGORY) {
                Some(cat) => t.category.0 == *cat,
                None => true,
            })
            .collect::<Vec<_>>();
        let sort = q.get(query::SORT).map(String::as_str).unwrap_or("createdAt:desc");
        let (field, dir) = sort.split_once(':').unwrap_or((sort, "asc"));
        match field {
            "createdAt" => threads.sort_by_key(|t| t.thread.created_at),
            "updatedAt" => threads.sort_by_key(|t| t.thread.updated_at),
            "view_count" => threads.sort_by_key(|t| t.thread.view_count),
            "title" => threads.sort_by(|a, b| a.thread.title.cmp(&b.thread.title)),
            _ => return Err(Error::invalid(format!("Invalid key {field}"))),
        }
        if dir.eq_ignore_ascii_case("desc") {
            threads.reverse();
        }
        let pagination = Pagination::for_total(page, page_size, threads.len() as u64);
        let page = threads[pagination.range()]
            .iter()
            .map(|t| self.thread_record(t, q, &[]))
            .collect();
        Ok(Envelope::paginated(page, pagination))
    }

    pub fn create_thread(
        &mut self,
        tok: &AuthToken,
        new: NewThread,
        now: Time,
    ) -> Result<Thread, Error> {
        let author = self.resolve(tok)?;
        new.validate()?;
        if !self.categories.iter().any(|c| c.document_id == new.category) {
            return Err(Error::invalid(format!("Unknown category {}", new.category)));
        }
        for tag in &new.tags {
            if !self.tags.iter().any(|t| t.document_id == *tag) {
                return Err(Error::invalid(format!("Unknown tag {tag}")));
            }
        }
        if self.threads.iter().any(|t| t.thread.slug == new.slug) {
            return Err(Error::invalid("This attribute must be unique: slug"));
        }
        for tag in self.tags.iter_mut().filter(|t| new.tags.contains(&t.document_id)) {
            tag.usage_count += 1;
        }
        let (id, document_id) = self.next_ids();
        let thread = Thread {
            id: ThreadId(id),
            document_id,
            title: new.title,
            slug: new.slug,
            content: new.content,
            status: ThreadStatus::Open,
            is_pinned: new.is_pinned,
            is_locked: new.is_locked,
            is_answered: new.is_answered,
            view_count: new.view_count,
            author: None,
            category: None,
            tags: None,
            posts: None,
            created_at: now,
            updated_at: Some(now),
        };
        tracing::debug!(slug = %thread.slug, "creating thread");
        let db = DbThread {
            thread,
            author,
            category: new.category,
            tags: new.tags,
        };
        let populate = ["author", "category", "tags"]
            .into_iter()
            .map(|rel| (format!("populate[{rel}]"), String::from("true")))
            .collect::<Params>();
        let res = self.thread_record(&db, &populate, &[]);
        self.threads.push(db);
        Ok(res)
    }

    pub fn update_thread(
        &mut self,
        tok: &AuthToken,
        id: &DocumentId,
        update: ThreadUpdate,
    ) -> Result<Thread, Error> {
        let user = self.resolve(tok)?;
        update.validate()?;
        let t = self
            .threads
            .iter_mut()
            .find(|t| t.thread.document_id == *id)
            .ok_or_else(|| Error::not_found(format!("thread {id}")))?;
        if t.author != user {
            return Err(Error::forbidden());
        }
        let th = &mut t.thread;
        if let Some(title) = update.title {
            th.title = title;
        }
        if let Some(content) = update.content {
            th.content = content;
        }
        if let Some(status) = update.status {
            th.status = status;
        }
        if let Some(pinned) = update.is_pinned {
            th.is_pinned = pinned;
        }
        if let Some(locked) = update.is_locked {
            th.is_locked = locked;
        }
        if let Some(answered) = update.is_answered {
            th.is_answered = answered;
        }
        th.updated_at = Some(chrono::Utc::now());
        Ok(th.clone())
    }

    pub fn posts(&self, q: &Params) -> Result<Envelope<Vec<Post>>, Error> {
        let page = param_u64(q, query::PAGE, 1)?.max(1);
        let page_size = param_u64(q, query::PAGE_SIZE, DEFAULT_PAGE_SIZE)?.clamp(1, MAX_PAGE_SIZE);
        let roots_only = q.get(query::FILTER_ROOT_POSTS).map(String::as_str) == Some("true");
        let mut posts = self
            .posts
            .iter()
            .filter(|p| match q.get(query::FILTER_THREAD) {
                Some(thread) => p.thread.0 == *thread,
                None => true,
            })
            .filter(|p| !roots_only || p.parent.is_none())
            .collect::<Vec<_>>();
        posts.sort_by_key(|p| p.post.created_at);
        if q.get(query::SORT).map(String::as_str) == Some("createdAt:desc") {
            posts.reverse();
        }
        let pagination = Pagination::for_total(page, page_size, posts.len() as u64);
        let page = posts[pagination.range()]
            .iter()
            .map(|p| self.post_record(p, q, &[]))
            .collect();
        Ok(Envelope::paginated(page, pagination))
    }

    pub fn create_post(&mut self, tok: &AuthToken, new: NewPost, now: Time) -> Result<Post, Error> {
        let author = self.resolve(tok)?;
        new.validate()?;
        let thread = self
            .threads
            .iter()
            .find(|t| t.thread.document_id == new.thread)
            .ok_or_else(|| Error::invalid(format!("Unknown thread {}", new.thread)))?;
        if thread.thread.is_locked {
            return Err(Error::forbidden());
        }
        let thread_ref = Ref::to(thread.thread.id, thread.thread.document_id.clone());
        let parent_ref = match &new.parent_post {
            None => None,
            Some(parent) => {
                let p = self
                    .posts
                    .iter()
                    .find(|p| p.post.document_id == *parent)
                    .ok_or_else(|| Error::invalid(format!("Unknown parent post {parent}")))?;
                if p.thread != new.thread {
                    return Err(Error::invalid("Parent post belongs to another thread"));
                }
                Some(Ref::to(p.post.id, p.post.document_id.clone()))
            }
        };
        let (id, document_id) = self.next_ids();
        let post = Post {
            id: PostId(id),
            document_id,
            content: new.content,
            parent_post: parent_ref,
            thread: Some(thread_ref),
            author: None,
            is_accepted_answer: new.is_accepted_answer,
            upvote_count: new.upvote_count,
            created_at: now,
            edited_at: None,
            child_posts: None,
        };
        tracing::debug!(post = %post.id, thread = %new.thread, "creating post");
        self.posts.push(DbPost {
            post: post.clone(),
            author,
            thread: new.thread,
            parent: new.parent_post,
        });
        Ok(Post {
            author: self.public_user(author),
            ..post
        })
    }

    /// Content can only be changed by the post's author, the accepted-answer
    /// flag only by the thread's author
    pub fn update_post(
        &mut self,
        tok: &AuthToken,
        id: &DocumentId,
        update: PostUpdate,
    ) -> Result<Post, Error> {
        let user = self.resolve(tok)?;
        update.validate()?;
        let idx = self
            .posts
            .iter()
            .position(|p| p.post.document_id == *id)
            .ok_or_else(|| Error::not_found(format!("post {id}")))?;
        let thread_idx = self
            .threads
            .iter()
            .position(|t| t.thread.document_id == self.posts[idx].thread)
            .ok_or_else(|| anyhow::anyhow!("post {id} is attached to a missing thread"))?;
        if update.content.is_some() && self.posts[idx].author != user {
            return Err(Error::forbidden());
        }
        if update.is_accepted_answer.is_some() && self.threads[thread_idx].author != user {
            return Err(Error::forbidden());
        }
        let post = &mut self.posts[idx].post;
        if let Some(content) = update.content {
            post.content = content;
            post.edited_at = Some(update.edited_at.unwrap_or_else(chrono::Utc::now));
        }
        if let Some(accepted) = update.is_accepted_answer {
            post.is_accepted_answer = accepted;
            if accepted {
                self.threads[thread_idx].thread.is_answered = true;
            }
        }
        Ok(self.posts[idx].post.clone())
    }

    pub fn tags(&self, q: &Params) -> Envelope<Vec<Tag>> {
        let mut tags = self.tags.clone();
        match q.get(query::SORT).map(String::as_str) {
            Some("usage_count:desc") => tags.sort_by_key(|t| std::cmp::Reverse(t.usage_count)),
            _ => tags.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        let total = tags.len() as u64;
        Envelope::paginated(tags, Pagination::for_total(1, total.max(1), total))
    }
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/auth/local", post(handlers::login))
        .route("/api/auth/local/register", post(handlers::register))
        .route("/api/users/me", get(handlers::me))
        .route("/api/forum-categories", get(handlers::categories))
        .route(
            "/api/threads",
            get(handlers::threads).post(handlers::create_thread),
        )
        .route("/api/threads/:id", put(handlers::update_thread))
        .route("/api/posts", get(handlers::posts).post(handlers::create_post))
        .route("/api/posts/:id", put(handlers::update_post))
        .route("/api/tags", get(handlers::tags))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `server` on an ephemeral local port, in the background
///
/// Returns the address to reach it and a handle on its state.
pub async fn spawn(server: MockServer) -> anyhow::Result<(SocketAddr, Shared)> {
    let state = Arc::new(tokio::sync::Mutex::new(server));
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("binding to {addr}"))?
        .serve(router(state.clone()).into_make_service());
    let addr = server.local_addr();
    tokio::spawn(async move {
        if let Err(err) = server.await {
            tracing::error!(?err, "mock server stopped");
        }
    });
    Ok((addr, state))
}
