use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::TimeZone;
use parking_lot::Mutex;

use crate::{
    api::{
        self, query::ThreadListQuery, AuthResponse, AuthToken, Category, DocumentId, NewPost,
        NewSession, NewThread, NewUser, Pagination, Post, PostId, PostUpdate, Ref, Tag, Thread,
        ThreadId, ThreadUpdate, Time, User, UserId,
    },
    ContentApi, Error,
};

pub fn at(minute: i64) -> Time {
    chrono::Utc
        .timestamp_opt(1_700_000_000 + minute * 60, 0)
        .single()
        .expect("fixture time out of range")
}

pub fn user(id: u64, name: &str) -> User {
    User {
        id: UserId(id),
        document_id: Some(DocumentId(format!("u{id}"))),
        username: String::from(name),
        email: None,
    }
}

pub fn post(id: u64, parent: Option<u64>, minute: i64) -> Post {
    Post {
        id: PostId(id),
        document_id: DocumentId(format!("p{id}")),
        content: format!("post {id}"),
        parent_post: parent.map(|p| Ref::to(PostId(p), DocumentId(format!("p{p}")))),
        thread: None,
        author: None,
        is_accepted_answer: false,
        upvote_count: 0,
        created_at: at(minute),
        edited_at: None,
        child_posts: None,
    }
}

pub fn nested(mut p: Post, children: Vec<Post>) -> Post {
    p.child_posts = Some(children);
    p
}

pub fn thread(id: u64, pinned: bool, views: u64, minute: i64) -> Thread {
    Thread {
        id: ThreadId(id),
        document_id: DocumentId(format!("th{id}")),
        title: format!("thread {id}"),
        slug: format!("thread-{id}"),
        content: String::new(),
        status: Default::default(),
        is_pinned: pinned,
        is_locked: false,
        is_answered: false,
        view_count: views,
        author: None,
        category: None,
        tags: None,
        posts: None,
        created_at: at(minute),
        updated_at: None,
    }
}

/// Ids in depth-first order, with their depth
pub fn shape(posts: &[Post]) -> Vec<(u64, usize)> {
    fn go(posts: &[Post], depth: usize, out: &mut Vec<(u64, usize)>) {
        for p in posts {
            out.push((p.id.0, depth));
            go(p.child_posts.as_deref().unwrap_or(&[]), depth + 1, out);
        }
    }
    let mut out = Vec::new();
    go(posts, 0, &mut out);
    out
}

/// In-memory [`ContentApi`] counting every call it receives
///
/// Posts created through it are stored flat and handed back by
/// `posts_by_thread`. Only the token registered with `accept_token` is valid;
/// `login` and `register` accept anyone and hand out `jwt-<name>`.
#[derive(Default)]
pub struct FakeApi {
    pub calls: AtomicUsize,
    posts: Mutex<Vec<Post>>,
    threads: Mutex<Vec<Thread>>,
    token: Mutex<Option<(AuthToken, User)>>,
    failure: Mutex<Option<api::Error>>,
    refresh_failure: Mutex<Option<api::Error>>,
    /// Held by a test to keep writes pending
    pub hold: tokio::sync::Mutex<()>,
}

impl FakeApi {
    pub fn accept_token(&self, token: &str, user: User) {
        *self.token.lock() = Some((AuthToken(String::from(token)), user));
    }

    /// Every following call fails with `err`
    pub fn fail_with(&self, err: api::Error) {
        *self.failure.lock() = Some(err);
    }

    /// Only `posts_by_thread` fails, with `err`
    pub fn fail_refresh_with(&self, err: api::Error) {
        *self.refresh_failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
        *self.refresh_failure.lock() = None;
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    fn call(&self) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.failure.lock() {
            Some(err) => Err(Error::Api(err.clone())),
            None => Ok(()),
        }
    }

    fn authenticate(&self, token: &AuthToken) -> Result<User, Error> {
        match &*self.token.lock() {
            Some((t, u)) if t == token => Ok(u.clone()),
            _ => Err(Error::Api(api::Error::Unauthorized)),
        }
    }

    fn auth_response(&self, name: &str) -> AuthResponse {
        let u = user(1, name);
        let jwt = AuthToken(format!("jwt-{name}"));
        self.accept_token(&jwt.0, u.clone());
        AuthResponse { jwt, user: u }
    }
}

#[async_trait::async_trait]
impl ContentApi for FakeApi {
    async fn categories(&self) -> Result<Vec<Category>, Error> {
        self.call()?;
        Ok(Vec::new())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Category, Error> {
        self.call()?;
        Err(Error::not_found(format!("category {slug}")))
    }

    async fn threads(&self, q: &ThreadListQuery) -> Result<(Vec<Thread>, Pagination), Error> {
        self.call()?;
        let threads = self.threads.lock().clone();
        let total = threads.len() as u64;
        Ok((threads, Pagination::for_total(q.page, q.page_size, total)))
    }

    async fn thread_by_slug(&self, slug: &str) -> Result<Thread, Error> {
        self.call()?;
        self.threads
            .lock()
            .iter()
            .find(|t| t.slug == slug)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("thread {slug}")))
    }

    async fn posts_by_thread(&self, _thread: &DocumentId) -> Result<Vec<Post>, Error> {
        self.call()?;
        if let Some(err) = &*self.refresh_failure.lock() {
            return Err(Error::Api(err.clone()));
        }
        Ok(self.posts())
    }

    async fn create_thread(&self, token: &AuthToken, new: &NewThread) -> Result<Thread, Error> {
        self.call()?;
        let author = self.authenticate(token)?;
        let _hold = self.hold.lock().await;
        let mut threads = self.threads.lock();
        let mut t = thread(threads.len() as u64 + 1, new.is_pinned, 0, 0);
        t.title = new.title.clone();
        t.slug = new.slug.clone();
        t.content = new.content.clone();
        t.author = Some(author);
        threads.push(t.clone());
        Ok(t)
    }

    async fn update_thread(
        &self,
        token: &AuthToken,
        id: &DocumentId,
        _update: &ThreadUpdate,
    ) -> Result<Thread, Error> {
        self.call()?;
        self.authenticate(token)?;
        Err(Error::not_found(format!("thread {id}")))
    }

    async fn create_post(&self, token: &AuthToken, new: &NewPost) -> Result<Post, Error> {
        self.call()?;
        let author = self.authenticate(token)?;
        let _hold = self.hold.lock().await;
        let mut posts = self.posts.lock();
        let id = posts.len() as u64 + 1;
        let parent = match &new.parent_post {
            None => None,
            Some(doc) => Some(
                posts
                    .iter()
                    .find(|p| p.document_id == *doc)
                    .map(|p| p.id.0)
                    .ok_or_else(|| Error::not_found(format!("post {doc}")))?,
            ),
        };
        let mut p = post(id, parent, id as i64);
        p.content = new.content.clone();
        p.thread = Some(Ref {
            id: None,
            document_id: Some(new.thread.clone()),
        });
        p.author = Some(author);
        posts.push(p.clone());
        Ok(p)
    }

    async fn update_post(
        &self,
        token: &AuthToken,
        id: &DocumentId,
        _update: &PostUpdate,
    ) -> Result<Post, Error> {
        self.call()?;
        self.authenticate(token)?;
        Err(Error::not_found(format!("post {id}")))
    }

    async fn tags(&self) -> Result<Vec<Tag>, Error> {
        self.call()?;
        Ok(Vec::new())
    }

    async fn login(&self, session: &NewSession) -> Result<AuthResponse, Error> {
        self.call()?;
        Ok(self.auth_response(&session.identifier))
    }

    async fn register(&self, new: &NewUser) -> Result<AuthResponse, Error> {
        self.call()?;
        Ok(self.auth_response(&new.username))
    }

    async fn me(&self, token: &AuthToken) -> Result<User, Error> {
        self.call()?;
        self.authenticate(token)
    }
}
