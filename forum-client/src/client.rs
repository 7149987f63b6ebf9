use serde::de::DeserializeOwned;

use crate::{
    api::{
        self, query, AuthResponse, AuthToken, Category, DocumentId, Envelope, NewPost,
        NewSession, NewThread, NewUser, Pagination, Payload, Post, PostUpdate, Tag, Thread,
        ThreadUpdate, User,
    },
    Error,
};

/// Everything the forum needs from the content and auth APIs
///
/// Lookups of a single record by slug fail with a not-found API error when
/// nothing matches. Write operations validate their input before sending it.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ContentApi {
    async fn categories(&self) -> Result<Vec<Category>, Error>;
    async fn category_by_slug(&self, slug: &str) -> Result<Category, Error>;
    async fn threads(&self, q: &query::ThreadListQuery) -> Result<(Vec<Thread>, Pagination), Error>;
    async fn thread_by_slug(&self, slug: &str) -> Result<Thread, Error>;

    /// Every post of the thread, flat, each with a reference to its parent
    async fn posts_by_thread(&self, thread: &DocumentId) -> Result<Vec<Post>, Error>;

    async fn create_thread(&self, token: &AuthToken, thread: &NewThread) -> Result<Thread, Error>;
    async fn update_thread(
        &self,
        token: &AuthToken,
        thread: &DocumentId,
        update: &ThreadUpdate,
    ) -> Result<Thread, Error>;
    async fn create_post(&self, token: &AuthToken, post: &NewPost) -> Result<Post, Error>;
    async fn update_post(
        &self,
        token: &AuthToken,
        post: &DocumentId,
        update: &PostUpdate,
    ) -> Result<Post, Error>;
    async fn tags(&self) -> Result<Vec<Tag>, Error>;

    async fn login(&self, session: &NewSession) -> Result<AuthResponse, Error>;
    async fn register(&self, user: &NewUser) -> Result<AuthResponse, Error>;

    /// The user owning `token`; fails with an auth rejection if the token is not valid
    async fn me(&self, token: &AuthToken) -> Result<User, Error>;
}

/// [`ContentApi`] over HTTP
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    api: String,
}

impl HttpClient {
    /// `host` is the server root, eg. `http://localhost:1337`
    pub fn new(host: &str) -> HttpClient {
        HttpClient {
            client: reqwest::Client::new(),
            api: format!("{}/api", host.trim_end_matches('/')),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api, path)
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, Error> {
        let req = req.build()?;
        let (method, url) = (req.method().clone(), req.url().clone());
        tracing::debug!(%method, %url, "sending request");
        let res = match self.client.execute(req).await {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(%method, %url, ?err, "request failed");
                return Err(Error::Network(err));
            }
        };
        let status = res.status();
        if !status.is_success() {
            let body = res.bytes().await?;
            let err = api::Error::parse(status, &body);
            tracing::error!(%method, %url, %status, ?err, "server rejected request");
            return Err(Error::Api(err));
        }
        Ok(res.json().await?)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        q: &query::QueryString,
    ) -> Result<Envelope<Vec<T>>, Error> {
        self.send(self.client.get(self.url(path)).query(q.pairs()))
            .await
    }

    async fn get_one<T: DeserializeOwned>(
        &self,
        path: &str,
        q: &query::QueryString,
        what: String,
    ) -> Result<T, Error> {
        let env = self.get_list::<T>(path, q).await?;
        env.data
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(what))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
impl ContentApi for HttpClient {
    async fn categories(&self) -> Result<Vec<Category>, Error> {
        Ok(self
            .get_list("/forum-categories", &query::categories())
            .await?
            .data)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Category, Error> {
        self.get_one(
            "/forum-categories",
            &query::category_by_slug(slug),
            format!("category {slug}"),
        )
        .await
    }

    async fn threads(
        &self,
        q: &query::ThreadListQuery,
    ) -> Result<(Vec<Thread>, Pagination), Error> {
        let env = self.get_list("/threads", &q.to_query()).await?;
        let total = env.data.len() as u64;
        let pagination = env
            .meta
            .pagination
            .unwrap_or_else(|| Pagination::for_total(q.page, q.page_size, total));
        Ok((env.data, pagination))
    }

    async fn thread_by_slug(&self, slug: &str) -> Result<Thread, Error> {
        self.get_one(
            "/threads",
            &query::thread_by_slug(slug),
            format!("thread {slug}"),
        )
        .await
    }

    async fn posts_by_thread(&self, thread: &DocumentId) -> Result<Vec<Post>, Error> {
        let mut posts = Vec::new();
        let mut page = 1;
        loop {
            let env = self
                .get_list::<Post>("/posts", &query::posts_by_thread(thread, page))
                .await?;
            let last = env.data.is_empty()
                || env.meta.pagination.map_or(true, |p| page >= p.page_count);
            posts.extend(env.data);
            if last {
                return Ok(posts);
            }
            page += 1;
        }
    }

    async fn create_thread(&self, token: &AuthToken, thread: &NewThread) -> Result<Thread, Error> {
        thread.validate()?;
        let res: Payload<Thread> = self
            .send(
                self.client
                    .post(self.url("/threads"))
                    .bearer_auth(&token.0)
                    .json(&Payload { data: thread }),
            )
            .await?;
        Ok(res.data)
    }

    async fn update_thread(
        &self,
        token: &AuthToken,
        thread: &DocumentId,
        update: &ThreadUpdate,
    ) -> Result<Thread, Error> {
        update.validate()?;
        let res: Payload<Thread> = self
            .send(
                self.client
                    .put(self.url(&format!("/threads/{thread}")))
                    .bearer_auth(&token.0)
                    .json(&Payload { data: update }),
            )
            .await?;
        Ok(res.data)
    }

    async fn create_post(&self, token: &AuthToken, post: &NewPost) -> Result<Post, Error> {
        post.validate()?;
        let res: Payload<Post> = self
            .send(
                self.client
                    .post(self.url("/posts"))
                    .bearer_auth(&token.0)
                    .json(&Payload { data: post }),
            )
            .await?;
        Ok(res.data)
    }

    async fn update_post(
        &self,
        token: &AuthToken,
        post: &DocumentId,
        update: &PostUpdate,
    ) -> Result<Post, Error> {
        update.validate()?;
        let res: Payload<Post> = self
            .send(
                self.client
                    .put(self.url(&format!("/posts/{post}")))
                    .bearer_auth(&token.0)
                    .json(&Payload { data: update }),
            )
            .await?;
        Ok(res.data)
    }

    async fn tags(&self) -> Result<Vec<Tag>, Error> {
        Ok(self.get_list("/tags", &query::tags()).await?.data)
    }

    async fn login(&self, session: &NewSession) -> Result<AuthResponse, Error> {
        session.validate()?;
        self.send(self.client.post(self.url("/auth/local")).json(session))
            .await
    }

    async fn register(&self, user: &NewUser) -> Result<AuthResponse, Error> {
        user.validate()?;
        self.send(
            self.client
                .post(self.url("/auth/local/register"))
                .json(user),
        )
        .await
    }

    async fn me(&self, token: &AuthToken) -> Result<User, Error> {
        self.send(self.client.get(self.url("/users/me")).bearer_auth(&token.0))
            .await
    }
}
