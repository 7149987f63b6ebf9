use std::{io, path::PathBuf};

use anyhow::Context;

use crate::{
    api::{AuthResponse, AuthToken, NewSession, NewUser, User},
    ContentApi, Error,
};

/// Who the front end is acting as
///
/// Passed explicitly to every operation that needs it; an anonymous session
/// has neither token nor user.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub token: Option<AuthToken>,
    /// Last user the API confirmed for `token`
    pub user: Option<User>,
}

impl Session {
    pub fn anonymous() -> Session {
        Session::default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn require_token(&self) -> Result<&AuthToken, Error> {
        self.token.as_ref().ok_or(Error::AuthenticationRequired)
    }

    /// Loads the stored session and checks it is still accepted
    ///
    /// A rejected token clears the store. Any other failure keeps the stored
    /// session as-is, so that being offline does not log the user out.
    pub async fn restore<A, S>(api: &A, store: &S) -> Result<Session, Error>
    where
        A: ContentApi + ?Sized,
        S: SessionStore + ?Sized,
    {
        let mut sess = match store.load()? {
            Some(sess) => sess,
            None => return Ok(Session::anonymous()),
        };
        let Some(token) = sess.token.clone() else {
            return Ok(Session::anonymous());
        };
        match api.me(&token).await {
            Ok(user) => {
                sess.user = Some(user);
                store.save(&sess)?;
                Ok(sess)
            }
            Err(e) if e.is_auth_rejection() => {
                tracing::info!("stored session was rejected, logging out");
                store.clear()?;
                Ok(Session::anonymous())
            }
            Err(err) => {
                tracing::warn!(?err, "could not validate stored session, keeping it");
                Ok(sess)
            }
        }
    }

    pub async fn login<A, S>(
        api: &A,
        store: &S,
        identifier: String,
        password: String,
    ) -> Result<Session, Error>
    where
        A: ContentApi + ?Sized,
        S: SessionStore + ?Sized,
    {
        let req = NewSession::new(identifier, password);
        req.validate()?;
        let res = api.login(&req).await?;
        Session::established(store, res)
    }

    pub async fn register<A, S>(
        api: &A,
        store: &S,
        username: String,
        email: String,
        password: String,
    ) -> Result<Session, Error>
    where
        A: ContentApi + ?Sized,
        S: SessionStore + ?Sized,
    {
        let req = NewUser::new(username, email, password);
        req.validate()?;
        let res = api.register(&req).await?;
        Session::established(store, res)
    }

    fn established<S: SessionStore + ?Sized>(
        store: &S,
        res: AuthResponse,
    ) -> Result<Session, Error> {
        let sess = Session {
            token: Some(res.jwt),
            user: Some(res.user),
        };
        store.save(&sess)?;
        if let Some(user) = &sess.user {
            tracing::info!(user = %user.username, "logged in");
        }
        Ok(sess)
    }

    pub fn logout<S: SessionStore + ?Sized>(&mut self, store: &S) -> Result<(), Error> {
        *self = Session::anonymous();
        store.clear()?;
        Ok(())
    }
}

/// Where the session survives between runs
pub trait SessionStore {
    fn load(&self) -> anyhow::Result<Option<Session>>;
    fn save(&self, session: &Session) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

/// Session kept as a JSON file
#[derive(Clone, Debug)]
pub struct FileStore(pub PathBuf);

impl SessionStore for FileStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        let data = match std::fs::read(&self.0) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading session file {:?}", self.0))
            }
        };
        let sess = serde_json::from_slice(&data)
            .with_context(|| format!("parsing session file {:?}", self.0))?;
        Ok(Some(sess))
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        let data = serde_json::to_vec_pretty(session).context("serializing session")?;
        std::fs::write(&self.0, data)
            .with_context(|| format!("writing session file {:?}", self.0))
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.0) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing session file {:?}", self.0))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore(parking_lot::Mutex<Option<Session>>);

impl SessionStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        Ok(self.0.lock().clone())
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        *self.0.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        *self.0.lock() = None;
        Ok(())
    }
}

/// Session kept in the browser's local storage
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStore;

#[cfg(target_arch = "wasm32")]
impl LocalStore {
    const TOKEN_KEY: &'static str = "forum_token";
    const USER_KEY: &'static str = "forum_user";
}

#[cfg(target_arch = "wasm32")]
impl SessionStore for LocalStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        use gloo_storage::{errors::StorageError, LocalStorage, Storage};
        let token = match LocalStorage::get::<AuthToken>(Self::TOKEN_KEY) {
            Ok(token) => token,
            Err(StorageError::KeyNotFound(_)) => return Ok(None),
            Err(e) => return Err(e).context("reading token from local storage"),
        };
        let user = match LocalStorage::get::<User>(Self::USER_KEY) {
            Ok(user) => Some(user),
            Err(StorageError::KeyNotFound(_)) => None,
            Err(e) => return Err(e).context("reading user from local storage"),
        };
        Ok(Some(Session {
            token: Some(token),
            user,
        }))
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        use gloo_storage::{LocalStorage, Storage};
        match &session.token {
            Some(token) => LocalStorage::set(Self::TOKEN_KEY, token)
                .context("saving token to local storage")?,
            None => LocalStorage::delete(Self::TOKEN_KEY),
        }
        match &session.user {
            Some(user) => LocalStorage::set(Self::USER_KEY, user)
                .context("saving user to local storage")?,
            None => LocalStorage::delete(Self::USER_KEY),
        }
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        use gloo_storage::{LocalStorage, Storage};
        LocalStorage::delete(Self::TOKEN_KEY);
        LocalStorage::delete(Self::USER_KEY);
        Ok(())
    }
}
