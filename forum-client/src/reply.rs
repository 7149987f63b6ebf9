use parking_lot::Mutex;

use crate::{
    api::{self, DocumentId, NewPost, NewThread, Thread, Time, MAX_TAGS_PER_THREAD},
    ContentApi, Error, ReplyTree, Session,
};

/// Input state of the reply box under a thread or a post
#[derive(Debug)]
pub struct ReplyForm {
    thread: DocumentId,
    parent: Option<DocumentId>,
    body: Mutex<String>,
    in_flight: Mutex<bool>,
}

/// Clears the in-flight flag however the submission ends
struct InFlight<'a>(&'a Mutex<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0.lock() = false;
    }
}

impl ReplyForm {
    /// `parent` is `None` for a top-level reply to the thread
    pub fn new(thread: DocumentId, parent: Option<DocumentId>) -> ReplyForm {
        ReplyForm {
            thread,
            parent,
            body: Mutex::new(String::new()),
            in_flight: Mutex::new(false),
        }
    }

    pub fn thread(&self) -> &DocumentId {
        &self.thread
    }

    pub fn parent(&self) -> Option<&DocumentId> {
        self.parent.as_ref()
    }

    pub fn set_body(&self, body: impl Into<String>) {
        *self.body.lock() = body.into();
    }

    pub fn body(&self) -> String {
        self.body.lock().clone()
    }

    /// Front ends disable their submit control while this is true
    pub fn is_submitting(&self) -> bool {
        *self.in_flight.lock()
    }

    /// Posts the reply, then fetches the thread's replies again
    ///
    /// Once the server accepts the reply the body is cleared. If fetching the
    /// replies afterwards fails, the reply still counts as posted and
    /// [`Error::RefreshFailed`] is returned. Any other failure leaves the body
    /// untouched so the user can retry. Nothing is sent without a session
    /// token, with an invalid body, or while another submission of this form
    /// is pending.
    pub async fn submit<A>(&self, api: &A, session: &Session) -> Result<ReplyTree, Error>
    where
        A: ContentApi + ?Sized,
    {
        let token = session.require_token()?;
        let post = {
            let mut in_flight = self.in_flight.lock();
            if *in_flight {
                return Err(Error::SubmissionInFlight);
            }
            let post = NewPost::new(&self.body.lock(), self.thread.clone(), self.parent.clone());
            post.validate()?;
            *in_flight = true;
            post
        };
        let _in_flight = InFlight(&self.in_flight);

        api.create_post(token, &post).await?;
        tracing::debug!(thread = %self.thread, "reply posted");
        self.body.lock().clear();

        let posts = api
            .posts_by_thread(&self.thread)
            .await
            .map_err(|e| Error::RefreshFailed(Box::new(e)))?;
        Ok(ReplyTree::build(posts))
    }
}

/// Input state of the new-thread form
#[derive(Debug, Default)]
pub struct ThreadForm {
    state: Mutex<ThreadState>,
    in_flight: Mutex<bool>,
}

#[derive(Clone, Debug, Default)]
struct ThreadState {
    title: String,
    content: String,
    category: Option<DocumentId>,
    tags: Vec<DocumentId>,
}

impl ThreadForm {
    pub fn new() -> ThreadForm {
        ThreadForm::default()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.state.lock().title = title.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.state.lock().content = content.into();
    }

    pub fn set_category(&self, category: Option<DocumentId>) {
        self.state.lock().category = category;
    }

    pub fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    pub fn content(&self) -> String {
        self.state.lock().content.clone()
    }

    pub fn tags(&self) -> Vec<DocumentId> {
        self.state.lock().tags.clone()
    }

    /// Selects `tag`, or deselects it if it already was
    pub fn toggle_tag(&self, tag: DocumentId) -> Result<(), Error> {
        let mut state = self.state.lock();
        if let Some(pos) = state.tags.iter().position(|t| *t == tag) {
            state.tags.remove(pos);
            return Ok(());
        }
        if state.tags.len() >= MAX_TAGS_PER_THREAD {
            return Err(api::Error::TooManyTags(state.tags.len() + 1).into());
        }
        state.tags.push(tag);
        Ok(())
    }

    pub fn is_submitting(&self) -> bool {
        *self.in_flight.lock()
    }

    /// Creates the thread; the form is reset on success and kept on failure
    pub async fn submit<A>(&self, api: &A, session: &Session, now: Time) -> Result<Thread, Error>
    where
        A: ContentApi + ?Sized,
    {
        let token = session.require_token()?;
        let thread = {
            let mut in_flight = self.in_flight.lock();
            if *in_flight {
                return Err(Error::SubmissionInFlight);
            }
            let state = self.state.lock();
            let category = state
                .category
                .clone()
                .ok_or_else(|| api::Error::EmptyField(String::from("category")))?;
            let thread = NewThread::new(
                &state.title,
                &state.content,
                category,
                state.tags.clone(),
                now,
            );
            thread.validate()?;
            *in_flight = true;
            thread
        };
        let _in_flight = InFlight(&self.in_flight);

        let created = api.create_thread(token, &thread).await?;
        tracing::info!(slug = %created.slug, "thread created");
        *self.state.lock() = ThreadState::default();
        Ok(created)
    }
}
