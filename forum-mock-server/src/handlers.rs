use axum::{
    extract::{Path, Query, State},
    Json,
};
use forum_client::api::{
    AuthResponse, Category, DocumentId, Envelope, NewPost, NewSession, NewThread, NewUser,
    Payload, Post, PostUpdate, Tag, Thread, ThreadUpdate, User,
};

use crate::{extractors::*, Error, Params, Shared};

pub async fn register(
    State(state): State<Shared>,
    Json(data): Json<NewUser>,
) -> Result<Json<AuthResponse>, Error> {
    Ok(Json(state.lock().await.register(data)?))
}

pub async fn login(
    State(state): State<Shared>,
    Json(data): Json<NewSession>,
) -> Result<Json<AuthResponse>, Error> {
    Ok(Json(state.lock().await.login(data)?))
}

pub async fn me(State(state): State<Shared>, PreAuth(token): PreAuth) -> Result<Json<User>, Error> {
    Ok(Json(state.lock().await.me(&token)?))
}

pub async fn categories(
    State(state): State<Shared>,
    Query(q): Query<Params>,
) -> Json<Envelope<Vec<Category>>> {
    Json(state.lock().await.categories(&q))
}

pub async fn threads(
    State(state): State<Shared>,
    Query(q): Query<Params>,
) -> Result<Json<Envelope<Vec<Thread>>>, Error> {
    Ok(Json(state.lock().await.threads(&q)?))
}

pub async fn create_thread(
    State(state): State<Shared>,
    Auth(token): Auth,
    Json(data): Json<Payload<NewThread>>,
) -> Result<Json<Payload<Thread>>, Error> {
    let now = chrono::Utc::now();
    let thread = state.lock().await.create_thread(&token, data.data, now)?;
    Ok(Json(Payload { data: thread }))
}

pub async fn update_thread(
    State(state): State<Shared>,
    Auth(token): Auth,
    Path(id): Path<String>,
    Json(data): Json<Payload<ThreadUpdate>>,
) -> Result<Json<Payload<Thread>>, Error> {
    let thread = state
        .lock()
        .await
        .update_thread(&token, &DocumentId(id), data.data)?;
    Ok(Json(Payload { data: thread }))
}

pub async fn posts(
    State(state): State<Shared>,
    Query(q): Query<Params>,
) -> Result<Json<Envelope<Vec<Post>>>, Error> {
    Ok(Json(state.lock().await.posts(&q)?))
}

pub async fn create_post(
    State(state): State<Shared>,
    Auth(token): Auth,
    Json(data): Json<Payload<NewPost>>,
) -> Result<Json<Payload<Post>>, Error> {
    let now = chrono::Utc::now();
    let post = state.lock().await.create_post(&token, data.data, now)?;
    Ok(Json(Payload { data: post }))
}

pub async fn update_post(
    State(state): State<Shared>,
    Auth(token): Auth,
    Path(id): Path<String>,
    Json(data): Json<Payload<PostUpdate>>,
) -> Result<Json<Payload<Post>>, Error> {
    let post = state
        .lock()
        .await
        .update_post(&token, &DocumentId(id), data.data)?;
    Ok(Json(Payload { data: post }))
}

pub async fn tags(
    State(state): State<Shared>,
    Query(q): Query<Params>,
) -> Json<Envelope<Vec<Tag>>> {
    Json(state.lock().await.tags(&q))
}
