#![cfg(test)]

use std::{panic::AssertUnwindSafe, sync::Arc};

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{self, request},
    Router,
};
use forum_client::{
    api::{self, query, AuthResponse, AuthToken, Envelope, Payload, Post, Thread, User},
    ReplyTree,
};
use serde_json::{json, Value};
use tower::{Service, ServiceExt};

use crate::{extractors::*, seed::Seed, *};

macro_rules! do_tokio_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_type::<$typ>()
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

fn app() -> Router {
    router(Arc::new(tokio::sync::Mutex::new(MockServer::new())))
}

fn app_with(seed: Seed) -> Router {
    let server = MockServer::from_seed(seed).expect("loading seed");
    router(Arc::new(tokio::sync::Mutex::new(server)))
}

async fn call<Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    token: Option<&AuthToken>,
    body: Option<Value>,
) -> Result<Resp, api::Error>
where
    Resp: for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json");
    let req = match token {
        Some(token) => req.header(http::header::AUTHORIZATION, format!("Bearer {}", token.0)),
        None => req,
    };
    let req = req
        .body(match body {
            Some(body) => Body::from(serde_json::to_vec(&body).expect("serializing request body")),
            None => Body::empty(),
        })
        .expect("building request");
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status.is_success() {
        Ok(serde_json::from_slice(&body)
            .unwrap_or_else(|err| panic!("parsing response {body:?} to {method} {uri}: {err}")))
    } else {
        Err(api::Error::parse(status, &body))
    }
}

async fn register(app: &mut Router, name: &str) -> AuthResponse {
    call(
        app,
        "POST",
        "/api/auth/local/register",
        None,
        Some(json!({
            "username": name,
            "email": format!("{name}@research.org"),
            "password": "correct horse",
        })),
    )
    .await
    .expect("registering user")
}

fn seed() -> Seed {
    serde_json::from_value(json!({
        "users": [{ "username": "dr_amara", "email": "amara@university.edu", "password": "pw" }],
        "categories": [
            { "name": "Data Management", "slug": "data", "sort_order": 4 },
            { "name": "Announcements", "slug": "announcements", "sort_order": 0 },
        ],
        "tags": [{ "name": "Question" }, { "name": "Funding" }],
        "threads": [
            {
                "title": "Quiet", "slug": "quiet", "content": "a", "category": "data",
                "author": "dr_amara", "created_at": "2024-03-01T10:00:00Z", "view_count": 3,
            },
            {
                "title": "Popular", "slug": "popular", "content": "b", "category": "data",
                "author": "dr_amara", "created_at": "2024-03-01T09:00:00Z", "view_count": 300,
            },
            {
                "title": "Locked", "slug": "locked", "content": "c", "category": "announcements",
                "author": "dr_amara", "created_at": "2024-03-01T08:00:00Z", "is_locked": true,
            },
        ],
    }))
    .expect("parsing seed")
}

async fn thread_by_slug(app: &mut Router, slug: &str) -> Thread {
    let mut res: Envelope<Vec<Thread>> = call(
        app,
        "GET",
        &format!("/api/threads?filters%5Bslug%5D%5B%24eq%5D={slug}"),
        None,
        None,
    )
    .await
    .expect("fetching thread");
    res.data.pop().expect("thread not found")
}

do_tokio_test!(fuzz_preauth_extractor, String, |token| async move {
    if let Ok(req) = http::Request::builder()
        .method(http::Method::GET)
        .uri("/")
        .header(http::header::AUTHORIZATION, token)
        .body(())
    {
        let mut req = req.into_parts().0;
        let res = PreAuth::from_request_parts(&mut req, &()).await;
        match res {
            Ok(PreAuth(tok)) => assert!(!tok.0.is_empty() && !tok.0.contains(' ')),
            Err(Error::Api(api::Error::Unauthorized)) => (),
            Err(e) => panic!("got unexpected error: {e}"),
        }
    }
});

#[tokio::test]
async fn auth_flow() {
    let mut app = app();
    let res = register(&mut app, "kwame_asante").await;
    assert_eq!(res.user.username, "kwame_asante");

    let me: User = call(&mut app, "GET", "/api/users/me", Some(&res.jwt), None)
        .await
        .unwrap();
    assert_eq!(me.email.as_deref(), Some("kwame_asante@research.org"));

    let again = call::<AuthResponse>(
        &mut app,
        "POST",
        "/api/auth/local/register",
        None,
        Some(json!({ "username": "kwame_asante", "email": "other@research.org", "password": "x" })),
    )
    .await;
    assert!(matches!(again, Err(api::Error::Validation(_))), "{again:?}");

    let bad = call::<AuthResponse>(
        &mut app,
        "POST",
        "/api/auth/local",
        None,
        Some(json!({ "identifier": "kwame_asante", "password": "wrong" })),
    )
    .await;
    assert!(matches!(bad, Err(api::Error::Validation(_))), "{bad:?}");

    let login: AuthResponse = call(
        &mut app,
        "POST",
        "/api/auth/local",
        None,
        Some(json!({ "identifier": "KWAME_ASANTE@research.org", "password": "correct horse" })),
    )
    .await
    .unwrap();
    assert_ne!(login.jwt, res.jwt);

    let forged = AuthToken(String::from("forged"));
    let me = call::<User>(&mut app, "GET", "/api/users/me", Some(&forged), None).await;
    assert_eq!(me, Err(api::Error::Unauthorized));
    let me = call::<User>(&mut app, "GET", "/api/users/me", None, None).await;
    assert_eq!(me, Err(api::Error::Unauthorized));
}

#[tokio::test]
async fn thread_listing() {
    let mut app = app_with(seed());
    let page: Envelope<Vec<Thread>> = call(
        &mut app,
        "GET",
        "/api/threads?sort=view_count:desc&pagination%5BpageSize%5D=2&populate%5Bcategory%5D=true",
        None,
        None,
    )
    .await
    .unwrap();
    let slugs = page.data.iter().map(|t| &t.slug as &str).collect::<Vec<_>>();
    assert_eq!(slugs, vec!["popular", "quiet"]);
    assert_eq!(page.data[0].category.as_ref().unwrap().slug, "data");
    assert_eq!(page.data[0].author, None);
    let pagination = page.meta.pagination.unwrap();
    assert_eq!((pagination.total, pagination.page_count), (3, 2));

    let second: Envelope<Vec<Thread>> = call(
        &mut app,
        "GET",
        "/api/threads?sort=view_count:desc&pagination%5BpageSize%5D=2&pagination%5Bpage%5D=2",
        None,
        None,
    )
    .await
    .unwrap();
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0].slug, "locked");
    assert_eq!(second.data[0].category, None);

    let bad =
        call::<Envelope<Vec<Thread>>>(&mut app, "GET", "/api/threads?sort=nope:asc", None, None)
            .await;
    assert!(matches!(bad, Err(api::Error::Validation(_))), "{bad:?}");
}

#[tokio::test]
async fn posting_replies() {
    let mut app = app_with(seed());
    let kwame = register(&mut app, "kwame_asante").await.jwt;
    let quiet = thread_by_slug(&mut app, "quiet").await;
    let popular = thread_by_slug(&mut app, "popular").await;
    let locked = thread_by_slug(&mut app, "locked").await;

    let reply = |thread: &Thread, parent: Option<&Post>, content: &str| {
        let mut data = json!({
            "content": content,
            "thread": thread.document_id,
            "upvote_count": 0,
            "is_accepted_answer": false,
        });
        if let Some(p) = parent {
            data["parent_post"] = json!(p.document_id);
        }
        json!({ "data": data })
    };

    let anon = call::<Payload<Post>>(
        &mut app,
        "POST",
        "/api/posts",
        None,
        Some(reply(&quiet, None, "hi")),
    )
    .await;
    assert_eq!(anon.unwrap_err(), api::Error::Unauthorized);

    let root: Payload<Post> = call(
        &mut app,
        "POST",
        "/api/posts",
        Some(&kwame),
        Some(reply(&quiet, None, "root")),
    )
    .await
    .unwrap();
    assert_eq!(root.data.author.as_ref().unwrap().username, "kwame_asante");
    assert_eq!(root.data.author.as_ref().unwrap().email, None);
    let child: Payload<Post> = call(
        &mut app,
        "POST",
        "/api/posts",
        Some(&kwame),
        Some(reply(&quiet, Some(&root.data), "child")),
    )
    .await
    .unwrap();

    let cross = call::<Payload<Post>>(
        &mut app,
        "POST",
        "/api/posts",
        Some(&kwame),
        Some(reply(&popular, Some(&root.data), "elsewhere")),
    )
    .await;
    assert!(matches!(cross, Err(api::Error::Validation(_))), "{cross:?}");

    let on_locked = call::<Payload<Post>>(
        &mut app,
        "POST",
        "/api/posts",
        Some(&kwame),
        Some(reply(&locked, None, "let me in")),
    )
    .await;
    assert_eq!(on_locked.unwrap_err(), api::Error::Forbidden);

    let empty = call::<Payload<Post>>(
        &mut app,
        "POST",
        "/api/posts",
        Some(&kwame),
        Some(reply(&quiet, None, "  ")),
    )
    .await;
    assert!(matches!(empty, Err(api::Error::EmptyField(_))), "{empty:?}");

    let flat: Envelope<Vec<Post>> = call(
        &mut app,
        "GET",
        &uri("/posts", &query::posts_by_thread(&quiet.document_id, 1)),
        None,
        None,
    )
    .await
    .unwrap();
    let ids = flat.data.iter().map(|p| p.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![root.data.id, child.data.id]);
    let parent = flat.data[1].parent_post.as_ref().unwrap();
    assert_eq!(parent.document_id.as_ref(), Some(&root.data.document_id));
    assert_eq!(flat.data[1].child_posts, None);

    let nested = query::QueryString::new()
        .with(query::FILTER_THREAD, &quiet.document_id)
        .with(query::FILTER_ROOT_POSTS, true)
        .populate(&["child_posts", "author"]);
    let roots: Envelope<Vec<Post>> = call(&mut app, "GET", &uri("/posts", &nested), None, None)
        .await
        .unwrap();
    assert_eq!(roots.data.len(), 1);
    assert_eq!(roots.data[0].author, None);
    let children = roots.data[0].child_posts.as_ref().unwrap();
    assert_eq!(children[0].id, child.data.id);
    assert_eq!(children[0].author.as_ref().unwrap().username, "kwame_asante");
    // one level asked for, one level given
    assert_eq!(children[0].child_posts, None);
}

#[tokio::test]
async fn only_authors_edit() {
    let mut app = app_with(seed());
    let amara = call::<AuthResponse>(
        &mut app,
        "POST",
        "/api/auth/local",
        None,
        Some(json!({ "identifier": "dr_amara", "password": "pw" })),
    )
    .await
    .unwrap()
    .jwt;
    let kwame = register(&mut app, "kwame_asante").await.jwt;
    let quiet = thread_by_slug(&mut app, "quiet").await;
    let uri = format!("/api/threads/{}", quiet.document_id);

    let lock = || Some(json!({ "data": { "is_locked": true } }));
    let res = call::<Payload<Thread>>(&mut app, "PUT", &uri, Some(&kwame), lock()).await;
    assert_eq!(res.unwrap_err(), api::Error::Forbidden);
    let res: Payload<Thread> = call(&mut app, "PUT", &uri, Some(&amara), lock())
        .await
        .unwrap();
    assert!(res.data.is_locked);

    let missing = call::<Payload<Thread>>(
        &mut app,
        "PUT",
        "/api/threads/nope",
        Some(&amara),
        Some(json!({ "data": {} })),
    )
    .await;
    assert!(matches!(missing, Err(api::Error::NotFound(_))), "{missing:?}");
}

fn uri(path: &str, q: &query::QueryString) -> String {
    let q = serde_urlencoded::to_string(q.pairs()).expect("encoding query string");
    format!("/api{path}?{q}")
}

// Replies land under random earlier posts, or at the root; whatever the
// shape, fetching the thread's posts flat must yield a tree holding them all
do_tokio_test!(fuzz_reply_trees, Vec<Option<u8>>, |parents: Vec<Option<u8>>| async move {
    let mut app = app_with(seed());
    let tok = register(&mut app, "fuzzer").await.jwt;
    let thread = thread_by_slug(&mut app, "quiet").await;
    let mut posts: Vec<Post> = Vec::new();
    for parent in parents.into_iter().take(30) {
        let parent = match parent {
            Some(i) if !posts.is_empty() => {
                Some(posts[i as usize % posts.len()].document_id.clone())
            }
            _ => None,
        };
        let res: Payload<Post> = call(
            &mut app,
            "POST",
            "/api/posts",
            Some(&tok),
            Some(json!({
                "data": { "content": "reply", "thread": thread.document_id, "parent_post": parent }
            })),
        )
        .await
        .expect("posting reply");
        posts.push(res.data);
    }
    let flat: Envelope<Vec<Post>> = call(
        &mut app,
        "GET",
        &uri("/posts", &query::posts_by_thread(&thread.document_id, 1)),
        None,
        None,
    )
    .await
    .expect("listing posts");
    assert_eq!(flat.data.len(), posts.len());
    let tree = ReplyTree::build(flat.data);
    assert_eq!(tree.len(), posts.len());
    let roots = posts.iter().filter(|p| p.parent_post.is_none()).count();
    assert_eq!(tree.roots().len(), roots);
});
