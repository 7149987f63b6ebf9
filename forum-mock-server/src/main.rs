use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use forum_mock_server::{router, seed::Seed, MockServer};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(short, long, env = "FORUM_MOCK_LISTEN", default_value = "127.0.0.1:1337")]
    listen: SocketAddr,

    /// JSON file with initial content, as written by generate-test-data
    #[structopt(short, long, parse(from_os_str))]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let server = match opt.seed {
        None => MockServer::new(),
        Some(path) => {
            let seed = std::fs::read(&path)
                .with_context(|| format!("reading seed file {path:?}"))?;
            let seed: Seed = serde_json::from_slice(&seed)
                .with_context(|| format!("parsing seed file {path:?}"))?;
            let server = MockServer::from_seed(seed)
                .with_context(|| format!("loading seed file {path:?}"))?;
            let (users, threads, posts) = server.test_counts();
            tracing::info!(users, threads, posts, "loaded seed");
            server
        }
    };

    let app = router(Arc::new(tokio::sync::Mutex::new(server)));
    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}
