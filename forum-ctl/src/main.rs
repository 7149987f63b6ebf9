use std::{io::BufRead, path::PathBuf};

use anyhow::{anyhow, Context};
use forum_client::{
    api::{query::ThreadListQuery, DocumentId, Thread, ThreadStatus, Time, Visibility},
    format_time_ago, sort_categories, sort_tags, ContentApi, FileStore, HttpClient, ReplyForm,
    Session, ThreadForm, ThreadOrder, ThreadView, DEFAULT_MAX_DEPTH,
};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Root of the forum server
    #[structopt(short, long, env = "FORUM_HOST", default_value = "http://localhost:1337")]
    host: String,

    /// Where the login session is kept between runs
    #[structopt(
        long,
        env = "FORUM_SESSION",
        default_value = ".forum-session.json",
        parse(from_os_str)
    )]
    session_file: PathBuf,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Log in, with the password from FORUM_PASSWORD or stdin
    Login {
        /// Username or email
        identifier: String,
    },

    /// Create an account and log into it
    Register { username: String, email: String },

    Logout,

    /// Check the stored session against the server
    Whoami,

    /// List categories
    Categories,

    /// List threads, pinned ones first
    Threads {
        /// Only threads of the category with this slug
        #[structopt(long)]
        category: Option<String>,

        /// recent, popular or replies
        #[structopt(long, default_value = "recent")]
        sort: ThreadOrder,

        #[structopt(long, default_value = "1")]
        page: u64,

        #[structopt(long, default_value = "20")]
        page_size: u64,
    },

    /// Show a thread and its replies
    Thread {
        slug: String,

        /// Replies deeper than this are not indented further
        #[structopt(long)]
        max_depth: Option<usize>,
    },

    /// Reply to a thread, or to one of its posts
    Reply {
        thread: String,
        body: String,

        /// Document id of the post to reply to, as shown by `thread`
        #[structopt(long)]
        parent: Option<String>,
    },

    /// Start a thread
    NewThread {
        category: String,
        title: String,
        content: String,

        /// Tag slug, up to three times
        #[structopt(long = "tag")]
        tags: Vec<String>,
    },

    /// List tags
    Tags,
}

fn password() -> anyhow::Result<String> {
    if let Ok(pass) = std::env::var("FORUM_PASSWORD") {
        return Ok(pass);
    }
    eprint!("Password: ");
    let mut pass = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut pass)
        .context("reading password from stdin")?;
    Ok(pass.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn badges(t: &Thread) -> String {
    let mut res = String::new();
    if t.is_pinned {
        res.push_str("[pinned] ");
    }
    if t.is_answered {
        res.push_str("[answered] ");
    }
    if t.is_locked {
        res.push_str("[locked] ");
    }
    if t.status == ThreadStatus::Closed {
        res.push_str("[closed] ");
    }
    res
}

fn indented(text: &str, indent: usize) -> String {
    let pad = "    ".repeat(indent);
    text.lines()
        .map(|l| format!("{pad}  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Posts `body` and returns how many replies the thread has afterwards
///
/// Nothing is fetched before the session is known to hold a token.
async fn reply(
    api: &impl ContentApi,
    sess: &Session,
    thread: &str,
    body: String,
    parent: Option<String>,
) -> anyhow::Result<usize> {
    sess.require_token()?;
    let thread = api.thread_by_slug(thread).await?;
    let form = ReplyForm::new(thread.document_id, parent.map(DocumentId));
    form.set_body(body);
    let tree = form.submit(api, sess).await.context("posting reply")?;
    Ok(tree.len())
}

async fn new_thread(
    api: &impl ContentApi,
    sess: &Session,
    form: ThreadForm,
    category: &str,
    tags: &[String],
    now: Time,
) -> anyhow::Result<Thread> {
    sess.require_token()?;
    let (category, mut known) = futures::try_join!(api.category_by_slug(category), api.tags())?;
    sort_tags(&mut known);
    form.set_category(Some(category.document_id));
    for slug in tags {
        let tag = known
            .iter()
            .find(|t| t.slug == *slug)
            .ok_or_else(|| anyhow!("unknown tag {slug:?}"))?;
        form.toggle_tag(tag.document_id.clone())?;
    }
    let thread = form.submit(api, sess, now).await.context("creating thread")?;
    Ok(thread)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let api = HttpClient::new(&opt.host);
    let store = FileStore(opt.session_file.clone());
    let now = chrono::Utc::now();

    match opt.cmd {
        Command::Login { identifier } => {
            let sess = Session::login(&api, &store, identifier, password()?)
                .await
                .context("logging in")?;
            if let Some(user) = sess.user() {
                println!("Logged in as {}", user.username);
            }
        }
        Command::Register { username, email } => {
            let sess = Session::register(&api, &store, username, email, password()?)
                .await
                .context("registering")?;
            if let Some(user) = sess.user() {
                println!("Registered and logged in as {}", user.username);
            }
        }
        Command::Logout => {
            let mut sess = Session::restore(&api, &store).await?;
            sess.logout(&store)?;
            println!("Logged out");
        }
        Command::Whoami => match Session::restore(&api, &store).await?.user() {
            Some(user) => println!("{} <{}>", user.username, user.email.as_deref().unwrap_or("")),
            None => println!("Not logged in"),
        },
        Command::Categories => {
            let (sess, mut cats) = futures::try_join!(
                Session::restore(&api, &store),
                api.categories()
            )?;
            sort_categories(&mut cats);
            for c in cats {
                let lock = match (c.visibility, c.is_visible_to(sess.user())) {
                    (Visibility::MembersOnly, false) => " [members only, log in to view]",
                    (Visibility::MembersOnly, true) => " [members only]",
                    (Visibility::Public, _) => "",
                };
                println!("{} ({}){lock}: {} threads", c.name, c.slug, c.thread_count());
                if let Some(desc) = &c.description {
                    println!("    {desc}");
                }
            }
        }
        Command::Threads {
            category,
            sort,
            page,
            page_size,
        } => {
            let category = match category {
                Some(slug) => Some(api.category_by_slug(&slug).await?.document_id),
                None => None,
            };
            let q = ThreadListQuery {
                category,
                page,
                page_size,
                sort: String::from(sort.server_sort()),
            };
            let (threads, pagination) = api.threads(&q).await.context("listing threads")?;
            for t in sort.sorted(threads) {
                let tags = t
                    .tags
                    .iter()
                    .flatten()
                    .map(|t| format!("#{}", t.slug))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{}{} ({})", badges(&t), t.title, t.slug);
                println!(
                    "    by {}, {} replies, {} views, {} {tags}",
                    t.author.as_ref().map_or("Anonymous", |a| &a.username as &str),
                    t.reply_count(),
                    t.view_count,
                    format_time_ago(t.last_activity(), now),
                );
            }
            println!(
                "Page {} of {} ({} threads)",
                pagination.page,
                pagination.page_count.max(1),
                pagination.total
            );
        }
        Command::Thread { slug, max_depth } => {
            let view = ThreadView::new(api.thread_by_slug(&slug).await?);
            let t = &view.thread;
            println!("{}{}", badges(t), t.title);
            println!(
                "by {} in {}, {}",
                t.author.as_ref().map_or("Anonymous", |a| &a.username as &str),
                t.category.as_ref().map_or("?", |c| &c.name as &str),
                format_time_ago(t.created_at, now),
            );
            println!("{}\n", indented(&t.content, 0));
            for r in view.render(max_depth.unwrap_or(DEFAULT_MAX_DEPTH)) {
                let pad = "    ".repeat(r.indent);
                let mut markers = String::new();
                if r.is_op {
                    markers.push_str(" [OP]");
                }
                if r.post.is_accepted_answer {
                    markers.push_str(" [accepted answer]");
                }
                println!(
                    "{pad}{}{markers}, {} ({})",
                    r.post.author_name(),
                    format_time_ago(r.post.last_activity(), now),
                    r.post.document_id,
                );
                println!("{}", indented(&r.post.content, r.indent));
            }
            if view.replies.is_empty() {
                println!("No replies yet");
            }
            if !t.accepts_replies() {
                println!("This thread does not accept replies");
            }
        }
        Command::Reply {
            thread,
            body,
            parent,
        } => {
            let sess = Session::restore(&api, &store).await?;
            let replies = reply(&api, &sess, &thread, body, parent).await?;
            println!("Replied, the thread now has {replies} replies");
        }
        Command::NewThread {
            category,
            title,
            content,
            tags,
        } => {
            let sess = Session::restore(&api, &store).await?;
            let form = ThreadForm::new();
            form.set_title(title);
            form.set_content(content);
            let thread = new_thread(&api, &sess, form, &category, &tags, now).await?;
            println!("Created {}", thread.slug);
        }
        Command::Tags => {
            let mut tags = api.tags().await?;
            sort_tags(&mut tags);
            for t in tags {
                println!("#{} {} ({}, used {} times)", t.slug, t.name, t.color(), t.usage_count);
            }
        }
    }

    Ok(())
}
