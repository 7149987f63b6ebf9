use chrono::{Duration, TimeZone, Utc};
use forum_client::api::{slugify, ThreadStatus, Time, Visibility};
use forum_mock_server::seed::{Seed, SeedCategory, SeedPost, SeedTag, SeedThread, SeedUser};
use rand::{seq::SliceRandom, Rng};

const NUM_USERS: usize = 8;

const NUM_TAGS: usize = 12;
const TAG_COLORS: [&str; 5] = ["#10B981", "#F59E0B", "#EF4444", "#3B82F6", "#8B5CF6"];

const NUM_CATEGORIES: usize = 5;
const MEMBERS_ONLY_ONE_IN: usize = 4;

const NUM_THREADS: usize = 60;
const MAX_TAGS_PER_THREAD: usize = 3;
const PINNED_ONE_IN: u32 = 15;
const LOCKED_ONE_IN: u32 = 20;
const MAX_VIEW_COUNT: u64 = 2_000;

const MAX_ROOT_POSTS: usize = 6;
const MAX_REPLIES: usize = 3;
const MAX_REPLY_DEPTH: usize = 4;
const POST_WORD_COUNT: usize = 40;

fn gen_title(rng: &mut impl Rng) -> String {
    let words = rng.gen_range(3..9);
    let title = lipsum::lipsum_words_from_seed(words, rng.gen());
    title.trim_end_matches('.').to_string()
}

fn gen_text(rng: &mut impl Rng) -> String {
    let words = rng.gen_range(5..POST_WORD_COUNT);
    lipsum::lipsum_from_seed(words, rng.gen())
}

fn one_in(rng: &mut impl Rng, n: u32) -> bool {
    rng.gen_ratio(1, n)
}

fn later(rng: &mut impl Rng, t: Time) -> Time {
    t + Duration::minutes(rng.gen_range(1..3 * 24 * 60))
}

/// Replies to a post, going at most `depth` levels further down
fn gen_replies(
    rng: &mut impl Rng,
    users: &[SeedUser],
    after: Time,
    depth: usize,
) -> Vec<SeedPost> {
    if depth == 0 {
        return Vec::new();
    }
    let n = rng.gen_range(0..=MAX_REPLIES);
    let mut created_at = after;
    (0..n)
        .map(|_| {
            created_at = later(rng, created_at);
            SeedPost {
                content: gen_text(rng),
                author: author(rng, users),
                created_at,
                is_accepted_answer: false,
                upvote_count: rng.gen_range(0..25),
                replies: gen_replies(rng, users, created_at, depth - 1),
            }
        })
        .collect()
}

fn author(rng: &mut impl Rng, users: &[SeedUser]) -> String {
    users
        .choose(rng)
        .map(|u| u.username.clone())
        .unwrap_or_default()
}

fn generate(rng: &mut impl Rng) -> Seed {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single().unwrap_or_else(Utc::now);

    // Generate users
    let users = (0..NUM_USERS)
        .map(|i| {
            let name = lipsum::lipsum_words_from_seed(1, rng.gen()).to_lowercase();
            let name = format!("{}_{i}", name.trim_matches(|c: char| !c.is_alphanumeric()));
            SeedUser {
                email: format!("{name}@research.example.org"),
                password: format!("{name}-password"),
                username: name,
            }
        })
        .collect::<Vec<_>>();

    // Generate tags, dropping duplicate names
    let mut tags: Vec<SeedTag> = Vec::new();
    while tags.len() < NUM_TAGS {
        let words = rng.gen_range(1..3);
        let name = lipsum::lipsum_words_from_seed(words, rng.gen());
        let name = name.trim_end_matches('.').to_string();
        if tags.iter().any(|t| slugify(&t.name) == slugify(&name)) {
            continue;
        }
        let color = match rng.gen_bool(0.7) {
            true => TAG_COLORS.choose(rng).map(|c| String::from(*c)),
            false => None,
        };
        tags.push(SeedTag {
            name,
            slug: None,
            color,
        });
    }

    // Generate categories
    let categories = (0..NUM_CATEGORIES)
        .map(|i| {
            let name = gen_title(rng);
            SeedCategory {
                slug: Some(format!("{}-{i}", slugify(&name))),
                description: Some(gen_text(rng)),
                icon: None,
                sort_order: i as i64,
                visibility: match i % MEMBERS_ONLY_ONE_IN == MEMBERS_ONLY_ONE_IN - 1 {
                    true => Visibility::MembersOnly,
                    false => Visibility::Public,
                },
                name,
            }
        })
        .collect::<Vec<_>>();

    // Generate threads, each with a reply tree
    let threads = (0..NUM_THREADS)
        .map(|i| {
            let title = gen_title(rng);
            let created_at = start + Duration::hours(rng.gen_range(0..24 * 180));
            let num_tags = rng.gen_range(0..=MAX_TAGS_PER_THREAD);
            let mut thread_tags = tags
                .choose_multiple(rng, num_tags)
                .map(|t| slugify(&t.name))
                .collect::<Vec<_>>();
            thread_tags.sort();
            let mut posts = Vec::new();
            let mut at = created_at;
            let num_posts = rng.gen_range(0..=MAX_ROOT_POSTS);
            for _ in 0..num_posts {
                at = later(rng, at);
                posts.push(SeedPost {
                    content: gen_text(rng),
                    author: author(rng, &users),
                    created_at: at,
                    is_accepted_answer: false,
                    upvote_count: rng.gen_range(0..50),
                    replies: gen_replies(rng, &users, at, MAX_REPLY_DEPTH - 1),
                });
            }
            if let Some(answer) = posts.choose_mut(rng) {
                answer.is_accepted_answer = rng.gen_bool(0.3);
            }
            SeedThread {
                slug: Some(format!("{}-{i}", slugify(&title))),
                title,
                content: gen_text(rng),
                status: match one_in(rng, LOCKED_ONE_IN) {
                    true => ThreadStatus::Closed,
                    false => ThreadStatus::Open,
                },
                is_pinned: one_in(rng, PINNED_ONE_IN),
                is_locked: one_in(rng, LOCKED_ONE_IN),
                view_count: rng.gen_range(0..MAX_VIEW_COUNT),
                category: categories
                    .choose(rng)
                    .and_then(|c| c.slug.clone())
                    .unwrap_or_default(),
                tags: thread_tags,
                author: author(rng, &users),
                created_at,
                posts,
            }
        })
        .collect::<Vec<_>>();

    Seed {
        users,
        tags,
        categories,
        threads,
    }
}

fn main() -> anyhow::Result<()> {
    let seed = generate(&mut rand::thread_rng());
    println!("{}", serde_json::to_string_pretty(&seed)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use forum_mock_server::MockServer;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn generated_data_loads() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let seed = generate(&mut rng);
        let posts = seed.threads.iter().map(|t| count(&t.posts)).sum::<usize>();
        let json = serde_json::to_string(&seed).unwrap();
        let server = MockServer::from_seed(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(server.test_counts(), (NUM_USERS, NUM_THREADS, posts));

        fn count(posts: &[SeedPost]) -> usize {
            posts.iter().map(|p| 1 + count(&p.replies)).sum()
        }
    }
}
