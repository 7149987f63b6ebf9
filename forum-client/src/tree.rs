use std::collections::{hash_map, HashMap};

use crate::api::{DocumentId, Post, PostId, Ref, Thread, ThreadId};

/// Indentation stops growing past this depth; replies stay possible
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Replies of one thread, nested under their parents
///
/// Every post has `child_posts` populated (leaves with an empty list), and each
/// level is ordered by creation time, ties keeping the order the posts were
/// received in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReplyTree {
    roots: Vec<Post>,
}

struct Entry {
    post: Option<Post>,
    parent: Option<Ref<PostId>>,
    /// `parent` came from the post's own reference, not from where it was nested
    explicit: bool,
    children: Vec<usize>,
}

impl ReplyTree {
    /// Builds the tree from posts that are flat, already nested, or a mix
    ///
    /// Posts that cannot be attached (unknown parent, parent in another
    /// thread, parent cycle) become roots rather than being dropped.
    pub fn build(posts: Vec<Post>) -> ReplyTree {
        let mut entries = Vec::new();
        let mut by_id = HashMap::new();
        flatten(posts, None, &mut entries, &mut by_id);
        let by_doc = entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.post.as_ref().map(|p| (p.document_id.clone(), i)))
            .collect::<HashMap<DocumentId, usize>>();

        let mut roots = Vec::new();
        for i in 0..entries.len() {
            match resolve_parent(&entries, &by_id, &by_doc, i) {
                Some(parent) => entries[parent].children.push(i),
                None => roots.push(i),
            }
        }
        let created = entries
            .iter()
            .map(|e| e.post.as_ref().map(|p| p.created_at))
            .collect::<Vec<_>>();
        for e in entries.iter_mut() {
            e.children.sort_by_key(|&c| created[c]);
        }

        let mut placed = Vec::with_capacity(roots.len());
        for r in roots {
            if let Some(p) = assemble(&mut entries, r) {
                placed.push((r, p));
            }
        }
        // Whatever is left hangs off a parent cycle
        for i in 0..entries.len() {
            if let Some(p) = assemble(&mut entries, i) {
                tracing::warn!(
                    post = %p.id,
                    "post is part of a parent cycle, showing as top-level reply"
                );
                placed.push((i, p));
            }
        }
        placed.sort_by_key(|(i, p)| (p.created_at, *i));
        ReplyTree {
            roots: placed.into_iter().map(|(_, p)| p).collect(),
        }
    }

    pub fn roots(&self) -> &[Post] {
        &self.roots
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.roots
    }

    /// Total number of posts in the tree
    pub fn len(&self) -> usize {
        fn count(posts: &[Post]) -> usize {
            posts
                .iter()
                .map(|p| 1 + count(p.child_posts.as_deref().unwrap_or(&[])))
                .sum()
        }
        count(&self.roots)
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, document_id: &DocumentId) -> Option<&Post> {
        fn find_in<'a>(posts: &'a [Post], document_id: &DocumentId) -> Option<&'a Post> {
            for p in posts {
                if p.document_id == *document_id {
                    return Some(p);
                }
                if let Some(res) = find_in(p.child_posts.as_deref().unwrap_or(&[]), document_id)
                {
                    return Some(res);
                }
            }
            None
        }
        find_in(&self.roots, document_id)
    }

    /// Depth-first walk, in display order
    ///
    /// `thread`, if given, marks its author's posts and disables replies when
    /// it is locked.
    pub fn render<'a>(
        &'a self,
        thread: Option<&Thread>,
        max_depth: usize,
    ) -> Vec<RenderedPost<'a>> {
        let can_reply = thread.map_or(true, |t| !t.is_locked);
        let op = thread.and_then(|t| t.author.as_ref()).map(|a| a.id);
        let mut res = Vec::with_capacity(self.len());
        let mut stack = self.roots.iter().rev().map(|p| (p, 0)).collect::<Vec<_>>();
        while let Some((post, depth)) = stack.pop() {
            res.push(RenderedPost {
                post,
                depth,
                indent: depth.min(max_depth),
                can_reply,
                is_op: op.is_some() && post.author.as_ref().map(|a| a.id) == op,
            });
            for c in post.child_posts.iter().flatten().rev() {
                stack.push((c, depth + 1));
            }
        }
        res
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RenderedPost<'a> {
    pub post: &'a Post,
    pub depth: usize,
    /// `depth`, clamped to the maximum indentation level
    pub indent: usize,
    pub can_reply: bool,
    /// Written by the author of the thread
    pub is_op: bool,
}

/// A thread together with its reply tree
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadView {
    pub thread: Thread,
    pub replies: ReplyTree,
}

impl ThreadView {
    /// Takes the thread's populated posts (if any) and nests them
    pub fn new(mut thread: Thread) -> ThreadView {
        let replies = ReplyTree::build(thread.posts.take().unwrap_or_default());
        ThreadView { thread, replies }
    }

    pub fn with_replies(thread: Thread, replies: ReplyTree) -> ThreadView {
        ThreadView { thread, replies }
    }

    pub fn render(&self, max_depth: usize) -> Vec<RenderedPost<'_>> {
        self.replies.render(Some(&self.thread), max_depth)
    }
}

/// Pulls nested posts out, remembering which post they were nested in
fn flatten(
    posts: Vec<Post>,
    enclosing: Option<&Ref<PostId>>,
    entries: &mut Vec<Entry>,
    by_id: &mut HashMap<PostId, usize>,
) {
    for mut post in posts {
        let children = post.child_posts.take().unwrap_or_default();
        let explicit = post.parent_post.is_some();
        let parent = post
            .parent_post
            .clone()
            .or_else(|| enclosing.cloned());
        let idx = match by_id.entry(post.id) {
            hash_map::Entry::Occupied(o) => {
                // seen before, eg. once flat and once nested
                let e = &mut entries[*o.get()];
                if e.parent.is_none() || (explicit && !e.explicit) {
                    if let Some(seen) = e.post.as_mut() {
                        seen.parent_post = post.parent_post.clone();
                    }
                    e.parent = parent;
                    e.explicit = explicit;
                }
                *o.get()
            }
            hash_map::Entry::Vacant(v) => {
                v.insert(entries.len());
                entries.push(Entry {
                    post: Some(post),
                    parent,
                    explicit,
                    children: Vec::new(),
                });
                entries.len() - 1
            }
        };
        if !children.is_empty() {
            let this = entries[idx]
                .post
                .as_ref()
                .map(|p| Ref::to(p.id, p.document_id.clone()));
            flatten(children, this.as_ref(), entries, by_id);
        }
    }
}

fn resolve_parent(
    entries: &[Entry],
    by_id: &HashMap<PostId, usize>,
    by_doc: &HashMap<DocumentId, usize>,
    i: usize,
) -> Option<usize> {
    let parent = entries[i].parent.as_ref()?;
    let post = entries[i].post.as_ref()?;
    let found = parent
        .id
        .and_then(|id| by_id.get(&id))
        .or_else(|| parent.document_id.as_ref().and_then(|d| by_doc.get(d)))
        .copied();
    let Some(p) = found else {
        tracing::warn!(
            post = %post.id,
            "parent post is not part of the thread, showing as top-level reply"
        );
        return None;
    };
    if p == i {
        tracing::warn!(post = %post.id, "post is its own parent, showing as top-level reply");
        return None;
    }
    let parent_thread = entries[p].post.as_ref().and_then(|pp| pp.thread.as_ref());
    if let (Some(a), Some(b)) = (post.thread.as_ref(), parent_thread) {
        if !same_thread(a, b) {
            tracing::warn!(
                post = %post.id,
                "parent post belongs to another thread, showing as top-level reply"
            );
            return None;
        }
    }
    Some(p)
}

/// Unknown when neither identifier can be compared, which counts as the same
fn same_thread(a: &Ref<ThreadId>, b: &Ref<ThreadId>) -> bool {
    match (&a.id, &b.id, &a.document_id, &b.document_id) {
        (Some(x), Some(y), _, _) => x == y,
        (_, _, Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Moves post `i` and everything below it out of `entries`
///
/// Returns `None` if the post was already placed elsewhere.
fn assemble(entries: &mut [Entry], i: usize) -> Option<Post> {
    let mut post = entries[i].post.take()?;
    let children = std::mem::take(&mut entries[i].children);
    post.child_posts = Some(
        children
            .into_iter()
            .filter_map(|c| assemble(entries, c))
            .collect(),
    );
    Some(post)
}
