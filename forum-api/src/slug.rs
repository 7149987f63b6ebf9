use crate::Time;

pub const SLUG_MAX_LEN: usize = 100;

/// Lowercases `text` and collapses every run of non-alphanumeric characters
/// into a single `-`, with no leading or trailing dash
pub fn slugify(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !res.is_empty() {
                res.push('-');
            }
            pending_dash = false;
            res.push(c);
        } else {
            pending_dash = true;
        }
    }
    // all chars are ascii here, so byte truncation is char truncation
    res.truncate(SLUG_MAX_LEN);
    while res.ends_with('-') {
        res.pop();
    }
    res
}

/// Slug for a new thread, made unique by its creation time
pub fn thread_slug(title: &str, now: Time) -> String {
    let base = slugify(title);
    match base.is_empty() {
        true => format!("thread-{}", now.timestamp_millis()),
        false => format!("{}-{}", base, now.timestamp_millis()),
    }
}
