use crate::api::Time;

/// Short relative timestamp, eg. `5m ago`, falling back to the date after a week
pub fn format_time_ago(then: Time, now: Time) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes().max(0);
    if minutes < 60 {
        format!("{minutes}m ago")
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        then.format("%b %-d, %Y").to_string()
    }
}
