#![allow(dead_code)]

use chrono::{DateTime, Utc};

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Clock-skew tolerance for feed timestamps (spec §4.1): reject entries more
/// than 14 days old or dated more than 2h in the future.
pub(crate) fn is_plausible_published_at(published_at: DateTime<Utc>, reference: DateTime<Utc>) -> bool {
    let max_age = chrono::Duration::days(14);
    let max_future_skew = chrono::Duration::hours(2);
    published_at >= reference - max_age && published_at <= reference + max_future_skew
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_entries_older_than_14_days() {
        let now = Utc::now();
        assert!(!is_plausible_published_at(now - Duration::days(15), now));
        assert!(is_plausible_published_at(now - Duration::days(13), now));
    }

    #[test]
    fn rejects_entries_more_than_two_hours_in_the_future() {
        let now = Utc::now();
        assert!(!is_plausible_published_at(now + Duration::hours(3), now));
        assert!(is_plausible_published_at(now + Duration::hours(1), now));
    }
}
