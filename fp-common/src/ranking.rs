//! Engagement score and feed ordering
//!
//! Pure functions only: the server ranks with them on every feed fetch and
//! the client re-orders a fetched feed with the same comparators.

use std::cmp::Ordering;

use crate::models::{FeedOrdering, FeedTrack};

/// Weight of a like in the engagement score
pub const LIKE_WEIGHT: f64 = 0.6;

/// Weight of a (non-author) play in the engagement score
pub const PLAY_WEIGHT: f64 = 0.4;

/// `score = 0.6 * likes + 0.4 * plays`
///
/// Author plays are never passed in here; they are excluded from the public
/// play signal.
pub fn engagement_score(like_count: i64, play_count: i64) -> f64 {
    LIKE_WEIGHT * like_count as f64 + PLAY_WEIGHT * play_count as f64
}

/// Case-insensitive title ascending, then creation time ascending, then id
pub fn compare_alphabetical(a: &FeedTrack, b: &FeedTrack) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Score descending, then creation time descending, then id
pub fn compare_engagement(a: &FeedTrack, b: &FeedTrack) -> Ordering {
    let score_a = engagement_score(a.likes, a.play_count);
    let score_b = engagement_score(b.likes, b.play_count);
    score_b
        .total_cmp(&score_a)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a feed in place under the given ordering
pub fn sort_feed(tracks: &mut [FeedTrack], ordering: FeedOrdering) {
    match ordering {
        FeedOrdering::Alphabetical => tracks.sort_by(compare_alphabetical),
        FeedOrdering::Engagement => tracks.sort_by(compare_engagement),
    }
}

/// Case-insensitive substring match on title or username
///
/// A blank query matches every track.
pub fn matches_query(track: &FeedTrack, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty()
        || track.title.to_lowercase().contains(&needle)
        || track.username.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn track(title: &str, likes: i64, plays: i64, created_at: i64) -> FeedTrack {
        FeedTrack {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            audio_url: format!("/media/{}.mp3", title),
            image_url: format!("/media/{}.jpg", title),
            video_url: None,
            username: "owner".to_string(),
            user_uuid: Uuid::nil(),
            created_at,
            likes,
            play_count: plays,
            author_play_count: 0,
            liked_by_user: false,
            score: engagement_score(likes, plays),
        }
    }

    fn titles(tracks: &[FeedTrack]) -> Vec<&str> {
        tracks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_matches_query_title_or_username() {
        let t = track("Night Drive", 0, 0, 1);
        assert!(matches_query(&t, "night"));
        assert!(matches_query(&t, "DRIVE"));
        assert!(matches_query(&t, "own"));
        assert!(matches_query(&t, "   "));
        assert!(!matches_query(&t, "morning"));
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(engagement_score(0, 0), 0.0);
        assert!((engagement_score(10, 0) - 6.0).abs() < 1e-9);
        assert!((engagement_score(0, 20) - 8.0).abs() < 1e-9);
        assert!((engagement_score(3, 7) - 4.6).abs() < 1e-9);
    }

    #[test]
    fn test_engagement_scenario_b_before_a() {
        let mut feed = vec![track("A", 10, 0, 1), track("B", 0, 20, 2)];
        sort_feed(&mut feed, FeedOrdering::Engagement);
        assert_eq!(titles(&feed), vec!["B", "A"]);
    }

    #[test]
    fn test_engagement_ties_newest_first() {
        let mut feed = vec![
            track("old", 5, 0, 100),
            track("new", 5, 0, 300),
            track("mid", 5, 0, 200),
        ];
        sort_feed(&mut feed, FeedOrdering::Engagement);
        assert_eq!(titles(&feed), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_engagement_ignores_author_plays() {
        let mut author_heavy = track("author", 0, 0, 1);
        author_heavy.author_play_count = 1_000;
        let mut feed = vec![author_heavy, track("public", 0, 1, 1)];
        sort_feed(&mut feed, FeedOrdering::Engagement);
        assert_eq!(titles(&feed), vec!["public", "author"]);
    }

    #[test]
    fn test_alphabetical_case_insensitive() {
        let mut feed = vec![
            track("banana", 0, 0, 1),
            track("Apple", 0, 0, 2),
            track("cherry", 0, 0, 3),
        ];
        sort_feed(&mut feed, FeedOrdering::Alphabetical);
        assert_eq!(titles(&feed), vec!["Apple", "banana", "cherry"]);
    }

    #[test]
    fn test_alphabetical_ties_oldest_first() {
        let mut feed = vec![
            track("Echo", 0, 0, 30),
            track("echo", 0, 0, 10),
            track("ECHO", 0, 0, 20),
        ];
        sort_feed(&mut feed, FeedOrdering::Alphabetical);
        let created: Vec<i64> = feed.iter().map(|t| t.created_at).collect();
        assert_eq!(created, vec![10, 20, 30]);
    }

    #[test]
    fn test_ordering_is_independent_of_input_order() {
        let base = vec![
            track("x", 1, 1, 5),
            track("y", 1, 1, 5),
            track("z", 2, 0, 5),
            track("w", 0, 3, 9),
        ];
        let mut forward = base.clone();
        let mut reversed: Vec<FeedTrack> = base.into_iter().rev().collect();
        sort_feed(&mut forward, FeedOrdering::Engagement);
        sort_feed(&mut reversed, FeedOrdering::Engagement);
        let ids_f: Vec<_> = forward.iter().map(|t| t.id).collect();
        let ids_r: Vec<_> = reversed.iter().map(|t| t.id).collect();
        assert_eq!(ids_f, ids_r);
    }
}
