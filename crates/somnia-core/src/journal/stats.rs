//! Journal statistics, derived from the visible collection on demand.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{JournalEntry, Mood};
use crate::sleep::{SleepQuality, STREAK_SCAN_DAYS};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub total_dreams: usize,
    /// Consecutive days, ending today, with at least one entry.
    pub sleep_streak: u32,
    /// Entries as a percentage of the baseline period. Can exceed 100.
    pub recall_rate: u32,
    pub avg_sleep_quality: f64,
    pub quality_distribution: BTreeMap<SleepQuality, usize>,
    pub mood_distribution: BTreeMap<Mood, usize>,
}

/// Ordinal used for the quality average. `Great` has no slot of its own
/// and counts as the midpoint.
fn quality_score(quality: SleepQuality) -> f64 {
    match quality {
        SleepQuality::Excellent => 5.0,
        SleepQuality::Good => 4.0,
        SleepQuality::Fair => 3.0,
        SleepQuality::Poor => 2.0,
        _ => 3.0,
    }
}

pub fn compute_journal_stats(
    entries: &[JournalEntry],
    now: DateTime<Utc>,
    baseline_days: u32,
) -> JournalStats {
    let total_dreams = entries.len();
    if total_dreams == 0 {
        return JournalStats::default();
    }

    let days: BTreeSet<NaiveDate> = entries.iter().map(|e| e.created_at.date_naive()).collect();
    let today = now.date_naive();
    let mut sleep_streak = 0;
    for offset in 0..STREAK_SCAN_DAYS {
        if !days.contains(&(today - Duration::days(offset))) {
            break;
        }
        sleep_streak += 1;
    }

    let baseline = f64::from(baseline_days.max(1));
    let recall_rate = (total_dreams as f64 / baseline * 100.0).round() as u32;

    let score: f64 = entries.iter().map(|e| quality_score(e.sleep_quality)).sum();
    let avg_sleep_quality = (score / total_dreams as f64 * 10.0).round() / 10.0;

    let mut quality_distribution = BTreeMap::new();
    let mut mood_distribution = BTreeMap::new();
    for entry in entries {
        *quality_distribution.entry(entry.sleep_quality).or_insert(0) += 1;
        *mood_distribution.entry(entry.mood).or_insert(0) += 1;
    }

    JournalStats {
        total_dreams,
        sleep_streak,
        recall_rate,
        avg_sleep_quality,
        quality_distribution,
        mood_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::entry::EntryDraft;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn entry(days_ago: i64, mood: Mood, quality: SleepQuality) -> JournalEntry {
        let draft = EntryDraft::new("t", "d", mood, quality);
        JournalEntry::from_draft(
            days_ago.to_string(),
            &draft,
            now() - Duration::days(days_ago),
        )
    }

    #[test]
    fn empty_collection() {
        let stats = compute_journal_stats(&[], now(), 30);
        assert_eq!(stats, JournalStats::default());
    }

    #[test]
    fn streak_stops_at_first_gap() {
        let entries = vec![
            entry(0, Mood::Happy, SleepQuality::Good),
            entry(1, Mood::Happy, SleepQuality::Good),
            entry(1, Mood::Sad, SleepQuality::Poor),
            entry(3, Mood::Happy, SleepQuality::Good),
        ];
        assert_eq!(compute_journal_stats(&entries, now(), 30).sleep_streak, 2);
    }

    #[test]
    fn recall_rate_is_share_of_baseline() {
        let entries: Vec<_> = (0..9).map(|d| entry(d, Mood::Neutral, SleepQuality::Fair)).collect();
        assert_eq!(compute_journal_stats(&entries, now(), 30).recall_rate, 30);
    }

    #[test]
    fn quality_average_and_distributions() {
        let entries = vec![
            entry(0, Mood::Happy, SleepQuality::Excellent),
            entry(0, Mood::Happy, SleepQuality::Poor),
            entry(0, Mood::Scared, SleepQuality::Great),
        ];
        let stats = compute_journal_stats(&entries, now(), 30);

        // (5 + 2 + 3) / 3
        assert_eq!(stats.avg_sleep_quality, 3.3);
        assert_eq!(stats.mood_distribution[&Mood::Happy], 2);
        assert_eq!(stats.mood_distribution[&Mood::Scared], 1);
        assert_eq!(stats.quality_distribution.len(), 3);
    }

    #[test]
    fn distributions_serialize_with_readable_keys() {
        let entries = vec![entry(0, Mood::Happy, SleepQuality::Good)];
        let json = serde_json::to_value(compute_journal_stats(&entries, now(), 30)).unwrap();
        assert_eq!(json["moodDistribution"]["😊"], 1);
        assert_eq!(json["qualityDistribution"]["Good"], 1);
    }
}
