use std::collections::BTreeMap;

use time::{Date, Duration, OffsetDateTime};

use super::repo_types::Session;

/// Session length in whole minutes, truncated.
pub fn whole_minutes(check_in: OffsetDateTime, check_out: OffsetDateTime) -> i64 {
    (check_out - check_in).whole_minutes()
}

/// Renders time spent inside as "2h 5m".
pub fn elapsed_label(elapsed: Duration) -> String {
    let minutes = elapsed.whole_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregates over a set of sessions in a window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub total_visits: usize,
    pub completed: usize,
    pub total_minutes: i64,
    pub daily_visits: BTreeMap<Date, i64>,
    /// Visits per weekday name ("Monday", ...).
    pub weekday_visits: BTreeMap<String, i64>,
}

impl SessionSummary {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut summary = SessionSummary {
            total_visits: sessions.len(),
            ..Default::default()
        };
        for s in sessions {
            if let Some(out) = s.check_out {
                summary.completed += 1;
                summary.total_minutes += whole_minutes(s.check_in, out);
            }
            *summary.daily_visits.entry(s.check_in.date()).or_default() += 1;
            *summary
                .weekday_visits
                .entry(s.check_in.weekday().to_string())
                .or_default() += 1;
        }
        summary
    }

    pub fn average_minutes(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.total_minutes as f64 / self.completed as f64
    }

    pub fn total_hours(&self) -> f64 {
        self.total_minutes as f64 / 60.0
    }

    /// Busiest day; the earliest wins a tie.
    pub fn most_active_day(&self) -> Option<(Date, i64)> {
        self.daily_visits
            .iter()
            .fold(None, |best: Option<(Date, i64)>, (&day, &visits)| match best {
                Some((_, top)) if top >= visits => best,
                _ => Some((day, visits)),
            })
    }

    pub fn unique_days(&self) -> i64 {
        self.daily_visits.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn minutes_truncate() {
        let minutes = whole_minutes(datetime!(2024-01-01 9:00:00 UTC), datetime!(2024-01-01 10:30:45 UTC));
        assert_eq!(minutes, 90);
        let minutes = whole_minutes(datetime!(2024-01-01 9:00:00 UTC), datetime!(2024-01-01 9:00:59 UTC));
        assert_eq!(minutes, 0);
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(elapsed_label(Duration::minutes(125)), "2h 5m");
        assert_eq!(elapsed_label(Duration::seconds(59)), "0h 0m");
        assert_eq!(elapsed_label(Duration::minutes(-3)), "0h 0m");
    }

    #[test]
    fn summary_counts_only_closed_sessions_for_time() {
        let sessions = [
            Session {
                check_in: datetime!(2024-01-01 9:00 UTC),
                check_out: Some(datetime!(2024-01-01 10:00 UTC)),
            },
            Session {
                check_in: datetime!(2024-01-01 18:00 UTC),
                check_out: Some(datetime!(2024-01-01 18:30 UTC)),
            },
            Session {
                check_in: datetime!(2024-01-03 7:00 UTC),
                check_out: None,
            },
        ];
        let summary = SessionSummary::from_sessions(&sessions);
        assert_eq!(summary.total_visits, 3);
        assert_eq!(summary.total_minutes, 90);
        assert_eq!(summary.average_minutes(), 45.0);
        assert_eq!(summary.unique_days(), 2);
        assert_eq!(summary.most_active_day(), Some((date!(2024 - 01 - 01), 2)));
        assert_eq!(summary.weekday_visits.get("Monday"), Some(&2));
        assert_eq!(summary.weekday_visits.get("Wednesday"), Some(&1));
    }

    #[test]
    fn empty_summary() {
        let summary = SessionSummary::from_sessions(&[]);
        assert_eq!(summary.average_minutes(), 0.0);
        assert_eq!(summary.most_active_day(), None);
    }

    #[test]
    fn rounding() {
        assert_eq!(round1(1.25), 1.3);
        assert_eq!(round1(2.0 / 3.0), 0.7);
    }
}
