use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::Weekday;
use tracing::debug;

use crate::config::SlotAdjustment;
use crate::models::{
    AdjustedEstimate, Confidence, RangeEstimate, SessionRecord, Slot, SlotEstimate, SlotForecast,
};

pub fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; zero below two observations.
pub fn sample_stdev(values: &[u32]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let squares: f64 = values
        .iter()
        .map(|v| (f64::from(*v) - avg).powi(2))
        .sum();
    (squares / (values.len() - 1) as f64).sqrt()
}

/// Mean ± one standard deviation, floored at zero.
pub fn estimate(values: &[u32]) -> Option<RangeEstimate> {
    if values.is_empty() {
        return None;
    }
    let mean = mean(values);
    let stdev = sample_stdev(values);
    Some(RangeEstimate {
        mean,
        stdev,
        low: (mean - stdev).max(0.0),
        high: mean + stdev,
        samples: values.len(),
    })
}

#[derive(Debug, Clone, Default)]
struct Series {
    registrations: Vec<u32>,
    seated: Vec<u32>,
    consultations: Vec<u32>,
}

impl Series {
    fn collect<'a>(sessions: impl IntoIterator<Item = &'a SessionRecord>) -> Self {
        let mut series = Series::default();
        for session in sessions {
            series.registrations.extend(session.registrations);
            series.seated.extend(session.seated);
            series.consultations.extend(session.consultations);
        }
        series
    }

    fn estimate(&self) -> Option<SlotEstimate> {
        let consultations = estimate(&self.consultations)?;
        Some(SlotEstimate {
            confidence: Confidence::from_samples(consultations.samples),
            consultations,
            registration_mean: mean(&self.registrations),
            seated_mean: mean(&self.seated),
        })
    }
}

fn adjusted_estimate(
    adjustment: &SlotAdjustment,
    sessions: &[&SessionRecord],
) -> Option<AdjustedEstimate> {
    let series = match &adjustment.replacement {
        Some(replacement) => Series {
            registrations: replacement.registrations.clone(),
            seated: replacement.seated.clone(),
            consultations: replacement.consultations.clone(),
        },
        None => Series::collect(
            sessions
                .iter()
                .copied()
                .filter(|session| !adjustment.excluded_dates.contains(&session.date)),
        ),
    };
    Some(AdjustedEstimate {
        estimate: series.estimate()?,
        note: adjustment.note.clone(),
    })
}

/// Forecast per (weekday, slot) bucket, highest expected consultations first.
pub fn forecast(sessions: &[SessionRecord], adjustments: &[SlotAdjustment]) -> Vec<SlotForecast> {
    let mut buckets: BTreeMap<(u32, Slot), (Weekday, Vec<&SessionRecord>)> = BTreeMap::new();
    for session in sessions {
        buckets
            .entry((session.weekday.num_days_from_monday(), session.slot))
            .or_insert_with(|| (session.weekday, Vec::new()))
            .1
            .push(session);
    }

    let mut forecasts: Vec<SlotForecast> = buckets
        .into_iter()
        .filter_map(|((_, slot), (weekday, members))| {
            let raw = Series::collect(members.iter().copied()).estimate()?;
            let adjusted = adjustments
                .iter()
                .find(|adjustment| adjustment.weekday == weekday && adjustment.slot == slot)
                .and_then(|adjustment| adjusted_estimate(adjustment, &members));
            debug!(
                weekday = %weekday,
                slot = slot.label(),
                samples = raw.consultations.samples,
                adjusted = adjusted.is_some(),
                "estimated slot"
            );
            Some(SlotForecast {
                weekday,
                slot,
                raw,
                adjusted,
            })
        })
        .collect();

    forecasts.sort_by(|a, b| {
        b.raw
            .consultations
            .mean
            .partial_cmp(&a.raw.consultations.mean)
            .unwrap_or(Ordering::Equal)
    });
    forecasts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SeriesOverride, SessionConfig};
    use chrono::NaiveDate;

    fn session(date: (i32, u32, u32), slot: Slot, reg: u32, seated: u32, indiv: u32) -> SessionRecord {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        SessionRecord {
            weekday: chrono::Datelike::weekday(&date),
            date,
            slot,
            registrations: Some(reg),
            seated: Some(seated),
            consultations: Some(indiv),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn four_observation_range() {
        let range = estimate(&[97, 88, 128, 93]).unwrap();
        assert!(close(range.mean, 101.5));
        assert!(close(range.stdev, 18.046));
        assert!(close(range.low, 83.454));
        assert!(close(range.high, 119.546));
        assert_eq!(Confidence::from_samples(range.samples), Confidence::Medium);
    }

    #[test]
    fn corrected_series_range() {
        let range = estimate(&[33, 21, 26]).unwrap();
        assert!(close(range.mean, 26.667));
        assert!(close(range.stdev, 6.028));
        assert!(close(range.low, 20.639));
        assert!(close(range.high, 32.694));
    }

    #[test]
    fn single_observation_collapses_to_point() {
        let range = estimate(&[12]).unwrap();
        assert_eq!(range.stdev, 0.0);
        assert_eq!(range.low, 12.0);
        assert_eq!(range.high, 12.0);
        assert!(estimate(&[]).is_none());
    }

    #[test]
    fn low_end_is_floored_at_zero() {
        let range = estimate(&[0, 0, 9]).unwrap();
        assert_eq!(range.low, 0.0);
    }

    #[test]
    fn confidence_tiers() {
        assert_eq!(Confidence::from_samples(9), Confidence::Highest);
        assert_eq!(Confidence::from_samples(7), Confidence::Highest);
        assert_eq!(Confidence::from_samples(6), Confidence::Medium);
        assert_eq!(Confidence::from_samples(4), Confidence::Medium);
        assert_eq!(Confidence::from_samples(3), Confidence::Low);
        assert_eq!(Confidence::from_samples(2), Confidence::Low);
        assert_eq!(Confidence::from_samples(1), Confidence::Lowest);
        assert_eq!(Confidence::Low.stars(), "★☆☆");
    }

    fn wednesday_sessions() -> Vec<SessionRecord> {
        vec![
            session((2025, 12, 17), Slot::Midday, 97, 69, 33),
            session((2026, 1, 14), Slot::Midday, 88, 56, 21),
            session((2026, 1, 28), Slot::Midday, 128, 88, 23),
            session((2026, 2, 4), Slot::Midday, 93, 63, 26),
            session((2026, 1, 31), Slot::Evening, 40, 30, 9),
            session((2026, 1, 30), Slot::Evening, 60, 45, 40),
        ]
    }

    #[test]
    fn buckets_ranked_by_mean() {
        let forecasts = forecast(&wednesday_sessions(), &[]);
        assert_eq!(forecasts.len(), 3);
        assert_eq!(forecasts[0].weekday, Weekday::Fri);
        assert_eq!(forecasts[1].weekday, Weekday::Wed);
        assert_eq!(forecasts[2].weekday, Weekday::Sat);

        let wednesday = &forecasts[1];
        assert_eq!(wednesday.slot, Slot::Midday);
        assert_eq!(wednesday.raw.consultations.samples, 4);
        assert!(close(wednesday.raw.consultations.mean, 25.75));
        assert!(close(wednesday.raw.registration_mean, 101.5));
        assert!(close(wednesday.raw.seated_mean, 69.0));
        assert!(wednesday.adjusted.is_none());
    }

    #[test]
    fn default_adjustment_uses_curated_series() {
        let config = SessionConfig::default();
        let forecasts = forecast(&wednesday_sessions(), &config.adjustments);
        let wednesday = forecasts
            .iter()
            .find(|f| f.weekday == Weekday::Wed)
            .unwrap();

        let adjusted = wednesday.adjusted.as_ref().unwrap();
        assert_eq!(adjusted.note, "1/28除外");
        assert!(close(adjusted.estimate.consultations.mean, 26.667));
        assert!(close(adjusted.estimate.registration_mean, 92.667));
        assert!(close(adjusted.estimate.seated_mean, 62.667));
        assert_eq!(adjusted.estimate.confidence, Confidence::Low);
        assert!(forecasts
            .iter()
            .filter(|f| f.weekday != Weekday::Wed)
            .all(|f| f.adjusted.is_none()));
    }

    #[test]
    fn exclusion_list_recomputes_from_sessions() {
        let adjustment = SlotAdjustment {
            weekday: Weekday::Wed,
            slot: Slot::Midday,
            excluded_dates: vec![NaiveDate::from_ymd_opt(2026, 1, 28).unwrap()],
            replacement: None,
            note: "outlier".to_string(),
        };
        let forecasts = forecast(&wednesday_sessions(), &[adjustment]);
        let adjusted = forecasts[1].adjusted.as_ref().unwrap();
        assert_eq!(adjusted.estimate.consultations.samples, 3);
        assert!(close(adjusted.estimate.consultations.mean, 80.0 / 3.0));
        assert!(close(adjusted.estimate.registration_mean, 278.0 / 3.0));
    }

    #[test]
    fn replacement_overrides_observations() {
        let adjustment = SlotAdjustment {
            weekday: Weekday::Sat,
            slot: Slot::Evening,
            excluded_dates: Vec::new(),
            replacement: Some(SeriesOverride {
                registrations: vec![50],
                seated: vec![35],
                consultations: vec![12, 14],
            }),
            note: "manual".to_string(),
        };
        let forecasts = forecast(&wednesday_sessions(), &[adjustment]);
        let saturday = forecasts.iter().find(|f| f.weekday == Weekday::Sat).unwrap();
        let adjusted = saturday.adjusted.as_ref().unwrap();
        assert!(close(adjusted.estimate.consultations.mean, 13.0));
        assert_eq!(adjusted.estimate.registration_mean, 50.0);
    }

    #[test]
    fn sessions_without_consultation_counts_are_ignored() {
        let mut sessions = wednesday_sessions();
        sessions.push(SessionRecord {
            consultations: None,
            ..session((2026, 2, 2), Slot::Evening, 10, 5, 0)
        });
        let forecasts = forecast(&sessions, &[]);
        assert!(forecasts.iter().all(|f| f.weekday != Weekday::Mon));
    }
}
