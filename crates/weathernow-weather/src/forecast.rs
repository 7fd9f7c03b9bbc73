//! Forecast aggregation: three-hour samples into daily and hourly views.
//!
//! Both functions are pure. They take the `list[]` of a forecast payload in
//! ascending timestamp order and never fail; empty input gives empty output.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};

use crate::types::{ConditionCategory, DailySummary, HourlySample, RawSample};

/// Most day groups returned by [`to_daily_summaries`]
pub const MAX_DAYS: usize = 7;

/// Default length of the hourly strip (8 × 3 h = next 24 hours)
pub const DEFAULT_HOURLY_COUNT: usize = 8;

/// Round half up, so -2.5 becomes -2 and 2.5 becomes 3.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percent(pop: Option<f64>) -> u8 {
    let pct = round_half_up(pop.unwrap_or(0.0) * 100.0);
    pct.clamp(0.0, 100.0) as u8
}

/// Most frequent category in `samples`.
///
/// Ties go to the category whose first occurrence comes earliest in
/// timestamp order: candidates are kept in first-seen order and only a
/// strictly higher count replaces the current leader.
///
/// Labels that map to no known category all count as one `Unknown` bucket.
pub fn dominant_condition(samples: &[&RawSample]) -> Option<ConditionCategory> {
    let mut counts: Vec<(ConditionCategory, usize)> = Vec::new();
    for sample in samples {
        match counts.iter_mut().find(|(c, _)| *c == sample.condition) {
            Some((_, n)) => *n += 1,
            None => counts.push((sample.condition, 1)),
        }
    }

    let mut leader: Option<(ConditionCategory, usize)> = None;
    for (condition, count) in counts {
        match leader {
            Some((_, best)) if count <= best => {}
            _ => leader = Some((condition, count)),
        }
    }
    leader.map(|(condition, _)| condition)
}

/// Group samples by UTC calendar date and reduce each day to a summary.
///
/// Returns at most [`MAX_DAYS`] summaries in chronological order; fewer
/// days of input give fewer summaries.
pub fn to_daily_summaries(samples: &[RawSample]) -> Vec<DailySummary> {
    let mut days: BTreeMap<NaiveDate, Vec<&RawSample>> = BTreeMap::new();
    for sample in samples {
        match sample.date_utc() {
            Some(date) => days.entry(date).or_default().push(sample),
            None => tracing::warn!(
                "Skipping sample with out-of-range timestamp {}",
                sample.timestamp
            ),
        }
    }

    days.into_iter()
        .take(MAX_DAYS)
        .filter_map(|(date, group)| summarize_day(date, &group))
        .collect()
}

fn summarize_day(date: NaiveDate, group: &[&RawSample]) -> Option<DailySummary> {
    let first = group.first()?;
    let condition = dominant_condition(group)?;
    let representative = group
        .iter()
        .find(|s| s.condition == condition)
        .unwrap_or(first);

    let temp_min = group
        .iter()
        .map(|s| s.temperature)
        .fold(f64::INFINITY, f64::min);
    let temp_max = group
        .iter()
        .map(|s| s.temperature)
        .fold(f64::NEG_INFINITY, f64::max);
    let precipitation = group
        .iter()
        .map(|s| percent(s.pop))
        .max()
        .unwrap_or(0);

    Some(DailySummary {
        date,
        timestamp: first.timestamp,
        temp_min,
        temp_max,
        temp_avg: round_half_up(mean(group.iter().map(|s| s.temperature))) as i64,
        condition,
        description: representative.description.clone(),
        condition_code: representative.condition_code,
        icon: representative.icon.clone(),
        humidity_avg: round_half_up(mean(group.iter().map(|s| f64::from(s.humidity)))) as i64,
        wind_avg: round_half_up(mean(group.iter().map(|s| s.wind_speed))) as i64,
        precipitation_chance: precipitation,
    })
}

/// The first `count` samples, with rounded temperatures and percentage
/// precipitation. No grouping.
pub fn to_hourly_samples(samples: &[RawSample], count: usize) -> Vec<HourlySample> {
    samples
        .iter()
        .take(count)
        .filter_map(|s| {
            let time = DateTime::from_timestamp(s.timestamp, 0)?;
            Some(HourlySample {
                timestamp: s.timestamp,
                time,
                temperature: s.temperature,
                temp: round_half_up(s.temperature) as i64,
                feels_like: round_half_up(s.feels_like) as i64,
                humidity: s.humidity,
                pressure: s.pressure,
                wind_speed: s.wind_speed,
                wind_deg: s.wind_deg,
                cloud_cover: s.cloud_cover,
                condition: s.condition,
                condition_code: s.condition_code,
                description: s.description.clone(),
                icon: s.icon.clone(),
                precipitation_chance: percent(s.pop),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-01T00:00:00Z
    const DAY0: i64 = 1_709_251_200;
    const STEP: i64 = 3 * 3600;
    const DAY: i64 = 24 * 3600;

    fn sample(timestamp: i64, temperature: f64, condition: ConditionCategory) -> RawSample {
        RawSample {
            timestamp,
            temperature,
            feels_like: temperature - 1.0,
            humidity: 60,
            pressure: 1013.0,
            wind_speed: 3.0,
            wind_deg: 180.0,
            cloud_cover: 40,
            condition,
            condition_code: 800,
            description: format!("{} at {}", condition, timestamp),
            icon: "01d".to_string(),
            pop: None,
        }
    }

    fn day_of(start: i64, temps: &[f64]) -> Vec<RawSample> {
        temps
            .iter()
            .enumerate()
            .map(|(i, t)| sample(start + i as i64 * STEP, *t, ConditionCategory::Clear))
            .collect()
    }

    #[test]
    fn test_single_day_statistics() {
        let samples = day_of(DAY0, &[10.0, 12.0, 15.0, 14.0, 13.0, 11.0, 9.0, 8.0]);
        let days = to_daily_summaries(&samples);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].temp_min, 8.0);
        assert_eq!(days[0].temp_max, 15.0);
        // mean = 11.5, half rounds up
        assert_eq!(days[0].temp_avg, 12);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default());
        assert_eq!(days[0].timestamp, DAY0);
    }

    #[test]
    fn test_humidity_and_wind_averages() {
        let mut samples = day_of(DAY0, &[10.0, 10.0, 10.0]);
        samples[0].humidity = 50;
        samples[1].humidity = 55;
        samples[2].humidity = 61;
        samples[0].wind_speed = 1.0;
        samples[1].wind_speed = 2.0;
        samples[2].wind_speed = 4.5;

        let day = &to_daily_summaries(&samples)[0];
        assert_eq!(day.humidity_avg, 55);
        assert_eq!(day.wind_avg, 3);
    }

    #[test]
    fn test_tie_break_prefers_first_seen() {
        let samples: Vec<RawSample> = (0..8)
            .map(|i| {
                let c = if i % 2 == 0 {
                    ConditionCategory::Clouds
                } else {
                    ConditionCategory::Rain
                };
                sample(DAY0 + i * STEP, 10.0, c)
            })
            .collect();

        let day = &to_daily_summaries(&samples)[0];
        assert_eq!(day.condition, ConditionCategory::Clouds);
        assert_eq!(day.description, samples[0].description);
    }

    #[test]
    fn test_tie_break_other_order() {
        let samples: Vec<RawSample> = (0..4)
            .map(|i| {
                let c = if i % 2 == 0 {
                    ConditionCategory::Rain
                } else {
                    ConditionCategory::Clouds
                };
                sample(DAY0 + i * STEP, 10.0, c)
            })
            .collect();

        assert_eq!(to_daily_summaries(&samples)[0].condition, ConditionCategory::Rain);
    }

    #[test]
    fn test_majority_beats_first_seen() {
        let samples = vec![
            sample(DAY0, 10.0, ConditionCategory::Clear),
            sample(DAY0 + STEP, 10.0, ConditionCategory::Snow),
            sample(DAY0 + 2 * STEP, 10.0, ConditionCategory::Snow),
        ];
        let day = &to_daily_summaries(&samples)[0];
        assert_eq!(day.condition, ConditionCategory::Snow);
        // Representative detail comes from the first Snow sample
        assert_eq!(day.description, samples[1].description);
    }

    #[test]
    fn test_precipitation_is_daily_max() {
        let mut samples = day_of(DAY0, &[10.0, 10.0, 10.0, 10.0]);
        samples[0].pop = Some(0.1);
        samples[1].pop = Some(0.84);
        samples[2].pop = None;
        samples[3].pop = Some(0.3);

        assert_eq!(to_daily_summaries(&samples)[0].precipitation_chance, 84);
    }

    #[test]
    fn test_no_pop_means_zero_precipitation() {
        let samples = day_of(DAY0, &[10.0, 11.0]);
        assert_eq!(to_daily_summaries(&samples)[0].precipitation_chance, 0);
    }

    #[test]
    fn test_truncates_to_seven_days() {
        let samples: Vec<RawSample> = (0..10)
            .flat_map(|d| day_of(DAY0 + d * DAY, &[d as f64, d as f64 + 1.0]))
            .collect();

        let days = to_daily_summaries(&samples);
        assert_eq!(days.len(), 7);
        for (i, day) in days.iter().enumerate() {
            assert_eq!(day.temp_min, i as f64);
        }
        assert!(days.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_fewer_days_are_not_padded() {
        let samples: Vec<RawSample> = (0..3)
            .flat_map(|d| day_of(DAY0 + d * DAY, &[5.0]))
            .collect();
        assert_eq!(to_daily_summaries(&samples).len(), 3);
    }

    #[test]
    fn test_groups_by_utc_date() {
        // 21:00 and 00:00 UTC fall on different days
        let samples = vec![
            sample(DAY0 - STEP, 1.0, ConditionCategory::Clear),
            sample(DAY0, 2.0, ConditionCategory::Clear),
        ];
        let days = to_daily_summaries(&samples);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].temp_max, 1.0);
        assert_eq!(days[1].temp_max, 2.0);
    }

    #[test]
    fn test_single_sample_day() {
        let samples = vec![sample(DAY0, 7.4, ConditionCategory::Mist)];
        let day = &to_daily_summaries(&samples)[0];
        assert_eq!(day.temp_min, 7.4);
        assert_eq!(day.temp_max, 7.4);
        assert_eq!(day.temp_avg, 7);
        assert_eq!(day.condition, ConditionCategory::Mist);
    }

    #[test]
    fn test_hourly_takes_prefix() {
        let samples: Vec<RawSample> = (0..40)
            .map(|i| sample(DAY0 + i * STEP, 10.0 + i as f64 + 0.4, ConditionCategory::Clear))
            .collect();

        let hourly = to_hourly_samples(&samples, DEFAULT_HOURLY_COUNT);
        assert_eq!(hourly.len(), 8);
        assert_eq!(hourly[0].timestamp, DAY0);
        assert_eq!(hourly[7].timestamp, DAY0 + 7 * STEP);
        assert_eq!(hourly[0].temp, 10);
        assert_eq!(hourly[7].temp, 17);
        assert_eq!(hourly[0].feels_like, 9);
    }

    #[test]
    fn test_hourly_short_input_returns_all() {
        let samples = day_of(DAY0, &[1.0, 2.0, 3.0]);
        assert_eq!(to_hourly_samples(&samples, 8).len(), 3);
    }

    #[test]
    fn test_hourly_precipitation_percent() {
        let mut samples = day_of(DAY0, &[1.0, 2.0]);
        samples[0].pop = Some(0.375);
        let hourly = to_hourly_samples(&samples, 8);
        assert_eq!(hourly[0].precipitation_chance, 38);
        assert_eq!(hourly[1].precipitation_chance, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(to_daily_summaries(&[]).is_empty());
        assert!(to_hourly_samples(&[], DEFAULT_HOURLY_COUNT).is_empty());
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert_eq!(round_half_up(11.4), 11.0);
    }

    #[test]
    fn test_unrecognized_labels_share_one_bucket() {
        let mut odd = sample(DAY0 + STEP, 5.0, ConditionCategory::Unknown);
        odd.description = "volcanic glitter".into();
        let mut odder = sample(DAY0 + 2 * STEP, 5.0, ConditionCategory::Unknown);
        odder.description = "frog rain".into();
        let clear = sample(DAY0, 5.0, ConditionCategory::Clear);

        let group = [&clear, &odd, &odder];
        assert_eq!(dominant_condition(&group), Some(ConditionCategory::Unknown));
    }
}
