//! Plain-text rendering for terminal output.

use chrono::{DateTime, FixedOffset, Utc};
use weathernow_weather::forecast::round_half_up;
use weathernow_weather::{
    CurrentConditions, DailySummary, Favorite, HourlySample, PlaceCandidate, Preferences,
    TimeFormat,
};

fn temp(prefs: &Preferences, celsius: f64) -> String {
    let unit = prefs.temperature_unit;
    format!("{}{}", round_half_up(unit.convert(celsius)) as i64, unit.symbol())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Local wall-clock time for `utc` given the upstream offset in seconds.
fn local(utc: DateTime<Utc>, offset_secs: Option<i32>) -> DateTime<FixedOffset> {
    match offset_secs.and_then(FixedOffset::east_opt) {
        Some(offset) => utc.with_timezone(&offset),
        None => utc.fixed_offset(),
    }
}

fn clock(prefs: &Preferences, time: DateTime<FixedOffset>) -> String {
    match prefs.time_format {
        TimeFormat::TwelveHour => time.format("%l %p").to_string().trim().to_string(),
        TimeFormat::TwentyFourHour => time.format("%H:%M").to_string(),
    }
}

pub fn current(prefs: &Preferences, place: &str, current: &CurrentConditions) -> String {
    let description = current
        .primary_condition()
        .map(|c| capitalize(&c.description))
        .unwrap_or_else(|| current.category().to_string());

    let mut out = format!("{}\n", place);
    out.push_str(&format!(
        "  {}  {} (feels like {})\n",
        temp(prefs, current.main.temp),
        description,
        temp(prefs, current.main.feels_like)
    ));
    out.push_str(&format!(
        "  Humidity {}%  Wind {} km/h {}  Pressure {} hPa",
        current.main.humidity,
        current.wind.speed_kmh(),
        current.wind.compass(),
        current.main.pressure.round() as i64
    ));

    if let Some(visibility) = current.visibility {
        out.push_str(&format!("  Visibility {:.1} km", f64::from(visibility) / 1000.0));
    }
    if current.is_night() {
        out.push_str("  (night)");
    }
    out
}

pub fn daily(prefs: &Preferences, days: &[DailySummary]) -> String {
    days.iter()
        .map(|d| {
            format!(
                "  {}  {:<13} {:>6} / {:<6} {:>3}%",
                d.date.format("%a %d %b"),
                d.condition.as_str(),
                temp(prefs, d.temp_min),
                temp(prefs, d.temp_max),
                d.precipitation_chance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn hourly(prefs: &Preferences, hours: &[HourlySample], offset_secs: Option<i32>) -> String {
    hours
        .iter()
        .map(|h| {
            format!(
                "  {:>5}  {:>6}  {:<13} {:>3}%",
                clock(prefs, local(h.time, offset_secs)),
                temp(prefs, h.temperature),
                h.condition.as_str(),
                h.precipitation_chance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn candidates(candidates: &[PlaceCandidate]) -> String {
    if candidates.is_empty() {
        return "No matching places.".to_string();
    }
    candidates
        .iter()
        .map(|c| format!("  {}  ({})", c.display_name, c.coordinates.label()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn favorites(favorites: &[Favorite]) -> String {
    if favorites.is_empty() {
        return "No favorites yet.".to_string();
    }
    favorites
        .iter()
        .map(|f| format!("  {:<24} {}", f.name, f.id))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use weathernow_weather::{TemperatureUnit, Theme};

    fn prefs(unit: TemperatureUnit, time_format: TimeFormat) -> Preferences {
        Preferences {
            temperature_unit: unit,
            time_format,
            theme: Theme::Auto,
        }
    }

    #[test]
    fn test_temperature_units() {
        assert_eq!(temp(&prefs(TemperatureUnit::Celsius, TimeFormat::TwelveHour), 21.5), "22°C");
        assert_eq!(temp(&prefs(TemperatureUnit::Fahrenheit, TimeFormat::TwelveHour), 100.0), "212°F");
    }

    #[test]
    fn test_clock_formats() {
        let utc = DateTime::from_timestamp(1_709_290_800, 0).unwrap(); // 11:00 UTC
        let twelve = prefs(TemperatureUnit::Celsius, TimeFormat::TwelveHour);
        let twenty_four = prefs(TemperatureUnit::Celsius, TimeFormat::TwentyFourHour);

        assert_eq!(clock(&twelve, local(utc, None)), "11 AM");
        assert_eq!(clock(&twenty_four, local(utc, Some(3600 * 5))), "16:00");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("light rain"), "Light rain");
        assert_eq!(capitalize(""), "");
    }
}
