use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Format of `Date.prototype.toString()` once the trailing zone name in
/// parentheses is removed, e.g. `Tue Mar 05 2019 12:34:56 GMT+0100`.
const JS_DATE_FORMAT: &str = "%a %b %d %Y %H:%M:%S GMT%z";

/// Decode a stored upload timestamp.
///
/// Current records hold epoch milliseconds. Older records may hold a date
/// string instead: RFC 3339 / ISO 8601 (with or without an offset, naive
/// values are taken as UTC), RFC 2822 (including the `GMT` form produced by
/// `toUTCString`), or the `toString` form above. Returns `None` for anything
/// else.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ms) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    if let Ok(ms) = raw.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        return ms
            .is_finite()
            .then(|| Utc.timestamp_millis_opt(ms.round() as i64).single())
            .flatten();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    let without_zone_name = raw.split(" (").next().unwrap_or(raw);
    DateTime::parse_from_str(without_zone_name, JS_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
