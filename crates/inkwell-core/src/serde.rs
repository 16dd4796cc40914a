// `::serde` is the crate; this module shadows its name.
use ::serde::Serializer;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// RFC 3339 with millisecond precision and a `Z` suffix, the one timestamp
/// format used in JSON bodies and stream payloads.
pub fn rfc3339_ms(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `serialize_with` adapter for [`rfc3339_ms`].
pub fn to_rfc3339_ms<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&rfc3339_ms(dt))
}

/// Unix seconds (a JWT `exp`, say) as a UTC instant. Out-of-range values clamp to the epoch.
pub fn from_unix_secs(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}
