use chrono::{
    DateTime,
    Utc,
};

/// Current time, UTC. Centralized so tests can be written against
/// deterministic clocks by constructing timestamps directly rather than
/// calling this function.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Formats a timestamp the way the control-plane indices expect:
/// ISO-8601 UTC with a trailing `Z` (§6), e.g. `2024-01-02T03:04:05.678Z`.
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
