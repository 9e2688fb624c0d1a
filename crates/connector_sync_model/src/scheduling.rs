use chrono::{
    DateTime,
    Utc,
};
use connector_sync_common::SYNC_DISABLED;
use saffron::Cron;
use serde_json::Value;

/// Computes seconds remaining until the next scheduled sync, given a
/// connector's `scheduling` mapping (§4.2, §8):
///   - `{enabled: false}` (or missing) -> [`SYNC_DISABLED`], no sync scheduled
///   - `{enabled: true, interval: "<cron expr>"}` -> seconds until the cron
///     expression's next firing after `now`, computed with the same crate
///     the orchestrator's own periodic jobs use.
pub fn next_sync(scheduling: &Value, now: DateTime<Utc>) -> Result<i64, anyhow::Error> {
    let enabled = scheduling.get("enabled").and_then(Value::as_bool).unwrap_or(false);
    if !enabled {
        return Ok(SYNC_DISABLED);
    }
    let Some(interval) = scheduling.get("interval").and_then(Value::as_str) else {
        return Ok(SYNC_DISABLED);
    };
    let cron: Cron = interval
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid cron expression `{interval}`"))?;
    let next = cron
        .next_after(now)
        .ok_or_else(|| anyhow::anyhow!("cron expression `{interval}` never fires again"))?;
    Ok((next - now).num_seconds().max(0))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn disabled_scheduling_yields_sync_disabled() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(next_sync(&json!({"enabled": false}), now).unwrap(), SYNC_DISABLED);
        assert_eq!(next_sync(&json!({}), now).unwrap(), SYNC_DISABLED);
    }

    #[test]
    fn missing_interval_yields_sync_disabled() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(next_sync(&json!({"enabled": true}), now).unwrap(), SYNC_DISABLED);
    }

    #[test]
    fn hourly_cron_computes_seconds_to_next_hour() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 15, 0).unwrap();
        let seconds = next_sync(&json!({"enabled": true, "interval": "0 * * * *"}), now).unwrap();
        assert_eq!(seconds, 45 * 60);
    }

    #[test]
    fn invalid_cron_expression_errors() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(next_sync(&json!({"enabled": true, "interval": "not a cron"}), now).is_err());
    }
}
