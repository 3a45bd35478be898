use crate::error::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Current UTC instant, used for `meta.lastUpdated` and version records.
///
/// Truncated to microseconds, the finest precision PostgreSQL `TIMESTAMPTZ`
/// keeps, so a stored record reads back equal to the one returned.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// Formats an instant as a FHIR `instant` string.
pub fn format_instant(instant: OffsetDateTime) -> Result<String> {
    Ok(instant.format(&Rfc3339)?)
}
