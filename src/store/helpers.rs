use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} value {value} is out of range"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Zero dimensions are treated as unknown.
pub fn known_dimension(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_reject_out_of_range() {
        assert!(to_u64(-1, "frame_count").is_err());
        assert_eq!(to_u32(1080, "device_width").unwrap(), 1080);
        assert!(to_u32(i64::from(u32::MAX) + 1, "device_width").is_err());
    }

    #[test]
    fn parses_rfc3339() {
        let dt = parse_datetime("2024-05-01T10:00:00+02:00", "updated_at").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_datetime("yesterday", "updated_at").is_err());
    }

    #[test]
    fn zero_dimension_is_unknown() {
        assert_eq!(known_dimension(Some(0)), None);
        assert_eq!(known_dimension(Some(390)), Some(390));
        assert_eq!(known_dimension(None), None);
    }
}
