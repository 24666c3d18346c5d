//! Wall clock to engine time conversion

use chrono::{DateTime, Offset, TimeZone};

/// 1970-01-01 was a Thursday; the engine epoch is the following Sunday
const SUNDAY_EPOCH_OFFSET: i64 = 3 * 86_400;

/// Seconds since 1970-01-04 00:00 in the timezone of `now`.
///
/// Instants before that epoch map to 0.
pub fn engine_seconds<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    let local = now.timestamp() + i64::from(now.offset().fix().local_minus_utc());
    u32::try_from(local - SUNDAY_EPOCH_OFFSET).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use relay_rules::timeline::{day_of_week, seconds_since_midnight, HOUR};
    use relay_rules::Days;

    #[test]
    fn test_sunday_aligned() {
        // 2024-01-07 was a Sunday
        let noon = Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap();
        let t = engine_seconds(&noon);
        assert_eq!(day_of_week(t), Days::SUNDAY);
        assert_eq!(seconds_since_midnight(t), 12 * HOUR);
    }

    #[test]
    fn test_local_offset_applied() {
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        // Saturday 23:00 UTC is already Sunday 01:00 two hours east
        let instant = Utc
            .with_ymd_and_hms(2024, 1, 6, 23, 0, 0)
            .unwrap()
            .with_timezone(&east);
        let t = engine_seconds(&instant);
        assert_eq!(day_of_week(t), Days::SUNDAY);
        assert_eq!(seconds_since_midnight(t), HOUR);
    }

    #[test]
    fn test_before_epoch() {
        let early = Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(engine_seconds(&early), 0);
    }
}
