//! Wall-clock source for snapshot timestamps, tick alignment and the face

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};

/// Wall-clock time plus the local UTC offset.
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;

    /// Current local offset from UTC
    fn utc_offset(&self) -> FixedOffset;

    /// Local date-time for `millis` in `offset`
    fn local_time(&self, millis: i64, offset: FixedOffset) -> DateTime<FixedOffset> {
        let utc = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
        offset.from_utc_datetime(&utc.naive_utc())
    }
}

/// The host's real clock and time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn utc_offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}
