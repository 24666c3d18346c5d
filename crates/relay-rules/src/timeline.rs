//! Weekly timelines and the window matcher
//!
//! Times are seconds since an epoch whose day zero is a Sunday. A window is a
//! day-of-week mask plus a start and end second within the day; a window whose
//! start is after its end runs past midnight into the following day, and a
//! window whose start equals its end covers the whole day.

use crate::error::RuleError;

/// Maximum number of windows in one timeline
pub const MAX_WINDOWS: usize = 14;

pub const SECOND: u32 = 1;
pub const MINUTE: u32 = 60 * SECOND;
pub const HOUR: u32 = 60 * MINUTE;
pub const DAY: u32 = 24 * HOUR;
pub const SECONDS_IN_WEEK: u32 = 7 * DAY;

/// Day-of-week bitmask, Sunday is bit 0 and Saturday bit 6
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Days(u8);

impl Days {
    pub const SUNDAY: Days = Days(1);
    pub const MONDAY: Days = Days(1 << 1);
    pub const TUESDAY: Days = Days(1 << 2);
    pub const WEDNESDAY: Days = Days(1 << 3);
    pub const THURSDAY: Days = Days(1 << 4);
    pub const FRIDAY: Days = Days(1 << 5);
    pub const SATURDAY: Days = Days(1 << 6);

    pub const WEEKENDS: Days = Days(Self::SATURDAY.0 | Self::SUNDAY.0);
    pub const WEEKDAYS: Days = Days(
        Self::MONDAY.0 | Self::TUESDAY.0 | Self::WEDNESDAY.0 | Self::THURSDAY.0 | Self::FRIDAY.0,
    );
    pub const SCHOOL_NIGHTS: Days = Days(
        Self::SUNDAY.0 | Self::MONDAY.0 | Self::TUESDAY.0 | Self::WEDNESDAY.0 | Self::THURSDAY.0,
    );
    pub const EVERYDAY: Days = Days(0x7f);

    /// Build a mask from day numbers (0=Sunday, ..., 6=Saturday).
    /// An empty list means every day.
    pub fn from_day_numbers(days: &[u8]) -> Result<Self, RuleError> {
        if days.is_empty() {
            return Ok(Self::EVERYDAY);
        }
        let mut mask = 0u8;
        for &day in days {
            if day > 6 {
                return Err(RuleError::InvalidDay(day));
            }
            mask |= 1 << day;
        }
        Ok(Self(mask))
    }

    /// True if every day in `other` is also in `self`
    #[must_use]
    pub const fn contains(self, other: Days) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

/// Seconds elapsed since the most recent midnight
#[must_use]
pub fn seconds_since_midnight(t: u32) -> u32 {
    t % DAY
}

/// Single-day mask for the day containing `t`
#[must_use]
pub fn day_of_week(t: u32) -> Days {
    Days(1 << ((t / DAY) % 7))
}

/// The day before `today`, and whether that crossed back over the week start
fn previous_day(today: Days) -> (Days, bool) {
    if today == Days::SUNDAY {
        (Days::SATURDAY, true)
    } else {
        (Days(today.0 >> 1), false)
    }
}

/// One day/time window of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub days: Days,
    /// Start, seconds since midnight
    pub start: u32,
    /// End (exclusive), seconds since midnight
    pub end: u32,
}

impl Window {
    #[must_use]
    pub fn new(days: Days, start: u32, end: u32) -> Self {
        Self {
            days,
            start: start % DAY,
            end: end % DAY,
        }
    }

    /// Whether the window is active at `time` seconds into `today`.
    /// Returns `Some(week_barrier)` on a match.
    fn matches(&self, time: u32, today: Days) -> Option<bool> {
        if self.start < self.end {
            (self.days.contains(today) && self.start <= time && time < self.end).then_some(false)
        } else if self.start > self.end {
            // Runs past midnight: either today's evening part or yesterday's tail
            if self.days.contains(today) && time >= self.start {
                return Some(false);
            }
            let (yesterday, wrapped) = previous_day(today);
            (self.days.contains(yesterday) && time < self.end).then_some(wrapped)
        } else {
            self.days.contains(today).then_some(false)
        }
    }
}

/// Result of matching a timeline against an instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMatch {
    /// Index of the first matching window, -1 if none
    pub period_index: i8,
    /// The match relied on Saturday's window running into Sunday
    pub week_barrier: bool,
}

impl WindowMatch {
    pub const NONE: WindowMatch = WindowMatch {
        period_index: -1,
        week_barrier: false,
    };

    /// Whether some window matched
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.period_index >= 0
    }
}

/// An ordered weekly set of windows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    windows: heapless::Vec<Window, MAX_WINDOWS>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeline holding exactly one window
    #[must_use]
    pub fn single(days: Days, start: u32, end: u32) -> Self {
        let mut windows = heapless::Vec::new();
        // Capacity is at least one
        let _ = windows.push(Window::new(days, start, end));
        Self { windows }
    }

    /// Append a window; order is match precedence
    pub fn push(&mut self, window: Window) -> Result<(), RuleError> {
        self.windows
            .push(window)
            .map_err(|_| RuleError::TooManyWindows(MAX_WINDOWS))
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl TryFrom<&[Window]> for Timeline {
    type Error = RuleError;

    fn try_from(windows: &[Window]) -> Result<Self, Self::Error> {
        let mut timeline = Timeline::new();
        for window in windows {
            timeline.push(*window)?;
        }
        Ok(timeline)
    }
}

/// Find the window of `timeline` active at `now`. First match wins.
#[must_use]
pub fn match_window(timeline: &Timeline, now: u32) -> WindowMatch {
    let time = seconds_since_midnight(now);
    let today = day_of_week(now);

    timeline
        .windows
        .iter()
        .enumerate()
        .find_map(|(index, window)| {
            window.matches(time, today).map(|week_barrier| WindowMatch {
                period_index: index as i8,
                week_barrier,
            })
        })
        .unwrap_or(WindowMatch::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Day 0 of the epoch is a Sunday
    fn at(day: u32, hour: u32, minute: u32) -> u32 {
        day * DAY + hour * HOUR + minute * MINUTE
    }

    #[test]
    fn test_day_of_week_wraps_weekly() {
        assert_eq!(day_of_week(at(0, 12, 0)), Days::SUNDAY);
        assert_eq!(day_of_week(at(6, 12, 0)), Days::SATURDAY);
        assert_eq!(day_of_week(at(7, 12, 0)), Days::SUNDAY);
        assert_eq!(day_of_week(at(7 * 52 + 3, 0, 0)), Days::WEDNESDAY);
    }

    #[test]
    fn test_from_day_numbers() {
        assert_eq!(Days::from_day_numbers(&[]).unwrap(), Days::EVERYDAY);
        assert_eq!(Days::from_day_numbers(&[0, 6]).unwrap(), Days::WEEKENDS);
        assert!(matches!(
            Days::from_day_numbers(&[7]),
            Err(RuleError::InvalidDay(7))
        ));
    }

    #[test]
    fn test_same_day_window() {
        let timeline = Timeline::single(Days::WEEKDAYS, 9 * HOUR, 17 * HOUR);
        // Monday
        assert_eq!(match_window(&timeline, at(1, 9, 0)).period_index, 0);
        assert_eq!(match_window(&timeline, at(1, 16, 59)).period_index, 0);
        assert_eq!(match_window(&timeline, at(1, 17, 0)).period_index, -1);
        assert_eq!(match_window(&timeline, at(1, 8, 59)).period_index, -1);
        // Sunday
        assert_eq!(match_window(&timeline, at(0, 12, 0)).period_index, -1);
    }

    #[test]
    fn test_midnight_wraparound() {
        let timeline = Timeline::single(Days::EVERYDAY, 23 * HOUR, HOUR);
        assert_eq!(match_window(&timeline, at(2, 23, 30)).period_index, 0);
        assert_eq!(match_window(&timeline, at(3, 0, 30)).period_index, 0);
        assert_eq!(match_window(&timeline, at(3, 2, 0)).period_index, -1);
        assert_eq!(match_window(&timeline, at(3, 22, 0)).period_index, -1);
    }

    #[test]
    fn test_wraparound_uses_previous_day_mask() {
        // Friday night only
        let timeline = Timeline::single(Days::FRIDAY, 22 * HOUR, 2 * HOUR);
        assert_eq!(match_window(&timeline, at(5, 23, 0)).period_index, 0);
        assert_eq!(match_window(&timeline, at(6, 1, 0)).period_index, 0);
        // Thursday night is not in the mask
        assert_eq!(match_window(&timeline, at(5, 1, 0)).period_index, -1);
    }

    #[test]
    fn test_week_barrier() {
        let timeline = Timeline::single(Days::SATURDAY, 22 * HOUR, 2 * HOUR);
        let saturday = match_window(&timeline, at(6, 23, 0));
        assert_eq!(saturday.period_index, 0);
        assert!(!saturday.week_barrier);

        let sunday = match_window(&timeline, at(7, 1, 0));
        assert_eq!(sunday.period_index, 0);
        assert!(sunday.week_barrier);

        assert_eq!(match_window(&timeline, at(7, 3, 0)), WindowMatch::NONE);
    }

    #[test]
    fn test_all_day_window() {
        let timeline = Timeline::single(Days::WEEKENDS, 0, 0);
        assert_eq!(match_window(&timeline, at(0, 0, 0)).period_index, 0);
        assert_eq!(match_window(&timeline, at(6, 23, 59)).period_index, 0);
        assert_eq!(match_window(&timeline, at(3, 12, 0)).period_index, -1);
    }

    #[test]
    fn test_first_match_wins() {
        let timeline = Timeline::try_from(
            &[
                Window::new(Days::EVERYDAY, 8 * HOUR, 12 * HOUR),
                Window::new(Days::EVERYDAY, 10 * HOUR, 14 * HOUR),
            ][..],
        )
        .unwrap();
        assert_eq!(match_window(&timeline, at(1, 11, 0)).period_index, 0);
        assert_eq!(match_window(&timeline, at(1, 13, 0)).period_index, 1);
    }

    #[test]
    fn test_timeline_capacity() {
        let mut timeline = Timeline::new();
        for hour in 0..MAX_WINDOWS as u32 {
            timeline
                .push(Window::new(Days::EVERYDAY, hour * HOUR, hour * HOUR + MINUTE))
                .unwrap();
        }
        let overflow = timeline.push(Window::new(Days::EVERYDAY, 0, MINUTE));
        assert!(matches!(overflow, Err(RuleError::TooManyWindows(14))));
        assert_eq!(timeline.len(), MAX_WINDOWS);
    }
}
