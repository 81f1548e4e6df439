use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, Weekday};

/// Seven consecutive days starting on a Monday, derived from a signed week
/// offset against the current ISO week. Never persisted, always recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<NaiveDate>,
}

impl WeekWindow {
    pub fn from_offset(offset: i64) -> Result<WeekWindow> {
        WeekWindow::containing(Local::now().date_naive(), offset)
    }

    pub fn containing(today: NaiveDate, offset: i64) -> Result<WeekWindow> {
        let delta = Duration::try_weeks(offset)
            .with_context(|| format!("Week offset {} is out of range", offset))?;
        let start = today
            .week(Weekday::Mon)
            .first_day()
            .checked_add_signed(delta)
            .with_context(|| format!("Week offset {} is out of range", offset))?;
        let end = start
            .checked_add_signed(Duration::days(6))
            .with_context(|| format!("Week offset {} is out of range", offset))?;
        let days = (0..7).map(|i| start + Duration::days(i)).collect();
        Ok(WeekWindow { start, end, days })
    }
}

/// Remembers which week is currently loaded so repeated navigation to the
/// same week does not refetch it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekCursor {
    loaded_start: Option<NaiveDate>,
}

impl WeekCursor {
    pub fn needs_reload(&self, window: &WeekWindow) -> bool {
        self.loaded_start != Some(window.start)
    }

    pub fn mark_loaded(&mut self, window: &WeekWindow) {
        self.loaded_start = Some(window.start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn window_starts_on_the_monday_of_the_week() {
        // 2024-03-06 is a Wednesday
        let window = WeekWindow::containing(date("2024-03-06"), 0).unwrap();
        assert_eq!(window.start, date("2024-03-04"));
        assert_eq!(window.end, date("2024-03-10"));
        assert_eq!(window.days.len(), 7);
        assert_eq!(window.days[0], window.start);
        assert_eq!(window.days[6], window.end);
    }

    #[test]
    fn monday_maps_to_its_own_week() {
        let window = WeekWindow::containing(date("2024-03-04"), 0).unwrap();
        assert_eq!(window.start, date("2024-03-04"));
    }

    #[test]
    fn offsets_shift_whole_weeks_in_both_directions() {
        let previous = WeekWindow::containing(date("2024-03-06"), -1).unwrap();
        assert_eq!(previous.start, date("2024-02-26"));

        let next = WeekWindow::containing(date("2024-03-06"), 1).unwrap();
        assert_eq!(next.start, date("2024-03-11"));
    }

    #[test]
    fn absurd_offsets_error_instead_of_wrapping() {
        assert!(WeekWindow::containing(date("2024-03-06"), i64::MAX).is_err());
    }

    #[test]
    fn cursor_skips_reload_for_the_same_week() {
        let window = WeekWindow::containing(date("2024-03-06"), 0).unwrap();
        let mut cursor = WeekCursor::default();
        assert!(cursor.needs_reload(&window));

        cursor.mark_loaded(&window);
        assert!(!cursor.needs_reload(&window));

        // Same start computed from a different day of the week
        let same_week = WeekWindow::containing(date("2024-03-08"), 0).unwrap();
        assert!(!cursor.needs_reload(&same_week));

        let next_week = WeekWindow::containing(date("2024-03-06"), 1).unwrap();
        assert!(cursor.needs_reload(&next_week));
    }
}
