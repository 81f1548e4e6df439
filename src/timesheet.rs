use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder id for entries the server has not acknowledged yet.
pub const PENDING_ID: i64 = -1;

/// Date format on the wire and in `date_of_work`.
pub const WIRE_FORMAT: &str = "%Y-%m-%d";
/// Date format used as the map key and everywhere the user sees a date.
pub const DISPLAY_FORMAT: &str = "%d.%m.%Y";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourEntry {
    pub id: i64,
    pub date_of_work: String,
    pub hours: f64,
}

impl HourEntry {
    pub fn is_pending(&self) -> bool {
        self.id == PENDING_ID
    }
}

/// Entries for one calendar day in insertion order, with their running sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub hours: Vec<HourEntry>,
    pub sum: f64,
}

/// The hours-by-date view-model. Keys are display-format dates; a date with
/// no entries has no key at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timesheet {
    by_date: BTreeMap<String, DaySummary>,
}

/// Everything needed to undo an optimistic removal when the remote delete
/// fails: the entry itself and where it sat.
#[derive(Debug, Clone)]
pub struct RemovedEntry {
    date_key: String,
    index: usize,
    entry: HourEntry,
}

impl RemovedEntry {
    pub fn hours(&self) -> f64 {
        self.entry.hours
    }
}

impl Timesheet {
    /// Optimistically record hours for a date. The entry carries the
    /// sentinel id until a later reload replaces it with server state.
    pub fn add(&mut self, date: NaiveDate, hours: f64) {
        let day = self.by_date.entry(display_key(date)).or_default();
        day.hours.push(HourEntry {
            id: PENDING_ID,
            date_of_work: date.format(WIRE_FORMAT).to_string(),
            hours,
        });
        day.sum += hours;
    }

    /// Remove the entry with the given id from a date, keeping enough state
    /// to restore it. Removing the last entry drops the date key entirely.
    pub fn remove(&mut self, date: NaiveDate, id: i64) -> Option<RemovedEntry> {
        let key = display_key(date);
        let day = self.by_date.get_mut(&key)?;
        let index = day.hours.iter().position(|h| h.id == id)?;
        let entry = day.hours.remove(index);
        day.sum -= entry.hours;
        if day.hours.is_empty() {
            self.by_date.remove(&key);
        }
        Some(RemovedEntry {
            date_key: key,
            index,
            entry,
        })
    }

    /// Compensate a failed remote delete: reinsert at the original index and
    /// restore the sum.
    pub fn restore(&mut self, removed: RemovedEntry) {
        let day = self.by_date.entry(removed.date_key).or_default();
        let index = removed.index.min(day.hours.len());
        day.sum += removed.entry.hours;
        day.hours.insert(index, removed.entry);
    }

    /// Full replace from a server result. The server is authoritative:
    /// pending local entries are dropped too, since an add only lands
    /// locally after the server acknowledged it, and the reload returns it
    /// again under its real id.
    pub fn apply_server_hours(&mut self, rows: Vec<HourEntry>) {
        self.by_date.clear();
        for row in rows {
            self.push_row(row);
        }
    }

    fn push_row(&mut self, row: HourEntry) {
        let key = match NaiveDate::parse_from_str(&row.date_of_work, WIRE_FORMAT) {
            Ok(date) => display_key(date),
            Err(e) => {
                warn!("Skipping hour entry with bad date {:?}: {}", row.date_of_work, e);
                return;
            }
        };
        let day = self.by_date.entry(key).or_default();
        day.sum += row.hours;
        day.hours.push(row);
    }

    pub fn day(&self, key: &str) -> Option<&DaySummary> {
        self.by_date.get(key)
    }

    pub fn find(&self, date: NaiveDate, id: i64) -> Option<&HourEntry> {
        self.by_date
            .get(&display_key(date))?
            .hours
            .iter()
            .find(|h| h.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

pub fn display_key(date: NaiveDate) -> String {
    date.format(DISPLAY_FORMAT).to_string()
}
