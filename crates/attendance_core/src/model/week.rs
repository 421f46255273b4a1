//! Week identity used by every week-scoped cache and query.
//!
//! # Responsibility
//! - Normalize arbitrary dates/instants to the Monday of their ISO week.
//! - Provide week navigation and display helpers.
//!
//! # Invariants
//! - A `WeekKey` always wraps a Monday; constructors and deserialization
//!   never produce any other weekday.
//! - Keys derive from the calendar date in a given zone, never from raw
//!   "current time" arithmetic.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, TimeZone, Weekday as ChronoWeekday};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const STORAGE_FORMAT: &str = "%Y-%m-%d";
const LABEL_FORMAT: &str = "%d %b %Y";

/// Monday 00:00 of one calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct WeekKey(NaiveDate);

/// Rejected attempt to build a key from a non-Monday date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotAMonday(pub NaiveDate);

impl Display for NotAMonday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "week key must be a Monday, got {}", self.0)
    }
}

impl Error for NotAMonday {}

impl WeekKey {
    /// Returns the week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.week(ChronoWeekday::Mon).first_day())
    }

    /// Returns the week containing `instant`, using the instant's own zone
    /// to decide the calendar date.
    pub fn from_datetime<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self {
        Self::containing(instant.date_naive())
    }

    /// Returns the week containing "now" in the local time zone.
    pub fn current() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Resolves a date chosen in a picker.
    ///
    /// Sundays have no classes, so a picked Sunday selects the week that
    /// starts the next day.
    pub fn for_picked_date(date: NaiveDate) -> Self {
        if date.weekday() == ChronoWeekday::Sun {
            return Self::containing(date.succ_opt().unwrap_or(date));
        }
        Self::containing(date)
    }

    pub fn monday(self) -> NaiveDate {
        self.0
    }

    /// Last class day of the week.
    pub fn saturday(self) -> NaiveDate {
        self.0.checked_add_days(Days::new(5)).unwrap_or(NaiveDate::MAX)
    }

    /// Following week. Saturates at the end of the supported calendar.
    pub fn next(self) -> Self {
        self.0
            .checked_add_days(Days::new(7))
            .map_or(self, Self)
    }

    /// Preceding week. Saturates at the start of the supported calendar.
    pub fn previous(self) -> Self {
        self.0
            .checked_sub_days(Days::new(7))
            .map_or(self, Self)
    }

    /// Monday 00:00:00.000 of this week in `tz`.
    ///
    /// Returns `None` only when local midnight does not exist in `tz`.
    pub fn start_instant<Tz: TimeZone>(self, tz: &Tz) -> Option<DateTime<Tz>> {
        let midnight = self.0.and_hms_milli_opt(0, 0, 0, 0)?;
        tz.from_local_datetime(&midnight).earliest()
    }

    /// Stable text form used as the storage key (`YYYY-MM-DD`).
    pub fn storage_key(self) -> String {
        self.0.format(STORAGE_FORMAT).to_string()
    }

    /// Parses a storage key. Returns `None` for malformed or non-Monday values.
    pub fn parse_storage_key(value: &str) -> Option<Self> {
        NaiveDate::parse_from_str(value, STORAGE_FORMAT)
            .ok()
            .and_then(|date| Self::try_from(date).ok())
    }

    /// Human-readable Monday to Saturday span, e.g. `01 Jan 2024 : 06 Jan 2024`.
    pub fn range_label(self) -> String {
        format!(
            "{} : {}",
            self.monday().format(LABEL_FORMAT),
            self.saturday().format(LABEL_FORMAT)
        )
    }
}

impl TryFrom<NaiveDate> for WeekKey {
    type Error = NotAMonday;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        if value.weekday() == ChronoWeekday::Mon {
            Ok(Self(value))
        } else {
            Err(NotAMonday(value))
        }
    }
}

impl From<WeekKey> for NaiveDate {
    fn from(value: WeekKey) -> Self {
        value.0
    }
}

impl Display for WeekKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(STORAGE_FORMAT))
    }
}
