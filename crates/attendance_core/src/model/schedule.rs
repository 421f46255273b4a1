//! Weekly schedule model.
//!
//! # Responsibility
//! - Define class days and recurring schedule slots.
//! - Group flat slot lists into the per-day shape shown by the timetable.
//!
//! # Invariants
//! - Classes run Monday through Saturday only.
//! - `(day, time_slot)` is unique across the stored schedule; storage
//!   enforces it, this module only orders.

use crate::model::subject::SubjectId;
use chrono::Weekday as ChronoWeekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a schedule slot.
pub type ScheduleId = Uuid;

/// Schedule slots grouped per day, each day sorted by `time_slot`.
pub type ScheduleByDay = BTreeMap<Weekday, Vec<ScheduleEntry>>;

/// Class day. Ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 6] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// ISO day number, Monday = 1.
    pub fn number(self) -> u8 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
        }
    }

    pub fn from_number(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value).checked_sub(1)?).copied()
    }

    /// Maps a calendar weekday; Sunday has no classes.
    pub fn from_chrono(day: ChronoWeekday) -> Option<Self> {
        Self::from_number(u8::try_from(day.number_from_monday()).ok()?)
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
        }
    }
}

impl Display for Weekday {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_label())
    }
}

/// One recurring weekly class slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub day: Weekday,
    pub subject_id: SubjectId,
    /// Zero-based position within the day.
    pub time_slot: u32,
}

impl ScheduleEntry {
    /// Creates a slot with a generated id.
    pub fn new(day: Weekday, subject_id: SubjectId, time_slot: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            day,
            subject_id,
            time_slot,
        }
    }
}

/// Groups slots by day; each day's list is sorted by `time_slot` ascending.
///
/// Days without slots are absent from the map.
pub fn group_by_day(entries: impl IntoIterator<Item = ScheduleEntry>) -> ScheduleByDay {
    let mut grouped = ScheduleByDay::new();
    for entry in entries {
        grouped.entry(entry.day).or_default().push(entry);
    }
    for slots in grouped.values_mut() {
        slots.sort_by_key(|entry| entry.time_slot);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::{group_by_day, ScheduleEntry, Weekday};
    use uuid::Uuid;

    #[test]
    fn day_numbers_roundtrip_and_reject_sunday() {
        for day in Weekday::ALL {
            assert_eq!(Weekday::from_number(day.number()), Some(day));
        }
        assert_eq!(Weekday::from_number(0), None);
        assert_eq!(Weekday::from_number(7), None);
        assert_eq!(Weekday::from_chrono(chrono::Weekday::Sun), None);
        assert_eq!(
            Weekday::from_chrono(chrono::Weekday::Sat),
            Some(Weekday::Saturday)
        );
    }

    #[test]
    fn grouping_sorts_each_day_by_slot() {
        let subject = Uuid::new_v4();
        let entries = vec![
            ScheduleEntry::new(Weekday::Wednesday, subject, 2),
            ScheduleEntry::new(Weekday::Monday, subject, 1),
            ScheduleEntry::new(Weekday::Wednesday, subject, 0),
            ScheduleEntry::new(Weekday::Monday, subject, 0),
        ];

        let grouped = group_by_day(entries);
        assert_eq!(
            grouped.keys().copied().collect::<Vec<_>>(),
            vec![Weekday::Monday, Weekday::Wednesday]
        );
        let wednesday_slots: Vec<u32> = grouped[&Weekday::Wednesday]
            .iter()
            .map(|entry| entry.time_slot)
            .collect();
        assert_eq!(wednesday_slots, vec![0, 2]);
    }
}
