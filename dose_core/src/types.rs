//! Core domain types for the dose scheduling engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medicines and their time slots
//! - Slot addressing for toggles
//! - Inputs for adding and updating medicines
//! - Derived views (schedule entries, summaries, adherence)

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque medicine identifier
pub type MedicineId = Uuid;

/// Owning user identifier (users live outside this system)
pub type UserId = u64;

// ============================================================================
// Slots
// ============================================================================

/// Addresses one of a medicine's dose slots
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseSlot {
    First,
    Second,
    Third,
    /// Single-time field kept for medicines created before numbered slots
    Legacy,
}

impl DoseSlot {
    pub const NUMBERED: [DoseSlot; 3] = [DoseSlot::First, DoseSlot::Second, DoseSlot::Third];

    /// Map a 1-based slot number; anything outside 1..=3 addresses the legacy slot.
    pub fn from_number(n: u8) -> Self {
        match n {
            1 => DoseSlot::First,
            2 => DoseSlot::Second,
            3 => DoseSlot::Third,
            _ => DoseSlot::Legacy,
        }
    }

    /// 1-based slot number, `None` for the legacy slot
    pub fn number(self) -> Option<u8> {
        match self {
            DoseSlot::First => Some(1),
            DoseSlot::Second => Some(2),
            DoseSlot::Third => Some(3),
            DoseSlot::Legacy => None,
        }
    }
}

impl fmt::Display for DoseSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "slot {}", n),
            None => write!(f, "legacy slot"),
        }
    }
}

/// A scheduled time of day plus whether today's dose has been taken
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotState {
    /// `HH:mm`; `None` or blank means the slot is unused
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub taken: bool,
}

impl SlotState {
    pub fn at(time: impl Into<String>) -> Self {
        Self {
            time: Some(time.into()),
            taken: false,
        }
    }

    /// The trimmed time string, if the slot is in use
    pub fn scheduled_time(&self) -> Option<&str> {
        self.time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn is_used(&self) -> bool {
        self.scheduled_time().is_some()
    }
}

// ============================================================================
// Medicine
// ============================================================================

/// A medicine schedule owned by one user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: MedicineId,
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    /// Numbered slots 1..=3
    pub slots: [SlotState; 3],
    #[serde(default)]
    pub legacy: SlotState,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_days: u32,
    pub active: bool,
    pub last_taken_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Medicine {
    /// Create an active medicine with no slots and no window
    pub fn new(user_id: UserId, name: impl Into<String>, dosage: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            dosage: dosage.into(),
            slots: Default::default(),
            legacy: SlotState::default(),
            start_date: None,
            end_date: None,
            duration_days: 0,
            active: true,
            last_taken_at: None,
            notes: None,
        }
    }

    pub fn slot(&self, slot: DoseSlot) -> &SlotState {
        match slot {
            DoseSlot::First => &self.slots[0],
            DoseSlot::Second => &self.slots[1],
            DoseSlot::Third => &self.slots[2],
            DoseSlot::Legacy => &self.legacy,
        }
    }

    pub fn slot_mut(&mut self, slot: DoseSlot) -> &mut SlotState {
        match slot {
            DoseSlot::First => &mut self.slots[0],
            DoseSlot::Second => &mut self.slots[1],
            DoseSlot::Third => &mut self.slots[2],
            DoseSlot::Legacy => &mut self.legacy,
        }
    }

    pub fn has_numbered_slots(&self) -> bool {
        self.slots.iter().any(SlotState::is_used)
    }

    /// Slots that represent real doses: the numbered ones in use, or the
    /// legacy slot when no numbered slot is set.
    pub fn dose_slots(&self) -> Vec<(DoseSlot, &SlotState)> {
        if self.has_numbered_slots() {
            DoseSlot::NUMBERED
                .iter()
                .map(|&s| (s, self.slot(s)))
                .filter(|(_, state)| state.is_used())
                .collect()
        } else if self.legacy.is_used() {
            vec![(DoseSlot::Legacy, &self.legacy)]
        } else {
            Vec::new()
        }
    }

    /// At least one slot must be set for the medicine to be scanned
    pub fn is_schedulable(&self) -> bool {
        self.has_numbered_slots() || self.legacy.is_used()
    }

    /// Whether `date` lies inside the optional `[start_date, end_date]` window
    pub fn is_in_window(&self, date: NaiveDate) -> bool {
        self.start_date.map_or(true, |start| date >= start)
            && self.end_date.map_or(true, |end| date <= end)
    }

    /// Active and in window for `date`
    pub fn is_due_on(&self, date: NaiveDate) -> bool {
        self.active && self.is_in_window(date)
    }

    /// Clear the three numbered flags and the legacy flag
    pub fn clear_taken(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.taken = false;
        }
        self.legacy.taken = false;
    }

    /// Flip one slot's taken flag and stamp `last_taken_at`
    pub fn toggle(&mut self, slot: DoseSlot, now: NaiveDateTime) -> bool {
        let state = self.slot_mut(slot);
        state.taken = !state.taken;
        let taken = state.taken;
        self.last_taken_at = Some(now);
        taken
    }

    pub fn reminder_message(&self) -> String {
        format!("Time to take {} ({})", self.name, self.dosage)
    }

    /// Whole days until `end_date`, clamped at zero; zero when open-ended
    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        self.end_date
            .map(|end| (end - today).num_days().max(0))
            .unwrap_or(0)
    }

    /// Fill in `end_date` from `start_date + duration_days` when it is missing
    pub fn derive_end_date(&mut self) {
        if self.end_date.is_none() && self.duration_days > 0 {
            if let Some(start) = self.start_date {
                self.end_date = Some(start + Duration::days(i64::from(self.duration_days)));
            }
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Fields supplied when adding a medicine
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewMedicine {
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    pub times: [Option<String>; 3],
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_days: u32,
    pub notes: Option<String>,
}

/// Replacement fields for an existing medicine. Dates are only replaced when given.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MedicineUpdate {
    pub name: String,
    pub dosage: String,
    pub times: [Option<String>; 3],
    pub duration_days: u32,
    pub notes: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

// ============================================================================
// Derived views
// ============================================================================

/// One dose on today's schedule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScheduledDose {
    pub medicine_id: MedicineId,
    pub medicine_name: String,
    pub dosage: String,
    pub slot: DoseSlot,
    pub time: String,
    pub taken: bool,
    pub days_remaining: i64,
    pub taken_at: Option<NaiveDateTime>,
}

/// Today's intake counts for one user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySummary {
    pub total_medicines: usize,
    pub total_doses: u32,
    pub taken_doses: u32,
    pub remaining_doses: u32,
    pub completion_percentage: u32,
}

/// Point-in-time adherence for one user; never persisted
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Adherence {
    pub user_id: UserId,
    pub total_doses: u32,
    pub taken_doses: u32,
    pub percentage: f64,
    pub computed_at: NaiveDateTime,
}
