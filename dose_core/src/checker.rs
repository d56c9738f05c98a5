//! Per-medicine due check.
//!
//! A dose is due when its slot is set, not yet taken today, and `now` lies
//! within the tolerance band around today's occurrence of the slot's time. Due doses put the
//! medicine's reminder into the notification queue. The medicine itself is
//! never modified here.

use crate::time::{is_within_tolerance, parse_time_of_day};
use crate::{DoseSlot, Medicine, NotificationQueue};
use chrono::{Duration, NaiveDateTime};

/// Default half-width of the due band
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 5;

/// Slots of `medicine` that are due at `now`
pub fn due_slots(medicine: &Medicine, now: NaiveDateTime, tolerance: Duration) -> Vec<DoseSlot> {
    let mut due = Vec::new();

    for (slot, state) in medicine.dose_slots() {
        if state.taken {
            continue;
        }
        let Some(time) = state.scheduled_time() else {
            continue;
        };

        match parse_time_of_day(time) {
            Ok(scheduled) => {
                if is_within_tolerance(scheduled, now, tolerance) {
                    due.push(slot);
                }
            }
            Err(e) => {
                tracing::warn!(
                    medicine_id = %medicine.id,
                    %slot,
                    "Skipping slot: {}",
                    e
                );
            }
        }
    }

    due
}

/// Check one medicine and queue its reminder if any slot is due
///
/// Returns whether a reminder was queued.
pub fn check_medicine(
    medicine: &Medicine,
    now: NaiveDateTime,
    tolerance: Duration,
    queue: &NotificationQueue,
) -> bool {
    let due = due_slots(medicine, now, tolerance);
    if due.is_empty() {
        return false;
    }

    let message = medicine.reminder_message();
    tracing::info!(
        medicine_id = %medicine.id,
        slots = ?due,
        "Queued notification: {}",
        message
    );
    queue.put(medicine.id, message);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SlotState;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tolerance() -> Duration {
        Duration::minutes(DEFAULT_TOLERANCE_MINUTES)
    }

    fn medicine_at(time: &str) -> Medicine {
        let mut med = Medicine::new(1, "Lisinopril", "10mg");
        med.slots[0] = SlotState::at(time);
        med
    }

    #[test]
    fn test_due_at_scheduled_time() {
        let med = medicine_at("08:00");
        let queue = NotificationQueue::new();

        assert!(check_medicine(&med, at(8, 0), tolerance(), &queue));
        assert_eq!(
            queue.get(med.id).as_deref(),
            Some("Time to take Lisinopril (10mg)")
        );
    }

    #[test]
    fn test_not_due_six_minutes_either_side() {
        let med = medicine_at("08:00");
        let queue = NotificationQueue::new();

        assert!(!check_medicine(&med, at(8, 6), tolerance(), &queue));
        assert!(!check_medicine(&med, at(7, 54), tolerance(), &queue));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_late_evening_slot_not_due_after_midnight() {
        let med = medicine_at("23:58");
        let queue = NotificationQueue::new();

        let after_midnight = at(0, 2) + Duration::days(1);
        assert!(!check_medicine(&med, after_midnight, tolerance(), &queue));
        assert!(!check_medicine(&med, at(0, 2), tolerance(), &queue));
        assert!(queue.is_empty());

        assert!(check_medicine(&med, at(23, 59), tolerance(), &queue));
    }

    #[test]
    fn test_taken_slot_never_due() {
        let mut med = medicine_at("08:00");
        med.slots[0].taken = true;
        let queue = NotificationQueue::new();

        for minute in 0..60 {
            assert!(!check_medicine(&med, at(8, minute), tolerance(), &queue));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_other_slot_still_due_when_one_taken() {
        let mut med = medicine_at("08:00");
        med.slots[0].taken = true;
        med.slots[2] = SlotState::at("20:00");

        assert_eq!(
            due_slots(&med, at(20, 3), tolerance()),
            vec![DoseSlot::Third]
        );
    }

    #[test]
    fn test_malformed_time_is_skipped() {
        crate::logging::init_test();
        let mut med = medicine_at("eight o'clock");
        med.slots[1] = SlotState::at("12:00");

        assert!(due_slots(&med, at(8, 0), tolerance()).is_empty());
        assert_eq!(due_slots(&med, at(12, 0), tolerance()), vec![DoseSlot::Second]);
    }

    #[test]
    fn test_legacy_slot_used_only_without_numbered_slots() {
        let mut med = Medicine::new(1, "Old Record", "1 tab");
        med.legacy = SlotState::at("09:00");
        assert_eq!(due_slots(&med, at(9, 0), tolerance()), vec![DoseSlot::Legacy]);

        med.slots[0] = SlotState::at("18:00");
        assert!(due_slots(&med, at(9, 0), tolerance()).is_empty());
    }
}
