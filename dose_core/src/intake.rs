//! Boundary operations over medicine records.
//!
//! These are what a front end calls: toggling a dose, managing medicines,
//! and reading today's schedule. Each operation is a single
//! read-modify-write against the store; two overlapping toggles of the same
//! record resolve as last write wins.

use crate::adherence::count_doses;
use crate::time::parse_time_of_day;
use crate::{
    DailySummary, DoseSlot, Error, Medicine, MedicineId, MedicineStore, MedicineUpdate,
    NewMedicine, Result, ScheduledDose, SlotState, UserId,
};
use chrono::NaiveDateTime;

/// Flip one slot's taken flag, stamp `last_taken_at`, persist
pub fn toggle_slot(
    store: &dyn MedicineStore,
    id: MedicineId,
    slot: DoseSlot,
    now: NaiveDateTime,
) -> Result<Medicine> {
    let mut medicine = store.find_by_id(id)?.ok_or(Error::NotFound(id))?;
    let taken = medicine.toggle(slot, now);
    store.save(&medicine)?;
    tracing::info!(medicine_id = %id, %slot, taken, "Toggled dose");
    Ok(medicine)
}

fn slots_from(times: &[Option<String>; 3]) -> Result<[SlotState; 3]> {
    let mut slots: [SlotState; 3] = Default::default();
    for (slot, time) in slots.iter_mut().zip(times) {
        let time = time.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if let Some(time) = time {
            parse_time_of_day(time)
                .map_err(|_| Error::Validation(format!("time {:?} is not HH:mm", time)))?;
            *slot = SlotState::at(time);
        }
    }
    Ok(slots)
}

fn validate_window(medicine: &Medicine) -> Result<()> {
    if let (Some(start), Some(end)) = (medicine.start_date, medicine.end_date) {
        if end < start {
            return Err(Error::Validation(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
    }
    Ok(())
}

/// Create an active medicine
///
/// At least one numbered slot is required. The start date defaults to today
/// and a missing end date is derived from the duration.
pub fn add_medicine(
    store: &dyn MedicineStore,
    new: NewMedicine,
    now: NaiveDateTime,
) -> Result<Medicine> {
    if new.name.trim().is_empty() {
        return Err(Error::Validation("medicine name is required".into()));
    }

    let slots = slots_from(&new.times)?;
    if !slots.iter().any(SlotState::is_used) {
        return Err(Error::Validation(
            "at least one time slot must be provided".into(),
        ));
    }

    let mut medicine = Medicine::new(new.user_id, new.name, new.dosage);
    medicine.slots = slots;
    medicine.start_date = Some(new.start_date.unwrap_or_else(|| now.date()));
    medicine.end_date = new.end_date;
    medicine.duration_days = new.duration_days;
    medicine.notes = new.notes;
    medicine.derive_end_date();
    validate_window(&medicine)?;

    store.save(&medicine)?;
    tracing::info!(medicine_id = %medicine.id, user_id = medicine.user_id, "Added medicine {}", medicine.name);
    Ok(medicine)
}

/// Replace a medicine's schedule fields; dates change only when supplied
///
/// Taken flags of slots whose time stays set are kept.
pub fn update_medicine(
    store: &dyn MedicineStore,
    id: MedicineId,
    update: MedicineUpdate,
) -> Result<Medicine> {
    let mut medicine = store.find_by_id(id)?.ok_or(Error::NotFound(id))?;

    let mut slots = slots_from(&update.times)?;
    for (new, old) in slots.iter_mut().zip(medicine.slots.iter()) {
        new.taken = new.is_used() && old.taken;
    }

    medicine.name = update.name;
    medicine.dosage = update.dosage;
    medicine.slots = slots;
    medicine.duration_days = update.duration_days;
    medicine.notes = update.notes;
    if update.start_date.is_some() {
        medicine.start_date = update.start_date;
    }
    if update.end_date.is_some() {
        medicine.end_date = update.end_date;
    }
    validate_window(&medicine)?;

    store.save(&medicine)?;
    tracing::info!(medicine_id = %id, "Updated medicine");
    Ok(medicine)
}

/// Remove a medicine; deleting an unknown id is not an error
pub fn delete_medicine(store: &dyn MedicineStore, id: MedicineId) -> Result<()> {
    if store.delete(id)? {
        tracing::info!(medicine_id = %id, "Deleted medicine");
    }
    Ok(())
}

fn medicines_for_today(
    store: &dyn MedicineStore,
    user_id: UserId,
    now: NaiveDateTime,
) -> Result<Vec<Medicine>> {
    let today = now.date();
    Ok(store
        .load_by_user(user_id)?
        .into_iter()
        .filter(|m| m.is_due_on(today))
        .collect())
}

/// Today's doses for a user, one per set numbered slot, sorted by time
pub fn todays_schedule(
    store: &dyn MedicineStore,
    user_id: UserId,
    now: NaiveDateTime,
) -> Result<Vec<ScheduledDose>> {
    let today = now.date();
    let mut doses = Vec::new();

    for medicine in medicines_for_today(store, user_id, now)? {
        let days_remaining = medicine.days_remaining(today);
        for slot in DoseSlot::NUMBERED {
            let state = medicine.slot(slot);
            let Some(time) = state.scheduled_time() else {
                continue;
            };
            doses.push(ScheduledDose {
                medicine_id: medicine.id,
                medicine_name: medicine.name.clone(),
                dosage: medicine.dosage.clone(),
                slot,
                time: time.to_string(),
                taken: state.taken,
                days_remaining,
                taken_at: medicine.last_taken_at.filter(|_| state.taken),
            });
        }
    }

    doses.sort_by(|a, b| a.time.cmp(&b.time));
    Ok(doses)
}

/// Doses on today's schedule not yet taken
pub fn upcoming_reminders(
    store: &dyn MedicineStore,
    user_id: UserId,
    now: NaiveDateTime,
) -> Result<Vec<ScheduledDose>> {
    Ok(todays_schedule(store, user_id, now)?
        .into_iter()
        .filter(|dose| !dose.taken)
        .collect())
}

/// Today's intake counts
///
/// `total_medicines` counts every active medicine of the user; doses are
/// counted over the ones in their date window today.
pub fn daily_summary(
    store: &dyn MedicineStore,
    user_id: UserId,
    now: NaiveDateTime,
) -> Result<DailySummary> {
    let today = now.date();
    let active: Vec<_> = store
        .load_by_user(user_id)?
        .into_iter()
        .filter(|m| m.active)
        .collect();
    let (total_doses, taken_doses) =
        count_doses(active.iter().filter(|m| m.is_in_window(today)));

    Ok(DailySummary {
        total_medicines: active.len(),
        total_doses,
        taken_doses,
        remaining_doses: total_doses - taken_doses,
        completion_percentage: if total_doses > 0 {
            taken_doses * 100 / total_doses
        } else {
            0
        },
    })
}
