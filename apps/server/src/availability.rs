//! Availability index: pure derivations over booking/block snapshots.
//!
//! Everything here is recomputed per request from freshly queried rows.
//! Nothing is cached between dates; the underlying collections are live.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{AvailabilityBlock, Booking, BookingDetail, BookingStatus, UserProfile};
use crate::slots::TIME_SLOTS;

/// Whether a booking in this status claims its (technician, date, time) cell.
/// Cancelled bookings free the cell immediately; completed ones stay on the
/// historical schedule but no longer block forward-looking availability.
pub fn occupies_slot(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Confirmed)
}

#[derive(Debug, Serialize)]
pub struct SlotStatus {
    pub time: &'static str,
    pub unavailable: bool,
}

/// Customer-facing aggregate view for one day, before a technician is chosen.
///
/// A slot is fully booked once the number of occupying bookings plus break
/// blocks reaches the technician headcount. An empty roster counts as one
/// head so a single occupancy marks the slot busy instead of dividing by
/// zero.
pub fn aggregate_day_status(
    bookings: &[Booking],
    blocks: &[AvailabilityBlock],
    date: &str,
    technician_count: usize,
) -> Vec<SlotStatus> {
    let headcount = technician_count.max(1);

    TIME_SLOTS
        .iter()
        .map(|&time| {
            let booked = bookings
                .iter()
                .filter(|b| b.date == date && b.time == time && occupies_slot(b.status))
                .count();
            let blocked = blocks
                .iter()
                .filter(|b| b.date == date && b.time == time)
                .count();
            SlotStatus {
                time,
                unavailable: booked + blocked >= headcount,
            }
        })
        .collect()
}

/// Technicians still free at an exact (date, time) cell: staff minus anyone
/// holding an occupying booking or a break there.
pub fn free_technicians<'a>(
    employees: &'a [UserProfile],
    bookings: &[Booking],
    blocks: &[AvailabilityBlock],
    date: &str,
    time: &str,
) -> Vec<&'a UserProfile> {
    let taken: HashSet<&str> = bookings
        .iter()
        .filter(|b| b.date == date && b.time == time && occupies_slot(b.status))
        .map(|b| b.employee_id.as_str())
        .chain(
            blocks
                .iter()
                .filter(|b| b.date == date && b.time == time)
                .map(|b| b.employee_id.as_str()),
        )
        .collect();

    employees
        .iter()
        .filter(|e| e.role.is_staff() && !taken.contains(e.uid.as_str()))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScheduleItem {
    Booking(BookingDetail),
    Break(AvailabilityBlock),
}

#[derive(Debug, Serialize)]
pub struct ScheduleSlot {
    pub time: &'static str,
    pub item: Option<ScheduleItem>,
}

/// One technician's day laid out over the grid. Bookings keep showing after
/// completion; cancelled ones are expected to be filtered out by the caller's
/// query. A break wins the cell if both somehow exist.
pub fn technician_day_schedule(
    bookings: Vec<BookingDetail>,
    blocks: Vec<AvailabilityBlock>,
) -> Vec<ScheduleSlot> {
    TIME_SLOTS
        .iter()
        .map(|&time| {
            let item = blocks
                .iter()
                .find(|b| b.time == time)
                .map(|b| ScheduleItem::Break(b.clone()))
                .or_else(|| {
                    bookings
                        .iter()
                        .find(|b| b.time == time)
                        .map(|b| ScheduleItem::Booking(b.clone()))
                });
            ScheduleSlot { time, item }
        })
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingType, Role};

    fn make_booking(
        id: i64,
        employee_id: &str,
        date: &str,
        time: &str,
        status: BookingStatus,
    ) -> Booking {
        Booking {
            id,
            customer_id: Some(format!("cust-{id}")),
            customer_name: "Nok".into(),
            service_id: 1,
            employee_id: employee_id.into(),
            date: date.into(),
            time: time.into(),
            status,
            deposit: 150,
            final_price: None,
            booking_type: BookingType::Online,
            created_at: "2024-05-20 09:00:00".into(),
        }
    }

    fn make_block(id: i64, employee_id: &str, date: &str, time: &str) -> AvailabilityBlock {
        AvailabilityBlock {
            id,
            employee_id: employee_id.into(),
            date: date.into(),
            time: time.into(),
            block_type: "break".into(),
        }
    }

    fn make_technician(uid: &str) -> UserProfile {
        UserProfile {
            uid: uid.into(),
            email: format!("{uid}@chailai.example"),
            name: uid.to_uppercase(),
            phone: String::new(),
            line_id: String::new(),
            profile_picture: String::new(),
            role: Role::Technician {
                position: "Nail Artist".into(),
            },
        }
    }

    // ── occupies_slot ──

    #[test]
    fn test_pending_and_confirmed_occupy() {
        assert!(occupies_slot(BookingStatus::Pending));
        assert!(occupies_slot(BookingStatus::Confirmed));
    }

    #[test]
    fn test_cancelled_and_completed_do_not_occupy() {
        assert!(!occupies_slot(BookingStatus::Cancelled));
        assert!(!occupies_slot(BookingStatus::Completed));
    }

    // ── aggregate_day_status ──

    #[test]
    fn test_aggregate_empty_day_all_free() {
        let status = aggregate_day_status(&[], &[], "2024-06-01", 2);
        assert_eq!(status.len(), TIME_SLOTS.len());
        assert!(status.iter().all(|s| !s.unavailable));
    }

    #[test]
    fn test_aggregate_slot_busy_when_headcount_reached() {
        let bookings = vec![
            make_booking(1, "emp-a", "2024-06-01", "14:00", BookingStatus::Confirmed),
            make_booking(2, "emp-b", "2024-06-01", "14:00", BookingStatus::Pending),
        ];
        let status = aggregate_day_status(&bookings, &[], "2024-06-01", 2);
        let at_14 = status.iter().find(|s| s.time == "14:00").unwrap();
        assert!(at_14.unavailable);
        let at_15 = status.iter().find(|s| s.time == "15:00").unwrap();
        assert!(!at_15.unavailable);
    }

    #[test]
    fn test_aggregate_one_of_two_technicians_busy_is_still_free() {
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Confirmed,
        )];
        let status = aggregate_day_status(&bookings, &[], "2024-06-01", 2);
        assert!(!status.iter().find(|s| s.time == "14:00").unwrap().unavailable);
    }

    #[test]
    fn test_aggregate_blocks_count_toward_capacity() {
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Confirmed,
        )];
        let blocks = vec![make_block(1, "emp-b", "2024-06-01", "14:00")];
        let status = aggregate_day_status(&bookings, &blocks, "2024-06-01", 2);
        assert!(status.iter().find(|s| s.time == "14:00").unwrap().unavailable);
    }

    #[test]
    fn test_aggregate_cancelled_frees_the_slot() {
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Cancelled,
        )];
        let status = aggregate_day_status(&bookings, &[], "2024-06-01", 1);
        assert!(!status.iter().find(|s| s.time == "14:00").unwrap().unavailable);
    }

    #[test]
    fn test_aggregate_zero_technicians_counts_as_one_head() {
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Pending,
        )];
        let status = aggregate_day_status(&bookings, &[], "2024-06-01", 0);
        assert!(status.iter().find(|s| s.time == "14:00").unwrap().unavailable);
        assert!(!status.iter().find(|s| s.time == "15:00").unwrap().unavailable);
    }

    #[test]
    fn test_aggregate_other_day_ignored() {
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-02",
            "14:00",
            BookingStatus::Confirmed,
        )];
        let status = aggregate_day_status(&bookings, &[], "2024-06-01", 1);
        assert!(status.iter().all(|s| !s.unavailable));
    }

    // ── free_technicians ──

    #[test]
    fn test_free_technicians_excludes_booked() {
        let employees = vec![make_technician("emp-a"), make_technician("emp-b")];
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Pending,
        )];
        let free = free_technicians(&employees, &bookings, &[], "2024-06-01", "14:00");
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].uid, "emp-b");
    }

    #[test]
    fn test_free_technicians_excludes_on_break() {
        let employees = vec![make_technician("emp-a"), make_technician("emp-b")];
        let blocks = vec![make_block(1, "emp-b", "2024-06-01", "14:00")];
        let free = free_technicians(&employees, &[], &blocks, "2024-06-01", "14:00");
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].uid, "emp-a");
    }

    #[test]
    fn test_free_technicians_cancelled_booking_does_not_exclude() {
        let employees = vec![make_technician("emp-a")];
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "14:00",
            BookingStatus::Cancelled,
        )];
        let free = free_technicians(&employees, &bookings, &[], "2024-06-01", "14:00");
        assert_eq!(free.len(), 1);
    }

    #[test]
    fn test_free_technicians_other_slot_does_not_exclude() {
        let employees = vec![make_technician("emp-a")];
        let bookings = vec![make_booking(
            1,
            "emp-a",
            "2024-06-01",
            "15:00",
            BookingStatus::Confirmed,
        )];
        let free = free_technicians(&employees, &bookings, &[], "2024-06-01", "14:00");
        assert_eq!(free.len(), 1);
    }

    #[test]
    fn test_free_technicians_customers_never_offered() {
        let mut customer = make_technician("cust-1");
        customer.role = Role::Customer;
        let employees = vec![customer, make_technician("emp-a")];
        let free = free_technicians(&employees, &[], &[], "2024-06-01", "14:00");
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].uid, "emp-a");
    }

    // ── technician_day_schedule ──

    fn make_detail(id: i64, time: &str, status: BookingStatus) -> BookingDetail {
        BookingDetail {
            id,
            customer_id: None,
            customer_name: "Ploy".into(),
            service_id: 1,
            service_name: "Gel Polish".into(),
            service_price: 500,
            employee_id: "emp-a".into(),
            date: "2024-06-01".into(),
            time: time.into(),
            status,
            deposit: 150,
            final_price: None,
            booking_type: BookingType::WalkIn,
            created_at: "2024-06-01 09:30:00".into(),
            charge_total: 500,
        }
    }

    #[test]
    fn test_schedule_covers_whole_grid() {
        let schedule = technician_day_schedule(vec![], vec![]);
        assert_eq!(schedule.len(), TIME_SLOTS.len());
        assert!(schedule.iter().all(|s| s.item.is_none()));
    }

    #[test]
    fn test_schedule_places_booking_and_break() {
        let bookings = vec![make_detail(1, "14:00", BookingStatus::Confirmed)];
        let blocks = vec![make_block(7, "emp-a", "2024-06-01", "12:00")];
        let schedule = technician_day_schedule(bookings, blocks);

        let at_14 = schedule.iter().find(|s| s.time == "14:00").unwrap();
        assert!(matches!(at_14.item, Some(ScheduleItem::Booking(_))));

        let at_12 = schedule.iter().find(|s| s.time == "12:00").unwrap();
        assert!(matches!(at_12.item, Some(ScheduleItem::Break(_))));

        let at_10 = schedule.iter().find(|s| s.time == "10:00").unwrap();
        assert!(at_10.item.is_none());
    }

    #[test]
    fn test_schedule_keeps_completed_visible() {
        let bookings = vec![make_detail(1, "10:00", BookingStatus::Completed)];
        let schedule = technician_day_schedule(bookings, vec![]);
        let at_10 = schedule.iter().find(|s| s.time == "10:00").unwrap();
        assert!(matches!(at_10.item, Some(ScheduleItem::Booking(_))));
    }
}
