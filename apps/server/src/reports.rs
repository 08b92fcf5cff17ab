//! Read-side aggregation for the admin dashboard. Pure functions over
//! booking snapshots; no invariants of its own beyond filtering and sums.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{BookingDetail, BookingStatus, BookingType, UserProfile};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Breakdown {
    pub label: String,
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportSummary {
    /// Σ (final price, else list price) over completed bookings in range.
    pub total_revenue: i64,
    pub completed_count: i64,
    /// Pending review queue, not limited to the range.
    pub pending_count: i64,
    pub online_count: i64,
    pub walk_in_count: i64,
    pub revenue_by_service: Vec<Breakdown>,
    pub bookings_by_technician: Vec<Breakdown>,
}

/// Inclusive [from, to] date-range check. ISO dates compare correctly as
/// strings.
pub fn in_range(date: &str, from: &str, to: &str) -> bool {
    date >= from && date <= to
}

fn charged(b: &BookingDetail) -> i64 {
    b.final_price.unwrap_or(b.service_price)
}

/// Largest value first, label as the tie-break so output is deterministic.
fn sorted_breakdown(map: BTreeMap<String, i64>) -> Vec<Breakdown> {
    let mut entries: Vec<Breakdown> = map
        .into_iter()
        .map(|(label, value)| Breakdown { label, value })
        .collect();
    entries.sort_by(|a, b| b.value.cmp(&a.value).then(a.label.cmp(&b.label)));
    entries
}

pub fn summarize(
    bookings: &[BookingDetail],
    employees: &[UserProfile],
    from: &str,
    to: &str,
) -> ReportSummary {
    let in_period: Vec<&BookingDetail> = bookings
        .iter()
        .filter(|b| in_range(&b.date, from, to))
        .collect();
    let completed: Vec<&BookingDetail> = in_period
        .iter()
        .copied()
        .filter(|b| b.status == BookingStatus::Completed)
        .collect();

    let total_revenue = completed.iter().map(|b| charged(b)).sum();

    let mut revenue_by_service: BTreeMap<String, i64> = BTreeMap::new();
    for b in &completed {
        // A deleted service already resolved to the placeholder name with
        // price 0 at read time, so it lands in its own zero bucket here.
        *revenue_by_service.entry(b.service_name.clone()).or_default() += charged(b);
    }

    let mut bookings_by_technician: BTreeMap<String, i64> = BTreeMap::new();
    for b in &completed {
        let name = employees
            .iter()
            .find(|e| e.uid == b.employee_id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| "Unknown".into());
        *bookings_by_technician.entry(name).or_default() += 1;
    }

    ReportSummary {
        total_revenue,
        completed_count: completed.len() as i64,
        pending_count: bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Pending)
            .count() as i64,
        online_count: in_period
            .iter()
            .filter(|b| b.booking_type == BookingType::Online)
            .count() as i64,
        walk_in_count: in_period
            .iter()
            .filter(|b| b.booking_type == BookingType::WalkIn)
            .count() as i64,
        revenue_by_service: sorted_breakdown(revenue_by_service),
        bookings_by_technician: sorted_breakdown(bookings_by_technician),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, DELETED_SERVICE_NAME};

    fn make_detail(
        id: i64,
        date: &str,
        status: BookingStatus,
        service_name: &str,
        service_price: i64,
        final_price: Option<i64>,
    ) -> BookingDetail {
        BookingDetail {
            id,
            customer_id: Some("cust-1".into()),
            customer_name: "Nok".into(),
            service_id: 1,
            service_name: service_name.into(),
            service_price,
            employee_id: "emp-a".into(),
            date: date.into(),
            time: "14:00".into(),
            status,
            deposit: 150,
            final_price,
            booking_type: BookingType::Online,
            created_at: format!("{date} 09:00:00"),
            charge_total: final_price.unwrap_or(service_price),
        }
    }

    fn make_technician(uid: &str, name: &str) -> UserProfile {
        UserProfile {
            uid: uid.into(),
            email: format!("{uid}@chailai.example"),
            name: name.into(),
            phone: String::new(),
            line_id: String::new(),
            profile_picture: String::new(),
            role: Role::Technician {
                position: "Nail Artist".into(),
            },
        }
    }

    #[test]
    fn test_in_range_inclusive_bounds() {
        assert!(in_range("2024-06-01", "2024-06-01", "2024-06-30"));
        assert!(in_range("2024-06-30", "2024-06-01", "2024-06-30"));
        assert!(!in_range("2024-05-31", "2024-06-01", "2024-06-30"));
        assert!(!in_range("2024-07-01", "2024-06-01", "2024-06-30"));
    }

    #[test]
    fn test_revenue_counts_only_completed_in_range() {
        let bookings = vec![
            make_detail(1, "2024-06-01", BookingStatus::Completed, "Gel", 500, Some(500)),
            make_detail(2, "2024-06-01", BookingStatus::Completed, "Gel", 500, Some(800)),
            make_detail(3, "2024-07-01", BookingStatus::Completed, "Gel", 500, Some(300)),
        ];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.total_revenue, 1300);
        assert_eq!(summary.completed_count, 2);
    }

    #[test]
    fn test_revenue_falls_back_to_list_price() {
        let bookings = vec![make_detail(
            1,
            "2024-06-10",
            BookingStatus::Completed,
            "Spa",
            350,
            None,
        )];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.total_revenue, 350);
    }

    #[test]
    fn test_non_completed_statuses_earn_nothing() {
        let bookings = vec![
            make_detail(1, "2024-06-10", BookingStatus::Pending, "Gel", 500, None),
            make_detail(2, "2024-06-10", BookingStatus::Confirmed, "Gel", 500, None),
            make_detail(3, "2024-06-10", BookingStatus::Cancelled, "Gel", 500, None),
        ];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.total_revenue, 0);
        assert_eq!(summary.completed_count, 0);
    }

    #[test]
    fn test_pending_count_ignores_range() {
        let bookings = vec![make_detail(
            1,
            "2024-09-15",
            BookingStatus::Pending,
            "Gel",
            500,
            None,
        )];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.pending_count, 1);
    }

    #[test]
    fn test_deleted_service_buckets_at_zero() {
        let bookings = vec![
            make_detail(1, "2024-06-05", BookingStatus::Completed, "Gel", 500, None),
            make_detail(
                2,
                "2024-06-06",
                BookingStatus::Completed,
                DELETED_SERVICE_NAME,
                0,
                None,
            ),
        ];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.total_revenue, 500);

        let deleted = summary
            .revenue_by_service
            .iter()
            .find(|b| b.label == DELETED_SERVICE_NAME)
            .unwrap();
        assert_eq!(deleted.value, 0);
    }

    #[test]
    fn test_revenue_by_service_sorted_desc() {
        let bookings = vec![
            make_detail(1, "2024-06-05", BookingStatus::Completed, "Spa", 350, None),
            make_detail(2, "2024-06-06", BookingStatus::Completed, "Gel", 500, None),
            make_detail(3, "2024-06-07", BookingStatus::Completed, "Gel", 500, None),
        ];
        let summary = summarize(&bookings, &[], "2024-06-01", "2024-06-30");
        assert_eq!(
            summary.revenue_by_service,
            vec![
                Breakdown {
                    label: "Gel".into(),
                    value: 1000
                },
                Breakdown {
                    label: "Spa".into(),
                    value: 350
                },
            ]
        );
    }

    #[test]
    fn test_bookings_by_technician_resolves_names() {
        let mut b1 = make_detail(1, "2024-06-05", BookingStatus::Completed, "Gel", 500, None);
        b1.employee_id = "emp-a".into();
        let mut b2 = make_detail(2, "2024-06-06", BookingStatus::Completed, "Gel", 500, None);
        b2.employee_id = "emp-gone".into();

        let employees = vec![make_technician("emp-a", "Fern")];
        let summary = summarize(&[b1, b2], &employees, "2024-06-01", "2024-06-30");

        assert!(summary
            .bookings_by_technician
            .iter()
            .any(|b| b.label == "Fern" && b.value == 1));
        assert!(summary
            .bookings_by_technician
            .iter()
            .any(|b| b.label == "Unknown" && b.value == 1));
    }

    #[test]
    fn test_online_walk_in_split_counts_all_statuses() {
        let mut online = make_detail(1, "2024-06-05", BookingStatus::Pending, "Gel", 500, None);
        online.booking_type = BookingType::Online;
        let mut walk_in = make_detail(2, "2024-06-06", BookingStatus::Completed, "Gel", 500, None);
        walk_in.booking_type = BookingType::WalkIn;
        let mut outside = make_detail(3, "2024-07-06", BookingStatus::Completed, "Gel", 500, None);
        outside.booking_type = BookingType::WalkIn;

        let summary = summarize(&[online, walk_in, outside], &[], "2024-06-01", "2024-06-30");
        assert_eq!(summary.online_count, 1);
        assert_eq!(summary.walk_in_count, 1);
    }
}
