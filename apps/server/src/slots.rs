use crate::error::{ApiError, ApiResult};

/// Bookable start times, identical every day. One slot per hour from
/// opening (10:00) to the last appointment (19:00). These strings are the
/// slot keys used everywhere: in the database, in availability maps and in
/// API payloads. Comparison is plain string equality.
pub const TIME_SLOTS: [&str; 10] = [
    "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00", "18:00", "19:00",
];

pub fn is_valid_slot(time: &str) -> bool {
    TIME_SLOTS.contains(&time)
}

/// Validate a (date, time) pair from a request: the date must parse as
/// `YYYY-MM-DD` and the time must be one of the grid slots.
pub fn validate_cell(date: &str, time: &str) -> ApiResult<()> {
    if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Err(ApiError::Validation("รูปแบบวันที่ไม่ถูกต้อง".into()));
    }
    if !is_valid_slot(time) {
        return Err(ApiError::Validation("เวลาที่เลือกไม่อยู่ในช่วงเวลาทำการ".into()));
    }
    Ok(())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_is_hourly_open_to_close() {
        assert_eq!(TIME_SLOTS.len(), 10);
        assert_eq!(TIME_SLOTS[0], "10:00");
        assert_eq!(TIME_SLOTS[9], "19:00");
    }

    #[test]
    fn test_grid_is_sorted() {
        let mut sorted = TIME_SLOTS.to_vec();
        sorted.sort();
        assert_eq!(sorted, TIME_SLOTS);
    }

    #[test]
    fn test_valid_slot() {
        assert!(is_valid_slot("14:00"));
        assert!(is_valid_slot("10:00"));
    }

    #[test]
    fn test_invalid_slot_half_hour() {
        assert!(!is_valid_slot("14:30"));
    }

    #[test]
    fn test_invalid_slot_out_of_hours() {
        assert!(!is_valid_slot("09:00"));
        assert!(!is_valid_slot("20:00"));
    }

    #[test]
    fn test_validate_cell_ok() {
        assert!(validate_cell("2024-06-01", "14:00").is_ok());
    }

    #[test]
    fn test_validate_cell_bad_date() {
        assert!(validate_cell("01/06/2024", "14:00").is_err());
        assert!(validate_cell("2024-13-01", "14:00").is_err());
    }

    #[test]
    fn test_validate_cell_bad_time() {
        assert!(validate_cell("2024-06-01", "14:15").is_err());
    }
}
