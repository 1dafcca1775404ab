//! Utility functions for the price_oracle crate

use crate::error::{OracleError, Result};
use chrono::{Days, NaiveDate};

/// Day `offset` days after the as-of anchor
pub fn forecast_date(anchor: NaiveDate, offset: usize) -> Result<NaiveDate> {
    anchor
        .checked_add_days(Days::new(offset as u64))
        .ok_or_else(|| {
            OracleError::ValidationError(format!(
                "Forecast date out of range: {} + {} days",
                anchor, offset
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_date_cross_month_end() {
        let anchor = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let dates: Vec<NaiveDate> = (1..=3).map(|o| forecast_date(anchor, o).unwrap()).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
            ]
        );
    }

    #[test]
    fn test_forecast_date_overflow() {
        assert!(forecast_date(NaiveDate::MAX, 1).is_err());
    }
}
