use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Last calendar day of `month` in `year`, leap years included.
pub fn last_day_of_month(year: i32, month: u32) -> Result<u32> {
    let first = first_of_month(year, month)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::InvalidRequest(format!("date out of range: {year}-{month:02}")))?;

    Ok(next.pred_opt().unwrap_or(first).day())
}

/// MARS date expression covering a whole month, e.g. `2008-02-01/to/2008-02-29`.
pub fn month_date_range(year: i32, month: u32) -> Result<String> {
    let last = last_day_of_month(year, month)?;
    Ok(format!("{year:04}-{month:02}-01/to/{year:04}-{month:02}-{last:02}"))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidRequest(format!(
            "month must be within 1..=12, got {month}"
        )));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidRequest(format!("date out of range: {year}-{month:02}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn february_follows_leap_rules() {
        assert_eq!(last_day_of_month(2008, 2).unwrap(), 29);
        assert_eq!(last_day_of_month(2006, 2).unwrap(), 28);
        assert_eq!(last_day_of_month(2000, 2).unwrap(), 29);
        assert_eq!(last_day_of_month(1900, 2).unwrap(), 28);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(last_day_of_month(2006, 3).unwrap(), 31);
        assert_eq!(last_day_of_month(2006, 4).unwrap(), 30);
        assert_eq!(last_day_of_month(2006, 12).unwrap(), 31);
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(last_day_of_month(2006, 0).is_err());
        assert!(last_day_of_month(2006, 13).is_err());
    }

    #[test]
    fn builds_range_expression() {
        assert_eq!(
            month_date_range(2008, 2).unwrap(),
            "2008-02-01/to/2008-02-29"
        );
        assert_eq!(
            month_date_range(2015, 5).unwrap(),
            "2015-05-01/to/2015-05-31"
        );
    }
}
