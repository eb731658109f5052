use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const START_YEAR: i32 = 2006;
pub const END_YEAR: i32 = 2015;
pub const MONTHS: [u32; 3] = [3, 4, 5];
/// North/West/South/East.
pub const AREA: &str = "27/88/20/93";
/// 2 metre temperature.
pub const PARAM: &str = "167";
pub const TIME: &str = "00:00:00/12:00:00";
pub const STEP: &str = "0/6/12/18/24";
pub const OUTPUT_DIR: &str = "ECMWF_Data";

/// Everything one run needs to know. Built once, then only borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub start_year: i32,
    pub end_year: i32,
    pub months: Vec<u32>,
    pub area: String,
    pub param: String,
    pub time: String,
    pub step: String,
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            start_year: START_YEAR,
            end_year: END_YEAR,
            months: MONTHS.to_vec(),
            area: AREA.to_string(),
            param: PARAM.to_string(),
            time: TIME.to_string(),
            step: STEP.to_string(),
            output_dir: PathBuf::from(OUTPUT_DIR),
        }
    }
}

impl Config {
    /// Check the invariants the download loop relies on.
    pub fn validate(self) -> Result<Self> {
        if self.start_year > self.end_year {
            return Err(Error::Config(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        if self.months.is_empty() {
            return Err(Error::Config("month list is empty".into()));
        }
        let mut seen = BTreeSet::new();
        for &m in &self.months {
            if !(1..=12).contains(&m) {
                return Err(Error::Config(format!("month {m} is not within 1..=12")));
            }
            if !seen.insert(m) {
                return Err(Error::Config(format!("month {m} is listed twice")));
            }
        }
        if self.area.split('/').count() != 4 {
            return Err(Error::Config(format!(
                "area must be North/West/South/East, got {:?}",
                self.area
            )));
        }
        for (name, value) in [("param", &self.param), ("time", &self.time), ("step", &self.step)] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} is empty")));
            }
        }
        Ok(self)
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.start_year..=self.end_year
    }

    /// Years ascending, months in configured order.
    pub fn pairs(&self) -> impl Iterator<Item = (i32, u32)> + '_ {
        self.years()
            .flat_map(move |y| self.months.iter().map(move |&m| (y, m)))
    }
}

/// Parse a comma separated month list such as `3,4,5`.
pub fn parse_months(s: &str) -> Result<Vec<u32>> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<u32>()
                .map_err(|_| Error::Config(format!("invalid month: {t:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Config {
        Config {
            start_year: 2006,
            end_year: 2007,
            months: vec![3, 4],
            ..Config::default()
        }
    }

    #[test]
    fn defaults_validate() {
        let c = Config::default().validate().unwrap();
        assert_eq!(c.pairs().count(), 30);
    }

    #[test]
    fn pairs_are_years_then_months() {
        let pairs: Vec<_> = small().pairs().collect();
        assert_eq!(pairs, vec![(2006, 3), (2006, 4), (2007, 3), (2007, 4)]);
    }

    #[test]
    fn month_order_is_preserved() {
        let c = Config {
            start_year: 2010,
            end_year: 2010,
            months: vec![12, 1],
            ..Config::default()
        };
        assert_eq!(c.pairs().collect::<Vec<_>>(), vec![(2010, 12), (2010, 1)]);
    }

    #[test]
    fn rejects_reversed_years() {
        let c = Config {
            start_year: 2010,
            end_year: 2009,
            ..Config::default()
        };
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_bad_months() {
        for months in [vec![], vec![0], vec![13], vec![3, 3]] {
            let c = Config {
                months,
                ..Config::default()
            };
            assert!(c.validate().is_err());
        }
    }

    #[test]
    fn rejects_malformed_area() {
        let c = Config {
            area: "27/88/20".into(),
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn parses_month_lists() {
        assert_eq!(parse_months("3,4,5").unwrap(), vec![3, 4, 5]);
        assert_eq!(parse_months(" 12 , 1 ").unwrap(), vec![12, 1]);
        assert!(parse_months("3,x").is_err());
    }
}
