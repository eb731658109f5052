//! The month-by-month download loop.
//!
//! One file per (year, month) is requested from the service. A file already
//! present in the output directory is taken as downloaded and never
//! requested again, so an interrupted run resumes by simply running it again.
//! A truncated file left by a killed process is also skipped.

use std::fs;
use std::path::{Path, PathBuf};

use crate::client::Retrieve;
use crate::config::Config;
use crate::date::month_date_range;
use crate::error::{Error, Result};
use crate::request::{Request, RequestValue};

// Fixed keywords selecting the TIGGE control forecast at surface level.
pub const CLASS: &str = "ti";
pub const DATASET: &str = "tigge";
pub const EXPVER: &str = "prod";
pub const GRID: &str = "0.5/0.5";
pub const LEVTYPE: &str = "sfc";
pub const ORIGIN: &str = "ecmf";
pub const FORECAST_TYPE: &str = "cf";

/// `tigge_param_<param>_<year>_<MM>.grib`
pub fn file_name(param: &str, year: i32, month: u32) -> String {
    format!("tigge_param_{param}_{year:04}_{month:02}.grib")
}

/// What one iteration asks for and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub year: i32,
    pub month: u32,
    pub date_range: String,
    pub file_name: String,
    pub path: PathBuf,
}

impl Target {
    pub fn new(config: &Config, year: i32, month: u32) -> Result<Self> {
        let date_range = month_date_range(year, month)?;
        let file_name = file_name(&config.param, year, month);
        let path = config.output_dir.join(&file_name);
        Ok(Self {
            year,
            month,
            date_range,
            file_name,
            path,
        })
    }

    pub fn request(&self, config: &Config) -> Request {
        Request::new()
            .class(CLASS)
            .dataset(DATASET)
            .date(&self.date_range)
            .expver(EXPVER)
            .grid(GRID)
            .area(&config.area)
            .levtype(LEVTYPE)
            .origin(ORIGIN)
            .param(&config.param)
            .step(RequestValue::slash_list(&config.step))
            .time(RequestValue::slash_list(&config.time))
            .r#type(FORECAST_TYPE)
            .target(&self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file was already on disk; the service was not contacted.
    Skipped,
    Downloaded,
    /// The service reported a failure; carries its message.
    ServiceFailed(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub year: i32,
    pub month: u32,
    pub file_name: String,
    pub outcome: Outcome,
}

/// Create `dir` (and parents) if missing. Returns whether it was created.
pub fn prepare_output_dir(dir: &Path) -> Result<bool> {
    if dir.exists() {
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    tracing::info!("Created directory: {}", dir.display());
    Ok(true)
}

/// Prepare the output directory, then download every month of `config`.
pub fn run<R: Retrieve + ?Sized>(config: &Config, client: &R) -> Result<Vec<Attempt>> {
    prepare_output_dir(&config.output_dir)?;
    Ok(download_all(config, client))
}

/// Walk years × months. Per-file failures are reported and never stop the loop.
pub fn download_all<R: Retrieve + ?Sized>(config: &Config, client: &R) -> Vec<Attempt> {
    let mut attempts = Vec::new();
    for (year, month) in config.pairs() {
        let outcome = match Target::new(config, year, month) {
            Ok(target) => download_one(config, client, &target),
            Err(e) => {
                tracing::error!("-> Cannot build request for {year}-{month:02}: {e}");
                Outcome::Failed(e.to_string())
            }
        };
        attempts.push(Attempt {
            year,
            month,
            file_name: file_name(&config.param, year, month),
            outcome,
        });
    }
    tracing::info!("All requested downloads are complete!");
    attempts
}

pub fn download_one<R: Retrieve + ?Sized>(
    config: &Config,
    client: &R,
    target: &Target,
) -> Outcome {
    let name = &target.file_name;
    if target.path.exists() {
        tracing::info!("Skipping already downloaded file: {name}");
        return Outcome::Skipped;
    }

    tracing::info!("Requesting GRIB file: {name}");
    match client.retrieve(&target.request(config)) {
        Ok(()) => {
            tracing::info!("-> Successfully downloaded {name}");
            Outcome::Downloaded
        }
        Err(Error::Service(msg)) => {
            tracing::warn!("-> FAILED to download {name}. Server error: {msg}");
            tracing::warn!("   This may be a server-side issue. Skipping to the next file.");
            Outcome::ServiceFailed(msg)
        }
        Err(e) => {
            tracing::error!("-> An unexpected error occurred for {name}: {e}");
            Outcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_pad_the_month() {
        assert_eq!(file_name("167", 2006, 3), "tigge_param_167_2006_03.grib");
        assert_eq!(file_name("167", 2006, 11), "tigge_param_167_2006_11.grib");
    }

    #[test]
    fn file_name_and_date_range_agree_on_year_width() {
        assert_eq!(file_name("167", 999, 1), "tigge_param_167_0999_01.grib");
        let t = Target::new(&Config::default(), 999, 1).unwrap();
        assert_eq!(t.date_range, "0999-01-01/to/0999-01-31");
        assert!(t.file_name.contains("_0999_"));
    }

    #[test]
    fn target_covers_the_whole_month() {
        let config = Config {
            output_dir: PathBuf::from("data"),
            ..Config::default()
        };
        let t = Target::new(&config, 2008, 2).unwrap();
        assert_eq!(t.date_range, "2008-02-01/to/2008-02-29");
        assert_eq!(t.path, Path::new("data").join("tigge_param_167_2008_02.grib"));
    }

    #[test]
    fn request_carries_fixed_and_configured_keywords() {
        let config = Config::default();
        let t = Target::new(&config, 2006, 3).unwrap();
        let r = t.request(&config);

        let s = |k: &str| r.get(k).map(RequestValue::to_mars);
        assert_eq!(s("class").as_deref(), Some("ti"));
        assert_eq!(s("dataset").as_deref(), Some("tigge"));
        assert_eq!(s("date").as_deref(), Some("2006-03-01/to/2006-03-31"));
        assert_eq!(s("expver").as_deref(), Some("prod"));
        assert_eq!(s("grid").as_deref(), Some("0.5/0.5"));
        assert_eq!(s("area").as_deref(), Some("27/88/20/93"));
        assert_eq!(s("levtype").as_deref(), Some("sfc"));
        assert_eq!(s("origin").as_deref(), Some("ecmf"));
        assert_eq!(s("param").as_deref(), Some("167"));
        assert_eq!(s("step").as_deref(), Some("0/6/12/18/24"));
        assert!(matches!(r.get("step"), Some(RequestValue::StrList(xs)) if xs.len() == 5));
        assert_eq!(s("time").as_deref(), Some("00:00:00/12:00:00"));
        assert_eq!(s("type").as_deref(), Some("cf"));
        assert_eq!(r.target_path(), Some(t.path.as_path()));
    }

    #[test]
    fn creates_missing_directory_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        assert!(prepare_output_dir(&dir).unwrap());
        assert!(dir.is_dir());
        assert!(!prepare_output_dir(&dir).unwrap());
    }
}
