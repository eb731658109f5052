#![forbid(unsafe_code)]

//! Month-by-month downloader for the TIGGE forecast archive.
//!
//! The archive is served by the ECMWF Web API. For every (year, month) of a
//! [`Config`] one MARS-like request is submitted and its GRIB result written
//! to `tigge_param_<param>_<year>_<MM>.grib` in the output directory. Files
//! that already exist are skipped, so re-running resumes where a previous run
//! stopped.
//!
//! ```no_run
//! use tigge_download::{ClientOptions, Config, Credentials, DataServer, downloader};
//!
//! let config = Config {
//!     start_year: 2006,
//!     end_year: 2007,
//!     months: vec![3, 4],
//!     ..Config::default()
//! }
//! .validate()?;
//!
//! let creds = Credentials::resolve(None)?;
//! let server = DataServer::new(ClientOptions::from_credentials(creds))?;
//! for attempt in downloader::run(&config, &server)? {
//!     println!("{} {:?}", attempt.file_name, attempt.outcome);
//! }
//! # Ok::<(), tigge_download::Error>(())
//! ```
//!
//! Notes:
//! - Requests are sent one at a time; the service queues them on its side.
//! - A failed file is not retried within a run. Running again retries it.

mod client;
pub mod config;
mod credentials;
mod date;
pub mod downloader;
mod error;
mod request;

pub use crate::client::{ClientOptions, DataServer, Retrieve};
pub use crate::config::Config;
pub use crate::credentials::Credentials;
pub use crate::date::{last_day_of_month, month_date_range};
pub use crate::downloader::{Attempt, Outcome, Target};
pub use crate::error::{Error, Result};
pub use crate::request::{Request, RequestValue};
