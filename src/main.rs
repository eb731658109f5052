use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tigge_download::config::{self, Config};
use tigge_download::{ClientOptions, Credentials, DataServer, downloader};
use tracing_subscriber::EnvFilter;

/// Download TIGGE control forecasts from the ECMWF Web API, one GRIB file per month.
///
/// Files already present in the output directory are skipped.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// First year to download (inclusive)
    #[arg(long, default_value_t = config::START_YEAR)]
    start_year: i32,

    /// Last year to download (inclusive)
    #[arg(long, default_value_t = config::END_YEAR)]
    end_year: i32,

    /// Comma separated months, requested in this order
    #[arg(long, default_value = "3,4,5")]
    months: String,

    /// Bounding box as North/West/South/East
    #[arg(long, default_value = config::AREA)]
    area: String,

    /// Parameter id, e.g. 167 for 2 metre temperature
    #[arg(long, default_value = config::PARAM)]
    param: String,

    /// Slash separated times of day
    #[arg(long, default_value = config::TIME)]
    time: String,

    /// Slash separated forecast steps in hours
    #[arg(long, default_value = config::STEP)]
    step: String,

    /// Where GRIB files are written
    #[arg(long, default_value = config::OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Credentials file used when ECMWF_API_KEY/ECMWF_API_EMAIL are unset
    /// (defaults to ~/.ecmwfapirc)
    #[arg(long)]
    rc_file: Option<PathBuf>,
}

impl Cli {
    fn to_config(&self) -> anyhow::Result<Config> {
        let config = Config {
            start_year: self.start_year,
            end_year: self.end_year,
            months: config::parse_months(&self.months)?,
            area: self.area.clone(),
            param: self.param.clone(),
            time: self.time.clone(),
            step: self.step.clone(),
            output_dir: self.output_dir.clone(),
        };
        Ok(config.validate()?)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .with_target(false)
        .init();
}

fn print_banner(config: &Config) {
    tracing::info!("--- ECMWF TIGGE Data Downloader ---");
    tracing::info!("Starting download with the following configuration:");
    tracing::info!("  Years:       {} to {}", config.start_year, config.end_year);
    tracing::info!("  Months:      {:?}", config.months);
    tracing::info!("  Area:        {}", config.area);
    tracing::info!("  Parameter:   {}", config.param);
    tracing::info!("  Time:        {}", config.time);
    tracing::info!("  Step:        {}", config.step);
    tracing::info!("  Output Dir:  {}", config.output_dir.display());
    tracing::info!("{}", "-".repeat(35));
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = cli.to_config().context("invalid configuration")?;
    print_banner(&config);

    downloader::prepare_output_dir(&config.output_dir).with_context(|| {
        format!("cannot create output directory {}", config.output_dir.display())
    })?;

    let creds = Credentials::resolve(cli.rc_file.as_deref()).context("no ECMWF API credentials")?;
    let server = DataServer::new(ClientOptions::from_credentials(creds))
        .context("cannot set up ECMWF API client")?;
    tracing::debug!(url = %server.base_url(), "client ready");

    // Per-file failures are already reported; the run itself succeeded.
    let _ = downloader::download_all(&config, &server);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let cli = Cli::parse_from(["tigge-download"]);
        assert_eq!(cli.to_config().unwrap(), Config::default());
    }

    #[test]
    fn overrides_apply() {
        let cli = Cli::parse_from([
            "tigge-download",
            "--start-year",
            "2010",
            "--end-year",
            "2011",
            "--months",
            "12,1",
            "--output-dir",
            "/tmp/tigge",
        ]);
        let c = cli.to_config().unwrap();
        assert_eq!(
            c.pairs().collect::<Vec<_>>(),
            vec![(2010, 12), (2010, 1), (2011, 12), (2011, 1)]
        );
        assert_eq!(c.output_dir, PathBuf::from("/tmp/tigge"));
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        let cli = Cli::parse_from(["tigge-download", "--months", "4,4"]);
        assert!(cli.to_config().is_err());
    }
}
