use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use ratewatch::config::{
    ConfigError, DEFAULT_OUTPUT_DIR, EmailSettings, MAX_HORIZON_DAYS, RunConfig,
    load_competitors,
};
use ratewatch::export::export_csv;
use ratewatch::notify::EmailNotifier;
use ratewatch::session::{BrowserSession, DEFAULT_WEBDRIVER_URL, HttpSession, WebDriverSession};
use ratewatch::types::{CompetitorSet, Occupancy};
use ratewatch::RateScraper;

#[derive(Parser)]
#[command(name = "ratewatch")]
#[command(about = "Competitor hotel rate collector for booking.com", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
enum Driver {
    /// Chrome driven through a running WebDriver server
    Webdriver,
    /// Plain HTTP fetch of the server rendered page
    Http,
}

#[derive(Args)]
struct EmailArgs {
    #[arg(long, env = "RATEWATCH_EMAIL_FROM", help = "Sender address")]
    email_from: Option<String>,

    #[arg(long, env = "RATEWATCH_EMAIL_TO", help = "Recipient address")]
    email_to: Option<String>,

    #[arg(
        long,
        env = "RATEWATCH_SMTP_PASSWORD",
        hide_env_values = true,
        help = "SMTP password of the sender"
    )]
    smtp_password: Option<String>,

    #[arg(long, help = "SMTP relay host (derived from the sender domain if omitted)")]
    smtp_host: Option<String>,

    #[arg(long, help = "SMTP port [default: 587]")]
    smtp_port: Option<u16>,

    #[arg(long, value_name = "FILE", help = "Archive to attach [default: data/rates.zip]")]
    attachment: Option<PathBuf>,
}

impl EmailArgs {
    fn settings(self) -> Result<EmailSettings, ConfigError> {
        EmailSettings::from_parts(
            self.email_from,
            self.email_to,
            self.smtp_password,
            self.smtp_host,
            self.smtp_port,
            self.attachment,
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Collect competitor rates over the date horizon and export them to CSV
    Collect {
        #[arg(
            long,
            conflicts_with = "competitors",
            requires = "hotels",
            help = "City to search"
        )]
        city: Option<String>,

        #[arg(
            long = "hotel",
            value_name = "NAME",
            conflicts_with = "competitors",
            help = "Competitor hotel to track in --city (repeatable)"
        )]
        hotels: Vec<String>,

        #[arg(
            long,
            value_name = "FILE",
            help = "JSON file mapping cities to competitor hotels"
        )]
        competitors: Option<PathBuf>,

        #[arg(
            long,
            default_value_t = 30,
            value_parser = clap::value_parser!(u32).range(1..=MAX_HORIZON_DAYS as i64),
            help = "Number of check-in dates to collect"
        )]
        days: u32,

        #[arg(
            long,
            value_name = "YYYY-MM-DD",
            help = "First check-in date [default: today]",
            value_parser = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string()),
        )]
        start_date: Option<NaiveDate>,

        #[arg(long, default_value = DEFAULT_OUTPUT_DIR, help = "Directory for the CSV output")]
        output_dir: PathBuf,

        #[arg(long, value_enum, default_value = "webdriver", help = "Page loader")]
        driver: Driver,

        #[arg(long, default_value = DEFAULT_WEBDRIVER_URL, help = "WebDriver server URL")]
        webdriver_url: String,

        #[arg(long, help = "Show the browser window instead of running headless")]
        headful: bool,

        #[arg(
            long,
            default_value_t = 10,
            value_name = "SECONDS",
            help = "Maximum wait for listings on each page"
        )]
        page_timeout: u64,

        #[arg(long, default_value_t = 2)]
        adults: u8,

        #[arg(long, default_value_t = 1)]
        rooms: u8,

        #[arg(long, default_value_t = 0)]
        children: u8,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,

        #[arg(long = "email", help = "Email the archive once the run is exported")]
        send_email: bool,

        #[command(flatten)]
        email: EmailArgs,
    },
    /// Email the packaged rate archive
    Notify {
        #[command(flatten)]
        email: EmailArgs,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

fn competitor_set(
    city: Option<String>,
    hotels: Vec<String>,
    competitors: Option<PathBuf>,
) -> Result<CompetitorSet, ConfigError> {
    match (competitors, city) {
        (Some(path), _) => load_competitors(&path),
        (None, Some(city)) => Ok(CompetitorSet::single(city, hotels)),
        (None, None) => Err(ConfigError::MissingSetting(
            "--competitors FILE or --city with --hotel",
        )),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Collect {
            city,
            hotels,
            competitors,
            days,
            start_date,
            output_dir,
            driver,
            webdriver_url,
            headful,
            page_timeout,
            adults,
            rooms,
            children,
            format,
            send_email,
            email,
        } => {
            let started = Instant::now();
            let captured_at = Local::now().naive_local();

            let competitors = competitor_set(city, hotels, competitors).unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let config = RunConfig {
                competitors,
                start_date: start_date.unwrap_or(captured_at.date()),
                horizon_days: days,
                occupancy: Occupancy {
                    adults,
                    rooms,
                    children,
                },
                output_dir,
                page_timeout: Duration::from_secs(page_timeout),
            };

            let config = config.validate().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            let notifier = send_email.then(|| {
                EmailNotifier::new(email.settings().unwrap_or_else(|e| {
                    log::error!("Email enabled but not configured: {e}");
                    process::exit(1);
                }))
            });

            let session = match driver {
                Driver::Webdriver => {
                    WebDriverSession::connect(&webdriver_url, !headful, config.page_timeout)
                        .await
                        .map(BrowserSession::WebDriver)
                }
                Driver::Http => HttpSession::new(config.page_timeout).map(BrowserSession::Http),
            }
            .unwrap_or_else(|e| {
                log::error!("Error starting browser session: {}", e);
                process::exit(1);
            });

            let (rows, stats) = RateScraper::new(session)
                .with_occupancy(config.occupancy)
                .collect(&config, captured_at)
                .await;

            for missed in rows.missed() {
                log::debug!("Not found: {}", missed);
            }

            let table = rows.into_table();
            let path = export_csv(&table, &config.output_dir, &config.output_label())
                .unwrap_or_else(|e| {
                    log::error!("Error exporting rates: {}", e);
                    process::exit(1);
                });

            match format {
                OutputFormat::Json => serialize_json(&table),
                OutputFormat::Text => {
                    for (i, row) in table.rows.iter().enumerate() {
                        println!("{:>3}. {}", i + 1, row);
                    }
                    print!("{}", stats);
                    println!("\nData saved to {}", path.display());
                }
            }

            if let Some(notifier) = notifier {
                notifier.notify(captured_at.date()).await;
            }

            log::info!("Time taken: {:.2}s", started.elapsed().as_secs_f64());
        }

        Commands::Notify { email } => {
            let settings = email.settings().unwrap_or_else(|e| {
                log::error!("Invalid args: {e}");
                process::exit(1);
            });

            EmailNotifier::new(settings)
                .notify(Local::now().date_naive())
                .await;
        }
    }
}
