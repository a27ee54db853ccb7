use std::{io, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::Config;
use crate::error;
use crate::login::{self, AccountId, Credentials};
use crate::output::{self, OutputFormat};
use crate::records::{self, RecordSet};
use crate::session::Session;
use crate::url_builder::URLBuilder;

/// Fetches the latest reports from an ELDIS management suite portal
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CLI {
    /// IP or domain of the portal, optionally with scheme, port and path
    #[arg(long)]
    url: Option<String>,

    /// Portal username
    #[arg(long)]
    user: Option<String>,

    /// Portal password
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pass: String,

    /// Output format: json, csv, or anything else for a debug dump
    #[arg(long)]
    output: Option<String>,

    /// Separator when exporting as CSV
    #[arg(long)]
    del: Option<char>,

    /// Number of reports to fetch
    #[arg(long)]
    count: Option<u32>,

    /// Menu whose report table is queried
    #[arg(long)]
    menu: Option<String>,

    /// Skip TLS certificate validation
    #[arg(long)]
    insecure: bool,

    /// Per-request timeout in seconds, 0 to disable
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file to read instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every request
    #[arg(long)]
    verbose: bool,
}

/// Long flags that take a value and may also be written with a single dash
const VALUE_FLAGS: [&str; 9] = [
    "url", "user", "pass", "output", "del", "count", "menu", "timeout", "config",
];

/// Switches that may also be written with a single dash
const SWITCH_FLAGS: [&str; 2] = ["insecure", "verbose"];

/// Everything a run needs, after flags have been laid over the config file
#[derive(Debug)]
pub struct Settings {
    pub portal: URLBuilder,
    pub credentials: Credentials,
    pub format: OutputFormat,
    pub delimiter: u8,
    pub count: u32,
    pub menu: String,
    pub config: Config,
}

impl Settings {
    pub fn resolve(cli: CLI, mut config: Config) -> Result<Self> {
        if let Some(output) = cli.output {
            config.output = output;
        }
        if let Some(del) = cli.del {
            config.delimiter = del;
        }
        if let Some(count) = cli.count {
            config.count = count;
        }
        if let Some(menu) = cli.menu {
            config.menu = menu;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_secs = timeout;
        }
        config.insecure |= cli.insecure;

        let url = cli.url.or(config.url.clone()).unwrap_or_default();
        let portal = URLBuilder::from_input(&url).context("parse portal URL")?;

        if !config.delimiter.is_ascii() {
            bail!("CSV delimiter must be a single ASCII character");
        }

        Ok(Self {
            portal,
            credentials: Credentials {
                username: cli.user.or(config.user.clone()).unwrap_or_default(),
                password: cli.pass,
            },
            format: OutputFormat::from(config.output.as_str()),
            delimiter: config.delimiter as u8,
            count: config.count,
            menu: config.menu.clone(),
            config,
        })
    }
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let cli = CLI::parse_from(normalize_args(args));

    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let settings = Settings::resolve(cli, config)?;
    let session = Session::new(settings.portal.clone(), &settings.config)?;

    let record_set = scrape(&session, &settings).await?;

    let stdout = io::stdout();
    output::render(
        &record_set,
        settings.format,
        settings.delimiter,
        &mut stdout.lock(),
    )
}

/// Logs in and fetches one page of reports
pub async fn scrape(session: &Session, settings: &Settings) -> Result<RecordSet> {
    let account = authenticate(session, settings)
        .await
        .context("Error on login")?;

    records::fetch_records(session, &account, &settings.menu, settings.count)
        .await
        .context("Error on extracting")
}

async fn authenticate(session: &Session, settings: &Settings) -> error::Result<AccountId> {
    let token = login::fetch_token(session).await?;
    login::login(session, &token, &settings.credentials, &settings.menu).await
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Rewrites single-dash long flags ("-url") into their double-dash form
///
/// The value following a value-taking flag is passed through untouched, even
/// when it is spelled like a flag.
fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut expect_value = false;

    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || std::mem::take(&mut expect_value) {
                return arg;
            }

            let Some(flag) = arg.strip_prefix('-') else {
                return arg;
            };
            let flag = flag.strip_prefix('-').unwrap_or(flag);
            let (name, inline_value) = match flag.split_once('=') {
                Some((name, _)) => (name, true),
                None => (flag, false),
            };

            let takes_value = VALUE_FLAGS.contains(&name);
            if !takes_value && !SWITCH_FLAGS.contains(&name) {
                return arg;
            }

            expect_value = takes_value && !inline_value;
            format!("--{}", flag)
        })
        .collect()
}
