use std::{
    collections::HashMap,
    env,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::{fs::File, io::AsyncReadExt};

use crate::session::Scheme;

/// Defaults for a run, read from the user's config file
///
/// Every value here can be overridden on the command line. Passwords are
/// never read from the config file.
#[derive(Debug)]
pub struct Config {
    pub url: Option<String>,
    pub user: Option<String>,
    pub output: String,
    pub delimiter: char,
    pub count: u32,
    pub menu: String,
    pub insecure: bool,
    pub timeout_secs: u64,
    pub scheme: Scheme,

    /// Extra headers sent with every request
    ///
    /// A header can have more than one value, so we use a `Vec` to store them.
    pub headers: HashMap<String, Vec<String>>,
}

pub const DEFAULT_OUTPUT: &str = "json";
pub const DEFAULT_DELIMITER: char = ';';
pub const DEFAULT_COUNT: u32 = 10;
pub const DEFAULT_MENU: &str = "3130";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl Default for Config {
    fn default() -> Self {
        Config {
            url: None,
            user: None,
            output: DEFAULT_OUTPUT.to_string(),
            delimiter: DEFAULT_DELIMITER,
            count: DEFAULT_COUNT,
            menu: DEFAULT_MENU.to_string(),
            insecure: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            scheme: Scheme::HTTPS,
            headers: HashMap::new(),
        }
    }
}

impl Config {
    pub async fn load() -> Result<Self> {
        let path = get_config_home()?.join("ems-scrape").join("config.json");

        match File::open(&path).await {
            Ok(mut file) => {
                log::debug!("loading config from {}", path.display());
                Self::load_from_file(&mut file).await
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).context("open config file"),
        }
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        let mut file = File::open(path).await.context("open config file")?;
        Self::load_from_file(&mut file).await
    }

    async fn load_from_file(file: &mut File) -> Result<Self> {
        let mut dest = Vec::new();
        file.read_to_end(&mut dest).await?;

        Self::from_slice(&dest)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self> {
        let config_file: ConfigFile = serde_json::from_slice(bytes).context("parse config file")?;
        let defaults = Self::default();

        Ok(Config {
            url: config_file.url,
            user: config_file.user,
            output: config_file.output.unwrap_or(defaults.output),
            delimiter: config_file.delimiter.unwrap_or(defaults.delimiter),
            count: config_file.count.unwrap_or(defaults.count),
            menu: config_file.menu.unwrap_or(defaults.menu),
            insecure: config_file.insecure.unwrap_or(defaults.insecure),
            timeout_secs: config_file.timeout_secs.unwrap_or(defaults.timeout_secs),
            scheme: config_file.scheme.unwrap_or(defaults.scheme),
            headers: config_file.headers.unwrap_or(defaults.headers),
        })
    }
}

fn get_config_home() -> Result<PathBuf> {
    match env::var("XDG_CONFIG_HOME") {
        Ok(path) => Ok(Path::new(&path).to_path_buf()),
        Err(_) => Ok(homedir::my_home()?.context("home dir")?.join(".config")),
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    url: Option<String>,
    user: Option<String>,
    output: Option<String>,
    delimiter: Option<char>,
    count: Option<u32>,
    menu: Option<String>,
    insecure: Option<bool>,
    timeout_secs: Option<u64>,
    scheme: Option<Scheme>,
    headers: Option<HashMap<String, Vec<String>>>,
}
