#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use log::{info, error, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use serde::Deserialize;
use std::{env, fs, path::Path};
use structopt::StructOpt;
use toml;

// Utilities
use crate::utils::errors::Errors;
use crate::utils::web_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// File locations, overridable by environment variable or command line.
const ENV_CONFIG_FILE         : &str = "HELLO_CONFIG_FILE";
const DEFAULT_CONFIG_FILE     : &str = "~/.hello/hello.toml";
const ENV_LOG_CONFIG_FILE     : &str = "HELLO_LOG_CONFIG";
const DEFAULT_LOG_CONFIG_FILE : &str = "~/.hello/log4rs.yml";

// The greeting message can always be supplied by the environment, using the
// same logical name as the configuration key.
const ENV_MESSAGE             : &str = "MESSAGE";

// Log level used when no log4rs configuration file is present.
const ENV_LOG_LEVEL           : &str = "HELLO_LOG_LEVEL";

// Networking.
const DEFAULT_HTTP_ADDR       : &str = "http://localhost";
const DEFAULT_HTTP_PORT       : u16  = 8080;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref HELLO_ARGS: HelloArgs = init_hello_args();
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// CommandLineArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "hello_args", about = "Command line arguments for hello_server.")]
pub struct HelloArgs {
    /// Path to the server's TOML configuration file.
    ///
    /// The path is resolved using the following priority order:
    ///
    ///   1. If set, the value of the HELLO_CONFIG_FILE environment variable,
    ///
    ///   2. Otherwise, if set, the value of this argument,
    ///
    ///   3. Otherwise, ~/.hello/hello.toml
    ///
    #[structopt(short, long)]
    pub config: Option<String>,

    /// Path to a log4rs YAML configuration file.
    ///
    /// When no file exists at the resolved path, logging falls back to a
    /// console configuration at the HELLO_LOG_LEVEL level (default: info).
    #[structopt(short, long)]
    pub log_config: Option<String>,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub hello_args: &'static HelloArgs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub http_port: u16,
    pub message: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            message: None,
        }
    }
}

// ***************************************************************************
//                            Argument Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_hello_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_hello_args() -> HelloArgs {
    let args = HelloArgs::from_args();
    println!("{:?}", args);
    args
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs logging.  A log4rs YAML file is used when one exists at
 * the resolved path; otherwise a console appender is configured at the level
 * named by HELLO_LOG_LEVEL.  Setting either to trace enables the per-request
 * ingress dump without changing any response.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).exists() {
        match log4rs::init_file(logconfig.clone(), Default::default()) {
            Ok(_) => (),
            Err(e) => {
                println!("{}", e);
                let s = format!("{}", Errors::Log4rsInitialization(logconfig));
                panic!("{}", s);
            },
        }
        info!("Log4rs initialized using: {}", logconfig);
        return;
    }

    // No file; assemble the console default.
    let level = env::var(ENV_LOG_LEVEL)
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    let stdout = ConsoleAppender::builder().build();
    let config = match log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level)) {
            Ok(c) => c,
            Err(e) => panic!("Unable to assemble the default log configuration: {}", e),
        };
    if let Err(e) = log4rs::init_config(config) {
        panic!("{}", Errors::Log4rsInitialization(e.to_string()));
    }
    info!("Log4rs initialized with console defaults at level {}.", level);
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --log-config argument
    //  3. Default location
    let path = env::var(ENV_LOG_CONFIG_FILE).unwrap_or_else(
        |_| {
            match HELLO_ARGS.log_config.clone() {
                Some(f) => f,
                None => DEFAULT_LOG_CONFIG_FILE.to_string(),
            }
        });
    get_absolute_path(&path)
}

/// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file specified
 * either through an environment variable or as a command line argument.  If
 * neither is provided, an attempt is made to use the default file path.  A
 * missing file is not an error; the defaults are used in that case.
 */
fn get_parms() -> Result<Parms> {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --config argument
    //  3. Default location
    let config_file = env::var(ENV_CONFIG_FILE).unwrap_or_else(
        |_| {
            match HELLO_ARGS.config.clone() {
                Some(f) => f,
                None => DEFAULT_CONFIG_FILE.to_string(),
            }
        });

    // Read the configuration file.
    let config_file_abs = get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            println!("Unable to read configuration at {}. Using default values.", config_file_abs);
            return Ok(Parms { config_file: Default::default(),
                              config: apply_env_overrides(Config::new()) });
        }
    };

    // Parse the toml configuration.
    let config : Config = match toml::from_str(&contents) {
        Ok(c)  => c,
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs), e);
            error!("{}", msg);
            return Result::Err(anyhow!(msg));
        }
    };

    Ok(Parms { config_file: config_file_abs, config: apply_env_overrides(config) })
}

// ---------------------------------------------------------------------------
// apply_env_overrides:
// ---------------------------------------------------------------------------
/** The greeting message can be supplied or replaced by the environment,
 * whether or not a configuration file was read.
 */
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(msg) = env::var(ENV_MESSAGE) {
        config.message = Some(msg);
    }
    config
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If this fails the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    RuntimeCtx { parms, hello_args: &HELLO_ARGS }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert!(config.message.is_none());
    }

    #[test]
    fn parse_full_config() {
        let config: Config = toml::from_str(r#"
            http_addr = "http://0.0.0.0"
            http_port = 9090
            message = "Hello Dev"
        "#).expect("full config should parse");
        assert_eq!(config.http_addr, "http://0.0.0.0");
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.message.as_deref(), Some("Hello Dev"));
    }

    #[test]
    fn parse_partial_config_fills_defaults() {
        let config: Config = toml::from_str("message = \"hi\"")
            .expect("partial config should parse");
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.message.as_deref(), Some("hi"));
    }

    #[test]
    fn env_message_overrides_file_value() {
        let config: Config = toml::from_str("message = \"from-file\"")
            .expect("config should parse");
        env::set_var(ENV_MESSAGE, "from-env");
        let config = apply_env_overrides(config);
        env::remove_var(ENV_MESSAGE);
        assert_eq!(config.message.as_deref(), Some("from-env"));
    }
}
