use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::LevelFilter;
use proxy_checker::{
    proxy::{render_json_lines, render_lines, sort_results},
    CheckerConfig, ConfigError, IpParser, Proxy, ProxyChecker, ProxyParser,
};
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::time::Duration;

/// Exit status for bad flags, bad input or a refused run
const EXIT_USAGE: u8 = 2;

/// Exit status for failures while running
const EXIT_FAILURE: u8 = 1;

/// proxy-checker makes a call through each proxy and reports which succeed and which fail.
///
/// Send in the list of proxies on stdin, one per line:
///
///     cat proxies.txt | proxy-checker
#[derive(Parser, Debug)]
#[command(name = "proxy-checker")]
#[command(about = "Makes a call through each proxy and reports which succeed and which fail")]
struct Cli {
    /// URL to check
    #[arg(long, default_value = "https://google.com")]
    url: String,

    /// Method to call on URL
    #[arg(long, default_value = "GET")]
    method: String,

    /// HTTP status code returned for blocked proxies
    #[arg(long, default_value_t = 403)]
    forbidden: u16,

    /// HTTP status code for successful proxies
    #[arg(long, default_value_t = 200)]
    ok: u16,

    /// Print transport events to help debug what is going on
    #[arg(long)]
    trace: bool,

    /// Username for the proxy service being tested
    #[arg(long, default_value = "")]
    proxy_user: String,

    /// Password for the proxy service being tested
    #[arg(long, default_value = "")]
    proxy_pass: String,

    /// Name of the IP parser to use ('body' is the only choice right now)
    #[arg(long, default_value = "body")]
    ip_parser: String,

    /// Print results as they come in, rather than sorted at the end
    #[arg(long)]
    realtime: bool,

    /// Max number of proxies to try simultaneously.
    /// Certain proxies may rate-limit a source IP to prevent DDoS.
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Total number of proxies to check. The limit keeps you from being
    /// classified as a DDoS by testing too many proxies.
    #[arg(long, default_value_t = 20)]
    max: usize,

    /// Milliseconds to sleep before each proxy check.
    /// Certain proxies may rate-limit a source IP to prevent DDoS.
    #[arg(long, default_value_t = 1000)]
    sleep: u64,

    /// Timeout in seconds for each proxy check
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Print the report as JSON lines
    #[arg(long)]
    json: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> std::result::Result<CheckerConfig, ConfigError> {
        let mut config = CheckerConfig::new()
            .with_url(self.url.clone())
            .with_method(CheckerConfig::parse_method(&self.method)?)
            .with_ok_status(self.ok)
            .with_forbidden_status(self.forbidden)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_trace(self.trace)
            .with_realtime(self.realtime)
            .with_concurrency(self.concurrency)
            .with_sleep(Duration::from_millis(self.sleep))
            .with_ip_parser(IpParser::from_name(&self.ip_parser)?);

        if !self.proxy_user.is_empty() {
            config = config.with_auth(self.proxy_user.clone(), self.proxy_pass.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

/// Target reqwest logs raw connection reads and writes under
const VERBOSE_CONNECTION_TARGET: &str = "reqwest::connect::verbose";

/// With `trace`, reqwest's connection dump is enabled and all log output
/// moves to stdout next to the trace events.
fn logger_builder(env: env_logger::Env, verbose: bool, trace: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env.default_filter_or("warn"));
    if verbose {
        builder.filter_module("proxy_checker", LevelFilter::Debug);
    }
    if trace {
        builder
            .filter_module(VERBOSE_CONNECTION_TARGET, LevelFilter::Trace)
            .target(env_logger::Target::Stdout);
    }
    builder
}

fn init_logger(verbose: bool, trace: bool) {
    let mut builder = logger_builder(env_logger::Env::default(), verbose, trace);
    if let Err(e) = builder.try_init() {
        eprintln!("Logger initialization error: {}", e);
    }
}

fn read_proxies() -> Result<Vec<Proxy>> {
    ProxyParser::parse_reader(io::stdin().lock())
}

async fn run(cli: &Cli, config: CheckerConfig, proxies: Vec<Proxy>) -> Result<()> {
    let checker = ProxyChecker::new(config)?;

    println!("Testing {} proxies", proxies.len());
    let mut results = checker.check_proxies(proxies).await;
    sort_results(&mut results);

    // Realtime mode already printed every result as it completed.
    if cli.realtime && !cli.json {
        return Ok(());
    }

    let lines = if cli.json {
        render_json_lines(&results)?
    } else {
        render_lines(&results)
    };
    for line in lines {
        println!("{}", line);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.trace);

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if io::stdin().is_terminal() {
        eprintln!("The command is intended to work with pipes.");
        eprintln!("Send in the list of proxy services, one per line.");
        eprintln!("cat proxies.txt | proxy-checker");
        eprintln!();
        let _ = Cli::command().print_help();
        return ExitCode::from(EXIT_USAGE);
    }

    let proxies = match read_proxies() {
        Ok(proxies) => proxies,
        Err(e) => {
            eprintln!("Error reading stdin: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    if let Err(e) = ProxyParser::check_limit(&proxies, cli.max) {
        eprintln!("{}", e);
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&cli, config, proxies).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal error checking proxies: {}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
