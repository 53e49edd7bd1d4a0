//! `cod-sim`: floods the middleware with concurrent requests and reports
//! how many handler executions they cost.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use cod_http::{CacheOnDemand, CodConfig, Handler, HttpResponseSink, RequestContext};
use cod_response::{Body, OutputInterceptor, ResponseSink};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Handler that counts its runs and answers like a slow page
struct SlowPage {
    delay: Duration,
    executions: AtomicUsize,
}

#[async_trait::async_trait]
impl Handler for SlowPage {
    async fn call(&self, request: RequestContext, mut out: OutputInterceptor) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        let count = self.executions.fetch_add(1, Ordering::SeqCst) + 1;
        out.set_header("Content-Type", "text/plain")?;
        out.send(Body::from(format!(
            "URL was: {}, work count is: {count}",
            request.target
        )))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct FloodReport {
    requests: usize,
    keys: usize,
    rounds: usize,
    executions: usize,
    failures: usize,
    elapsed_ms: u128,
}

impl FloodReport {
    fn coalesced(&self) -> usize {
        self.requests.saturating_sub(self.executions)
    }

    fn generate_text(&self) -> String {
        format!(
            "Flood Report:\n  Requests: {}\n  Keys: {}\n  Rounds: {}\n  Executions: {}\n  Coalesced: {}\n  Failures: {}\n  Elapsed: {} ms",
            self.requests,
            self.keys,
            self.rounds,
            self.executions,
            self.coalesced(),
            self.failures,
            self.elapsed_ms,
        )
    }
}

fn cli() -> Command {
    Command::new("cod-sim")
        .version(cod_http::VERSION)
        .about("Cache-on-demand simulator")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("TOML file with [scheduler] and [policy] sections"),
        )
        .subcommand(
            Command::new("flood")
                .about("Send concurrent requests across a set of targets")
                .arg(
                    Arg::new("requests")
                        .long("requests")
                        .default_value("100")
                        .value_parser(value_parser!(usize))
                        .help("Concurrent requests per round"),
                )
                .arg(
                    Arg::new("keys")
                        .long("keys")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Distinct targets the requests are spread over"),
                )
                .arg(
                    Arg::new("delay-ms")
                        .long("delay-ms")
                        .default_value("50")
                        .value_parser(value_parser!(u64))
                        .help("Simulated handler latency"),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Sequential rounds; each round starts fresh executions"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration as TOML"))
}

fn load_config(matches: &ArgMatches) -> Result<CodConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => CodConfig::from_file(path).with_context(|| format!("loading {path}")),
        None => Ok(CodConfig::default()),
    }
}

async fn flood(config: CodConfig, args: &ArgMatches) -> Result<FloodReport> {
    let requests = args.get_one::<usize>("requests").copied().unwrap_or(100);
    let keys = args.get_one::<usize>("keys").copied().unwrap_or(4).max(1);
    let rounds = args.get_one::<usize>("rounds").copied().unwrap_or(1);
    let delay = Duration::from_millis(args.get_one::<u64>("delay-ms").copied().unwrap_or(50));

    let cod = CacheOnDemand::from_config(config);
    let page = Arc::new(SlowPage {
        delay,
        executions: AtomicUsize::new(0),
    });
    let started = Instant::now();
    let mut failures = 0;

    for round in 0..rounds {
        tracing::info!(round, requests, keys, "starting round");
        let tasks = (0..requests).map(|i| {
            let cod = cod.clone();
            let page = Arc::clone(&page);
            let request = RequestContext::get(format!("/page/{}", i % keys));
            tokio::spawn(async move {
                let mut sink = HttpResponseSink::new();
                cod.handle_with(&request, &mut sink, page).await.map(|()| sink.into_response())
            })
        });

        for joined in futures::future::join_all(tasks).await {
            match joined.context("request task panicked")? {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(status = %response.status(), "unexpected status");
                    failures += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "request failed");
                    failures += 1;
                }
            }
        }
    }

    Ok(FloodReport {
        requests: requests * rounds,
        keys,
        rounds,
        executions: page.executions.load(Ordering::SeqCst),
        failures,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("flood", args)) => {
            let json = args.get_flag("json");
            let report = flood(config, args).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.failures == 0 { 0 } else { 1 });
        }
        Some(("show-config", _)) => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flood_defaults() {
        let matches = cli().try_get_matches_from(["cod-sim", "flood"]).unwrap();
        let (name, args) = matches.subcommand().unwrap();

        assert_eq!(name, "flood");
        assert_eq!(args.get_one::<usize>("requests"), Some(&100));
        assert_eq!(args.get_one::<u64>("delay-ms"), Some(&50));
        assert!(!args.get_flag("json"));
    }

    #[tokio::test]
    async fn flood_runs_one_execution_per_key_per_round() {
        let matches = cli()
            .try_get_matches_from(["cod-sim", "flood", "--requests", "12", "--keys", "3", "--rounds", "2"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();

        let report = flood(CodConfig::default(), args).await.unwrap();
        assert_eq!(report.requests, 24);
        assert_eq!(report.executions, 6);
        assert_eq!(report.coalesced(), 18);
        assert_eq!(report.failures, 0);
    }
}
