mod cli;
mod config;
mod control;
mod engine;
mod error;
mod output;
mod telemetry;
mod types;
mod ws;

use clap::Parser;
use cli::{Cli, Commands, InitArgs, RunArgs};
use config::{load_config, merge_config};
use control::Controller;
use engine::{Benchmark, CounterRegistry, RunSummary, WsRequesterFactory};
use error::HarnessError;
use std::sync::Arc;
use telemetry::SnapshotSource;
use types::HarnessConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32, HarnessError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_harness(&args).await,
        Commands::Init(args) => run_init(&args),
        Commands::Completions(args) => {
            cli::generate_completions(args.shell);
            Ok(0)
        }
        Commands::Man => {
            cli::generate_man_page()?;
            Ok(0)
        }
    }
}

fn run_init(args: &InitArgs) -> Result<i32, HarnessError> {
    if args.output.exists() && !args.force {
        return Err(HarnessError::AlreadyExists(args.output.clone()));
    }

    let url = args.url.as_deref().unwrap_or("ws://localhost:8080/ws");

    let config = format!(
        r#"# sockburst configuration

[target]
url = "{url}"
# origin = "http://localhost"
# payload = '{{"type": "hello"}}'
connect_timeout = "10s"

# Extra handshake headers
# [target.headers]
# Authorization = "Bearer ${{API_TOKEN}}"

[load]
connections = 1000
duration = "30s"
# rate = 0              # total requests/sec, 0 = full throttle

[control]
http_addr = ":80"
stats_interval = "2s"
# pong_wait = "60s"
# ping_period = "54s"   # must be shorter than pong_wait
# write_wait = "10s"

[output]
dest = "result.txt"
# percentile_ticks = 5
"#,
        url = url
    );

    std::fs::write(&args.output, config)?;

    eprintln!("Created config file: {}", args.output.display());
    eprintln!("\nRun with: sockburst run -f {}", args.output.display());

    Ok(0)
}

async fn run_harness(args: &RunArgs) -> Result<i32, HarnessError> {
    let toml_config = match args.config.as_deref() {
        Some(path) => Some(load_config(path)?),
        None => None,
    };
    let config = merge_config(args, toml_config)?;

    if args.dry_run {
        eprintln!("Configuration validated successfully!\n");
        print_config(&config);
        return Ok(0);
    }

    let registry = Arc::new(CounterRegistry::new());
    let controller = Arc::new(Controller::default());
    let source = SnapshotSource::new(registry.clone(), controller.clone());

    let listener = control::bind(&config.http_addr).await?;
    let local = listener.local_addr()?;
    let app = control::router(controller.clone(), source, config.telemetry());
    let server = tokio::spawn(control::serve(listener, app));
    tracing::info!("Control plane listening on {}", local);

    eprintln!(
        "sockburst: {} connections to {}, waiting for launch",
        config.connections, config.url
    );
    eprintln!("  launch:  GET http://{}/launch", local);
    eprintln!("  begin:   GET http://{}/begin", local);
    eprintln!("  end:     GET http://{}/end", local);
    eprintln!("  observe: ws://{}/socket", local);

    let launch = controller.gates().launch.clone();
    tokio::select! {
        _ = launch.wait() => {}
        _ = tokio::signal::ctrl_c() => return Err(HarnessError::Interrupted),
    }

    let factory = WsRequesterFactory::new(&config, registry, controller.gates().begin.clone());
    let benchmark = Benchmark::new(factory, config.rate, config.connections, config.duration);

    let summary = tokio::select! {
        summary = benchmark.run() => summary?,
        _ = tokio::signal::ctrl_c() => return Err(HarnessError::Interrupted),
    };

    println!("{}", summary);
    print_summary(&summary);

    output::write_latency_distribution(
        summary.stats.success_histogram(),
        &config.dest,
        config.percentile_ticks,
    )
    .map_err(|source| HarnessError::Report {
        path: config.dest.clone(),
        source,
    })?;
    eprintln!("Latency distribution written to: {}", config.dest.display());

    server.abort();
    Ok(0)
}

fn print_config(config: &HarnessConfig) {
    eprintln!("Target:         {}", config.url);
    if let Some(origin) = &config.origin {
        eprintln!("Origin:         {}", origin);
    }
    if !config.headers.is_empty() {
        eprintln!("Headers:        {} custom", config.headers.len());
    }
    if !config.payload.is_empty() {
        eprintln!("Payload:        {} bytes", config.payload.len());
    }
    eprintln!("Connections:    {}", config.connections);
    if config.rate > 0 {
        eprintln!("Rate Limit:     {} req/s", config.rate);
    } else {
        eprintln!("Rate Limit:     full throttle");
    }
    eprintln!("Duration:       {:?}", config.duration);
    eprintln!("Connect Timeout: {:?}", config.connect_timeout);
    eprintln!("Control:        {}", config.http_addr);
    eprintln!("Stats Interval: {:?}", config.stats_interval);
    eprintln!("Ping/Pong:      {:?} / {:?}", config.ping_period, config.pong_wait);
    eprintln!("Write Wait:     {:?}", config.write_wait);
    eprintln!("Dest:           {}", config.dest.display());
}

fn print_summary(summary: &RunSummary) {
    let stats = &summary.stats;

    println!("\n{}", "=".repeat(50));
    println!("{:^50}", "SOCKBURST RESULTS");
    println!("{}", "=".repeat(50));

    println!("\nConnections:");
    println!("  Planned:         {:>12}", summary.connections);
    println!("  Established:     {:>12}", summary.established);
    println!("  Failed:          {:>12}", summary.failed_setups);
    println!("  Failed Closes:   {:>12}", summary.failed_teardowns);

    println!("\nThroughput:");
    println!("  Total Requests:  {:>12}", stats.total());
    println!("  Successful:      {:>12}", stats.successful);
    println!("  Failed:          {:>12}", stats.failed);
    println!("  Requests/sec:    {:>12.2}", summary.throughput());

    if stats.successful > 0 {
        println!("\nLatency (ms):");
        println!("  Min:             {:>12.2}", stats.latency_min() as f64 / 1000.0);
        println!("  Max:             {:>12.2}", stats.latency_max() as f64 / 1000.0);
        println!("  Mean:            {:>12.2}", stats.latency_mean() / 1000.0);
        for (label, p) in [("p50", 50.0), ("p90", 90.0), ("p99", 99.0), ("p99.9", 99.9)] {
            println!(
                "  {:17}{:>12.2}",
                format!("{}:", label),
                stats.latency_percentile(p) as f64 / 1000.0
            );
        }
    }

    if stats.failed > 0 {
        let errors = stats.error_histogram();
        println!("\nFailed Request Latency (ms):");
        println!("  Mean:            {:>12.2}", errors.mean() / 1000.0);
        println!("  Max:             {:>12.2}", errors.max() as f64 / 1000.0);
    }

    println!("\n{}", "=".repeat(50));
}
