use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use smartquote::agent::{QuoteOutcome, QuotingAgent, SAMPLE_REQUESTS};
use smartquote::catalog::{ensure_data, Catalog};
use smartquote::config::{AppConfig, DataPaths};
use smartquote::doctor::{quote_self_check, tool_call_smoke_test};
use smartquote::llm::{AsyncLlmCaller, GatewayProbe, OpenAiCaller, RetryingLlmCaller};
use smartquote::quotes::QuoteStore;
use smartquote::web::{self, WebState};
use smartquote::AgentOutput;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "smartquote",
    about = "Smart Quoting Agent: turns plain-language requests into saved quotes",
    after_help = "Examples:\n  smartquote demo\n  smartquote ask \"120 Office Chairs for ABC Corp, preferred customer\"\n  smartquote serve --bind 0.0.0.0:8501"
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Overrides {
    #[arg(long, global = true, help = "OpenAI-compatible gateway base URL")]
    api_base: Option<String>,
    #[arg(long, global = true, help = "Model served by the gateway")]
    model: Option<String>,
    #[arg(long, global = true, help = "Directory holding the product and history CSVs")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory quote files are written to")]
    quotes_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Maximum model calls per request")]
    max_steps: Option<usize>,
    #[arg(long, global = true, help = "Log filter, e.g. `debug` or `smartquote=trace` (overrides RUST_LOG)")]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Seed data, self-check, then run the sample requests")]
    Demo,
    #[command(about = "Send one quote request to the agent")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The request in plain language")]
        request: Vec<String>,
        #[arg(long, help = "Print the state-machine trace after the answer")]
        trace: bool,
        #[arg(long, help = "Print the outcome as JSON")]
        json: bool,
    },
    #[command(about = "List the product catalog")]
    Products,
    #[command(about = "List saved quotes, newest first")]
    Quotes,
    #[command(about = "Print one saved quote")]
    Show { quote_id: String },
    #[command(about = "Start the web UI")]
    Serve {
        #[arg(long, help = "Address to bind, e.g. 127.0.0.1:8501")]
        bind: Option<String>,
    },
    #[command(about = "Check gateway connectivity and tool calling")]
    Doctor,
    #[command(about = "Write a quote directly, without the model, and read it back")]
    Selftest,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(overrides: Overrides) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(api_base) = overrides.api_base {
        config.gateway.api_base = api_base;
    }
    if let Some(model) = overrides.model {
        config.gateway.model = model;
    }
    if let Some(dir) = overrides.data_dir {
        config.paths.data_dir = dir;
    }
    if let Some(dir) = overrides.quotes_dir {
        config.paths.quotes_dir = dir;
    }
    if let Some(max_steps) = overrides.max_steps {
        config.agent.max_steps = max_steps;
    }
    config.validate()?;
    Ok(config)
}

fn build_llm(config: &AppConfig) -> Arc<dyn AsyncLlmCaller> {
    let gateway = &config.gateway;
    let caller = OpenAiCaller::with_base_url(&gateway.api_base, gateway.api_key.clone(), &gateway.model);
    Arc::new(RetryingLlmCaller::new(Arc::new(caller), gateway.max_retries))
}

fn build_agent(config: &AppConfig) -> anyhow::Result<QuotingAgent> {
    QuotingAgent::new(config, build_llm(config)).context("could not prepare the quoting data")
}

fn print_products(paths: &DataPaths) -> anyhow::Result<()> {
    ensure_data(paths)?;
    let catalog = Catalog::load(&paths.products_csv())?;
    println!("Available products:");
    for p in catalog.products() {
        println!("  {:<8} {:<18} ${:>10.2}  {}", p.sku, p.name, p.unit_price, p.tier);
    }
    Ok(())
}

fn print_quotes(store: &QuoteStore) -> anyhow::Result<()> {
    let summaries = store.summaries()?;
    if summaries.is_empty() {
        println!("No quotes in {}", store.dir().display());
        return Ok(());
    }
    println!("{} quote file(s) in {}:", summaries.len(), store.dir().display());
    for q in summaries {
        println!("  {:<10} {:<20} ${:>12.2}  {} item(s)", q.quote_id, q.customer, q.total, q.item_count);
    }
    Ok(())
}

fn print_outcome(outcome: &QuoteOutcome) {
    println!("\n{}", outcome.answer);
    if !outcome.quote_ids.is_empty() {
        println!("\nSaved: {}", outcome.quote_ids.join(", "));
    }
    println!("[{} step(s), {} tokens]", outcome.steps, outcome.usage.total_tokens);
}

/// Runs one request, echoing tool activity as it happens.
async fn ask(agent: &QuotingAgent, request: &str) -> anyhow::Result<QuoteOutcome> {
    let mut engine = agent.engine(request)?;
    {
        let mut stream = engine.run_streaming();
        while let Some(output) = stream.next().await {
            match output {
                AgentOutput::ToolCallStarted { name, args } => {
                    let args = serde_json::to_string(&args).unwrap_or_default();
                    println!("  [tool] {} {}", name, args);
                }
                AgentOutput::ToolCallFinished { name, success: false, result } => {
                    println!("  [tool] {} failed: {}", name, result);
                }
                AgentOutput::Action(msg) => println!("  [action] {}", msg),
                _ => {}
            }
        }
    }
    Ok(QuoteOutcome::from_engine(&engine)?)
}

async fn demo(config: &AppConfig) -> anyhow::Result<()> {
    println!("=== Smart Quoting Agent Demo ===\n");
    let agent = build_agent(config)?;
    print_products(agent.paths())?;

    let check = quote_self_check(agent.paths())?;
    println!("\nSelf-check quote {} written (total ${:.2})", check.quote_id, check.total);

    for (i, request) in SAMPLE_REQUESTS.iter().enumerate() {
        println!("\n--- Request {} ---\n{}", i + 1, request);
        match ask(&agent, request).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(err) => println!("Error processing request: {}", err),
        }
    }

    println!();
    print_quotes(agent.store())
}

async fn doctor(config: &AppConfig) -> anyhow::Result<()> {
    let gateway = &config.gateway;
    println!("Gateway: {}", gateway.api_base);
    println!("Model:   {}", gateway.model);

    let probe = GatewayProbe::new(&gateway.api_base, gateway.api_key.clone()).map_err(|e| anyhow!(e))?;
    match probe.list_models().await {
        Ok(models) => {
            println!("[ok]   gateway reachable, {} model(s) served", models.len());
            if models.iter().any(|m| m == &gateway.model) {
                println!("[ok]   {} is served", gateway.model);
            } else {
                println!("[warn] {} not in /models: {}", gateway.model, models.join(", "));
            }
        }
        Err(err) => println!("[fail] {}", err),
    }

    let report = tool_call_smoke_test(build_llm(config), &gateway.model).await?;
    if report.tool_called {
        println!("[ok]   tool call round trip: {}", report.tool_output.unwrap_or_default());
    } else {
        println!("[warn] model answered without calling the tool");
    }
    println!("       answer: {}", report.answer);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.overrides.log_level.as_deref());
    let config = load_config(cli.overrides)?;

    match cli.command {
        Command::Demo => demo(&config).await,
        Command::Ask { request, trace, json } => {
            let request = request.join(" ");
            let agent = build_agent(&config)?;
            let outcome = ask(&agent, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            if trace && json {
                println!("{}", outcome.trace.to_json()?);
            } else if trace {
                outcome.trace.print();
            }
            Ok(())
        }
        Command::Products => print_products(&config.paths),
        Command::Quotes => print_quotes(&QuoteStore::new(&config.paths)),
        Command::Show { quote_id } => {
            let quote = QuoteStore::new(&config.paths).load(&quote_id)?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
            Ok(())
        }
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let state = WebState::new(build_agent(&config)?);
            println!("Smart Quoting Agent UI on http://{}", bind);
            web::serve(&bind, state).await.with_context(|| format!("web server on {} failed", bind))
        }
        Command::Doctor => doctor(&config).await,
        Command::Selftest => {
            let quote = quote_self_check(&config.paths)?;
            let path = QuoteStore::new(&config.paths).dir().join(format!("{}.json", quote.quote_id));
            if !path.exists() {
                bail!("quote file {} missing after write", path.display());
            }
            println!("Self-check passed: {} ({} item(s), total ${:.2})", path.display(), quote.items.len(), quote.total);
            Ok(())
        }
    }
}
