use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fragments::agent::run::{self, RunRequest, Services};
use fragments::config::{Config, SandboxBackend};
use fragments::gateway;
use fragments::jobs::Dispatcher;
use fragments::observability::{self, Metrics};
use fragments::providers::OpenAiProvider;
use fragments::sandbox::docker::DockerSandboxClient;
use fragments::sandbox::e2b::E2bSandboxClient;
use fragments::sandbox::{SandboxClient, SandboxGateway};
use fragments::store::{messages, projects, Store};
use fragments::Tier;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fragments")]
#[command(about = "Build and refine web apps with an LLM agent in a sandbox")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $FRAGMENTS_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one prompt to completion and print the result as JSON
    Run {
        #[arg(long, value_enum, default_value = "free")]
        tier: Tier,
        /// Existing project to continue (a new one is created otherwise)
        #[arg(long)]
        project: Option<String>,
        prompt: String,
    },
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the JSON Schema of the config file
    Schema,
    /// Print the effective configuration as TOML (secrets redacted)
    Show,
}

fn build_services(config: Config) -> Result<Services> {
    let provider = OpenAiProvider::new(
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
        config.provider.timeout_secs,
    )?;

    let client: Arc<dyn SandboxClient> = match config.sandbox.backend {
        SandboxBackend::E2b => {
            let key = config
                .sandbox
                .e2b_api_key
                .clone()
                .context("E2B backend selected but no API key configured (set E2B_API_KEY)")?;
            Arc::new(E2bSandboxClient::new(key, config.sandbox.e2b_api_base.clone())?)
        }
        SandboxBackend::Docker => Arc::new(DockerSandboxClient::new(&config.sandbox.docker_image)?),
    };
    tracing::info!(provider = client.provider(), "Sandbox backend ready");

    let store = Store::open(&config.db_path())?;
    let metrics = Metrics::new().context("Failed to create metrics registry")?;

    Ok(Services {
        provider: Arc::new(provider),
        sandbox: SandboxGateway::new(client, config.sandbox.command_timeout_ms),
        store,
        metrics: Arc::new(metrics),
        config: Arc::new(config),
    })
}

async fn run_once(services: Services, tier: Tier, project: Option<String>, prompt: String) -> Result<()> {
    let project_id = match project {
        Some(id) => {
            services
                .store
                .with(|c| projects::get_project(c, &id))?
                .with_context(|| format!("project {id} not found"))?;
            id
        }
        None => {
            let project = services
                .store
                .with(|c| projects::create_project(c, &projects::generate_slug()))?;
            tracing::info!(project_id = %project.id, name = %project.name, "Project created");
            project.id
        }
    };
    services
        .store
        .with(|c| messages::create_user_message(c, &project_id, &prompt))?;

    let request = RunRequest {
        project_id,
        value: prompt,
        tier,
    };
    let artifact = run::dispatch(&services, &request).await?;
    println!("{}", serde_json::to_string_pretty(&artifact)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fragments", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config(ConfigCommands::Schema) => {
            println!("{}", serde_json::to_string_pretty(&Config::json_schema())?);
            return Ok(());
        }
        Commands::Config(ConfigCommands::Show) => {
            let mut config = Config::load(cli.config.as_deref())?;
            config.redact_secrets();
            print!("{}", toml::to_string_pretty(&config)?);
            return Ok(());
        }
        Commands::Serve { .. } | Commands::Run { .. } => {}
    }

    observability::init_tracing(cli.json_logs)?;
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            let dispatcher = Dispatcher::new(build_services(config)?);
            gateway::serve(dispatcher).await
        }
        Commands::Run {
            tier,
            project,
            prompt,
        } => run_once(build_services(config)?, tier, project, prompt).await,
        Commands::Completions { .. } | Commands::Config(_) => Ok(()),
    }
}
