//! Endpoint planner CLI entrypoint.
//!
//! This is the main entrypoint for the endpoint-planner command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use endpoint_planner::cli::{Cli, Commands, OutputFormatter};
use endpoint_planner::config::{ConfigParser, ConfigValidator, DeployConfig, find_config_file};
use endpoint_planner::error::Result;
use endpoint_planner::handoff::{ProvisioningEngine, create_engine};
use endpoint_planner::planner::{DeploymentPlan, DeploymentPlanner};
use endpoint_planner::registry::SageMakerRegistry;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan { detailed } => cmd_plan(cli.config.as_ref(), detailed, &formatter).await,
        Commands::Submit { yes } => cmd_submit(cli.config.as_ref(), yes, &formatter).await,
        Commands::Show => cmd_show(cli.config.as_ref(), &formatter).await,
    }
}

/// Write a template deployment file.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing deployment file in: {}", path.display());

    let config_path = path.join("endpoint.deploy.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    if !force && config_path.exists() {
        eprintln!("Deployment file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/endpoint.deploy.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/.env.example"))?;
    eprintln!("Created: {}", env_path.display());

    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing = missing_ignore_entries(&existing);
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# Endpoint planner")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!("{}\n", IGNORE_ENTRIES.join("\n")))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nDeployment file initialized.");
    eprintln!("Next steps:");
    eprintln!("  1. Edit endpoint.deploy.yaml with your account, network and model");
    eprintln!("  2. Run 'endpoint-planner validate --warnings' to check it");
    eprintln!("  3. Run 'endpoint-planner plan' to see the resource graph");
    eprintln!("  4. Run 'endpoint-planner submit' to hand the plan off");

    Ok(())
}

/// Validate the deployment file.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    info!("Validating deployment file: {}", config_file.display());

    let result = ConfigValidator::new().inspect(&config);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    if result.is_valid() {
        eprintln!("Deployment summary:");
        eprintln!("  Id: {}", config.deployment.id);
        eprintln!("  Region: {}", config.deployment.context.region);
        eprintln!("  Subnets: {}", config.deployment.network.subnet_ids.len());
        eprintln!("  Variant keys: {}", config.deployment.variant.len());
        Ok(())
    } else {
        // Surface the first error as the command's failure
        ConfigValidator::new().validate(&config).map(|_| ())
    }
}

/// Build and display the plan.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let plan = build_plan(&config).await?;

    eprintln!("{}", formatter.format_plan(&plan, detailed));
    Ok(())
}

/// Build the plan and hand it to the provisioning engine.
async fn cmd_submit(
    config_path: Option<&PathBuf>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let plan = build_plan(&config).await?;

    eprintln!("{}", formatter.format_plan(&plan, false));

    if !auto_approve {
        eprint!("Do you want to submit this plan? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Submit cancelled.");
            return Ok(());
        }
    }

    let engine = create_engine(&config.handoff).await?;
    debug!("Submitting through {} backend", engine.backend_type());
    let receipt = engine.submit(&plan).await?;

    eprintln!("{}", formatter.format_receipt(&receipt));
    Ok(())
}

/// Show the latest submitted plan.
async fn cmd_show(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let engine = create_engine(&config.handoff).await?;

    match engine.load_latest(&config.deployment.id).await? {
        Some(plan) => eprintln!("{}", formatter.format_plan(&plan, false)),
        None => eprintln!(
            "No plan submitted yet for '{}' ({} backend).",
            config.deployment.id,
            engine.backend_type()
        ),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Entries `init` keeps in `.gitignore`.
const IGNORE_ENTRIES: &[&str] = &[".env", ".endpoint-planner/"];

/// Returns the ignore entries not yet listed, comparing whole lines.
fn missing_ignore_entries(existing: &str) -> Vec<&'static str> {
    IGNORE_ENTRIES
        .iter()
        .copied()
        .filter(|entry| {
            !existing
                .lines()
                .any(|line| line.trim().trim_end_matches('/') == entry.trim_end_matches('/'))
        })
        .collect()
}

/// Resolves the deployment file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads the deployment file with `.env` and environment overrides applied.
fn load_config(config_path: Option<&PathBuf>) -> Result<(DeployConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading deployment file from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config, config_file))
}

/// Validates the request and builds its plan against the model registry.
async fn build_plan(config: &DeployConfig) -> Result<DeploymentPlan> {
    let validation = ConfigValidator::new().validate(config)?;
    for warning in &validation.warnings {
        debug!("Validation warning: {warning}");
    }

    let planner = DeploymentPlanner::new(Box::new(SageMakerRegistry::new()));
    planner.plan(&config.deployment).await
}
