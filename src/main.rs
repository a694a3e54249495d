use autodock::adapters::{
    self, CloudFormationStackApi, ComposeLoader, DockerCliPublisher, EcrRegistry,
};
use autodock::config::{Command, LogFormat};
use autodock::core::deployer::write_templates;
use autodock::core::template::TemplateFormat;
use autodock::utils::error::ErrorSeverity;
use autodock::utils::logger;
use autodock::utils::validation::{self, Validate};
use autodock::{
    AutodockConfig, Cli, DeployError, Deployer, LocalStorage, StackReconciler, Synthesizer,
};
use clap::Parser;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.log_format {
        LogFormat::Text => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!("Starting autodock");
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ autodock failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = exit_code(e.severity());
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

async fn run(cli: Cli) -> Result<(), DeployError> {
    let config = AutodockConfig::load_optional(&cli.config)?;
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    let project = ComposeLoader::load(&cli.compose_file, config.project.name.as_deref())?;
    let synthesizer = Synthesizer::new(config.synthesis_profile());

    match cli.command {
        Command::Synth { output, format } => {
            validation::validate_path("output", &output)?;
            let storage = LocalStorage::new(output.clone());
            let written =
                write_templates(&synthesizer, &project, &storage, TemplateFormat::from(format))
                    .await?;
            for path in &written {
                println!("📁 {}", storage.full_path(path).display());
            }
            println!("✅ Synthesized {} templates into {}", written.len(), output);
        }
        Command::Bootstrap => {
            let deployer = aws_deployer(&config, synthesizer).await;
            let outcome = deployer.bootstrap(&project).await?;
            println!("✅ Bootstrap stack {}", outcome);
        }
        Command::Deploy => {
            let deployer = aws_deployer(&config, synthesizer).await;
            let report = deployer.deploy(&project).await?;
            println!("✅ Bootstrap stack {}", report.bootstrap);
            for service in &report.services {
                match &service.result {
                    Ok(outcome) => println!("✅ {}: {}", service.stack, outcome),
                    Err(e) => println!("❌ {}: {}", service.stack, e.user_friendly_message()),
                }
            }
            let first_failure = report.failures().next().map(|f| f.stack.clone());
            if let Some(stack) = first_failure {
                return Err(DeployError::StackSubmitError {
                    stack,
                    operation: "deploy".to_string(),
                    message: format!(
                        "{} of {} services failed",
                        report.failures().count(),
                        report.services.len()
                    ),
                });
            }
        }
    }

    Ok(())
}

async fn aws_deployer(
    config: &AutodockConfig,
    synthesizer: Synthesizer,
) -> Deployer<CloudFormationStackApi, DockerCliPublisher> {
    let aws = adapters::load_aws_config(config.aws.region.as_deref()).await;
    let reconciler = StackReconciler::new(CloudFormationStackApi::from_conf(&aws))
        .with_poll_interval(config.reconcile.poll_interval())
        .with_timeout(config.reconcile.timeout())
        .with_policy(config.reconcile.existence_policy);
    let publisher = DockerCliPublisher::new(EcrRegistry::from_conf(&aws));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, abandoning the current stack wait");
            let _ = shutdown_tx.send(true);
        }
    });

    Deployer::new(synthesizer, reconciler, publisher)
        .continue_on_service_failure(config.reconcile.continue_on_service_failure)
        .with_shutdown(shutdown_rx)
}
