use clap::{Parser, Subcommand, ValueEnum};

use crate::core::template::TemplateFormat;

#[derive(Debug, Clone, Parser)]
#[command(name = "autodock")]
#[command(about = "Deploy a docker compose project to AWS ECS with CloudFormation")]
pub struct Cli {
    /// Compose file describing the project
    #[arg(short = 'f', long = "file", global = true, default_value = "docker-compose.yaml")]
    pub compose_file: String,

    /// Optional TOML settings file
    #[arg(short, long, global = true, default_value = "autodock.toml")]
    pub config: String,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Reconcile the shared stack, then build, push and reconcile every service
    Deploy,
    /// Reconcile only the shared stack
    Bootstrap,
    /// Write the templates to disk without touching AWS
    Synth {
        #[arg(short, long, default_value = "cdk.out")]
        output: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl From<OutputFormat> for TemplateFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => TemplateFormat::Yaml,
            OutputFormat::Json => TemplateFormat::Json,
        }
    }
}
