pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;
pub use config::{cli::LocalStorage, toml_config::AutodockConfig};

pub use core::{
    deployer::{DeployReport, Deployer},
    reconciler::{ReconcileOutcome, StackReconciler},
    synthesis::{Synthesis, Synthesizer},
};
pub use utils::error::{DeployError, Result};
