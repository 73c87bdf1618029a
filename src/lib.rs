pub mod cli;
pub mod communicator;
pub mod config;
pub mod error;
pub mod provisioner;
pub mod template;
pub mod ui;
pub mod validation;

pub use error::{ProvisionerError, ValidationErrors};

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde_yaml::{Mapping, Value};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::communicator::Communicator;
use crate::config::ProvisionConfig;
use crate::provisioner::{AnsibleLocalProvisioner, ProvisionOutcome};
use crate::ui::Ui;
use crate::validation::ConfigValidator;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Builds the configuration layer carrying user variables.
///
/// Variables from the file's `packer_user_variables` are kept and the
/// command-line `--var` pairs override them key by key.
fn user_variables_layer(file_layer: &Value, vars: &[(String, String)]) -> Value {
    let mut merged = match file_layer.get("packer_user_variables") {
        Some(Value::Mapping(existing)) => existing.clone(),
        _ => Mapping::new(),
    };
    for (key, value) in vars {
        merged.insert(Value::String(key.clone()), Value::String(value.clone()));
    }

    let mut layer = Mapping::new();
    layer.insert(Value::String("packer_user_variables".to_string()), Value::Mapping(merged));
    Value::Mapping(layer)
}

/// Loads and validates the configuration named on the command line.
///
/// Relative paths in the file are resolved against the file's directory.
pub fn load_config(opts: &cli::CommonArgs) -> Result<ProvisionConfig> {
    let file_layer = config::load_raw_config(&opts.file)?;
    let mut layers = vec![file_layer];
    if !opts.vars.is_empty() {
        layers.push(user_variables_layer(&layers[0], &opts.vars));
    }

    let base_dir = opts.file.parent().unwrap_or(Utf8Path::new("."));
    let config = ConfigValidator::new()
        .with_base_dir(base_dir)
        .validate(&layers)
        .with_context(|| format!("invalid configuration in {}", opts.file))?;
    Ok(config)
}

pub fn run_provision(
    opts: &cli::ProvisionArgs,
    comm: &dyn Communicator,
    ui: &dyn Ui,
) -> Result<ProvisionOutcome> {
    let config = load_config(&opts.common)?;
    let provisioner = AnsibleLocalProvisioner::new(config);

    let outcome = provisioner
        .provision(ui, comm)
        .context("provisioning failed")?;

    info!("provisioning completed successfully");
    Ok(outcome)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let config = load_config(&opts.common)?;
    info!("validation successful:\n{:#?}", config);
    Ok(())
}
