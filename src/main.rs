use std::process::ExitCode;

use ansible_local::ProvisionerError;
use ansible_local::cli;
use ansible_local::communicator::LocalCommunicator;
use ansible_local::ui::TracingUi;
use anyhow::Result;
use tracing::error;

fn main() -> Result<ExitCode> {
    let args = cli::parse_args()?;
    ansible_local::init_logging(args.command.common().log_level)?;

    let result = match &args.command {
        cli::Commands::Provision(opts) => {
            let comm = LocalCommunicator::new(opts.dry_run);
            ansible_local::run_provision(opts, &comm, &TracingUi).map(|_| ())
        }
        cli::Commands::Validate(opts) => ansible_local::run_validate(opts),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{:#}", e);
            // Surface ansible-playbook's own status when it ran and failed.
            let code = e
                .downcast_ref::<ProvisionerError>()
                .and_then(ProvisionerError::exit_status)
                .and_then(|status| u8::try_from(status).ok())
                .filter(|status| *status != 0)
                .unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}
