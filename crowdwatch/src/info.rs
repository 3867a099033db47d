use crowdwatch_core::MonitorClient;
use crowdwatch_core::info::no_description;

use crate::cli::InfoArgs;
use crate::run_error::RunError;

/// Print the run's stored description, or the notice shown when there is none.
pub async fn info(args: InfoArgs) -> Result<(), RunError> {
    let client = MonitorClient::new(&args.master)
        .map_err(RunError::from_monitor)?
        .with_timeout(Some(args.timeout));

    let trid = args.trid.trim();
    if trid.is_empty() {
        return Err(RunError::InvalidInput(anyhow::anyhow!(
            "test run id must not be empty"
        )));
    }

    let test_info = client.test_info(trid).await.map_err(RunError::from_monitor)?;
    match test_info.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => println!("{description}"),
        None => println!("{}", no_description(trid)),
    }
    Ok(())
}
