//! Recurring autosave
//!
//! One sequential task: sleep, export, sleep. Runs cannot overlap by
//! construction, so two autosaves can never write the same backing table at
//! once even when an export outlasts the interval.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::export::{self, ExportFormat};
use crate::AppState;

/// Spawn the autosave loop using the given export method.
pub fn spawn(state: AppState, method: ExportFormat) -> JoinHandle<()> {
    info!(
        "Autosave every {:?} using method '{}'",
        state.config.autosave_interval,
        method.as_str()
    );

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(state.config.autosave_interval).await;

            match export::run(&state, method).await {
                Ok(()) => info!("The database has been auto-saved using method '{}'", method.as_str()),
                Err(e) => warn!("There was an error auto-saving the database: {}", e),
            }
        }
    })
}
