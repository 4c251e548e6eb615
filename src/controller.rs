//! Runs dashboard actions against the crime API.
//!
//! A [`Command`] marks its action as loading in [`DashboardState`] and
//! spawns the request on the tokio runtime. The finished [`Outcome`] comes
//! back over an unbounded channel and is applied by [`Controller::apply`]
//! on the UI loop, so state is only ever touched from one place.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::ApiError;
use crate::models::{AggregationRecord, CsvUpload, Receipt};
use crate::service::CrimeApi;
use crate::state::{DashboardState, Snapshot, Ticket};

/// Errors surfaced by dashboard actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local precondition not met; no request was made.
    #[error("{0}")]
    Validation(String),

    /// Reading the CSV file failed.
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ActionError {
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Api(e) => e.user_message(),
            ActionError::Validation(message) => message.clone(),
            ActionError::Io { path, source } => {
                format!("Could not read {}: {source}.", path.display())
            }
        }
    }
}

/// User-triggered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Upload,
    Clear,
    /// Fetch the selected bairro's record on its own.
    Inspect,
}

/// Completed action, delivered back to the UI loop.
#[derive(Debug)]
pub enum Outcome {
    Refreshed {
        ticket: Ticket,
        result: Result<Snapshot, ActionError>,
    },
    Uploaded {
        ticket: Ticket,
        result: Result<Receipt, ActionError>,
    },
    Cleared {
        ticket: Ticket,
        result: Result<Receipt, ActionError>,
    },
    Inspected {
        ticket: Ticket,
        bairro: String,
        result: Result<AggregationRecord, ActionError>,
    },
}

pub struct Controller {
    api: Arc<dyn CrimeApi>,
    outcomes: mpsc::UnboundedSender<Outcome>,
}

impl Controller {
    /// Creates a controller and the receiver its outcomes arrive on.
    pub fn channel(api: Arc<dyn CrimeApi>) -> (Self, mpsc::UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { api, outcomes: tx }, rx)
    }

    /// Starts `command`. Must be called from within a tokio runtime.
    pub fn dispatch(&self, state: &mut DashboardState, command: Command) {
        log::debug!("dispatch {command:?}");
        let api = Arc::clone(&self.api);
        match command {
            Command::Refresh => {
                let ticket = state.begin_refresh();
                self.spawn(async move {
                    let result = fetch_snapshot(api.as_ref()).await;
                    Outcome::Refreshed { ticket, result }
                });
            }
            Command::Upload => match state.begin_upload() {
                Ok((ticket, path)) => {
                    self.spawn(async move {
                        let result = upload_file(api.as_ref(), &path).await;
                        Outcome::Uploaded { ticket, result }
                    });
                }
                Err(e) => log::debug!("Upload not started: {e}"),
            },
            Command::Clear => {
                let ticket = state.begin_clear();
                self.spawn(async move {
                    let result = api.clear_data().await.map_err(ActionError::from);
                    Outcome::Cleared { ticket, result }
                });
            }
            Command::Inspect => {
                let Some((ticket, bairro)) = state.begin_inspect() else {
                    return;
                };
                self.spawn(async move {
                    let result = api
                        .get_aggregation_by_bairro(&bairro)
                        .await
                        .map_err(ActionError::from);
                    Outcome::Inspected {
                        ticket,
                        bairro,
                        result,
                    }
                });
            }
        }
    }

    /// Applies a finished action and starts any follow-up it implies.
    pub fn apply(&self, state: &mut DashboardState, outcome: Outcome) {
        match outcome {
            Outcome::Refreshed { ticket, result } => {
                state.finish_refresh(ticket, result);
            }
            Outcome::Uploaded { ticket, result } => {
                if state.finish_upload(ticket, result) {
                    self.dispatch(state, Command::Refresh);
                }
            }
            Outcome::Cleared { ticket, result } => {
                state.finish_clear(ticket, result);
            }
            Outcome::Inspected {
                ticket,
                bairro,
                result,
            } => {
                state.finish_inspect(ticket, &bairro, result);
            }
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        let outcomes = self.outcomes.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            if outcomes.send(outcome).is_err() {
                log::debug!("Dashboard closed before the outcome was delivered");
            }
        });
    }
}

/// Fetches aggregations and stats together.
pub async fn fetch_snapshot(api: &dyn CrimeApi) -> Result<Snapshot, ActionError> {
    let (aggregations, stats) = tokio::try_join!(api.get_aggregations(), api.get_stats())?;
    Ok(Snapshot {
        aggregations,
        stats,
    })
}

/// Checks that `path` names an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<(), ActionError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(ActionError::Validation(format!(
            "{} is not a CSV file.",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(ActionError::Validation(format!(
            "{} does not exist.",
            path.display()
        )));
    }
    Ok(())
}

/// Reads `path` into an upload payload.
pub async fn read_csv(path: &Path) -> Result<CsvUpload, ActionError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ActionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload.csv".to_string(), |n| n.to_string_lossy().into_owned());
    Ok(CsvUpload { file_name, bytes })
}

/// Reads and uploads a CSV file.
pub async fn upload_file(api: &dyn CrimeApi, path: &Path) -> Result<Receipt, ActionError> {
    let upload = read_csv(path).await?;
    Ok(api.upload_csv(upload).await?)
}
