//! Dashboard state container.
//!
//! [`DashboardState`] owns the current snapshot, the user's selection and
//! search term, and the status of every action. Actions are split in a
//! `begin_*` half (marks loading, hands out a [`Ticket`]) and a `finish_*`
//! half (applies a result only if its ticket is still current).

use std::path::{Path, PathBuf};

use crate::controller::{validate_csv_path, ActionError};
use crate::derive::{self, Projection, SelectionFallback, SummaryCards};
use crate::models::{AggregationRecord, Receipt, StatsSummary};

/// Result of one refresh: the full aggregation list plus totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub aggregations: Vec<AggregationRecord>,
    pub stats: Option<StatsSummary>,
}

/// Lifecycle of one action category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed(String),
}

impl ActionStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, ActionStatus::Loading)
    }
}

/// Identifies one request of an action category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Generation counter for one action category.
///
/// Only the most recently issued ticket settles; results carrying an
/// older ticket are dropped.
#[derive(Debug, Default)]
pub struct InFlight {
    generation: u64,
    pending: Option<u64>,
}

impl InFlight {
    pub fn begin(&mut self) -> Ticket {
        self.generation += 1;
        self.pending = Some(self.generation);
        Ticket(self.generation)
    }

    /// Returns true if `ticket` is the outstanding request, which is then
    /// no longer pending.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if self.pending == Some(ticket.0) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Makes any outstanding ticket stale.
    pub fn invalidate(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

/// Transient message shown under the upload bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub kind: FeedbackKind,
    pub message: String,
}

impl Feedback {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FeedbackKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FeedbackKind::Error,
            message: message.into(),
        }
    }
}

/// Everything the dashboard knows, owned by the app.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub aggregations: Vec<AggregationRecord>,
    pub stats: Option<StatsSummary>,
    pub search_term: String,
    /// Name of the selected bairro; always present in `aggregations`.
    selected: Option<String>,
    /// Freshly fetched record for the selected bairro.
    pub detail: Option<AggregationRecord>,
    pub selected_file: Option<PathBuf>,
    /// True until the first refresh settles.
    pub initial_load: bool,
    pub refresh: ActionStatus,
    pub upload: ActionStatus,
    pub clear: ActionStatus,
    pub inspect: ActionStatus,
    /// Banner text for failed refresh/clear.
    pub error_message: Option<String>,
    pub upload_feedback: Option<Feedback>,
    pub fallback: SelectionFallback,
    refresh_flight: InFlight,
    upload_flight: InFlight,
    clear_flight: InFlight,
    inspect_flight: InFlight,
}

impl DashboardState {
    pub fn new(fallback: SelectionFallback) -> Self {
        Self {
            initial_load: true,
            fallback,
            ..Self::default()
        }
    }

    pub fn projection(&self) -> Projection<'_> {
        Projection::new(&self.aggregations, &self.search_term, self.selected.as_deref())
    }

    pub fn summary_cards(&self) -> SummaryCards {
        SummaryCards::from_stats(self.stats.as_ref())
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_record(&self) -> Option<&AggregationRecord> {
        self.selected
            .as_deref()
            .and_then(|name| derive::find_bairro(&self.aggregations, name))
    }

    pub fn has_data(&self) -> bool {
        !self.aggregations.is_empty()
    }

    /// Selects `name` if it is part of the snapshot. Returns whether the
    /// selection changed.
    pub fn select(&mut self, name: &str) -> bool {
        if self.selected.as_deref() == Some(name) {
            return false;
        }
        if derive::find_bairro(&self.aggregations, name).is_none() {
            return false;
        }
        self.selected = Some(name.to_string());
        self.detail = None;
        self.inspect = ActionStatus::Idle;
        self.inspect_flight.invalidate();
        true
    }

    /// Moves the selection `delta` rows through the filtered list. Starts
    /// at the top when the selection is not visible.
    pub fn select_relative(&mut self, delta: isize) -> bool {
        let target = {
            let projection = self.projection();
            if projection.list.is_empty() {
                return false;
            }
            let last = projection.list.len() as isize - 1;
            let next = match projection.selected_index() {
                Some(idx) => (idx as isize + delta).clamp(0, last),
                None => 0,
            };
            projection.list[next as usize].bairro.clone()
        };
        self.select(&target)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    /// Picks the CSV file for the next upload.
    pub fn choose_file(&mut self, path: &Path) -> Result<(), ActionError> {
        match validate_csv_path(path) {
            Ok(()) => {
                self.selected_file = Some(path.to_path_buf());
                self.upload_feedback = None;
                Ok(())
            }
            Err(e) => {
                self.upload_feedback = Some(Feedback::error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Replaces the snapshot wholesale and reconciles the selection.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let selected =
            derive::reconcile_selection(self.selected.as_deref(), &snapshot.aggregations, self.fallback);
        if selected != self.selected {
            self.inspect = ActionStatus::Idle;
            self.inspect_flight.invalidate();
        }
        self.aggregations = snapshot.aggregations;
        self.stats = snapshot.stats;
        self.selected = selected;
        self.detail = None;
    }

    pub fn begin_refresh(&mut self) -> Ticket {
        if self.refresh_flight.is_pending() {
            log::debug!("Refresh superseded by a newer request");
        }
        self.refresh = ActionStatus::Loading;
        self.error_message = None;
        self.refresh_flight.begin()
    }

    /// Applies a refresh result. Returns false when the ticket was stale.
    pub fn finish_refresh(&mut self, ticket: Ticket, result: Result<Snapshot, ActionError>) -> bool {
        if !self.refresh_flight.settle(ticket) {
            log::debug!("Discarding stale refresh result");
            return false;
        }
        self.initial_load = false;
        match result {
            Ok(snapshot) => {
                log::info!("Loaded {} aggregations", snapshot.aggregations.len());
                self.apply_snapshot(snapshot);
                self.refresh = ActionStatus::Succeeded;
            }
            Err(e) => {
                log::warn!("Refresh failed: {e}");
                let message = format!("Could not load data: {}", e.user_message());
                self.refresh = ActionStatus::Failed(message.clone());
                self.error_message = Some(message);
            }
        }
        true
    }

    /// Starts an upload of the selected file.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Validation`] without side effects beyond the
    /// feedback message when no file is selected or an upload is already
    /// running.
    pub fn begin_upload(&mut self) -> Result<(Ticket, PathBuf), ActionError> {
        let Some(path) = self.selected_file.clone() else {
            let err = ActionError::Validation("Select a CSV file to upload.".to_string());
            self.upload_feedback = Some(Feedback::error(err.user_message()));
            return Err(err);
        };
        if self.upload_flight.is_pending() {
            let err = ActionError::Validation("An upload is already in progress.".to_string());
            self.upload_feedback = Some(Feedback::error(err.user_message()));
            return Err(err);
        }
        self.upload = ActionStatus::Loading;
        self.upload_feedback = None;
        Ok((self.upload_flight.begin(), path))
    }

    /// Applies an upload result. Returns true when the dashboard should
    /// refresh.
    pub fn finish_upload(&mut self, ticket: Ticket, result: Result<Receipt, ActionError>) -> bool {
        if !self.upload_flight.settle(ticket) {
            log::debug!("Discarding stale upload result");
            return false;
        }
        match result {
            Ok(receipt) => {
                self.upload = ActionStatus::Succeeded;
                self.upload_feedback = Some(Feedback::success(upload_success_message(&receipt)));
                self.selected_file = None;
                true
            }
            Err(e) => {
                log::warn!("Upload failed: {e}");
                let message = format!(
                    "Upload failed: {} Check the file and try again.",
                    e.user_message()
                );
                self.upload = ActionStatus::Failed(message.clone());
                self.upload_feedback = Some(Feedback::error(message));
                false
            }
        }
    }

    pub fn begin_clear(&mut self) -> Ticket {
        self.clear = ActionStatus::Loading;
        self.error_message = None;
        self.clear_flight.begin()
    }

    /// Applies a clear result. On success the local snapshot is emptied
    /// and any refresh still in flight is made stale.
    pub fn finish_clear(&mut self, ticket: Ticket, result: Result<Receipt, ActionError>) -> bool {
        if !self.clear_flight.settle(ticket) {
            log::debug!("Discarding stale clear result");
            return false;
        }
        match result {
            Ok(_) => {
                log::info!("Cleared local snapshot");
                self.aggregations.clear();
                self.stats = None;
                self.selected = None;
                self.detail = None;
                self.inspect = ActionStatus::Idle;
                self.inspect_flight.invalidate();
                self.refresh_flight.invalidate();
                if self.refresh.is_loading() {
                    self.refresh = ActionStatus::Idle;
                }
                self.clear = ActionStatus::Succeeded;
            }
            Err(e) => {
                log::warn!("Clear failed: {e}");
                let message = format!("Could not clear data: {}", e.user_message());
                self.clear = ActionStatus::Failed(message.clone());
                self.error_message = Some(message);
            }
        }
        true
    }

    /// Starts a detail lookup for the selected bairro.
    pub fn begin_inspect(&mut self) -> Option<(Ticket, String)> {
        let name = self.selected.clone()?;
        self.inspect = ActionStatus::Loading;
        Some((self.inspect_flight.begin(), name))
    }

    pub fn finish_inspect(
        &mut self,
        ticket: Ticket,
        bairro: &str,
        result: Result<AggregationRecord, ActionError>,
    ) -> bool {
        if !self.inspect_flight.settle(ticket) || self.selected.as_deref() != Some(bairro) {
            log::debug!("Discarding stale lookup for {bairro}");
            return false;
        }
        match result {
            Ok(record) => {
                self.detail = Some(record);
                self.inspect = ActionStatus::Succeeded;
            }
            Err(e) => {
                self.detail = None;
                self.inspect = ActionStatus::Failed(e.user_message());
            }
        }
        true
    }
}

fn upload_success_message(receipt: &Receipt) -> String {
    let mut message = "File uploaded! Processing new data...".to_string();
    if let Some(rows) = receipt.rows_processed {
        message.push_str(&format!(" {rows} rows queued."));
    }
    if !receipt.errors.is_empty() {
        message.push_str(&format!(" {} warnings.", receipt.errors.len()));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::tests::record;

    fn snapshot(names: &[&str]) -> Snapshot {
        Snapshot {
            aggregations: names
                .iter()
                .enumerate()
                .map(|(i, n)| record(n, i as u64 + 1, None))
                .collect(),
            stats: None,
        }
    }

    #[test]
    fn test_in_flight_only_latest_settles() {
        let mut flight = InFlight::default();
        let first = flight.begin();
        let second = flight.begin();
        assert!(!flight.settle(first));
        assert!(flight.settle(second));
        assert!(!flight.settle(second));
    }

    #[test]
    fn test_refresh_reconciles_selection() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        let ticket = state.begin_refresh();
        state.finish_refresh(ticket, Ok(snapshot(&["Boa Viagem", "Centro"])));
        assert!(state.select("Centro"));

        let ticket = state.begin_refresh();
        state.finish_refresh(ticket, Ok(snapshot(&["Boa Viagem"])));
        assert_eq!(state.selected_name(), Some("Boa Viagem"));
        assert_eq!(state.refresh, ActionStatus::Succeeded);
    }

    #[test]
    fn test_initial_refresh_selects_first() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        assert!(state.initial_load);
        let ticket = state.begin_refresh();
        state.finish_refresh(ticket, Ok(snapshot(&["Pina", "Centro"])));
        assert!(!state.initial_load);
        assert_eq!(state.selected_name(), Some("Pina"));
    }

    #[test]
    fn test_failed_refresh_keeps_snapshot() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        let ticket = state.begin_refresh();
        state.finish_refresh(ticket, Ok(snapshot(&["Centro"])));

        let ticket = state.begin_refresh();
        assert!(state.refresh.is_loading());
        state.finish_refresh(
            ticket,
            Err(ActionError::Validation("offline".to_string())),
        );
        assert_eq!(state.aggregations.len(), 1);
        assert!(matches!(state.refresh, ActionStatus::Failed(_)));
        assert!(state.error_message.is_some());
        assert_eq!(state.selected_name(), Some("Centro"));
    }

    #[test]
    fn test_stale_refresh_dropped() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        let old = state.begin_refresh();
        let new = state.begin_refresh();
        assert!(state.finish_refresh(new, Ok(snapshot(&["Novo"]))));
        assert!(!state.finish_refresh(old, Ok(snapshot(&["Velho"]))));
        assert_eq!(state.aggregations[0].bairro, "Novo");
    }

    #[test]
    fn test_clear_invalidates_refresh() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        let ticket = state.begin_refresh();
        state.finish_refresh(ticket, Ok(snapshot(&["Centro"])));

        let pending_refresh = state.begin_refresh();
        let clear = state.begin_clear();
        state.finish_clear(clear, Ok(Receipt::default()));
        assert!(state.aggregations.is_empty());
        assert!(state.stats.is_none());
        assert_eq!(state.selected_name(), None);
        assert_eq!(state.refresh, ActionStatus::Idle);

        assert!(!state.finish_refresh(pending_refresh, Ok(snapshot(&["Centro"]))));
        assert!(state.aggregations.is_empty());
    }

    #[test]
    fn test_select_requires_known_bairro() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.apply_snapshot(snapshot(&["Centro"]));
        assert!(!state.select("Pina"));
        assert_eq!(state.selected_name(), Some("Centro"));
    }

    #[test]
    fn test_select_relative_follows_ranked_list() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        // totals 1, 2, 3 -> ranked C, B, A
        state.apply_snapshot(snapshot(&["A", "B", "C"]));
        assert_eq!(state.selected_name(), Some("A"));
        assert!(!state.select_relative(1));
        assert!(state.select_relative(-1));
        assert_eq!(state.selected_name(), Some("B"));
        assert!(state.select_relative(-5));
        assert_eq!(state.selected_name(), Some("C"));
    }

    #[test]
    fn test_upload_without_file_is_validation_error() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        let err = state.begin_upload().unwrap_err();
        assert!(matches!(err, ActionError::Validation(_)));
        assert_eq!(state.upload, ActionStatus::Idle);
        assert_eq!(
            state.upload_feedback.as_ref().map(|f| f.kind),
            Some(FeedbackKind::Error)
        );
    }

    #[test]
    fn test_failed_upload_keeps_file() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.selected_file = Some(PathBuf::from("dados.csv"));
        let (ticket, path) = state.begin_upload().unwrap();
        assert_eq!(path, PathBuf::from("dados.csv"));
        let refresh = state.finish_upload(ticket, Err(ActionError::Validation("bad".to_string())));
        assert!(!refresh);
        assert_eq!(state.selected_file, Some(PathBuf::from("dados.csv")));
        assert!(matches!(state.upload, ActionStatus::Failed(_)));
    }

    #[test]
    fn test_successful_upload_clears_file() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.selected_file = Some(PathBuf::from("dados.csv"));
        let (ticket, _) = state.begin_upload().unwrap();
        let receipt = Receipt {
            rows_processed: Some(42),
            ..Receipt::default()
        };
        assert!(state.finish_upload(ticket, Ok(receipt)));
        assert_eq!(state.selected_file, None);
        assert_eq!(state.upload, ActionStatus::Succeeded);
        let feedback = state.upload_feedback.unwrap();
        assert_eq!(feedback.kind, FeedbackKind::Success);
        assert!(feedback.message.contains("42 rows"));
    }

    #[test]
    fn test_inspect_dropped_after_selection_change() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        state.apply_snapshot(snapshot(&["A", "B"]));
        let (ticket, name) = state.begin_inspect().unwrap();
        assert_eq!(name, "A");
        state.select("B");
        assert!(!state.finish_inspect(ticket, &name, Ok(record("A", 1, None))));
        assert!(state.detail.is_none());
    }

    #[test]
    fn test_choose_file_rejects_non_csv() {
        let mut state = DashboardState::new(SelectionFallback::FetchOrder);
        assert!(state.choose_file(Path::new("relatorio.xlsx")).is_err());
        assert!(state.selected_file.is_none());
        assert!(state.upload_feedback.is_some());
    }
}
