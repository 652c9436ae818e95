//! Table editor: one open table wired to selection, editing, sync and undo

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tabula_core::{
    attachment, CellAddress, ColumnMeta, PersistenceGateway, Row, TableId, TableSnapshot, Value, ViewState,
    ViewStateStore,
};
use tabula_grid::{
    apply_pipeline, copy_region, evaluate_or_sentinel, is_formula, visible_window, CellFormat,
    CellPosition, CellSource, ColumnFilter, EditSeed, FormatMap, FormatStore, GridCommand,
    GridController, GridError, KeyInput, LayoutState, PastePlan, RowWindow, Selection, SortSpec,
    UndoAction, UndoLog, UndoTarget, ValueMap, Viewport,
};
use tokio::time::Instant;

use crate::cache::SnapshotCache;
use crate::debounce::DebounceQueue;
use crate::edit_session::{EditSession, EditSessionManager};
use crate::error::{ServiceError, ServiceResult, StatusMessage};
use crate::synchronizer::{
    parse_input, resolve_clear, with_timeout, CellMutation, CellWrite, MutationSynchronizer,
};
use crate::validation::validate;

/// Editor tuning, usually derived from persisted settings
#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Rows fetched when a table opens
    pub initial_row_limit: usize,
    /// Quiet period before a committed cell is sent
    pub debounce: Duration,
    pub page_jump: usize,
    /// Restore the pre-edit row when a mutation fails
    pub revert_on_failure: bool,
    pub gateway_timeout: Option<Duration>,
    pub virtualization_threshold: usize,
    pub overscan: usize,
    pub default_row_height: f32,
    pub min_column_width: f32,
    pub undo_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_row_limit: 200,
            debounce: Duration::from_millis(500),
            page_jump: tabula_grid::navigation::DEFAULT_PAGE_JUMP,
            revert_on_failure: false,
            gateway_timeout: None,
            virtualization_threshold: tabula_grid::layout::DEFAULT_VIRTUALIZATION_THRESHOLD,
            overscan: tabula_grid::layout::DEFAULT_OVERSCAN,
            default_row_height: tabula_grid::layout::DEFAULT_ROW_HEIGHT,
            min_column_width: tabula_grid::layout::MIN_COLUMN_WIDTH,
            undo_limit: tabula_grid::history::DEFAULT_UNDO_LIMIT,
        }
    }
}

/// A write waiting in the debounce queue
#[derive(Debug, Clone)]
struct PendingWrite {
    write: CellWrite,
    /// Key value before the first optimistic edit of this cell
    key: Option<Value>,
    /// Row as it was before the first optimistic edit of this cell
    previous_row: Arc<Row>,
}

/// Collects what an undo/redo step writes
struct Replay<'a> {
    formats: &'a mut FormatStore,
    values: ValueMap,
}

impl UndoTarget for Replay<'_> {
    fn apply_formats(&mut self, formats: &FormatMap) {
        self.formats.apply_formats(formats);
    }

    fn apply_values(&mut self, values: &ValueMap) {
        self.values
            .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Formula references read the presented view
struct PresentedCells<'a> {
    editor: &'a TableEditor,
}

impl CellSource for PresentedCells<'_> {
    fn value_at(&self, row: usize, col: usize) -> Option<Value> {
        self.editor
            .presented_value(CellPosition::new(row, col))
            .cloned()
    }

    fn bounds(&self) -> Option<(usize, usize)> {
        Some((self.editor.view.len(), self.editor.snapshot.column_count()))
    }
}

/// One open table.
///
/// All grid logic runs synchronously; only flushing writes and opening the
/// table await the gateway.
pub struct TableEditor {
    synchronizer: MutationSynchronizer,
    config: EditorConfig,
    snapshot: TableSnapshot,
    filters: BTreeMap<String, ColumnFilter>,
    view: Vec<usize>,
    controller: GridController,
    sessions: EditSessionManager,
    pending: DebounceQueue<PendingWrite>,
    history: UndoLog,
    formats: FormatStore,
    layout: LayoutState,
    view_state_store: Option<Arc<dyn ViewStateStore>>,
    base_view_state: ViewState,
    clipboard: Option<String>,
    status: Option<StatusMessage>,
}

impl TableEditor {
    /// Fetch columns and the first rows of `table` (or reuse a fresh cache
    /// entry) and build the editor around them.
    #[tracing::instrument(skip(gateway, cache, table, config), fields(table = %table))]
    pub async fn open(
        gateway: Arc<dyn PersistenceGateway>,
        cache: Arc<SnapshotCache>,
        table: TableId,
        config: EditorConfig,
    ) -> ServiceResult<Self> {
        let limit = config.initial_row_limit;
        let (columns, rows): (Vec<ColumnMeta>, Vec<Row>) = match cache.get(&table, limit) {
            Some(cached) => (cached.columns, cached.rows.into_iter().take(limit).collect()),
            None => {
                let columns = with_timeout(
                    config.gateway_timeout,
                    "fetch columns",
                    gateway.fetch_columns(&table.schema, &table.table),
                )
                .await?;
                if columns.is_empty() {
                    return Err(ServiceError::NotFound(format!("table {}", table)));
                }
                let rows = with_timeout(
                    config.gateway_timeout,
                    "fetch rows",
                    gateway.fetch_rows(&table.schema, &table.table, limit),
                )
                .await?;
                cache.put(table.clone(), columns.clone(), rows.clone(), limit);
                (columns, rows)
            }
        };

        tracing::info!(
            table = %table,
            columns = columns.len(),
            rows = rows.len(),
            "Table opened"
        );

        let synchronizer =
            MutationSynchronizer::new(gateway, cache).with_timeout(config.gateway_timeout);
        let column_count = columns.len();
        let mut editor = Self {
            synchronizer,
            snapshot: TableSnapshot::new(table, columns, rows),
            filters: BTreeMap::new(),
            view: Vec::new(),
            controller: GridController::new(0, column_count).with_page_jump(config.page_jump),
            sessions: EditSessionManager::default(),
            pending: DebounceQueue::new(config.debounce),
            history: UndoLog::new(config.undo_limit),
            formats: FormatStore::default(),
            layout: LayoutState::new(config.default_row_height, config.min_column_width),
            view_state_store: None,
            base_view_state: ViewState::default(),
            clipboard: None,
            status: None,
            config,
        };
        editor.refresh_view();
        Ok(editor)
    }

    /// Restore layout from `store` and save it back on close.
    pub fn with_view_state_store(mut self, store: Arc<dyn ViewStateStore>) -> Self {
        match store.load(&self.snapshot.table().key()) {
            Ok(Some(state)) => {
                self.layout.apply_view_state(&state);
                self.base_view_state = state;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to load view state"),
        }
        self.view_state_store = Some(store);
        self
    }

    /// Commit any open edit, flush every pending write, persist the layout
    /// and release the table. A draft that fails to commit is reported
    /// after the other writes have been flushed.
    #[tracing::instrument(skip(self), fields(table = %self.snapshot.table()))]
    pub async fn close(mut self) -> ServiceResult<()> {
        let committed = self.commit_session(false).await;
        if let Err(e) = &committed {
            tracing::warn!(error = %e, "open edit was not committed on close");
        }
        let flushed = self.flush_all().await;
        if let Some(store) = &self.view_state_store {
            let state = self.view_state();
            if let Err(e) = store.save(&self.snapshot.table().key(), &state) {
                tracing::warn!(error = %e, "failed to save view state");
            }
        }
        tracing::info!(table = %self.snapshot.table(), "Table closed");
        committed.and(flushed.map(|_| ()))
    }

    pub fn table(&self) -> &TableId {
        self.snapshot.table()
    }

    pub fn snapshot(&self) -> &TableSnapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Snapshot row indices in presented order
    pub fn view(&self) -> &[usize] {
        &self.view
    }

    pub fn controller(&self) -> &GridController {
        &self.controller
    }

    pub fn selection(&self) -> &Selection {
        self.controller.selection()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.sessions.current()
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn take_status(&mut self) -> Option<StatusMessage> {
        self.status.take()
    }

    pub fn filters(&self) -> &BTreeMap<String, ColumnFilter> {
        &self.filters
    }

    pub fn formats(&self) -> &FormatStore {
        &self.formats
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut LayoutState {
        &mut self.layout
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Text held by the last copy or cut
    pub fn clipboard(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    /// Address of a presented position
    pub fn address_at(&self, pos: CellPosition) -> Option<CellAddress> {
        let row = *self.view.get(pos.row)?;
        let column = self.snapshot.columns().get(pos.col)?;
        self.snapshot.address(row, &column.name).ok()
    }

    /// Presented position of an address, if the row is in the view
    pub fn position_of(&self, addr: &CellAddress) -> Option<CellPosition> {
        let row = self.view.iter().position(|r| *r == addr.row)?;
        let col = self.snapshot.column_index(&addr.column)?;
        Some(CellPosition::new(row, col))
    }

    pub fn presented_value(&self, pos: CellPosition) -> Option<&Value> {
        let row = *self.view.get(pos.row)?;
        let column = self.snapshot.columns().get(pos.col)?;
        self.snapshot.value(row, &column.name)
    }

    /// Rows to render for a viewport, windowed above the threshold
    pub fn visible_rows(&self, viewport: Viewport) -> RowWindow {
        visible_window(
            self.view.len(),
            self.layout.row_height(),
            viewport,
            self.config.virtualization_threshold,
            self.config.overscan,
        )
    }

    pub fn view_state(&self) -> ViewState {
        self.layout.to_view_state(&self.base_view_state)
    }

    // ---- selection ----

    /// Pointer down on a cell. An open edit is committed and flushed first.
    pub async fn begin_selection(&mut self, pos: CellPosition) -> ServiceResult<()> {
        let previous = self.active_address();
        if self.sessions.is_active() {
            self.commit_session(true).await?;
        }
        self.controller.begin_selection(pos);
        self.flush_if_left(previous).await
    }

    pub fn extend_selection(&mut self, pos: CellPosition) {
        self.controller.extend_selection(pos);
    }

    pub fn end_selection(&mut self) {
        self.controller.end_selection();
    }

    pub fn select_row(&mut self, row: usize) {
        self.controller.select_row(row);
    }

    pub fn select_column(&mut self, name: &str) -> ServiceResult<()> {
        let col = self
            .snapshot
            .column_index(name)
            .ok_or_else(|| GridError::UnknownColumn(name.to_string()))?;
        self.controller.select_column(col);
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.controller.select_all();
    }

    pub fn clear_selection(&mut self) {
        self.controller.clear();
    }

    // ---- keyboard ----

    /// Interpret a key press and carry out the resulting command.
    pub async fn handle_key(&mut self, input: KeyInput) -> ServiceResult<GridCommand> {
        let previous = self.active_address();
        let command = self.controller.handle_key(input);
        match &command {
            GridCommand::None => {}
            GridCommand::SelectionChanged => self.flush_if_left(previous).await?,
            GridCommand::BeginEdit { at, seed } => self.begin_edit(*at, seed.clone()),
            GridCommand::DraftInsert(c) => {
                if let Some(session) = self.sessions.current_mut() {
                    session.insert_char(*c);
                }
            }
            GridCommand::DraftBackspace => {
                if let Some(session) = self.sessions.current_mut() {
                    session.backspace();
                }
            }
            GridCommand::CommitAndMove { .. } => {
                self.commit_session(true).await?;
                self.flush_if_left(previous).await?;
            }
            GridCommand::CancelEdit { .. } => {
                self.cancel();
            }
            GridCommand::Clear { cells } => self.clear_cells(cells).await?,
            GridCommand::Copy => {
                self.copy();
            }
            GridCommand::Cut => {
                self.cut().await?;
            }
            GridCommand::Paste { at } => {
                if let Some(text) = self.clipboard.clone() {
                    self.paste_at(*at, &text).await?;
                }
            }
            GridCommand::Undo => {
                self.undo().await?;
            }
            GridCommand::Redo => {
                self.redo().await?;
            }
        }
        Ok(command)
    }

    // ---- editing ----

    fn begin_edit(&mut self, at: CellPosition, seed: EditSeed) {
        let Some(addr) = self.address_at(at) else {
            self.controller.exit_editing();
            return;
        };
        let original = self.snapshot.value_at(&addr).cloned().unwrap_or(Value::Null);
        tracing::debug!(address = %addr, "edit session started");
        if let Some(stale) = self.sessions.begin(EditSession::new(addr, at, original, seed)) {
            tracing::warn!(address = %stale.address, "replaced an edit session that was still open");
        }
    }

    /// Replace the open session's draft, e.g. from a host text field
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let Some(session) = self.sessions.current_mut() {
            session.set_draft(text);
        }
    }

    /// Commit the open session; the write goes out after the debounce.
    pub async fn commit(&mut self) -> ServiceResult<()> {
        self.commit_session(false).await
    }

    /// Commit the open session and send it right away.
    pub async fn commit_and_flush(&mut self) -> ServiceResult<()> {
        self.commit_session(true).await
    }

    /// Discard the open session. The snapshot still holds the original
    /// value, so nothing is sent.
    pub fn cancel(&mut self) -> Option<Value> {
        self.controller.exit_editing();
        let original = self.sessions.cancel();
        if original.is_some() {
            tracing::debug!("edit session cancelled");
        }
        original
    }

    async fn commit_session(&mut self, flush: bool) -> ServiceResult<()> {
        let Some(session) = self.sessions.finish() else {
            return Ok(());
        };
        self.controller.exit_editing();
        let addr = session.address.clone();
        if session.is_dirty() {
            match self.stage_text(&addr, session.draft()) {
                Ok(Some((before, after))) => self.record_values("Edit cell", &addr, before, after),
                Ok(None) => {}
                Err(e) => {
                    self.status = Some(StatusMessage::from(&e));
                    if matches!(e, ServiceError::Validation(_)) {
                        self.controller.resume_editing(session.position);
                        self.sessions.begin(session);
                    }
                    return Err(e);
                }
            }
            self.refresh_view();
        }
        if flush {
            self.flush_address(&addr).await?;
        }
        Ok(())
    }

    /// Write text to the cell at a presented position as if it had been
    /// typed and committed. The write is debounced.
    pub fn edit_cell(&mut self, pos: CellPosition, text: &str) -> ServiceResult<()> {
        let addr = self
            .address_at(pos)
            .ok_or(GridError::OutOfBounds {
                row: pos.row,
                col: pos.col,
            })?;
        let staged = self.stage_text(&addr, text).inspect_err(|e| {
            self.status = Some(StatusMessage::from(e));
        });
        if let Some((before, after)) = staged? {
            self.record_values("Edit cell", &addr, before, after);
        }
        self.refresh_view();
        Ok(())
    }

    /// Normalize, validate and optimistically apply committed text, then
    /// queue the write. Returns the old and new value when the cell changed.
    fn stage_text(&mut self, addr: &CellAddress, text: &str) -> ServiceResult<Option<(Value, Value)>> {
        let column = self
            .snapshot
            .column(&addr.column)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("column '{}'", addr.column)))?;
        let current = self
            .snapshot
            .value_at(addr)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("row {}", addr.row)))?;

        let text = if is_formula(text) {
            self.evaluate(text)
        } else {
            text.to_string()
        };
        let blank = text.trim().is_empty();

        if blank && attachment::has_attachments(&current) {
            tracing::debug!(address = %addr, "ignoring blank edit over attachments");
            self.status = Some(StatusMessage::info("Attachments were kept"));
            return Ok(None);
        }

        if let Some(rules) = self
            .filters
            .get(&addr.column)
            .and_then(|f| f.validation.as_ref())
        {
            validate(&addr.column, &text, rules)?;
        }

        let write = if blank {
            resolve_clear(&column)
        } else {
            CellWrite::Set(parse_input(&text, &column))
        };
        let CellWrite::Set(new_value) = &write else {
            tracing::debug!(address = %addr, "column keeps its default");
            return Ok(None);
        };
        if values_equivalent(&current, new_value) {
            return Ok(None);
        }
        let new_value = new_value.clone();
        self.stage_write(addr, write)?;
        Ok(Some((current, new_value)))
    }

    /// Apply a write to the snapshot and (re)schedule it.
    fn stage_write(&mut self, addr: &CellAddress, write: CellWrite) -> ServiceResult<()> {
        let row = self
            .snapshot
            .row(addr.row)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("row {}", addr.row)))?;
        // The first edit in a burst decides the key and the rollback row
        let (key, previous_row) = match self.pending.get(addr) {
            Some(p) => (p.key.clone(), Arc::clone(&p.previous_row)),
            None => (self.snapshot.key_value(addr.row).cloned(), row),
        };
        if let CellWrite::Set(value) = &write {
            self.snapshot.set_cell(addr.row, &addr.column, value.clone())?;
        }
        self.pending.schedule(
            addr.clone(),
            PendingWrite {
                write,
                key,
                previous_row,
            },
        );
        Ok(())
    }

    fn record_values(&mut self, label: &str, addr: &CellAddress, before: Value, after: Value) {
        let mut b = ValueMap::new();
        b.insert(addr.clone(), before);
        let mut a = ValueMap::new();
        a.insert(addr.clone(), after);
        self.history
            .push(UndoAction::values(format!("{label} {}", addr.column), b, a));
    }

    fn evaluate(&self, text: &str) -> String {
        evaluate_or_sentinel(text, &PresentedCells { editor: self })
    }

    // ---- clearing, clipboard ----

    /// Clear the selected cells without entering editing.
    pub async fn delete_selection(&mut self) -> ServiceResult<()> {
        let (rows, cols) = self.controller.bounds();
        let cells = self.controller.selection().cells(rows, cols);
        self.clear_cells(&cells).await
    }

    async fn clear_cells(&mut self, cells: &[CellPosition]) -> ServiceResult<()> {
        let addresses: Vec<CellAddress> =
            cells.iter().filter_map(|p| self.address_at(*p)).collect();
        let mut before = ValueMap::new();
        let mut after = ValueMap::new();
        let mut first_error = None;
        for addr in &addresses {
            let already_empty = self
                .snapshot
                .value_at(addr)
                .map(Value::is_blank)
                .unwrap_or(true);
            if already_empty {
                continue;
            }
            match self.stage_text(addr, "") {
                Ok(Some((b, a))) => {
                    before.insert(addr.clone(), b);
                    after.insert(addr.clone(), a);
                }
                Ok(None) => {}
                Err(e) => {
                    self.status = Some(StatusMessage::from(&e));
                    first_error.get_or_insert(e);
                }
            }
        }
        if !after.is_empty() {
            let keys: Vec<CellAddress> = after.keys().cloned().collect();
            self.history.push(UndoAction::values("Clear cells", before, after));
            self.refresh_view();
            if let Err(e) = self.flush_addresses(&keys).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Serialize the selection as tab/newline text and keep it as the
    /// clipboard.
    pub fn copy(&mut self) -> Option<String> {
        let (rows, cols) = self.controller.bounds();
        let regions = self.controller.selection().regions(rows, cols);
        if regions.is_empty() {
            return None;
        }
        let text = regions
            .iter()
            .map(|region| {
                copy_region(*region, |pos| {
                    self.presented_value(pos)
                        .map(Value::display_text)
                        .unwrap_or_default()
                })
            })
            .collect::<Vec<_>>()
            .join("\n");
        self.clipboard = Some(text.clone());
        Some(text)
    }

    /// Copy, then clear the selection
    pub async fn cut(&mut self) -> ServiceResult<Option<String>> {
        let text = self.copy();
        if text.is_some() {
            self.delete_selection().await?;
        }
        Ok(text)
    }

    /// Paste at the selection's top-left cell
    pub async fn paste(&mut self, text: &str) -> ServiceResult<()> {
        let at = self
            .controller
            .selection()
            .region()
            .map(|r| r.top_left())
            .or(self.controller.active())
            .unwrap_or_default();
        self.paste_at(at, text).await
    }

    /// Write tab/newline text starting at `at`, clipped to the table.
    pub async fn paste_at(&mut self, at: CellPosition, text: &str) -> ServiceResult<()> {
        let (rows, cols) = self.controller.bounds();
        let plan = PastePlan::new(text, at, rows, cols);
        let writes: Vec<(CellAddress, String)> = plan
            .writes
            .into_iter()
            .filter_map(|(pos, value)| self.address_at(pos).map(|addr| (addr, value)))
            .collect();

        let mut before = ValueMap::new();
        let mut after = ValueMap::new();
        let mut first_error = None;
        for (addr, value) in &writes {
            match self.stage_text(addr, value) {
                Ok(Some((b, a))) => {
                    before.insert(addr.clone(), b);
                    after.insert(addr.clone(), a);
                }
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if plan.clipped > 0 {
            self.status = Some(StatusMessage::info(format!(
                "{} pasted values fell outside the table",
                plan.clipped
            )));
        }
        if let Some(e) = &first_error {
            self.status = Some(StatusMessage::from(e));
        }
        if !after.is_empty() {
            let keys: Vec<CellAddress> = after.keys().cloned().collect();
            self.history.push(UndoAction::values("Paste", before, after));
            self.refresh_view();
            if let Err(e) = self.flush_addresses(&keys).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ---- undo / redo / formatting ----

    pub async fn undo(&mut self) -> ServiceResult<bool> {
        let mut replay = Replay {
            formats: &mut self.formats,
            values: ValueMap::new(),
        };
        let Some(label) = self.history.undo(&mut replay).map(|a| a.label.clone()) else {
            self.status = Some(StatusMessage::info("Nothing to undo"));
            return Ok(false);
        };
        let values = replay.values;
        self.replay_values(values).await?;
        self.status = Some(StatusMessage::info(format!("Undid {label}")));
        Ok(true)
    }

    pub async fn redo(&mut self) -> ServiceResult<bool> {
        let mut replay = Replay {
            formats: &mut self.formats,
            values: ValueMap::new(),
        };
        let Some(label) = self.history.redo(&mut replay).map(|a| a.label.clone()) else {
            self.status = Some(StatusMessage::info("Nothing to redo"));
            return Ok(false);
        };
        let values = replay.values;
        self.replay_values(values).await?;
        self.status = Some(StatusMessage::info(format!("Redid {label}")));
        Ok(true)
    }

    /// Re-commit values from the undo log through the synchronizer
    async fn replay_values(&mut self, values: ValueMap) -> ServiceResult<()> {
        let mut staged = Vec::new();
        for (addr, value) in values {
            let unchanged = self
                .snapshot
                .value_at(&addr)
                .map(|current| current == &value)
                .unwrap_or(true);
            if unchanged {
                continue;
            }
            self.stage_write(&addr, CellWrite::Set(value))?;
            staged.push(addr);
        }
        self.refresh_view();
        self.flush_addresses(&staged).await
    }

    /// Format (or clear the format of) every selected cell
    pub fn set_format(&mut self, format: Option<CellFormat>) {
        let (rows, cols) = self.controller.bounds();
        let addresses: Vec<CellAddress> = self
            .controller
            .selection()
            .cells(rows, cols)
            .into_iter()
            .filter_map(|p| self.address_at(p))
            .collect();
        if addresses.is_empty() {
            return;
        }
        let action = self.formats.set_format(&addresses, format);
        self.history.push(action);
    }

    // ---- filters ----

    pub fn set_filter(&mut self, column: &str, filter: ColumnFilter) -> ServiceResult<()> {
        if self.snapshot.column(column).is_none() {
            return Err(GridError::UnknownColumn(column.to_string()).into());
        }
        self.filters.insert(column.to_string(), filter);
        self.refresh_view();
        Ok(())
    }

    /// Set or remove only the sort part of a column's settings
    pub fn set_sort(&mut self, column: &str, sort: Option<SortSpec>) -> ServiceResult<()> {
        let mut filter = self.filters.get(column).cloned().unwrap_or_default();
        filter.sorting = sort;
        self.set_filter(column, filter)
    }

    pub fn clear_filter(&mut self, column: &str) {
        if self.filters.remove(column).is_some() {
            self.refresh_view();
        }
    }

    fn refresh_view(&mut self) {
        let columns = self.snapshot.column_names();
        self.view = apply_pipeline(self.snapshot.rows(), &columns, &self.filters);
        self.controller
            .set_bounds(self.view.len(), self.snapshot.column_count());
    }

    // ---- rows ----

    /// Append an empty local row. The first edit in it inserts the row.
    pub fn append_row(&mut self) -> Option<CellPosition> {
        let row = Row::from_pairs(
            self.snapshot
                .columns()
                .iter()
                .map(|c| (c.name.clone(), Value::Null)),
        );
        let index = self.snapshot.push_row(row);
        self.refresh_view();
        let pos = self.view.iter().position(|r| *r == index)?;
        Some(CellPosition::new(pos, 0))
    }

    // ---- flushing ----

    /// Send every write whose debounce deadline has passed.
    pub async fn tick(&mut self) -> ServiceResult<usize> {
        let due = self.pending.take_due(Instant::now());
        self.send_all(due).await
    }

    /// Send every pending write now.
    pub async fn flush_all(&mut self) -> ServiceResult<usize> {
        let all = self.pending.drain();
        self.send_all(all).await
    }

    /// Drop pending writes without sending them. The optimistic values stay
    /// in the snapshot.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.discard_all();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending writes");
        }
        dropped
    }

    async fn flush_if_left(&mut self, previous: Option<CellAddress>) -> ServiceResult<()> {
        match previous {
            Some(prev) if self.active_address().as_ref() != Some(&prev) => {
                self.flush_address(&prev).await
            }
            _ => Ok(()),
        }
    }

    async fn flush_address(&mut self, addr: &CellAddress) -> ServiceResult<()> {
        match self.pending.take(addr) {
            Some(pending) => self.send(addr, pending).await,
            None => Ok(()),
        }
    }

    async fn flush_addresses(&mut self, addrs: &[CellAddress]) -> ServiceResult<()> {
        let mut first_error = None;
        for addr in addrs {
            if let Err(e) = self.flush_address(addr).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn send_all(&mut self, entries: Vec<(CellAddress, PendingWrite)>) -> ServiceResult<usize> {
        let mut sent = 0;
        let mut first_error = None;
        for (addr, pending) in entries {
            match self.send(&addr, pending).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(sent), Err)
    }

    async fn send(&mut self, addr: &CellAddress, pending: PendingWrite) -> ServiceResult<()> {
        let PendingWrite {
            write,
            key,
            previous_row,
        } = pending;
        let mutation = CellMutation {
            address: addr.clone(),
            write,
            key,
        };
        match self.synchronizer.apply(&self.snapshot, &mutation).await {
            Ok(outcome) => {
                if let Some(row) = outcome.row() {
                    self.snapshot.replace_row(addr.row, row.clone())?;
                    self.refresh_view();
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(address = %addr, error = %e, "cell write failed");
                if self.config.revert_on_failure {
                    self.snapshot
                        .replace_row(addr.row, Row::clone(&previous_row))?;
                    self.refresh_view();
                }
                self.status = Some(StatusMessage::from(&e));
                Err(e)
            }
        }
    }

    fn active_address(&self) -> Option<CellAddress> {
        self.controller.active().and_then(|p| self.address_at(p))
    }
}

/// Same value, allowing for representation differences such as `Int64(1)`
/// from the store versus a parsed `Float64(1.0)`.
fn values_equivalent(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if !matches!(a, Value::String(_)) && !matches!(b, Value::String(_)) => {
            x == y
        }
        _ => a.display_text() == b.display_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalence_ignores_numeric_representation() {
        assert!(values_equivalent(&Value::Int64(1), &Value::Float64(1.0)));
        assert!(values_equivalent(&Value::Int64(5), &Value::from("5")));
        assert!(!values_equivalent(&Value::Null, &Value::from("")));
        assert!(!values_equivalent(&Value::from("01"), &Value::Int64(1)));
    }
}
