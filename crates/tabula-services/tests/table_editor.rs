mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pretty_assertions::assert_eq;
use tabula_core::{ColumnMeta, Row, TableId, Value};
use tabula_grid::{
    CellFormat, CellPosition, ColumnFilter, DataFilter, EditSeed, FilterCondition, GridCommand,
    Key, KeyInput, SortSpec, ValidationRules, Viewport,
};
use tabula_services::{EditorConfig, ServiceError, StatusLevel};

fn pos(row: usize, col: usize) -> CellPosition {
    CellPosition::new(row, col)
}

#[tokio::test(start_paused = true)]
async fn open_loads_columns_and_rows() {
    let gateway = scores_gateway();
    let editor = open(gateway.clone()).await;

    assert_eq!(editor.snapshot().column_count(), 3);
    assert_eq!(editor.view(), &[0, 1, 2]);
    assert_eq!(editor.presented_value(pos(1, 1)), Some(&Value::from("Bruno")));
    assert_eq!(editor.controller().bounds(), (3, 3));
    assert_eq!(gateway.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_open_reuses_cached_fetch() {
    let gateway = scores_gateway();
    let (first, cache) = open_with(gateway.clone(), EditorConfig::default()).await;
    first.close().await.expect("close");

    let second = tabula_services::TableEditor::open(
        gateway.clone(),
        cache,
        TableId::new("main", "t"),
        EditorConfig::default(),
    )
    .await
    .expect("reopen");

    assert_eq!(second.snapshot().row_count(), 3);
    assert_eq!(gateway.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_on_a_cell_starts_an_edit_with_that_character() {
    let mut editor = open(scores_gateway()).await;
    editor.begin_selection(pos(2, 1)).await.expect("select");
    editor.end_selection();

    let command = editor
        .handle_key(KeyInput::char('5'))
        .await
        .expect("key");

    assert_eq!(
        command,
        GridCommand::BeginEdit {
            at: pos(2, 1),
            seed: EditSeed::Replace("5".to_string()),
        }
    );
    assert!(editor.controller().is_editing());
    assert_eq!(editor.session().map(|s| s.draft()), Some("5"));
}

#[tokio::test(start_paused = true)]
async fn committed_edit_waits_for_the_debounce() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");
    editor.handle_key(KeyInput::plain(Key::F2)).await.expect("F2");
    editor.set_draft("Carla");
    editor.commit().await.expect("commit");

    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("Carla")));
    assert_eq!(editor.pending_count(), 1);

    tokio::time::advance(Duration::from_millis(499)).await;
    assert_eq!(editor.tick().await.expect("tick"), 0);
    assert_eq!(gateway.statement_count(), 0);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(editor.tick().await.expect("tick"), 1);

    let statements = gateway.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].sql,
        r#"UPDATE "main"."t" SET "name" = ? WHERE "id" = ? RETURNING *"#
    );
    assert_eq!(statements[0].params, vec![Value::from("Carla"), Value::Int64(1)]);
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_write() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 2), "10").expect("first");
    tokio::time::advance(Duration::from_millis(300)).await;
    editor.edit_cell(pos(0, 2), "20").expect("second");
    tokio::time::advance(Duration::from_millis(300)).await;
    assert_eq!(editor.tick().await.expect("tick"), 0);

    tokio::time::advance(Duration::from_millis(200)).await;
    assert_eq!(editor.tick().await.expect("tick"), 1);

    let statements = gateway.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].params, vec![Value::Int64(20), Value::Int64(1)]);
}

#[tokio::test(start_paused = true)]
async fn moving_away_flushes_the_edited_cell() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");
    editor.handle_key(KeyInput::char('X')).await.expect("type");

    let command = editor
        .handle_key(KeyInput::plain(Key::Down))
        .await
        .expect("down");

    assert_eq!(
        command,
        GridCommand::CommitAndMove {
            from: pos(0, 1),
            to: pos(1, 1),
        }
    );
    assert_eq!(gateway.statement_count(), 1);
    assert_eq!(editor.pending_count(), 0);
    assert_eq!(gateway.stored_rows()[0].get("name"), Some(&Value::from("X")));
}

#[tokio::test(start_paused = true)]
async fn clicking_another_cell_flushes_a_pending_edit() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(1, 2)).await.expect("select");
    editor.edit_cell(pos(1, 2), "7").expect("edit");
    assert_eq!(gateway.statement_count(), 0);

    editor.begin_selection(pos(2, 2)).await.expect("select other");

    assert_eq!(gateway.statement_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn clearing_a_nullable_cell_writes_null() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "").expect("clear");
    editor.flush_all().await.expect("flush");

    assert_eq!(gateway.statements()[0].params[0], Value::Null);
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::Null));
}

#[tokio::test(start_paused = true)]
async fn clearing_a_not_null_cell_never_writes_null() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(1, 2), "  ").expect("clear");
    editor.flush_all().await.expect("flush");

    let statements = gateway.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].params[0], Value::Int64(0));
    assert_eq!(gateway.stored_rows()[1].get("score"), Some(&Value::Int64(0)));
}

#[tokio::test(start_paused = true)]
async fn clearing_not_null_without_default_uses_a_minimal_value() {
    let columns = vec![
        ColumnMeta::new("id", "integer").primary_key().auto_increment(),
        ColumnMeta::new("title", "varchar(80)").not_null(),
    ];
    let rows = vec![Row::new().with("id", 1i64).with("title", "Draft")];
    let gateway = Arc::new(MockGateway::new(columns, rows));
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "").expect("clear");
    editor.flush_all().await.expect("flush");

    assert_eq!(gateway.statements()[0].params[0], Value::from(""));
}

#[tokio::test(start_paused = true)]
async fn deleting_an_empty_cell_sends_nothing() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(2, 1)).await.expect("select");

    editor.handle_key(KeyInput::plain(Key::Delete)).await.expect("delete");
    editor.handle_key(KeyInput::plain(Key::Delete)).await.expect("delete again");

    assert_eq!(gateway.statement_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deleting_a_filled_cell_sends_one_write() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");

    editor.handle_key(KeyInput::plain(Key::Delete)).await.expect("delete");
    editor.handle_key(KeyInput::plain(Key::Delete)).await.expect("delete again");

    assert_eq!(gateway.statement_count(), 1);
    assert!(!editor.controller().is_editing());
}

#[tokio::test(start_paused = true)]
async fn copy_then_paste_shifts_the_block() {
    let gateway = letters_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");
    editor.extend_selection(pos(1, 2));
    editor.end_selection();

    let copied = editor.copy().expect("copied text");
    assert_eq!(copied, "a1\tb1\na2\tb2");

    editor.paste_at(pos(0, 3), &copied).await.expect("paste");

    assert_eq!(editor.presented_value(pos(0, 3)), Some(&Value::from("a1")));
    assert_eq!(editor.presented_value(pos(0, 4)), Some(&Value::from("b1")));
    assert_eq!(editor.presented_value(pos(1, 3)), Some(&Value::from("a2")));
    assert_eq!(editor.presented_value(pos(1, 4)), Some(&Value::from("b2")));
    assert_eq!(gateway.statement_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn paste_past_the_edge_is_clipped() {
    let gateway = letters_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.paste_at(pos(1, 4), "x\ty\nz\tw").await.expect("paste");

    assert_eq!(editor.presented_value(pos(1, 4)), Some(&Value::from("x")));
    assert_eq!(gateway.statement_count(), 1);
    assert_eq!(editor.status().map(|s| s.level), Some(StatusLevel::Info));
}

#[tokio::test(start_paused = true)]
async fn ctrl_v_pastes_the_last_copy() {
    let gateway = letters_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");
    editor.handle_key(KeyInput::ctrl(Key::Char('c'))).await.expect("copy");
    editor.begin_selection(pos(1, 3)).await.expect("select target");

    editor.handle_key(KeyInput::ctrl(Key::Char('v'))).await.expect("paste");

    assert_eq!(editor.presented_value(pos(1, 3)), Some(&Value::from("a1")));
}

#[tokio::test(start_paused = true)]
async fn formula_result_is_stored_as_a_static_value() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "=SOMA(C1:C3)").expect("formula");
    editor.flush_all().await.expect("flush");
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("6")));

    editor.edit_cell(pos(0, 2), "100").expect("change source");
    editor.flush_all().await.expect("flush");
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("6")));
}

#[tokio::test(start_paused = true)]
async fn broken_formula_stores_the_error_sentinel() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "=1/0").expect("formula");

    assert_eq!(
        editor.presented_value(pos(0, 1)),
        Some(&Value::from(tabula_grid::FORMULA_ERROR))
    );
}

#[tokio::test(start_paused = true)]
async fn unchanged_value_is_not_sent() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 2), "1").expect("same");
    editor.edit_cell(pos(0, 1), "Ana").expect("same");
    editor.flush_all().await.expect("flush");

    assert_eq!(gateway.statement_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn close_flushes_and_discard_drops() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.edit_cell(pos(0, 1), "Kept").expect("edit");
    editor.close().await.expect("close");
    assert_eq!(gateway.statement_count(), 1);

    let other = scores_gateway();
    let mut editor = open(other.clone()).await;
    editor.edit_cell(pos(0, 1), "Dropped").expect("edit");
    assert_eq!(editor.discard_pending(), 1);
    editor.close().await.expect("close");
    assert_eq!(other.statement_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn validation_rejects_before_sending() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor
        .set_filter(
            "name",
            ColumnFilter::validated_by(ValidationRules {
                pattern: Some("[A-Z].*".to_string()),
                ..Default::default()
            }),
        )
        .expect("filter");

    let err = editor.edit_cell(pos(0, 1), "lowercase").unwrap_err();

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(editor.pending_count(), 0);
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("Ana")));
    assert_eq!(editor.status().map(|s| s.level), Some(StatusLevel::Warning));
}

#[tokio::test(start_paused = true)]
async fn invalid_draft_keeps_the_session_open() {
    let mut editor = open(scores_gateway()).await;
    editor
        .set_filter(
            "score",
            ColumnFilter::validated_by(ValidationRules {
                max: Some(10.0),
                ..Default::default()
            }),
        )
        .expect("filter");
    editor.begin_selection(pos(0, 2)).await.expect("select");
    editor.handle_key(KeyInput::char('9')).await.expect("type");
    editor.handle_key(KeyInput::char('9')).await.expect("type");

    let result = editor.commit().await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    assert!(editor.controller().is_editing());
    assert_eq!(editor.session().map(|s| s.draft()), Some("99"));
}

#[tokio::test(start_paused = true)]
async fn close_reports_a_draft_that_fails_validation() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor
        .set_filter(
            "score",
            ColumnFilter::validated_by(ValidationRules {
                max: Some(10.0),
                ..Default::default()
            }),
        )
        .expect("filter");
    editor.edit_cell(pos(1, 1), "Bea").expect("edit");
    editor.begin_selection(pos(0, 2)).await.expect("select");
    editor.handle_key(KeyInput::char('9')).await.expect("type");
    editor.handle_key(KeyInput::char('9')).await.expect("type");

    let result = editor.close().await;

    assert!(matches!(result, Err(ServiceError::Validation(_))));
    // the valid pending write still went out, the rejected draft did not
    let statements = gateway.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].params[0], Value::from("Bea"));
    assert_eq!(gateway.stored_rows()[0].get("score"), Some(&Value::Int64(1)));
}

#[tokio::test(start_paused = true)]
async fn formula_ranges_are_clipped_to_the_table() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor
        .edit_cell(pos(0, 1), "=SUM(C1:C999999999)")
        .expect("formula");

    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("6")));
}

#[tokio::test(start_paused = true)]
async fn update_matching_no_rows_is_an_error() {
    let gateway = scores_gateway();
    gateway.match_nothing();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "Ghost").expect("edit");
    let err = editor.flush_all().await.unwrap_err();

    assert!(matches!(err, ServiceError::Mutation(_)));
    assert!(editor.status().map(|s| s.is_error()).unwrap_or(false));
    // Optimistic value stays without revert_on_failure
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("Ghost")));
}

#[tokio::test(start_paused = true)]
async fn failed_write_reverts_when_configured() {
    let gateway = scores_gateway();
    gateway.fail_with("constraint violated");
    let config = EditorConfig {
        revert_on_failure: true,
        ..Default::default()
    };
    let (mut editor, _) = open_with(gateway.clone(), config).await;

    editor.edit_cell(pos(0, 1), "One").expect("edit");
    editor.edit_cell(pos(0, 1), "Two").expect("edit");
    let err = editor.flush_all().await.unwrap_err();

    assert!(matches!(err, ServiceError::Mutation(_)));
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from("Ana")));
}

#[tokio::test(start_paused = true)]
async fn slow_gateway_times_out() {
    let gateway = scores_gateway();
    gateway.set_delay(Duration::from_secs(5));
    let config = EditorConfig {
        gateway_timeout: Some(Duration::from_secs(1)),
        ..Default::default()
    };
    let (mut editor, _) = open_with(gateway.clone(), config).await;

    editor.edit_cell(pos(0, 1), "Late").expect("edit");
    let err = editor.flush_all().await.unwrap_err();

    assert!(matches!(err, ServiceError::Timeout(_)));
}

#[tokio::test(start_paused = true)]
async fn new_row_is_inserted_then_updated_by_key() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    let at = editor.append_row().expect("row visible");
    assert_eq!(at, pos(3, 0));
    editor.edit_cell(pos(3, 1), "Dora").expect("edit");
    editor.flush_all().await.expect("insert");

    let statements = gateway.statements();
    assert_eq!(
        statements[0].sql,
        r#"INSERT INTO "main"."t" ("name") VALUES (?) RETURNING *"#
    );
    assert_eq!(editor.presented_value(pos(3, 0)), Some(&Value::Int64(4)));
    assert_eq!(editor.presented_value(pos(3, 2)), Some(&Value::Int64(0)));

    editor.edit_cell(pos(3, 2), "8").expect("edit");
    editor.flush_all().await.expect("update");
    let statements = gateway.statements();
    assert!(statements[1].sql.starts_with("UPDATE"));
    assert_eq!(statements[1].params, vec![Value::Int64(8), Value::Int64(4)]);
}

#[tokio::test(start_paused = true)]
async fn cached_snapshot_is_dropped_after_a_write() {
    let gateway = scores_gateway();
    let (mut editor, cache) = open_with(gateway.clone(), EditorConfig::default()).await;
    let table = TableId::new("main", "t");
    assert!(cache.get(&table, 200).is_some());

    editor.edit_cell(pos(0, 1), "Fresh").expect("edit");
    editor.flush_all().await.expect("flush");

    assert!(cache.get(&table, 200).is_none());
}

#[tokio::test(start_paused = true)]
async fn blank_edit_never_overwrites_attachments() {
    let columns = vec![
        ColumnMeta::new("id", "integer").primary_key(),
        ColumnMeta::new("files", "text"),
    ];
    let list = r#"[{"id": 1, "url": "https://cdn/a.png", "name": "a.png"}]"#;
    let rows = vec![Row::new().with("id", 1i64).with("files", list)];
    let gateway = Arc::new(MockGateway::new(columns, rows));
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(0, 1), "").expect("blank edit");
    editor.begin_selection(pos(0, 1)).await.expect("select");
    editor.delete_selection().await.expect("delete");
    editor.flush_all().await.expect("flush");

    assert_eq!(gateway.statement_count(), 0);
    assert_eq!(editor.presented_value(pos(0, 1)), Some(&Value::from(list)));
}

#[tokio::test(start_paused = true)]
async fn undo_and_redo_recommit_values() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;

    editor.edit_cell(pos(1, 1), "Beto").expect("edit");
    editor.flush_all().await.expect("flush");
    assert!(editor.can_undo());

    assert!(editor.undo().await.expect("undo"));
    assert_eq!(editor.presented_value(pos(1, 1)), Some(&Value::from("Bruno")));
    assert_eq!(gateway.stored_rows()[1].get("name"), Some(&Value::from("Bruno")));

    assert!(editor.redo().await.expect("redo"));
    assert_eq!(editor.presented_value(pos(1, 1)), Some(&Value::from("Beto")));
    assert_eq!(gateway.statement_count(), 3);
    assert!(!editor.can_redo());
}

#[tokio::test(start_paused = true)]
async fn undo_of_formatting_sends_nothing() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor.begin_selection(pos(0, 1)).await.expect("select");
    let addr = editor.address_at(pos(0, 1)).expect("address");

    editor.set_format(Some(CellFormat {
        bold: true,
        ..Default::default()
    }));
    assert!(editor.formats().get(&addr).map(|f| f.bold).unwrap_or(false));

    editor
        .handle_key(KeyInput::ctrl(Key::Char('z')))
        .await
        .expect("undo");

    assert_eq!(editor.formats().get(&addr), None);
    assert_eq!(gateway.statement_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn edits_through_a_sorted_view_hit_the_right_row() {
    let gateway = scores_gateway();
    let mut editor = open(gateway.clone()).await;
    editor
        .set_sort("score", Some(SortSpec::descending(0)))
        .expect("sort");
    assert_eq!(editor.view(), &[2, 1, 0]);

    editor.edit_cell(pos(0, 1), "Top").expect("edit");
    editor.flush_all().await.expect("flush");

    assert_eq!(gateway.statements()[0].params[1], Value::Int64(3));
    assert_eq!(gateway.stored_rows()[2].get("name"), Some(&Value::from("Top")));
}

#[tokio::test(start_paused = true)]
async fn filters_narrow_the_view() {
    let mut editor = open(scores_gateway()).await;
    editor
        .set_filter(
            "name",
            ColumnFilter::filtered_by(DataFilter::new(FilterCondition::Contains, "an")),
        )
        .expect("filter");

    assert_eq!(editor.view(), &[0]);
    assert_eq!(editor.controller().bounds(), (1, 3));

    editor.clear_filter("name");
    assert_eq!(editor.view().len(), 3);
    assert!(editor.set_filter("missing", ColumnFilter::default()).is_err());
}

#[tokio::test(start_paused = true)]
async fn visible_rows_span_the_whole_view_below_the_threshold() {
    let editor = open(scores_gateway()).await;
    let window = editor.visible_rows(Viewport {
        scroll_top: 0.0,
        height: 40.0,
    });

    assert_eq!(window.rows, 0..3);
    assert!(!window.virtualized);
}
