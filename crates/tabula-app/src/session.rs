//! Runs script commands against an open table editor

use anyhow::Result;
use std::io::Write;
use tabula_services::{ServiceResult, TableEditor};

use crate::render::{render_status, render_view};
use crate::script::{merge_filter, ScriptCommand};

/// Execute one command. Editing failures are reported to `out` and do not
/// stop the script; only output errors are returned.
pub async fn run_command(
    editor: &mut TableEditor,
    command: ScriptCommand,
    out: &mut impl Write,
) -> Result<()> {
    tracing::debug!(?command, "running script command");
    let result = apply(editor, command, out).await?;
    if let Err(e) = result {
        tracing::warn!(error = %e, "script command failed");
        writeln!(out, "error: {e}")?;
    }
    Ok(())
}

async fn apply(
    editor: &mut TableEditor,
    command: ScriptCommand,
    out: &mut impl Write,
) -> Result<ServiceResult<()>> {
    let result = match command {
        ScriptCommand::Select { from, to } => {
            let clicked = editor.begin_selection(from).await;
            if let Some(to) = to {
                editor.extend_selection(to);
            }
            editor.end_selection();
            clicked
        }
        ScriptCommand::SelectRow(row) => {
            editor.select_row(row);
            Ok(())
        }
        ScriptCommand::SelectColumn(name) => editor.select_column(&name),
        ScriptCommand::SelectAll => {
            editor.select_all();
            Ok(())
        }
        ScriptCommand::Key(input) => editor.handle_key(input).await.map(|_| ()),
        ScriptCommand::Type(text) => {
            let mut result = Ok(());
            for c in text.chars() {
                result = editor.handle_key(tabula_grid::KeyInput::char(c)).await.map(|_| ());
                if result.is_err() {
                    break;
                }
            }
            result
        }
        ScriptCommand::Edit { at, text } => editor.edit_cell(at, &text),
        ScriptCommand::Draft(text) => {
            editor.set_draft(text);
            Ok(())
        }
        ScriptCommand::Commit => editor.commit().await,
        ScriptCommand::CommitAndFlush => editor.commit_and_flush().await,
        ScriptCommand::Cancel => {
            editor.cancel();
            Ok(())
        }
        ScriptCommand::Copy => {
            if let Some(text) = editor.copy() {
                writeln!(out, "{text}")?;
            }
            Ok(())
        }
        ScriptCommand::Cut => editor.cut().await.map(|_| ()),
        ScriptCommand::Paste(at) => match editor.clipboard().map(str::to_string) {
            Some(text) => match at {
                Some(at) => editor.paste_at(at, &text).await,
                None => editor.paste(&text).await,
            },
            None => {
                writeln!(out, "clipboard is empty")?;
                Ok(())
            }
        },
        ScriptCommand::Delete => editor.delete_selection().await,
        ScriptCommand::Undo => editor.undo().await.map(|_| ()),
        ScriptCommand::Redo => editor.redo().await.map(|_| ()),
        ScriptCommand::Sort { column, spec } => editor.set_sort(&column, spec),
        ScriptCommand::Filter { column, filter } => {
            let merged = merge_filter(editor.filters().get(&column), filter);
            editor.set_filter(&column, merged)
        }
        ScriptCommand::Unfilter(column) => {
            editor.clear_filter(&column);
            Ok(())
        }
        ScriptCommand::Format(format) => {
            editor.set_format(format);
            Ok(())
        }
        ScriptCommand::Append => match editor.append_row() {
            Some(pos) => {
                let clicked = editor.begin_selection(pos).await;
                editor.end_selection();
                clicked
            }
            None => Ok(()),
        },
        ScriptCommand::Wait(duration) => {
            tokio::time::sleep(duration).await;
            editor.tick().await.map(|_| ())
        }
        ScriptCommand::Tick => editor.tick().await.map(|_| ()),
        ScriptCommand::Flush => editor.flush_all().await.map(|_| ()),
        ScriptCommand::Discard => {
            let dropped = editor.discard_pending();
            writeln!(out, "discarded {dropped} pending writes")?;
            Ok(())
        }
        ScriptCommand::Show => {
            writeln!(out, "{}", render_view(editor))?;
            Ok(())
        }
        ScriptCommand::Status => {
            match editor.status() {
                Some(status) => writeln!(out, "{}", render_status(status))?,
                None => writeln!(out, "ok")?,
            }
            writeln!(out, "pending writes: {}", editor.pending_count())?;
            Ok(())
        }
    };
    Ok(result)
}
