//! Line-oriented editing scripts
//!
//! One command per line; blank lines and `#` comments are skipped. Cells use
//! spreadsheet notation over the presented view (`B3` is the third visible
//! row, second column).

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tabula_grid::{
    parse_column_letters, CellFormat, CellPosition, ColumnFilter, DataFilter, FilterCondition,
    Key, KeyInput, SortSpec,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Click a cell, or click and drag across a range
    Select {
        from: CellPosition,
        to: Option<CellPosition>,
    },
    SelectRow(usize),
    SelectColumn(String),
    SelectAll,
    Key(KeyInput),
    /// Each character as a key press
    Type(String),
    Edit {
        at: CellPosition,
        text: String,
    },
    Draft(String),
    Commit,
    CommitAndFlush,
    Cancel,
    Copy,
    Cut,
    Paste(Option<CellPosition>),
    Delete,
    Undo,
    Redo,
    Sort {
        column: String,
        spec: Option<SortSpec>,
    },
    Filter {
        column: String,
        filter: DataFilter,
    },
    Unfilter(String),
    Format(Option<CellFormat>),
    Append,
    /// Sleep, then send whatever came due
    Wait(Duration),
    Tick,
    Flush,
    Discard,
    Show,
    Status,
}

/// Parse one script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "select" => match rest.split_once(':') {
            Some((from, to)) => ScriptCommand::Select {
                from: parse_cell(from)?,
                to: Some(parse_cell(to)?),
            },
            None => ScriptCommand::Select {
                from: parse_cell(rest)?,
                to: None,
            },
        },
        "row" => {
            let n: usize = rest.parse().with_context(|| format!("invalid row number '{rest}'"))?;
            if n == 0 {
                bail!("rows are numbered from 1");
            }
            ScriptCommand::SelectRow(n - 1)
        }
        "column" => ScriptCommand::SelectColumn(required(rest, "column name")?.to_string()),
        "all" => ScriptCommand::SelectAll,
        "key" => ScriptCommand::Key(parse_key(rest)?),
        "type" => ScriptCommand::Type(rest.to_string()),
        "edit" => {
            let (cell, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            ScriptCommand::Edit {
                at: parse_cell(cell)?,
                text: text.trim_start().to_string(),
            }
        }
        "draft" => ScriptCommand::Draft(rest.to_string()),
        "commit" => ScriptCommand::Commit,
        "commit!" => ScriptCommand::CommitAndFlush,
        "cancel" => ScriptCommand::Cancel,
        "copy" => ScriptCommand::Copy,
        "cut" => ScriptCommand::Cut,
        "paste" if rest.is_empty() => ScriptCommand::Paste(None),
        "paste" => ScriptCommand::Paste(Some(parse_cell(rest)?)),
        "delete" => ScriptCommand::Delete,
        "undo" => ScriptCommand::Undo,
        "redo" => ScriptCommand::Redo,
        "sort" => {
            let (column, direction) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: sort <column> asc|desc|none"))?;
            let spec = match direction.trim().to_ascii_lowercase().as_str() {
                "asc" => Some(SortSpec::ascending(0)),
                "desc" => Some(SortSpec::descending(0)),
                "none" => None,
                other => bail!("unknown sort direction '{other}'"),
            };
            ScriptCommand::Sort {
                column: column.to_string(),
                spec,
            }
        }
        "filter" => parse_filter(rest)?,
        "unfilter" => ScriptCommand::Unfilter(required(rest, "column name")?.to_string()),
        "format" => ScriptCommand::Format(match rest.to_ascii_lowercase().as_str() {
            "bold" => Some(CellFormat {
                bold: true,
                ..Default::default()
            }),
            "italic" => Some(CellFormat {
                italic: true,
                ..Default::default()
            }),
            "clear" => None,
            other => bail!("unknown format '{other}'"),
        }),
        "append" => ScriptCommand::Append,
        "wait" => {
            let ms: u64 = rest
                .trim_end_matches("ms")
                .parse()
                .with_context(|| format!("invalid duration '{rest}'"))?;
            ScriptCommand::Wait(Duration::from_millis(ms))
        }
        "tick" => ScriptCommand::Tick,
        "flush" => ScriptCommand::Flush,
        "discard" => ScriptCommand::Discard,
        "show" => ScriptCommand::Show,
        "status" => ScriptCommand::Status,
        other => bail!("unknown command '{other}'"),
    };
    Ok(Some(command))
}

fn required<'a>(text: &'a str, what: &str) -> Result<&'a str> {
    if text.is_empty() {
        bail!("missing {what}");
    }
    Ok(text)
}

/// `B3` to view row 2, column 1
pub fn parse_cell(text: &str) -> Result<CellPosition> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| anyhow!("invalid cell '{text}'"))?;
    let (letters, digits) = text.split_at(split);
    let col = parse_column_letters(letters).ok_or_else(|| anyhow!("invalid column in '{text}'"))?;
    let row: usize = digits
        .parse()
        .with_context(|| format!("invalid row in '{text}'"))?;
    if row == 0 {
        bail!("rows are numbered from 1 in '{text}'");
    }
    Ok(CellPosition::new(row - 1, col))
}

/// `down`, `shift+tab`, `ctrl+c`, `f2`, or a single character
pub fn parse_key(text: &str) -> Result<KeyInput> {
    let mut ctrl = false;
    let mut shift = false;
    let mut name = text.trim();
    loop {
        let lower = name.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("ctrl+") {
            ctrl = true;
            name = &name[name.len() - rest.len()..];
        } else if let Some(rest) = lower.strip_prefix("shift+") {
            shift = true;
            name = &name[name.len() - rest.len()..];
        } else {
            break;
        }
    }

    let key = match name.to_ascii_lowercase().as_str() {
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "tab" => Key::Tab,
        "enter" | "return" => Key::Enter,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "f2" => Key::F2,
        "delete" | "del" => Key::Delete,
        "backspace" => Key::Backspace,
        "escape" | "esc" => Key::Escape,
        "space" => Key::Char(' '),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Char(c),
                _ => bail!("unknown key '{text}'"),
            }
        }
    };
    Ok(KeyInput { key, shift, ctrl })
}

fn parse_filter(rest: &str) -> Result<ScriptCommand> {
    let mut parts = rest.splitn(3, char::is_whitespace);
    let column = parts
        .next()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow!("usage: filter <column> <condition> [value]"))?;
    let condition = match parts.next().map(str::to_ascii_lowercase).as_deref() {
        Some("equals") | Some("=") => FilterCondition::Equals,
        Some("contains") => FilterCondition::Contains,
        Some("starts") | Some("startswith") => FilterCondition::StartsWith,
        Some("ends") | Some("endswith") => FilterCondition::EndsWith,
        Some("empty") => FilterCondition::Empty,
        Some("notempty") => FilterCondition::NotEmpty,
        Some(other) => bail!("unknown filter condition '{other}'"),
        None => bail!("usage: filter <column> <condition> [value]"),
    };
    let value = parts.next().unwrap_or("").trim();
    if condition.requires_value() && value.is_empty() {
        bail!("filter condition '{}' needs a value", condition.label());
    }
    Ok(ScriptCommand::Filter {
        column: column.to_string(),
        filter: DataFilter::new(condition, value),
    })
}

/// Keep the column's other settings when changing only its data filter
pub fn merge_filter(existing: Option<&ColumnFilter>, filter: DataFilter) -> ColumnFilter {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.data_filter = Some(filter);
    merged
}
