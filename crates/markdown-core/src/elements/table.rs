use crate::actions::{Action, ActionLocation, ActionState, ActionType};
use crate::content::{ContentType, conforms_opt};
use crate::editor::{Editor, NodeEntry};
use crate::error::{EditorError, FactoryError};
use crate::location::child_path;
use crate::node::{Node, TABLE, TABLE_CELL, TABLE_ROW};
use crate::registry::{ElementConfig, MarkdownPlugin};

const DEFAULT_SIZE: u64 = 2;
const MAX_SIZE: u64 = 64;

fn empty_cell() -> Node {
    Node::element(TABLE_CELL, vec![Node::text("")])
}

fn empty_row(cols: usize) -> Node {
    Node::element(TABLE_ROW, (0..cols).map(|_| empty_cell()).collect())
}

fn rows_of(editor: &Editor, table: &NodeEntry) -> Vec<NodeEntry> {
    editor
        .document()
        .children_of(table.id)
        .iter()
        .filter(|id| editor.node(**id).is_some_and(|n| n.is_type(TABLE_ROW)))
        .filter_map(|id| editor.entry(*id))
        .collect()
}

fn width_of(editor: &Editor, rows: &[NodeEntry]) -> usize {
    rows.iter()
        .map(|row| editor.document().children_of(row.id).len())
        .max()
        .unwrap_or(0)
}

/// Pads short rows with empty cells, one cell per pass.
fn pad_rows(editor: &mut Editor, table: &NodeEntry) -> Result<(), EditorError> {
    let rows = rows_of(editor, table);
    let width = width_of(editor, &rows);
    for row in rows {
        let len = editor.document().children_of(row.id).len();
        if len > 0 && len < width {
            editor.insert_node(&child_path(&row.path, len), empty_cell())?;
            return Ok(());
        }
    }
    Ok(())
}

fn size_param(state: &ActionState, key: &str) -> usize {
    let size = state
        .param_u64(key)
        .unwrap_or(DEFAULT_SIZE)
        .clamp(1, MAX_SIZE);
    usize::try_from(size).unwrap_or(2)
}

/// Turns a table back into a paragraph of its cell texts.
fn table_to_paragraph(editor: &mut Editor, table: &NodeEntry) -> Result<bool, EditorError> {
    let text = rows_of(editor, table)
        .iter()
        .flat_map(|row| editor.document().children_of(row.id).to_vec())
        .map(|cell| editor.string(cell))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let path = table.path.clone();
    editor.without_normalizing(|editor| {
        editor.remove_node(&path)?;
        editor.insert_node(&path, Node::paragraph(text))?;
        if let Some(id) = editor.document().resolve(&path) {
            editor.select_end_of(id);
        }
        Ok(true)
    })
}

fn table_at_focus(editor: &Editor, location: &ActionLocation) -> Option<NodeEntry> {
    let range = location.range()?;
    let entry = editor.entry_at(&range.focus.path)?;
    editor.nearest(&entry, TABLE)
}

/// Replaces a text block with a `rows` x `cols` table. The block text moves
/// into the first cell.
fn block_to_table(
    editor: &mut Editor,
    block: &NodeEntry,
    rows: usize,
    cols: usize,
) -> Result<bool, EditorError> {
    let text = editor.string(block.id);
    let mut table: Vec<Node> = (0..rows).map(|_| empty_row(cols)).collect();
    if let Some(Node::Element(row)) = table.first_mut()
        && let Some(cell) = row.children.first_mut()
    {
        *cell = Node::element(TABLE_CELL, vec![Node::text(text)]);
    }
    let path = block.path.clone();
    editor.without_normalizing(|editor| {
        editor.remove_node(&path)?;
        editor.insert_node(&path, Node::element(TABLE, table))?;
        if let Some(id) = editor.document().resolve(&child_path(&child_path(&path, 0), 0)) {
            editor.select_end_of(id);
        }
        Ok(true)
    })
}

/// Where a table edit applies: the table around the focus and the row and
/// column of the focused cell.
struct TableCursor {
    table: NodeEntry,
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
}

impl TableCursor {
    fn locate(editor: &Editor, location: &ActionLocation) -> Option<Self> {
        let range = location.range()?;
        let focus = editor.entry_at(&range.focus.path)?;
        let table = editor.nearest(&focus, TABLE)?;
        let rows = rows_of(editor, &table);
        let cols = width_of(editor, &rows);
        let index_in = |ty: &str| {
            editor
                .nearest(&focus, ty)
                .and_then(|entry| entry.path.last().copied())
                .unwrap_or(0)
        };
        Some(Self {
            rows: rows.len(),
            cols,
            row: index_in(TABLE_ROW),
            col: index_in(TABLE_CELL),
            table,
        })
    }

    fn insert_row(&self, editor: &mut Editor, at: usize) -> Result<bool, EditorError> {
        editor.insert_node(&child_path(&self.table.path, at), empty_row(self.cols))?;
        Ok(true)
    }

    fn insert_col(&self, editor: &mut Editor, at: usize) -> Result<bool, EditorError> {
        let rows = rows_of(editor, &self.table);
        editor.without_normalizing(|editor| {
            for row in rows {
                let len = editor.document().children_of(row.id).len();
                editor.insert_node(&child_path(&row.path, at.min(len)), empty_cell())?;
            }
            Ok(true)
        })
    }

    fn delete_row(&self, editor: &mut Editor) -> Result<bool, EditorError> {
        editor.remove_node(&child_path(&self.table.path, self.row))?;
        editor.deselect();
        Ok(true)
    }

    fn delete_col(&self, editor: &mut Editor) -> Result<bool, EditorError> {
        let rows = rows_of(editor, &self.table);
        editor.without_normalizing(|editor| {
            for row in rows {
                if self.col < editor.document().children_of(row.id).len() {
                    editor.remove_node(&child_path(&row.path, self.col))?;
                }
            }
            Ok(())
        })?;
        editor.deselect();
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableEdit {
    InsertRowAbove,
    InsertRowBelow,
    InsertColLeft,
    InsertColRight,
    DeleteRow,
    DeleteCol,
}

impl TableEdit {
    const ALL: [TableEdit; 6] = [
        TableEdit::InsertRowAbove,
        TableEdit::InsertRowBelow,
        TableEdit::InsertColLeft,
        TableEdit::InsertColRight,
        TableEdit::DeleteRow,
        TableEdit::DeleteCol,
    ];

    fn key(self) -> &'static str {
        match self {
            TableEdit::InsertRowAbove => "table-insert-row-above",
            TableEdit::InsertRowBelow => "table-insert-row-below",
            TableEdit::InsertColLeft => "table-insert-col-left",
            TableEdit::InsertColRight => "table-insert-col-right",
            TableEdit::DeleteRow => "table-delete-row",
            TableEdit::DeleteCol => "table-delete-col",
        }
    }

    fn is_disabled(self, cursor: &TableCursor) -> bool {
        match self {
            TableEdit::DeleteRow => cursor.rows <= 1,
            TableEdit::DeleteCol => cursor.cols <= 1,
            _ => false,
        }
    }

    fn apply(self, editor: &mut Editor, cursor: &TableCursor) -> Result<bool, EditorError> {
        match self {
            TableEdit::InsertRowAbove => cursor.insert_row(editor, cursor.row),
            TableEdit::InsertRowBelow => cursor.insert_row(editor, cursor.row + 1),
            TableEdit::InsertColLeft => cursor.insert_col(editor, cursor.col),
            TableEdit::InsertColRight => cursor.insert_col(editor, cursor.col + 1),
            TableEdit::DeleteRow => cursor.delete_row(editor),
            TableEdit::DeleteCol => cursor.delete_col(editor),
        }
    }

    fn action(self) -> Action {
        Action::new(self.key(), ActionType::Selection, move |editor, location, _| {
            match TableCursor::locate(editor, location) {
                Some(cursor) => self.apply(editor, &cursor),
                None => Ok(false),
            }
        })
        .compute_state(move |editor, location| match TableCursor::locate(editor, location) {
            Some(cursor) => ActionState::new(false, self.is_disabled(&cursor)),
            None => ActionState::disabled(),
        })
    }
}

pub struct TablePlugin;

impl MarkdownPlugin for TablePlugin {
    fn id(&self) -> &'static str {
        "table"
    }

    fn elements(&self) -> Result<Vec<ElementConfig>, FactoryError> {
        Ok(vec![
            ElementConfig::block(TABLE, ContentType::Flow, Some(ContentType::Table))
                .normalize(|editor, entry, _| pad_rows(editor, entry)),
            ElementConfig::block(TABLE_ROW, ContentType::Table, Some(ContentType::TableRow)),
            ElementConfig::block(TABLE_CELL, ContentType::TableRow, Some(ContentType::Phrasing)),
        ])
    }

    fn actions(&self) -> Vec<Action> {
        let toggle = Action::new("toggle-table", ActionType::Phrasing, |editor, location, state| {
            let Some(entry) = location.entry(editor) else {
                return Ok(false);
            };
            if let Some(table) = editor.nearest(&entry, TABLE) {
                return table_to_paragraph(editor, &table);
            }
            let rows = size_param(state, "rows");
            let cols = size_param(state, "cols");
            block_to_table(editor, &entry, rows, cols)
        })
        .default_param("rows", DEFAULT_SIZE)
        .default_param("cols", DEFAULT_SIZE)
        .compute_state(|editor, location| {
            let Some(entry) = location.entry(editor) else {
                return ActionState::disabled();
            };
            if editor.nearest(&entry, TABLE).is_some() {
                return ActionState::new(true, false);
            }
            let Some(parent) = editor.document().parent_of(entry.id) else {
                return ActionState::disabled();
            };
            let fits = editor.content_model_type(entry.id) == Some(ContentType::Phrasing)
                && conforms_opt(Some(ContentType::Flow), editor.content_model_type(parent));
            ActionState::new(false, !fits)
        });

        let remove = Action::new("remove-selection-table", ActionType::Selection, |editor, location, _| {
            match table_at_focus(editor, location) {
                Some(table) => table_to_paragraph(editor, &table),
                None => Ok(false),
            }
        })
        .compute_state(|editor, location| {
            let found = table_at_focus(editor, location).is_some();
            ActionState::new(found, !found)
        });

        [toggle, remove]
            .into_iter()
            .chain(TableEdit::ALL.into_iter().map(TableEdit::action))
            .collect()
    }
}
