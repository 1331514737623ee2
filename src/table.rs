//! # Table Layout
//!
//! Expands table templates into a grid and runs the automatic merges.
//!
//! ## Row generation
//!
//! A row template resolves its access path first. An array produces one
//! *row scope* per element, anything else a single row scope. Within a row
//! scope, cell templates whose paths resolve to arrays fan the row out into
//! as many grid rows as the longest such array:
//!
//! ```text
//! { "name": "Ann", "phones": ["1", "2", "3"] }
//!
//! ┌─────┬───┐
//! │     │ 1 │      name:   row span 3, then two absorbed slots
//! │ Ann ├───┤      phones: one slot per element; shorter arrays are
//! │     │ 2 │              padded with empty slots
//! │     ├───┤
//! │     │ 3 │
//! └─────┴───┘
//! ```
//!
//! ## Merges
//!
//! 1. Column merge, per row scope: an empty cell flagged `Left`/`Right`
//!    folds its column span into the nearest live neighbour of the same row
//!    span in that direction.
//! 2. Row span, per row scope when it fanned out, then across all row
//!    scopes of the template unless any of them fanned out: a flagged cell
//!    equal to the cell above (same column span) is absorbed into the run's
//!    first cell.
//!
//! Finally every absorbed slot (row or column span of zero) loses its
//! content and styles. It still occupies its grid position.

use serde_json::Value;

use crate::binder::{inherit, Binder};
use crate::model::*;
use crate::path;
use crate::style::Style;

/// A grid slot while the table is being laid out.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    pub styles: Vec<Style>,
    pub editable: Option<bool>,
    pub deletable: Option<bool>,
    pub deleted: Option<bool>,
    pub cell: DocTableCell,
}

impl Slot {
    /// An empty slot reserving the given spans.
    pub fn placeholder(row_span: Option<u32>, col_span: Option<u32>) -> Self {
        Slot {
            cell: DocTableCell {
                element: None,
                row_span,
                col_span,
            },
            ..Default::default()
        }
    }

    pub fn row_span(&self) -> u32 {
        self.cell.row_span.unwrap_or(1)
    }

    pub fn col_span(&self) -> u32 {
        self.cell.col_span.unwrap_or(1)
    }

    pub fn is_absorbed(&self) -> bool {
        self.cell.row_span == Some(0) || self.cell.col_span == Some(0)
    }

    fn is_blank(&self) -> bool {
        self.cell.element.as_deref().map_or(true, DocNode::is_empty)
    }

    pub fn into_node(self) -> DocNode {
        DocNode {
            styles: self.styles,
            editable: self.editable,
            deletable: self.deletable,
            deleted: self.deleted,
            kind: self.cell.into(),
        }
    }
}

type Grid = Vec<Vec<Slot>>;

/// Lays out tables on behalf of a [`Binder`].
pub struct TableLayout<'a> {
    binder: &'a Binder,
}

impl<'a> TableLayout<'a> {
    pub fn new(binder: &'a Binder) -> Self {
        TableLayout { binder }
    }

    pub fn render(&self, table: &Table, scope: &Value) -> DocTable {
        DocTable {
            headers: table
                .headers
                .iter()
                .flat_map(|row| self.render_rows(row, scope))
                .collect(),
            rows: table
                .rows
                .iter()
                .flat_map(|row| self.render_rows(row, scope))
                .collect(),
        }
    }

    /// All grid rows one row template produces.
    pub fn render_rows(&self, template: &TemplateNode, ambient: &Value) -> Vec<DocNode> {
        let Some(row) = template.as_table_row() else {
            log::debug!(
                "skipping {} in table rows, expected a row",
                template.kind.type_name()
            );
            return vec![];
        };

        let data = path::resolve_or_null(ambient, &template.access);
        let scopes: Vec<&Value> = match data {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut grid: Grid = Vec::new();
        let mut fanned_out = false;
        for scope in scopes {
            let rows = self.render_row_cells(&row.cells, scope);
            fanned_out |= rows.len() > 1;
            grid.extend(rows);
        }

        if fanned_out {
            log::trace!("row {:?} fanned out, skipping cross-row span", template.access);
        } else {
            auto_row_span(&row.cells, &mut grid);
        }
        clear_absorbed(&mut grid);

        grid.into_iter()
            .map(|cells| {
                let cells = cells.into_iter().map(Slot::into_node).collect();
                inherit(template, DocTableRow { cells }.into())
            })
            .collect()
    }

    /// Grid rows for one row scope.
    fn render_row_cells(&self, cells: &[TemplateNode], scope: &Value) -> Grid {
        let row_count = if scope.is_object() {
            cells
                .iter()
                .filter_map(|cell| match path::resolve_or_null(scope, &cell.access) {
                    Value::Array(items) => Some(items.len()),
                    _ => None,
                })
                .max()
                .unwrap_or(0)
        } else {
            0
        };

        let mut grid = if row_count > 0 {
            self.fan_out(cells, scope, row_count)
        } else {
            vec![self.bind_cells(cells, scope)]
        };

        if cells.iter().any(|c| merge_direction(c) != AutoCellMerge::None) {
            for row in grid.iter_mut() {
                merge_columns(cells, row);
            }
        }
        if grid.len() > 1 {
            auto_row_span(cells, &mut grid);
        }
        grid
    }

    fn fan_out(&self, cells: &[TemplateNode], scope: &Value, row_count: usize) -> Grid {
        log::trace!("row scope fans out into {} rows", row_count);
        let mut grid: Grid = (0..row_count)
            .map(|_| Vec::with_capacity(cells.len()))
            .collect();

        for template in cells {
            let col_span = template.as_table_cell().and_then(|c| c.col_span);
            match path::resolve_or_null(scope, &template.access) {
                Value::Array(items) => {
                    for (i, row) in grid.iter_mut().enumerate() {
                        row.push(match items.get(i) {
                            Some(item) => self.bind_cell(template, item),
                            None => Slot::placeholder(None, col_span),
                        });
                    }
                }
                value => {
                    let mut first = self.bind_cell(template, value);
                    first.cell.row_span = Some(row_count as u32);
                    for (i, row) in grid.iter_mut().enumerate() {
                        if i == 0 {
                            row.push(std::mem::take(&mut first));
                        } else {
                            row.push(Slot::placeholder(Some(0), col_span));
                        }
                    }
                }
            }
        }
        grid
    }

    fn bind_cells(&self, cells: &[TemplateNode], scope: &Value) -> Vec<Slot> {
        cells
            .iter()
            .map(|cell| self.bind_cell(cell, path::resolve_or_null(scope, &cell.access)))
            .collect()
    }

    /// Bind a cell template against its resolved scope. A template that is
    /// not a cell becomes the element of a default cell.
    pub fn bind_cell(&self, template: &TemplateNode, scope: &Value) -> Slot {
        match &template.kind {
            TemplateKind::TableCell(cell) => Slot {
                styles: template.styles.clone(),
                editable: template.editable,
                deletable: template.deletable,
                deleted: template.deleted,
                cell: DocTableCell {
                    element: self.binder.bind_child(&cell.element, scope),
                    row_span: cell.row_span,
                    col_span: cell.col_span,
                },
            },
            _ => Slot {
                cell: DocTableCell {
                    element: self.binder.bind(template, scope).map(Box::new),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// A single row bound against a resolved scope, without fan-out or
    /// merging.
    pub fn bind_row(&self, template: &TemplateNode, scope: &Value) -> DocNode {
        let cells = match template.as_table_row() {
            Some(row) => self
                .bind_cells(&row.cells, scope)
                .into_iter()
                .map(Slot::into_node)
                .collect(),
            None => vec![],
        };
        inherit(template, DocTableRow { cells }.into())
    }
}

fn merge_direction(template: &TemplateNode) -> AutoCellMerge {
    template
        .as_table_cell()
        .map_or(AutoCellMerge::None, |c| c.auto_cell_merge)
}

fn auto_row_span_enabled(template: &TemplateNode) -> bool {
    template.as_table_cell().is_some_and(|c| c.auto_row_span)
}

/// Fold empty flagged cells into their neighbour, left to right.
fn merge_columns(templates: &[TemplateNode], row: &mut [Slot]) {
    let width = templates.len().min(row.len());
    for i in 0..width {
        let direction = merge_direction(&templates[i]);
        if direction == AutoCellMerge::None || row[i].is_absorbed() || !row[i].is_blank() {
            continue;
        }

        let row_span = row[i].row_span();
        let candidates: Box<dyn Iterator<Item = usize>> = match direction {
            AutoCellMerge::Left => Box::new((0..i).rev()),
            _ => Box::new(i + 1..width),
        };
        let mut target = None;
        for j in candidates {
            let neighbour = &row[j];
            if neighbour.cell.row_span == Some(0) || neighbour.row_span() != row_span {
                break;
            }
            if neighbour.col_span() > 0 {
                target = Some(j);
                break;
            }
        }

        if let Some(j) = target {
            log::trace!("merging empty column {} into column {}", i, j);
            let span = row[j].col_span() + row[i].col_span();
            row[j].cell.col_span = Some(span);
            row[i].cell.col_span = Some(0);
        }
    }
}

/// Absorb flagged cells equal to the cell above into the first cell of
/// their run.
fn auto_row_span(templates: &[TemplateNode], grid: &mut Grid) {
    if grid.len() < 2 || !templates.iter().any(auto_row_span_enabled) {
        return;
    }

    for i in 1..grid.len() {
        let (above, below) = grid.split_at_mut(i);
        let current_row = &mut below[0];
        for (j, template) in templates.iter().enumerate() {
            if !auto_row_span_enabled(template) || j >= current_row.len() {
                continue;
            }
            let previous = &above[i - 1][j];
            let current = &current_row[j];
            if current.cell.row_span == Some(0)
                || current.col_span() != previous.col_span()
                || current.cell.element != previous.cell.element
            {
                continue;
            }
            current_row[j].cell.row_span = Some(0);

            let mut k = i - 1;
            while above[k][j].cell.row_span == Some(0) && k > 0 {
                k -= 1;
            }
            let owner = &mut above[k][j];
            owner.cell.row_span = Some(owner.row_span() + 1);
        }
    }
}

fn clear_absorbed(grid: &mut Grid) {
    for slot in grid.iter_mut().flatten() {
        if slot.is_absorbed() {
            slot.cell.element = None;
            slot.styles.clear();
        }
    }
}
