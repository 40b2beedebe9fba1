use serde::Serialize;
use serde_json::{Number, Value};

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Number(Number),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Maps a JSON leaf onto a cell. Absent and `null` become
    /// [`Cell::Empty`]; containers are rendered as compact JSON text.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Cell::Empty,
            Some(Value::String(s)) => Cell::Text(s.clone()),
            Some(Value::Number(n)) => Cell::Number(n.clone()),
            Some(Value::Bool(b)) => Cell::Bool(*b),
            Some(other) => Cell::Text(other.to_string()),
        }
    }

    /// A scalar leaf keeps its type; anything else is the blank string.
    pub fn leaf(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(_) | Value::Number(_) | Value::Bool(_)) => Cell::from_value(value),
            _ => Cell::text(""),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

pub type Row = Vec<Cell>;

/// A headerless, row-major table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// A one-column table, one value per row.
    pub fn column<I, C>(values: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        Self {
            rows: values.into_iter().map(|v| vec![v.into()]).collect(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// First cell of every row, for single-column tables.
    pub fn first_column(&self) -> Vec<&Cell> {
        self.rows.iter().filter_map(|r| r.first()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_from_value() {
        assert_eq!(Cell::from_value(None), Cell::Empty);
        assert_eq!(Cell::from_value(Some(&Value::Null)), Cell::Empty);
        assert_eq!(Cell::from_value(Some(&json!("even"))), Cell::text("even"));
        assert_eq!(Cell::from_value(Some(&json!(9600))), Cell::Number(9600.into()));
        assert_eq!(Cell::from_value(Some(&json!(false))), Cell::Bool(false));
        assert_eq!(
            Cell::from_value(Some(&json!({"a": 1}))),
            Cell::text(r#"{"a":1}"#)
        );
    }

    #[test]
    fn test_column_table() {
        let table = Table::column(["a", "b"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.width(), 1);
        assert_eq!(table.first_column(), vec![&Cell::text("a"), &Cell::text("b")]);
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Empty.to_string(), "");
        assert_eq!(Cell::Number(Number::from(3)).to_string(), "3");
        assert_eq!(Cell::Bool(true).to_string(), "true");
    }
}
