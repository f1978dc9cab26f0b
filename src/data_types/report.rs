use std::fmt::Display;

use crate::util::table::Table;

/// The printable outcome of one analytical task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub title: String,
    pub table: Table,
}

impl TaskReport {
    pub fn new(title: impl Into<String>, table: Table) -> Self {
        Self {
            title: title.into(),
            table,
        }
    }

    /// Single-row report of named values.
    pub fn single<V: ToString>(title: impl Into<String>, fields: &[(&str, V)]) -> Self {
        let headers: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        let mut table = Table::new(&headers);
        table.push_row(fields.iter().map(|(_, v)| v.to_string()).collect());

        Self::new(title, table)
    }
}

impl Display for TaskReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.title)?;
        write!(f, "{}", self.table)
    }
}
