use std::fmt::Display;

/// Plain-text table, left aligned, one header underline.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: ToString>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        (0..columns)
            .map(|i| {
                self.rows
                    .iter()
                    .chain(std::iter::once(&self.headers))
                    .filter_map(|r| r.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

fn write_row(
    f: &mut std::fmt::Formatter<'_>,
    cells: &[String],
    widths: &[usize],
) -> std::fmt::Result {
    let line = widths
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{:<w$}", cells.get(i).map(String::as_str).unwrap_or(""), w = *w))
        .collect::<Vec<_>>()
        .join("  ");

    writeln!(f, "{}", line.trim_end())
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.widths();

        write_row(f, &self.headers, &widths)?;
        let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        write_row(f, &underline, &widths)?;

        for row in &self.rows {
            write_row(f, row, &widths)?;
        }

        Ok(())
    }
}
