use ansi_term::Style;
use pad::{Alignment, PadStr};
use std::fmt::{Display, Error, Formatter};
use unicode_width::UnicodeWidthStr;

/// Text table with a bold header row. Cells are added left to right, row by row.
pub struct Table {
    columns: usize,
    cells: Vec<Cell>,
}

impl Table {
    pub fn new(columns: usize) -> Table {
        Table {
            columns,
            cells: Vec::new(),
        }
    }

    pub fn add_cell(&mut self, text: &str) {
        self.push(text, Alignment::Left);
    }

    pub fn add_cell_rtl(&mut self, text: &str) {
        self.push(text, Alignment::Right);
    }

    fn push(&mut self, text: &str, align: Alignment) {
        self.cells.push(Cell {
            text: text.to_string(),
            align,
        });
    }

    fn column_widths(&self) -> Vec<usize> {
        (0..self.columns)
            .map(|i| {
                self.cells
                    .iter()
                    .skip(i)
                    .step_by(self.columns)
                    .map(|x| UnicodeWidthStr::width(x.text.as_str()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        if self.columns == 0 || self.cells.is_empty() {
            return Ok(());
        }

        let widths = self.column_widths();

        for (i, cell) in self.cells.iter().enumerate() {
            let c = i % self.columns;
            let text = cell.text.pad_to_width_with_alignment(widths[c], cell.align);

            if i < self.columns {
                write!(f, "{}", Style::new().bold().paint(text))?;
            } else {
                write!(f, "{}", text)?;
            }

            if c == self.columns - 1 {
                writeln!(f)?;
            } else {
                write!(f, " ")?;
            }
        }

        Ok(())
    }
}

struct Cell {
    text: String,
    align: Alignment,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn column_widths_follow_longest_cell() {
        let mut table = Table::new(2);
        table.add_cell("Name");
        table.add_cell_rtl("Size");
        table.add_cell("été");
        table.add_cell_rtl("12345");

        assert_eq!(table.column_widths(), vec![4, 5]);
    }

    #[test]
    fn rows_are_padded() {
        let mut table = Table::new(2);
        table.add_cell("A");
        table.add_cell_rtl("B");
        table.add_cell("abc");
        table.add_cell_rtl("1");

        let output = table.to_string();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "abc 1");
    }

    #[test]
    fn empty_table() {
        assert_eq!(Table::new(3).to_string(), "");
    }
}
