use std::io::Write;

use crate::{
    config::OutputConfig,
    error::Result,
    sql::{
        output::{ColumnInfo, Output, ValueWriter},
        types::{Alignment, Value},
    },
};

/// Delimited text endpoint
///
/// Column widths only grow across executions, so repeated queries into the
/// same sink stay aligned.
pub struct SimpleOutput<W: Write> {
    out: W,
    config: OutputConfig,
    widths: Vec<usize>,
    alignments: Vec<Alignment>,
    current: usize,
    count: u64,
}

impl<W: Write> SimpleOutput<W> {
    pub fn new(out: W, config: OutputConfig) -> Self {
        Self {
            out,
            config,
            widths: Vec::new(),
            alignments: Vec::new(),
            current: 0,
            count: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn update_types(&mut self, columns: &[ColumnInfo]) {
        for (i, column) in columns.iter().enumerate() {
            let width = if self.config.disable_alignment_of_columns {
                1
            } else {
                column.ty.width.max(column.title.len())
            };
            match self.widths.get_mut(i) {
                Some(w) => {
                    *w = (*w).max(width);
                    self.alignments[i] = column.ty.alignment;
                }
                None => {
                    self.widths.push(width);
                    self.alignments.push(column.ty.alignment);
                }
            }
        }
    }

    fn write_cell(&mut self, column: usize, text: &str) -> Result<()> {
        let width = self.widths.get(column).copied().unwrap_or(1);
        match self.alignments.get(column) {
            Some(Alignment::Left) => write!(self.out, "{:<width$}", text)?,
            _ => write!(self.out, "{:>width$}", text)?,
        }
        Ok(())
    }

    fn write_value(&mut self, text: &str) -> Result<()> {
        self.write_cell(self.current, text)
    }

    fn real(&self, v: f64) -> String {
        if self.config.full_precision {
            format!("{:.17}", v)
        } else {
            format!("{:.6}", v)
        }
    }
}

impl<W: Write> ValueWriter for SimpleOutput<W> {
    fn output_null(&mut self) -> Result<()> {
        let text = if self.config.do_not_write_null { "" } else { "NULL" };
        self.write_value(text)
    }

    fn output_int(&mut self, v: i64) -> Result<()> {
        self.write_value(&v.to_string())
    }

    fn output_real(&mut self, v: f64) -> Result<()> {
        let text = self.real(v);
        self.write_value(&text)
    }

    fn output_double(&mut self, v: f64) -> Result<()> {
        let text = self.real(v);
        self.write_value(&text)
    }

    fn output_string(&mut self, v: &str) -> Result<()> {
        self.write_value(&format!("'{}'", v))
    }

    fn output_bitfield(&mut self, v: u64) -> Result<()> {
        if self.config.display_bitfields_binary {
            self.write_value(&format!("{:b}", v))
        } else {
            self.write_value(&v.to_string())
        }
    }
}

impl<W: Write> Output for SimpleOutput<W> {
    fn reset(&mut self) {
        self.count = 0;
    }

    fn prepare(&mut self, columns: &[ColumnInfo]) -> Result<()> {
        self.update_types(columns);
        if self.config.do_not_write_column_names {
            return Ok(());
        }
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                write!(self.out, "{}", self.config.field_delimiter)?;
            }
            let header = if self.config.output_format == "wide" {
                format!("{}:{}", column.title, column.ty.name)
            } else {
                column.title.clone()
            };
            self.write_cell(i, &header)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn output(&mut self, row: &[Value]) -> Result<bool> {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                write!(self.out, "{}", self.config.field_delimiter)?;
            }
            self.current = i;
            value.output_to(self)?;
        }
        writeln!(self.out)?;
        self.count += 1;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::SimpleOutput;
    use crate::{
        config::OutputConfig,
        error::Result,
        sql::{
            output::{Output, tests::columns},
            types::{TypeKind, Value},
        },
    };

    fn render(config: OutputConfig, rows: &[Vec<Value>]) -> Result<String> {
        let mut out = SimpleOutput::new(Vec::new(), config);
        out.prepare(&columns(
            &[("n", TypeKind::Integer), ("x", TypeKind::Real), ("s", TypeKind::String), ("b", TypeKind::Bitmap)],
            0,
        ))?;
        for row in rows {
            out.output(row)?;
        }
        out.flush()?;
        assert_eq!(out.count(), rows.len() as u64);
        Ok(String::from_utf8(out.into_inner())?)
    }

    fn row() -> Vec<Value> {
        vec![Value::Integer(7), Value::Real(2.5), Value::String("ab".into()), Value::Bitfield(5)]
    }

    #[test]
    fn test_unaligned() -> Result<()> {
        let config = OutputConfig {
            disable_alignment_of_columns: true,
            ..Default::default()
        };
        assert_eq!(render(config, &[row()])?, "n\tx\ts\tb\n7\t2.500000\t'ab'\t5\n");
        Ok(())
    }

    #[test]
    fn test_options() -> Result<()> {
        let config = OutputConfig {
            disable_alignment_of_columns: true,
            do_not_write_column_names: true,
            do_not_write_null: true,
            display_bitfields_binary: true,
            full_precision: true,
            field_delimiter: ",".into(),
            ..Default::default()
        };
        let rows = vec![row(), vec![Value::Null, Value::Null, Value::Null, Value::Null]];
        assert_eq!(render(config, &rows)?, "7,2.50000000000000000,'ab',101\n,,,\n");
        Ok(())
    }

    #[test]
    fn test_aligned() -> Result<()> {
        let config = OutputConfig {
            output_format: "wide".into(),
            ..Default::default()
        };
        let text = render(config, &[row()])?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(format!("{:>11}\t{:>15}\t{:<10}\t{:>11}", "n:integer", "x:real", "s:string", "b:bitmap").as_str()));
        assert_eq!(lines.next(), Some(format!("{:>11}\t{:>15}\t{:<10}\t{:>11}", "7", "2.500000", "'ab'", "5").as_str()));
        Ok(())
    }
}
