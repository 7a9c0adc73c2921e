use std::io::{self, Write};

/// Line-oriented result writer.
///
/// Rows are tab separated: the step index, then one frequency cell per
/// replicate, newline terminated. Step indices are left-padded to four
/// characters when the run is long enough for four-digit steps to appear,
/// keeping the numeric column aligned.
#[derive(Debug)]
pub struct ResultSink<W: Write> {
    out: W,
    pad_steps: bool,
}

impl<W: Write> ResultSink<W> {
    pub fn new(out: W, generations: usize) -> Self {
        Self {
            out,
            pad_steps: generations > 998,
        }
    }

    /// Write one result row.
    pub fn write_row<'a>(
        &mut self,
        step: usize,
        cells: impl Iterator<Item = &'a str>,
    ) -> io::Result<()> {
        if self.pad_steps && step < 1000 {
            write!(self.out, "{step:>4}")?;
        } else {
            write!(self.out, "{step}")?;
        }
        for cell in cells {
            write!(self.out, "\t{cell}")?;
        }
        writeln!(self.out)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
