use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

use super::sink::ResultSink;
use crate::errors::ExecutorError;

/// Generation-ordered fan-in of replicate rows.
///
/// Workers finish out of step with each other; the writer holds a FIFO of
/// per-step buckets and flushes a result row the moment every replicate has
/// supplied its cell for the lowest unflushed step. A submission below that
/// step would mean a row was lost — a logic bug, reported as fatal.
#[derive(Debug)]
pub struct OrderedWriter<W: Write> {
    replicates: usize,
    state: Mutex<WriterState<W>>,
}

#[derive(Debug)]
struct WriterState<W: Write> {
    sink: ResultSink<W>,
    /// One bucket per pending step, front is `lowest_step`.
    buffer: VecDeque<Vec<Option<String>>>,
    /// Next step to flush.
    lowest_step: usize,
    /// Largest step a bucket exists for.
    highest_step: usize,
}

impl<W: Write> OrderedWriter<W> {
    pub fn new(sink: ResultSink<W>, replicates: usize) -> Self {
        let mut buffer = VecDeque::new();
        buffer.push_back(vec![None; replicates]);
        Self {
            replicates,
            state: Mutex::new(WriterState {
                sink,
                buffer,
                lowest_step: 0,
                highest_step: 0,
            }),
        }
    }

    /// Store one replicate cell and flush every completed front bucket.
    pub fn submit(
        &self,
        line: String,
        replicate: usize,
        step: usize,
    ) -> Result<(), ExecutorError> {
        let mut state = self.state.lock().expect("writer mutex poisoned");

        if step < state.lowest_step {
            return Err(ExecutorError::StepOrder {
                step,
                lowest: state.lowest_step,
            });
        }

        while step > state.highest_step {
            state.buffer.push_back(vec![None; self.replicates]);
            state.highest_step += 1;
        }

        let offset = step - state.lowest_step;
        state.buffer[offset][replicate] = Some(line);

        while state
            .buffer
            .front()
            .is_some_and(|bucket| bucket.iter().all(Option::is_some))
        {
            let bucket = state.buffer.pop_front().expect("checked front");
            let step = state.lowest_step;
            let cells: Vec<String> = bucket
                .into_iter()
                .map(|cell| cell.expect("complete bucket"))
                .collect();
            state.sink.write_row(step, cells.iter().map(String::as_str))?;
            state.lowest_step += 1;
        }

        Ok(())
    }

    /// Flush the sink and recover the underlying writer. Called once all
    /// workers have joined; every bucket has been flushed by then.
    pub fn finish(self) -> io::Result<W> {
        let mut state = self.state.into_inner().expect("writer mutex poisoned");
        debug_assert!(state
            .buffer
            .iter()
            .all(|bucket| bucket.iter().all(Option::is_none)));
        state.sink.flush()?;
        Ok(state.sink.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(replicates: usize) -> OrderedWriter<Vec<u8>> {
        OrderedWriter::new(ResultSink::new(Vec::new(), 10), replicates)
    }

    fn text(w: OrderedWriter<Vec<u8>>) -> String {
        String::from_utf8(w.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_rows_flush_only_when_complete() {
        let w = writer(2);
        w.submit("a0".into(), 0, 0).unwrap();
        w.submit("a1".into(), 0, 1).unwrap();
        // replicate 1 still missing: nothing flushed yet
        w.submit("b0".into(), 1, 0).unwrap();
        w.submit("b1".into(), 1, 1).unwrap();
        assert_eq!(text(w), "0\ta0\tb0\n1\ta1\tb1\n");
    }

    #[test]
    fn test_out_of_step_workers_are_reordered() {
        let w = writer(2);
        // replicate 1 races ahead through every step
        for step in 0..4 {
            w.submit(format!("b{step}"), 1, step).unwrap();
        }
        for step in 0..4 {
            w.submit(format!("a{step}"), 0, step).unwrap();
        }
        assert_eq!(text(w), "0\ta0\tb0\n1\ta1\tb1\n2\ta2\tb2\n3\ta3\tb3\n");
    }

    #[test]
    fn test_replicate_columns_in_id_order() {
        let w = writer(3);
        w.submit("c".into(), 2, 0).unwrap();
        w.submit("a".into(), 0, 0).unwrap();
        w.submit("b".into(), 1, 0).unwrap();
        assert_eq!(text(w), "0\ta\tb\tc\n");
    }

    #[test]
    fn test_submission_below_lowest_step_is_fatal() {
        let w = writer(1);
        w.submit("x".into(), 0, 0).unwrap();
        // step 0 has been flushed, resubmitting it is a logic bug
        let err = w.submit("y".into(), 0, 0).unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::StepOrder { step: 0, lowest: 1 }
        ));
    }
}
