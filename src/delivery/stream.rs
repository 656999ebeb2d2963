use std::sync::mpsc::{self, Receiver, Sender};

use super::result::SendResult;

/// Live stream of delivery results.
///
/// Iteration blocks until the next result arrives and ends once every
/// delivery thread has finished, so draining it to the end doubles as
/// waiting for the whole delivery.
#[derive(Debug)]
pub struct Results {
    rx: Receiver<SendResult>,
}

impl Iterator for Results {
    type Item = SendResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

/// Producer half handed to each delivery thread.
#[derive(Debug, Clone)]
pub(crate) struct Reporter {
    tx: Sender<SendResult>,
}

impl Reporter {
    pub(crate) fn emit(&self, result: SendResult) {
        tracing::trace!(level = %result.level, outcome = ?result.outcome, "{}", result.message);
        if self.tx.send(result).is_err() {
            tracing::debug!("result stream dropped by the caller");
        }
    }
}

pub(crate) fn channel() -> (Reporter, Results) {
    let (tx, rx) = mpsc::channel();
    (Reporter { tx }, Results { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::result::{Level, Outcome};

    #[test]
    fn stream_ends_when_every_reporter_is_gone() {
        let (reporter, results) = channel();
        let clone = reporter.clone();
        let handle = std::thread::spawn(move || {
            clone.emit(SendResult::new(Level::Info, Outcome::Accepted, "one"));
        });
        reporter.emit(SendResult::new(Level::Info, Outcome::Accepted, "two"));
        drop(reporter);
        handle.join().unwrap();
        assert_eq!(results.count(), 2);
    }

    #[test]
    fn emitting_after_caller_left_is_harmless() {
        let (reporter, results) = channel();
        drop(results);
        reporter.emit(SendResult::new(Level::Warn, Outcome::AttemptFailed, "late"));
    }
}
