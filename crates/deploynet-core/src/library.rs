use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::TeardownError;

/// Process-lifetime state of a model parsing library.
///
/// The library may be released exactly once per process. After that no
/// parsing or engine building may happen through it; backends check
/// [`ParserLibrary::is_shut_down`] before handing out a parser.
#[derive(Debug)]
pub struct ParserLibrary {
    name: &'static str,
    shut_down: AtomicBool,
}

impl ParserLibrary {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Runs `release` if and only if this is the first shutdown request.
    pub fn shutdown(&self, release: impl FnOnce()) -> Result<(), TeardownError> {
        if self
            .shut_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TeardownError::AlreadyShutDown(self.name));
        }
        tracing::info!(library = self.name, "releasing parser library");
        release();
        Ok(())
    }
}
