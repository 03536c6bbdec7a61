//! Shared test doubles and fixtures. Compiled only for tests.

use crate::imaging::{CropRenderer, RenderError};
use crate::url::CropSpec;
use std::sync::Mutex;

/// Renderer double that returns fixed bytes (or a fixed failure) and
/// counts invocations, so handler tests can assert the transform step ran
/// exactly when it should.
pub(crate) struct StubRenderer {
    output: Option<Vec<u8>>,
    calls: Mutex<usize>,
}

impl StubRenderer {
    pub(crate) fn ok(bytes: &[u8]) -> Self {
        Self {
            output: Some(bytes.to_vec()),
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            output: None,
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl CropRenderer for StubRenderer {
    fn render(&self, _source: &[u8], ext: &str, _spec: &CropSpec) -> Result<Vec<u8>, RenderError> {
        *self.calls.lock().unwrap() += 1;
        self.output
            .clone()
            .ok_or_else(|| RenderError::UnsupportedFormat(ext.to_string()))
    }
}
