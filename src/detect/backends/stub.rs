use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionSet;

/// What the stub should do for one `detect` call.
#[derive(Clone, Debug)]
pub enum StubResponse {
    Detections(DetectionSet),
    Fail(String),
}

/// Stub backend for testing.
///
/// Plays back a scripted sequence of responses, one per frame; once the
/// script is exhausted every further frame yields an empty detection set.
/// Failures are scripted too, so per-frame error isolation can be exercised
/// without a real model.
pub struct StubBackend {
    script: VecDeque<StubResponse>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            calls: 0,
        }
    }

    /// Append a detection set to play back on the next unscripted frame.
    pub fn push_detections(&mut self, set: DetectionSet) {
        self.script.push_back(StubResponse::Detections(set));
    }

    /// Append a detection failure to play back.
    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.script.push_back(StubResponse::Fail(message.into()));
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<DetectionSet> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(StubResponse::Detections(set)) => Ok(set),
            Some(StubResponse::Fail(message)) => Err(anyhow!(message)),
            None => Ok(DetectionSet::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{DamageClass, Detection};

    #[test]
    fn stub_plays_back_script_then_goes_quiet() {
        let mut backend = StubBackend::new();
        backend.push_detections(DetectionSet::new(vec![Detection::new(
            0,
            0,
            10,
            10,
            DamageClass::Dent,
            80.0,
        )]));
        backend.push_failure("scripted failure");

        let first = backend.detect(&[0u8; 12], 2, 2).unwrap();
        assert_eq!(first.len(), 1);

        assert!(backend.detect(&[0u8; 12], 2, 2).is_err());

        let third = backend.detect(&[0u8; 12], 2, 2).unwrap();
        assert!(third.is_empty());
        assert_eq!(backend.calls(), 3);
    }
}
