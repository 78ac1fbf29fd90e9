//! Stub detector for tests.

use std::collections::VecDeque;

use anyhow::Result;

use super::{Detection, Detector, DetectorInput};

/// Scripted backend: plays back queued per-frame results, then reports
/// nothing. Lets pipeline tests drive both the detection and the
/// detection-failure paths without a camera or a real symbol.
#[derive(Default)]
pub struct StubDetector {
    script: VecDeque<Result<Vec<Detection>>>,
    frames_seen: u64,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for one upcoming frame.
    pub fn push_result(&mut self, result: Result<Vec<Detection>>) {
        self.script.push_back(result);
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Rgb8
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn stub_plays_back_script_then_reports_nothing() {
        let mut detector = StubDetector::new();
        detector.push_result(Ok(vec![Detection {
            payload: "TEST".to_string(),
            polygon: None,
        }]));
        detector.push_result(Err(anyhow!("decoder exploded")));

        let first = detector.detect(&[], 0, 0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].payload, "TEST");

        assert!(detector.detect(&[], 0, 0).is_err());
        assert!(detector.detect(&[], 0, 0).unwrap().is_empty());
        assert_eq!(detector.frames_seen(), 3);
    }
}
