//! Per-video damage rollup.
//!
//! The summary keeps the strongest confidence seen for each label across a
//! whole video. It is created empty at video start, fed every frame's
//! detections, finalized once at the end, then discarded.

use serde::Serialize;

use crate::detect::{DamageClass, DetectionSet};

/// One finalized summary entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DamageEntry {
    pub label: DamageClass,
    pub score: f32,
}

/// Running best-confidence-per-label summary.
///
/// Labels keep their first-insertion order; the vocabulary is small enough
/// that a linear scan beats a map plus a side order list.
#[derive(Clone, Debug, Default)]
pub struct DamageSummary {
    entries: Vec<(DamageClass, f32)>,
}

impl DamageSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one frame's detections into the summary.
    ///
    /// Insert-or-max per label; a new confidence replaces the stored one
    /// only when strictly greater. The result is independent of the order
    /// detections arrive in.
    pub fn update(&mut self, set: &DetectionSet) {
        for detection in set.iter() {
            self.observe(detection.label, detection.confidence);
        }
    }

    fn observe(&mut self, label: DamageClass, confidence: f32) {
        for (stored_label, stored_confidence) in &mut self.entries {
            if *stored_label == label {
                if confidence > *stored_confidence {
                    *stored_confidence = confidence;
                }
                return;
            }
        }
        self.entries.push((label, confidence));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Consume the summary into ordered `{label, score}` entries.
    ///
    /// Order follows first insertion of each label, not score.
    pub fn finalize(self) -> Vec<DamageEntry> {
        self.entries
            .into_iter()
            .map(|(label, score)| DamageEntry { label, score })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn set(detections: Vec<(DamageClass, f32)>) -> DetectionSet {
        DetectionSet::new(
            detections
                .into_iter()
                .map(|(label, conf)| Detection::new(0, 0, 10, 10, label, conf))
                .collect(),
        )
    }

    #[test]
    fn keeps_maximum_per_label() {
        let mut summary = DamageSummary::new();
        summary.update(&set(vec![(DamageClass::Dent, 80.0)]));
        summary.update(&set(vec![(DamageClass::Dent, 95.0)]));
        summary.update(&set(vec![(DamageClass::Dent, 60.0)]));

        let entries = summary.finalize();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, DamageClass::Dent);
        assert_eq!(entries[0].score, 95.0);
    }

    #[test]
    fn equal_confidence_does_not_replace() {
        let mut summary = DamageSummary::new();
        summary.update(&set(vec![(DamageClass::DamagedHood, 70.0)]));
        summary.update(&set(vec![(DamageClass::DamagedHood, 70.0)]));
        assert_eq!(summary.finalize()[0].score, 70.0);
    }

    #[test]
    fn preserves_first_insertion_order() {
        let mut summary = DamageSummary::new();
        summary.update(&set(vec![
            (DamageClass::DamagedBumper, 40.0),
            (DamageClass::Dent, 90.0),
        ]));
        summary.update(&set(vec![(DamageClass::DamagedBumper, 85.0)]));

        let entries = summary.finalize();
        assert_eq!(entries[0].label, DamageClass::DamagedBumper);
        assert_eq!(entries[0].score, 85.0);
        assert_eq!(entries[1].label, DamageClass::Dent);
    }

    #[test]
    fn frame_reordering_yields_same_summary() {
        let frames = vec![
            set(vec![(DamageClass::Dent, 80.0)]),
            set(vec![(DamageClass::Dent, 95.0), (DamageClass::DamagedDoor, 50.0)]),
            set(vec![(DamageClass::DamagedDoor, 30.0)]),
        ];

        let mut forward = DamageSummary::new();
        for frame in &frames {
            forward.update(frame);
        }
        let mut reverse = DamageSummary::new();
        for frame in frames.iter().rev() {
            reverse.update(frame);
        }

        let mut forward: Vec<_> = forward
            .finalize()
            .into_iter()
            .map(|e| (e.label.as_str(), e.score))
            .collect();
        let mut reverse: Vec<_> = reverse
            .finalize()
            .into_iter()
            .map(|e| (e.label.as_str(), e.score))
            .collect();
        forward.sort_by(|a, b| a.partial_cmp(b).unwrap());
        reverse.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(forward, reverse);
    }

    #[test]
    fn empty_video_finalizes_empty() {
        let summary = DamageSummary::new();
        assert!(summary.is_empty());
        assert!(summary.finalize().is_empty());
    }

    #[test]
    fn entry_serializes_label_string() {
        let entry = DamageEntry {
            label: DamageClass::Dent,
            score: 95.0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["label"], "dent");
        assert_eq!(json["score"], 95.0);
    }
}
