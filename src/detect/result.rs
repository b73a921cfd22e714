use serde::Serialize;

/// Damage categories the model was trained against.
///
/// The vocabulary is fixed: detector backends map raw class indices onto
/// these variants, and everything downstream (annotation, aggregation,
/// response payloads) works in terms of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DamageClass {
    #[serde(rename = "damaged door")]
    DamagedDoor,
    #[serde(rename = "damaged window")]
    DamagedWindow,
    #[serde(rename = "damaged headlight")]
    DamagedHeadlight,
    #[serde(rename = "damaged mirror")]
    DamagedMirror,
    #[serde(rename = "dent")]
    Dent,
    #[serde(rename = "damaged hood")]
    DamagedHood,
    #[serde(rename = "damaged bumper")]
    DamagedBumper,
    #[serde(rename = "damaged wind shield")]
    DamagedWindshield,
}

impl DamageClass {
    /// All classes, in model output order.
    pub const ALL: [DamageClass; 8] = [
        DamageClass::DamagedDoor,
        DamageClass::DamagedWindow,
        DamageClass::DamagedHeadlight,
        DamageClass::DamagedMirror,
        DamageClass::Dent,
        DamageClass::DamagedHood,
        DamageClass::DamagedBumper,
        DamageClass::DamagedWindshield,
    ];

    /// Map a raw model class index onto the vocabulary.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DamageClass::DamagedDoor => "damaged door",
            DamageClass::DamagedWindow => "damaged window",
            DamageClass::DamagedHeadlight => "damaged headlight",
            DamageClass::DamagedMirror => "damaged mirror",
            DamageClass::Dent => "dent",
            DamageClass::DamagedHood => "damaged hood",
            DamageClass::DamagedBumper => "damaged bumper",
            DamageClass::DamagedWindshield => "damaged wind shield",
        }
    }
}

impl std::fmt::Display for DamageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned box in pixel coordinates, top-left origin.
///
/// Coordinates may be negative or extend past the frame edge; drawing code
/// clips per pixel instead of clamping the box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One located damage instance in a frame.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bounds: BoundingBox,
    pub label: DamageClass,
    /// Confidence on a 0-100 scale.
    pub confidence: f32,
}

impl Detection {
    pub fn new(x: i32, y: i32, width: i32, height: i32, label: DamageClass, confidence: f32) -> Self {
        Self {
            bounds: BoundingBox {
                x,
                y,
                width,
                height,
            },
            label,
            confidence,
        }
    }
}

/// All detections found in a single frame, in the order the backend
/// produced them.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_index_round_trips_through_vocabulary() {
        for (i, class) in DamageClass::ALL.iter().enumerate() {
            assert_eq!(DamageClass::from_index(i), Some(*class));
        }
        assert_eq!(DamageClass::from_index(DamageClass::ALL.len()), None);
    }

    #[test]
    fn detection_serializes_with_named_box() {
        let det = Detection::new(10, 20, 30, 40, DamageClass::Dent, 87.5);
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["box"]["x"], 10);
        assert_eq!(json["label"], "dent");
        assert_eq!(json["confidence"], 87.5);
    }
}
