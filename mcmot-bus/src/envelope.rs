use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-frame metadata carried alongside every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub height: u32,
    pub width: u32,
    pub codec: f64,
    pub fps: u32,
    pub actual_fps: u32,
}

/// Camera-identifying metadata. `camera_id` is the only field every stage
/// relies on; everything else is producer-defined and passed through
/// opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraMetadata {
    pub camera_id: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The canonical wire format shared by every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEnvelope {
    pub frame_number: u64,
    pub frame_timestamp: f64,
    /// Base64-encoded JPEG, or absent once a downstream stage has consumed
    /// the image and only forwards detections.
    pub frame: Option<String>,
    pub frame_metadata: FrameMetadata,
    pub camera_metadata: CameraMetadata,
    /// Produced by later stages; absent on the raw capture topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Value>>,
}

impl FrameEnvelope {
    pub fn camera_id(&self) -> &str {
        &self.camera_metadata.camera_id
    }
}

/// Signal carried on a pipeline's control topic, independent of
/// [`FrameEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlSignal {
    Start,
    Stop,
    Hold,
    Resume,
    Terminate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEnvelope {
    pub signal: ControlSignal,
    pub loop_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_envelope_round_trips_through_json() {
        let json = serde_json::json!({
            "frame_number": 1,
            "frame_timestamp": 12.5,
            "frame": null,
            "frame_metadata": {"height": 480, "width": 640, "codec": 1.0, "fps": 30, "actual_fps": 29},
            "camera_metadata": {"camera_id": "cam-0", "location": "lobby"},
        });
        let envelope: FrameEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(envelope.camera_id(), "cam-0");
        assert_eq!(envelope.frame_metadata.fps, 30);
        assert!(envelope.detections.is_none());

        let re = serde_json::to_value(&envelope).unwrap();
        assert!(re.get("detections").is_none());
    }

    #[test]
    fn control_envelope_uses_uppercase_signal() {
        let json = serde_json::json!({"signal": "TERMINATE", "loop_count": 1});
        let envelope: ControlEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(envelope.signal, ControlSignal::Terminate);
    }
}
