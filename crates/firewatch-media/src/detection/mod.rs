//! Fire and smoke detection.
//!
//! [`Detector`] is the seam between the pipelines and the inference engine.
//! [`YoloFireDetector`] runs a YOLOv8-style ONNX model through ONNX Runtime;
//! tests substitute scripted detectors.

pub mod detector;
pub mod yolo;

pub use detector::{DetectedFrame, DetectionStream, Detector, InferenceParams};
pub use yolo::{YoloFireDetector, YoloFireDetectorConfig};
