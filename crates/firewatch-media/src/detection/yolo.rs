//! Fire/smoke detection with a YOLOv8 ONNX model.
//!
//! Uses ONNX Runtime with execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when the `cuda` feature is enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use firewatch_models::{BoundingBox, Detection, CLASS_NAMES};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use super::detector::{Detector, InferenceParams};
use crate::error::{MediaError, MediaResult};

/// Configuration for the fire detector.
#[derive(Debug, Clone)]
pub struct YoloFireDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Input image size (model expects square input)
    pub input_size: u32,
    /// Preferred execution device: "cpu", "cuda" or "auto"
    pub device: String,
}

impl Default for YoloFireDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "best.onnx".to_string(),
            input_size: 640,
            device: "auto".to_string(),
        }
    }
}

impl YoloFireDetectorConfig {
    pub fn with_model_path(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

/// Grey used for the letterbox border.
pub const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// Aspect-preserving fit of a frame into the square model input.
///
/// The frame is scaled by `ratio` to `width`x`height` and centred with
/// `pad_x`/`pad_y` border pixels on the leading edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub ratio: f32,
    pub width: u32,
    pub height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn fit(input_size: u32, frame_width: u32, frame_height: u32) -> Self {
        let ratio = (input_size as f32 / frame_width.max(1) as f32)
            .min(input_size as f32 / frame_height.max(1) as f32);
        let width = ((frame_width as f32 * ratio).round() as u32).clamp(1, input_size.max(1));
        let height = ((frame_height as f32 * ratio).round() as u32).clamp(1, input_size.max(1));
        Self {
            ratio,
            width,
            height,
            pad_x: (input_size.saturating_sub(width)) / 2,
            pad_y: (input_size.saturating_sub(height)) / 2,
        }
    }

    /// Model-input x back to frame pixels.
    pub fn frame_x(&self, x: f32) -> f32 {
        (x - self.pad_x as f32) / self.ratio
    }

    /// Model-input y back to frame pixels.
    pub fn frame_y(&self, y: f32) -> f32 {
        (y - self.pad_y as f32) / self.ratio
    }
}

/// Scale `frame` into an `input_size` square, centred on a grey border.
pub fn letterbox_image(frame: &RgbImage, input_size: u32) -> (RgbImage, Letterbox) {
    let letterbox = Letterbox::fit(input_size, frame.width(), frame.height());
    let resized = image::imageops::resize(frame, letterbox.width, letterbox.height, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(input_size, input_size, LETTERBOX_FILL);
    image::imageops::replace(
        &mut canvas,
        &resized,
        i64::from(letterbox.pad_x),
        i64::from(letterbox.pad_y),
    );
    (canvas, letterbox)
}

/// YOLOv8 fire/smoke detector backed by ONNX Runtime.
///
/// The session is locked per inference; one instance can be shared between
/// the webcam loop and VOD jobs.
pub struct YoloFireDetector {
    session: Mutex<Session>,
    config: YoloFireDetectorConfig,
}

impl YoloFireDetector {
    /// Load the model.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: YoloFireDetectorConfig) -> MediaResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(MediaError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path, &config.device)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            device = %config.device,
            "Fire detector initialized"
        );

        Ok(Self { session, config })
    }

    pub fn config(&self) -> &YoloFireDetectorConfig {
        &self.config
    }

    /// Letterbox to the model input, scale to [0, 1] and lay out as NCHW.
    fn preprocess(&self, frame: &RgbImage) -> MediaResult<(Value, Letterbox)> {
        let size = self.config.input_size;
        let (input, letterbox) = letterbox_image(frame, size);
        let (w, h) = (size as usize, size as usize);

        let mut chw_data: Vec<f32> = vec![0.0; 3 * h * w];
        for (x, y, pixel) in input.enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                chw_data[c * h * w + offset] = pixel[c] as f32 / 255.0;
            }
        }

        let shape = vec![1usize, 3, h, w];
        let tensor = Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::internal(format!("Failed to create tensor: {}", e)))?;
        Ok((tensor, letterbox))
    }

    /// Run ONNX inference, returning the raw output shape and data.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<i64>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok((shape.iter().copied().collect(), data.to_vec()))
    }
}

impl Detector for YoloFireDetector {
    fn detect(&self, frame: &RgbImage, params: &InferenceParams) -> MediaResult<Vec<Detection>> {
        let (input, letterbox) = self.preprocess(frame)?;
        let (shape, data) = self.run_inference(input)?;
        let detections = decode_output(
            &shape,
            &data,
            &letterbox,
            frame.width(),
            frame.height(),
            params,
        )?;

        debug!(count = detections.len(), "Fire detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yolo-fire"
    }
}

/// Decode a YOLOv8 head of shape `[1, 4 + classes, candidates]` into pixel
/// boxes on the original frame, then apply per-class NMS.
pub fn decode_output(
    shape: &[i64],
    data: &[f32],
    letterbox: &Letterbox,
    orig_width: u32,
    orig_height: u32,
    params: &InferenceParams,
) -> MediaResult<Vec<Detection>> {
    let (num_features, num_boxes) = match shape {
        [1, f, n] | [f, n] if *f > 4 && *n >= 0 => (*f as usize, *n as usize),
        _ => {
            return Err(MediaError::detection_failed(format!(
                "Unexpected output shape {:?}",
                shape
            )))
        }
    };
    let num_classes = num_features - 4;
    if num_classes != CLASS_NAMES.len() {
        debug!(
            num_classes,
            expected = CLASS_NAMES.len(),
            "Model class count differs from class table"
        );
    }

    let output = ArrayView2::from_shape((num_features, num_boxes), data)
        .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;

    let max_x = orig_width as f32;
    let max_y = orig_height as f32;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for c in 0..num_classes {
            let score = output[[4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < params.confidence {
            continue;
        }

        let cx = output[[0, i]];
        let cy = output[[1, i]];
        let w = output[[2, i]];
        let h = output[[3, i]];

        let bbox = BoundingBox::new(
            letterbox.frame_x(cx - w / 2.0).clamp(0.0, max_x),
            letterbox.frame_y(cy - h / 2.0).clamp(0.0, max_y),
            letterbox.frame_x(cx + w / 2.0).clamp(0.0, max_x),
            letterbox.frame_y(cy + h / 2.0).clamp(0.0, max_y),
        );

        candidates.push(Detection::new(bbox, best_class, best_score));
    }

    Ok(non_maximum_suppression(candidates, params.iou))
}

/// Drop same-class boxes overlapping a higher-confidence box by more than `iou`.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou);
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}

/// Create ONNX Runtime session with execution provider selection.
fn create_session(model_path: &Path, device: &str) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[allow(unused_variables)]
    let cpu_only = device.eq_ignore_ascii_case("cpu");

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if !cpu_only {
            if let Ok(cuda_builder) = builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                    info!("Using CUDA execution provider for fire detection");
                    return Ok(session);
                }
            }
            debug!("CUDA execution provider not available, trying alternatives");
        }
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if !cpu_only {
            if let Ok(coreml_builder) = builder
                .clone()
                .with_execution_providers([CoreMLExecutionProvider::default().build()])
            {
                if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                    info!("Using CoreML execution provider for fire detection");
                    return Ok(session);
                }
            }
            debug!("CoreML execution provider not available, using CPU");
        }
    }

    if device.eq_ignore_ascii_case("cuda") && !cfg!(feature = "cuda") {
        info!("CUDA requested but not compiled in, falling back to CPU");
    }

    info!("Using CPU execution provider for fire detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}
