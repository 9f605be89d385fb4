//! CSV detection log written by the VOD pipeline.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use firewatch_media::annotate::format_ceiled_confidence;
use firewatch_models::Detection;

pub const CSV_HEADER: &str = "Frame_Number,Timestamp,Class,Confidence";

/// Seconds into the clip for a 1-based frame number.
pub fn frame_timestamp(frame_number: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        frame_number as f64 / fps
    } else {
        0.0
    }
}

/// One CSV row without the line terminator.
pub fn format_row(frame_number: u64, fps: f64, detection: &Detection) -> String {
    format!(
        "{},{:.2},{},{}",
        frame_number,
        frame_timestamp(frame_number, fps),
        detection.label(),
        format_ceiled_confidence(detection.confidence)
    )
}

/// Buffered writer for `Frame_Number,Timestamp,Class,Confidence` rows.
pub struct DetectionLogWriter {
    writer: BufWriter<File>,
    rows: usize,
}

impl DetectionLogWriter {
    /// Create (or truncate) the log and write the header.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", CSV_HEADER)?;
        Ok(Self {
            writer,
            rows: 0,
        })
    }

    pub fn write_detection(
        &mut self,
        frame_number: u64,
        fps: f64,
        detection: &Detection,
    ) -> std::io::Result<()> {
        writeln!(self.writer, "{}", format_row(frame_number, fps, detection))?;
        self.rows += 1;
        Ok(())
    }

    /// Flush to disk.
    pub fn finish(mut self) -> std::io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewatch_models::BoundingBox;

    fn det(class_id: usize, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), class_id, confidence)
    }

    #[test]
    fn test_format_row() {
        assert_eq!(format_row(5, 10.0, &det(0, 0.95)), "5,0.50,fire,0.95");
        assert_eq!(format_row(1, 30.0, &det(1, 0.456)), "1,0.03,smoke,0.46");
        assert_eq!(format_row(2, 10.0, &det(0, 0.951)), "2,0.20,fire,0.96");
        assert_eq!(format_row(3, 10.0, &det(1, 0.6)), "3,0.30,smoke,0.60");
    }

    #[test]
    fn test_zero_fps_timestamp() {
        assert_eq!(frame_timestamp(10, 0.0), 0.0);
    }

    #[test]
    fn test_writer_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("log.csv");
        let mut log = DetectionLogWriter::create(&path).unwrap();
        log.write_detection(3, 10.0, &det(2, 0.5)).unwrap();
        assert_eq!(log.finish().unwrap(), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Frame_Number,Timestamp,Class,Confidence\n3,0.30,other,0.50\n");
    }
}
