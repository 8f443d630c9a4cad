//! SCRFD face detection: anchor-free decode over three stride levels,
//! IoU-based non-maximum suppression.

use crate::FaceEngineError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use tessera_core::RawImage;

const INPUT_SIZE: usize = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// One detected face, in source-image coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five landmarks: left eye, right eye, nose, left mouth, right mouth.
    pub landmarks: [(f32, f32); 5],
}

/// Mapping from letterboxed model space back to source coordinates.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

pub struct Detector {
    session: Session,
}

impl Detector {
    pub fn load(model_path: &Path) -> Result<Self, FaceEngineError> {
        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        // SCRFD exports 9 outputs: score/bbox/kps for strides 8, 16, 32,
        // in positional order [scores 8/16/32, bboxes 8/16/32, kps 8/16/32].
        let num_outputs = session.outputs().len();
        if num_outputs < 9 {
            return Err(FaceEngineError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs, got {num_outputs}"
            )));
        }

        tracing::info!(path = %model_path.display(), "SCRFD detector loaded");
        Ok(Self { session })
    }

    /// Detect faces, sorted by confidence descending. Detections without a
    /// full landmark set are dropped: downstream alignment requires all
    /// five points.
    pub fn detect(&mut self, image: &RawImage) -> Result<Vec<Detection>, FaceEngineError> {
        let (input, letterbox) = preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let (_, scores) = outputs[level]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceEngineError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[level + 3]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceEngineError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[level + 6]
                .try_extract_tensor::<f32>()
                .map_err(|e| FaceEngineError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            decode_stride(scores, bboxes, kps, stride, &letterbox, &mut detections);
        }

        let mut kept = nms(detections, NMS_THRESHOLD);
        kept.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(kept)
    }
}

/// Letterbox-resize a grayscale image into the 640x640 model input and
/// normalize. Padding uses the pixel mean so it normalizes to zero.
fn preprocess(image: &RawImage) -> (Array4<f32>, Letterbox) {
    let (src_w, src_h) = (image.width as usize, image.height as usize);
    let scale = (INPUT_SIZE as f32 / src_w as f32).min(INPUT_SIZE as f32 / src_h as f32);
    let new_w = (src_w as f32 * scale).round() as usize;
    let new_h = (src_h as f32 * scale).round() as usize;
    let pad_x = (INPUT_SIZE - new_w) as f32 / 2.0;
    let pad_y = (INPUT_SIZE - new_h) as f32 / 2.0;
    let (x0, y0) = (pad_x.floor() as usize, pad_y.floor() as usize);

    let resized = bilinear_resize(&image.data, src_w, src_h, new_w, new_h);

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let pixel = if y >= y0 && y < y0 + new_h && x >= x0 && x < x0 + new_w {
                resized[(y - y0) * new_w + (x - x0)] as f32
            } else {
                PIXEL_MEAN
            };
            let normalized = (pixel - PIXEL_MEAN) / PIXEL_STD;
            // Grayscale replicated across the three input channels.
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

fn bilinear_resize(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let scale_x = src_w as f32 / dst_w as f32;
    let scale_y = src_h as f32 / dst_h as f32;
    let mut dst = vec![0u8; dst_w * dst_h];

    for y in 0..dst_h {
        let sy = (y as f32 + 0.5) * scale_y - 0.5;
        let y0 = (sy.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (sy - sy.floor()).clamp(0.0, 1.0);

        for x in 0..dst_w {
            let sx = (x as f32 + 0.5) * scale_x - 0.5;
            let x0 = (sx.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (sx - sx.floor()).clamp(0.0, 1.0);

            let top = src[y0 * src_w + x0] as f32 * (1.0 - fx) + src[y0 * src_w + x1] as f32 * fx;
            let bot = src[y1 * src_w + x0] as f32 * (1.0 - fx) + src[y1 * src_w + x1] as f32 * fx;
            dst[y * dst_w + x] = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
        }
    }

    dst
}

/// Decode one stride level's anchor grid into detections above the
/// confidence threshold, mapped back to source coordinates.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<Detection>,
) {
    let grid_w = INPUT_SIZE / stride;
    let grid_h = INPUT_SIZE / stride;
    let num_anchors = grid_w * grid_h * ANCHORS_PER_CELL;

    let unmap = |px: f32, py: f32| {
        (
            (px - letterbox.pad_x) / letterbox.scale,
            (py - letterbox.pad_y) / letterbox.scale,
        )
    };

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid_w) as f32 * stride as f32;
        let anchor_cy = (cell / grid_w) as f32 * stride as f32;

        // Box regressed as distances [left, top, right, bottom] * stride.
        let b = idx * 4;
        if b + 3 >= bboxes.len() {
            continue;
        }
        let (x1, y1) = unmap(
            anchor_cx - bboxes[b] * stride as f32,
            anchor_cy - bboxes[b + 1] * stride as f32,
        );
        let (x2, y2) = unmap(
            anchor_cx + bboxes[b + 2] * stride as f32,
            anchor_cy + bboxes[b + 3] * stride as f32,
        );

        let k = idx * 10;
        if k + 9 >= kps.len() {
            continue;
        }
        let mut landmarks = [(0.0f32, 0.0f32); 5];
        for (point, lm) in landmarks.iter_mut().enumerate() {
            *lm = unmap(
                anchor_cx + kps[k + point * 2] * stride as f32,
                anchor_cy + kps[k + point * 2 + 1] * stride as f32,
            );
        }

        out.push(Detection {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-maximum suppression: keep the highest-confidence detection in each
/// overlapping cluster.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        if keep.iter().all(|kept| iou(kept, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
