//! Face alignment: 4-DOF similarity transform (scale, rotation,
//! translation) onto the five InsightFace reference landmarks, then a
//! bilinear warp into the canonical 112x112 crop.

/// ArcFace reference landmark positions for a 112x112 crop.
const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: usize = 112;

/// Warp the face identified by `landmarks` into a 112x112 aligned crop.
pub fn align_crop(frame: &[u8], width: u32, height: u32, landmarks: &[(f32, f32); 5]) -> Vec<u8> {
    let matrix = estimate_similarity(landmarks, &REFERENCE_LANDMARKS);
    warp_affine(frame, width as usize, height as usize, &matrix)
}

/// Least-squares similarity transform from `src` to `dst` landmarks,
/// returned as the 2x3 matrix [a, -b, tx, b, a, ty].
fn estimate_similarity(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> [f32; 6] {
    // Each point pair contributes two equations over unknowns [a, b, tx, ty]:
    //   sx*a - sy*b + tx = dx
    //   sy*a + sx*b + ty = dy
    // Accumulate the normal equations A^T A x = A^T b and solve directly.
    let mut ata = [0.0f32; 16];
    let mut atb = [0.0f32; 4];

    for i in 0..5 {
        let (sx, sy) = src[i];
        let (dx, dy) = dst[i];
        let rows = [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)];
        for (row, rhs) in rows {
            for j in 0..4 {
                for k in 0..4 {
                    ata[j * 4 + k] += row[j] * row[k];
                }
                atb[j] += row[j] * rhs;
            }
        }
    }

    let [a, b, tx, ty] = solve4(&ata, &atb);
    [a, -b, tx, b, a, ty]
}

/// Gaussian elimination with partial pivoting on a 4x4 system.
fn solve4(ata: &[f32; 16], atb: &[f32; 4]) -> [f32; 4] {
    let mut m = [[0.0f32; 5]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[..4].copy_from_slice(&ata[i * 4..i * 4 + 4]);
        row[4] = atb[i];
    }

    for col in 0..4 {
        let pivot_row = (col..4)
            .max_by(|&a, &b| {
                m[a][col]
                    .abs()
                    .partial_cmp(&m[b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-12 {
            // Degenerate landmark configuration; fall back to identity.
            return [1.0, 0.0, 0.0, 0.0];
        }
        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for j in col..5 {
                m[row][j] -= factor * m[col][j];
            }
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        x[i] = m[i][4];
        for j in (i + 1)..4 {
            x[i] -= m[i][j] * x[j];
        }
        x[i] /= m[i][i];
    }
    x
}

/// Inverse-map each output pixel through the similarity transform and
/// sample the source bilinearly. Out-of-bounds samples are black.
fn warp_affine(frame: &[u8], src_w: usize, src_h: usize, matrix: &[f32; 6]) -> Vec<u8> {
    let (a, tx) = (matrix[0], matrix[2]);
    let (b, ty) = (matrix[3], matrix[5]);

    // M = [[a, -b], [b, a]] inverts to [[a, b], [-b, a]] / (a^2 + b^2).
    let det = a * a + b * b;
    if det.abs() < 1e-12 {
        return vec![0u8; ALIGNED_SIZE * ALIGNED_SIZE];
    }
    let ia = a / det;
    let ib = b / det;

    let sample = |x: i32, y: i32| -> f32 {
        if x >= 0 && x < src_w as i32 && y >= 0 && y < src_h as i32 {
            frame[y as usize * src_w + x as usize] as f32
        } else {
            0.0
        }
    };

    let mut out = vec![0u8; ALIGNED_SIZE * ALIGNED_SIZE];
    for oy in 0..ALIGNED_SIZE {
        for ox in 0..ALIGNED_SIZE {
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = -ib * dx + ia * dy;

            let x0 = sx.floor() as i32;
            let y0 = sy.floor() as i32;
            let fx = sx - x0 as f32;
            let fy = sy - y0 as f32;

            let val = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0) * fx * (1.0 - fy)
                + sample(x0, y0 + 1) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1) * fx * fy;

            out[oy * ALIGNED_SIZE + ox] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_landmarks_already_at_reference() {
        let m = estimate_similarity(&REFERENCE_LANDMARKS, &REFERENCE_LANDMARKS);
        assert!((m[0] - 1.0).abs() < 1e-4, "a = {}", m[0]);
        assert!(m[1].abs() < 1e-4, "-b = {}", m[1]);
        assert!(m[2].abs() < 1e-3, "tx = {}", m[2]);
        assert!(m[3].abs() < 1e-4, "b = {}", m[3]);
        assert!((m[4] - 1.0).abs() < 1e-4, "a2 = {}", m[4]);
        assert!(m[5].abs() < 1e-3, "ty = {}", m[5]);
    }

    #[test]
    fn doubled_landmarks_estimate_half_scale() {
        let mut doubled = REFERENCE_LANDMARKS;
        for p in &mut doubled {
            p.0 *= 2.0;
            p.1 *= 2.0;
        }
        let m = estimate_similarity(&doubled, &REFERENCE_LANDMARKS);
        assert!((m[0] - 0.5).abs() < 0.05, "a = {}, expected ~0.5", m[0]);
    }

    #[test]
    fn crop_has_canonical_size() {
        let frame = vec![128u8; 640 * 480];
        let aligned = align_crop(&frame, 640, 480, &REFERENCE_LANDMARKS);
        assert_eq!(aligned.len(), ALIGNED_SIZE * ALIGNED_SIZE);
    }

    #[test]
    fn landmark_lands_near_reference_after_warp() {
        let (w, h) = (200usize, 200usize);
        let mut frame = vec![0u8; w * h];

        let src_landmarks: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];

        // Bright 5x5 patch at the left-eye position.
        let (lx, ly) = (src_landmarks[0].0 as usize, src_landmarks[0].1 as usize);
        for dy in 0..5 {
            for dx in 0..5 {
                frame[(ly - 2 + dy) * w + (lx - 2 + dx)] = 255;
            }
        }

        let aligned = align_crop(&frame, w as u32, h as u32, &src_landmarks);

        let ref_x = REFERENCE_LANDMARKS[0].0.round() as usize;
        let ref_y = REFERENCE_LANDMARKS[0].1.round() as usize;
        let mut max_val = 0u8;
        for dy in 0..3 {
            for dx in 0..3 {
                let (x, y) = (ref_x - 1 + dx, ref_y - 1 + dy);
                if x < ALIGNED_SIZE && y < ALIGNED_SIZE {
                    max_val = max_val.max(aligned[y * ALIGNED_SIZE + x]);
                }
            }
        }
        assert!(max_val > 100, "expected bright patch near ({ref_x}, {ref_y})");
    }
}
