//! Raster operations over plain luma planes.
//!
//! Everything the sheet detector and the bubble reader need from a vision
//! library, implemented over `&[u8]` planes: sharpness/brightness metrics,
//! Gaussian blur, gradient edge maps, morphology, external contour tracing,
//! polygon approximation, and the area/convexity tests. Buffers are owned
//! `Vec`s scoped to the caller; nothing is retained between calls.

use std::collections::VecDeque;

use crate::geometry::Point;

/// Mean brightness of a luma plane, normalized to 0..1.
pub(crate) fn mean_brightness(luma: &[u8]) -> f64 {
    if luma.is_empty() {
        return 0.5;
    }
    let sum: u64 = luma.iter().map(|&v| v as u64).sum();
    sum as f64 / luma.len() as f64 / 255.0
}

/// Sharpness proxy: variance of the Laplacian response over interior pixels.
pub(crate) fn laplacian_variance(luma: &[u8], width: u32, height: u32) -> f64 {
    let w = width as usize;
    let h = height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let response = luma[i - w] as f64
                + luma[i + w] as f64
                + luma[i - 1] as f64
                + luma[i + 1] as f64
                - 4.0 * luma[i] as f64;
            sum += response;
            sum_sq += response * response;
            count += 1;
        }
    }
    let mean = sum / count as f64;
    sum_sq / count as f64 - mean * mean
}

/// 5x5 Gaussian blur (separable [1 4 6 4 1]/16 kernel, replicated borders).
pub(crate) fn gaussian_blur(luma: &[u8], width: u32, height: u32) -> Vec<u8> {
    const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
    let w = width as usize;
    let h = height as usize;

    let clamp = |v: isize, max: usize| v.clamp(0, max as isize - 1) as usize;

    let mut horizontal = vec![0u16; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, &weight) in KERNEL.iter().enumerate() {
                let sx = clamp(x as isize + k as isize - 2, w);
                acc += weight * luma[y * w + sx] as u32;
            }
            horizontal[y * w + x] = (acc / 16) as u16;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0u32;
            for (k, &weight) in KERNEL.iter().enumerate() {
                let sy = clamp(y as isize + k as isize - 2, h);
                acc += weight * horizontal[sy * w + x] as u32;
            }
            out[y * w + x] = (acc / 16).min(255) as u8;
        }
    }
    out
}

/// Binary edge map from Sobel gradient magnitude with double-threshold
/// hysteresis: pixels at or above `high` are edges, pixels at or above `low`
/// survive only if connected to a strong edge.
pub(crate) fn edge_map(luma: &[u8], width: u32, height: u32, low: f64, high: f64) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    // 0 = below low, 1 = weak, 2 = strong
    let mut grade = vec![0u8; w * h];
    let mut strong = VecDeque::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let gx = luma[i - w + 1] as f64 + 2.0 * luma[i + 1] as f64 + luma[i + w + 1] as f64
                - luma[i - w - 1] as f64
                - 2.0 * luma[i - 1] as f64
                - luma[i + w - 1] as f64;
            let gy = luma[i + w - 1] as f64 + 2.0 * luma[i + w] as f64 + luma[i + w + 1] as f64
                - luma[i - w - 1] as f64
                - 2.0 * luma[i - w] as f64
                - luma[i - w + 1] as f64;
            let magnitude = gx.hypot(gy);
            if magnitude >= high {
                grade[i] = 2;
                out[i] = 255;
                strong.push_back((x, y));
            } else if magnitude >= low {
                grade[i] = 1;
            }
        }
    }

    // Promote weak pixels reachable from strong ones.
    while let Some((x, y)) = strong.pop_front() {
        for (nx, ny) in neighbors8(x, y, w, h) {
            let ni = ny * w + nx;
            if grade[ni] == 1 {
                grade[ni] = 2;
                out[ni] = 255;
                strong.push_back((nx, ny));
            }
        }
    }
    out
}

/// Square-kernel dilation of a binary plane.
pub(crate) fn dilate(bin: &[u8], width: u32, height: u32, kernel: usize) -> Vec<u8> {
    morph(bin, width, height, kernel, true)
}

/// Square-kernel erosion of a binary plane.
pub(crate) fn erode(bin: &[u8], width: u32, height: u32, kernel: usize) -> Vec<u8> {
    morph(bin, width, height, kernel, false)
}

fn morph(bin: &[u8], width: u32, height: u32, kernel: usize, max: bool) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let reach = kernel as isize / 2;
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut hit = !max;
            'window: for dy in -reach..kernel as isize - reach {
                for dx in -reach..kernel as isize - reach {
                    let sx = x as isize + dx;
                    let sy = y as isize + dy;
                    if sx < 0 || sy < 0 || sx >= w as isize || sy >= h as isize {
                        if !max {
                            hit = false;
                            break 'window;
                        }
                        continue;
                    }
                    let v = bin[sy as usize * w + sx as usize] != 0;
                    if max && v {
                        hit = true;
                        break 'window;
                    }
                    if !max && !v {
                        hit = false;
                        break 'window;
                    }
                }
            }
            out[y * w + x] = if hit { 255 } else { 0 };
        }
    }
    out
}

/// Mean-based inverse adaptive threshold: dark marks become foreground.
pub(crate) fn adaptive_threshold_inv(
    luma: &[u8],
    width: u32,
    height: u32,
    window: usize,
    bias: f64,
) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let reach = (window / 2) as isize;

    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row = 0u64;
        for x in 0..w {
            row += luma[y * w + x] as u64;
            integral[(y + 1) * (w + 1) + x + 1] = integral[y * (w + 1) + x + 1] + row;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let x0 = (x as isize - reach).max(0) as usize;
            let y0 = (y as isize - reach).max(0) as usize;
            let x1 = (x as isize + reach + 1).min(w as isize) as usize;
            let y1 = (y as isize + reach + 1).min(h as isize) as usize;
            let area = ((x1 - x0) * (y1 - y0)) as f64;
            let sum = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
                - integral[y0 * (w + 1) + x1]
                - integral[y1 * (w + 1) + x0];
            let mean = sum as f64 / area;
            if (luma[y * w + x] as f64) <= mean - bias {
                out[y * w + x] = 255;
            }
        }
    }
    out
}

/// Count of foreground pixels in a rectangular region.
pub(crate) fn count_foreground(
    bin: &[u8],
    width: u32,
    rect: (usize, usize, usize, usize),
) -> usize {
    let w = width as usize;
    let (x0, y0, x1, y1) = rect;
    let mut count = 0;
    for y in y0..y1 {
        for x in x0..x1 {
            if bin[y * w + x] != 0 {
                count += 1;
            }
        }
    }
    count
}

// Moore neighborhood, clockwise starting north.
const RING: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

fn neighbors8(
    x: usize,
    y: usize,
    w: usize,
    h: usize,
) -> impl Iterator<Item = (usize, usize)> {
    RING.iter().filter_map(move |&(dx, dy)| {
        let nx = x as isize + dx;
        let ny = y as isize + dy;
        if nx >= 0 && ny >= 0 && nx < w as isize && ny < h as isize {
            Some((nx as usize, ny as usize))
        } else {
            None
        }
    })
}

fn ring_index(dx: isize, dy: isize) -> usize {
    RING.iter()
        .position(|&d| d == (dx, dy))
        .expect("unit direction")
}

/// Outer boundaries of 8-connected foreground components, one clockwise
/// contour per component. Components smaller than `min_pixels` are skipped.
pub(crate) fn external_contours(
    bin: &[u8],
    width: u32,
    height: u32,
    min_pixels: usize,
) -> Vec<Vec<Point>> {
    let w = width as usize;
    let h = height as usize;
    let mut labels = vec![0u32; w * h];
    let mut contours = Vec::new();
    let mut label = 0u32;
    let mut queue = VecDeque::new();

    for start_y in 0..h {
        for start_x in 0..w {
            let i = start_y * w + start_x;
            if bin[i] == 0 || labels[i] != 0 {
                continue;
            }

            // Flood-fill the component; the scan order makes (start_x,
            // start_y) its topmost-leftmost pixel.
            label += 1;
            labels[i] = label;
            queue.push_back((start_x, start_y));
            let mut size = 0usize;
            while let Some((x, y)) = queue.pop_front() {
                size += 1;
                for (nx, ny) in neighbors8(x, y, w, h) {
                    let ni = ny * w + nx;
                    if bin[ni] != 0 && labels[ni] == 0 {
                        labels[ni] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            if size < min_pixels {
                continue;
            }
            contours.push(trace_boundary(&labels, w, h, start_x, start_y, label, size));
        }
    }
    contours
}

/// Moore-neighbor boundary trace with Jacob's stopping criterion.
fn trace_boundary(
    labels: &[u32],
    w: usize,
    h: usize,
    start_x: usize,
    start_y: usize,
    label: u32,
    component_size: usize,
) -> Vec<Point> {
    let inside = |x: isize, y: isize| {
        x >= 0 && y >= 0 && x < w as isize && y < h as isize && labels[y as usize * w + x as usize] == label
    };

    let mut contour = vec![Point::new(start_x as f64, start_y as f64)];

    // The start pixel is topmost-leftmost, so its west neighbor is outside
    // the component; enter the trace backtracking to the west.
    let start_state = ((start_x, start_y), ring_index(-1, 0));
    let (mut current, mut back_dir) = start_state;
    let max_steps = 8 * component_size + 8;

    for _ in 0..max_steps {
        let mut moved = false;
        for step in 1..=8 {
            let d = (back_dir + step) % 8;
            let (dx, dy) = RING[d];
            let nx = current.0 as isize + dx;
            let ny = current.1 as isize + dy;
            if inside(nx, ny) {
                // Backtrack of the new pixel is the ring cell examined just
                // before it; consecutive ring cells are 8-adjacent, so the
                // delta is a unit direction.
                let prev_d = (back_dir + step - 1) % 8;
                let (px, py) = RING[prev_d];
                let bx = current.0 as isize + px - nx;
                let by = current.1 as isize + py - ny;
                current = (nx as usize, ny as usize);
                back_dir = ring_index(bx, by);
                moved = true;
                break;
            }
        }
        if !moved {
            // Isolated pixel.
            return contour;
        }
        if (current, back_dir) == start_state {
            break;
        }
        contour.push(Point::new(current.0 as f64, current.1 as f64));
    }
    contour
}

/// Shoelace area of a closed polygon.
pub(crate) fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        acc += p.x * q.y - q.x * p.y;
    }
    acc.abs() / 2.0
}

/// Perimeter of a closed polygon.
pub(crate) fn polygon_perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        acc += p.distance_to(q);
    }
    acc
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = a.distance_to(b);
    if len == 0.0 {
        return p.distance_to(a);
    }
    ((b.x - a.x) * (a.y - p.y) - (a.x - p.x) * (b.y - a.y)).abs() / len
}

fn rdp(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;
    for (i, p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = segment_distance(*p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > epsilon {
        let mut left = rdp(&points[..=max_idx], epsilon);
        let right = rdp(&points[max_idx..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

/// Douglas-Peucker approximation of a closed contour.
pub(crate) fn approx_closed_polygon(contour: &[Point], epsilon: f64) -> Vec<Point> {
    if contour.len() < 4 {
        return contour.to_vec();
    }

    // Split at the vertex farthest from the first one, approximate both
    // halves, rejoin without the duplicated split points.
    let split = contour
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| {
            a.1.distance_to(contour[0])
                .total_cmp(&b.1.distance_to(contour[0]))
        })
        .map(|(i, _)| i)
        .unwrap_or(contour.len() / 2);

    let mut first_half = rdp(&contour[..=split], epsilon);
    let mut second_half: Vec<Point> = contour[split..].to_vec();
    second_half.push(contour[0]);
    let second_half = rdp(&second_half, epsilon);

    first_half.pop();
    first_half.extend_from_slice(&second_half[..second_half.len() - 1]);
    first_half
}

/// Convexity test for a closed polygon: no sign flip across consecutive edge
/// cross products (collinear vertices allowed).
pub(crate) fn is_convex(points: &[Point]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut sign = 0i8;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let c = points[(i + 2) % points.len()];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < f64::EPSILON {
            continue;
        }
        let s = if cross > 0.0 { 1 } else { -1 };
        if sign == 0 {
            sign = s;
        } else if sign != s {
            return false;
        }
    }
    sign != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(w: u32, h: u32, x0: usize, y0: usize, side: usize) -> Vec<u8> {
        let mut mask = vec![0u8; (w * h) as usize];
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask[y * w as usize + x] = 255;
            }
        }
        mask
    }

    #[test]
    fn traces_square_boundary() {
        let mask = square_mask(20, 20, 5, 5, 8);
        let contours = external_contours(&mask, 20, 20, 10);
        assert_eq!(contours.len(), 1);

        let contour = &contours[0];
        // Boundary of an 8x8 square has 28 pixels.
        assert_eq!(contour.len(), 28);
        let area = polygon_area(contour);
        assert!((area - 49.0).abs() < 1e-9, "area {}", area);
    }

    #[test]
    fn approximates_square_to_four_corners() {
        let mask = square_mask(40, 40, 8, 8, 20);
        let contours = external_contours(&mask, 40, 40, 10);
        let contour = &contours[0];
        let eps = 0.02 * polygon_perimeter(contour);
        let poly = approx_closed_polygon(contour, eps);
        assert_eq!(poly.len(), 4);
        assert!(is_convex(&poly));
    }

    #[test]
    fn small_components_are_skipped() {
        let mut mask = square_mask(20, 20, 5, 5, 8);
        mask[0] = 255; // 1px speck
        let contours = external_contours(&mask, 20, 20, 10);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn convexity_rejects_chevron() {
        let chevron = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 4.0),
        ];
        assert!(!is_convex(&chevron));

        let quad = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        assert!(is_convex(&quad));
    }

    #[test]
    fn flat_plane_has_zero_laplacian_variance() {
        let flat = vec![120u8; 100];
        assert_eq!(laplacian_variance(&flat, 10, 10), 0.0);

        let mask = square_mask(10, 10, 3, 3, 4);
        assert!(laplacian_variance(&mask, 10, 10) > 0.0);
    }

    #[test]
    fn adaptive_threshold_picks_dark_marks() {
        let mut luma = vec![200u8; 15 * 15];
        for y in 6..9 {
            for x in 6..9 {
                luma[y * 15 + x] = 20;
            }
        }
        let bin = adaptive_threshold_inv(&luma, 15, 15, 11, 2.0);
        assert_eq!(bin[7 * 15 + 7], 255);
        assert_eq!(bin[0], 0);
    }
}
