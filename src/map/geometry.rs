use crate::braille::BrailleCanvas;

/// Bresenham line between two pixel positions
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);

    loop {
        canvas.set_pixel(x, y);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Filled disc (marker body)
pub fn draw_disc(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= r2 {
                canvas.set_pixel(cx + dx, cy + dy);
            }
        }
    }
}

/// One-pixel circle outline (selection halo)
pub fn draw_ring(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    let inner = (radius - 1).max(0);
    let (outer2, inner2) = (radius * radius, inner * inner);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 <= outer2 && d2 > inner2 {
                canvas.set_pixel(cx + dx, cy + dy);
            }
        }
    }
}
