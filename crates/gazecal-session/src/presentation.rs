//! Pure helpers for the rendering collaborator: marker fade and placement.

use nalgebra::Point2;

use crate::config::SessionParams;
use crate::sites::Site;

/// Quadratic ease-in/ease-out from `b` to `b + c` over `d`.
pub fn ease_in_out_quad(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / (d / 2.0);
    if t < 1.0 {
        return c / 2.0 * t * t + b;
    }
    let t = t - 1.0;
    -c / 2.0 * (t * (t - 2.0) - 1.0) + b
}

/// Marker opacity for a progress counter: fade in over the lead-in, fully
/// opaque through sampling, fade out over the lead-out.
pub fn marker_alpha(progress: u32, params: &SessionParams) -> f32 {
    let t = progress as f32;
    let start = params.lead_in as f32;
    let stop = params.window_end() as f32;
    let total = params.ceiling() as f32;
    if t < start {
        ease_in_out_quad(t, 0.0, 1.0, start)
    } else if t > stop {
        1.0 - ease_in_out_quad(t - stop, 0.0, 1.0, total - stop)
    } else {
        1.0
    }
}

/// Where to draw the marker in window pixels (origin top-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerPlacement {
    pub center: Point2<f32>,
    pub radius: f32,
}

fn map_unit(value: f32, out: (f32, f32)) -> f32 {
    value * (out.1 - out.0) + out.0
}

/// Place the active site on a window of `window` logical pixels.
///
/// The marker is kept `0.7 * radius` away from every window edge and the
/// site's vertical axis (origin bottom-left) is flipped.
pub fn marker_placement(
    site: &Site,
    window: (f32, f32),
    marker_scale: f32,
    hdpi_factor: f32,
) -> MarkerPlacement {
    let radius = 110.0 * marker_scale * hdpi_factor;
    let pad = 0.7 * radius;
    MarkerPlacement {
        center: Point2::new(
            map_unit(site.target.x, (pad, window.0 - pad)),
            map_unit(site.target.y, (window.1 - pad, pad)),
        ),
        radius,
    }
}
