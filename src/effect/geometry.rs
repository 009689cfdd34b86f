use smithay::utils::{Logical, Physical, Point, Rectangle, Size};

use crate::host::{RenderViewport, WindowPaintData};
use crate::utils::Region;

/// Where a window's blur lands in the output framebuffer.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurGeometry {
    /// Area the blur textures are captured from.
    pub background: Rectangle<i32, Physical>,
    /// Parts of the blur shape that are repainted this frame.
    pub visible: Region<Physical>,
    /// The painted window frame.
    pub window_box: Rectangle<i32, Physical>,
}

/// Places a frame-relative logical `region` of a window on `viewport`.
///
/// The window is painted with the scale and translation in `paint`. The background extends
/// `expand_size` logical pixels past the region, clipped to the output. Returns `None` when no
/// part of the region is both on the output and in `damage`.
pub fn blur_geometry(
    viewport: &RenderViewport,
    frame: Rectangle<f64, Logical>,
    region: &Region<Logical>,
    paint: &WindowPaintData,
    expand_size: i32,
    damage: &[Rectangle<i32, Physical>],
) -> Option<BlurGeometry> {
    let (origin_x, origin_y) = viewport.origin;
    let left = frame.loc.x + paint.x_translation - origin_x;
    let top = frame.loc.y + paint.y_translation - origin_y;

    // Both edges snap to the pixel grid so adjacent rects stay adjacent.
    let to_device = |x: f64, y: f64, w: f64, h: f64| -> Rectangle<i32, Physical> {
        Rectangle::<f64, Logical>::new(Point::from((x, y)), Size::from((w, h)))
            .to_physical_precise_round(viewport.scale)
    };

    let shape = region.map(|r| {
        to_device(
            left + f64::from(r.loc.x) * paint.x_scale,
            top + f64::from(r.loc.y) * paint.y_scale,
            f64::from(r.size.w) * paint.x_scale,
            f64::from(r.size.h) * paint.y_scale,
        )
    });
    let bounds = shape.bounding_rect()?;

    let expand = (f64::from(expand_size) * viewport.scale).round() as i32;
    let expanded = Rectangle::new(
        Point::from((bounds.loc.x - expand, bounds.loc.y - expand)),
        Size::from((bounds.size.w + 2 * expand, bounds.size.h + 2 * expand)),
    );
    let background = expanded.intersection(viewport.rect())?;

    let damage = Region::from_rects(damage.iter().copied());
    let visible = shape.intersected_rect(&background).intersected(&damage);
    if visible.is_empty() {
        return None;
    }

    let window_box = to_device(
        left,
        top,
        frame.size.w * paint.x_scale,
        frame.size.h * paint.y_scale,
    );

    Some(BlurGeometry {
        background,
        visible,
        window_box,
    })
}
