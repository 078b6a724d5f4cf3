//! Mapping between model (image) space and widget (display) space.

use super::bbox::{round_bbox, BBox, IntBBox};
use super::coord::Coord;
use super::space::{Model, Widget};

/// Values this close to an integer are treated as that integer before
/// rounding back into model space.
const SNAP_EPS: f64 = 1e-6;

/// A bijection between model space and widget space.
///
/// Model space has its origin at the top-left and rows growing downward;
/// widget space has its origin at the bottom-left and rows growing upward.
/// Each axis is scaled by its own ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaler {
    model_height: f64,
    model_width: f64,
    widget_height: f64,
    widget_width: f64,
}

impl Scaler {
    /// A scaler between a model of `model_height x model_width` pixels and
    /// a widget of the given size.
    pub fn new(model_height: usize, model_width: usize, widget_height: f64, widget_width: f64) -> Self {
        Self {
            model_height: model_height as f64,
            model_width: model_width as f64,
            widget_height,
            widget_width,
        }
    }

    /// A scaler whose widget has the same size as the model.
    pub fn identity(model_height: usize, model_width: usize) -> Self {
        Self::new(
            model_height,
            model_width,
            model_height as f64,
            model_width as f64,
        )
    }

    #[inline]
    fn h_ratio(&self) -> f64 {
        self.widget_height / self.model_height
    }

    #[inline]
    fn w_ratio(&self) -> f64 {
        self.widget_width / self.model_width
    }

    /// Converts a model box to widget space. The vertical flip means the
    /// result has `bottom < top`.
    pub fn bbox_model_to_widget(&self, bbox: &BBox<Model>) -> BBox<Widget> {
        BBox::new(
            (self.model_height - bbox.top) * self.h_ratio(),
            bbox.left * self.w_ratio(),
            (self.model_height - bbox.bottom) * self.h_ratio(),
            bbox.right * self.w_ratio(),
        )
    }

    /// Converts a widget box to an integer model box.
    ///
    /// The edges may come in either order; the result is always ordered.
    pub fn bbox_widget_to_model(&self, bbox: &BBox<Widget>) -> IntBBox {
        let model = BBox::<Model>::new(
            self.model_height - bbox.top / self.h_ratio(),
            bbox.left / self.w_ratio(),
            self.model_height - bbox.bottom / self.h_ratio(),
            bbox.right / self.w_ratio(),
        )
        .ordered();
        round_bbox(
            snap(model.top),
            snap(model.left),
            snap(model.bottom),
            snap(model.right),
        )
    }

    /// Converts a model point to widget space, flipping the vertical axis.
    pub fn point_model_to_widget(&self, point: &Coord<Model>) -> Coord<Widget> {
        Coord::new(
            point.x * self.w_ratio(),
            (self.model_height - point.y) * self.h_ratio(),
        )
    }

    /// Inverse of [`point_model_to_widget`](Self::point_model_to_widget).
    pub fn point_widget_to_model(&self, point: &Coord<Widget>) -> Coord<Model> {
        Coord::new(
            point.x / self.w_ratio(),
            self.model_height - point.y / self.h_ratio(),
        )
    }

    /// Converts an integer model box to widget space.
    pub fn int_bbox_to_widget(&self, bbox: &IntBBox) -> BBox<Widget> {
        self.bbox_model_to_widget(&BBox::from(*bbox))
    }

    /// `(height, width)` of the model.
    pub fn model_shape(&self) -> (f64, f64) {
        (self.model_height, self.model_width)
    }

    /// `(height, width)` of the widget.
    pub fn widget_shape(&self) -> (f64, f64) {
        (self.widget_height, self.widget_width)
    }
}

fn snap(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() < SNAP_EPS {
        nearest
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_to_widget_flips_vertical_axis() {
        let scaler = Scaler::new(100, 200, 50.0, 400.0);
        let widget = scaler.bbox_model_to_widget(&BBox::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(widget.top, 45.0);
        assert_eq!(widget.bottom, 35.0);
        assert_eq!(widget.left, 40.0);
        assert_eq!(widget.right, 80.0);
        assert!(widget.bottom < widget.top);
    }

    #[test]
    fn widget_to_model_inverts_model_to_widget() {
        let scaler = Scaler::new(317, 211, 613.0, 97.0);
        let bbox = IntBBox::new(13, 7, 201, 190);
        let widget = scaler.int_bbox_to_widget(&bbox);
        assert_eq!(scaler.bbox_widget_to_model(&widget), bbox);
    }

    #[test]
    fn widget_to_model_rounds_outward() {
        let scaler = Scaler::identity(10, 10);
        let bbox = scaler.bbox_widget_to_model(&BBox::new(8.5, 1.5, 2.5, 3.5));
        assert_eq!(bbox, IntBBox::new(1, 1, 8, 4));
    }

    #[test]
    fn points_round_trip() {
        let scaler = Scaler::new(100, 100, 300.0, 150.0);
        let point = Coord::<Model>::new(12.0, 80.0);
        let widget = scaler.point_model_to_widget(&point);
        assert_eq!(widget.x, 18.0);
        assert_eq!(widget.y, 60.0);
        let back = scaler.point_widget_to_model(&widget);
        assert!((back.x - 12.0).abs() < 1e-9);
        assert!((back.y - 80.0).abs() < 1e-9);
    }
}
