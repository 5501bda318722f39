//! Zoom control for the canvas view.
//!
//! Zoom is a pure view transform: it scales how the surface is displayed and
//! never touches stored layer coordinates.

use kurbo::{Affine, Point};

/// Smallest zoom percentage.
pub const MIN_ZOOM_PERCENT: u32 = 25;
/// Largest zoom percentage.
pub const MAX_ZOOM_PERCENT: u32 = 500;
/// Step applied by one zoom in/out click.
pub const ZOOM_STEP_PERCENT: u32 = 25;
/// Zoom percentage after a reset.
pub const DEFAULT_ZOOM_PERCENT: u32 = 100;

/// Zoom level as a percentage in `[MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zoom {
    percent: u32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { percent: DEFAULT_ZOOM_PERCENT }
    }
}

impl Zoom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u32 {
        self.percent
    }

    /// Scale factor applied to the display (`percent / 100`).
    pub fn scale(&self) -> f64 {
        self.percent as f64 / 100.0
    }

    /// One step in, clamped at the maximum.
    pub fn zoom_in(&mut self) -> u32 {
        self.percent = (self.percent + ZOOM_STEP_PERCENT).min(MAX_ZOOM_PERCENT);
        self.percent
    }

    /// One step out, clamped at the minimum.
    pub fn zoom_out(&mut self) -> u32 {
        self.percent = self
            .percent
            .saturating_sub(ZOOM_STEP_PERCENT)
            .max(MIN_ZOOM_PERCENT);
        self.percent
    }

    /// Back to 100%.
    pub fn reset(&mut self) -> u32 {
        self.percent = DEFAULT_ZOOM_PERCENT;
        self.percent
    }

    /// Project space to screen space.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.scale())
    }

    /// Screen point to project space.
    pub fn screen_to_project(&self, screen_point: Point) -> Point {
        self.transform().inverse() * screen_point
    }

    /// Project point to screen space.
    pub fn project_to_screen(&self, point: Point) -> Point {
        self.transform() * point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_zoom() {
        let zoom = Zoom::new();
        assert_eq!(zoom.percent(), 100);
        assert!((zoom.scale() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_in_clamps_at_max() {
        let mut zoom = Zoom::new();
        for _ in 0..100 {
            zoom.zoom_in();
        }
        assert_eq!(zoom.percent(), MAX_ZOOM_PERCENT);
    }

    #[test]
    fn test_zoom_out_clamps_at_min() {
        let mut zoom = Zoom::new();
        for _ in 0..100 {
            zoom.zoom_out();
        }
        assert_eq!(zoom.percent(), MIN_ZOOM_PERCENT);
    }

    #[test]
    fn test_steps_of_25_and_reset() {
        let mut zoom = Zoom::new();
        let mut previous = zoom.percent();
        for _ in 0..30 {
            let next = zoom.zoom_in();
            assert!(next == previous + ZOOM_STEP_PERCENT || next == MAX_ZOOM_PERCENT);
            assert_eq!(next % ZOOM_STEP_PERCENT, 0);
            previous = next;
        }
        assert_eq!(zoom.reset(), 100);
    }

    #[test]
    fn test_screen_project_roundtrip() {
        let mut zoom = Zoom::new();
        zoom.zoom_in();
        zoom.zoom_in();

        let screen = zoom.project_to_screen(Point::new(100.0, 40.0));
        assert!((screen.x - 150.0).abs() < 1e-10);
        let back = zoom.screen_to_project(screen);
        assert!((back.x - 100.0).abs() < 1e-10);
        assert!((back.y - 40.0).abs() < 1e-10);
    }
}
