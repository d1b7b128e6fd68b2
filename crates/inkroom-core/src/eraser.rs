//! Path-based eraser that deletes shapes and splits freehand strokes.

use crate::elements::{Element, ElementId, ElementKind, ElementStyle};
use crate::geometry::is_near;
use crate::scene::{SceneReader, SceneWriter};
use kurbo::Point;

/// Result of one erase gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EraseBatch {
    /// Elements tombstoned by the gesture that peers already know about.
    pub erased: Vec<ElementId>,
    /// Surviving fragments of split freehand strokes.
    pub created: Vec<Element>,
}

impl EraseBatch {
    pub fn is_empty(&self) -> bool {
        self.erased.is_empty() && self.created.is_empty()
    }
}

/// Contiguous runs of points farther than `radius` from `sample`.
///
/// Returns `None` when no point is within the radius (nothing to erase).
pub fn split_runs(points: &[Point], sample: Point, radius: f64) -> Option<Vec<Vec<Point>>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    let mut touched = false;
    for point in points {
        if point.distance(sample) > radius {
            current.push(*point);
        } else {
            touched = true;
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
    }
    if !touched {
        return None;
    }
    if !current.is_empty() {
        runs.push(current);
    }
    Some(runs)
}

/// Consumes pointer samples and erases what they touch.
#[derive(Debug, Clone)]
pub struct EraserEngine {
    radius: f64,
    path: Vec<Point>,
    trail: Option<ElementId>,
    erased: Vec<ElementId>,
    created: Vec<Element>,
}

impl EraserEngine {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            path: Vec::new(),
            trail: None,
            erased: Vec::new(),
            created: Vec::new(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn is_active(&self) -> bool {
        self.trail.is_some()
    }

    /// Sampled pointer path of the current gesture.
    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Start a gesture: add the feedback trail and erase at the first sample.
    pub fn begin(&mut self, scene: &mut impl SceneWriter, point: Point) {
        self.path.clear();
        self.erased.clear();
        self.created.clear();
        let trail = Element::new(
            ElementKind::Eraser { points: Vec::new() },
            point,
            ElementStyle::eraser_trail(self.radius),
        );
        self.trail = Some(trail.id);
        scene.add(trail);
        self.sample(scene, point);
    }

    /// Record a sample and erase everything it touches.
    pub fn sample(&mut self, scene: &mut impl SceneWriter, point: Point) {
        let Some(trail_id) = self.trail else {
            return;
        };
        self.path.push(point);
        if let Some(mut trail) = scene.get(trail_id).cloned() {
            if let Some(points) = trail.points_mut() {
                points.push(point);
            }
            trail.refresh_point_bounds();
            scene.update(trail);
        }
        self.erase_at(scene, point);
    }

    fn erase_at(&mut self, scene: &mut impl SceneWriter, sample: Point) {
        let mut doomed = Vec::new();
        let mut fragments = Vec::new();

        for element in scene.all() {
            if element.is_eraser_trail() {
                continue;
            }
            match &element.kind {
                ElementKind::Freehand { points } => {
                    let Some(runs) = split_runs(points, sample, self.radius) else {
                        continue;
                    };
                    doomed.push(element.id);
                    for run in runs.into_iter().filter(|run| run.len() > 1) {
                        let mut fragment = element.with_fresh_id();
                        if let Some(points) = fragment.points_mut() {
                            *points = run;
                        }
                        fragment.refresh_point_bounds();
                        fragments.push(fragment);
                    }
                }
                _ => {
                    if is_near(sample, element, self.radius) {
                        doomed.push(element.id);
                    }
                }
            }
        }

        if doomed.is_empty() {
            return;
        }
        log::debug!("eraser removed {} element(s), {} fragment(s)", doomed.len(), fragments.len());
        for id in scene.delete_many(&doomed) {
            // Fragments born in this gesture were never sent; just drop them.
            if let Some(pos) = self.created.iter().position(|e| e.id == id) {
                self.created.remove(pos);
            } else {
                self.erased.push(id);
            }
        }
        for fragment in fragments {
            self.created.push(fragment.clone());
            scene.add(fragment);
        }
    }

    /// End the gesture: tombstone the trail and return what changed.
    pub fn end(&mut self, scene: &mut impl SceneWriter) -> EraseBatch {
        if let Some(trail) = self.trail.take() {
            scene.delete(trail);
        }
        self.path.clear();
        EraseBatch {
            erased: std::mem::take(&mut self.erased),
            created: std::mem::take(&mut self.created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use kurbo::Rect;

    fn ten_points() -> Vec<Point> {
        (0..10).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect()
    }

    fn point_runs(scene: &Scene) -> Vec<Vec<Point>> {
        scene
            .all()
            .iter()
            .filter_map(|e| match &e.kind {
                ElementKind::Freehand { points } => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_split_in_the_middle() {
        let mut scene = Scene::new();
        let points = ten_points();
        let stroke = Element::freehand(points.clone(), ElementStyle::default());
        scene.add(stroke.clone());

        let mut eraser = EraserEngine::new(3.0);
        eraser.begin(&mut scene, points[4]);
        let batch = eraser.end(&mut scene);

        assert!(scene.get(stroke.id).unwrap().deleted);
        assert_eq!(point_runs(&scene), vec![points[0..4].to_vec(), points[5..10].to_vec()]);
        assert_eq!(batch.erased, vec![stroke.id]);
        assert_eq!(batch.created.len(), 2);
        assert!(batch.created.iter().all(|e| e.id != stroke.id && e.style == stroke.style));
    }

    #[test]
    fn test_split_at_start() {
        let mut scene = Scene::new();
        let points = ten_points();
        scene.add(Element::freehand(points.clone(), ElementStyle::default()));

        let mut eraser = EraserEngine::new(3.0);
        eraser.begin(&mut scene, points[0]);
        eraser.end(&mut scene);

        assert_eq!(point_runs(&scene), vec![points[1..10].to_vec()]);
    }

    #[test]
    fn test_single_point_runs_are_dropped() {
        let runs = split_runs(&ten_points(), Point::new(10.0, 0.0), 3.0).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 1);

        let mut scene = Scene::new();
        scene.add(Element::freehand(ten_points(), ElementStyle::default()));
        let mut eraser = EraserEngine::new(3.0);
        eraser.begin(&mut scene, Point::new(10.0, 0.0));
        let batch = eraser.end(&mut scene);
        assert_eq!(batch.created.len(), 1);
        assert_eq!(batch.created[0].points().unwrap().len(), 8);
    }

    #[test]
    fn test_untouched_stroke_survives() {
        assert!(split_runs(&ten_points(), Point::new(45.0, 50.0), 3.0).is_none());
    }

    #[test]
    fn test_shapes_are_tombstoned_whole() {
        let mut scene = Scene::new();
        let rect = Element::rectangle(Rect::new(0.0, 0.0, 100.0, 100.0), ElementStyle::default());
        let far = Element::rectangle(Rect::new(500.0, 500.0, 600.0, 600.0), ElementStyle::default());
        scene.add(rect.clone());
        scene.add(far.clone());

        let mut eraser = EraserEngine::new(5.0);
        eraser.begin(&mut scene, Point::new(200.0, 50.0));
        eraser.sample(&mut scene, Point::new(103.0, 50.0));
        let batch = eraser.end(&mut scene);

        assert_eq!(batch.erased, vec![rect.id]);
        assert!(!scene.get(far.id).unwrap().deleted);
    }

    #[test]
    fn test_trail_is_tombstoned_and_not_reported() {
        let mut scene = Scene::new();
        let mut eraser = EraserEngine::new(5.0);
        eraser.begin(&mut scene, Point::new(0.0, 0.0));
        eraser.sample(&mut scene, Point::new(10.0, 0.0));
        assert_eq!(scene.all().len(), 1);
        assert!(scene.all()[0].is_eraser_trail());
        assert_eq!(eraser.path().len(), 2);

        let batch = eraser.end(&mut scene);
        assert!(batch.is_empty());
        assert!(scene.all().is_empty());
        assert!(!eraser.is_active());
    }

    #[test]
    fn test_fragment_erased_in_same_gesture_is_never_reported() {
        let mut scene = Scene::new();
        let points = ten_points();
        let stroke = Element::freehand(points.clone(), ElementStyle::default());
        scene.add(stroke.clone());

        let mut eraser = EraserEngine::new(3.0);
        eraser.begin(&mut scene, points[4]);
        // Cut the right fragment again, leaving [p5, p6] and [p8, p9]
        eraser.sample(&mut scene, points[7]);
        let batch = eraser.end(&mut scene);

        assert_eq!(batch.erased, vec![stroke.id]);
        assert_eq!(batch.created.len(), 3);
        let live: Vec<_> = scene.all().iter().map(|e| e.id).collect();
        assert!(batch.created.iter().all(|e| live.contains(&e.id)));
    }
}
