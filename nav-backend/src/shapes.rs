//! Point-in-region testing over unions of axis-aligned rectangles.

#[derive(Debug, Clone, Copy)]
pub struct Rectangle {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Rectangle {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Rect(Rectangle),
    Union(Vec<Shape>),
}

impl Shape {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Shape::Rect(r) => r.contains(x, y),
            Shape::Union(members) => members.iter().any(|m| m.contains(x, y)),
        }
    }
}

/// A named, floor-scoped region bound to one shape and optionally to a
/// representative graph node.
pub struct Zone {
    pub name: String,
    pub shape: Shape,
    pub representative: Option<crate::graph::Point>,
}

/// Resolves the zone containing `(x, y)` among `zones`.
///
/// In `strict` mode, more than one match is an error (`Overlap`); the caller
/// is expected to retry in non-strict mode, where the first match in
/// catalog order wins.
pub fn classify<'a>(
    zones: &'a [Zone],
    floor: &str,
    x: f64,
    y: f64,
    strict: bool,
) -> Result<Option<&'a Zone>, crate::error::NavError> {
    let mut matches = zones.iter().filter(|z| z.shape.contains(x, y));
    let Some(first) = matches.next() else { return Ok(None) };
    if strict {
        if let Some(_second) = matches.next() {
            let names: Vec<String> = zones
                .iter()
                .filter(|z| z.shape.contains(x, y))
                .map(|z| z.name.clone())
                .collect();
            return Err(crate::error::NavError::Overlap { floor: floor.to_string(), zones: names });
        }
    }
    Ok(Some(first))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Point;

    fn rect(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Shape {
        Shape::Rect(Rectangle { xmin, xmax, ymin, ymax })
    }

    #[test]
    fn rectangle_contains_boundary_inclusive() {
        let r = Rectangle { xmin: 0.0, xmax: 10.0, ymin: 0.0, ymax: 10.0 };
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(10.0, 10.0));
        assert!(!r.contains(10.1, 5.0));
    }

    #[test]
    fn union_contains_any_member() {
        let u = Shape::Union(vec![rect(0.0, 1.0, 0.0, 1.0), rect(5.0, 6.0, 5.0, 6.0)]);
        assert!(u.contains(0.5, 0.5));
        assert!(u.contains(5.5, 5.5));
        assert!(!u.contains(3.0, 3.0));
    }

    #[test]
    fn strict_classify_reports_overlap() {
        let zones = vec![
            Zone { name: "a".into(), shape: rect(0.0, 10.0, 0.0, 10.0), representative: Some(Point(0, 0)) },
            Zone { name: "b".into(), shape: rect(5.0, 15.0, 5.0, 15.0), representative: Some(Point(10, 10)) },
        ];
        let strict = classify(&zones, "B1", 7.0, 7.0, true);
        assert!(matches!(strict, Err(crate::error::NavError::Overlap { .. })));

        let lenient = classify(&zones, "B1", 7.0, 7.0, false).unwrap();
        assert_eq!(lenient.unwrap().name, "a");
    }

    #[test]
    fn representative_node_classifies_back_to_its_zone() {
        let zones = vec![Zone {
            name: "b1_07".into(),
            shape: rect(0.0, 10.0, 0.0, 10.0),
            representative: Some(Point(5, 5)),
        }];
        let found = classify(&zones, "B1", 5.0, 5.0, true).unwrap().unwrap();
        assert_eq!(found.name, "b1_07");
    }
}
