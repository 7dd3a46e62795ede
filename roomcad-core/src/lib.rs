pub mod document;
pub mod sketch;
pub mod topology;

pub mod geometry {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 草图闭合判定使用的默认容差。
    pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

    /// 圆弧离散为折线时的等分数。
    pub const ARC_SAMPLES: usize = 16;

    /// 二维点，内部以 `glam::DVec2` 表示，读取时总是按值复制。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance_to(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        /// 在给定容差内判断两点重合。
        #[inline]
        pub fn approx_eq(self, other: Point2, tolerance: f64) -> bool {
            self.distance_to(other) <= tolerance
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算曲线/区域范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 判断 `other` 是否完整落在当前范围内（允许 `tolerance` 的误差）。
        pub fn contains_bounds(&self, other: &Bounds2D, tolerance: f64) -> bool {
            if self.is_empty() || other.is_empty() {
                return false;
            }
            other.min.x() >= self.min.x() - tolerance
                && other.min.y() >= self.min.y() - tolerance
                && other.max.x() <= self.max.x() + tolerance
                && other.max.y() <= self.max.y() + tolerance
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line2d {
        pub from: Point2,
        pub to: Point2,
    }

    impl Line2d {
        #[inline]
        pub fn new(from: Point2, to: Point2) -> Self {
            Self { from, to }
        }

        #[inline]
        pub fn point_at(&self, t: f64) -> Point2 {
            Point2::from_vec(self.from.as_vec2().lerp(self.to.as_vec2(), t))
        }

        /// 在参数 `t` 处拆分线段，`t` 必须位于开区间 (0, 1)。
        pub fn split(&self, t: f64) -> Option<(Line2d, Line2d)> {
            if !(t > 0.0 && t < 1.0) {
                return None;
            }
            let mid = self.point_at(t);
            Some((Line2d::new(self.from, mid), Line2d::new(mid, self.to)))
        }
    }

    /// 圆弧，以圆心和起止点描述；`ccw` 表示从 `from` 逆时针走到 `to`。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct CircleArc2d {
        pub center: Point2,
        pub from: Point2,
        pub to: Point2,
        pub ccw: bool,
    }

    impl CircleArc2d {
        #[inline]
        pub fn new(center: Point2, from: Point2, to: Point2, ccw: bool) -> Self {
            Self {
                center,
                from,
                to,
                ccw,
            }
        }

        #[inline]
        pub fn radius(&self) -> f64 {
            self.center.distance_to(self.from)
        }

        /// 扫掠角（弧度，恒为正）。起止点重合时视为整圆。
        pub fn sweep(&self) -> f64 {
            let (start, end) = if self.ccw {
                (self.angle_of(self.from), self.angle_of(self.to))
            } else {
                (self.angle_of(self.to), self.angle_of(self.from))
            };
            let (start, end) = canonical_interval(start, end);
            end - start
        }

        pub fn point_at(&self, t: f64) -> Point2 {
            let start = self.angle_of(self.from);
            let delta = self.sweep() * t;
            let angle = if self.ccw { start + delta } else { start - delta };
            arc_point(self.center, self.radius(), angle)
        }

        pub fn split(&self, t: f64) -> Option<(CircleArc2d, CircleArc2d)> {
            if !(t > 0.0 && t < 1.0) {
                return None;
            }
            let mid = self.point_at(t);
            Some((
                CircleArc2d::new(self.center, self.from, mid, self.ccw),
                CircleArc2d::new(self.center, mid, self.to, self.ccw),
            ))
        }

        fn angle_of(&self, point: Point2) -> f64 {
            let v = self.center.vector_to(point);
            v.y().atan2(v.x())
        }

        fn include_in(&self, bounds: &mut Bounds2D) {
            let radius = self.radius();
            if radius <= f64::EPSILON {
                bounds.include_point(self.center);
                return;
            }
            bounds.include_point(self.from);
            bounds.include_point(self.to);

            let (start, end) = if self.ccw {
                (self.angle_of(self.from), self.angle_of(self.to))
            } else {
                (self.angle_of(self.to), self.angle_of(self.from))
            };
            let (start, end) = canonical_interval(start, end);
            const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
            for base in QUADRANTS {
                let mut candidate = base;
                while candidate < start {
                    candidate += TAU;
                }
                if candidate <= end {
                    bounds.include_point(arc_point(self.center, radius, candidate));
                }
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle2d {
        pub center: Point2,
        pub radius: f64,
    }

    impl Circle2d {
        #[inline]
        pub fn new(center: Point2, radius: f64) -> Self {
            Self {
                center,
                radius: radius.abs(),
            }
        }
    }

    /// 通用曲线的离散近似，按顺序保存采样点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline2d {
        pub points: Vec<Point2>,
    }

    impl Polyline2d {
        pub fn new<I>(points: I) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            Self {
                points: points.into_iter().collect(),
            }
        }
    }

    /// 草图曲线。构建拓扑时只会整体替换，不会原地修改。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum Curve2d {
        Line(Line2d),
        Arc(CircleArc2d),
        Circle(Circle2d),
        Polyline(Polyline2d),
    }

    impl Curve2d {
        #[inline]
        pub fn line(from: Point2, to: Point2) -> Self {
            Curve2d::Line(Line2d::new(from, to))
        }

        #[inline]
        pub fn arc(center: Point2, from: Point2, to: Point2, ccw: bool) -> Self {
            Curve2d::Arc(CircleArc2d::new(center, from, to, ccw))
        }

        #[inline]
        pub fn circle(center: Point2, radius: f64) -> Self {
            Curve2d::Circle(Circle2d::new(center, radius))
        }

        pub fn polyline<I>(points: I) -> Self
        where
            I: IntoIterator<Item = Point2>,
        {
            Curve2d::Polyline(Polyline2d::new(points))
        }

        /// 按给定点序列生成首尾相接的闭合线段环。
        pub fn closed_polygon(points: &[Point2]) -> Vec<Curve2d> {
            let count = points.len();
            (0..count)
                .map(|index| Curve2d::line(points[index], points[(index + 1) % count]))
                .collect()
        }

        pub fn start_point(&self) -> Option<Point2> {
            match self {
                Curve2d::Line(line) => Some(line.from),
                Curve2d::Arc(arc) => Some(arc.from),
                Curve2d::Circle(circle) => Some(
                    circle
                        .center
                        .translate(Vector2::new(circle.radius, 0.0)),
                ),
                Curve2d::Polyline(polyline) => polyline.points.first().copied(),
            }
        }

        pub fn end_point(&self) -> Option<Point2> {
            match self {
                Curve2d::Line(line) => Some(line.to),
                Curve2d::Arc(arc) => Some(arc.to),
                Curve2d::Circle(_) => self.start_point(),
                Curve2d::Polyline(polyline) => polyline.points.last().copied(),
            }
        }

        /// 曲线本身是否闭合（整圆、首尾重合的圆弧或折线）。
        pub fn is_closed(&self, tolerance: f64) -> bool {
            match self {
                Curve2d::Circle(_) => true,
                Curve2d::Line(_) => false,
                Curve2d::Arc(arc) => arc.from.approx_eq(arc.to, tolerance),
                Curve2d::Polyline(polyline) => {
                    polyline.points.len() > 2
                        && match (polyline.points.first(), polyline.points.last()) {
                            (Some(first), Some(last)) => first.approx_eq(*last, tolerance),
                            _ => false,
                        }
                }
            }
        }

        pub fn length(&self) -> f64 {
            match self {
                Curve2d::Line(line) => line.from.distance_to(line.to),
                Curve2d::Arc(arc) => arc.radius() * arc.sweep(),
                Curve2d::Circle(circle) => TAU * circle.radius,
                Curve2d::Polyline(polyline) => polyline
                    .points
                    .windows(2)
                    .map(|pair| pair[0].distance_to(pair[1]))
                    .sum(),
            }
        }

        pub fn bounds(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            match self {
                Curve2d::Line(line) => {
                    bounds.include_point(line.from);
                    bounds.include_point(line.to);
                }
                Curve2d::Arc(arc) => arc.include_in(&mut bounds),
                Curve2d::Circle(circle) => {
                    let r = circle.radius;
                    let c = circle.center;
                    bounds.include_point(Point2::new(c.x() - r, c.y() - r));
                    bounds.include_point(Point2::new(c.x() + r, c.y() + r));
                }
                Curve2d::Polyline(polyline) => {
                    for point in &polyline.points {
                        bounds.include_point(*point);
                    }
                }
            }
            bounds
        }

        pub fn translate(&mut self, offset: Vector2) {
            match self {
                Curve2d::Line(line) => {
                    line.from = line.from.translate(offset);
                    line.to = line.to.translate(offset);
                }
                Curve2d::Arc(arc) => {
                    arc.center = arc.center.translate(offset);
                    arc.from = arc.from.translate(offset);
                    arc.to = arc.to.translate(offset);
                }
                Curve2d::Circle(circle) => {
                    circle.center = circle.center.translate(offset);
                }
                Curve2d::Polyline(polyline) => {
                    for point in &mut polyline.points {
                        *point = point.translate(offset);
                    }
                }
            }
        }

        /// 沿曲线方向的折线近似，不含终点；圆弧与整圆按 `ARC_SAMPLES` 等分。
        pub fn sample_points(&self) -> Vec<Point2> {
            match self {
                Curve2d::Line(line) => vec![line.from],
                Curve2d::Arc(arc) => (0..ARC_SAMPLES)
                    .map(|step| arc.point_at(step as f64 / ARC_SAMPLES as f64))
                    .collect(),
                Curve2d::Circle(circle) => (0..ARC_SAMPLES)
                    .map(|step| {
                        let angle = TAU * step as f64 / ARC_SAMPLES as f64;
                        arc_point(circle.center, circle.radius, angle)
                    })
                    .collect(),
                Curve2d::Polyline(polyline) => match polyline.points.split_last() {
                    Some((_, rest)) if !rest.is_empty() => rest.to_vec(),
                    _ => polyline.points.clone(),
                },
            }
        }

        /// 返回方向相反的曲线副本。
        pub fn reversed(&self) -> Curve2d {
            match self {
                Curve2d::Line(line) => Curve2d::line(line.to, line.from),
                Curve2d::Arc(arc) => Curve2d::arc(arc.center, arc.to, arc.from, !arc.ccw),
                Curve2d::Circle(circle) => Curve2d::Circle(circle.clone()),
                Curve2d::Polyline(polyline) => {
                    Curve2d::polyline(polyline.points.iter().rev().copied())
                }
            }
        }
    }

    /// 一组首尾相接的曲线的合并范围。
    pub fn loop_bounds(curves: &[Curve2d]) -> Bounds2D {
        let mut bounds = Bounds2D::empty();
        for curve in curves {
            bounds.include_bounds(&curve.bounds());
        }
        bounds
    }

    /// 闭合环的折线近似，按环的走向排列。
    pub fn loop_polygon(curves: &[Curve2d]) -> Vec<Point2> {
        curves.iter().flat_map(Curve2d::sample_points).collect()
    }

    /// 射线法判断点是否落在闭合环内；距边界 `tolerance` 以内视为在环内。
    pub fn point_in_loop(point: Point2, curves: &[Curve2d], tolerance: f64) -> bool {
        let polygon = loop_polygon(curves);
        if polygon.len() < 3 {
            return false;
        }
        let p = point.as_vec2();
        let mut inside = false;
        for (index, current) in polygon.iter().enumerate() {
            let a = current.as_vec2();
            let b = polygon[(index + 1) % polygon.len()].as_vec2();
            if distance_to_segment(p, a, b) <= tolerance {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// 判断曲线序列是否构成闭合环：相邻曲线首尾相接，且最后一条回到起点。
    pub fn is_closed_loop(curves: &[Curve2d], tolerance: f64) -> bool {
        match curves {
            [] => false,
            [single] => single.is_closed(tolerance),
            _ => {
                let pairs = curves.iter().zip(curves.iter().cycle().skip(1));
                for (current, next) in pairs {
                    match (current.end_point(), next.start_point()) {
                        (Some(end), Some(start)) if end.approx_eq(start, tolerance) => {}
                        _ => return false,
                    }
                }
                true
            }
        }
    }

    fn normalize_angle(angle: f64) -> f64 {
        let wrapped = angle.rem_euclid(TAU);
        if wrapped.is_finite() { wrapped } else { 0.0 }
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn distance_to_segment(p: DVec2, a: DVec2, b: DVec2) -> f64 {
        let ab = b - a;
        let length_sq = ab.length_squared();
        if length_sq <= f64::EPSILON {
            return p.distance(a);
        }
        let t = ((p - a).dot(ab) / length_sq).clamp(0.0, 1.0);
        p.distance(a + ab * t)
    }

    fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
        center.translate(offset)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use approx::assert_relative_eq;

        #[test]
        fn quarter_arc_bounds_and_length() {
            let arc = Curve2d::arc(
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                true,
            );
            let bounds = arc.bounds();
            assert_relative_eq!(bounds.min().x(), 0.0, epsilon = 1e-9);
            assert_relative_eq!(bounds.max().y(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(arc.length(), FRAC_PI_2, epsilon = 1e-9);

            // 顺时针方向走完剩余的四分之三圆
            let clockwise = Curve2d::arc(
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                false,
            );
            assert_relative_eq!(clockwise.length(), 3.0 * FRAC_PI_2, epsilon = 1e-9);
            assert_relative_eq!(clockwise.bounds().min().y(), -1.0, epsilon = 1e-9);
        }

        #[test]
        fn split_rejects_parameters_outside_open_interval() {
            let line = Line2d::new(Point2::new(0.0, 0.0), Point2::new(4.0, 0.0));
            assert!(line.split(0.0).is_none());
            assert!(line.split(1.0).is_none());
            let (left, right) = line.split(0.25).expect("split inside range");
            assert_relative_eq!(left.to.x(), 1.0);
            assert_eq!(left.to, right.from);

            let arc = CircleArc2d::new(
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(-1.0, 0.0),
                true,
            );
            let (first, second) = arc.split(0.5).expect("split arc");
            assert_relative_eq!(first.to.x(), 0.0, epsilon = 1e-9);
            assert_relative_eq!(first.to.y(), 1.0, epsilon = 1e-9);
            assert_eq!(second.to, arc.to);
        }

        #[test]
        fn closed_loop_detection() {
            let square = Curve2d::closed_polygon(&[
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 1.0),
            ]);
            assert!(is_closed_loop(&square, GEOMETRY_TOLERANCE));
            assert!(!is_closed_loop(&square[..3], GEOMETRY_TOLERANCE));
            assert!(is_closed_loop(
                &[Curve2d::circle(Point2::new(0.0, 0.0), 2.0)],
                GEOMETRY_TOLERANCE
            ));
            assert!(!is_closed_loop(&[], GEOMETRY_TOLERANCE));
        }

        #[test]
        fn point_in_concave_loop() {
            let l_shape = Curve2d::closed_polygon(&[
                Point2::new(0.0, 0.0),
                Point2::new(6.0, 0.0),
                Point2::new(6.0, 4.0),
                Point2::new(3.0, 4.0),
                Point2::new(3.0, 6.0),
                Point2::new(0.0, 6.0),
            ]);
            assert!(point_in_loop(Point2::new(1.0, 5.0), &l_shape, GEOMETRY_TOLERANCE));
            assert!(point_in_loop(Point2::new(5.0, 1.0), &l_shape, GEOMETRY_TOLERANCE));
            assert!(!point_in_loop(Point2::new(5.0, 5.0), &l_shape, GEOMETRY_TOLERANCE));
            // 边界上的点
            assert!(point_in_loop(Point2::new(3.0, 5.0), &l_shape, GEOMETRY_TOLERANCE));

            let circle = [Curve2d::circle(Point2::new(0.0, 0.0), 2.0)];
            assert!(point_in_loop(Point2::new(0.5, 0.5), &circle, GEOMETRY_TOLERANCE));
            assert!(!point_in_loop(Point2::new(2.5, 0.0), &circle, GEOMETRY_TOLERANCE));
        }

        #[test]
        fn reversed_arc_keeps_geometry() {
            let arc = Curve2d::arc(
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(0.0, 1.0),
                true,
            );
            let reversed = arc.reversed();
            assert_eq!(reversed.start_point(), arc.end_point());
            assert_relative_eq!(reversed.length(), arc.length(), epsilon = 1e-9);
            assert_eq!(reversed.reversed(), arc);
        }
    }
}
