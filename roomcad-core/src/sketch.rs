//! 草图实体：背景区域、参考线、面以及它们的 ID 分配。
//!
//! 所有实体都通过显式传入的 [`IdRegistry`] 生成 ID，不依赖全局单例。

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{
    Curve2d, GEOMETRY_TOLERANCE, Point2, Vector2, is_closed_loop, loop_bounds, loop_polygon,
    point_in_loop,
};
use crate::topology::{self, BuilderRegion};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    #[error("{0} loop has no curves")]
    EmptyLoop(LoopRef),
    #[error("{0} loop is not closed")]
    OpenLoop(LoopRef),
    #[error("hole {0} is not contained in the outer loop")]
    HoleOutsideOuter(usize),
    #[error("edge {0} not found in sketch")]
    MissingEdge(SketchId),
    #[error("guideline {0} not found in sketch")]
    GuidelineNotFound(SketchId),
}

/// 标识区域中的某个环，用于错误信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopRef {
    Outer,
    Hole(usize),
}

impl std::fmt::Display for LoopRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopRef::Outer => write!(f, "outer"),
            LoopRef::Hole(index) => write!(f, "hole {index}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SketchId(u64);

impl SketchId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SketchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ID 的分配范围，每个范围内单调递增。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdScope {
    Sketch,
    Point,
    Edge,
    Face,
    Guideline,
    Background,
}

#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn generate(&mut self) -> SketchId {
        let id = self.next;
        self.next += 1;
        SketchId(id)
    }

    /// 强制占用某个 ID（例如从外部数据恢复时），之后生成的 ID 不会与之冲突。
    pub fn force(&mut self, id: SketchId) -> SketchId {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
        id
    }
}

/// 应用启动时创建一次的 ID 生成器集合，按引用传给命令与构建器。
#[derive(Debug, Default, Clone)]
pub struct IdRegistry {
    generators: HashMap<IdScope, IdGenerator>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, scope: IdScope) -> SketchId {
        self.generators.entry(scope).or_default().generate()
    }

    pub fn force(&mut self, scope: IdScope, id: SketchId) -> SketchId {
        self.generators.entry(scope).or_default().force(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Free,
    Endpoint,
    Center,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SketchPoint {
    id: SketchId,
    position: Point2,
    kind: PointKind,
}

impl SketchPoint {
    pub fn create(ids: &mut IdRegistry, position: Point2, kind: PointKind) -> Self {
        Self {
            id: ids.generate(IdScope::Point),
            position,
            kind,
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> Point2 {
        self.position
    }

    #[inline]
    pub fn kind(&self) -> PointKind {
        self.kind
    }

    pub fn set_x(&mut self, x: f64) {
        self.position = Point2::new(x, self.position.y());
    }

    pub fn set_y(&mut self, y: f64) {
        self.position = Point2::new(self.position.x(), y);
    }

    pub fn set_kind(&mut self, kind: PointKind) {
        self.kind = kind;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    id: SketchId,
    curve: Curve2d,
}

impl Edge {
    pub fn create(ids: &mut IdRegistry, curve: Curve2d) -> Self {
        Self {
            id: ids.generate(IdScope::Edge),
            curve,
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    #[inline]
    pub fn curve(&self) -> &Curve2d {
        &self.curve
    }

    pub fn set_curve(&mut self, curve: Curve2d) {
        self.curve = curve;
    }
}

/// 对边的有向引用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coedge {
    pub edge: SketchId,
    pub reversed: bool,
}

impl Coedge {
    #[inline]
    pub fn forward(edge: SketchId) -> Self {
        Self {
            edge,
            reversed: false,
        }
    }

    #[inline]
    pub fn backward(edge: SketchId) -> Self {
        Self {
            edge,
            reversed: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Wire {
    pub coedges: Vec<Coedge>,
}

impl Wire {
    pub fn new(coedges: Vec<Coedge>) -> Self {
        Self { coedges }
    }

    /// 依据边表解析出有序曲线；反向共边给出反向曲线。
    pub fn resolve(&self, edges: &BTreeMap<SketchId, Edge>) -> Result<Vec<Curve2d>, SketchError> {
        self.coedges
            .iter()
            .map(|coedge| {
                let edge = edges
                    .get(&coedge.edge)
                    .ok_or(SketchError::MissingEdge(coedge.edge))?;
                Ok(if coedge.reversed {
                    edge.curve.reversed()
                } else {
                    edge.curve.clone()
                })
            })
            .collect()
    }
}

/// 一个外环加若干内环（洞）。构造时校验闭合与包含关系。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    outer: Vec<Curve2d>,
    holes: Vec<Vec<Curve2d>>,
}

impl Region {
    pub fn new(outer: Vec<Curve2d>, holes: Vec<Vec<Curve2d>>) -> Result<Self, SketchError> {
        Self::with_tolerance(outer, holes, GEOMETRY_TOLERANCE)
    }

    pub fn with_tolerance(
        outer: Vec<Curve2d>,
        holes: Vec<Vec<Curve2d>>,
        tolerance: f64,
    ) -> Result<Self, SketchError> {
        validate_loop(&outer, LoopRef::Outer, tolerance)?;
        let outer_bounds = loop_bounds(&outer);
        for (index, hole) in holes.iter().enumerate() {
            validate_loop(hole, LoopRef::Hole(index), tolerance)?;
            let inside = outer_bounds.contains_bounds(&loop_bounds(hole), tolerance)
                && loop_polygon(hole)
                    .into_iter()
                    .all(|vertex| point_in_loop(vertex, &outer, tolerance));
            if !inside {
                return Err(SketchError::HoleOutsideOuter(index));
            }
        }
        Ok(Self { outer, holes })
    }

    #[inline]
    pub fn outer(&self) -> &[Curve2d] {
        &self.outer
    }

    #[inline]
    pub fn holes(&self) -> &[Vec<Curve2d>] {
        &self.holes
    }

    /// 整体平移，闭合性与包含关系保持不变。
    pub fn translate(&mut self, offset: Vector2) {
        for curve in self.outer.iter_mut().chain(self.holes.iter_mut().flatten()) {
            curve.translate(offset);
        }
    }
}

fn validate_loop(curves: &[Curve2d], which: LoopRef, tolerance: f64) -> Result<(), SketchError> {
    if curves.is_empty() {
        return Err(SketchError::EmptyLoop(which));
    }
    if !is_closed_loop(curves, tolerance) {
        return Err(SketchError::OpenLoop(which));
    }
    Ok(())
}

/// 草图背景：持有有序的区域列表。
///
/// `regions()` 总是返回深拷贝，调用方拿到的曲线与背景内部状态互不影响。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Background {
    id: SketchId,
    regions: Vec<Region>,
}

impl Background {
    pub fn create(ids: &mut IdRegistry, regions: Vec<Region>) -> Self {
        Self {
            id: ids.generate(IdScope::Background),
            regions,
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    pub fn regions(&self) -> Vec<Region> {
        self.regions.clone()
    }

    #[inline]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn set_regions(&mut self, regions: Vec<Region>) {
        self.regions = regions;
    }

    pub fn to_builder_regions(&self) -> Vec<BuilderRegion> {
        topology::to_builder_regions(self)
    }

    pub(crate) fn regions_ref(&self) -> &[Region] {
        &self.regions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidelineKind {
    Horizontal,
    Vertical,
    Free,
}

/// 草图参考线。创建后只有 `kind` 可以修改。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Guideline {
    id: SketchId,
    curve: Curve2d,
    from_anchor: Point2,
    end_anchor: Point2,
    kind: GuidelineKind,
}

impl Guideline {
    pub fn create(
        ids: &mut IdRegistry,
        curve: Curve2d,
        from_anchor: Point2,
        end_anchor: Point2,
        kind: GuidelineKind,
    ) -> Self {
        Self {
            id: ids.generate(IdScope::Guideline),
            curve,
            from_anchor,
            end_anchor,
            kind,
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    #[inline]
    pub fn curve(&self) -> &Curve2d {
        &self.curve
    }

    #[inline]
    pub fn from_anchor(&self) -> Point2 {
        self.from_anchor
    }

    #[inline]
    pub fn end_anchor(&self) -> Point2 {
        self.end_anchor
    }

    #[inline]
    pub fn kind(&self) -> GuidelineKind {
        self.kind
    }

    pub fn change_kind(&mut self, kind: GuidelineKind) {
        self.kind = kind;
    }

    /// 随所属草图整体平移；这是除 `kind` 外唯一会改动参考线的途径。
    pub(crate) fn translate(&mut self, offset: Vector2) {
        self.curve.translate(offset);
        self.from_anchor = self.from_anchor.translate(offset);
        self.end_anchor = self.end_anchor.translate(offset);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face2d {
    id: SketchId,
    outer: Vec<Curve2d>,
    inner: Vec<Vec<Curve2d>>,
}

impl Face2d {
    pub fn create(ids: &mut IdRegistry, region: Region) -> Self {
        Self {
            id: ids.generate(IdScope::Face),
            outer: region.outer,
            inner: region.holes,
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    #[inline]
    pub fn outer_loop(&self) -> &[Curve2d] {
        &self.outer
    }

    #[inline]
    pub fn inner_loops(&self) -> &[Vec<Curve2d>] {
        &self.inner
    }

    pub fn set_outer_loop(&mut self, outer: Vec<Curve2d>) -> Result<(), SketchError> {
        let region = Region::new(outer, self.inner.clone())?;
        self.outer = region.outer;
        Ok(())
    }

    pub fn set_inner_loops(&mut self, inner: Vec<Vec<Curve2d>>) -> Result<(), SketchError> {
        let region = Region::new(self.outer.clone(), inner)?;
        self.inner = region.holes;
        Ok(())
    }

    pub fn to_builder_region(&self) -> BuilderRegion {
        topology::face_builder_region(self.id, &self.outer, &self.inner)
    }

    pub(crate) fn translate(&mut self, offset: Vector2) {
        for curve in self.outer.iter_mut().chain(self.inner.iter_mut().flatten()) {
            curve.translate(offset);
        }
    }
}

/// 非常规二维草图：背景 + 面 + 参考线 + 边表。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sketch2d {
    id: SketchId,
    background: Background,
    points: Vec<SketchPoint>,
    edges: BTreeMap<SketchId, Edge>,
    faces: Vec<Face2d>,
    guidelines: Vec<Guideline>,
}

impl Sketch2d {
    pub fn create(ids: &mut IdRegistry, background: Background) -> Self {
        Self {
            id: ids.generate(IdScope::Sketch),
            background,
            points: Vec::new(),
            edges: BTreeMap::new(),
            faces: Vec::new(),
            guidelines: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> SketchId {
        self.id
    }

    #[inline]
    pub fn background(&self) -> &Background {
        &self.background
    }

    #[inline]
    pub fn background_mut(&mut self) -> &mut Background {
        &mut self.background
    }

    pub fn add_point(&mut self, ids: &mut IdRegistry, position: Point2, kind: PointKind) -> SketchId {
        let point = SketchPoint::create(ids, position, kind);
        let id = point.id();
        self.points.push(point);
        id
    }

    pub fn point_mut(&mut self, id: SketchId) -> Option<&mut SketchPoint> {
        self.points.iter_mut().find(|point| point.id == id)
    }

    #[inline]
    pub fn points(&self) -> &[SketchPoint] {
        &self.points
    }

    pub fn add_edge(&mut self, ids: &mut IdRegistry, curve: Curve2d) -> SketchId {
        let edge = Edge::create(ids, curve);
        let id = edge.id();
        self.edges.insert(id, edge);
        id
    }

    #[inline]
    pub fn edge(&self, id: SketchId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// 将外环与内环的共边解析为曲线并创建面。
    pub fn add_face_from_wires(
        &mut self,
        ids: &mut IdRegistry,
        outer: &Wire,
        inner: &[Wire],
    ) -> Result<SketchId, SketchError> {
        let outer = outer.resolve(&self.edges)?;
        let holes = inner
            .iter()
            .map(|wire| wire.resolve(&self.edges))
            .collect::<Result<Vec<_>, _>>()?;
        let face = Face2d::create(ids, Region::new(outer, holes)?);
        let id = face.id();
        self.faces.push(face);
        Ok(id)
    }

    #[inline]
    pub fn faces(&self) -> &[Face2d] {
        &self.faces
    }

    pub fn add_guideline(&mut self, guideline: Guideline) -> SketchId {
        let id = guideline.id();
        self.guidelines.push(guideline);
        id
    }

    pub fn remove_guideline(&mut self, id: SketchId) -> Result<Guideline, SketchError> {
        let index = self
            .guidelines
            .iter()
            .position(|guideline| guideline.id == id)
            .ok_or(SketchError::GuidelineNotFound(id))?;
        Ok(self.guidelines.remove(index))
    }

    pub fn guideline(&self, id: SketchId) -> Option<&Guideline> {
        self.guidelines.iter().find(|guideline| guideline.id == id)
    }

    pub fn guideline_mut(&mut self, id: SketchId) -> Option<&mut Guideline> {
        self.guidelines.iter_mut().find(|guideline| guideline.id == id)
    }

    #[inline]
    pub fn guidelines(&self) -> &[Guideline] {
        &self.guidelines
    }

    /// 平移草图的全部几何：背景、点、边、面与参考线。ID 与拓扑关系不变。
    pub fn translate(&mut self, offset: Vector2) {
        for region in &mut self.background.regions {
            region.translate(offset);
        }
        for point in &mut self.points {
            point.position = point.position.translate(offset);
        }
        for edge in self.edges.values_mut() {
            edge.curve.translate(offset);
        }
        for face in &mut self.faces {
            face.translate(offset);
        }
        for guideline in &mut self.guidelines {
            guideline.translate(offset);
        }
    }

    /// 背景区域在前，随后每个面各一个区域。
    pub fn to_builder_regions(&self) -> Vec<BuilderRegion> {
        let mut regions = self.background.to_builder_regions();
        regions.extend(self.faces.iter().map(Face2d::to_builder_region));
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(origin: (f64, f64), size: f64) -> Vec<Curve2d> {
        let (x, y) = origin;
        Curve2d::closed_polygon(&[
            Point2::new(x, y),
            Point2::new(x + size, y),
            Point2::new(x + size, y + size),
            Point2::new(x, y + size),
        ])
    }

    #[test]
    fn region_rejects_open_and_misplaced_loops() {
        let mut open = square((0.0, 0.0), 10.0);
        open.pop();
        assert_eq!(
            Region::new(open, vec![]).unwrap_err(),
            SketchError::OpenLoop(LoopRef::Outer)
        );
        assert_eq!(
            Region::new(vec![], vec![]).unwrap_err(),
            SketchError::EmptyLoop(LoopRef::Outer)
        );
        assert_eq!(
            Region::new(square((0.0, 0.0), 10.0), vec![square((20.0, 20.0), 1.0)]).unwrap_err(),
            SketchError::HoleOutsideOuter(0)
        );
        let region = Region::new(square((0.0, 0.0), 10.0), vec![square((2.0, 2.0), 3.0)])
            .expect("valid region");
        assert_eq!(region.holes().len(), 1);
    }

    #[test]
    fn hole_in_concave_notch_is_outside() {
        let l_shape = Curve2d::closed_polygon(&[
            Point2::new(0.0, 0.0),
            Point2::new(6.0, 0.0),
            Point2::new(6.0, 4.0),
            Point2::new(3.0, 4.0),
            Point2::new(3.0, 6.0),
            Point2::new(0.0, 6.0),
        ]);
        // 洞的包围盒落在外环包围盒内，但整体位于凹口
        assert_eq!(
            Region::new(l_shape.clone(), vec![square((4.0, 4.5), 1.0)]).unwrap_err(),
            SketchError::HoleOutsideOuter(0)
        );
        let region = Region::new(l_shape, vec![square((1.0, 4.5), 1.0)]).expect("hole in the arm");
        assert_eq!(region.holes().len(), 1);
    }

    #[test]
    fn single_circle_is_a_valid_loop() {
        let region = Region::new(vec![Curve2d::circle(Point2::new(0.0, 0.0), 5.0)], vec![])
            .expect("circle region");
        assert_eq!(region.outer().len(), 1);
        assert!(region.holes().is_empty());
    }

    #[test]
    fn forced_ids_are_never_reissued() {
        let mut ids = IdRegistry::new();
        assert_eq!(ids.generate(IdScope::Guideline).get(), 0);
        ids.force(IdScope::Guideline, SketchId::new(10));
        assert_eq!(ids.generate(IdScope::Guideline).get(), 11);
        // 各范围互不影响
        assert_eq!(ids.generate(IdScope::Face).get(), 0);
    }

    #[test]
    fn guideline_kind_is_the_only_mutable_field() {
        let mut ids = IdRegistry::new();
        let mut guideline = Guideline::create(
            &mut ids,
            Curve2d::line(Point2::new(0.0, 0.0), Point2::new(0.0, 5.0)),
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 5.0),
            GuidelineKind::Vertical,
        );
        guideline.change_kind(GuidelineKind::Free);
        assert_eq!(guideline.kind(), GuidelineKind::Free);
        assert_eq!(guideline.end_anchor(), Point2::new(0.0, 5.0));
    }

    #[test]
    fn faces_resolve_reversed_coedges() {
        let mut ids = IdRegistry::new();
        let background = Background::create(&mut ids, Vec::new());
        let mut sketch = Sketch2d::create(&mut ids, background);

        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(4.0, 0.0);
        let c = Point2::new(0.0, 3.0);
        let ab = sketch.add_edge(&mut ids, Curve2d::line(a, b));
        let cb = sketch.add_edge(&mut ids, Curve2d::line(c, b));
        let ca = sketch.add_edge(&mut ids, Curve2d::line(c, a));

        let wire = Wire::new(vec![
            Coedge::forward(ab),
            Coedge::backward(cb),
            Coedge::forward(ca),
        ]);
        let face_id = sketch
            .add_face_from_wires(&mut ids, &wire, &[])
            .expect("closed wire");
        let face = &sketch.faces()[0];
        assert_eq!(face.id(), face_id);
        assert_eq!(face.outer_loop()[1].start_point(), Some(b));

        let missing = Wire::new(vec![Coedge::forward(SketchId::new(99))]);
        assert_eq!(
            sketch.add_face_from_wires(&mut ids, &missing, &[]),
            Err(SketchError::MissingEdge(SketchId::new(99)))
        );
    }

    #[test]
    fn translate_moves_every_sketch_part() {
        let mut ids = IdRegistry::new();
        let background = Background::create(
            &mut ids,
            vec![Region::new(square((0.0, 0.0), 4.0), vec![]).expect("background")],
        );
        let mut sketch = Sketch2d::create(&mut ids, background);
        let point = sketch.add_point(&mut ids, Point2::new(1.0, 1.0), PointKind::Free);
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(2.0, 0.0);
        let c = Point2::new(0.0, 2.0);
        let ab = sketch.add_edge(&mut ids, Curve2d::line(a, b));
        let bc = sketch.add_edge(&mut ids, Curve2d::line(b, c));
        let ca = sketch.add_edge(&mut ids, Curve2d::line(c, a));
        let wire = Wire::new(vec![
            Coedge::forward(ab),
            Coedge::forward(bc),
            Coedge::forward(ca),
        ]);
        sketch.add_face_from_wires(&mut ids, &wire, &[]).expect("face");
        let guideline = Guideline::create(
            &mut ids,
            Curve2d::line(Point2::new(0.0, 1.0), Point2::new(4.0, 1.0)),
            Point2::new(0.0, 1.0),
            Point2::new(4.0, 1.0),
            GuidelineKind::Horizontal,
        );
        let guideline = sketch.add_guideline(guideline);

        sketch.translate(Vector2::new(10.0, 0.0));

        let background = sketch.background().regions();
        assert_eq!(background[0].outer()[0].start_point(), Some(Point2::new(10.0, 0.0)));
        assert_eq!(sketch.points()[0].id(), point);
        assert_eq!(sketch.points()[0].position(), Point2::new(11.0, 1.0));
        assert_eq!(
            sketch.edge(bc).and_then(|edge| edge.curve().start_point()),
            Some(Point2::new(12.0, 0.0))
        );
        assert_eq!(
            sketch.faces()[0].outer_loop()[0].start_point(),
            Some(Point2::new(10.0, 0.0))
        );
        let moved = sketch.guideline(guideline).expect("guideline");
        assert_eq!(moved.curve().start_point(), Some(Point2::new(10.0, 1.0)));
        assert_eq!(moved.from_anchor(), Point2::new(10.0, 1.0));
        assert_eq!(moved.end_anchor(), Point2::new(14.0, 1.0));
        assert_eq!(moved.kind(), GuidelineKind::Horizontal);
    }

    #[test]
    fn sketch_points_update_coordinates() {
        let mut ids = IdRegistry::new();
        let background = Background::create(&mut ids, Vec::new());
        let mut sketch = Sketch2d::create(&mut ids, background);
        let id = sketch.add_point(&mut ids, Point2::new(1.0, 1.0), PointKind::Free);
        let point = sketch.point_mut(id).expect("point exists");
        point.set_x(3.0);
        point.set_kind(PointKind::Center);
        assert_eq!(sketch.points()[0].position(), Point2::new(3.0, 1.0));
        assert_eq!(sketch.points()[0].kind(), PointKind::Center);
    }
}
