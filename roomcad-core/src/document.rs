//! 户型文档：按插入顺序保存实体，并为事务层提供解析、重建与变更通知。

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Point2, Vector2, loop_bounds};
use crate::sketch::Sketch2d;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 提供原始数值，便于序列化或日志输出。
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 材质描述，编辑材质请求以整体快照替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub seek_id: String,
    pub color: u32,
    pub tile_size: Vector2,
    pub rotation: f64,
}

impl Material {
    pub fn new(seek_id: impl Into<String>, color: u32) -> Self {
        Self {
            seek_id: seek_id.into(),
            color,
            tile_size: Vector2::new(1.0, 1.0),
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_tile_size(mut self, width: f64, height: f64) -> Self {
        self.tile_size = Vector2::new(width, height);
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new("generic", 0xffffff)
    }
}

bitflags! {
    /// 实体状态位。位值与历史数据保持一致，`selected`/`editlight` 属于交互层，不在此定义。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct EntityFlags: u32 {
        const REMOVED = 1 << 2;
        const FROZEN = 1 << 3;
        const HIDDEN = 1 << 4;
        const UNSELECTABLE = 1 << 5;
        const LOCKED = 1 << 7;
    }
}

impl EntityFlags {
    #[inline]
    pub fn is_removed(self) -> bool {
        self.contains(Self::REMOVED)
    }

    #[inline]
    pub fn is_hidden(self) -> bool {
        self.contains(Self::HIDDEN)
    }

    #[inline]
    pub fn is_unselectable(self) -> bool {
        self.contains(Self::UNSELECTABLE)
    }

    #[inline]
    pub fn is_locked(self) -> bool {
        self.contains(Self::LOCKED)
    }

    #[inline]
    pub fn is_frozen(self) -> bool {
        self.contains(Self::FROZEN)
    }
}

/// 待重算标记。事务只负责打标，由下游通过 `Document::take_dirty` 拉取。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirtyFlags {
    pub geometry: bool,
    pub material: bool,
    pub position: bool,
}

impl DirtyFlags {
    #[inline]
    pub fn is_clean(&self) -> bool {
        !(self.geometry || self.material || self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wall {
    pub start: Point2,
    pub end: Point2,
    pub thickness: f64,
    pub height: f64,
    pub material: Material,
}

/// 门窗洞口，`host` 为所在墙体。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opening {
    pub host: Option<EntityId>,
    pub position: Point2,
    pub width: f64,
    pub height: f64,
    pub material: Material,
    pub flipped: bool,
}

/// 线条（踢脚线、顶角线），沿宿主路径放样。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Molding {
    pub host: EntityId,
    pub profile: String,
    pub path: Vec<Point2>,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roof {
    pub outline: Vec<Point2>,
    pub slope: f64,
    pub material: Material,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Group {
    pub members: Vec<EntityId>,
}

/// 自定义模型，撤销/重做后需要额外刷新材质。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomizedModel {
    pub name: String,
    pub position: Point2,
    pub material: Material,
    pub flipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntityKind {
    Wall(Wall),
    Opening(Opening),
    Molding(Molding),
    Roof(Roof),
    Group(Group),
    CustomizedModel(CustomizedModel),
    Sketch(Sketch2d),
}

impl EntityKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EntityKind::Wall(_) => "wall",
            EntityKind::Opening(_) => "opening",
            EntityKind::Molding(_) => "molding",
            EntityKind::Roof(_) => "roof",
            EntityKind::Group(_) => "group",
            EntityKind::CustomizedModel(_) => "customized_model",
            EntityKind::Sketch(_) => "sketch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub flags: EntityFlags,
    pub group: Option<EntityId>,
    pub dirty: DirtyFlags,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            flags: EntityFlags::empty(),
            group: None,
            dirty: DirtyFlags::default(),
            kind,
        }
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.flags.is_removed()
    }

    #[inline]
    pub fn dirty_geometry(&mut self) {
        self.dirty.geometry = true;
    }

    #[inline]
    pub fn dirty_material(&mut self) {
        self.dirty.material = true;
    }

    #[inline]
    pub fn dirty_position(&mut self) {
        self.dirty.position = true;
    }

    pub fn material(&self) -> Option<&Material> {
        match &self.kind {
            EntityKind::Wall(wall) => Some(&wall.material),
            EntityKind::Opening(opening) => Some(&opening.material),
            EntityKind::Molding(molding) => Some(&molding.material),
            EntityKind::Roof(roof) => Some(&roof.material),
            EntityKind::CustomizedModel(model) => Some(&model.material),
            EntityKind::Group(_) | EntityKind::Sketch(_) => None,
        }
    }

    pub fn material_mut(&mut self) -> Option<&mut Material> {
        match &mut self.kind {
            EntityKind::Wall(wall) => Some(&mut wall.material),
            EntityKind::Opening(opening) => Some(&mut opening.material),
            EntityKind::Molding(molding) => Some(&mut molding.material),
            EntityKind::Roof(roof) => Some(&mut roof.material),
            EntityKind::CustomizedModel(model) => Some(&mut model.material),
            EntityKind::Group(_) | EntityKind::Sketch(_) => None,
        }
    }

    /// 只有洞口和自定义模型支持翻转，其余实体返回 `None`。
    pub fn flipped(&self) -> Option<bool> {
        match &self.kind {
            EntityKind::Opening(opening) => Some(opening.flipped),
            EntityKind::CustomizedModel(model) => Some(model.flipped),
            _ => None,
        }
    }

    /// 返回是否写入成功。
    pub fn set_flipped(&mut self, flipped: bool) -> bool {
        match &mut self.kind {
            EntityKind::Opening(opening) => {
                opening.flipped = flipped;
                true
            }
            EntityKind::CustomizedModel(model) => {
                model.flipped = flipped;
                true
            }
            _ => false,
        }
    }

    pub fn members(&self) -> Option<&[EntityId]> {
        match &self.kind {
            EntityKind::Group(group) => Some(&group.members),
            _ => None,
        }
    }

    pub fn members_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        match &mut self.kind {
            EntityKind::Group(group) => Some(&mut group.members),
            _ => None,
        }
    }

    pub fn sketch(&self) -> Option<&Sketch2d> {
        match &self.kind {
            EntityKind::Sketch(sketch) => Some(sketch),
            _ => None,
        }
    }

    pub fn sketch_mut(&mut self) -> Option<&mut Sketch2d> {
        match &mut self.kind {
            EntityKind::Sketch(sketch) => Some(sketch),
            _ => None,
        }
    }

    /// 平移实体；分组只移动自身记录，成员由调用方逐个处理。
    pub fn translate(&mut self, offset: Vector2) {
        match &mut self.kind {
            EntityKind::Wall(wall) => {
                wall.start = wall.start.translate(offset);
                wall.end = wall.end.translate(offset);
            }
            EntityKind::Opening(opening) => {
                opening.position = opening.position.translate(offset);
            }
            EntityKind::Molding(molding) => {
                for point in &mut molding.path {
                    *point = point.translate(offset);
                }
            }
            EntityKind::Roof(roof) => {
                for point in &mut roof.outline {
                    *point = point.translate(offset);
                }
            }
            EntityKind::CustomizedModel(model) => {
                model.position = model.position.translate(offset);
            }
            EntityKind::Sketch(sketch) => sketch.translate(offset),
            EntityKind::Group(_) => {}
        }
    }

    /// 计算实体的 2D 轴对齐范围，分组本身没有几何。
    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        match &self.kind {
            EntityKind::Wall(wall) => {
                let half = wall.thickness.abs() * 0.5;
                for point in [wall.start, wall.end] {
                    bounds.include_point(Point2::new(point.x() - half, point.y() - half));
                    bounds.include_point(Point2::new(point.x() + half, point.y() + half));
                }
            }
            EntityKind::Opening(opening) => {
                let half = opening.width.abs() * 0.5;
                let center = opening.position;
                bounds.include_point(Point2::new(center.x() - half, center.y()));
                bounds.include_point(Point2::new(center.x() + half, center.y()));
            }
            EntityKind::Molding(molding) => {
                for point in &molding.path {
                    bounds.include_point(*point);
                }
            }
            EntityKind::Roof(roof) => {
                for point in &roof.outline {
                    bounds.include_point(*point);
                }
            }
            EntityKind::CustomizedModel(model) => {
                bounds.include_point(model.position);
            }
            EntityKind::Sketch(sketch) => {
                for region in sketch.background().regions_ref() {
                    bounds.include_bounds(&loop_bounds(region.outer()));
                }
            }
            EntityKind::Group(_) => return None,
        }
        if bounds.is_empty() { None } else { Some(bounds) }
    }
}

/// 文档变更信号，由 `drain_events` 拉取。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    Changed(EntityId),
}

#[derive(Debug, Default, Clone)]
pub struct Document {
    entities: Vec<(EntityId, Entity)>,
    next_entity_id: u64,
    events: Vec<DocumentEvent>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            next_entity_id: 1,
            ..Self::default()
        }
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.next_id();
        self.entities.push((id, entity));
        id
    }

    pub fn add_wall(
        &mut self,
        start: Point2,
        end: Point2,
        thickness: f64,
        height: f64,
        material: Material,
    ) -> EntityId {
        self.add_entity(Entity::new(EntityKind::Wall(Wall {
            start,
            end,
            thickness,
            height,
            material,
        })))
    }

    pub fn add_opening(
        &mut self,
        host: Option<EntityId>,
        position: Point2,
        width: f64,
        height: f64,
        material: Material,
    ) -> EntityId {
        self.add_entity(Entity::new(EntityKind::Opening(Opening {
            host,
            position,
            width,
            height,
            material,
            flipped: false,
        })))
    }

    pub fn add_molding<I>(
        &mut self,
        host: EntityId,
        profile: impl Into<String>,
        path: I,
        material: Material,
    ) -> EntityId
    where
        I: IntoIterator<Item = Point2>,
    {
        self.add_entity(Entity::new(EntityKind::Molding(Molding {
            host,
            profile: profile.into(),
            path: path.into_iter().collect(),
            material,
        })))
    }

    pub fn add_roof<I>(&mut self, outline: I, slope: f64, material: Material) -> EntityId
    where
        I: IntoIterator<Item = Point2>,
    {
        self.add_entity(Entity::new(EntityKind::Roof(Roof {
            outline: outline.into_iter().collect(),
            slope,
            material,
        })))
    }

    /// 创建分组并回写成员的 `group` 字段；不存在的成员会被忽略。
    pub fn add_group<I>(&mut self, members: I) -> EntityId
    where
        I: IntoIterator<Item = EntityId>,
    {
        let members: Vec<EntityId> = members
            .into_iter()
            .filter(|member| self.contains(*member))
            .collect();
        let id = self.add_entity(Entity::new(EntityKind::Group(Group {
            members: members.clone(),
        })));
        for member in members {
            if let Some(entity) = self.entity_mut(member) {
                entity.group = Some(id);
            }
        }
        id
    }

    pub fn add_customized_model(
        &mut self,
        name: impl Into<String>,
        position: Point2,
        material: Material,
    ) -> EntityId {
        self.add_entity(Entity::new(EntityKind::CustomizedModel(CustomizedModel {
            name: name.into(),
            position,
            material,
            flipped: false,
        })))
    }

    pub fn add_sketch(&mut self, sketch: Sketch2d) -> EntityId {
        self.add_entity(Entity::new(EntityKind::Sketch(sketch)))
    }

    /// 以指定 id 重建实体（撤销删除、重做创建）。已存在时整体替换。
    pub fn insert_with_id(&mut self, id: EntityId, entity: Entity) {
        if let Some(slot) = self.entity_mut(id) {
            *slot = entity;
        } else {
            self.entities.push((id, entity));
        }
        if id.get() >= self.next_entity_id {
            self.next_entity_id = id.get() + 1;
        }
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let index = self
            .entities
            .iter()
            .position(|(entity_id, _)| *entity_id == id)?;
        Some(self.entities.remove(index).1)
    }

    /// 物理删除所有带 `removed` 标记的实体，返回被删除的 id。
    pub fn purge_removed(&mut self) -> Vec<EntityId> {
        let purged: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| entity.is_removed())
            .map(|(id, _)| *id)
            .collect();
        self.entities.retain(|(_, entity)| !entity.is_removed());
        purged
    }

    pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
        self.entities.iter()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entity(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 读取并清空实体的待重算标记。
    pub fn take_dirty(&mut self, id: EntityId) -> Option<DirtyFlags> {
        self.entity_mut(id).map(|entity| std::mem::take(&mut entity.dirty))
    }

    pub fn notify_changed(&mut self, id: EntityId) {
        self.events.push(DocumentEvent::Changed(id));
    }

    pub fn drain_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// 丢弃 `len` 之后入队的事件，用于撤回不应对外可见的中间变更。
    pub fn truncate_events(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// 未删除实体的整体范围。
    pub fn bounds(&self) -> Option<Bounds2D> {
        let mut bounds = Bounds2D::empty();
        let mut has = false;
        for (_, entity) in &self.entities {
            if entity.is_removed() {
                continue;
            }
            if let Some(entity_bounds) = entity.bounds() {
                bounds.include_bounds(&entity_bounds);
                has = true;
            }
        }
        has.then_some(bounds)
    }

    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id.max(1);
        self.next_entity_id = id + 1;
        EntityId(id)
    }
}
