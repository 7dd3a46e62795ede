//! 事务请求：一次原子、可逆的实体修改。
//!
//! 生命周期 `Created -> Committed -> Undone <-> Redone`，非法迁移返回
//! [`TransactionError::InvalidTransition`]。提交只打脏标记，不做同步重算。

use std::fmt;

use roomcad_core::document::{Document, Entity, EntityFlags, EntityId, EntityKind, Material};
use roomcad_core::geometry::{Point2, Vector2};
use roomcad_core::sketch::{Guideline, GuidelineKind, Region, SketchError, SketchId};
use tracing::debug;

use crate::errors::TransactionError;
use crate::transaction::RequestType;
use crate::txn_state::{create_txn_state, EntityField, TxnKind, TxnPhase, TxnState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Committed,
    Undone,
    Redone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Commit,
    Undo,
    Redo,
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestAction::Commit => "commit",
            RequestAction::Undo => "undo",
            RequestAction::Redo => "redo",
        };
        f.write_str(name)
    }
}

impl RequestState {
    /// 校验迁移并返回目标状态。
    pub fn transition(self, action: RequestAction) -> Result<RequestState, TransactionError> {
        match (self, action) {
            (RequestState::Created, RequestAction::Commit) => Ok(RequestState::Committed),
            (RequestState::Committed | RequestState::Redone, RequestAction::Undo) => {
                Ok(RequestState::Undone)
            }
            (RequestState::Undone, RequestAction::Redo) => Ok(RequestState::Redone),
            (from, action) => Err(TransactionError::InvalidTransition { from, action }),
        }
    }
}

pub trait Request: fmt::Debug {
    fn request_type(&self) -> RequestType;

    fn state(&self) -> RequestState;

    fn on_commit(&mut self, doc: &mut Document) -> Result<(), TransactionError>;

    fn on_undo(&mut self, doc: &mut Document) -> Result<(), TransactionError>;

    fn on_redo(&mut self, doc: &mut Document) -> Result<(), TransactionError>;

    /// 能否与相邻的字段级编辑合并为一条历史。
    fn can_transact_field(&self) -> bool {
        false
    }

    fn targets(&self) -> Vec<EntityId>;

    fn description(&self) -> String;
}

/// 一组实体事务状态，`StateRequest` 在提交时通过它登记要快照的实体与字段。
#[derive(Debug, Default)]
pub struct TxnStates {
    states: Vec<Box<dyn TxnState>>,
    field_level: bool,
}

impl TxnStates {
    fn new(field_level: bool) -> Self {
        Self {
            states: Vec::new(),
            field_level,
        }
    }

    /// 在修改实体之前调用。`field` 为 `None` 时记录整个实体。
    pub fn transact(
        &mut self,
        doc: &Document,
        id: EntityId,
        field: Option<EntityField>,
        kind: TxnKind,
    ) -> Result<(), TransactionError> {
        let field_level = self.field_level && field.is_some();
        if let Some(state) = self.states.iter_mut().find(|state| state.entity_id() == id) {
            state.transact(doc, field, field_level);
            return Ok(());
        }
        let mut state = create_txn_state(doc, id, kind)?;
        state.transact(doc, field, field_level);
        self.states.push(state);
        Ok(())
    }

    fn commit(&mut self, doc: &Document) {
        for state in &mut self.states {
            state.commit(doc);
        }
    }

    /// 先恢复全部实体，再统一发出通知；返回实际恢复的实体数量。
    fn restore(&mut self, doc: &mut Document, phase: TxnPhase) -> usize {
        let restored = self
            .states
            .iter_mut()
            .filter_map(|state| state.restore(doc, phase).then_some(()))
            .count();
        for state in &self.states {
            state.post_restore(doc);
        }
        restored
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// 基于快照的请求需要实现的修改步骤。撤销与重做由快照完成，不再调用 `apply`。
pub trait StateMutation: fmt::Debug {
    fn request_type(&self) -> RequestType;

    fn targets(&self) -> Vec<EntityId>;

    fn description(&self) -> String;

    fn can_transact_field(&self) -> bool {
        false
    }

    /// 校验前置条件，经 `states` 登记快照后修改文档。校验失败时不得留下任何修改。
    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError>;
}

#[derive(Debug)]
pub struct StateRequest<M> {
    mutation: M,
    state: RequestState,
    txn_states: TxnStates,
}

impl<M: StateMutation> StateRequest<M> {
    pub fn new(mutation: M) -> Self {
        let field_level = mutation.can_transact_field();
        Self {
            mutation,
            state: RequestState::Created,
            txn_states: TxnStates::new(field_level),
        }
    }

    #[inline]
    pub fn mutation(&self) -> &M {
        &self.mutation
    }

    fn replay(&mut self, doc: &mut Document, action: RequestAction) -> Result<(), TransactionError> {
        let next = self.state.transition(action)?;
        let phase = if action == RequestAction::Undo {
            TxnPhase::Undo
        } else {
            TxnPhase::Redo
        };
        let restored = self.txn_states.restore(doc, phase);
        if restored < self.txn_states.len() {
            debug!(
                request = %self.mutation.request_type(),
                restored,
                captured = self.txn_states.len(),
                "部分实体已不在文档中"
            );
        }
        self.state = next;
        Ok(())
    }
}

impl<M: StateMutation> Request for StateRequest<M> {
    fn request_type(&self) -> RequestType {
        self.mutation.request_type()
    }

    fn state(&self) -> RequestState {
        self.state
    }

    fn on_commit(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        let next = self.state.transition(RequestAction::Commit)?;
        self.mutation.apply(&mut self.txn_states, doc)?;
        self.txn_states.commit(doc);
        self.state = next;
        Ok(())
    }

    fn on_undo(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        self.replay(doc, RequestAction::Undo)
    }

    fn on_redo(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        self.replay(doc, RequestAction::Redo)
    }

    fn can_transact_field(&self) -> bool {
        self.mutation.can_transact_field()
    }

    fn targets(&self) -> Vec<EntityId> {
        self.mutation.targets()
    }

    fn description(&self) -> String {
        self.mutation.description()
    }
}

fn live_entity(doc: &Document, id: EntityId) -> Result<&Entity, TransactionError> {
    doc.entity(id).ok_or(TransactionError::EntityNotFound(id))
}

fn sketch_of(doc: &Document, id: EntityId) -> Result<(), TransactionError> {
    match live_entity(doc, id)?.kind {
        EntityKind::Sketch(_) => Ok(()),
        _ => Err(TransactionError::WrongKind {
            entity: id,
            expected: "sketch",
        }),
    }
}

/// 材质编辑：显式保存新旧材质，不经过快照。
#[derive(Debug)]
pub struct EditMaterialRequest {
    entity: EntityId,
    previous: Option<Material>,
    next: Material,
    state: RequestState,
}

impl EditMaterialRequest {
    pub fn new(entity: EntityId, next: Material) -> Self {
        Self {
            entity,
            previous: None,
            next,
            state: RequestState::Created,
        }
    }

    fn write(&self, doc: &mut Document, material: &Material) -> bool {
        let Some(entity) = doc.entity_mut(self.entity) else {
            debug!(entity = self.entity.get(), "实体已不在文档中，跳过材质恢复");
            return false;
        };
        let Some(slot) = entity.material_mut() else {
            return false;
        };
        *slot = material.clone();
        entity.dirty_material();
        doc.notify_changed(self.entity);
        true
    }
}

impl Request for EditMaterialRequest {
    fn request_type(&self) -> RequestType {
        RequestType::EditMaterial
    }

    fn state(&self) -> RequestState {
        self.state
    }

    fn on_commit(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        let next = self.state.transition(RequestAction::Commit)?;
        let previous = live_entity(doc, self.entity)?
            .material()
            .cloned()
            .ok_or(TransactionError::WrongKind {
                entity: self.entity,
                expected: "material holder",
            })?;
        self.previous = Some(previous);
        let material = self.next.clone();
        self.write(doc, &material);
        self.state = next;
        Ok(())
    }

    fn on_undo(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        let next = self.state.transition(RequestAction::Undo)?;
        if let Some(previous) = self.previous.clone() {
            self.write(doc, &previous);
        }
        self.state = next;
        Ok(())
    }

    fn on_redo(&mut self, doc: &mut Document) -> Result<(), TransactionError> {
        let next = self.state.transition(RequestAction::Redo)?;
        let material = self.next.clone();
        self.write(doc, &material);
        self.state = next;
        Ok(())
    }

    fn can_transact_field(&self) -> bool {
        true
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.entity]
    }

    fn description(&self) -> String {
        format!("编辑材质 {} -> {}", self.entity, self.next.seek_id)
    }
}

#[derive(Debug)]
pub struct FlipContent {
    pub entity: EntityId,
}

impl StateMutation for FlipContent {
    fn request_type(&self) -> RequestType {
        RequestType::FlipContent
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.entity]
    }

    fn description(&self) -> String {
        format!("翻转 {}", self.entity)
    }

    fn can_transact_field(&self) -> bool {
        true
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        let flipped = live_entity(doc, self.entity)?
            .flipped()
            .ok_or(TransactionError::WrongKind {
                entity: self.entity,
                expected: "flippable content",
            })?;
        states.transact(doc, self.entity, Some(EntityField::Flipped), TxnKind::Modification)?;
        if let Some(entity) = doc.entity_mut(self.entity) {
            entity.set_flipped(!flipped);
            entity.dirty_geometry();
        }
        Ok(())
    }
}

pub type FlipContentRequest = StateRequest<FlipContent>;

/// 把成员加入分组，同时维护成员的 `group` 与分组的 `members`。
#[derive(Debug)]
pub struct IncludeIntoGroup {
    pub group: EntityId,
    pub member: EntityId,
}

impl StateMutation for IncludeIntoGroup {
    fn request_type(&self) -> RequestType {
        RequestType::IncludeIntoGroup
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.group, self.member]
    }

    fn description(&self) -> String {
        format!("将 {} 加入分组 {}", self.member, self.group)
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        if live_entity(doc, self.group)?.members().is_none() {
            return Err(TransactionError::WrongKind {
                entity: self.group,
                expected: "group",
            });
        }
        let previous = live_entity(doc, self.member)?
            .group
            .filter(|previous| *previous != self.group);

        states.transact(doc, self.member, Some(EntityField::Group), TxnKind::Modification)?;
        states.transact(doc, self.group, Some(EntityField::Members), TxnKind::Modification)?;
        // 成员只属于一个分组，先从原分组移出
        if let Some(previous) = previous {
            if doc.entity(previous).and_then(Entity::members).is_some() {
                states.transact(doc, previous, Some(EntityField::Members), TxnKind::Modification)?;
                if let Some(members) = doc.entity_mut(previous).and_then(Entity::members_mut) {
                    members.retain(|member| *member != self.member);
                }
            }
        }
        if let Some(member) = doc.entity_mut(self.member) {
            member.group = Some(self.group);
        }
        if let Some(members) = doc.entity_mut(self.group).and_then(Entity::members_mut) {
            if !members.contains(&self.member) {
                members.push(self.member);
            }
        }
        Ok(())
    }
}

pub type IncludeIntoGroupRequest = StateRequest<IncludeIntoGroup>;

#[derive(Debug)]
pub struct MoveEntity {
    pub entity: EntityId,
    pub offset: Vector2,
}

impl StateMutation for MoveEntity {
    fn request_type(&self) -> RequestType {
        RequestType::MoveEntity
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.entity]
    }

    fn description(&self) -> String {
        format!(
            "移动 {} ({:.3}, {:.3})",
            self.entity,
            self.offset.x(),
            self.offset.y()
        )
    }

    fn can_transact_field(&self) -> bool {
        true
    }

    /// 分组会连同成员一起移动。
    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        let mut moved = vec![self.entity];
        if let Some(members) = live_entity(doc, self.entity)?.members() {
            moved.extend(members.iter().copied().filter(|id| doc.contains(*id)));
        }
        for id in &moved {
            states.transact(doc, *id, Some(EntityField::Geometry), TxnKind::Modification)?;
        }
        for id in moved {
            if let Some(entity) = doc.entity_mut(id) {
                entity.translate(self.offset);
                entity.dirty_position();
                entity.dirty_geometry();
            }
        }
        Ok(())
    }
}

pub type MoveEntityRequest = StateRequest<MoveEntity>;

#[derive(Debug)]
pub struct SetBackgroundRegions {
    pub sketch: EntityId,
    pub regions: Vec<Region>,
}

impl StateMutation for SetBackgroundRegions {
    fn request_type(&self) -> RequestType {
        RequestType::SetBackgroundRegions
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.sketch]
    }

    fn description(&self) -> String {
        format!("设置草图 {} 背景区域 ({} 个)", self.sketch, self.regions.len())
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        sketch_of(doc, self.sketch)?;
        states.transact(doc, self.sketch, Some(EntityField::Geometry), TxnKind::Modification)?;
        if let Some(entity) = doc.entity_mut(self.sketch) {
            if let Some(sketch) = entity.sketch_mut() {
                sketch.background_mut().set_regions(self.regions.clone());
            }
            entity.dirty_geometry();
        }
        Ok(())
    }
}

pub type SetBackgroundRegionsRequest = StateRequest<SetBackgroundRegions>;

#[derive(Debug)]
pub struct AddGuideline {
    pub sketch: EntityId,
    pub guideline: Guideline,
}

impl StateMutation for AddGuideline {
    fn request_type(&self) -> RequestType {
        RequestType::AddGuideline
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.sketch]
    }

    fn description(&self) -> String {
        format!("草图 {} 添加辅助线 {}", self.sketch, self.guideline.id())
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        sketch_of(doc, self.sketch)?;
        states.transact(doc, self.sketch, Some(EntityField::Geometry), TxnKind::Modification)?;
        if let Some(entity) = doc.entity_mut(self.sketch) {
            if let Some(sketch) = entity.sketch_mut() {
                sketch.add_guideline(self.guideline.clone());
            }
            entity.dirty_geometry();
        }
        Ok(())
    }
}

pub type AddGuidelineRequest = StateRequest<AddGuideline>;

#[derive(Debug)]
pub struct ChangeGuidelineType {
    pub sketch: EntityId,
    pub guideline: SketchId,
    pub kind: GuidelineKind,
}

impl StateMutation for ChangeGuidelineType {
    fn request_type(&self) -> RequestType {
        RequestType::ChangeGuidelineType
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.sketch]
    }

    fn description(&self) -> String {
        format!("辅助线 {} 类型改为 {:?}", self.guideline, self.kind)
    }

    fn can_transact_field(&self) -> bool {
        true
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        sketch_of(doc, self.sketch)?;
        let exists = live_entity(doc, self.sketch)?
            .sketch()
            .is_some_and(|sketch| sketch.guideline(self.guideline).is_some());
        if !exists {
            return Err(SketchError::GuidelineNotFound(self.guideline).into());
        }
        states.transact(doc, self.sketch, Some(EntityField::Geometry), TxnKind::Modification)?;
        if let Some(entity) = doc.entity_mut(self.sketch) {
            if let Some(guideline) = entity
                .sketch_mut()
                .and_then(|sketch| sketch.guideline_mut(self.guideline))
            {
                guideline.change_kind(self.kind);
            }
            entity.dirty_geometry();
        }
        Ok(())
    }
}

pub type ChangeGuidelineTypeRequest = StateRequest<ChangeGuidelineType>;

/// 删除：打上 `removed` 标记，实体保留在文档中直到 `purge_removed`。
#[derive(Debug)]
pub struct DeleteEntity {
    pub entity: EntityId,
}

impl StateMutation for DeleteEntity {
    fn request_type(&self) -> RequestType {
        RequestType::DeleteEntity
    }

    fn targets(&self) -> Vec<EntityId> {
        vec![self.entity]
    }

    fn description(&self) -> String {
        format!("删除 {}", self.entity)
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        states.transact(doc, self.entity, None, TxnKind::Recycling)?;
        if let Some(entity) = doc.entity_mut(self.entity) {
            entity.flags.insert(EntityFlags::REMOVED);
            entity.dirty_geometry();
        }
        Ok(())
    }
}

pub type DeleteEntityRequest = StateRequest<DeleteEntity>;

/// 沿宿主墙体创建线条。
#[derive(Debug)]
pub struct AddMolding {
    pub host: EntityId,
    pub profile: String,
    pub path: Vec<Point2>,
    pub material: Material,
    created: Option<EntityId>,
}

impl AddMolding {
    pub fn new(host: EntityId, profile: String, path: Vec<Point2>, material: Material) -> Self {
        Self {
            host,
            profile,
            path,
            material,
            created: None,
        }
    }

    #[inline]
    pub fn created(&self) -> Option<EntityId> {
        self.created
    }
}

impl StateMutation for AddMolding {
    fn request_type(&self) -> RequestType {
        RequestType::AddMolding
    }

    fn targets(&self) -> Vec<EntityId> {
        self.created.into_iter().chain([self.host]).collect()
    }

    fn description(&self) -> String {
        format!("在 {} 上添加线条 {}", self.host, self.profile)
    }

    fn apply(&mut self, states: &mut TxnStates, doc: &mut Document) -> Result<(), TransactionError> {
        match live_entity(doc, self.host)?.kind {
            EntityKind::Wall(_) => {}
            _ => {
                return Err(TransactionError::WrongKind {
                    entity: self.host,
                    expected: "wall",
                });
            }
        }
        let id = doc.add_molding(
            self.host,
            self.profile.clone(),
            self.path.clone(),
            self.material.clone(),
        );
        if let Some(entity) = doc.entity_mut(id) {
            entity.dirty_geometry();
        }
        states.transact(doc, id, None, TxnKind::Creation)?;
        self.created = Some(id);
        Ok(())
    }
}

pub type AddMoldingRequest = StateRequest<AddMolding>;

#[cfg(test)]
mod tests {
    use super::*;
    use roomcad_core::document::DocumentEvent;
    use roomcad_core::geometry::Curve2d;
    use roomcad_core::sketch::{Background, IdRegistry, Sketch2d};

    fn wall(doc: &mut Document) -> EntityId {
        doc.add_wall(
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            0.2,
            2.8,
            Material::new("paint", 0xffffff),
        )
    }

    #[test]
    fn state_machine_rejects_out_of_order_calls() {
        assert_eq!(
            RequestState::Created.transition(RequestAction::Commit).expect("commit"),
            RequestState::Committed
        );
        assert!(RequestState::Created.transition(RequestAction::Undo).is_err());
        assert!(RequestState::Committed.transition(RequestAction::Redo).is_err());
        assert!(RequestState::Undone.transition(RequestAction::Undo).is_err());
        assert_eq!(
            RequestState::Redone.transition(RequestAction::Undo).expect("undo"),
            RequestState::Undone
        );
    }

    #[test]
    fn edit_material_round_trip_is_exact() {
        let mut doc = Document::new();
        let id = wall(&mut doc);
        let tiles = Material::new("tile-grey", 0x808080)
            .with_tile_size(0.6, 0.6)
            .with_rotation(0.25);
        let mut request = EditMaterialRequest::new(id, tiles.clone());

        request.on_commit(&mut doc).expect("commit");
        let committed = doc.entity(id).and_then(Entity::material).cloned();
        assert_eq!(committed.as_ref(), Some(&tiles));

        request.on_undo(&mut doc).expect("undo");
        assert_eq!(
            doc.entity(id).and_then(Entity::material).map(|m| m.seek_id.as_str()),
            Some("paint")
        );
        request.on_redo(&mut doc).expect("redo");
        assert_eq!(doc.entity(id).and_then(Entity::material).cloned(), committed);
        assert_eq!(request.state(), RequestState::Redone);
        assert!(doc.take_dirty(id).expect("wall").material);
    }

    #[test]
    fn commit_twice_is_rejected() {
        let mut doc = Document::new();
        let id = wall(&mut doc);
        let mut request = EditMaterialRequest::new(id, Material::default());
        request.on_commit(&mut doc).expect("commit");
        let err = request.on_commit(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidTransition {
                from: RequestState::Committed,
                action: RequestAction::Commit
            }
        ));
    }

    #[test]
    fn failed_precondition_leaves_request_uncommitted() {
        let mut doc = Document::new();
        let id = wall(&mut doc);
        let mut request = FlipContentRequest::new(FlipContent { entity: id });
        assert!(matches!(
            request.on_commit(&mut doc),
            Err(TransactionError::WrongKind { .. })
        ));
        assert_eq!(request.state(), RequestState::Created);
        assert!(doc.take_dirty(id).expect("wall").is_clean());
    }

    #[test]
    fn delete_sets_removed_flag_and_undo_clears_it() {
        let mut doc = Document::new();
        let id = wall(&mut doc);
        let mut request = DeleteEntityRequest::new(DeleteEntity { entity: id });

        request.on_commit(&mut doc).expect("commit");
        assert!(doc.entity(id).expect("still present").is_removed());
        request.on_undo(&mut doc).expect("undo");
        assert!(!doc.entity(id).expect("present").flags.contains(EntityFlags::REMOVED));
        assert_eq!(doc.drain_events(), vec![DocumentEvent::Changed(id)]);
        request.on_redo(&mut doc).expect("redo");
        assert!(doc.entity(id).expect("present").is_removed());
    }

    #[test]
    fn add_molding_creates_and_undo_removes() {
        let mut doc = Document::new();
        let host = wall(&mut doc);
        let mut request = AddMoldingRequest::new(AddMolding::new(
            host,
            "baseboard".to_string(),
            vec![Point2::new(0.0, 0.0), Point2::new(5.0, 0.0)],
            Material::default(),
        ));
        request.on_commit(&mut doc).expect("commit");
        let created = request.mutation().created().expect("created id");
        assert!(doc.contains(created));

        request.on_undo(&mut doc).expect("undo");
        assert!(!doc.contains(created));
        request.on_redo(&mut doc).expect("redo");
        assert!(matches!(
            doc.entity(created).map(|entity| &entity.kind),
            Some(EntityKind::Molding(_))
        ));
    }

    #[test]
    fn guideline_kind_change_round_trip() {
        let mut ids = IdRegistry::new();
        let background = Background::create(&mut ids, Vec::new());
        let mut sketch = Sketch2d::create(&mut ids, background);
        let guideline = Guideline::create(
            &mut ids,
            Curve2d::line(Point2::new(0.0, 0.0), Point2::new(0.0, 3.0)),
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 3.0),
            GuidelineKind::Vertical,
        );
        let line_id = sketch.add_guideline(guideline);
        let mut doc = Document::new();
        let id = doc.add_sketch(sketch);

        let mut request = ChangeGuidelineTypeRequest::new(ChangeGuidelineType {
            sketch: id,
            guideline: line_id,
            kind: GuidelineKind::Free,
        });
        request.on_commit(&mut doc).expect("commit");
        let kind_now = |doc: &Document| {
            doc.entity(id)
                .and_then(Entity::sketch)
                .and_then(|sketch| sketch.guideline(line_id))
                .map(Guideline::kind)
        };
        assert_eq!(kind_now(&doc), Some(GuidelineKind::Free));
        request.on_undo(&mut doc).expect("undo");
        assert_eq!(kind_now(&doc), Some(GuidelineKind::Vertical));
    }

    #[test]
    fn undo_of_stale_target_is_silent() {
        let mut doc = Document::new();
        let id = wall(&mut doc);
        let mut request = MoveEntityRequest::new(MoveEntity {
            entity: id,
            offset: Vector2::new(1.0, 0.0),
        });
        request.on_commit(&mut doc).expect("commit");
        doc.remove_entity(id);
        doc.drain_events();

        request.on_undo(&mut doc).expect("undo");
        assert_eq!(request.state(), RequestState::Undone);
        assert!(doc.drain_events().is_empty());
    }
}
