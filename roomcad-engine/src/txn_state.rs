//! 实体事务状态：在修改前记录实体字段，撤销/重做时按 id 在当前文档中重新解析并恢复。
//!
//! 状态对象从不持有实体引用；实体可能在中间的撤销中被删除又重建，
//! 因此每次恢复都通过 `Document::entity_mut` 重新查找，找不到时静默跳过。

use std::collections::BTreeMap;
use std::fmt;

use roomcad_core::document::{Document, Entity, EntityFlags, EntityId, EntityKind, Material};
use tracing::debug;

use crate::errors::TransactionError;

/// 事务对实体生命周期的影响。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    Creation,
    Modification,
    /// 从文档中物理移除。
    Deletion,
    /// 打上 `removed` 标记，实体仍留在文档中。
    Recycling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPhase {
    Default,
    Undo,
    Redo,
}

/// 可按字段粒度记录的实体字段。`Geometry` 覆盖形状、位置与草图内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityField {
    Material,
    Flipped,
    Flags,
    Group,
    Members,
    Geometry,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Material(Material),
    Flipped(bool),
    Flags(EntityFlags),
    Group(Option<EntityId>),
    Members(Vec<EntityId>),
    Geometry(EntityKind),
}

impl EntityField {
    /// 读取字段当前值；实体没有该字段时返回 `None`。
    pub fn read(self, entity: &Entity) -> Option<FieldValue> {
        match self {
            EntityField::Material => entity.material().cloned().map(FieldValue::Material),
            EntityField::Flipped => entity.flipped().map(FieldValue::Flipped),
            EntityField::Flags => Some(FieldValue::Flags(entity.flags)),
            EntityField::Group => Some(FieldValue::Group(entity.group)),
            EntityField::Members => entity
                .members()
                .map(|members| FieldValue::Members(members.to_vec())),
            EntityField::Geometry => Some(FieldValue::Geometry(entity.kind.clone())),
        }
    }
}

impl FieldValue {
    /// 写回字段并标记对应的待重算项。
    pub fn apply(&self, entity: &mut Entity) {
        match self {
            FieldValue::Material(material) => {
                if let Some(slot) = entity.material_mut() {
                    *slot = material.clone();
                    entity.dirty_material();
                }
            }
            FieldValue::Flipped(flipped) => {
                if entity.set_flipped(*flipped) {
                    entity.dirty_geometry();
                }
            }
            FieldValue::Flags(flags) => {
                entity.flags = *flags;
                entity.dirty_geometry();
            }
            FieldValue::Group(group) => {
                entity.group = *group;
            }
            FieldValue::Members(members) => {
                if let Some(slot) = entity.members_mut() {
                    *slot = members.clone();
                }
            }
            FieldValue::Geometry(kind) => {
                entity.kind = kind.clone();
                entity.dirty_geometry();
                entity.dirty_position();
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
enum Snapshot {
    #[default]
    Empty,
    Fields(BTreeMap<EntityField, FieldValue>),
    Dump(Box<Entity>),
}

/// 单个实体在一次事务中的前后快照。
#[derive(Debug, Clone)]
pub struct EntityTxnState {
    id: EntityId,
    kind: TxnKind,
    phase: TxnPhase,
    before: Snapshot,
    after: Snapshot,
}

impl EntityTxnState {
    /// 为实体建立事务状态。删除与回收在此时整体转储实体。
    pub fn capture(doc: &Document, id: EntityId, kind: TxnKind) -> Result<Self, TransactionError> {
        let before = match kind {
            TxnKind::Creation => Snapshot::Empty,
            TxnKind::Deletion | TxnKind::Recycling => {
                let entity = doc.entity(id).ok_or(TransactionError::EntityNotFound(id))?;
                Snapshot::Dump(Box::new(entity.clone()))
            }
            TxnKind::Modification => {
                if !doc.contains(id) {
                    return Err(TransactionError::EntityNotFound(id));
                }
                Snapshot::Empty
            }
        };
        Ok(Self {
            id,
            kind,
            phase: TxnPhase::Default,
            before,
            after: Snapshot::Empty,
        })
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> TxnKind {
        self.kind
    }

    #[inline]
    pub fn phase(&self) -> TxnPhase {
        self.phase
    }

    /// 记录字段修改前的值，同一字段只记录第一次。
    ///
    /// `field` 为 `None` 或不允许字段级记录时转储整个实体；已转储后不再追加字段。
    pub fn transact(&mut self, doc: &Document, field: Option<EntityField>, field_level: bool) {
        if self.kind != TxnKind::Modification || matches!(self.before, Snapshot::Dump(_)) {
            return;
        }
        let Some(entity) = doc.entity(self.id) else {
            return;
        };
        let field = match field {
            Some(field) if field_level => field,
            _ => {
                self.before = Snapshot::Dump(Box::new(entity.clone()));
                return;
            }
        };
        if matches!(self.before, Snapshot::Empty) {
            self.before = Snapshot::Fields(BTreeMap::new());
        }
        if let Snapshot::Fields(fields) = &mut self.before {
            if !fields.contains_key(&field) {
                if let Some(value) = field.read(entity) {
                    fields.insert(field, value);
                }
            }
        }
    }

    /// 记录修改后的值，字段集合与修改前一致。
    pub fn commit(&mut self, doc: &Document) {
        let current = doc.entity(self.id);
        self.after = match (self.kind, &self.before, current) {
            (TxnKind::Deletion, _, _) | (_, _, None) => Snapshot::Empty,
            (TxnKind::Modification, Snapshot::Fields(fields), Some(entity)) => Snapshot::Fields(
                fields
                    .keys()
                    .filter_map(|field| field.read(entity).map(|value| (*field, value)))
                    .collect(),
            ),
            (_, _, Some(entity)) => Snapshot::Dump(Box::new(entity.clone())),
        };
    }

    /// 按阶段恢复快照，返回是否有实体被改动。同一阶段重复调用不做任何事。
    pub fn restore(&mut self, doc: &mut Document, phase: TxnPhase) -> bool {
        if self.phase == phase {
            return false;
        }
        self.phase = phase;

        match (self.kind, phase) {
            (_, TxnPhase::Default) => false,
            (TxnKind::Creation, TxnPhase::Undo) | (TxnKind::Deletion, TxnPhase::Redo) => {
                doc.remove_entity(self.id).is_some()
            }
            (TxnKind::Creation, TxnPhase::Redo) => reinsert(doc, self.id, &self.after),
            (TxnKind::Deletion, TxnPhase::Undo) => reinsert(doc, self.id, &self.before),
            (_, phase) => {
                let snapshot = if phase == TxnPhase::Undo {
                    &self.before
                } else {
                    &self.after
                };
                let Some(entity) = doc.entity_mut(self.id) else {
                    debug!(entity = self.id.get(), ?phase, "实体已不在文档中，跳过恢复");
                    return false;
                };
                match snapshot {
                    Snapshot::Empty => false,
                    Snapshot::Fields(fields) => {
                        for value in fields.values() {
                            value.apply(entity);
                        }
                        true
                    }
                    Snapshot::Dump(dump) => {
                        *entity = dump.as_ref().clone();
                        entity.dirty_geometry();
                        entity.dirty_material();
                        true
                    }
                }
            }
        }
    }

    /// 恢复后的通知：实体仍能解析时标记几何与位置待重算，并发出变更信号。
    pub fn post_restore(&self, doc: &mut Document) -> bool {
        let Some(entity) = doc.entity_mut(self.id) else {
            return false;
        };
        entity.dirty_geometry();
        entity.dirty_position();
        doc.notify_changed(self.id);
        true
    }
}

fn reinsert(doc: &mut Document, id: EntityId, snapshot: &Snapshot) -> bool {
    match snapshot {
        Snapshot::Dump(dump) => {
            let mut entity = dump.as_ref().clone();
            entity.dirty_geometry();
            doc.insert_with_id(id, entity);
            true
        }
        _ => false,
    }
}

/// 事务请求持有的实体状态接口，按实体类型由 [`create_txn_state`] 选择实现。
pub trait TxnState: fmt::Debug {
    fn entity_id(&self) -> EntityId;
    fn kind(&self) -> TxnKind;
    fn transact(&mut self, doc: &Document, field: Option<EntityField>, field_level: bool);
    fn commit(&mut self, doc: &Document);
    fn restore(&mut self, doc: &mut Document, phase: TxnPhase) -> bool;
    fn post_restore(&self, doc: &mut Document) -> bool;
}

impl TxnState for EntityTxnState {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn kind(&self) -> TxnKind {
        self.kind
    }

    fn transact(&mut self, doc: &Document, field: Option<EntityField>, field_level: bool) {
        EntityTxnState::transact(self, doc, field, field_level);
    }

    fn commit(&mut self, doc: &Document) {
        EntityTxnState::commit(self, doc);
    }

    fn restore(&mut self, doc: &mut Document, phase: TxnPhase) -> bool {
        EntityTxnState::restore(self, doc, phase)
    }

    fn post_restore(&self, doc: &mut Document) -> bool {
        EntityTxnState::post_restore(self, doc)
    }
}

/// 自定义模型：恢复后材质贴图也需要刷新。
#[derive(Debug, Clone)]
pub struct CustomizedModelTxnState {
    inner: EntityTxnState,
}

impl TxnState for CustomizedModelTxnState {
    fn entity_id(&self) -> EntityId {
        self.inner.id
    }

    fn kind(&self) -> TxnKind {
        self.inner.kind
    }

    fn transact(&mut self, doc: &Document, field: Option<EntityField>, field_level: bool) {
        self.inner.transact(doc, field, field_level);
    }

    fn commit(&mut self, doc: &Document) {
        self.inner.commit(doc);
    }

    fn restore(&mut self, doc: &mut Document, phase: TxnPhase) -> bool {
        self.inner.restore(doc, phase)
    }

    fn post_restore(&self, doc: &mut Document) -> bool {
        if !self.inner.post_restore(doc) {
            return false;
        }
        if let Some(entity) = doc.entity_mut(self.inner.id) {
            entity.dirty_material();
        }
        true
    }
}

pub fn create_txn_state(
    doc: &Document,
    id: EntityId,
    kind: TxnKind,
) -> Result<Box<dyn TxnState>, TransactionError> {
    let inner = EntityTxnState::capture(doc, id, kind)?;
    let is_model = matches!(
        doc.entity(id).map(|entity| &entity.kind),
        Some(EntityKind::CustomizedModel(_))
    );
    if is_model {
        Ok(Box::new(CustomizedModelTxnState { inner }))
    } else {
        Ok(Box::new(inner))
    }
}
