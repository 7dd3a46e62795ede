use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use roomcad_config::HistoryConfig;
use roomcad_core::document::{Document, Entity, EntityId, EntityKind, Material};
use roomcad_core::geometry::{Curve2d, Point2, Vector2};
use roomcad_core::sketch::{Guideline, GuidelineKind, IdRegistry, Region, SketchId};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::errors::{EngineError, TransactionError};
use crate::request::Request;
use crate::transaction::{RequestArg, RequestType, TransactionManager};

/// 前置条件不满足时的取消原因。取消不会留下任何修改。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancelReason {
    #[error("实体 {0} 不存在")]
    EntityNotFound(EntityId),
    #[error("实体 {0} 已被删除")]
    EntityRemoved(EntityId),
    #[error("实体 {0} 已锁定")]
    EntityLocked(EntityId),
    #[error("实体 {entity} 不是{expected}")]
    WrongKind {
        entity: EntityId,
        expected: &'static str,
    },
    #[error("实体 {member} 已在分组 {group} 中")]
    AlreadyInGroup { member: EntityId, group: EntityId },
    #[error("实体 {entity} 所属分组 {group} 不存在")]
    MissingGroup { entity: EntityId, group: EntityId },
    #[error("辅助线 {0} 不存在")]
    GuidelineNotFound(SketchId),
    #[error("线条路径至少需要两个点")]
    PathTooShort,
    #[error("没有需要修改的内容")]
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    Cancelled(CancelReason),
}

/// 日志分组，只用于审计输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCategory {
    Content,
    Group,
    Sketch,
    Document,
}

impl fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandCategory::Content => "content",
            CommandCategory::Group => "group",
            CommandCategory::Sketch => "sketch",
            CommandCategory::Document => "document",
        };
        f.write_str(name)
    }
}

pub struct CommandContext<'a> {
    pub document: &'a mut Document,
    pub transactions: &'a mut TransactionManager,
    pub ids: &'a mut IdRegistry,
}

impl CommandContext<'_> {
    /// 创建并提交一个请求，请求进入事务管理器的暂存区。
    pub fn commit(
        &mut self,
        request: RequestType,
        args: Vec<RequestArg>,
    ) -> Result<(), TransactionError> {
        let request = self.transactions.create_request(request, args)?;
        self.transactions.commit(request, self.document)
    }
}

/// 用户操作。`execute` 要么提交请求并返回 `Completed`，要么在修改前返回 `Cancelled`。
pub trait Command: fmt::Debug {
    fn name(&self) -> &'static str;

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError>;

    /// 请求撤销之后调用。
    fn on_undo(&mut self, _document: &mut Document) {}

    /// 请求重做之后调用。
    fn on_redo(&mut self, _document: &mut Document) {}

    fn can_undo_redo(&self) -> bool {
        true
    }

    fn description(&self) -> String;

    fn category(&self) -> CommandCategory;
}

/// 撤销栈中的一条记录。
#[derive(Debug)]
pub struct HistoryEntry {
    name: &'static str,
    description: String,
    category: CommandCategory,
    commands: Vec<Box<dyn Command>>,
    requests: Vec<Box<dyn Request>>,
    batched: bool,
}

impl HistoryEntry {
    fn new(command: Box<dyn Command>, requests: Vec<Box<dyn Request>>) -> Self {
        Self {
            name: command.name(),
            description: command.description(),
            category: command.category(),
            commands: vec![command],
            requests,
            batched: false,
        }
    }

    fn batch(name: &'static str) -> Self {
        Self {
            name,
            description: format!("批量操作 {name}"),
            category: CommandCategory::Document,
            commands: Vec::new(),
            requests: Vec::new(),
            batched: true,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn category(&self) -> CommandCategory {
        self.category
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn targets(&self) -> BTreeSet<EntityId> {
        self.requests
            .iter()
            .flat_map(|request| request.targets())
            .collect()
    }

    /// 同名、同目标且全部为字段级编辑的相邻记录可以合并。
    fn can_merge(&self, next: &HistoryEntry) -> bool {
        !self.batched
            && !next.batched
            && self.name == next.name
            && self
                .requests
                .iter()
                .chain(next.requests.iter())
                .all(|request| request.can_transact_field())
            && self.targets() == next.targets()
    }

    fn absorb(&mut self, other: HistoryEntry) {
        self.commands.extend(other.commands);
        self.requests.extend(other.requests);
    }

    /// 逆序撤销全部请求。中途失败时把已撤销的请求重新应用，文档回到撤销前。
    fn undo(&mut self, document: &mut Document) -> Result<(), TransactionError> {
        let events = document.event_count();
        let total = self.requests.len();
        for index in (0..total).rev() {
            if let Err(err) = self.requests[index].on_undo(document) {
                for request in &mut self.requests[index + 1..] {
                    if let Err(err) = request.on_redo(document) {
                        warn!(request = %request.request_type(), error = %err, "恢复撤销前状态失败");
                    }
                }
                document.truncate_events(events);
                return Err(err);
            }
        }
        for command in self.commands.iter_mut().rev() {
            command.on_undo(document);
        }
        Ok(())
    }

    /// 顺序重做全部请求。中途失败时撤回已重做的请求，文档回到重做前。
    fn redo(&mut self, document: &mut Document) -> Result<(), TransactionError> {
        let events = document.event_count();
        for index in 0..self.requests.len() {
            if let Err(err) = self.requests[index].on_redo(document) {
                for request in self.requests[..index].iter_mut().rev() {
                    if let Err(err) = request.on_undo(document) {
                        warn!(request = %request.request_type(), error = %err, "恢复重做前状态失败");
                    }
                }
                document.truncate_events(events);
                return Err(err);
            }
        }
        for command in self.commands.iter_mut() {
            command.on_redo(document);
        }
        Ok(())
    }
}

/// 线性撤销/重做历史。撤销按后进先出，重做按撤销的逆序重放。
#[derive(Debug)]
pub struct CommandManager {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_undo_steps: usize,
    merge_field_edits: bool,
    batch: Option<HistoryEntry>,
}

impl CommandManager {
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_undo_steps: config.max_undo_steps.max(1),
            merge_field_edits: config.merge_field_edits,
            batch: None,
        }
    }

    pub fn execute(
        &mut self,
        mut command: Box<dyn Command>,
        context: &mut CommandContext<'_>,
    ) -> Result<CommandOutcome, EngineError> {
        let name = command.name();
        let outcome = match command.execute(context) {
            Ok(outcome) => outcome,
            Err(err) => {
                context.transactions.rollback_pending(context.document);
                warn!(command = name, error = %err, "命令执行失败，已回滚");
                return Err(err);
            }
        };

        match &outcome {
            CommandOutcome::Cancelled(reason) => {
                context.transactions.rollback_pending(context.document);
                info!(command = name, reason = %reason, "命令已取消");
            }
            CommandOutcome::Completed => {
                let requests = context.transactions.take_pending();
                info!(
                    command = name,
                    category = %command.category(),
                    description = %command.description(),
                    requests = requests.len(),
                    "命令已完成"
                );
                if !command.can_undo_redo() {
                    debug!(command = name, "命令不可撤销，不写入历史");
                } else if !requests.is_empty() {
                    self.record(HistoryEntry::new(command, requests));
                }
            }
        }
        Ok(outcome)
    }

    fn record(&mut self, entry: HistoryEntry) {
        if let Some(batch) = self.batch.as_mut() {
            batch.absorb(entry);
            return;
        }
        self.push(entry);
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.redo_stack.clear();
        if self.merge_field_edits {
            if let Some(top) = self.undo_stack.back_mut() {
                if top.can_merge(&entry) {
                    debug!(command = entry.name, "合并相邻的字段编辑");
                    top.absorb(entry);
                    return;
                }
            }
        }
        self.undo_stack.push_back(entry);
        while self.undo_stack.len() > self.max_undo_steps {
            if let Some(dropped) = self.undo_stack.pop_front() {
                debug!(command = dropped.name, "历史超出上限，丢弃最早记录");
            }
        }
    }

    /// 撤销最近一条历史。批量操作未结束时拒绝；失败的记录留在原栈中。
    pub fn undo(&mut self, document: &mut Document) -> Result<Option<&'static str>, EngineError> {
        if self.batch.is_some() {
            return Err(EngineError::BatchOpen);
        }
        let Some(mut entry) = self.undo_stack.pop_back() else {
            return Ok(None);
        };
        if let Err(err) = entry.undo(document) {
            warn!(command = entry.name, error = %err, "撤销失败，保留历史记录");
            self.undo_stack.push_back(entry);
            return Err(err.into());
        }
        info!(command = entry.name, "撤销");
        let name = entry.name;
        self.redo_stack.push(entry);
        Ok(Some(name))
    }

    pub fn redo(&mut self, document: &mut Document) -> Result<Option<&'static str>, EngineError> {
        if self.batch.is_some() {
            return Err(EngineError::BatchOpen);
        }
        let Some(mut entry) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = entry.redo(document) {
            warn!(command = entry.name, error = %err, "重做失败，保留历史记录");
            self.redo_stack.push(entry);
            return Err(err.into());
        }
        info!(command = entry.name, "重做");
        let name = entry.name;
        self.undo_stack.push_back(entry);
        Ok(Some(name))
    }

    /// 开启批量操作：结束前完成的命令合并为一条历史。
    pub fn begin_batch(&mut self, name: &'static str) -> Result<(), EngineError> {
        if self.batch.is_some() {
            return Err(EngineError::BatchAlreadyOpen);
        }
        self.batch = Some(HistoryEntry::batch(name));
        Ok(())
    }

    /// 结束批量操作，返回是否写入了历史。
    pub fn end_batch(&mut self) -> Result<bool, EngineError> {
        let batch = self.batch.take().ok_or(EngineError::NoOpenBatch)?;
        if batch.requests.is_empty() {
            return Ok(false);
        }
        self.push(batch);
        Ok(true)
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    #[inline]
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    #[inline]
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// 从旧到新遍历撤销栈。
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.undo_stack.iter()
    }
}

/// 解析命令目标：必须存在且未被删除。
fn live(document: &Document, id: EntityId) -> Result<&Entity, CancelReason> {
    let entity = document
        .entity(id)
        .ok_or(CancelReason::EntityNotFound(id))?;
    if entity.is_removed() {
        return Err(CancelReason::EntityRemoved(id));
    }
    Ok(entity)
}

fn editable(document: &Document, id: EntityId) -> Result<&Entity, CancelReason> {
    let entity = live(document, id)?;
    if entity.flags.is_locked() {
        return Err(CancelReason::EntityLocked(id));
    }
    Ok(entity)
}

fn live_sketch(document: &Document, id: EntityId) -> Result<&Entity, CancelReason> {
    let entity = live(document, id)?;
    if entity.sketch().is_none() {
        return Err(CancelReason::WrongKind {
            entity: id,
            expected: "草图",
        });
    }
    Ok(entity)
}

/// 前置条件通过后提交请求，否则返回取消结果。
fn commit_checked(
    context: &mut CommandContext<'_>,
    check: Result<(), CancelReason>,
    request: RequestType,
    args: Vec<RequestArg>,
) -> Result<CommandOutcome, EngineError> {
    if let Err(reason) = check {
        return Ok(CommandOutcome::Cancelled(reason));
    }
    context.commit(request, args)?;
    Ok(CommandOutcome::Completed)
}

#[derive(Debug)]
pub struct CmdEditMaterial {
    entity: EntityId,
    material: Material,
}

impl CmdEditMaterial {
    pub fn new(entity: EntityId, material: Material) -> Self {
        Self { entity, material }
    }

    fn check(&self, document: &Document) -> Result<(), CancelReason> {
        let current = editable(document, self.entity)?
            .material()
            .ok_or(CancelReason::WrongKind {
                entity: self.entity,
                expected: "带材质的实体",
            })?;
        if *current == self.material {
            return Err(CancelReason::NothingToDo);
        }
        Ok(())
    }
}

impl Command for CmdEditMaterial {
    fn name(&self) -> &'static str {
        "edit_material"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = self.check(context.document);
        commit_checked(
            context,
            check,
            RequestType::EditMaterial,
            vec![
                RequestArg::Entity(self.entity),
                RequestArg::Material(self.material.clone()),
            ],
        )
    }

    fn description(&self) -> String {
        format!("编辑 {} 的材质为 {}", self.entity, self.material.seek_id)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Content
    }
}

#[derive(Debug)]
pub struct CmdFlipContent {
    entity: EntityId,
}

impl CmdFlipContent {
    pub fn new(entity: EntityId) -> Self {
        Self { entity }
    }

    fn check(&self, document: &Document) -> Result<(), CancelReason> {
        let entity = editable(document, self.entity)?;
        if entity.flipped().is_none() {
            return Err(CancelReason::WrongKind {
                entity: self.entity,
                expected: "可翻转的内容",
            });
        }
        if let Some(group) = entity.group {
            if !document.contains(group) {
                return Err(CancelReason::MissingGroup {
                    entity: self.entity,
                    group,
                });
            }
        }
        Ok(())
    }
}

impl Command for CmdFlipContent {
    fn name(&self) -> &'static str {
        "flip_content"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = self.check(context.document);
        commit_checked(
            context,
            check,
            RequestType::FlipContent,
            vec![RequestArg::Entity(self.entity)],
        )
    }

    fn description(&self) -> String {
        format!("翻转 {}", self.entity)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Content
    }
}

/// 把若干成员加入分组，每个成员一个请求；任一成员不合法则整体取消。
#[derive(Debug)]
pub struct CmdIncludeIntoGroup {
    group: EntityId,
    members: Vec<EntityId>,
}

impl CmdIncludeIntoGroup {
    pub fn new(group: EntityId, members: Vec<EntityId>) -> Self {
        Self { group, members }
    }

    fn check(&self, document: &Document) -> Result<(), CancelReason> {
        if live(document, self.group)?.members().is_none() {
            return Err(CancelReason::WrongKind {
                entity: self.group,
                expected: "分组",
            });
        }
        if self.members.is_empty() {
            return Err(CancelReason::NothingToDo);
        }
        for member in &self.members {
            if *member == self.group {
                return Err(CancelReason::WrongKind {
                    entity: *member,
                    expected: "可加入分组的实体",
                });
            }
            let entity = live(document, *member)?;
            if entity.group == Some(self.group) {
                return Err(CancelReason::AlreadyInGroup {
                    member: *member,
                    group: self.group,
                });
            }
        }
        Ok(())
    }
}

impl Command for CmdIncludeIntoGroup {
    fn name(&self) -> &'static str {
        "include_into_group"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        if let Err(reason) = self.check(context.document) {
            return Ok(CommandOutcome::Cancelled(reason));
        }
        for member in &self.members {
            context.commit(
                RequestType::IncludeIntoGroup,
                vec![RequestArg::Entity(self.group), RequestArg::Entity(*member)],
            )?;
        }
        Ok(CommandOutcome::Completed)
    }

    fn description(&self) -> String {
        format!("将 {} 个实体加入分组 {}", self.members.len(), self.group)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Group
    }
}

#[derive(Debug)]
pub struct CmdMoveEntity {
    entity: EntityId,
    offset: Vector2,
}

impl CmdMoveEntity {
    pub fn new(entity: EntityId, offset: Vector2) -> Self {
        Self { entity, offset }
    }
}

impl Command for CmdMoveEntity {
    fn name(&self) -> &'static str {
        "move_entity"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = editable(context.document, self.entity).and_then(|_| {
            if self.offset.length_squared() == 0.0 {
                Err(CancelReason::NothingToDo)
            } else {
                Ok(())
            }
        });
        commit_checked(
            context,
            check,
            RequestType::MoveEntity,
            vec![
                RequestArg::Entity(self.entity),
                RequestArg::Offset(self.offset),
            ],
        )
    }

    fn description(&self) -> String {
        format!(
            "移动 {} ({:.3}, {:.3})",
            self.entity,
            self.offset.x(),
            self.offset.y()
        )
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Content
    }
}

#[derive(Debug)]
pub struct CmdSetBackgroundRegions {
    sketch: EntityId,
    regions: Vec<Region>,
}

impl CmdSetBackgroundRegions {
    pub fn new(sketch: EntityId, regions: Vec<Region>) -> Self {
        Self { sketch, regions }
    }
}

impl Command for CmdSetBackgroundRegions {
    fn name(&self) -> &'static str {
        "set_background_regions"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = live_sketch(context.document, self.sketch).map(|_| ());
        commit_checked(
            context,
            check,
            RequestType::SetBackgroundRegions,
            vec![
                RequestArg::Entity(self.sketch),
                RequestArg::Regions(self.regions.clone()),
            ],
        )
    }

    fn description(&self) -> String {
        format!("重设草图 {} 的背景 ({} 个区域)", self.sketch, self.regions.len())
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Sketch
    }
}

/// 在草图上添加参考线，参考线 id 在执行时由注册表分配。
#[derive(Debug)]
pub struct CmdAddGuideline {
    sketch: EntityId,
    curve: Curve2d,
    from_anchor: Point2,
    end_anchor: Point2,
    kind: GuidelineKind,
    created: Option<SketchId>,
}

impl CmdAddGuideline {
    pub fn new(
        sketch: EntityId,
        curve: Curve2d,
        from_anchor: Point2,
        end_anchor: Point2,
        kind: GuidelineKind,
    ) -> Self {
        Self {
            sketch,
            curve,
            from_anchor,
            end_anchor,
            kind,
            created: None,
        }
    }
}

impl Command for CmdAddGuideline {
    fn name(&self) -> &'static str {
        "add_guideline"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        if let Err(reason) = live_sketch(context.document, self.sketch) {
            return Ok(CommandOutcome::Cancelled(reason));
        }
        let guideline = Guideline::create(
            context.ids,
            self.curve.clone(),
            self.from_anchor,
            self.end_anchor,
            self.kind,
        );
        let id = guideline.id();
        context.commit(
            RequestType::AddGuideline,
            vec![
                RequestArg::Entity(self.sketch),
                RequestArg::Guideline(guideline),
            ],
        )?;
        self.created = Some(id);
        Ok(CommandOutcome::Completed)
    }

    fn on_undo(&mut self, _document: &mut Document) {
        if let Some(id) = self.created {
            debug!(sketch = self.sketch.get(), guideline = id.get(), "参考线已撤销");
        }
    }

    fn description(&self) -> String {
        format!("在草图 {} 上添加 {:?} 参考线", self.sketch, self.kind)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Sketch
    }
}

#[derive(Debug)]
pub struct CmdChangeGuidelineType {
    sketch: EntityId,
    guideline: SketchId,
    kind: GuidelineKind,
}

impl CmdChangeGuidelineType {
    pub fn new(sketch: EntityId, guideline: SketchId, kind: GuidelineKind) -> Self {
        Self {
            sketch,
            guideline,
            kind,
        }
    }

    fn check(&self, document: &Document) -> Result<(), CancelReason> {
        let current = live_sketch(document, self.sketch)?
            .sketch()
            .and_then(|sketch| sketch.guideline(self.guideline))
            .map(Guideline::kind)
            .ok_or(CancelReason::GuidelineNotFound(self.guideline))?;
        if current == self.kind {
            return Err(CancelReason::NothingToDo);
        }
        Ok(())
    }
}

impl Command for CmdChangeGuidelineType {
    fn name(&self) -> &'static str {
        "change_guideline_type"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = self.check(context.document);
        commit_checked(
            context,
            check,
            RequestType::ChangeGuidelineType,
            vec![
                RequestArg::Entity(self.sketch),
                RequestArg::SketchItem(self.guideline),
                RequestArg::GuidelineKind(self.kind),
            ],
        )
    }

    fn description(&self) -> String {
        format!("参考线 {} 改为 {:?}", self.guideline, self.kind)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Sketch
    }
}

#[derive(Debug)]
pub struct CmdDelete {
    entity: EntityId,
}

impl CmdDelete {
    pub fn new(entity: EntityId) -> Self {
        Self { entity }
    }
}

impl Command for CmdDelete {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = editable(context.document, self.entity).map(|_| ());
        commit_checked(
            context,
            check,
            RequestType::DeleteEntity,
            vec![RequestArg::Entity(self.entity)],
        )
    }

    fn description(&self) -> String {
        format!("删除 {}", self.entity)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Document
    }
}

#[derive(Debug)]
pub struct CmdAddMolding {
    host: EntityId,
    profile: String,
    path: Vec<Point2>,
    material: Material,
}

impl CmdAddMolding {
    pub fn new(
        host: EntityId,
        profile: impl Into<String>,
        path: Vec<Point2>,
        material: Material,
    ) -> Self {
        Self {
            host,
            profile: profile.into(),
            path,
            material,
        }
    }

    fn check(&self, document: &Document) -> Result<(), CancelReason> {
        match live(document, self.host)?.kind {
            EntityKind::Wall(_) => {}
            _ => {
                return Err(CancelReason::WrongKind {
                    entity: self.host,
                    expected: "墙体",
                });
            }
        }
        if self.path.len() < 2 {
            return Err(CancelReason::PathTooShort);
        }
        Ok(())
    }
}

impl Command for CmdAddMolding {
    fn name(&self) -> &'static str {
        "add_molding"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let check = self.check(context.document);
        commit_checked(
            context,
            check,
            RequestType::AddMolding,
            vec![
                RequestArg::Entity(self.host),
                RequestArg::Text(self.profile.clone()),
                RequestArg::Points(self.path.clone()),
                RequestArg::Material(self.material.clone()),
            ],
        )
    }

    fn description(&self) -> String {
        format!("在墙体 {} 上添加线条 {}", self.host, self.profile)
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Content
    }
}

/// 物理清除带删除标记的实体。不可撤销；引用这些实体的历史在撤销时静默跳过。
#[derive(Debug, Default)]
pub struct CmdPurgeRemoved {
    purged: Vec<EntityId>,
}

impl CmdPurgeRemoved {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Command for CmdPurgeRemoved {
    fn name(&self) -> &'static str {
        "purge_removed"
    }

    fn execute(&mut self, context: &mut CommandContext<'_>) -> Result<CommandOutcome, EngineError> {
        let any_removed = context
            .document
            .entities()
            .any(|(_, entity)| entity.is_removed());
        if !any_removed {
            return Ok(CommandOutcome::Cancelled(CancelReason::NothingToDo));
        }
        self.purged = context.document.purge_removed();
        Ok(CommandOutcome::Completed)
    }

    fn can_undo_redo(&self) -> bool {
        false
    }

    fn description(&self) -> String {
        format!("清除 {} 个已删除实体", self.purged.len())
    }

    fn category(&self) -> CommandCategory {
        CommandCategory::Document
    }
}
