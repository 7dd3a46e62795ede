//! 事务管理器：按类型标签创建请求、提交请求，并暂存已提交但尚未写入历史的请求。

use std::collections::HashMap;
use std::fmt;

use roomcad_core::document::{Document, EntityId, Material};
use roomcad_core::geometry::{Point2, Vector2};
use roomcad_core::sketch::{Guideline, GuidelineKind, Region, SketchId};
use tracing::{debug, info, warn};

use crate::errors::TransactionError;
use crate::request::{
    AddGuideline, AddGuidelineRequest, AddMolding, AddMoldingRequest, ChangeGuidelineType,
    ChangeGuidelineTypeRequest, DeleteEntity, DeleteEntityRequest, EditMaterialRequest,
    FlipContent, FlipContentRequest, IncludeIntoGroup, IncludeIntoGroupRequest, MoveEntity,
    MoveEntityRequest, Request, SetBackgroundRegions, SetBackgroundRegionsRequest,
};

/// 命令与请求工厂共享的请求类型标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    EditMaterial,
    FlipContent,
    IncludeIntoGroup,
    MoveEntity,
    SetBackgroundRegions,
    AddGuideline,
    ChangeGuidelineType,
    DeleteEntity,
    AddMolding,
}

impl RequestType {
    pub const ALL: [RequestType; 9] = [
        RequestType::EditMaterial,
        RequestType::FlipContent,
        RequestType::IncludeIntoGroup,
        RequestType::MoveEntity,
        RequestType::SetBackgroundRegions,
        RequestType::AddGuideline,
        RequestType::ChangeGuidelineType,
        RequestType::DeleteEntity,
        RequestType::AddMolding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestType::EditMaterial => "edit_material",
            RequestType::FlipContent => "flip_content",
            RequestType::IncludeIntoGroup => "include_into_group",
            RequestType::MoveEntity => "move_entity",
            RequestType::SetBackgroundRegions => "set_background_regions",
            RequestType::AddGuideline => "add_guideline",
            RequestType::ChangeGuidelineType => "change_guideline_type",
            RequestType::DeleteEntity => "delete_entity",
            RequestType::AddMolding => "add_molding",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求工厂的参数。
#[derive(Debug, Clone)]
pub enum RequestArg {
    Entity(EntityId),
    SketchItem(SketchId),
    Material(Material),
    Offset(Vector2),
    Regions(Vec<Region>),
    Guideline(Guideline),
    GuidelineKind(GuidelineKind),
    Text(String),
    Points(Vec<Point2>),
}

impl RequestArg {
    pub fn type_name(&self) -> &'static str {
        match self {
            RequestArg::Entity(_) => "entity",
            RequestArg::SketchItem(_) => "sketch item",
            RequestArg::Material(_) => "material",
            RequestArg::Offset(_) => "offset",
            RequestArg::Regions(_) => "regions",
            RequestArg::Guideline(_) => "guideline",
            RequestArg::GuidelineKind(_) => "guideline kind",
            RequestArg::Text(_) => "text",
            RequestArg::Points(_) => "points",
        }
    }
}

/// 按位置依次读取参数，类型不符或缺失时报告参数序号。
#[derive(Debug)]
pub struct ArgReader {
    request: RequestType,
    args: std::vec::IntoIter<RequestArg>,
    index: usize,
}

macro_rules! arg_accessor {
    ($name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $name(&mut self) -> Result<$ty, TransactionError> {
            match self.next()? {
                RequestArg::$variant(value) => Ok(value),
                other => Err(self.mismatch($expected, &other)),
            }
        }
    };
}

impl ArgReader {
    pub fn new(request: RequestType, args: Vec<RequestArg>) -> Self {
        Self {
            request,
            args: args.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self) -> Result<RequestArg, TransactionError> {
        let arg = self.args.next().ok_or(TransactionError::MissingArgument {
            request: self.request,
            index: self.index,
        })?;
        self.index += 1;
        Ok(arg)
    }

    fn mismatch(&self, expected: &'static str, found: &RequestArg) -> TransactionError {
        TransactionError::ArgumentMismatch {
            request: self.request,
            index: self.index - 1,
            expected,
            found: found.type_name(),
        }
    }

    arg_accessor!(entity, Entity, EntityId, "entity");
    arg_accessor!(sketch_item, SketchItem, SketchId, "sketch item");
    arg_accessor!(material, Material, Material, "material");
    arg_accessor!(offset, Offset, Vector2, "offset");
    arg_accessor!(regions, Regions, Vec<Region>, "regions");
    arg_accessor!(guideline, Guideline, Guideline, "guideline");
    arg_accessor!(guideline_kind, GuidelineKind, GuidelineKind, "guideline kind");
    arg_accessor!(text, Text, String, "text");
    arg_accessor!(points, Points, Vec<Point2>, "points");
}

pub type RequestFactory = fn(&mut ArgReader) -> Result<Box<dyn Request>, TransactionError>;

/// 请求类型到工厂函数的映射表。
pub struct RequestRegistry {
    factories: HashMap<RequestType, RequestFactory>,
}

impl RequestRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// 注册全部内置请求。
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(RequestType::EditMaterial, |args| {
            Ok(Box::new(EditMaterialRequest::new(args.entity()?, args.material()?)))
        });
        registry.register(RequestType::FlipContent, |args| {
            Ok(Box::new(FlipContentRequest::new(FlipContent {
                entity: args.entity()?,
            })))
        });
        registry.register(RequestType::IncludeIntoGroup, |args| {
            Ok(Box::new(IncludeIntoGroupRequest::new(IncludeIntoGroup {
                group: args.entity()?,
                member: args.entity()?,
            })))
        });
        registry.register(RequestType::MoveEntity, |args| {
            Ok(Box::new(MoveEntityRequest::new(MoveEntity {
                entity: args.entity()?,
                offset: args.offset()?,
            })))
        });
        registry.register(RequestType::SetBackgroundRegions, |args| {
            Ok(Box::new(SetBackgroundRegionsRequest::new(
                SetBackgroundRegions {
                    sketch: args.entity()?,
                    regions: args.regions()?,
                },
            )))
        });
        registry.register(RequestType::AddGuideline, |args| {
            Ok(Box::new(AddGuidelineRequest::new(AddGuideline {
                sketch: args.entity()?,
                guideline: args.guideline()?,
            })))
        });
        registry.register(RequestType::ChangeGuidelineType, |args| {
            Ok(Box::new(ChangeGuidelineTypeRequest::new(
                ChangeGuidelineType {
                    sketch: args.entity()?,
                    guideline: args.sketch_item()?,
                    kind: args.guideline_kind()?,
                },
            )))
        });
        registry.register(RequestType::DeleteEntity, |args| {
            Ok(Box::new(DeleteEntityRequest::new(DeleteEntity {
                entity: args.entity()?,
            })))
        });
        registry.register(RequestType::AddMolding, |args| {
            Ok(Box::new(AddMoldingRequest::new(AddMolding::new(
                args.entity()?,
                args.text()?,
                args.points()?,
                args.material()?,
            ))))
        });
        registry
    }

    pub fn register(&mut self, request: RequestType, factory: RequestFactory) {
        self.factories.insert(request, factory);
    }

    pub fn contains(&self, request: RequestType) -> bool {
        self.factories.contains_key(&request)
    }

    pub fn create(
        &self,
        request: RequestType,
        args: Vec<RequestArg>,
    ) -> Result<Box<dyn Request>, TransactionError> {
        let factory = self
            .factories
            .get(&request)
            .ok_or(TransactionError::UnknownRequestType(request))?;
        factory(&mut ArgReader::new(request, args))
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestRegistry")
            .field("registered", &self.factories.len())
            .finish()
    }
}

/// 已提交的请求先暂存在 `pending` 中，由命令管理器在命令完成时取走。
#[derive(Debug, Default)]
pub struct TransactionManager {
    registry: RequestRegistry,
    pending: Vec<Box<dyn Request>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::with_registry(RequestRegistry::new())
    }

    pub fn with_registry(registry: RequestRegistry) -> Self {
        Self {
            registry,
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut RequestRegistry {
        &mut self.registry
    }

    pub fn create_request(
        &self,
        request: RequestType,
        args: Vec<RequestArg>,
    ) -> Result<Box<dyn Request>, TransactionError> {
        self.registry.create(request, args)
    }

    pub fn commit(
        &mut self,
        mut request: Box<dyn Request>,
        doc: &mut Document,
    ) -> Result<(), TransactionError> {
        request.on_commit(doc)?;
        info!(
            request = %request.request_type(),
            description = %request.description(),
            "事务已提交"
        );
        self.pending.push(request);
        Ok(())
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<Box<dyn Request>> {
        std::mem::take(&mut self.pending)
    }

    /// 按提交的逆序撤销暂存请求并丢弃，返回回滚的数量。
    ///
    /// 回滚后的文档与命令执行前一致，恢复过程中入队的变更事件一并丢弃。
    pub fn rollback_pending(&mut self, doc: &mut Document) -> usize {
        let pending = self.take_pending();
        let count = pending.len();
        let events = doc.event_count();
        for mut request in pending.into_iter().rev() {
            if let Err(err) = request.on_undo(doc) {
                warn!(
                    request = %request.request_type(),
                    error = %err,
                    "回滚事务失败"
                );
            }
        }
        doc.truncate_events(events);
        if count > 0 {
            debug!(count, "已回滚未完成的事务");
        }
        count
    }
}
