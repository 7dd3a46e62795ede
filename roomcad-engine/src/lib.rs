pub mod command;
pub mod request;
pub mod transaction;
pub mod txn_state;

pub mod errors {
    use roomcad_core::document::EntityId;
    use roomcad_core::sketch::SketchError;
    use thiserror::Error;

    use crate::request::{RequestAction, RequestState};
    use crate::transaction::RequestType;

    /// 事务层错误。均属于调用方的编程错误，只让当前用户操作失败，不影响文档。
    #[derive(Debug, Error)]
    pub enum TransactionError {
        #[error("no factory registered for request type `{0}`")]
        UnknownRequestType(RequestType),
        #[error("request `{request}` is missing argument #{index}")]
        MissingArgument { request: RequestType, index: usize },
        #[error("request `{request}` argument #{index}: expected {expected}, found {found}")]
        ArgumentMismatch {
            request: RequestType,
            index: usize,
            expected: &'static str,
            found: &'static str,
        },
        #[error("cannot {action} a request in state {from:?}")]
        InvalidTransition {
            from: RequestState,
            action: RequestAction,
        },
        #[error("entity {0} not found")]
        EntityNotFound(EntityId),
        #[error("entity {entity} is not a {expected}")]
        WrongKind {
            entity: EntityId,
            expected: &'static str,
        },
        #[error(transparent)]
        Sketch(#[from] SketchError),
    }

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("a command batch is already open")]
        BatchAlreadyOpen,
        #[error("no command batch is open")]
        NoOpenBatch,
        #[error("cannot undo or redo while a command batch is open")]
        BatchOpen,
        #[error(transparent)]
        Transaction(#[from] TransactionError),
    }
}

pub mod editor {
    use roomcad_config::HistoryConfig;
    use roomcad_core::document::{Document, Entity, EntityId, Material};
    use roomcad_core::geometry::{Curve2d, Point2};
    use roomcad_core::sketch::{Background, IdRegistry, Region, Sketch2d};
    use tracing::debug;

    use crate::command::{Command, CommandContext, CommandManager, CommandOutcome};
    use crate::errors::EngineError;
    use crate::transaction::TransactionManager;

    /// 引擎层持有文档、id 注册表与两个管理器，命令都通过这里执行。
    #[derive(Debug)]
    pub struct Editor {
        document: Document,
        ids: IdRegistry,
        transactions: TransactionManager,
        commands: CommandManager,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DemoEntities {
        pub wall: EntityId,
        pub door: EntityId,
        pub sofa: EntityId,
        pub group: EntityId,
        pub floor: EntityId,
    }

    impl Editor {
        pub fn new(history: &HistoryConfig) -> Self {
            Self {
                document: Document::new(),
                ids: IdRegistry::new(),
                transactions: TransactionManager::new(),
                commands: CommandManager::new(history),
            }
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn document_mut(&mut self) -> &mut Document {
            &mut self.document
        }

        #[inline]
        pub fn ids_mut(&mut self) -> &mut IdRegistry {
            &mut self.ids
        }

        #[inline]
        pub fn commands(&self) -> &CommandManager {
            &self.commands
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.document.entity(id)
        }

        pub fn execute<C>(&mut self, command: C) -> Result<CommandOutcome, EngineError>
        where
            C: Command + 'static,
        {
            let mut context = CommandContext {
                document: &mut self.document,
                transactions: &mut self.transactions,
                ids: &mut self.ids,
            };
            self.commands.execute(Box::new(command), &mut context)
        }

        /// 撤销最近一条历史，返回其命令名；历史为空时返回 `None`。
        pub fn undo(&mut self) -> Result<Option<&'static str>, EngineError> {
            self.commands.undo(&mut self.document)
        }

        pub fn redo(&mut self) -> Result<Option<&'static str>, EngineError> {
            self.commands.redo(&mut self.document)
        }

        pub fn begin_batch(&mut self, name: &'static str) -> Result<(), EngineError> {
            self.commands.begin_batch(name)
        }

        pub fn end_batch(&mut self) -> Result<bool, EngineError> {
            self.commands.end_batch()
        }

        /// 为 CLI / 快速验证填充一组示例实体，返回关键实体 ID。
        pub fn populate_demo(&mut self) -> DemoEntities {
            let wall = self.document.add_wall(
                Point2::new(0.0, 0.0),
                Point2::new(6.0, 0.0),
                0.24,
                2.8,
                Material::new("paint-white", 0xf5f5f0),
            );
            let door = self.document.add_opening(
                Some(wall),
                Point2::new(2.0, 0.0),
                0.9,
                2.1,
                Material::new("door-walnut", 0x5d4037),
            );
            let sofa = self.document.add_customized_model(
                "sofa",
                Point2::new(3.0, 2.0),
                Material::new("fabric-grey", 0x9e9e9e),
            );
            let group = self.document.add_group(Vec::new());

            let rectangle = Curve2d::closed_polygon(&[
                Point2::new(0.0, 0.0),
                Point2::new(6.0, 0.0),
                Point2::new(6.0, 4.0),
                Point2::new(0.0, 4.0),
            ]);
            let column = Curve2d::closed_polygon(&[
                Point2::new(2.5, 1.5),
                Point2::new(3.0, 1.5),
                Point2::new(3.0, 2.0),
                Point2::new(2.5, 2.0),
            ]);
            let regions = match Region::new(rectangle, vec![column]) {
                Ok(region) => vec![region],
                Err(err) => {
                    debug!(error = %err, "示例区域无效，使用空背景");
                    Vec::new()
                }
            };
            let background = Background::create(&mut self.ids, regions);
            let sketch = Sketch2d::create(&mut self.ids, background);
            let floor = self.document.add_sketch(sketch);

            let ids = DemoEntities {
                wall,
                door,
                sofa,
                group,
                floor,
            };

            debug!(
                wall = ids.wall.get(),
                door = ids.door.get(),
                sofa = ids.sofa.get(),
                group = ids.group.get(),
                floor = ids.floor.get(),
                "已创建演示实体"
            );

            ids
        }
    }

    impl Default for Editor {
        fn default() -> Self {
            Self::new(&HistoryConfig::default())
        }
    }

    #[cfg(test)]
    mod tests {
        use roomcad_core::document::EntityKind;

        use super::*;
        use crate::command::{CmdFlipContent, CmdIncludeIntoGroup};

        #[test]
        fn demo_population_creates_entities() {
            let mut editor = Editor::default();
            let ids = editor.populate_demo();
            assert_eq!(editor.document().entities().count(), 5);
            assert!(matches!(
                editor.entity(ids.floor).map(|entity| &entity.kind),
                Some(EntityKind::Sketch(_))
            ));
            let regions = editor
                .entity(ids.floor)
                .and_then(Entity::sketch)
                .map(Sketch2d::to_builder_regions)
                .expect("floor sketch");
            assert_eq!(regions[0].holes.len(), 1);
        }

        #[test]
        fn editor_runs_undo_and_redo() {
            let mut editor = Editor::default();
            let ids = editor.populate_demo();

            let outcome = editor
                .execute(CmdFlipContent::new(ids.door))
                .expect("flip");
            assert_eq!(outcome, CommandOutcome::Completed);
            assert_eq!(editor.entity(ids.door).and_then(Entity::flipped), Some(true));

            assert_eq!(editor.undo().expect("undo"), Some("flip_content"));
            assert_eq!(editor.entity(ids.door).and_then(Entity::flipped), Some(false));
            assert_eq!(editor.redo().expect("redo"), Some("flip_content"));
            assert_eq!(editor.entity(ids.door).and_then(Entity::flipped), Some(true));
            assert_eq!(editor.redo().expect("redo"), None);
        }

        #[test]
        fn batch_collapses_commands_into_one_entry() {
            let mut editor = Editor::default();
            let ids = editor.populate_demo();

            editor.begin_batch("furnish").expect("begin");
            assert!(matches!(
                editor.begin_batch("again"),
                Err(EngineError::BatchAlreadyOpen)
            ));
            editor
                .execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa]))
                .expect("include");
            editor.execute(CmdFlipContent::new(ids.sofa)).expect("flip");
            assert!(editor.end_batch().expect("end"));
            assert_eq!(editor.commands().undo_len(), 1);

            assert_eq!(editor.undo().expect("undo"), Some("furnish"));
            let sofa = editor.entity(ids.sofa).expect("sofa");
            assert_eq!(sofa.group, None);
            assert_eq!(sofa.flipped(), Some(false));
            assert!(matches!(editor.end_batch(), Err(EngineError::NoOpenBatch)));
        }
    }
}
