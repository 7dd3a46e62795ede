use roomcad_config::HistoryConfig;
use roomcad_core::document::{DocumentEvent, Entity, EntityFlags, EntityKind, Material};
use roomcad_core::geometry::{Curve2d, Point2, Vector2};
use roomcad_core::sketch::{Background, Coedge, GuidelineKind, Sketch2d, Wire};
use roomcad_engine::command::{
    CancelReason, CmdAddGuideline, CmdDelete, CmdEditMaterial, CmdFlipContent,
    CmdIncludeIntoGroup, CmdMoveEntity, CmdPurgeRemoved, CommandOutcome,
};
use roomcad_engine::editor::Editor;
use roomcad_engine::errors::EngineError;

fn model_position(editor: &Editor, id: roomcad_core::document::EntityId) -> Point2 {
    match editor.entity(id).map(|entity| &entity.kind) {
        Some(EntityKind::CustomizedModel(model)) => model.position,
        Some(EntityKind::Opening(opening)) => opening.position,
        other => panic!("unexpected entity: {other:?}"),
    }
}

#[test]
fn material_round_trip_is_exact() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    let original = editor
        .entity(ids.wall)
        .and_then(Entity::material)
        .cloned()
        .expect("wall material");
    let brick = Material::new("brick", 0xb71c1c)
        .with_tile_size(0.24, 0.12)
        .with_rotation(0.5);

    editor
        .execute(CmdEditMaterial::new(ids.wall, brick.clone()))
        .expect("edit");
    let committed = editor.entity(ids.wall).cloned().expect("wall");
    assert_eq!(committed.material(), Some(&brick));

    editor.undo().expect("undo");
    assert_eq!(editor.entity(ids.wall).and_then(Entity::material), Some(&original));

    editor.redo().expect("redo");
    let redone = editor.entity(ids.wall).expect("wall");
    assert_eq!(redone.kind, committed.kind);
}

#[test]
fn including_removed_member_leaves_group_untouched() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    editor.execute(CmdDelete::new(ids.sofa)).expect("delete");
    let group_before = editor.entity(ids.group).cloned();
    let sofa_before = editor.entity(ids.sofa).cloned();
    let undo_depth = editor.commands().undo_len();

    let outcome = editor
        .execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa]))
        .expect("include");

    assert_eq!(
        outcome,
        CommandOutcome::Cancelled(CancelReason::EntityRemoved(ids.sofa))
    );
    assert_eq!(editor.entity(ids.group).cloned(), group_before);
    assert_eq!(editor.entity(ids.sofa).cloned(), sofa_before);
    assert_eq!(editor.commands().undo_len(), undo_depth);
}

#[test]
fn moving_group_moves_members_and_undoes_together() {
    let mut editor = Editor::new(&HistoryConfig {
        max_undo_steps: 10,
        merge_field_edits: false,
    });
    let ids = editor.populate_demo();
    editor
        .execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa, ids.door]))
        .expect("include");
    let sofa_start = model_position(&editor, ids.sofa);
    let door_start = model_position(&editor, ids.door);

    editor
        .execute(CmdMoveEntity::new(ids.group, Vector2::new(1.0, -0.5)))
        .expect("move");
    assert_eq!(
        model_position(&editor, ids.sofa),
        sofa_start.translate(Vector2::new(1.0, -0.5))
    );
    assert_eq!(
        model_position(&editor, ids.door),
        door_start.translate(Vector2::new(1.0, -0.5))
    );

    editor.undo().expect("undo");
    assert_eq!(model_position(&editor, ids.sofa), sofa_start);
    assert_eq!(model_position(&editor, ids.door), door_start);
}

#[test]
fn undo_notifies_restored_entities_only() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    editor.execute(CmdFlipContent::new(ids.sofa)).expect("flip");
    editor.document_mut().drain_events();
    editor.document_mut().take_dirty(ids.sofa);

    editor.undo().expect("undo");
    assert_eq!(
        editor.document_mut().drain_events(),
        vec![DocumentEvent::Changed(ids.sofa)]
    );
    let dirty = editor.document_mut().take_dirty(ids.sofa).expect("dirty flags");
    assert!(dirty.geometry && dirty.position && dirty.material);
}

#[test]
fn stale_entities_are_skipped_on_undo() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    editor.execute(CmdFlipContent::new(ids.sofa)).expect("flip");
    editor.execute(CmdDelete::new(ids.sofa)).expect("delete");
    assert_eq!(
        editor.execute(CmdPurgeRemoved::new()).expect("purge"),
        CommandOutcome::Completed
    );
    editor.document_mut().drain_events();

    assert_eq!(editor.undo().expect("undo delete"), Some("delete"));
    assert_eq!(editor.undo().expect("undo flip"), Some("flip_content"));
    assert!(editor.entity(ids.sofa).is_none());
    assert!(editor.document_mut().drain_events().is_empty());
    assert!(!editor.commands().can_undo());
}

#[test]
fn delete_undo_clears_removed_flag() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    editor.execute(CmdDelete::new(ids.door)).expect("delete");
    assert!(editor
        .entity(ids.door)
        .is_some_and(|door| door.flags.contains(EntityFlags::REMOVED)));

    editor.undo().expect("undo");
    assert!(editor.entity(ids.door).is_some_and(|door| !door.is_removed()));
    assert_eq!(
        editor.document().bounds().map(|bounds| bounds.is_empty()),
        Some(false)
    );
}

#[test]
fn undo_waits_for_open_batch() {
    let mut editor = Editor::new(&HistoryConfig {
        max_undo_steps: 10,
        merge_field_edits: false,
    });
    let ids = editor.populate_demo();
    let start = model_position(&editor, ids.sofa);
    editor
        .execute(CmdMoveEntity::new(ids.sofa, Vector2::new(1.0, 0.0)))
        .expect("move");

    editor.begin_batch("arrange").expect("begin");
    editor
        .execute(CmdMoveEntity::new(ids.sofa, Vector2::new(0.0, 1.0)))
        .expect("move in batch");
    assert!(matches!(editor.undo(), Err(EngineError::BatchOpen)));
    assert_eq!(
        model_position(&editor, ids.sofa),
        start.translate(Vector2::new(1.0, 1.0))
    );

    assert!(editor.end_batch().expect("end"));
    assert_eq!(editor.undo().expect("undo batch"), Some("arrange"));
    assert_eq!(editor.undo().expect("undo move"), Some("move_entity"));
    assert_eq!(model_position(&editor, ids.sofa), start);
}

#[test]
fn member_switches_groups_and_undo_restores_both() {
    let mut editor = Editor::default();
    let ids = editor.populate_demo();
    editor
        .execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa]))
        .expect("include");
    let second = editor.document_mut().add_group(Vec::new());

    assert_eq!(
        editor
            .execute(CmdIncludeIntoGroup::new(second, vec![ids.sofa]))
            .expect("switch"),
        CommandOutcome::Completed
    );
    assert_eq!(editor.entity(ids.group).and_then(Entity::members), Some(&[][..]));
    assert_eq!(
        editor.entity(second).and_then(Entity::members),
        Some(&[ids.sofa][..])
    );

    // 移动旧分组不再带动沙发
    let sofa_at = model_position(&editor, ids.sofa);
    editor
        .execute(CmdMoveEntity::new(ids.group, Vector2::new(2.0, 0.0)))
        .expect("move old group");
    assert_eq!(model_position(&editor, ids.sofa), sofa_at);
    editor.undo().expect("undo move");

    editor.undo().expect("undo switch");
    assert_eq!(
        editor.entity(ids.group).and_then(Entity::members),
        Some(&[ids.sofa][..])
    );
    assert_eq!(editor.entity(second).and_then(Entity::members), Some(&[][..]));
    assert_eq!(
        editor.entity(ids.sofa).and_then(|sofa| sofa.group),
        Some(ids.group)
    );
}

#[test]
fn moving_sketch_carries_guidelines_and_faces() {
    let mut editor = Editor::default();
    let background = Background::create(editor.ids_mut(), Vec::new());
    let mut sketch = Sketch2d::create(editor.ids_mut(), background);
    let a = Point2::new(0.0, 0.0);
    let b = Point2::new(4.0, 0.0);
    let c = Point2::new(0.0, 3.0);
    let ab = sketch.add_edge(editor.ids_mut(), Curve2d::line(a, b));
    let bc = sketch.add_edge(editor.ids_mut(), Curve2d::line(b, c));
    let ca = sketch.add_edge(editor.ids_mut(), Curve2d::line(c, a));
    let wire = Wire::new(vec![
        Coedge::forward(ab),
        Coedge::forward(bc),
        Coedge::forward(ca),
    ]);
    sketch
        .add_face_from_wires(editor.ids_mut(), &wire, &[])
        .expect("face");
    let sketch = editor.document_mut().add_sketch(sketch);
    editor
        .execute(CmdAddGuideline::new(
            sketch,
            Curve2d::line(Point2::new(0.0, 1.0), Point2::new(4.0, 1.0)),
            Point2::new(0.0, 1.0),
            Point2::new(4.0, 1.0),
            GuidelineKind::Horizontal,
        ))
        .expect("guideline");
    let before = editor.entity(sketch).and_then(Entity::sketch).cloned().expect("sketch");

    editor
        .execute(CmdMoveEntity::new(sketch, Vector2::new(10.0, 0.0)))
        .expect("move");
    let moved = editor.entity(sketch).and_then(Entity::sketch).expect("sketch");
    let guideline = &moved.guidelines()[0];
    assert_eq!(guideline.curve().start_point(), Some(Point2::new(10.0, 1.0)));
    assert_eq!(guideline.from_anchor(), Point2::new(10.0, 1.0));
    assert_eq!(
        moved.faces()[0].outer_loop()[0].start_point(),
        Some(Point2::new(10.0, 0.0))
    );
    assert_eq!(
        moved.edge(bc).and_then(|edge| edge.curve().end_point()),
        Some(Point2::new(10.0, 3.0))
    );
    // 拓扑名不随平移变化
    let topo = |sketch: &Sketch2d| {
        sketch
            .to_builder_regions()
            .into_iter()
            .map(|region| region.topo)
            .collect::<Vec<_>>()
    };
    assert_eq!(topo(moved), topo(&before));

    editor.undo().expect("undo");
    assert_eq!(editor.entity(sketch).and_then(Entity::sketch), Some(&before));
}
