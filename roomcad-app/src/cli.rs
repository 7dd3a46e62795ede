use roomcad_config::AppConfig;
use roomcad_core::document::{Entity, EntityId, EntityKind, Material};
use roomcad_core::geometry::{Curve2d, Point2, Vector2};
use roomcad_core::sketch::{GuidelineKind, Region};
use roomcad_core::topology::BuilderRegion;
use roomcad_engine::command::{
    CmdAddGuideline, CmdAddMolding, CmdDelete, CmdEditMaterial, CmdFlipContent,
    CmdIncludeIntoGroup, CmdMoveEntity, CmdPurgeRemoved, CmdSetBackgroundRegions, CommandOutcome,
};
use roomcad_engine::editor::Editor;
use roomcad_engine::errors::EngineError;
use roomcad_engine::transaction::{RequestRegistry, RequestType};
use tracing::{info, warn};

/// CLI 演示：构建示例房间，执行一组命令，演示撤销/重做并打印草图拓扑。
pub fn run_demo(config: &AppConfig) -> Result<(), EngineError> {
    let mut editor = Editor::new(&config.history);
    let ids = editor.populate_demo();

    println!("RoomCAD CLI 演示");
    println!("已构建内置示例实体：");
    println!("  - 墙体 ID = {}", ids.wall.get());
    println!("  - 门洞 ID = {}", ids.door.get());
    println!("  - 沙发 ID = {}", ids.sofa.get());
    println!("  - 分组 ID = {}", ids.group.get());
    println!("  - 地面草图 ID = {}", ids.floor.get());

    report(
        "编辑墙体材质",
        editor.execute(CmdEditMaterial::new(
            ids.wall,
            Material::new("brick-red", 0xb71c1c).with_tile_size(0.24, 0.12),
        ))?,
    );
    report(
        "沙发加入分组",
        editor.execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa]))?,
    );
    report("翻转门洞", editor.execute(CmdFlipContent::new(ids.door))?);
    report(
        "移动分组",
        editor.execute(CmdMoveEntity::new(ids.group, Vector2::new(0.5, 0.0)))?,
    );
    report(
        "添加踢脚线",
        editor.execute(CmdAddMolding::new(
            ids.wall,
            "baseboard",
            vec![Point2::new(0.0, 0.12), Point2::new(6.0, 0.12)],
            Material::new("oak", 0x8d6e63),
        ))?,
    );

    let tolerance = config.sketch.closure_tolerance;
    let l_shape = Curve2d::closed_polygon(&[
        Point2::new(0.0, 0.0),
        Point2::new(6.0, 0.0),
        Point2::new(6.0, 4.0),
        Point2::new(3.0, 4.0),
        Point2::new(3.0, 6.0),
        Point2::new(0.0, 6.0),
    ]);
    match Region::with_tolerance(l_shape, Vec::new(), tolerance) {
        Ok(region) => report(
            "重设地面轮廓",
            editor.execute(CmdSetBackgroundRegions::new(ids.floor, vec![region]))?,
        ),
        Err(err) => warn!(error = %err, tolerance, "地面轮廓无效，跳过"),
    }
    report(
        "添加水平参考线",
        editor.execute(CmdAddGuideline::new(
            ids.floor,
            Curve2d::line(Point2::new(0.0, 2.0), Point2::new(6.0, 2.0)),
            Point2::new(0.0, 2.0),
            Point2::new(6.0, 2.0),
            GuidelineKind::Horizontal,
        ))?,
    );
    report("删除沙发", editor.execute(CmdDelete::new(ids.sofa))?);
    report(
        "已删除的沙发再次加入分组",
        editor.execute(CmdIncludeIntoGroup::new(ids.group, vec![ids.sofa]))?,
    );

    print_history(&editor);
    print_sketch(&editor, ids.floor);

    for _ in 0..3 {
        match editor.undo()? {
            Some(name) => println!("撤销: {name}"),
            None => println!("没有可撤销的操作"),
        }
    }
    if let Some(name) = editor.redo()? {
        println!("重做: {name}");
    }

    report("清除已删除实体", editor.execute(CmdPurgeRemoved::new())?);

    print_history(&editor);
    print_sketch(&editor, ids.floor);
    print_entities(&editor);

    let events = editor.document_mut().drain_events();
    info!(events = events.len(), "CLI 演示完成");
    Ok(())
}

pub fn print_request_types() {
    let registry = RequestRegistry::new();
    println!("已注册的请求类型：");
    for request in RequestType::ALL {
        let status = if registry.contains(request) {
            "已注册"
        } else {
            "未注册"
        };
        println!("  - {request} ({status})");
    }
}

fn report(label: &str, outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Completed => println!("[完成] {label}"),
        CommandOutcome::Cancelled(reason) => println!("[取消] {label}: {reason}"),
    }
}

fn print_history(editor: &Editor) {
    let commands = editor.commands();
    println!(
        "撤销栈 {} 条，重做栈 {} 条：",
        commands.undo_len(),
        commands.redo_len()
    );
    for entry in commands.history() {
        println!(
            "  - [{}] {} ({} 个请求)",
            entry.category(),
            entry.description(),
            entry.request_count()
        );
    }
}

fn print_sketch(editor: &Editor, floor: EntityId) {
    let Some(sketch) = editor.entity(floor).and_then(Entity::sketch) else {
        println!("地面草图不存在");
        return;
    };
    println!("地面草图区域：");
    for region in sketch.to_builder_regions() {
        print_region(&region);
    }
    for guideline in sketch.guidelines() {
        println!("  参考线 {} ({:?})", guideline.id(), guideline.kind());
    }
}

fn print_region(region: &BuilderRegion) {
    let outer: Vec<&str> = region.outer.iter().map(|item| item.topo.as_str()).collect();
    println!(
        "  - 区域 {}: 外环 {} 段 [{}], 内环 {} 个",
        region.topo,
        region.outer.len(),
        outer.join(", "),
        region.holes.len()
    );
}

fn print_entities(editor: &Editor) {
    println!("当前文档实体：");
    for (id, entity) in editor.document().entities() {
        let removed = if entity.is_removed() { " (已删除)" } else { "" };
        match &entity.kind {
            EntityKind::Wall(wall) => println!(
                "  - 墙体 {id}: ({:.2}, {:.2}) -> ({:.2}, {:.2}), 材质={}{removed}",
                wall.start.x(),
                wall.start.y(),
                wall.end.x(),
                wall.end.y(),
                wall.material.seek_id
            ),
            EntityKind::Group(group) => {
                println!("  - 分组 {id}: {} 个成员{removed}", group.members.len())
            }
            other => println!(
                "  - {} {id}: 翻转={:?}{removed}",
                other.type_name(),
                entity.flipped()
            ),
        }
    }
}
