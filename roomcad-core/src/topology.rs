//! 拓扑构建：为每个区域内的每条曲线分配稳定的、由位置推导的拓扑名。
//!
//! 拓扑名不是持久状态，每次调用都会根据当前几何顺序重新计算；
//! 相同的区域与顺序总是得到逐字节相同的结果，下游实体生成依赖这些名字
//! 在多次重建之间对应区域，而不是依赖曲线实例。

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::Curve2d;
use crate::sketch::{Background, SketchId};

/// 背景派生的所有区域共享的拓扑标签。
pub const BACKGROUND_TOPO: &str = "background";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuilderCurveItem {
    pub curve: Curve2d,
    pub topo: String,
}

impl BuilderCurveItem {
    /// 反转曲线方向，拓扑名保持不变。
    pub fn reversed(&self) -> Self {
        Self {
            curve: self.curve.reversed(),
            topo: self.topo.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuilderRegion {
    pub outer: Vec<BuilderCurveItem>,
    pub holes: Vec<Vec<BuilderCurveItem>>,
    pub topo: String,
}

impl BuilderRegion {
    pub fn curve_count(&self) -> usize {
        self.outer.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    /// 按拓扑名查找曲线。
    pub fn find(&self, topo: &str) -> Option<&BuilderCurveItem> {
        self.outer
            .iter()
            .chain(self.holes.iter().flatten())
            .find(|item| item.topo == topo)
    }
}

/// 结构化的拓扑名，`Display` 生成字符串，`FromStr` 反解。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopoName {
    BackgroundOuter { region: usize, curve: usize },
    BackgroundHole { region: usize, hole: usize, curve: usize },
    FaceOuter { face: u64, curve: usize },
    FaceHole { face: u64, hole: usize, curve: usize },
}

impl fmt::Display for TopoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TopoName::BackgroundOuter { region, curve } => {
                write!(f, "background_outer_{region}_{curve}")
            }
            TopoName::BackgroundHole {
                region,
                hole,
                curve,
            } => write!(f, "background_hole_{region}_{hole}_{curve}"),
            TopoName::FaceOuter { face, curve } => write!(f, "face_{face}_outer_{curve}"),
            TopoName::FaceHole { face, hole, curve } => {
                write!(f, "face_{face}_hole_{hole}_{curve}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid topology name `{0}`")]
pub struct TopoParseError(pub String);

impl FromStr for TopoName {
    type Err = TopoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TopoParseError(s.to_string());
        let parts: Vec<&str> = s.split('_').collect();
        let index = |raw: &str| raw.parse::<usize>().map_err(|_| invalid());
        match parts.as_slice() {
            ["background", "outer", region, curve] => Ok(TopoName::BackgroundOuter {
                region: index(*region)?,
                curve: index(*curve)?,
            }),
            ["background", "hole", region, hole, curve] => Ok(TopoName::BackgroundHole {
                region: index(*region)?,
                hole: index(*hole)?,
                curve: index(*curve)?,
            }),
            ["face", face, "outer", curve] => Ok(TopoName::FaceOuter {
                face: face.parse().map_err(|_| invalid())?,
                curve: index(*curve)?,
            }),
            ["face", face, "hole", hole, curve] => Ok(TopoName::FaceHole {
                face: face.parse().map_err(|_| invalid())?,
                hole: index(*hole)?,
                curve: index(*curve)?,
            }),
            _ => Err(invalid()),
        }
    }
}

fn tag_loop<F>(curves: &[Curve2d], name: F) -> Vec<BuilderCurveItem>
where
    F: Fn(usize) -> TopoName,
{
    curves
        .iter()
        .enumerate()
        .map(|(index, curve)| BuilderCurveItem {
            curve: curve.clone(),
            topo: name(index).to_string(),
        })
        .collect()
}

/// 将背景投影为构建区域。纯函数，不校验几何。
pub fn to_builder_regions(background: &Background) -> Vec<BuilderRegion> {
    background
        .regions_ref()
        .iter()
        .enumerate()
        .map(|(region, source)| BuilderRegion {
            outer: tag_loop(source.outer(), |curve| TopoName::BackgroundOuter { region, curve }),
            holes: source
                .holes()
                .iter()
                .enumerate()
                .map(|(hole, curves)| {
                    tag_loop(curves, |curve| TopoName::BackgroundHole {
                        region,
                        hole,
                        curve,
                    })
                })
                .collect(),
            topo: BACKGROUND_TOPO.to_string(),
        })
        .collect()
}

pub(crate) fn face_builder_region(
    id: SketchId,
    outer: &[Curve2d],
    inner: &[Vec<Curve2d>],
) -> BuilderRegion {
    let face = id.get();
    BuilderRegion {
        outer: tag_loop(outer, |curve| TopoName::FaceOuter { face, curve }),
        holes: inner
            .iter()
            .enumerate()
            .map(|(hole, curves)| tag_loop(curves, |curve| TopoName::FaceHole { face, hole, curve }))
            .collect(),
        topo: format!("face_{face}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point2;
    use crate::sketch::{IdRegistry, Region};

    fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Curve2d> {
        Curve2d::closed_polygon(&[
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ])
    }

    #[test]
    fn rectangle_with_square_hole_gets_positional_tags() {
        let mut ids = IdRegistry::new();
        let region = Region::new(
            rectangle(0.0, 0.0, 10.0, 6.0),
            vec![rectangle(2.0, 2.0, 4.0, 4.0)],
        )
        .expect("valid region");
        let background = Background::create(&mut ids, vec![region]);

        let regions = to_builder_regions(&background);
        assert_eq!(regions.len(), 1);
        let built = &regions[0];
        assert_eq!(built.topo, "background");
        let outer: Vec<&str> = built.outer.iter().map(|item| item.topo.as_str()).collect();
        assert_eq!(
            outer,
            [
                "background_outer_0_0",
                "background_outer_0_1",
                "background_outer_0_2",
                "background_outer_0_3"
            ]
        );
        let hole: Vec<&str> = built.holes[0].iter().map(|item| item.topo.as_str()).collect();
        assert_eq!(
            hole,
            [
                "background_hole_0_0_0",
                "background_hole_0_0_1",
                "background_hole_0_0_2",
                "background_hole_0_0_3"
            ]
        );
        assert_eq!(built.curve_count(), 8);
    }

    #[test]
    fn empty_background_yields_no_regions() {
        let mut ids = IdRegistry::new();
        let background = Background::create(&mut ids, Vec::new());
        assert!(to_builder_regions(&background).is_empty());
    }

    #[test]
    fn region_without_holes_keeps_empty_hole_list() {
        let mut ids = IdRegistry::new();
        let circle = Region::new(vec![Curve2d::circle(Point2::new(0.0, 0.0), 1.0)], vec![])
            .expect("circle");
        let background = Background::create(&mut ids, vec![circle]);
        let regions = to_builder_regions(&background);
        assert!(regions[0].holes.is_empty());
        assert_eq!(regions[0].outer[0].topo, "background_outer_0_0");
    }

    #[test]
    fn topo_names_decode_back_to_indices() {
        let cases = [
            TopoName::BackgroundOuter {
                region: 3,
                curve: 12,
            },
            TopoName::BackgroundHole {
                region: 0,
                hole: 2,
                curve: 1,
            },
            TopoName::FaceOuter { face: 7, curve: 0 },
            TopoName::FaceHole {
                face: 7,
                hole: 1,
                curve: 4,
            },
        ];
        for name in cases {
            let parsed: TopoName = name.to_string().parse().expect("decode");
            assert_eq!(parsed, name);
        }
        assert!("background_outer_x_1".parse::<TopoName>().is_err());
        assert!("background".parse::<TopoName>().is_err());
        assert!("wall_outer_0_0".parse::<TopoName>().is_err());
    }

    #[test]
    fn reversed_item_keeps_topo() {
        let item = BuilderCurveItem {
            curve: Curve2d::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)),
            topo: "background_outer_0_0".to_string(),
        };
        let reversed = item.reversed();
        assert_eq!(reversed.topo, item.topo);
        assert_eq!(reversed.curve.start_point(), Some(Point2::new(1.0, 0.0)));
    }
}
