// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/anchor.rs - 锚框表
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Kouzhao 项目贡献者

use std::{path::Path, sync::Arc};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

/// 参考框，归一化坐标 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
  pub x_min: f64,
  pub y_min: f64,
  pub x_max: f64,
  pub y_max: f64,
}

impl Anchor {
  pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn width(&self) -> f64 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> f64 {
    self.y_max - self.y_min
  }

  fn from_row(index: usize, row: &[f64]) -> Result<Self, AnchorError> {
    match row {
      &[x_min, y_min, x_max, y_max] => Ok(Anchor::new(x_min, y_min, x_max, y_max)),
      _ => Err(AnchorError::Arity {
        index,
        len: row.len(),
      }),
    }
  }
}

#[derive(Error, Debug)]
pub enum AnchorError {
  #[error("锚框文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("锚框数据解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("第 {index} 个锚框应包含 4 个数值, 实际为 {len}")]
  Arity { index: usize, len: usize },
  #[error("第 {0} 个锚框包含非有限数值")]
  NonFinite(usize),
  #[error("第 {0} 个锚框的坐标反转")]
  Inverted(usize),
  #[error("锚框表为空")]
  Empty,
  #[error("锚框生成配置无效: {0}")]
  InvalidGenerator(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Deserialize)]
struct AnchorPayload {
  anchors: Vec<Vec<f64>>,
}

/// 与模型配对的锚框表，构造后只读，可在多个检测器和线程之间共享
#[derive(Debug, Clone)]
pub struct AnchorTable {
  anchors: Arc<[Anchor]>,
}

impl AnchorTable {
  pub fn new(anchors: Vec<Anchor>) -> Result<Self, AnchorError> {
    if anchors.is_empty() {
      return Err(AnchorError::Empty);
    }

    for (index, anchor) in anchors.iter().enumerate() {
      let values = [anchor.x_min, anchor.y_min, anchor.x_max, anchor.y_max];
      if values.iter().any(|v| !v.is_finite()) {
        return Err(AnchorError::NonFinite(index));
      }
      if anchor.width() < 0.0 || anchor.height() < 0.0 {
        return Err(AnchorError::Inverted(index));
      }
    }

    Ok(Self {
      anchors: anchors.into(),
    })
  }

  /// 解析 `{"anchors": [[x_min, y_min, x_max, y_max], ...]}`
  pub fn from_json_str(payload: &str) -> Result<Self, AnchorError> {
    let payload: AnchorPayload = serde_json::from_str(payload)?;
    let anchors = payload
      .anchors
      .iter()
      .enumerate()
      .map(|(index, row)| Anchor::from_row(index, row))
      .collect::<Result<Vec<_>, _>>()?;
    Self::new(anchors)
  }

  pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AnchorError> {
    let path = path.as_ref();
    info!("加载锚框文件: {}", path.display());
    let payload = std::fs::read_to_string(path)?;
    let table = Self::from_json_str(&payload)?;
    debug!("锚框数量: {}", table.len());
    Ok(table)
  }

  pub fn generate(generator: &AnchorGenerator) -> Result<Self, AnchorError> {
    let table = Self::new(generator.generate()?)?;
    debug!("生成锚框数量: {}", table.len());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.anchors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.anchors.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Anchor> {
    self.anchors.get(index)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Anchor> {
    self.anchors.iter()
  }
}

impl FromUrlWithScheme for AnchorTable {
  const SCHEME: &'static str = "anchors";
}

impl FromUrl for AnchorTable {
  type Error = AnchorError;

  /// `anchors:` 使用默认生成配置，`anchors:///path/to/anchors.json` 从文件加载
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(AnchorError::SchemeMismatch(url.scheme().to_string()));
    }

    if url.path().is_empty() || url.path() == "/" {
      info!("使用默认配置生成锚框");
      Self::generate(&AnchorGenerator::default())
    } else {
      Self::from_path(url.path())
    }
  }
}

/// 单层特征图的锚框配置
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLevel {
  /// (宽, 高)
  pub feature_map: (usize, usize),
  pub sizes: Vec<f64>,
  pub ratios: Vec<f64>,
}

impl AnchorLevel {
  /// 每个网格点的锚框数：所有尺寸配第一个宽高比，再加上第一个尺寸配其余宽高比
  pub fn anchors_per_cell(&self) -> usize {
    (self.sizes.len() + self.ratios.len()).saturating_sub(1)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGenerator {
  pub levels: Vec<AnchorLevel>,
  pub offset: f64,
}

const DEFAULT_FEATURE_MAPS: [usize; 5] = [33, 17, 9, 5, 3];
const DEFAULT_SIZES: [[f64; 2]; 5] = [
  [0.04, 0.056],
  [0.08, 0.11],
  [0.16, 0.22],
  [0.32, 0.45],
  [0.64, 0.72],
];
const DEFAULT_RATIOS: [f64; 3] = [1.0, 0.62, 0.42];

impl Default for AnchorGenerator {
  /// 260x260 输入的口罩检测模型训练时使用的配置
  fn default() -> Self {
    let levels = DEFAULT_FEATURE_MAPS
      .iter()
      .zip(DEFAULT_SIZES)
      .map(|(&size, sizes)| AnchorLevel {
        feature_map: (size, size),
        sizes: sizes.to_vec(),
        ratios: DEFAULT_RATIOS.to_vec(),
      })
      .collect();

    Self {
      levels,
      offset: 0.5,
    }
  }
}

impl AnchorGenerator {
  pub fn anchor_count(&self) -> usize {
    self
      .levels
      .iter()
      .map(|level| level.feature_map.0 * level.feature_map.1 * level.anchors_per_cell())
      .sum()
  }

  pub fn generate(&self) -> Result<Vec<Anchor>, AnchorError> {
    let mut anchors = Vec::with_capacity(self.anchor_count());

    for (level_idx, level) in self.levels.iter().enumerate() {
      let (map_w, map_h) = level.feature_map;
      if map_w == 0 || map_h == 0 {
        return Err(AnchorError::InvalidGenerator(format!(
          "第 {} 层特征图尺寸为 0",
          level_idx
        )));
      }
      let (Some(&first_size), Some(&first_ratio)) = (level.sizes.first(), level.ratios.first())
      else {
        return Err(AnchorError::InvalidGenerator(format!(
          "第 {} 层缺少尺寸或宽高比",
          level_idx
        )));
      };
      if level.sizes.iter().chain(&level.ratios).any(|v| *v <= 0.0) {
        return Err(AnchorError::InvalidGenerator(format!(
          "第 {} 层的尺寸与宽高比必须为正数",
          level_idx
        )));
      }

      let shapes: Vec<(f64, f64)> = level
        .sizes
        .iter()
        .map(|&size| (size, first_ratio))
        .chain(level.ratios[1..].iter().map(|&ratio| (first_size, ratio)))
        .map(|(size, ratio)| (size * ratio.sqrt(), size / ratio.sqrt()))
        .collect();

      for y in 0..map_h {
        let cy = (y as f64 + self.offset) / map_h as f64;
        for x in 0..map_w {
          let cx = (x as f64 + self.offset) / map_w as f64;
          for &(width, height) in &shapes {
            anchors.push(Anchor::new(
              cx - width / 2.0,
              cy - height / 2.0,
              cx + width / 2.0,
              cy + height / 2.0,
            ));
          }
        }
      }
    }

    Ok(anchors)
  }
}
