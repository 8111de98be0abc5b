// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model.rs - 模型与检测结果
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

use serde::Serialize;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Option<Self>;
}

/// 口罩佩戴状态，类别编号与模型输出的置信度列一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStatus {
  /// 佩戴口罩
  Mask,
  /// 未佩戴口罩
  NoMask,
}

impl WithLabel for MaskStatus {
  fn to_label_str(&self) -> String {
    match self {
      MaskStatus::Mask => "mask".to_string(),
      MaskStatus::NoMask => "no_mask".to_string(),
    }
  }

  fn to_label_id(&self) -> u32 {
    match self {
      MaskStatus::Mask => 0,
      MaskStatus::NoMask => 1,
    }
  }

  fn from_label_id(id: u32) -> Option<Self> {
    match id {
      0 => Some(MaskStatus::Mask),
      1 => Some(MaskStatus::NoMask),
      _ => None,
    }
  }
}

/// 归一化坐标下的轴对齐矩形，左上角为 (0, 0)，右下角为 (1, 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bound {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Bound {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn max_x(&self) -> f32 {
    self.x + self.width
  }

  pub fn max_y(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  /// 交集面积，每个轴上的重叠长度先截断到 0 再相乘
  pub fn intersection_area(&self, other: &Bound) -> f32 {
    let overlap_w = (self.max_x().min(other.max_x()) - self.x.max(other.x)).max(0.0);
    let overlap_h = (self.max_y().min(other.max_y()) - self.y.max(other.y)).max(0.0);
    overlap_w * overlap_h
  }

  pub fn iou(&self, other: &Bound) -> f32 {
    let intersection = self.intersection_area(other);
    if intersection <= 0.0 {
      return 0.0;
    }
    let union = self.area() + other.area() - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
  }

  /// 转换为 [x_min, y_min, x_max, y_max]
  pub fn to_corners(&self) -> [f32; 4] {
    [self.x, self.y, self.max_x(), self.max_y()]
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectItem<T = MaskStatus> {
  pub kind: T,
  pub score: f32,
  pub bound: Bound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<T = MaskStatus> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub mod anchor;
pub mod candidate;
pub mod config;
pub mod decode;
pub mod detector;
pub mod nms;
pub mod tensor;

#[cfg(feature = "rknn")]
mod rknn;

pub use self::anchor::{Anchor, AnchorError, AnchorGenerator, AnchorTable};
pub use self::config::{ConfigError, DetectorConfig};
pub use self::detector::{InferenceEngine, MaskDetector, ReplayEngine};
pub use self::tensor::{MalformedOutputError, OutputView, RawOutput, Tensor, TensorData};

#[cfg(feature = "rknn")]
pub use self::rknn::{RknnEngine, RknnEngineBuilder, RknnEngineError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn label_ids_round_trip_through_status() {
    for status in [MaskStatus::Mask, MaskStatus::NoMask] {
      assert_eq!(MaskStatus::from_label_id(status.to_label_id()), Some(status));
    }
    assert_eq!(MaskStatus::from_label_id(2), None);
    assert_eq!(MaskStatus::NoMask.to_label_str(), "no_mask");
  }

  #[test]
  fn disjoint_bounds_have_zero_iou() {
    let a = Bound::new(0.0, 0.0, 0.2, 0.2);
    let b = Bound::new(0.5, 0.5, 0.2, 0.2);
    assert_eq!(a.intersection_area(&b), 0.0);
    assert_eq!(a.iou(&b), 0.0);
  }

  #[test]
  fn half_overlap_iou() {
    // 面积各为 0.04，交集 0.02，并集 0.06
    let a = Bound::new(0.0, 0.0, 0.2, 0.2);
    let b = Bound::new(0.1, 0.0, 0.2, 0.2);
    assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(a.to_corners(), [0.0, 0.0, 0.2, 0.2]);
  }
}
