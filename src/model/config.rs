// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/config.rs - 检测器参数
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

use thiserror::Error;

const DEFAULT_MIN_CONFIDENCE: f32 = 0.8;
const DEFAULT_IOU_THRESHOLD: f32 = 0.2;
const DEFAULT_MAX_RESULTS: usize = 10;
const DEFAULT_MARGIN: f32 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("最小置信度必须在 (0, 1] 之间, 实际为 {0}")]
  MinConfidence(f32),
  #[error("IoU 阈值必须在 [0, 1] 之间, 实际为 {0}")]
  IouThreshold(f32),
  #[error("最大结果数必须为正整数")]
  MaxResults,
  #[error("类别间隔倍数必须不小于 1, 实际为 {0}")]
  Margin(f32),
}

/// 检测器参数，构造后只读
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
  /// 返回结果的最小置信度
  pub min_confidence: f32,
  /// 非极大值抑制的 IoU 阈值
  pub iou_threshold: f32,
  /// 最多返回的结果数
  pub max_results: usize,
  /// 某一类别的置信度须超过另一类别的倍数，才会报告该结果
  pub margin: f32,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      min_confidence: DEFAULT_MIN_CONFIDENCE,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_results: DEFAULT_MAX_RESULTS,
      margin: DEFAULT_MARGIN,
    }
  }
}

impl DetectorConfig {
  pub fn min_confidence(mut self, min_confidence: f32) -> Self {
    self.min_confidence = min_confidence;
    self
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  pub fn max_results(mut self, max_results: usize) -> Self {
    self.max_results = max_results;
    self
  }

  pub fn margin(mut self, margin: f32) -> Self {
    self.margin = margin;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.min_confidence > 0.0 && self.min_confidence <= 1.0) {
      return Err(ConfigError::MinConfidence(self.min_confidence));
    }
    if !(0.0..=1.0).contains(&self.iou_threshold) {
      return Err(ConfigError::IouThreshold(self.iou_threshold));
    }
    if self.max_results == 0 {
      return Err(ConfigError::MaxResults);
    }
    if !(self.margin >= 1.0 && self.margin.is_finite()) {
      return Err(ConfigError::Margin(self.margin));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = DetectorConfig::default();
    assert_eq!(config.min_confidence, 0.8);
    assert_eq!(config.iou_threshold, 0.2);
    assert_eq!(config.max_results, 10);
    assert_eq!(config.margin, 5.0);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn rejects_out_of_range_values() {
    let base = DetectorConfig::default();
    assert_eq!(
      base.min_confidence(0.0).validate(),
      Err(ConfigError::MinConfidence(0.0))
    );
    assert!(base.min_confidence(1.0).validate().is_ok());
    assert!(base.min_confidence(f32::NAN).validate().is_err());
    assert_eq!(
      base.iou_threshold(1.5).validate(),
      Err(ConfigError::IouThreshold(1.5))
    );
    assert!(base.iou_threshold(0.0).validate().is_ok());
    assert_eq!(base.max_results(0).validate(), Err(ConfigError::MaxResults));
    assert_eq!(base.margin(0.5).validate(), Err(ConfigError::Margin(0.5)));
    assert!(base.margin(1.0).validate().is_ok());
  }
}
