// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/args.rs - 检测参数配置
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

use clap::Args;
use url::Url;

use crate::model::DetectorConfig;

/// 各个可执行文件共用的检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 锚框来源，`anchors:` 使用内置生成的锚框，`anchors:///path.json` 读取文件
  #[arg(long, value_name = "ANCHORS", default_value = "anchors:")]
  pub anchors: Url,

  /// 置信度阈值 (0.0 - 1.0]
  #[arg(long, default_value_t = 0.8, value_name = "THRESHOLD")]
  pub min_confidence: f32,

  /// NMS IoU 阈值 [0.0 - 1.0]
  #[arg(long, default_value_t = 0.2, value_name = "THRESHOLD")]
  pub iou_threshold: f32,

  /// 每帧最多输出的人脸数
  #[arg(long, default_value_t = 10, value_name = "COUNT")]
  pub max_results: usize,

  /// 判定佩戴状态时，较大置信度至少为较小置信度的倍数
  #[arg(long, default_value_t = 5.0, value_name = "RATIO")]
  pub margin: f32,
}

impl From<&DetectorArgs> for DetectorConfig {
  fn from(args: &DetectorArgs) -> Self {
    DetectorConfig::default()
      .min_confidence(args.min_confidence)
      .iou_threshold(args.iou_threshold)
      .max_results(args.max_results)
      .margin(args.margin)
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    detector: DetectorArgs,
  }

  #[test]
  fn defaults_match_detector_config() {
    let cli = Cli::parse_from(["kouzhao"]);
    assert_eq!(cli.detector.anchors.scheme(), "anchors");
    let config = DetectorConfig::from(&cli.detector);
    let default = DetectorConfig::default();
    assert_eq!(config.min_confidence, default.min_confidence);
    assert_eq!(config.iou_threshold, default.iou_threshold);
    assert_eq!(config.max_results, default.max_results);
    assert_eq!(config.margin, default.margin);
  }

  #[test]
  fn flags_override_defaults() {
    let cli = Cli::parse_from([
      "kouzhao",
      "--min-confidence",
      "0.5",
      "--max-results",
      "3",
      "--anchors",
      "anchors:///opt/anchors.json",
    ]);
    let config = DetectorConfig::from(&cli.detector);
    assert_eq!(config.min_confidence, 0.5);
    assert_eq!(config.max_results, 3);
    assert_eq!(cli.detector.anchors.path(), "/opt/anchors.json");
  }
}
