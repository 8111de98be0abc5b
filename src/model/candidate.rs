// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/candidate.rs - 候选检测结果
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

use tracing::debug;

use crate::model::{
  DetectItem, MaskStatus, anchor::AnchorTable, config::DetectorConfig, decode::decode_bound,
  tensor::OutputView,
};

/// 按间隔倍数判定类别；两类置信度过于接近时返回 `None`
pub fn classify(mask_conf: f32, no_mask_conf: f32, margin: f32) -> Option<(MaskStatus, f32)> {
  if mask_conf > no_mask_conf * margin {
    Some((MaskStatus::Mask, mask_conf))
  } else if no_mask_conf > mask_conf * margin {
    Some((MaskStatus::NoMask, no_mask_conf))
  } else {
    None
  }
}

/// 逐锚框筛选置信度并解码，得到未经抑制的候选结果
pub fn build_candidates(
  view: &OutputView<'_>,
  anchors: &AnchorTable,
  config: &DetectorConfig,
) -> Vec<DetectItem> {
  let mut items = Vec::new();
  let mut ambiguous = 0usize;

  for (idx, anchor) in anchors.iter().enumerate().take(view.len()) {
    let Some((mask_conf, no_mask_conf)) = view.scores(idx) else {
      continue;
    };

    // NaN 不会通过比较，直接跳过
    if !(mask_conf.max(no_mask_conf) > config.min_confidence) {
      continue;
    }

    let Some(raw) = view.raw_bound(idx) else {
      continue;
    };
    let bound = decode_bound(anchor, raw);

    match classify(mask_conf, no_mask_conf, config.margin) {
      Some((kind, score)) => items.push(DetectItem { kind, score, bound }),
      None => ambiguous += 1,
    }
  }

  debug!(
    "候选结果 {} 个, 因类别置信度接近而丢弃 {} 个",
    items.len(),
    ambiguous
  );

  items
}
