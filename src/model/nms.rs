// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::model::{Bound, DetectItem};

/// 与已保留结果的重叠是否达到阈值；交集为 0 的一对永远不会互相抑制
fn has_overlap<T>(bound: &Bound, kept: &[DetectItem<T>], iou_threshold: f32) -> bool {
  let area = bound.area();
  kept.iter().any(|other| {
    let intersection = bound.intersection_area(&other.bound);
    if intersection > 0.0 {
      let union = area + other.bound.area() - intersection;
      intersection / union >= iou_threshold
    } else {
      false
    }
  })
}

/// 按置信度降序贪心保留，保留数量达到 `max_results` 时停止
pub fn non_max_suppression<T>(
  mut items: Vec<DetectItem<T>>,
  iou_threshold: f32,
  max_results: usize,
) -> Vec<DetectItem<T>> {
  items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept: Vec<DetectItem<T>> = Vec::with_capacity(max_results.min(items.len()));
  for item in items {
    if kept.len() >= max_results {
      break;
    }
    if !has_overlap(&item.bound, &kept, iou_threshold) {
      kept.push(item);
    }
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::MaskStatus;

  fn item(score: f32, x: f32, y: f32) -> DetectItem {
    DetectItem {
      kind: MaskStatus::Mask,
      score,
      bound: Bound::new(x, y, 0.2, 0.2),
    }
  }

  #[test]
  fn suppresses_by_threshold() {
    // 两个框横向错开 0.2 / 3，IoU = 0.5
    let offset = 0.2 / 3.0;
    let candidates = vec![item(0.85, offset, 0.0), item(0.95, 0.0, 0.0)];
    let iou = candidates[0].bound.iou(&candidates[1].bound);
    assert!((iou - 0.5).abs() < 1e-4);

    let kept = non_max_suppression(candidates.clone(), 0.2, 10);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, 0.95);

    let kept = non_max_suppression(candidates, 0.6, 10);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].score, 0.95);
  }

  #[test]
  fn caps_results_by_confidence() {
    let candidates: Vec<_> = (0..8)
      .map(|i| item(0.5 + i as f32 * 0.05, i as f32 * 0.3, 0.0))
      .collect();
    let kept = non_max_suppression(candidates, 0.2, 3);
    let scores: Vec<f32> = kept.iter().map(|k| k.score).collect();
    assert_eq!(scores.len(), 3);
    assert!((scores[0] - 0.85).abs() < 1e-6);
    assert!((scores[1] - 0.80).abs() < 1e-6);
    assert!((scores[2] - 0.75).abs() < 1e-6);
  }

  #[test]
  fn idempotent_on_own_output() {
    let candidates = vec![
      item(0.9, 0.0, 0.0),
      item(0.8, 0.05, 0.05),
      item(0.7, 0.5, 0.5),
      item(0.6, 0.52, 0.5),
      item(0.99, 0.8, 0.0),
    ];
    let once = non_max_suppression(candidates, 0.3, 10);
    let twice = non_max_suppression(once.clone(), 0.3, 10);
    assert_eq!(once, twice);
  }

  #[test]
  fn zero_threshold_only_blocks_real_overlap() {
    let touching = vec![item(0.9, 0.0, 0.0), item(0.8, 0.2, 0.0)];
    assert_eq!(non_max_suppression(touching, 0.0, 10).len(), 2);

    let overlapping = vec![item(0.9, 0.0, 0.0), item(0.8, 0.19, 0.0)];
    assert_eq!(non_max_suppression(overlapping, 0.0, 10).len(), 1);
  }

  #[test]
  fn empty_input() {
    let kept: Vec<DetectItem> = non_max_suppression(Vec::new(), 0.2, 10);
    assert!(kept.is_empty());
  }
}
