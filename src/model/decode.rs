// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/decode.rs - 锚框解码
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

use crate::model::{Bound, anchor::Anchor};

/// 中心偏移的缩放系数，与训练时一致，不可调
pub const CENTER_VARIANCE: f64 = 0.1;
/// 宽高对数比例的缩放系数，与训练时一致，不可调
pub const SIZE_VARIANCE: f64 = 0.2;

/// 根据锚框解码模型输出的 (dx, dy, dw, dh)
///
/// 前两个分量是相对锚框中心的偏移，后两个分量是目标框与锚框尺寸之比的对数。
pub fn decode_bound(anchor: &Anchor, raw: [f32; 4]) -> Bound {
  let [dx, dy, dw, dh] = raw.map(f64::from);

  let anchor_w = anchor.width();
  let anchor_h = anchor.height();
  let anchor_cx = anchor.x_min + 0.5 * anchor_w;
  let anchor_cy = anchor.y_min + 0.5 * anchor_h;

  let cx = dx * CENTER_VARIANCE * anchor_w + anchor_cx;
  let cy = dy * CENTER_VARIANCE * anchor_h + anchor_cy;
  let w = (dw * SIZE_VARIANCE).exp() * anchor_w;
  let h = (dh * SIZE_VARIANCE).exp() * anchor_h;

  Bound::new(
    (cx - w / 2.0) as f32,
    (cy - h / 2.0) as f32,
    w as f32,
    h as f32,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_offset_returns_anchor() {
    let anchor = Anchor::new(0.25, 0.125, 0.75, 0.625);
    let bound = decode_bound(&anchor, [0.0; 4]);
    assert_eq!(bound, Bound::new(0.25, 0.125, 0.5, 0.5));
  }

  #[test]
  fn width_grows_with_dw() {
    let anchor = Anchor::new(0.1, 0.2, 0.3, 0.5);
    let widths: Vec<f32> = (-6..=10)
      .map(|step| decode_bound(&anchor, [0.0, 0.0, step as f32 * 0.5, 0.0]).width)
      .collect();
    for pair in widths.windows(2) {
      assert!(pair[1] > pair[0], "{:?}", widths);
    }
  }

  #[test]
  fn offsets_scale_with_anchor_size() {
    let anchor = Anchor::new(0.0, 0.0, 0.5, 0.25);
    // dx = 1 平移 0.1 倍锚框宽度
    let bound = decode_bound(&anchor, [1.0, 2.0, 0.0, 0.0]);
    assert!((bound.x - 0.05).abs() < 1e-6);
    assert!((bound.y - 0.05).abs() < 1e-6);
    assert!((bound.width - 0.5).abs() < 1e-6);
    assert!((bound.height - 0.25).abs() < 1e-6);
  }

  #[test]
  fn size_uses_exponential_scale() {
    let anchor = Anchor::new(0.4, 0.4, 0.6, 0.6);
    let bound = decode_bound(&anchor, [0.0, 0.0, 5.0, -5.0]);
    let e = std::f32::consts::E;
    assert!((bound.width - 0.2 * e).abs() < 1e-5);
    assert!((bound.height - 0.2 / e).abs() < 1e-5);
    // 中心保持不变
    assert!((bound.x + bound.width / 2.0 - 0.5).abs() < 1e-6);
  }
}
