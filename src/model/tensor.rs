// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/tensor.rs - 推理输出张量及校验
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

pub const OUTPUT_BOUNDS: &str = "output_bounds";
pub const OUTPUT_SCORES: &str = "output_scores";
pub const BOUND_FEATURES: usize = 4;
pub const SCORE_FEATURES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
  Float32(Box<[f32]>),
  Float64(Box<[f64]>),
  UInt8(Box<[u8]>),
  Int8(Box<[i8]>),
}

impl TensorData {
  pub fn dtype(&self) -> &'static str {
    match self {
      TensorData::Float32(_) => "float32",
      TensorData::Float64(_) => "float64",
      TensorData::UInt8(_) => "uint8",
      TensorData::Int8(_) => "int8",
    }
  }

  pub fn len(&self) -> usize {
    match self {
      TensorData::Float32(data) => data.len(),
      TensorData::Float64(data) => data.len(),
      TensorData::UInt8(data) => data.len(),
      TensorData::Int8(data) => data.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// 推理引擎输出的一个具名张量
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
  pub name: String,
  pub shape: Vec<usize>,
  pub data: TensorData,
}

impl Tensor {
  pub fn new(name: impl Into<String>, shape: Vec<usize>, data: TensorData) -> Self {
    Self {
      name: name.into(),
      shape,
      data,
    }
  }

  pub fn from_f32(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self::new(name, shape, TensorData::Float32(data.into_boxed_slice()))
  }
}

/// 单张图像的原始推理输出：`output_bounds` 与 `output_scores`
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
  pub outputs: Vec<Tensor>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedOutputError {
  #[error("预期模型输出数量为 {expected}, 实际为 {actual}")]
  OutputCount { expected: usize, actual: usize },
  #[error("第 {index} 个输出应为 '{expected}', 实际为 '{actual}'")]
  OutputName {
    index: usize,
    expected: &'static str,
    actual: String,
  },
  #[error("输出 '{name}' 的数据类型应为 float32, 实际为 {dtype}")]
  DataType { name: String, dtype: &'static str },
  #[error("输出 '{name}' 的维度不受支持: {shape:?}")]
  Rank { name: String, shape: Vec<usize> },
  #[error("输出 '{name}' 的形状应为 [{rows}, {features}], 实际为 {shape:?}")]
  Shape {
    name: String,
    rows: usize,
    features: usize,
    shape: Vec<usize>,
  },
  #[error("输出 '{name}' 的数据长度应为 {expected}, 实际为 {actual}")]
  Length {
    name: String,
    expected: usize,
    actual: usize,
  },
}

impl RawOutput {
  pub fn new(bounds: Tensor, scores: Tensor) -> Self {
    Self {
      outputs: vec![bounds, scores],
    }
  }

  /// 以 `[N, 4]` 与 `[N, 2]` 的 float32 数据构造
  pub fn from_f32(anchors: usize, bounds: Vec<f32>, scores: Vec<f32>) -> Self {
    Self::new(
      Tensor::from_f32(OUTPUT_BOUNDS, vec![anchors, BOUND_FEATURES], bounds),
      Tensor::from_f32(OUTPUT_SCORES, vec![anchors, SCORE_FEATURES], scores),
    )
  }

  /// 校验输出数量、顺序、类型与形状，成功时返回逐锚框的只读视图
  pub fn validate(&self, anchors: usize) -> Result<OutputView<'_>, MalformedOutputError> {
    let [bounds, scores] = self.outputs.as_slice() else {
      return Err(MalformedOutputError::OutputCount {
        expected: 2,
        actual: self.outputs.len(),
      });
    };

    let bounds = checked_f32(0, bounds, OUTPUT_BOUNDS, anchors, BOUND_FEATURES)?;
    let scores = checked_f32(1, scores, OUTPUT_SCORES, anchors, SCORE_FEATURES)?;

    Ok(OutputView {
      bounds,
      scores,
      anchors,
    })
  }
}

fn checked_f32<'a>(
  index: usize,
  tensor: &'a Tensor,
  expected: &'static str,
  rows: usize,
  features: usize,
) -> Result<&'a [f32], MalformedOutputError> {
  if tensor.name != expected {
    return Err(MalformedOutputError::OutputName {
      index,
      expected,
      actual: tensor.name.clone(),
    });
  }

  let TensorData::Float32(data) = &tensor.data else {
    return Err(MalformedOutputError::DataType {
      name: tensor.name.clone(),
      dtype: tensor.data.dtype(),
    });
  };

  // 允许带批次维度 1 的 [1, N, k]
  let (actual_rows, actual_features) = match tensor.shape.as_slice() {
    &[r, f] | &[1, r, f] => (r, f),
    _ => {
      return Err(MalformedOutputError::Rank {
        name: tensor.name.clone(),
        shape: tensor.shape.clone(),
      });
    }
  };

  if actual_rows != rows || actual_features != features {
    return Err(MalformedOutputError::Shape {
      name: tensor.name.clone(),
      rows,
      features,
      shape: tensor.shape.clone(),
    });
  }

  if data.len() != rows * features {
    return Err(MalformedOutputError::Length {
      name: tensor.name.clone(),
      expected: rows * features,
      actual: data.len(),
    });
  }

  Ok(data)
}

/// 校验后的输出视图，按锚框下标访问，越界时返回 `None`
#[derive(Debug, Clone, Copy)]
pub struct OutputView<'a> {
  bounds: &'a [f32],
  scores: &'a [f32],
  anchors: usize,
}

impl<'a> OutputView<'a> {
  pub fn len(&self) -> usize {
    self.anchors
  }

  pub fn is_empty(&self) -> bool {
    self.anchors == 0
  }

  /// (mask, no_mask) 置信度
  pub fn scores(&self, index: usize) -> Option<(f32, f32)> {
    let start = index.checked_mul(SCORE_FEATURES)?;
    match self.scores.get(start..start + SCORE_FEATURES)? {
      &[mask, no_mask] => Some((mask, no_mask)),
      _ => None,
    }
  }

  /// 编码后的 (dx, dy, dw, dh)
  pub fn raw_bound(&self, index: usize) -> Option<[f32; 4]> {
    let start = index.checked_mul(BOUND_FEATURES)?;
    self
      .bounds
      .get(start..start + BOUND_FEATURES)?
      .try_into()
      .ok()
  }
}
