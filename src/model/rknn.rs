// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/rknn.rs - RKNN 推理引擎
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

use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::AsNhwcFrame,
  model::{
    detector::InferenceEngine,
    tensor::{BOUND_FEATURES, OUTPUT_BOUNDS, OUTPUT_SCORES, RawOutput, Tensor},
  },
};

const MASK_NUM_INPUTS: u32 = 1;
const MASK_NUM_OUTPUTS: u32 = 2;

#[derive(Error, Debug)]
pub enum RknnEngineError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl RknnEngineError {
  fn invalid(msg: &str, e: rknpu::Error) -> Self {
    RknnEngineError::ModelInvalid(msg.to_string(), e)
  }
}

/// 在 RKNPU 上运行口罩检测模型
///
/// `bounds_index` 与 `scores_index` 是两个输出在 RKNN 模型中的下标，
/// 转换工具不保证输出顺序，因此可通过 URL 参数调整。
pub struct RknnEngine<const W: u32, const H: u32> {
  context: Context,
  bounds_index: usize,
  scores_index: usize,
}

pub struct RknnEngineBuilder {
  model_path: String,
  flags: InitFlags,
  bounds_index: usize,
  scores_index: usize,
}

impl FromUrlWithScheme for RknnEngineBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnEngineBuilder {
  type Error = RknnEngineError;

  /// `rknn:///path/to/mask.rknn?bounds=0&scores=1`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(RknnEngineError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = RknnEngineBuilder {
      model_path: url.path().to_string(),
      flags: InitFlags::default(),
      bounds_index: 0,
      scores_index: 1,
    };

    for (k, v) in url.query_pairs() {
      let index = v
        .parse::<usize>()
        .map_err(|_| RknnEngineError::ModelPathError(format!("无效的输出下标 {}={}", k, v)))?;
      match k.as_ref() {
        "bounds" => builder.bounds_index = index,
        "scores" => builder.scores_index = index,
        _ => debug!("忽略未知参数: {}", k),
      }
    }

    if builder.bounds_index == builder.scores_index
      || builder.bounds_index >= MASK_NUM_OUTPUTS as usize
      || builder.scores_index >= MASK_NUM_OUTPUTS as usize
    {
      return Err(RknnEngineError::ModelPathError(format!(
        "输出下标无效: bounds={}, scores={}",
        builder.bounds_index, builder.scores_index
      )));
    }

    Ok(builder)
  }
}

impl RknnEngineBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn build<const W: u32, const H: u32>(self) -> Result<RknnEngine<W, H>, RknnEngineError> {
    info!("加载模型文件: {}", self.model_path);
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;
    info!("模型加载完成");

    let num_inputs = context
      .num_inputs()
      .map_err(|e| RknnEngineError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| RknnEngineError::invalid("无法获取输出数量", e))?;

    if num_inputs != MASK_NUM_INPUTS || num_outputs != MASK_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        MASK_NUM_INPUTS, MASK_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(RknnEngineError::invalid(&msg, rknpu::Error::InvalidModel));
    }

    Ok(RknnEngine {
      context,
      bounds_index: self.bounds_index,
      scores_index: self.scores_index,
    })
  }
}

/// 由扁平输出恢复 `[1, N, k]` 形状
///
/// 行数 N 取自 `output_bounds`（每行 4 个值），`output_scores` 的特征数再按 N 推出，
/// 因此置信度输出的特征布局不对时，校验报告的是特征数而不是行数。
/// 两个输出同时错位、但行数恰好一致的情况无法从扁平长度中区分，只能依赖锚框数量校验。
fn tensors_from_flat(bounds: Vec<f32>, scores: Vec<f32>) -> RawOutput {
  let rows = (bounds.len() % BOUND_FEATURES == 0).then(|| bounds.len() / BOUND_FEATURES);
  let shape_of = |len: usize, rows: Option<usize>| match rows {
    Some(rows) if rows > 0 && len % rows == 0 => vec![1, rows, len / rows],
    _ => vec![len],
  };

  let bounds_shape = shape_of(bounds.len(), rows);
  let scores_shape = shape_of(scores.len(), rows);
  RawOutput::new(
    Tensor::from_f32(OUTPUT_BOUNDS, bounds_shape, bounds),
    Tensor::from_f32(OUTPUT_SCORES, scores_shape, scores),
  )
}

impl<const W: u32, const H: u32> InferenceEngine for RknnEngine<W, H> {
  type Input = RgbNhwcFrame<W, H>;
  type Error = RknnEngineError;

  fn infer(&self, input: &Self::Input) -> Result<RawOutput, Self::Error> {
    debug!("设置模型输入");
    self.context.set_input(
      0,
      input.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    self.context.run()?;

    debug!("获取模型输出");
    let output = self.context.get_outputs()?;
    let bounds = output.get_f32(self.bounds_index)?.to_vec();
    let scores = output.get_f32(self.scores_index)?.to_vec();
    debug!(
      "输出大小: bounds={}, scores={}",
      bounds.len(),
      scores.len()
    );

    Ok(tensors_from_flat(bounds, scores))
  }
}
