// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/model/detector.rs - 口罩检测流水线
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

use std::convert::Infallible;

use tracing::{debug, error};

use crate::model::{
  DetectResult, Model,
  anchor::AnchorTable,
  candidate::build_candidates,
  config::{ConfigError, DetectorConfig},
  nms::non_max_suppression,
  tensor::{MalformedOutputError, RawOutput},
};

/// 推理引擎边界：输入固定尺寸的方形图像，输出 `output_bounds` 与 `output_scores`
pub trait InferenceEngine {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<RawOutput, Self::Error>;
}

/// 回放事先录制的推理输出，检测时直接借用输入
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayEngine;

/// 检测人脸并判断是否佩戴口罩
///
/// 除推理引擎外不持有可变状态，锚框表与参数在构造后只读，
/// 因此只要引擎允许，同一个检测器可以在多个线程中同时调用。
/// 每次调用都会阻塞直到推理完成，不应在对延迟敏感的线程上调用。
pub struct MaskDetector<E> {
  engine: E,
  anchors: AnchorTable,
  config: DetectorConfig,
}

impl<E> MaskDetector<E> {
  pub fn new(engine: E, anchors: AnchorTable, config: DetectorConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    debug!("检测器参数: {:?}, 锚框数量: {}", config, anchors.len());
    Ok(Self {
      engine,
      anchors,
      config,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn anchors(&self) -> &AnchorTable {
    &self.anchors
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// 校验、筛选并抑制，输出异常时返回错误
  pub fn try_detect_raw(&self, raw: &RawOutput) -> Result<DetectResult, MalformedOutputError> {
    let view = raw.validate(self.anchors.len())?;
    let candidates = build_candidates(&view, &self.anchors, &self.config);
    let items = non_max_suppression(
      candidates,
      self.config.iou_threshold,
      self.config.max_results,
    );
    debug!("检测到 {} 张人脸", items.len());
    Ok(DetectResult::from(items))
  }

  /// 输出异常时记录日志并返回空结果，单帧错误不会中断视频流
  pub fn detect_raw(&self, raw: &RawOutput) -> DetectResult {
    match self.try_detect_raw(raw) {
      Ok(result) => result,
      Err(e) => {
        error!("推理输出异常, 本帧无检测结果: {}", e);
        DetectResult::empty()
      }
    }
  }
}

impl<E: InferenceEngine> MaskDetector<E> {
  pub fn detect(&self, input: &E::Input) -> Result<DetectResult, E::Error> {
    let raw = self.engine.infer(input)?;
    Ok(self.detect_raw(&raw))
  }
}

impl Model for MaskDetector<ReplayEngine> {
  type Input = RawOutput;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Ok(self.detect_raw(input))
  }
}

impl<E: InferenceEngine> Model for MaskDetector<E> {
  type Input = E::Input;
  type Output = DetectResult;
  type Error = E::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(input)
  }
}
