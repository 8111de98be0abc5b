// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/bin/kouzhao_oneshot.rs - 单张图像口罩检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use kouzhao::{
  FromUrl,
  args::DetectorArgs,
  frame::MASK_INPUT_SIZE,
  input::{ImageFileInput, ResizeMode, open_input},
  model::{AnchorTable, DetectorConfig, MaskDetector, RknnEngine, RknnEngineBuilder},
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

type MaskImageInput = ImageFileInput<MASK_INPUT_SIZE, MASK_INPUT_SIZE>;
type MaskRknnEngine = RknnEngine<MASK_INPUT_SIZE, MASK_INPUT_SIZE>;

/// 在 RKNPU 上对单张图像执行口罩检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型文件路径，`rknn:///path/to/mask.rknn`
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，`image:///path/to/photo.jpg`
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，`log:` 或 `jsonl:///path/to/detections.jsonl`
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,

  #[command(flatten)]
  pub detector: DetectorArgs,

  /// 非方形图像的处理方式：center_crop 或 stretch，覆盖输入 URL 中的 `resize` 参数
  #[arg(long, value_name = "MODE")]
  pub resize_mode: Option<ResizeMode>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let anchors = AnchorTable::from_url(&args.detector.anchors)?;
  let config = DetectorConfig::from(&args.detector);
  let engine: MaskRknnEngine = RknnEngineBuilder::from_url(&args.model)?.build()?;
  let model = MaskDetector::new(engine, anchors, config)?;

  let mut input: MaskImageInput = open_input(&args.input)?;
  if let Some(mode) = args.resize_mode {
    input = input.with_mode(mode);
  }
  let output = OutputWrapper::from_url(&args.output)?;

  OneShotTask.run_task(input.into_nhwc(), model, output)?;

  Ok(())
}
