// 该文件是 Kouzhao（口罩检测）项目的一部分。
// src/input/tensor_dump.rs - 录制的推理输出回放
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

use std::{
  fs::File,
  io::{BufRead, BufReader, Lines},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{RawOutput, Tensor, TensorData},
};

#[derive(Error, Debug)]
pub enum TensorDumpInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    source: serde_json::Error,
  },
  #[error("第 {line} 行包含不支持的数据类型: {dtype}")]
  DataType { line: usize, dtype: String },
  #[error("第 {line} 行输出 '{name}' 的数值超出 {dtype} 范围")]
  OutOfRange {
    line: usize,
    name: String,
    dtype: &'static str,
  },
}

#[derive(Deserialize)]
struct TensorRecord {
  name: String,
  shape: Vec<usize>,
  dtype: String,
  data: Vec<f64>,
}

#[derive(Deserialize)]
struct FrameRecord {
  outputs: Vec<TensorRecord>,
}

/// 逐行读取 JSON 格式的推理输出，每行对应一帧
///
/// 按需解析，无法解析的行记录日志后跳过，不会中断后续帧。
pub struct TensorDumpInput<R = BufReader<File>> {
  lines: Lines<R>,
  line_no: usize,
}

impl FromUrlWithScheme for TensorDumpInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorDumpInput {
  type Error = TensorDumpInputError;

  /// `tensor:///path/to/outputs.jsonl`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorDumpInputError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("读取推理输出记录: {}", url.path());
    let file = File::open(url.path())?;
    Ok(Self::from_reader(BufReader::new(file)))
  }
}

impl<R: BufRead> TensorDumpInput<R> {
  pub fn from_reader(reader: R) -> Self {
    Self {
      lines: reader.lines(),
      line_no: 0,
    }
  }
}

/// 解析一行记录
fn parse_frame(line_no: usize, line: &str) -> Result<RawOutput, TensorDumpInputError> {
  let record: FrameRecord =
    serde_json::from_str(line).map_err(|source| TensorDumpInputError::ParseError {
      line: line_no,
      source,
    })?;

  let outputs = record
    .outputs
    .into_iter()
    .map(|tensor| to_tensor(line_no, tensor))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(RawOutput { outputs })
}

fn to_integers<T: TryFrom<i64>>(
  line: usize,
  name: &str,
  dtype: &'static str,
  data: &[f64],
) -> Result<Box<[T]>, TensorDumpInputError> {
  data
    .iter()
    .map(|&v| {
      let out_of_range = || TensorDumpInputError::OutOfRange {
        line,
        name: name.to_string(),
        dtype,
      };
      if v.fract() != 0.0 || !v.is_finite() {
        return Err(out_of_range());
      }
      T::try_from(v as i64).map_err(|_| out_of_range())
    })
    .collect()
}

fn to_tensor(line: usize, record: TensorRecord) -> Result<Tensor, TensorDumpInputError> {
  let TensorRecord {
    name,
    shape,
    dtype,
    data,
  } = record;

  let data = match dtype.as_str() {
    "float32" => TensorData::Float32(data.iter().map(|&v| v as f32).collect()),
    "float64" => TensorData::Float64(data.into_boxed_slice()),
    "uint8" => TensorData::UInt8(to_integers(line, &name, "uint8", &data)?),
    "int8" => TensorData::Int8(to_integers(line, &name, "int8", &data)?),
    _ => {
      return Err(TensorDumpInputError::DataType {
        line,
        dtype: dtype.clone(),
      });
    }
  };

  Ok(Tensor::new(name, shape, data))
}

impl<R: BufRead> Iterator for TensorDumpInput<R> {
  type Item = RawOutput;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      self.line_no += 1;
      let line = match self.lines.next()? {
        Ok(line) => line,
        Err(e) => {
          error!("第 {} 行读取失败, 停止回放: {}", self.line_no, e);
          return None;
        }
      };
      if line.trim().is_empty() {
        continue;
      }

      match parse_frame(self.line_no, &line) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("跳过无效记录: {}", e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::model::tensor::{OUTPUT_BOUNDS, OUTPUT_SCORES};

  const FRAME: &str = r#"{"outputs":[{"name":"output_bounds","shape":[1,1,4],"dtype":"float32","data":[0,0,0,0]},{"name":"output_scores","shape":[1,1,2],"dtype":"float32","data":[0.9,0.1]}]}"#;

  #[test]
  fn reads_one_frame_per_line() {
    let payload = format!("{}\n\n{}\n", FRAME, FRAME);
    let frames: Vec<_> = TensorDumpInput::from_reader(Cursor::new(payload)).collect();
    assert_eq!(frames.len(), 2);
    let outputs = &frames[0].outputs;
    assert_eq!(outputs[0].name, OUTPUT_BOUNDS);
    assert_eq!(outputs[1].name, OUTPUT_SCORES);
    assert_eq!(outputs[1].shape, vec![1, 1, 2]);
    assert_eq!(
      outputs[1].data,
      TensorData::Float32(vec![0.9f32, 0.1].into_boxed_slice())
    );
  }

  #[test]
  fn keeps_integer_types_for_validation() {
    let payload = r#"{"outputs":[{"name":"output_scores","shape":[2],"dtype":"uint8","data":[0,255]}]}"#;
    let frames: Vec<_> = TensorDumpInput::from_reader(Cursor::new(payload)).collect();
    assert_eq!(frames[0].outputs[0].data.dtype(), "uint8");
  }

  #[test]
  fn reports_line_of_bad_record() {
    assert!(matches!(
      parse_frame(2, r#"{"outputs": 3}"#),
      Err(TensorDumpInputError::ParseError { line: 2, .. })
    ));
    assert!(matches!(
      parse_frame(
        1,
        r#"{"outputs":[{"name":"x","shape":[1],"dtype":"int8","data":[300]}]}"#
      ),
      Err(TensorDumpInputError::OutOfRange { line: 1, .. })
    ));
    assert!(matches!(
      parse_frame(
        7,
        r#"{"outputs":[{"name":"x","shape":[1],"dtype":"bfloat16","data":[1]}]}"#
      ),
      Err(TensorDumpInputError::DataType { line: 7, .. })
    ));
  }

  #[test]
  fn skips_bad_lines_and_keeps_good_frames() {
    let bad_type = r#"{"outputs":[{"name":"x","shape":[1],"dtype":"bfloat16","data":[1]}]}"#;
    let mut payload = String::new();
    for _ in 0..50 {
      payload.push_str(FRAME);
      payload.push('\n');
    }
    payload.push_str("{\"outputs\": [\n");
    payload.push_str(bad_type);
    payload.push('\n');
    for _ in 0..50 {
      payload.push_str(FRAME);
      payload.push('\n');
    }
    // 录制中断时最后一行通常被截断
    payload.push_str(&FRAME[..40]);

    let frames: Vec<_> = TensorDumpInput::from_reader(Cursor::new(payload)).collect();
    assert_eq!(frames.len(), 100);
  }

  #[test]
  fn parses_lazily() {
    let payload = format!("{}\nnot json\n{}\n", FRAME, FRAME);
    let mut input = TensorDumpInput::from_reader(Cursor::new(payload));
    assert!(input.next().is_some());
    assert_eq!(input.line_no, 1);
    assert!(input.next().is_some());
    assert_eq!(input.line_no, 3);
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("tensor://{}/none.jsonl", dir.path().display())).unwrap();
    assert!(matches!(
      TensorDumpInput::from_url(&url),
      Err(TensorDumpInputError::IoError(_))
    ));
  }
}
