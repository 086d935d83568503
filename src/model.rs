// 该文件是 Paizhao （牌照） 项目的一部分。
// src/model.rs - 模型能力接口与推理结果
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{fmt, str::FromStr};

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{BoundingBox, HasBoundingBox};

/// 模型能力接口
///
/// 车牌检测、字符分割与字符识别三个模型都通过该接口接入，
/// 具体后端在启动时注入。实现需保证 `infer` 可被多个线程同时调用。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 车牌检测模型：整幅图像 -> 车牌区域
pub trait PlateModel: Model<Input = RgbImage, Output = Vec<Detection>> {}
impl<M: Model<Input = RgbImage, Output = Vec<Detection>>> PlateModel for M {}

/// 字符分割模型：车牌裁剪图 -> 字符区域
pub trait SegmentModel: Model<Input = RgbImage, Output = Vec<Detection>> {}
impl<M: Model<Input = RgbImage, Output = Vec<Detection>>> SegmentModel for M {}

/// 字符识别模型：字符裁剪图 -> 字符类别
pub trait CharModel: Model<Input = RgbImage, Output = CharClass> {}
impl<M: Model<Input = RgbImage, Output = CharClass>> CharModel for M {}

/// 检测或分割阶段输出的一个区域
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub bbox: BoundingBox,
  /// 该阶段自身的置信度，尚未融合
  pub score: f32,
}

impl Detection {
  pub fn new(bbox: BoundingBox, score: f32) -> Self {
    Self { bbox, score }
  }
}

impl HasBoundingBox for Detection {
  fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }
}

/// 字符识别模型的原始输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharClass {
  pub label: char,
  pub score: f32,
}

/// 一个已识别的字符，边界框相对于车牌裁剪图
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacterPrediction {
  pub bbox: BoundingBox,
  pub label: char,
  pub score: f32,
}

impl HasBoundingBox for CharacterPrediction {
  fn bbox(&self) -> &BoundingBox {
    &self.bbox
  }
}

/// 推理设备句柄
///
/// 仅作为不透明的标识随模型一起传递，设备选择策略由调用方负责。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Device {
  #[default]
  Cpu,
  Cuda(u32),
  Npu(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceParseError {
  #[error("未知的设备类型: {0}")]
  UnknownKind(String),
  #[error("设备编号无效: {0}")]
  InvalidIndex(String),
}

impl FromStr for Device {
  type Err = DeviceParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_ascii_lowercase();
    let (kind, index) = match lower.split_once(':') {
      Some((kind, index)) => {
        let index = index
          .parse::<u32>()
          .map_err(|_| DeviceParseError::InvalidIndex(index.to_string()))?;
        (kind.to_string(), index)
      }
      None => (lower, 0),
    };

    match kind.as_str() {
      "cpu" => Ok(Device::Cpu),
      "cuda" | "gpu" => Ok(Device::Cuda(index)),
      "npu" | "rknpu" => Ok(Device::Npu(index)),
      _ => Err(DeviceParseError::UnknownKind(kind)),
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Device::Cpu => write!(f, "cpu"),
      Device::Cuda(id) => write!(f, "cuda:{}", id),
      Device::Npu(id) => write!(f, "npu:{}", id),
    }
  }
}

/// 将模型给出的分数规整到 `[0, 1]`，NaN 返回 `None`
pub(crate) fn normalize_score(score: f32) -> Option<f32> {
  if score.is_nan() {
    None
  } else {
    Some(score.clamp(0.0, 1.0))
  }
}
