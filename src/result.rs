// 该文件是 Paizhao （牌照） 项目的一部分。
// src/result.rs - 车牌识别结果
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

use serde::{Serialize, Serializer};

use crate::{geometry::BoundingBox, model::CharacterPrediction, output::EncodedImage};

/// 单个车牌的识别结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateResult {
  /// 车牌在原图中的位置
  pub plate_box: BoundingBox,
  /// 车牌检测置信度
  #[serde(serialize_with = "serialize_rounded")]
  pub plate_score: f32,
  /// 从左到右拼接的车牌文本
  pub final_text: String,
  /// 融合后的置信度
  #[serde(serialize_with = "serialize_rounded")]
  pub confidence: f32,
  /// 按文本顺序排列的字符，边界框相对于车牌裁剪图
  pub characters: Vec<CharacterPrediction>,
  pub annotated_image: EncodedImage,
  pub original_plate: EncodedImage,
  pub digital_plate: Option<EncodedImage>,
  /// 按字符底边倾斜角校正后的裁剪图，少于两个字符时为空
  pub deskewed_plate: Option<EncodedImage>,
}

impl PlateResult {
  pub fn is_readable(&self) -> bool {
    !self.final_text.is_empty()
  }
}

fn serialize_rounded<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_f64((*value as f64 * 1000.0).round() / 1000.0)
}

/// 将结果序列转换为 JSON 记录数组
pub fn to_json_records(results: &[PlateResult]) -> Result<serde_json::Value, serde_json::Error> {
  serde_json::to_value(results)
}
