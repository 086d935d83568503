// 该文件是 Paizhao （牌照） 项目的一部分。
// src/segmenter.rs - 字符分割适配器
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

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  geometry::suppress_overlaps,
  model::{Detection, SegmentModel, normalize_score},
};

#[derive(Error, Debug)]
pub enum SegmentationError {
  #[error("字符分割模型推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 字符分割器，坐标系为车牌裁剪图
pub struct CharSegmenter<M> {
  model: M,
  min_score: f32,
  iou_threshold: f32,
  /// 低于车牌高度该比例的字符框视为噪声
  min_height_ratio: f32,
}

impl<M> CharSegmenter<M> {
  pub fn new(model: M, min_score: f32, iou_threshold: f32, min_height_ratio: f32) -> Self {
    Self {
      model,
      min_score,
      iou_threshold,
      min_height_ratio,
    }
  }

  pub fn model(&self) -> &M {
    &self.model
  }
}

impl<M> CharSegmenter<M>
where
  M: SegmentModel,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn segment_characters(&self, plate: &RgbImage) -> Result<Vec<Detection>, SegmentationError> {
    let raw = self
      .model
      .infer(plate)
      .map_err(|e| SegmentationError::Inference(Box::new(e)))?;

    let (width, height) = plate.dimensions();
    let min_height = height as f32 * self.min_height_ratio;
    let candidates: Vec<Detection> = raw
      .into_iter()
      .filter_map(|det| {
        let score = normalize_score(det.score)?;
        let bbox = det.bbox.clamp_to(width, height)?;
        (score >= self.min_score && bbox.height as f32 >= min_height)
          .then_some(Detection::new(bbox, score))
      })
      .collect();

    let chars = suppress_overlaps(candidates, self.iou_threshold);
    debug!("车牌 {}x{} 分割出 {} 个字符", width, height, chars.len());

    Ok(chars)
  }
}
