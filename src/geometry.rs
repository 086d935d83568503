// 该文件是 Paizhao （牌照） 项目的一部分。
// src/geometry.rs - 几何工具：边界框、裁剪、非极大值抑制、排序与倾斜校正
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

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Detection;

/// 像素坐标下的边界框，坐标相对于其父图像
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
  /// 左上角 x 坐标
  pub x: u32,
  /// 左上角 y 坐标
  pub y: u32,
  /// 宽度
  pub width: u32,
  /// 高度
  pub height: u32,
}

impl BoundingBox {
  pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn right(&self) -> u32 {
    self.x.saturating_add(self.width)
  }

  pub fn bottom(&self) -> u32 {
    self.y.saturating_add(self.height)
  }

  pub fn area(&self) -> u64 {
    self.width as u64 * self.height as u64
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 将边界框限制在 `width` x `height` 的父图像范围内，
  /// 若两者没有交集则返回 `None`
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
    let x0 = self.x.min(width);
    let y0 = self.y.min(height);
    let x1 = self.right().min(width);
    let y1 = self.bottom().min(height);

    if x1 <= x0 || y1 <= y0 {
      return None;
    }

    Some(BoundingBox::new(x0, y0, x1 - x0, y1 - y0))
  }

  /// 计算两个边界框的 IoU
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    let intersection = if x2 > x1 && y2 > y1 {
      (x2 - x1) as f64 * (y2 - y1) as f64
    } else {
      0.0
    };
    let union = self.area() as f64 + other.area() as f64 - intersection;

    if union > 0.0 {
      (intersection / union) as f32
    } else {
      0.0
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
  #[error("裁剪区域 {bbox:?} 与图像 {width}x{height} 无交集")]
  OutOfBounds {
    bbox: BoundingBox,
    width: u32,
    height: u32,
  },
}

/// 携带边界框的值，用于排序
pub trait HasBoundingBox {
  fn bbox(&self) -> &BoundingBox;
}

impl HasBoundingBox for BoundingBox {
  fn bbox(&self) -> &BoundingBox {
    self
  }
}

/// 从图像中裁剪出 `bbox` 所在的区域，超出图像的部分会被截断
pub fn crop(image: &RgbImage, bbox: &BoundingBox) -> Result<RgbImage, GeometryError> {
  let (width, height) = image.dimensions();
  let region = bbox
    .clamp_to(width, height)
    .ok_or(GeometryError::OutOfBounds {
      bbox: *bbox,
      width,
      height,
    })?;

  Ok(
    image::imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image(),
  )
}

/// 贪心非极大值抑制
///
/// 按置信度降序处理（同分时保持输入顺序），与任一已保留框的 IoU
/// 大于 `iou_threshold` 的候选框被丢弃。
pub fn suppress_overlaps(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  let mut sorted = detections;
  // sort_by 是稳定排序
  sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Detection> = Vec::with_capacity(sorted.len());
  for candidate in sorted {
    if kept
      .iter()
      .all(|k| k.bbox.iou(&candidate.bbox) <= iou_threshold)
    {
      kept.push(candidate);
    }
  }

  kept
}

/// 按左边缘 x 坐标从左到右排序
///
/// 左边缘相距不超过 `tolerance` 像素的一组框视为同一列，组内保持输入顺序。
/// 分组只取决于 x 坐标的取值，因此该函数是幂等的。
pub fn order_left_to_right<T: HasBoundingBox>(items: Vec<T>, tolerance: u32) -> Vec<T> {
  let mut indexed: Vec<(usize, T)> = items.into_iter().enumerate().collect();
  indexed.sort_by_key(|(_, item)| item.bbox().x);

  let mut ordered = Vec::with_capacity(indexed.len());
  let mut group: Vec<(usize, T)> = Vec::new();
  let mut anchor = 0u32;

  for entry in indexed {
    let x = entry.1.bbox().x;
    if !group.is_empty() && x - anchor > tolerance {
      flush_group(&mut group, &mut ordered);
    }
    if group.is_empty() {
      anchor = x;
    }
    group.push(entry);
  }
  flush_group(&mut group, &mut ordered);

  ordered
}

fn flush_group<T>(group: &mut Vec<(usize, T)>, ordered: &mut Vec<T>) {
  group.sort_by_key(|(index, _)| *index);
  ordered.extend(group.drain(..).map(|(_, item)| item));
}

/// 最大校正角度（弧度），约 30 度
pub const MAX_SKEW: f32 = std::f32::consts::FRAC_PI_6;

/// 估计字符行的倾斜角度（弧度，顺时针为正）
///
/// 对各字符框底边中点做最小二乘直线拟合，取斜率的反正切。
/// 少于两个字符或所有字符中心 x 相同时无法估计，返回 `None`。
pub fn estimate_skew<T: HasBoundingBox>(items: &[T]) -> Option<f32> {
  if items.len() < 2 {
    return None;
  }

  let points: Vec<(f64, f64)> = items
    .iter()
    .map(|item| {
      let b = item.bbox();
      (b.x as f64 + b.width as f64 / 2.0, b.bottom() as f64)
    })
    .collect();
  let n = points.len() as f64;
  let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
  let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

  let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(x, y)| {
    let dx = x - mean_x;
    (sxy + dx * (y - mean_y), sxx + dx * dx)
  });
  if sxx <= f64::EPSILON {
    return None;
  }

  let angle = (sxy / sxx).atan() as f32;
  Some(angle.clamp(-MAX_SKEW, MAX_SKEW))
}

/// 按估计的倾斜角度反向旋转车牌裁剪图，输出与输入同尺寸
///
/// 角度可忽略时直接返回副本。
pub fn deskew(plate: &RgbImage, skew: f32) -> RgbImage {
  if skew.abs() < 1e-3 {
    return plate.clone();
  }
  rotate_about_center(plate, -skew, Interpolation::Bilinear, Rgb([0, 0, 0]))
}
