// 该文件是 Paizhao （牌照） 项目的一部分。
// src/assembler.rs - 车牌组装：分割、识别、排序与置信度融合
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
use tracing::{debug, warn};

use crate::{
  geometry::{self, GeometryError, deskew, estimate_skew, order_left_to_right},
  model::{CharModel, CharacterPrediction, Detection, SegmentModel},
  output::{Draw, EncodedImage},
  recognizer::CharRecognizer,
  result::PlateResult,
  segmenter::CharSegmenter,
};

#[derive(Error, Debug)]
pub enum PlateError {
  #[error("车牌区域无效: {0}")]
  Geometry(#[from] GeometryError),
  #[error("标注图像编码失败: {0}")]
  Encode(#[from] image::ImageError),
}

/// 融合车牌检测分数与字符识别分数
///
/// 有字符时为 `plate_score * mean(char_scores)`，否则为 `plate_score`，
/// 结果限制在 `[0, 1]`。分数先排序再求和，结果与字符顺序无关。
pub fn fuse_confidence(plate_score: f32, char_scores: &[f32]) -> f32 {
  if char_scores.is_empty() {
    return plate_score.clamp(0.0, 1.0);
  }

  let mut sorted = char_scores.to_vec();
  sorted.sort_by(f32::total_cmp);
  let mean = sorted.iter().map(|&s| s as f64).sum::<f64>() / sorted.len() as f64;

  ((plate_score as f64 * mean) as f32).clamp(0.0, 1.0)
}

/// 对单个车牌驱动分割与识别，产出一个 [`PlateResult`]
pub struct PlateAssembler {
  order_tolerance: u32,
  draw: Draw,
}

impl PlateAssembler {
  pub fn new(order_tolerance: u32, draw: Draw) -> Self {
    Self {
      order_tolerance,
      draw,
    }
  }

  pub fn assemble<S, R>(
    &self,
    image: &RgbImage,
    plate: &Detection,
    segmenter: &CharSegmenter<S>,
    recognizer: &CharRecognizer<R>,
  ) -> Result<PlateResult, PlateError>
  where
    S: SegmentModel,
    S::Error: std::error::Error + Send + Sync + 'static,
    R: CharModel,
    R::Error: std::fmt::Display,
  {
    let plate_crop = geometry::crop(image, &plate.bbox)?;

    let segments = segmenter
      .segment_characters(&plate_crop)
      .unwrap_or_else(|e| {
        warn!("车牌 {:?} 字符分割失败，按无字符处理: {}", plate.bbox, e);
        Vec::new()
      });

    let characters: Vec<CharacterPrediction> =
      order_left_to_right(segments, self.order_tolerance)
        .into_iter()
        .map(|segment| match geometry::crop(&plate_crop, &segment.bbox) {
          Ok(char_crop) => recognizer.recognize(&char_crop, segment.bbox),
          Err(e) => {
            warn!("字符裁剪失败，使用占位符: {}", e);
            recognizer.placeholder_at(segment.bbox)
          }
        })
        .collect();

    let final_text: String = characters.iter().map(|c| c.label).collect();
    let scores: Vec<f32> = characters.iter().map(|c| c.score).collect();
    let confidence = fuse_confidence(plate.score, &scores);
    debug!(
      "车牌 {:?}: 文本 '{}', 检测置信度 {:.3}, 融合置信度 {:.3}",
      plate.bbox, final_text, plate.score, confidence
    );

    let label = if final_text.is_empty() {
      format!("{:.2}", confidence)
    } else {
      format!("{} {:.2}", final_text, confidence)
    };
    let annotated = self.draw.annotate_plate(&plate_crop, &characters, &label);
    let digital_plate = self
      .draw
      .render_digital_plate(&final_text)
      .map(|image| EncodedImage::encode_png(&image))
      .transpose()?;
    let deskewed_plate = estimate_skew(&characters)
      .map(|skew| {
        debug!("车牌 {:?} 倾斜角 {:.2}°", plate.bbox, skew.to_degrees());
        EncodedImage::encode_png(&deskew(&plate_crop, skew))
      })
      .transpose()?;

    Ok(PlateResult {
      plate_box: plate.bbox,
      plate_score: plate.score,
      final_text,
      confidence,
      characters,
      annotated_image: EncodedImage::encode_png(&annotated)?,
      original_plate: EncodedImage::encode_png(&plate_crop)?,
      digital_plate,
      deskewed_plate,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::BoundingBox,
    model::{CharClass, Model},
  };
  use image::Rgb;

  /// 按字符框左边缘所在的色块返回对应字符
  struct ColorChars;

  impl Model for ColorChars {
    type Input = RgbImage;
    type Output = CharClass;
    type Error = std::io::Error;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      let value = input.get_pixel(0, 0).0[0];
      match value {
        0 => Err(std::io::Error::other("unreadable glyph")),
        v => Ok(CharClass {
          label: (b'A' + v / 10 - 1) as char,
          score: 0.8,
        }),
      }
    }
  }

  struct FixedSegments(Vec<Detection>);

  impl Model for FixedSegments {
    type Input = RgbImage;
    type Output = Vec<Detection>;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Ok(self.0.clone())
    }
  }

  struct BrokenSegments;

  impl Model for BrokenSegments {
    type Input = RgbImage;
    type Output = Vec<Detection>;
    type Error = std::io::Error;

    fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
      Err(std::io::Error::other("segmenter offline"))
    }
  }

  /// 100x40 的图像，三个 20 像素宽的色块分别编码 A、B、C，
  /// 第四块为 0，识别模型会报错
  fn plate_image() -> RgbImage {
    RgbImage::from_fn(100, 40, |x, _| match x / 20 {
      0 => Rgb([10, 0, 0]),
      1 => Rgb([20, 0, 0]),
      2 => Rgb([30, 0, 0]),
      _ => Rgb([0, 0, 0]),
    })
  }

  fn seg(x: u32, score: f32) -> Detection {
    Detection::new(BoundingBox::new(x, 5, 15, 30), score)
  }

  fn plate() -> Detection {
    Detection::new(BoundingBox::new(0, 0, 100, 40), 0.9)
  }

  #[test]
  fn test_fuse_confidence() {
    assert_eq!(fuse_confidence(0.7, &[]), 0.7);
    assert!((fuse_confidence(0.95, &[0.9; 6]) - 0.855).abs() < 1e-6);
    assert_eq!(fuse_confidence(1.0, &[1.0, 1.0]), 1.0);
    assert_eq!(fuse_confidence(0.9, &[0.0]), 0.0);
  }

  #[test]
  fn test_fuse_confidence_is_order_independent_and_monotonic() {
    let scores = [0.91, 0.37, 0.66, 0.82, 0.58];
    let mut reversed = scores;
    reversed.reverse();
    assert_eq!(
      fuse_confidence(0.88, &scores),
      fuse_confidence(0.88, &reversed)
    );

    for i in 0..scores.len() {
      let mut lowered = scores;
      lowered[i] -= 0.2;
      assert!(fuse_confidence(0.88, &lowered) <= fuse_confidence(0.88, &scores));
    }
  }

  #[test]
  fn test_characters_are_ordered_left_to_right() {
    let segmenter = CharSegmenter::new(
      FixedSegments(vec![seg(42, 0.9), seg(2, 0.7), seg(22, 0.8)]),
      0.3,
      0.3,
      0.2,
    );
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    assert_eq!(result.final_text, "ABC");
    let xs: Vec<u32> = result.characters.iter().map(|c| c.bbox.x).collect();
    assert_eq!(xs, vec![2, 22, 42]);
    assert!((result.confidence - 0.9 * 0.8).abs() < 1e-6);
    assert_eq!(result.original_plate.decode().unwrap(), plate_image());
    assert!(result.digital_plate.is_none());
    // 字符底边水平，校正图与裁剪图一致
    let deskewed = result.deskewed_plate.unwrap();
    assert_eq!(deskewed.decode().unwrap(), plate_image());
  }

  #[test]
  fn test_tilted_characters_produce_deskewed_plate() {
    let tilted = |x: u32, y: u32| Detection::new(BoundingBox::new(x, y, 15, 30), 0.9);
    let segmenter = CharSegmenter::new(
      FixedSegments(vec![tilted(2, 2), tilted(22, 5), tilted(42, 8)]),
      0.3,
      0.3,
      0.2,
    );
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    let deskewed = result.deskewed_plate.unwrap().decode().unwrap();
    assert_eq!(deskewed.dimensions(), (100, 40));
    assert_ne!(deskewed, plate_image());
  }

  #[test]
  fn test_single_character_has_no_deskewed_plate() {
    let segmenter = CharSegmenter::new(FixedSegments(vec![seg(2, 0.9)]), 0.3, 0.3, 0.2);
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    assert_eq!(result.final_text, "A");
    assert!(result.deskewed_plate.is_none());
  }

  #[test]
  fn test_failed_character_becomes_placeholder() {
    let segmenter = CharSegmenter::new(
      FixedSegments(vec![seg(2, 0.9), seg(62, 0.9), seg(22, 0.9)]),
      0.3,
      0.3,
      0.2,
    );
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    assert_eq!(result.final_text, "AB?");
    let expected = fuse_confidence(0.9, &[0.8, 0.8, 0.0]);
    assert_eq!(result.confidence, expected);
  }

  #[test]
  fn test_no_characters_uses_plate_score() {
    let segmenter = CharSegmenter::new(FixedSegments(vec![]), 0.3, 0.3, 0.2);
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    assert_eq!(result.final_text, "");
    assert_eq!(result.confidence, 0.9);
    assert!(!result.is_readable());
    assert!(result.deskewed_plate.is_none());
  }

  #[test]
  fn test_segmenter_failure_keeps_plate() {
    let segmenter = CharSegmenter::new(BrokenSegments, 0.3, 0.3, 0.2);
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());

    let result = assembler
      .assemble(&plate_image(), &plate(), &segmenter, &recognizer)
      .unwrap();

    assert_eq!(result.final_text, "");
    assert_eq!(result.confidence, 0.9);
  }

  #[test]
  fn test_plate_outside_image_is_geometry_error() {
    let segmenter = CharSegmenter::new(FixedSegments(vec![]), 0.3, 0.3, 0.2);
    let recognizer = CharRecognizer::new(ColorChars, '?', None);
    let assembler = PlateAssembler::new(2, Draw::default());
    let outside = Detection::new(BoundingBox::new(500, 500, 10, 10), 0.9);

    let err = assembler
      .assemble(&plate_image(), &outside, &segmenter, &recognizer)
      .unwrap_err();
    assert!(matches!(err, PlateError::Geometry(_)));
  }
}
