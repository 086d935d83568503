// 该文件是 Paizhao （牌照） 项目的一部分。
// src/output/draw.rs - 车牌识别结果可视化
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

use std::{fmt, path::Path};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, imageops};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::info;

use crate::model::CharacterPrediction;

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_PADDING: u32 = 2;
const DIGITAL_FONT_SIZE: f32 = 48.0;
const DIGITAL_MARGIN: u32 = 12;

const PLATE_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const CHAR_COLOR: [u8; 3] = [0, 200, 0]; // 绿色
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
const DIGITAL_BACKGROUND: [u8; 3] = [255, 255, 255];
const DIGITAL_FOREGROUND: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug)]
pub enum FontError {
  #[error("读取字体文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("字体数据无效: {0}")]
  Invalid(#[from] ab_glyph::InvalidFont),
}

/// 调用方在启动时加载的字体
#[derive(Clone)]
pub struct FontResource {
  font: FontArc,
}

impl FontResource {
  pub fn try_from_vec(data: Vec<u8>) -> Result<Self, FontError> {
    Ok(Self {
      font: FontArc::try_from_vec(data)?,
    })
  }

  pub fn from_path(path: &Path) -> Result<Self, FontError> {
    info!("加载字体文件: {}", path.display());
    Self::try_from_vec(std::fs::read(path)?)
  }

  pub fn font(&self) -> &FontArc {
    &self.font
  }
}

impl fmt::Debug for FontResource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FontResource").finish_non_exhaustive()
  }
}

impl From<FontArc> for FontResource {
  fn from(font: FontArc) -> Self {
    Self { font }
  }
}

#[derive(Debug, Clone)]
pub struct Draw {
  font: Option<FontResource>,
  label_font_size: f32,
  plate_color: [u8; 3],
  char_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(None)
  }
}

impl Draw {
  pub fn new(font: Option<FontResource>) -> Self {
    Self {
      font,
      label_font_size: LABEL_FONT_SIZE,
      plate_color: PLATE_COLOR,
      char_color: CHAR_COLOR,
    }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在车牌裁剪图的副本上绘制车牌边框、字符框，并在上方标签条中写出 `label`
  ///
  /// 没有字体或 `label` 为空时不绘制标签条，输出与裁剪图同尺寸。
  pub fn annotate_plate(
    &self,
    plate: &RgbImage,
    characters: &[CharacterPrediction],
    label: &str,
  ) -> RgbImage {
    let (width, height) = plate.dimensions();
    let scale = PxScale::from(self.label_font_size);

    let strip = match &self.font {
      Some(font) if !label.is_empty() => {
        let (_, text_height) = text_size(scale, font.font(), label);
        text_height.max(1) + 2 * LABEL_PADDING
      }
      _ => 0,
    };

    let mut canvas = RgbImage::from_pixel(width, height + strip, Rgb(self.plate_color));
    imageops::replace(&mut canvas, plate, 0, strip as i64);

    // 车牌边框（加粗为2像素）
    draw_frame(&mut canvas, 0, strip, width, height, self.plate_color, 2);

    for c in characters {
      draw_frame(
        &mut canvas,
        c.bbox.x,
        c.bbox.y + strip,
        c.bbox.width,
        c.bbox.height,
        self.char_color,
        1,
      );
    }

    if let Some(font) = &self.font
      && strip > 0
    {
      draw_text_mut(
        &mut canvas,
        Rgb(LABEL_TEXT_COLOR),
        LABEL_PADDING as i32,
        LABEL_PADDING as i32,
        scale,
        font.font(),
        label,
      );
    }

    canvas
  }

  /// 将识别出的文本渲染为白底黑字的“数字车牌”
  pub fn render_digital_plate(&self, text: &str) -> Option<RgbImage> {
    let font = self.font.as_ref()?;
    if text.is_empty() {
      return None;
    }

    let scale = PxScale::from(DIGITAL_FONT_SIZE);
    let (text_width, text_height) = text_size(scale, font.font(), text);
    let width = text_width + 2 * DIGITAL_MARGIN;
    let height = text_height + 2 * DIGITAL_MARGIN;

    let mut canvas = RgbImage::from_pixel(width, height, Rgb(DIGITAL_BACKGROUND));
    draw_frame(&mut canvas, 0, 0, width, height, DIGITAL_FOREGROUND, 2);
    draw_text_mut(
      &mut canvas,
      Rgb(DIGITAL_FOREGROUND),
      DIGITAL_MARGIN as i32,
      DIGITAL_MARGIN as i32,
      scale,
      font.font(),
      text,
    );

    Some(canvas)
  }
}

/// 绘制空心矩形，`thickness` 层向内收缩
fn draw_frame(
  image: &mut RgbImage,
  x: u32,
  y: u32,
  width: u32,
  height: u32,
  color: [u8; 3],
  thickness: u32,
) {
  for t in 0..thickness {
    let w = width.saturating_sub(2 * t);
    let h = height.saturating_sub(2 * t);
    if w == 0 || h == 0 {
      break;
    }
    let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(w, h);
    draw_hollow_rect_mut(image, rect, Rgb(color));
  }
}
