// 该文件是 Paizhao （牌照） 项目的一部分。
// src/args.rs - 命令行参数配置
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

use clap::Args;

use crate::{
  config::PipelineConfig,
  model::Device,
  output::{FontError, FontResource},
};

/// 车牌识别流水线参数，可通过 `#[command(flatten)]` 嵌入服务程序的参数中
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 推理设备（cpu, cuda:0, npu:0）
  #[arg(long, default_value = "cpu", value_name = "DEVICE")]
  pub device: Device,

  /// 车牌检测置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub plate_confidence: f32,

  /// 车牌 NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub plate_nms_threshold: f32,

  /// 单幅图像最多处理的车牌数
  #[arg(long, default_value = "10", value_name = "COUNT")]
  pub max_plates: usize,

  /// 字符分割置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub char_confidence: f32,

  /// 字符 NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.3", value_name = "THRESHOLD")]
  pub char_nms_threshold: f32,

  /// 字符框最小高度（相对车牌高度）
  #[arg(long, default_value = "0.2", value_name = "RATIO")]
  pub min_char_height: f32,

  /// 字符排序的 x 坐标容差（像素）
  #[arg(long, default_value = "2", value_name = "PIXELS")]
  pub order_tolerance: u32,

  /// 识别失败时的占位字符
  #[arg(long, default_value = "?", value_name = "CHAR")]
  pub placeholder: char,

  /// 允许的字符集
  #[arg(long, value_name = "CHARS")]
  pub charset: Option<String>,

  /// 标注所用的字体文件路径
  #[arg(long, value_name = "FILE")]
  pub font: Option<std::path::PathBuf>,
}

impl PipelineArgs {
  /// 加载 `--font` 指定的字体，未指定时返回 `None`
  pub fn load_font(&self) -> Result<Option<FontResource>, FontError> {
    self.font.as_deref().map(FontResource::from_path).transpose()
  }
}

impl From<&PipelineArgs> for PipelineConfig {
  fn from(args: &PipelineArgs) -> Self {
    PipelineConfig {
      plate_min_score: args.plate_confidence,
      plate_iou_threshold: args.plate_nms_threshold,
      max_plates: args.max_plates,
      char_min_score: args.char_confidence,
      char_iou_threshold: args.char_nms_threshold,
      min_char_height_ratio: args.min_char_height,
      order_tolerance: args.order_tolerance,
      placeholder: args.placeholder,
      charset: args.charset.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,
  }

  #[test]
  fn test_defaults_match_config_defaults() {
    let cli = Cli::try_parse_from(["anpr"]).unwrap();
    assert_eq!(cli.pipeline.device, Device::Cpu);
    assert_eq!(PipelineConfig::from(&cli.pipeline), PipelineConfig::default());
  }

  #[test]
  fn test_overrides() {
    let cli = Cli::try_parse_from([
      "anpr",
      "--device",
      "cuda:1",
      "--plate-confidence",
      "0.8",
      "--charset",
      "0123456789",
    ])
    .unwrap();

    assert_eq!(cli.pipeline.device, Device::Cuda(1));
    let config = PipelineConfig::from(&cli.pipeline);
    assert_eq!(config.plate_min_score, 0.8);
    assert_eq!(config.charset.as_deref(), Some("0123456789"));
  }

  #[test]
  fn test_missing_font_file_is_an_error() {
    let cli = Cli::try_parse_from(["anpr", "--font", "/nonexistent/plate-font.ttf"]).unwrap();
    assert!(matches!(cli.pipeline.load_font(), Err(FontError::Io(_))));

    let cli = Cli::try_parse_from(["anpr"]).unwrap();
    assert!(cli.pipeline.load_font().unwrap().is_none());
  }

  #[test]
  fn test_rejects_unknown_device() {
    assert!(Cli::try_parse_from(["anpr", "--device", "tpu"]).is_err());
  }
}
