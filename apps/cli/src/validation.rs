//! 输入验证模块
//!
//! 命令行数值和路径参数在连接机器人之前完成校验。

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// 行走速度上限（m/s），与回放限幅一致
pub const MAX_WALK_SPEED: f64 = 0.8;

/// 验证速度参数
pub fn validate_speed(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        anyhow::bail!("❌ {} 必须是有限数值，当前: {}", name, value);
    }
    if value.abs() > MAX_WALK_SPEED {
        anyhow::bail!(
            "❌ {} 超出范围 [-{:.1}, {:.1}] m/s，当前: {:.2}",
            name,
            MAX_WALK_SPEED,
            MAX_WALK_SPEED,
            value
        );
    }
    Ok(value)
}

/// 验证时长参数（秒），返回 [`Duration`]
pub fn validate_secs(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("❌ {} 必须是非负秒数，当前: {}", name, value);
    }
    Duration::try_from_secs_f64(value).with_context(|| format!("❌ {} 超出可表示范围", name))
}

/// 验证输入文件存在且是普通文件
pub fn validate_input_file(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("❌ 文件不存在: {}", path.display());
    }
    if !path.is_file() {
        anyhow::bail!("❌ 不是文件: {}", path.display());
    }
    Ok(())
}

/// 验证输出文件的父目录存在
pub fn validate_output_path(path: &Path) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        if !parent.exists() {
            anyhow::bail!("❌ 输出目录不存在: {}", parent.display());
        }
    }
    if path.is_dir() {
        anyhow::bail!("❌ 输出路径是目录: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_bounds() {
        assert_eq!(validate_speed("--speed", 0.4).unwrap(), 0.4);
        assert!(validate_speed("--speed", -0.8).is_ok());
        assert!(validate_speed("--speed", 0.81).is_err());
        assert!(validate_speed("--speed", f64::NAN).is_err());
    }

    #[test]
    fn test_secs_conversion() {
        assert_eq!(validate_secs("--walk-secs", 0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(validate_secs("--pause-secs", 0.0).unwrap(), Duration::ZERO);
        assert!(validate_secs("--walk-secs", -1.0).is_err());
        assert!(validate_secs("--walk-secs", f64::INFINITY).is_err());
    }

    #[test]
    fn test_input_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_input_file(dir.path()).is_err());
        assert!(validate_input_file(&dir.path().join("missing.jsonl")).is_err());

        let file = dir.path().join("log.jsonl");
        std::fs::write(&file, "").unwrap();
        assert!(validate_input_file(&file).is_ok());
    }

    #[test]
    fn test_output_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_output_path(&dir.path().join("out.jsonl")).is_ok());
        assert!(validate_output_path(&dir.path().join("nope/out.jsonl")).is_err());
        assert!(validate_output_path(dir.path()).is_err());
        assert!(validate_output_path(Path::new("relative.jsonl")).is_ok());
    }
}
