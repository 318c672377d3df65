use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How BGRA input is brought into the byte order the GPU samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationSetting {
    /// Upload verbatim and swap channels in the fragment stage.
    #[default]
    Shader,
    /// Reorder bytes on the host before upload.
    Host,
}

/// What the host normalizer does with a row that runs past the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationSetting {
    #[default]
    Reject,
    Drop,
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RendererSettings {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub gpu: GpuSettings,
    #[serde(default)]
    pub stream: StreamSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default, deserialize_with = "deserialize_normalization")]
    pub normalization: NormalizationSetting,
    #[serde(default, deserialize_with = "deserialize_truncation")]
    pub truncation: TruncationSetting,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GpuSettings {
    #[serde(default, deserialize_with = "deserialize_power")]
    pub power: PowerSetting,
    #[serde(default, deserialize_with = "deserialize_present_mode")]
    pub present_mode: PresentModeSetting,
    #[serde(default = "default_frame_latency")]
    pub frame_latency: u32,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power: PowerSetting::default(),
            present_mode: PresentModeSetting::default(),
            frame_latency: default_frame_latency(),
            clear_color: default_clear_color(),
        }
    }
}

/// Pacing used by frame producers such as the `rgbaview` demo.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StreamSettings {
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            version: 1,
            log_filter: None,
            pipeline: PipelineSettings::default(),
            gpu: GpuSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

fn default_frame_latency() -> u32 {
    2
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_interval() -> Duration {
    Duration::from_millis(16)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_keyword<'de, D, T>(
    deserializer: D,
    parse: fn(&str) -> Result<T, String>,
) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(de::Error::custom)
}

fn deserialize_normalization<'de, D>(deserializer: D) -> Result<NormalizationSetting, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_keyword(deserializer, parse_normalization)
}

fn deserialize_truncation<'de, D>(deserializer: D) -> Result<TruncationSetting, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_keyword(deserializer, parse_truncation)
}

fn deserialize_power<'de, D>(deserializer: D) -> Result<PowerSetting, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_keyword(deserializer, parse_power)
}

fn deserialize_present_mode<'de, D>(deserializer: D) -> Result<PresentModeSetting, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_keyword(deserializer, parse_present_mode)
}

pub fn parse_normalization(raw: &str) -> Result<NormalizationSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "shader" | "swizzle" | "gpu" => Ok(NormalizationSetting::Shader),
        "host" | "cpu" | "reorder" => Ok(NormalizationSetting::Host),
        other => Err(format!("invalid normalization setting '{other}'")),
    }
}

pub fn parse_truncation(raw: &str) -> Result<TruncationSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "reject" | "fail" => Ok(TruncationSetting::Reject),
        "drop" | "skip" => Ok(TruncationSetting::Drop),
        "clamp" => Ok(TruncationSetting::Clamp),
        other => Err(format!("invalid truncation setting '{other}'")),
    }
}

pub fn parse_power(raw: &str) -> Result<PowerSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "low" | "low-power" | "battery" => Ok(PowerSetting::Low),
        "high" | "high-performance" | "performance" => Ok(PowerSetting::High),
        other => Err(format!("invalid power setting '{other}'")),
    }
}

pub fn parse_present_mode(raw: &str) -> Result<PresentModeSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "fifo" | "vsync" => Ok(PresentModeSetting::Fifo),
        "mailbox" => Ok(PresentModeSetting::Mailbox),
        "immediate" | "novsync" | "off" => Ok(PresentModeSetting::Immediate),
        other => Err(format!("invalid present mode '{other}'")),
    }
}

impl RendererSettings {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RendererSettings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Log filter directive, falling back to `info`.
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or("info")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(filter) = &self.log_filter {
            if filter.trim().is_empty() {
                return Err(ConfigError::Invalid("log_filter may not be empty".into()));
            }
        }

        if !(1..=3).contains(&self.gpu.frame_latency) {
            return Err(ConfigError::Invalid(format!(
                "gpu.frame_latency must be between 1 and 3, got {}",
                self.gpu.frame_latency
            )));
        }

        for (index, component) in self.gpu.clear_color.iter().enumerate() {
            if !(0.0..=1.0).contains(component) {
                return Err(ConfigError::Invalid(format!(
                    "gpu.clear_color[{index}] must be within 0.0..=1.0, got {component}"
                )));
            }
        }

        if self.stream.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "stream.interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_else(|err| format!("# unprintable settings: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
log_filter = "texture_rgba=debug"

[pipeline]
normalization = "host"
truncation = "drop"

[gpu]
power = "low-power"
present_mode = "mailbox"
frame_latency = 3
clear_color = [0.1, 0.2, 0.3, 1.0]

[stream]
interval = "33ms"
"#;

    #[test]
    fn parses_sample_config() {
        let settings = RendererSettings::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(settings.version, 1);
        assert_eq!(settings.log_filter(), "texture_rgba=debug");
        assert_eq!(settings.pipeline.normalization, NormalizationSetting::Host);
        assert_eq!(settings.pipeline.truncation, TruncationSetting::Drop);
        assert_eq!(settings.gpu.power, PowerSetting::Low);
        assert_eq!(settings.gpu.present_mode, PresentModeSetting::Mailbox);
        assert_eq!(settings.gpu.frame_latency, 3);
        assert_eq!(settings.stream.interval, Duration::from_millis(33));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let settings = RendererSettings::from_toml_str("version = 1").unwrap();
        assert_eq!(settings, RendererSettings::default());
        assert_eq!(settings.log_filter(), "info");
        assert_eq!(settings.pipeline.normalization, NormalizationSetting::Shader);
        assert_eq!(settings.pipeline.truncation, TruncationSetting::Reject);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = RendererSettings::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_latency() {
        let config = r#"
version = 1

[gpu]
frame_latency = 0
"#;
        let err = RendererSettings::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_clear_color_outside_unit_range() {
        let config = r#"
version = 1

[gpu]
clear_color = [0.0, 1.5, 0.0, 1.0]
"#;
        let err = RendererSettings::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_keyword() {
        let config = r#"
version = 1

[pipeline]
normalization = "yuv"
"#;
        let err = RendererSettings::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn interval_accepts_plain_seconds() {
        let config = r#"
version = 1

[stream]
interval = 0.5
"#;
        let settings = RendererSettings::from_toml_str(config).unwrap();
        assert_eq!(settings.stream.interval, Duration::from_millis(500));
    }

    #[test]
    fn printed_settings_parse_back() {
        let settings = RendererSettings::from_toml_str(SAMPLE).unwrap();
        let printed = settings.to_toml_string();
        let reparsed = RendererSettings::from_toml_str(&printed).unwrap();
        assert_eq!(reparsed, settings);
    }
}
