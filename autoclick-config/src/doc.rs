//! The persisted, JSON-shaped configuration document and its conversion
//! into an in-memory [`autoclick_ipc::ScannerConfig`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use autoclick_ipc::{ClickOffset, FinderStrategies, RoiConfig, ScannerConfig, TargetSpec};

use crate::defaults;
use crate::error::{ConfigError, Result};

/// Mirrors the external, persisted document shape from the configuration
/// surface: required keys plus the historically-duplicated ones
/// (`fps_max`/`target_fps`, `click_delay_ms`/`cooldown_s`) which this type
/// accepts on read and always normalizes to the canonical name on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDoc {
    #[serde(default)]
    pub target_hwnd: u64,
    #[serde(default)]
    pub target_process: Option<String>,
    #[serde(default = "defaults::bool_true")]
    pub process_partial_match: bool,
    #[serde(default)]
    pub target_window_title: Option<String>,
    #[serde(default = "defaults::bool_true")]
    pub window_title_partial_match: bool,

    #[serde(default)]
    pub monitor_index: u32,
    #[serde(default = "defaults::bool_false")]
    pub use_monitor: bool,

    #[serde(default)]
    pub fps_max: Option<u32>,
    /// Historical alias for `fps_max`; same unit, only the name changed.
    #[serde(default)]
    pub target_fps: Option<u32>,

    #[serde(default = "defaults::bool_true")]
    pub include_cursor: bool,
    #[serde(default = "defaults::bool_false")]
    pub screen_border_required: bool,
    #[serde(default = "defaults::bool_false")]
    pub window_border_required: bool,
    #[serde(default = "defaults::bool_true")]
    pub restore_minimized_after_capture: bool,

    #[serde(default)]
    pub template_paths: Vec<String>,
    /// Historical singular alias for `template_paths`.
    #[serde(default)]
    pub template_path: Option<String>,

    #[serde(default = "defaults::threshold")]
    pub threshold: f32,
    #[serde(default = "defaults::bool_false")]
    pub grayscale: bool,
    #[serde(default)]
    pub roi: Option<RoiConfig>,

    #[serde(default = "defaults::interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub click_offset: ClickOffset,

    #[serde(default)]
    pub click_delay_ms: Option<u64>,
    /// Historical alias for `click_delay_ms`, expressed in whole seconds.
    #[serde(default)]
    pub cooldown_s: Option<f64>,

    #[serde(default = "defaults::bool_true")]
    pub enhanced_window_finding: bool,
    #[serde(default = "defaults::bool_true")]
    pub verify_window_before_click: bool,
    #[serde(default = "defaults::bool_false")]
    pub send_mousemove_before_click: bool,
    #[serde(default = "defaults::bool_false")]
    pub debug_mode: bool,

    #[serde(default = "defaults::smart_finder_base_interval_ms")]
    pub smart_finder_base_interval_ms: u64,
    #[serde(default = "defaults::smart_finder_min_interval_ms")]
    pub smart_finder_min_interval_ms: u64,
    #[serde(default = "defaults::smart_finder_max_interval_ms")]
    pub smart_finder_max_interval_ms: u64,

    #[serde(default = "defaults::bool_true")]
    pub enable_auto_recovery: bool,
    #[serde(default = "defaults::max_recovery_attempts")]
    pub max_recovery_attempts: u32,
    #[serde(default = "defaults::recovery_cooldown_ms")]
    pub recovery_cooldown_ms: u64,

    #[serde(default)]
    pub finder_strategies: FinderStrategies,
}

impl Default for ConfigDoc {
    fn default() -> Self {
        serde_json::from_str("{}").expect("ConfigDoc defaults must parse from an empty object")
    }
}

impl ConfigDoc {
    /// Loads the document from `path`, applying JSON parsing and alias
    /// normalization. Does not validate; call [`ConfigDoc::validate`]
    /// separately at the `update_config` boundary.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let doc: ConfigDoc = serde_json::from_str(&contents)?;
        Ok(doc)
    }

    /// Loads from the platform config directory, creating a default
    /// document there if none exists yet.
    pub fn load_or_create_default() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            log::info!("loading config from {:?}", path);
            Self::load_from(&path)
        } else {
            log::info!("no config found at {:?}, creating default", path);
            let doc = Self::default();
            doc.save_to(&path)?;
            Ok(doc)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("autoclick").join("config.json")
        } else {
            PathBuf::from("autoclick-config.json")
        }
    }

    /// `fps_max`, preferring the canonical field over its historical alias.
    pub fn effective_fps_max(&self) -> u32 {
        self.fps_max.or(self.target_fps).unwrap_or_else(defaults::fps_max)
    }

    /// `click_delay_ms`, preferring the canonical field. `cooldown_s` is
    /// seconds, so it is converted rather than merely renamed.
    pub fn effective_click_delay_ms(&self) -> u64 {
        self.click_delay_ms
            .or_else(|| self.cooldown_s.map(|s| (s * 1000.0).round() as u64))
            .unwrap_or_else(defaults::click_delay_ms)
    }

    /// Template source refs, preferring the plural field and falling back to
    /// the historical singular one.
    pub fn effective_template_refs(&self) -> Vec<String> {
        if !self.template_paths.is_empty() {
            self.template_paths.clone()
        } else if let Some(single) = &self.template_path {
            vec![single.clone()]
        } else {
            Vec::new()
        }
    }

    /// Builds the tagged [`TargetSpec`] the resolver understands from the
    /// stringly-typed historical fields, per the re-architecture guidance
    /// against "partial-match" boolean overloading of a raw string.
    pub fn target_spec(&self) -> TargetSpec {
        if self.use_monitor {
            return TargetSpec::Monitor {
                index: self.monitor_index,
            };
        }
        if self.target_hwnd > 0 {
            return TargetSpec::Handle {
                hwnd: self.target_hwnd,
            };
        }
        if let Some(process) = &self.target_process {
            return TargetSpec::ProcessName {
                text: process.clone(),
                partial: self.process_partial_match,
            };
        }
        if let Some(title) = &self.target_window_title {
            return TargetSpec::Title {
                text: title.clone(),
                partial: self.window_title_partial_match,
            };
        }
        TargetSpec::Monitor {
            index: self.monitor_index,
        }
    }

    /// Normalizes the historical-named/duplicated fields into a single
    /// [`ScannerConfig`], and runs its own validation on top of it.
    pub fn to_scanner_config(&self) -> Result<ScannerConfig> {
        let cfg = self.build_scanner_config();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects a malformed or inconsistent document at the boundary, before
    /// the worker is ever allowed to enter the Running state with it.
    pub fn validate(&self) -> Result<()> {
        if self.use_monitor && self.target_hwnd > 0 {
            log::warn!("both use_monitor and target_hwnd set; use_monitor takes precedence");
        }
        if self.smart_finder_min_interval_ms > self.smart_finder_max_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "smart_finder_min_interval_ms ({}) must not exceed smart_finder_max_interval_ms ({})",
                self.smart_finder_min_interval_ms, self.smart_finder_max_interval_ms
            )));
        }
        self.build_scanner_config()
            .validate()
            .map_err(ConfigError::from)
    }

    fn build_scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            target_spec: self.target_spec(),
            template_refs: self.effective_template_refs(),
            roi: self.roi.map(|r| r.0),
            threshold: self.threshold,
            grayscale: self.grayscale,
            interval_ms: self.interval_ms,
            fps_max: self.effective_fps_max(),
            include_cursor: self.include_cursor,
            border_required: self.screen_border_required || self.window_border_required,
            restore_minimized: self.restore_minimized_after_capture,
            click_offset: self.click_offset,
            click_delay_ms: self.effective_click_delay_ms(),
            enhanced_window_finding: self.enhanced_window_finding,
            verify_window_before_click: self.verify_window_before_click,
            send_mousemove_before_click: self.send_mousemove_before_click,
            debug_mode: self.debug_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_doc_round_trips_through_json() {
        let doc = ConfigDoc::default();
        let json = serde_json::to_string(&doc).unwrap();
        let back: ConfigDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.threshold, doc.threshold);
    }

    #[test]
    fn accepts_legacy_target_fps_alias() {
        let json = r#"{"target_process":"notepad.exe","target_fps":24,"template_paths":["a.png"]}"#;
        let doc: ConfigDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.effective_fps_max(), 24);
    }

    #[test]
    fn prefers_canonical_fps_max_over_alias() {
        let json = r#"{"target_process":"x","fps_max":10,"target_fps":50,"template_paths":["a.png"]}"#;
        let doc: ConfigDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.effective_fps_max(), 10);
    }

    #[test]
    fn converts_cooldown_seconds_to_click_delay_ms() {
        let json = r#"{"target_process":"x","cooldown_s":1.5,"template_paths":["a.png"]}"#;
        let doc: ConfigDoc = serde_json::from_str(json).unwrap();
        assert_eq!(doc.effective_click_delay_ms(), 1500);
    }

    #[test]
    fn rejects_inverted_finder_interval_bounds() {
        let mut doc = ConfigDoc::default();
        doc.target_process = Some("x.exe".into());
        doc.template_paths = vec!["a.png".into()];
        doc.smart_finder_min_interval_ms = 5_000;
        doc.smart_finder_max_interval_ms = 1_000;
        assert!(doc.validate().is_err());
    }

    #[test]
    fn target_spec_prefers_monitor_then_handle_then_process_then_title() {
        let mut doc = ConfigDoc::default();
        doc.target_window_title = Some("Settings".into());
        assert!(matches!(doc.target_spec(), TargetSpec::Title { .. }));

        doc.target_process = Some("notepad.exe".into());
        assert!(matches!(doc.target_spec(), TargetSpec::ProcessName { .. }));

        doc.target_hwnd = 42;
        assert!(matches!(doc.target_spec(), TargetSpec::Handle { hwnd: 42 }));

        doc.use_monitor = true;
        doc.monitor_index = 1;
        assert!(matches!(
            doc.target_spec(),
            TargetSpec::Monitor { index: 1 }
        ));
    }
}
