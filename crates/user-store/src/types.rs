use chrono::{DateTime, Utc};
use core_types::AdjustmentMode;
use serde::{Deserialize, Serialize};

/// Trading-cost and replay defaults a new session is seeded from (§3 User config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub commission_rate: f64,
    pub min_commission: f64,
    pub stamp_tax_rate: f64,
    pub adjustment_mode: AdjustmentMode,
    pub default_initial_capital: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            commission_rate: 0.0003,
            min_commission: 5.0,
            stamp_tax_rate: 0.001,
            adjustment_mode: AdjustmentMode::DynamicForward,
            default_initial_capital: 100_000.0,
        }
    }
}

/// UI-facing preferences that don't affect trade economics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub auto_save: bool,
    pub playback_speed: f64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_save: true,
            playback_speed: 1.0,
        }
    }
}

/// A partial update accepted by `GET/POST /api/users/{u}/settings` — only
/// the fields present in the request body are applied.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub commission_rate: Option<f64>,
    pub min_commission: Option<f64>,
    pub stamp_tax_rate: Option<f64>,
    pub adjustment_mode: Option<AdjustmentMode>,
    pub default_initial_capital: Option<f64>,
    pub auto_save: Option<bool>,
    pub playback_speed: Option<f64>,
}

/// The on-disk `config.json` document for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub settings: Settings,
    pub preferences: Preferences,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl UserConfig {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            created_at: Utc::now(),
            settings: Settings::default(),
            preferences: Preferences::default(),
            last_updated: None,
        }
    }

    pub fn apply_patch(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.commission_rate {
            self.settings.commission_rate = v;
        }
        if let Some(v) = patch.min_commission {
            self.settings.min_commission = v;
        }
        if let Some(v) = patch.stamp_tax_rate {
            self.settings.stamp_tax_rate = v;
        }
        if let Some(v) = patch.adjustment_mode {
            self.settings.adjustment_mode = v;
        }
        if let Some(v) = patch.default_initial_capital {
            self.settings.default_initial_capital = v;
        }
        if let Some(v) = patch.auto_save {
            self.preferences.auto_save = v;
        }
        if let Some(v) = patch.playback_speed {
            self.preferences.playback_speed = v;
        }
        self.last_updated = Some(Utc::now());
    }
}
