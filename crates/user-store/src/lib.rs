//! User/Config Store (U) — one directory per user holding `config.json`
//! plus the per-user SQLite database that `persistence` maintains (§4.5).

pub mod error;
pub mod store;
pub mod types;

pub use error::UserStoreError;
pub use store::UserStore;
pub use types::{Preferences, Settings, SettingsPatch, UserConfig};
