use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub(crate) seed: u64,
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) preset_name: String,
    pub(crate) ball_count: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0xB10B5_u64,
            fps_cap: 60,
            enable_color: true,
            preset_name: "Lava".to_string(),
            ball_count: 100,
        }
    }
}

pub(crate) fn settings_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("com", "metaballs", "Metaballs")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(dir.join("settings.json"))
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    // Best-effort atomic replace on the same filesystem.
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_json() {
        let s = Settings {
            seed: 99,
            fps_cap: 30,
            enable_color: false,
            preset_name: "Water".to_string(),
            ball_count: 42,
        };
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.seed, 99);
        assert_eq!(back.fps_cap, 30);
        assert!(!back.enable_color);
        assert_eq!(back.preset_name, "Water");
        assert_eq!(back.ball_count, 42);
    }

    #[test]
    fn garbage_settings_fall_back_to_defaults() {
        let parsed = serde_json::from_str::<Settings>("{not json").ok();
        assert!(parsed.is_none());
        let d = Settings::default();
        assert_eq!(d.preset_name, "Lava");
        assert_eq!(d.ball_count, 100);
    }
}
