//! Target-version configuration, loaded either programmatically or from a
//! `key = value` config file (§6a of the specification).

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SysVer {
    System35,
    System36,
    System38,
    System39,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoVer {
    S350,
    S351,
    Sco153S,
    S360,
    S380,
}

impl ScoVer {
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            ScoVer::S350 => b"S350",
            ScoVer::S351 => b"S351",
            ScoVer::Sco153S => b"153S",
            ScoVer::S360 => b"S360",
            ScoVer::S380 => b"S380",
        }
    }
}

/// `(cli alias, SysVer, ScoVer)` — mirrors the reference `sys_ver_opt_values` table
/// used by both the `-s` flag and the config file's `sys_ver` key.
const SYS_VER_ALIASES: &[(&str, SysVer, ScoVer)] = &[
    ("3.5", SysVer::System35, ScoVer::S351),
    ("3.6", SysVer::System36, ScoVer::S360),
    ("3.8", SysVer::System38, ScoVer::S380),
    ("3.9", SysVer::System39, ScoVer::S380),
    ("S350", SysVer::System35, ScoVer::S350),
    ("S351", SysVer::System35, ScoVer::S351),
    ("153S", SysVer::System36, ScoVer::Sco153S),
    ("S360", SysVer::System36, ScoVer::S360),
    ("S380", SysVer::System39, ScoVer::S380),
];

#[derive(Debug, Clone)]
pub struct Config {
    pub sys_ver: SysVer,
    pub sco_ver: ScoVer,
    pub hed: Option<PathBuf>,
    pub var_list: Option<PathBuf>,
    pub debug: bool,
    pub unicode: bool,
    pub utf8: bool,
    pub disable_else: bool,
    pub disable_ain_message: bool,
    pub disable_ain_variable: bool,
    pub old_sr: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sys_ver: SysVer::System38,
            sco_ver: ScoVer::S380,
            hed: None,
            var_list: None,
            debug: false,
            unicode: false,
            utf8: false,
            disable_else: false,
            disable_ain_message: false,
            disable_ain_variable: false,
            old_sr: false,
        }
    }
}

impl Config {
    pub fn use_ain_message(&self) -> bool {
        self.sys_ver == SysVer::System39 && !self.disable_ain_message
    }

    pub fn set_sys_ver(&mut self, ver: &str) -> Result<()> {
        for (alias, sys_ver, sco_ver) in SYS_VER_ALIASES {
            if *alias == ver {
                self.sys_ver = *sys_ver;
                self.sco_ver = *sco_ver;
                return Ok(());
            }
        }
        Err(Error::Malformed(format!("unknown system version '{ver}'")))
    }

    /// Parses the ambient `key = value` config-file format. Unrecognized
    /// lines are ignored, matching the reference loader's use of scanf
    /// patterns that simply fail to match.
    pub fn load(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut cfg = Config::default();
        for line in text.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            if val.is_empty() {
                continue;
            }
            match key {
                "sys_ver" => cfg.set_sys_ver(val)?,
                "hed" => cfg.hed = Some(dir.join(val)),
                "variables" => cfg.var_list = Some(dir.join(val)),
                "disable_else" => cfg.disable_else = to_bool(val)?,
                "disable_ain_message" => cfg.disable_ain_message = to_bool(val)?,
                "old_SR" => cfg.old_sr = to_bool(val)?,
                _ => {}
            }
        }
        Ok(cfg)
    }
}

fn to_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Ok(true),
        "no" | "false" | "off" | "0" => Ok(false),
        _ => Err(Error::Malformed(format!("invalid boolean value '{s}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference() {
        let cfg = Config::default();
        assert_eq!(cfg.sys_ver, SysVer::System38);
        assert_eq!(cfg.sco_ver, ScoVer::S380);
    }

    #[test]
    fn set_sys_ver_accepts_every_alias() {
        let mut cfg = Config::default();
        for (alias, sys_ver, sco_ver) in SYS_VER_ALIASES {
            cfg.set_sys_ver(alias).unwrap();
            assert_eq!(cfg.sys_ver, *sys_ver);
            assert_eq!(cfg.sco_ver, *sco_ver);
        }
    }

    #[test]
    fn set_sys_ver_rejects_unknown() {
        let mut cfg = Config::default();
        assert!(cfg.set_sys_ver("9.9").is_err());
    }

    #[test]
    fn use_ain_message_requires_system39() {
        let mut cfg = Config::default();
        cfg.set_sys_ver("3.9").unwrap();
        assert!(cfg.use_ain_message());
        cfg.disable_ain_message = true;
        assert!(!cfg.use_ain_message());
    }
}
