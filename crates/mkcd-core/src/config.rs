use crate::error::{MkcdError, Result};
use crate::paths;
use crate::safety::SafetyPolicy;
use crate::settings::{IgnoreFlavor, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: String) -> Self {
        Self {
            level: WarnLevel::Error,
            message,
        }
    }

    fn warning(message: String) -> Self {
        Self {
            level: WarnLevel::Warning,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// CoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub default_profile: String,
    pub editor: String,
    pub shell_integration: bool,
    pub history_limit: i64,
    pub backup_enabled: bool,
    pub temp_dir: String,
    /// Upper bound on how long a foreground editor may block the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_timeout_secs: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_profile: "default".to_string(),
            editor: String::new(),
            shell_integration: true,
            history_limit: 100,
            backup_enabled: false,
            temp_dir: "/tmp/mkcd".to_string(),
            editor_timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GitConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub auto_init: bool,
    pub default_branch: String,
    pub user_name: String,
    pub user_email: String,
    pub default_remote_name: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_init: false,
            default_branch: "main".to_string(),
            user_name: String::new(),
            user_email: String::new(),
            default_remote_name: "origin".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplatesConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub directory: String,
    pub auto_update: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            directory: paths::default_templates_dir().to_string_lossy().into_owned(),
            auto_update: false,
        }
    }
}

// ---------------------------------------------------------------------------
// SafetyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub confirm_overwrites: bool,
    pub confirm_deletes: bool,
    pub max_depth: i64,
    pub forbidden_paths: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            confirm_overwrites: true,
            confirm_deletes: true,
            max_depth: 10,
            forbidden_paths: ["/", "/usr", "/etc", "/var", "/bin", "/sbin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub colors: bool,
    pub icons: bool,
    pub progress_bars: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colors: true,
            icons: true,
            progress_bars: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// File entries extend the built-in profiles when loaded.
    #[serde(default)]
    pub profiles: BTreeMap<String, Settings>,
}

const BUILTIN_PROFILES: [&str; 4] = ["default", "dev", "nodejs", "python"];

fn default_profiles() -> BTreeMap<String, Settings> {
    let mut m = BTreeMap::new();
    m.insert("default".to_string(), Settings::default());
    m.insert(
        "dev".to_string(),
        Settings {
            git: Some(true),
            editor: Some(true),
            readme: Some(true),
            gitignore: Some(IgnoreFlavor::General),
            template: Some("basic-dev".to_string()),
            ..Settings::default()
        },
    );
    m.insert(
        "nodejs".to_string(),
        Settings {
            git: Some(true),
            editor: Some(true),
            template: Some("nodejs".to_string()),
            gitignore: Some(IgnoreFlavor::Node),
            touch: Some(vec!["package.json".to_string(), "index.js".to_string()]),
            ..Settings::default()
        },
    );
    m.insert(
        "python".to_string(),
        Settings {
            git: Some(true),
            editor: Some(true),
            template: Some("python".to_string()),
            gitignore: Some(IgnoreFlavor::Python),
            touch: Some(vec!["main.py".to_string(), "requirements.txt".to_string()]),
            ..Settings::default()
        },
    );
    m
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            git: GitConfig::default(),
            templates: TemplatesConfig::default(),
            safety: SafetyConfig::default(),
            output: OutputConfig::default(),
            profiles: default_profiles(),
        }
    }
}

impl Config {
    /// Load the config at `path`. A missing file yields the built-in defaults;
    /// a file that exists must parse and pass strict validation.
    pub fn load(path: &Path) -> Result<Self> {
        let cfg = Config::load_unchecked(path)?;
        cfg.check()?;
        tracing::debug!(path = %path.display(), profiles = cfg.profiles.len(), "loaded config");
        Ok(cfg)
    }

    /// Parse without validating, so a report can list every finding.
    pub fn load_unchecked(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| MkcdError::fs("read", path, e))?;
        Config::parse(&data).map_err(|message| MkcdError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn parse(data: &str) -> std::result::Result<Self, String> {
        let mut cfg: Config = toml::from_str(data).map_err(|e| e.message().trim().to_string())?;
        let mut profiles = default_profiles();
        profiles.append(&mut cfg.profiles);
        cfg.profiles = profiles;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self)?;
        crate::io::atomic_write(path, data.as_bytes())?;
        tracing::debug!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Strict mode: fail on the first error-level finding.
    pub fn check(&self) -> Result<()> {
        match self.errors().into_iter().next() {
            Some(w) => Err(MkcdError::Validation(w.message)),
            None => Ok(()),
        }
    }

    fn errors(&self) -> Vec<ConfigWarning> {
        let mut errors = Vec::new();

        if self.core.history_limit < 0 {
            errors.push(ConfigWarning::error(format!(
                "core.history_limit must be non-negative (got {})",
                self.core.history_limit
            )));
        }

        if self.safety.max_depth < 1 {
            errors.push(ConfigWarning::error(format!(
                "safety.max_depth must be at least 1 (got {})",
                self.safety.max_depth
            )));
        }

        if let Some(w) = self.dangling_default() {
            errors.push(w);
        }

        for path in &self.safety.forbidden_paths {
            if !Path::new(path).is_absolute() {
                errors.push(ConfigWarning::error(format!(
                    "forbidden path '{path}' must be absolute"
                )));
            }
        }

        errors
    }

    fn dangling_default(&self) -> Option<ConfigWarning> {
        let name = &self.core.default_profile;
        (!name.is_empty() && !self.profiles.contains_key(name)).then(|| {
            ConfigWarning::error(format!("default profile '{name}' does not exist"))
        })
    }

    /// Report mode: every finding, errors first, then advisory warnings about
    /// directories the config points at.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = self.errors();

        if !self.templates.directory.is_empty()
            && !expand(&self.templates.directory).exists()
        {
            warnings.push(ConfigWarning::warning(format!(
                "template directory does not exist: {}",
                self.templates.directory
            )));
        }

        if !self.core.temp_dir.is_empty() && !expand(&self.core.temp_dir).exists() {
            warnings.push(ConfigWarning::warning(format!(
                "temp directory does not exist: {}",
                self.core.temp_dir
            )));
        }

        warnings
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    pub fn safety_policy(&self) -> SafetyPolicy {
        SafetyPolicy::new(
            self.safety.forbidden_paths.iter().map(PathBuf::from).collect(),
            self.safety.max_depth.max(1) as usize,
        )
    }

    /// The built-in defaults layer for a merge.
    pub fn defaults_layer(&self) -> Settings {
        Settings {
            git: self.git.auto_init.then_some(true),
            editor_name: (!self.core.editor.is_empty()).then(|| self.core.editor.clone()),
            ..Settings::default()
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        expand(&self.templates.directory)
    }

    /// Base directory for `--temp` targets.
    pub fn temp_base(&self) -> PathBuf {
        if self.core.temp_dir.is_empty() {
            std::env::temp_dir()
        } else {
            expand(&self.core.temp_dir)
        }
    }

    // -----------------------------------------------------------------------
    // Profile registry
    // -----------------------------------------------------------------------

    /// Look up a profile; `None` or an empty name means the default profile.
    pub fn get_profile(&self, name: Option<&str>) -> Result<&Settings> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(n) => n,
            None if self.core.default_profile.is_empty() => {
                return Err(MkcdError::not_found("default profile", "(unset)"));
            }
            None => self.core.default_profile.as_str(),
        };
        self.profiles
            .get(name)
            .ok_or_else(|| MkcdError::not_found("profile", name))
    }

    pub fn has_profile(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Insert or replace a profile.
    pub fn set_profile(&mut self, name: &str, settings: Settings) -> Result<()> {
        validate_profile_name(name)?;
        self.profiles.insert(name.to_string(), settings);
        self.check_registry()
    }

    /// Remove a profile. Neither the current default profile nor a
    /// built-in one can be deleted; built-ins come back on every load.
    pub fn delete_profile(&mut self, name: &str) -> Result<Settings> {
        if name == self.core.default_profile {
            return Err(MkcdError::Conflict(format!(
                "cannot delete default profile '{name}'; set another default first"
            )));
        }
        if BUILTIN_PROFILES.contains(&name) {
            return Err(MkcdError::Conflict(format!(
                "cannot delete built-in profile '{name}'; edit it instead"
            )));
        }
        let removed = self
            .profiles
            .remove(name)
            .ok_or_else(|| MkcdError::not_found("profile", name))?;
        self.check_registry()?;
        Ok(removed)
    }

    /// Copy `src` to `dst`. An existing `dst` is only replaced with `overwrite`.
    pub fn copy_profile(&mut self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        let settings = self
            .profiles
            .get(src)
            .cloned()
            .ok_or_else(|| MkcdError::not_found("profile", src))?;
        if self.profiles.contains_key(dst) && !overwrite {
            return Err(MkcdError::Conflict(format!(
                "profile '{dst}' already exists (use --force to overwrite)"
            )));
        }
        self.set_profile(dst, settings)
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        if !name.is_empty() && !self.profiles.contains_key(name) {
            return Err(MkcdError::not_found("profile", name));
        }
        self.core.default_profile = name.to_string();
        self.check_registry()
    }

    fn check_registry(&self) -> Result<()> {
        match self.dangling_default() {
            Some(w) => Err(MkcdError::Validation(w.message)),
            None => Ok(()),
        }
    }
}

fn expand(raw: &str) -> PathBuf {
    paths::expand_tilde(raw).unwrap_or_else(|_| PathBuf::from(raw))
}

pub fn validate_profile_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(MkcdError::Validation(format!(
            "invalid profile name '{name}': use letters, digits, '-' or '_'"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LicenseFlavor;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(&dir.path().join("absent.conf")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.core.default_profile, "default");
        assert!(cfg.profiles.contains_key("nodejs"));
    }

    #[test]
    fn save_load_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/mkcd.conf");
        let mut cfg = Config::default();
        cfg.git.user_name = "Ada".into();
        cfg.core.editor_timeout_secs = Some(30);
        cfg.set_profile(
            "rust",
            Settings {
                git: Some(true),
                license: Some(LicenseFlavor::Apache2),
                touch: Some(vec!["Cargo.toml".into()]),
                ..Settings::default()
            },
        )
        .unwrap();

        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        loaded.save(&path).unwrap();
        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn unparseable_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(&path, "[core\nbroken").unwrap();
        assert!(matches!(Config::load(&path), Err(MkcdError::Parse { .. })));
    }

    #[test]
    fn unknown_flavor_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(&path, "[profiles.default]\ngitignore = \"cobol\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(MkcdError::Parse { .. })));
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(&path, "[git]\nuser_name = \"Ada\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.git.user_name, "Ada");
        assert_eq!(cfg.git.default_branch, "main");
        assert_eq!(cfg.safety.max_depth, 10);
        assert!(cfg.profiles.contains_key("python"));
    }

    #[test]
    fn dangling_default_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(
            &path,
            "[core]\ndefault_profile = \"ghost\"\n\n[profiles.real]\ngit = true\n",
        )
        .unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, MkcdError::Validation(_)));
        assert!(err.to_string().contains("'ghost'"));
    }

    #[test]
    fn validate_collects_every_error() {
        let mut cfg = Config::default();
        cfg.core.history_limit = -1;
        cfg.safety.max_depth = 0;
        cfg.safety.forbidden_paths.push("relative/dir".into());
        cfg.core.default_profile = "ghost".into();

        let errors: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .collect();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].message.contains("history_limit"));

        let strict = cfg.check().unwrap_err().to_string();
        assert!(strict.contains("history_limit"));
    }

    #[test]
    fn validate_warns_about_missing_directories() {
        let mut cfg = Config::default();
        cfg.templates.directory = "/definitely/not/here".into();
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| {
            w.level == WarnLevel::Warning && w.message.contains("template directory")
        }));
        assert!(cfg.check().is_ok());
    }

    #[test]
    fn get_profile_resolves_default() {
        let cfg = Config::default();
        assert!(cfg.get_profile(None).unwrap().is_empty());
        assert_eq!(
            cfg.get_profile(Some("nodejs")).unwrap().gitignore,
            Some(IgnoreFlavor::Node)
        );
        assert!(matches!(
            cfg.get_profile(Some("nope")),
            Err(MkcdError::NotFound { .. })
        ));

        let mut cfg = Config::default();
        cfg.core.default_profile.clear();
        assert!(matches!(cfg.get_profile(None), Err(MkcdError::NotFound { .. })));
    }

    #[test]
    fn deleting_default_profile_is_conflict() {
        let mut cfg = Config::default();
        let before = cfg.profiles.clone();
        let err = cfg.delete_profile("default").unwrap_err();
        assert!(matches!(err, MkcdError::Conflict(_)));
        assert_eq!(cfg.profiles, before);
        assert_eq!(cfg.core.default_profile, "default");
    }

    #[test]
    fn delete_and_copy_profiles() {
        let mut cfg = Config::default();
        cfg.set_profile("scratch", Settings::default()).unwrap();
        cfg.delete_profile("scratch").unwrap();
        assert!(!cfg.has_profile("scratch"));
        assert!(matches!(
            cfg.delete_profile("scratch"),
            Err(MkcdError::NotFound { .. })
        ));
        assert!(matches!(
            cfg.delete_profile("python"),
            Err(MkcdError::Conflict(_))
        ));
        assert!(cfg.has_profile("python"));

        cfg.copy_profile("nodejs", "node2", false).unwrap();
        assert_eq!(cfg.profiles["node2"], cfg.profiles["nodejs"]);
        assert!(matches!(
            cfg.copy_profile("dev", "node2", false),
            Err(MkcdError::Conflict(_))
        ));
        cfg.copy_profile("dev", "node2", true).unwrap();
        assert_eq!(cfg.profiles["node2"], cfg.profiles["dev"]);
    }

    #[test]
    fn set_default_requires_existing_profile() {
        let mut cfg = Config::default();
        assert!(cfg.set_default_profile("ghost").is_err());
        cfg.set_default_profile("dev").unwrap();
        assert_eq!(cfg.core.default_profile, "dev");
        assert!(matches!(
            cfg.delete_profile("default"),
            Err(MkcdError::Conflict(_))
        ));
    }

    #[test]
    fn file_profiles_extend_builtins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(&path, "[profiles.rust]
git = true
").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.profiles["rust"].git, Some(true));
        for name in BUILTIN_PROFILES {
            assert!(cfg.has_profile(name), "missing built-in {name}");
        }
        assert!(cfg.get_profile(None).unwrap().is_empty());
    }

    #[test]
    fn file_profile_replaces_builtin_of_same_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mkcd.conf");
        std::fs::write(&path, "[profiles.nodejs]
readme = true
").unwrap();
        let cfg = Config::load(&path).unwrap();
        let nodejs = &cfg.profiles["nodejs"];
        assert_eq!(nodejs.readme, Some(true));
        assert_eq!(nodejs.gitignore, None);
    }

    #[test]
    fn invalid_profile_names_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.set_profile("", Settings::default()).is_err());
        assert!(cfg.set_profile("has space", Settings::default()).is_err());
        assert!(cfg.set_profile("go_cli-2", Settings::default()).is_ok());
    }

    #[test]
    fn defaults_layer_reflects_config() {
        let mut cfg = Config::default();
        assert!(cfg.defaults_layer().is_empty());
        cfg.git.auto_init = true;
        cfg.core.editor = "hx".into();
        let layer = cfg.defaults_layer();
        assert_eq!(layer.git, Some(true));
        assert_eq!(layer.editor_name.as_deref(), Some("hx"));
    }
}
