//! Settings layers and the merge that turns them into one resolved plan.
//!
//! A layer only carries what it explicitly sets: every field is an `Option`
//! so "not set" is distinguishable from "set to false" or "set to empty".

use crate::error::{MkcdError, Result};
use crate::io;
use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// IgnoreFlavor / LicenseFlavor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreFlavor {
    Go,
    Node,
    Python,
    General,
}

impl IgnoreFlavor {
    pub fn all() -> &'static [IgnoreFlavor] {
        &[
            IgnoreFlavor::Go,
            IgnoreFlavor::Node,
            IgnoreFlavor::Python,
            IgnoreFlavor::General,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreFlavor::Go => "go",
            IgnoreFlavor::Node => "node",
            IgnoreFlavor::Python => "python",
            IgnoreFlavor::General => "general",
        }
    }
}

impl fmt::Display for IgnoreFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IgnoreFlavor {
    type Err = MkcdError;

    fn from_str(s: &str) -> Result<Self> {
        IgnoreFlavor::all()
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MkcdError::not_found("gitignore flavor", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseFlavor {
    #[serde(rename = "mit")]
    Mit,
    #[serde(rename = "apache-2.0")]
    Apache2,
}

impl LicenseFlavor {
    pub fn all() -> &'static [LicenseFlavor] {
        &[LicenseFlavor::Mit, LicenseFlavor::Apache2]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LicenseFlavor::Mit => "mit",
            LicenseFlavor::Apache2 => "apache-2.0",
        }
    }
}

impl fmt::Display for LicenseFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseFlavor {
    type Err = MkcdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mit" => Ok(LicenseFlavor::Mit),
            "apache-2.0" | "apache2" | "apache" => Ok(LicenseFlavor::Apache2),
            _ => Err(MkcdError::not_found("license flavor", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings (one layer)
// ---------------------------------------------------------------------------

/// One layer of options: built-in defaults, a named profile, or the
/// invocation's explicit flags. Profiles are persisted in this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<bool>,
    /// Editor to launch; `None` means auto-detect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<bool>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub gitignore: Option<IgnoreFlavor>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub license: Option<LicenseFlavor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<String>,
}

/// A hand-edited `gitignore = ""` means "no flavor", not a parse error.
fn blank_as_none<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr<Err = MkcdError>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl Settings {
    pub fn is_empty(&self) -> bool {
        *self == Settings::default()
    }

    /// Short human summary, e.g. `Git, Editor, Template:nodejs`.
    pub fn describe(&self) -> String {
        let mut features = Vec::new();
        if self.git == Some(true) {
            features.push("Git".to_string());
        }
        if self.editor == Some(true) {
            features.push("Editor".to_string());
        }
        if self.readme == Some(true) {
            features.push("README".to_string());
        }
        if let Some(t) = &self.template {
            features.push(format!("Template:{t}"));
        }
        if let Some(g) = self.gitignore {
            features.push(format!("Gitignore:{g}"));
        }
        if let Some(l) = self.license {
            features.push(format!("License:{l}"));
        }
        if features.is_empty() {
            "Basic profile".to_string()
        } else {
            features.join(", ")
        }
    }
}

// ---------------------------------------------------------------------------
// ResolvedPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedPlan {
    pub git: bool,
    pub git_remote: Option<String>,
    pub template: Option<String>,
    pub editor: bool,
    pub editor_name: Option<String>,
    pub readme: bool,
    pub gitignore: Option<IgnoreFlavor>,
    pub license: Option<LicenseFlavor>,
    pub touch: Vec<String>,
    pub mode: Option<String>,
    pub parent_mode: Option<String>,
    pub symlink: Option<String>,
    pub temp: bool,
    pub expire: Option<String>,
}

fn any_true(layers: [Option<bool>; 3]) -> bool {
    layers.into_iter().any(|b| b == Some(true))
}

fn first_set<T: Clone>(layers: [&Option<T>; 3]) -> Option<T> {
    layers.into_iter().find_map(|v| v.clone())
}

fn first_non_empty(layers: [&Option<Vec<String>>; 3]) -> Vec<String> {
    layers
        .into_iter()
        .flatten()
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Merge a profile layer with the invocation layer over empty defaults.
pub fn merge(profile: &Settings, invocation: &Settings) -> ResolvedPlan {
    merge_layers(&Settings::default(), profile, invocation)
}

/// Field-by-field precedence, invocation → profile → defaults.
///
/// Booleans are OR-ed across all layers, so a lower layer can never switch off
/// a feature a higher layer enabled. Scalars take the first layer that sets
/// them. Lists are replaced wholesale by the first non-empty layer.
pub fn merge_layers(defaults: &Settings, profile: &Settings, invocation: &Settings) -> ResolvedPlan {
    let (d, p, i) = (defaults, profile, invocation);
    let editor_name = first_set([&i.editor_name, &p.editor_name, &d.editor_name]);
    ResolvedPlan {
        git: any_true([i.git, p.git, d.git]),
        git_remote: first_set([&i.git_remote, &p.git_remote, &d.git_remote]),
        template: first_set([&i.template, &p.template, &d.template]),
        // Naming an editor on the command line is a request to launch it.
        editor: any_true([i.editor, p.editor, d.editor]) || i.editor_name.is_some(),
        editor_name,
        readme: any_true([i.readme, p.readme, d.readme]),
        gitignore: first_set([&i.gitignore, &p.gitignore, &d.gitignore]),
        license: first_set([&i.license, &p.license, &d.license]),
        touch: first_non_empty([&i.touch, &p.touch, &d.touch]),
        mode: first_set([&i.mode, &p.mode, &d.mode]),
        parent_mode: first_set([&i.parent_mode, &p.parent_mode, &d.parent_mode]),
        symlink: first_set([&i.symlink, &p.symlink, &d.symlink]),
        temp: any_true([i.temp, p.temp, d.temp]),
        expire: first_set([&i.expire, &p.expire, &d.expire]),
    }
}

// ---------------------------------------------------------------------------
// Plan checks
// ---------------------------------------------------------------------------

static EXPIRE_RE: OnceLock<Regex> = OnceLock::new();

fn expire_re() -> &'static Regex {
    EXPIRE_RE.get_or_init(|| Regex::new(r"^(\d+)\s*(s|m|h|d|w)$").unwrap())
}

/// Parse durations like `30m`, `1h`, `7d`, `2w`.
pub fn parse_expiry(raw: &str) -> Result<Duration> {
    let invalid = || MkcdError::InvalidPlan(format!(
        "expiry '{raw}' is not a duration (expected e.g. 30m, 1h, 7d, 2w)"
    ));
    let caps = expire_re().captures(raw.trim()).ok_or_else(invalid)?;
    let n: i64 = caps[1].parse().map_err(|_| invalid())?;
    let secs = match &caps[2] {
        "s" => n.checked_mul(1),
        "m" => n.checked_mul(60),
        "h" => n.checked_mul(3_600),
        "d" => n.checked_mul(86_400),
        _ => n.checked_mul(604_800),
    }
    .ok_or_else(invalid)?;
    if n == 0 {
        return Err(invalid());
    }
    Duration::try_seconds(secs).ok_or_else(invalid)
}

pub fn validate_remote_url(url: &str) -> Result<()> {
    const PREFIXES: &[&str] = &["https://", "http://", "git://", "ssh://", "git@"];
    if url.trim().is_empty() {
        return Err(MkcdError::InvalidPlan("remote URL cannot be empty".into()));
    }
    if PREFIXES.iter().any(|p| url.starts_with(p)) {
        Ok(())
    } else {
        Err(MkcdError::InvalidPlan(format!(
            "invalid git remote URL '{url}': expected one of {}",
            PREFIXES.join(", ")
        )))
    }
}

impl ResolvedPlan {
    /// Reject plans whose options cannot be satisfied together, and options
    /// whose values do not parse.
    pub fn check(&self) -> Result<()> {
        if let Some(target) = &self.symlink {
            let conflicts = [
                ("temp", self.temp),
                ("git_remote", self.git_remote.is_some()),
                ("mode", self.mode.is_some()),
            ];
            if let Some((name, _)) = conflicts.iter().find(|(_, on)| *on) {
                return Err(MkcdError::InvalidPlan(format!(
                    "symlink to '{target}' cannot be combined with {name}"
                )));
            }
        }
        if let Some(mode) = &self.mode {
            io::parse_mode(mode)?;
        }
        if let Some(mode) = &self.parent_mode {
            io::parse_mode(mode)?;
        }
        if let Some(expire) = &self.expire {
            parse_expiry(expire)?;
        }
        if let Some(url) = &self.git_remote {
            validate_remote_url(url)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn nodejs() -> Settings {
        Settings {
            git: Some(true),
            editor: Some(true),
            template: Some("nodejs".into()),
            gitignore: Some(IgnoreFlavor::Node),
            touch: Some(vec!["package.json".into(), "index.js".into()]),
            ..Settings::default()
        }
    }

    #[test]
    fn invocation_scalar_overrides_profile() {
        let invocation = Settings {
            gitignore: Some(IgnoreFlavor::Python),
            ..Settings::default()
        };
        let plan = merge(&nodejs(), &invocation);
        assert_eq!(plan.gitignore, Some(IgnoreFlavor::Python));
        assert_eq!(plan.touch, vec!["package.json", "index.js"]);
        assert!(plan.git);
        assert_eq!(plan.template.as_deref(), Some("nodejs"));
    }

    #[test]
    fn profile_booleans_cannot_be_disabled_by_invocation() {
        let invocation = Settings {
            git: Some(false),
            ..Settings::default()
        };
        assert!(merge(&nodejs(), &invocation).git);
        assert!(merge(&nodejs(), &Settings::default()).git);
    }

    #[test]
    fn lists_replace_wholesale() {
        let invocation = Settings {
            touch: Some(vec!["server.js".into()]),
            ..Settings::default()
        };
        assert_eq!(merge(&nodejs(), &invocation).touch, vec!["server.js"]);

        let empty = Settings {
            touch: Some(vec![]),
            ..Settings::default()
        };
        assert_eq!(merge(&nodejs(), &empty).touch, vec!["package.json", "index.js"]);
    }

    #[test]
    fn defaults_fill_remaining_gaps() {
        let defaults = Settings {
            git: Some(true),
            editor_name: Some("vim".into()),
            ..Settings::default()
        };
        let plan = merge_layers(&defaults, &Settings::default(), &Settings::default());
        assert!(plan.git);
        assert!(!plan.editor);
        assert_eq!(plan.editor_name.as_deref(), Some("vim"));
    }

    #[test]
    fn naming_an_editor_enables_launch() {
        let invocation = Settings {
            editor_name: Some("nvim".into()),
            ..Settings::default()
        };
        let plan = merge(&Settings::default(), &invocation);
        assert!(plan.editor);
    }

    #[test]
    fn symlink_conflicts_are_rejected() {
        let plan = ResolvedPlan {
            symlink: Some("/srv/data".into()),
            git_remote: Some("git@github.com:me/x.git".into()),
            ..ResolvedPlan::default()
        };
        let err = plan.check().unwrap_err().to_string();
        assert!(err.contains("git_remote"), "{err}");

        let plan = ResolvedPlan {
            symlink: Some("/srv/data".into()),
            temp: true,
            ..ResolvedPlan::default()
        };
        assert!(plan.check().is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        let plan = ResolvedPlan {
            mode: Some("abc".into()),
            ..ResolvedPlan::default()
        };
        assert!(plan.check().is_err());
        let plan = ResolvedPlan {
            git_remote: Some("ftp://example.com/x".into()),
            ..ResolvedPlan::default()
        };
        assert!(plan.check().is_err());
        let plan = ResolvedPlan {
            expire: Some("soon".into()),
            ..ResolvedPlan::default()
        };
        assert!(plan.check().is_err());
    }

    #[test]
    fn expiry_units() {
        assert_eq!(parse_expiry("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_expiry("1h").unwrap(), Duration::hours(1));
        assert_eq!(parse_expiry("2w").unwrap(), Duration::days(14));
        assert!(parse_expiry("0h").is_err());
        assert!(parse_expiry("1y").is_err());
    }

    #[test]
    fn flavor_lookup_reports_unknown_names() {
        assert_eq!("Node".parse::<IgnoreFlavor>().unwrap(), IgnoreFlavor::Node);
        assert_eq!(
            "apache-2.0".parse::<LicenseFlavor>().unwrap(),
            LicenseFlavor::Apache2
        );
        let err = "rust".parse::<IgnoreFlavor>().unwrap_err().to_string();
        assert!(err.contains("gitignore flavor 'rust' not found"), "{err}");
    }

    #[test]
    fn profile_toml_omits_unset_fields() {
        let text = toml::to_string(&nodejs()).unwrap();
        assert!(text.contains("gitignore = \"node\""));
        assert!(!text.contains("license"));
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, nodejs());
    }

    #[test]
    fn blank_flavors_read_as_unset() {
        let parsed: Settings = toml::from_str("gitignore = \"\"\nlicense = \" \"\n").unwrap();
        assert!(parsed.is_empty());

        let parsed: Settings = toml::from_str("license = \"Apache\"\n").unwrap();
        assert_eq!(parsed.license, Some(LicenseFlavor::Apache2));
        assert!(toml::from_str::<Settings>("gitignore = \"cobol\"\n").is_err());
    }
}
