//! Path safety policy: which paths mkcd is allowed to create or touch.

use crate::error::{MkcdError, Result};
use crate::paths;
use regex::Regex;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterRule {
    NullByte,
    ReservedGlyphs,
    EdgeWhitespace,
    ExcessiveDots,
}

impl CharacterRule {
    pub fn all() -> &'static [CharacterRule] {
        &[
            CharacterRule::NullByte,
            CharacterRule::ReservedGlyphs,
            CharacterRule::EdgeWhitespace,
            CharacterRule::ExcessiveDots,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyPolicy {
    pub forbidden_prefixes: Vec<PathBuf>,
    pub max_depth: usize,
    pub character_rules: Vec<CharacterRule>,
}

impl SafetyPolicy {
    pub fn new(forbidden_prefixes: Vec<PathBuf>, max_depth: usize) -> Self {
        Self {
            forbidden_prefixes,
            max_depth,
            character_rules: CharacterRule::all().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// SafetyViolation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyViolation {
    Empty,
    Traversal,
    HomeUnresolved,
    TooDeep { depth: usize, max: usize },
    Forbidden { prefix: PathBuf },
    NullByte,
    ReservedCharacter(char),
    EdgeWhitespace { segment: String },
    ExcessiveDots { segment: String },
}

impl SafetyViolation {
    /// Short rule name, stable for scripting and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            SafetyViolation::Empty => "empty",
            SafetyViolation::Traversal => "traversal",
            SafetyViolation::HomeUnresolved => "home",
            SafetyViolation::TooDeep { .. } => "depth",
            SafetyViolation::Forbidden { .. } => "forbidden",
            SafetyViolation::NullByte
            | SafetyViolation::ReservedCharacter(_)
            | SafetyViolation::EdgeWhitespace { .. }
            | SafetyViolation::ExcessiveDots { .. } => "characters",
        }
    }
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyViolation::Empty => f.write_str("path is empty or names the current directory"),
            SafetyViolation::Traversal => f.write_str("path contains a '..' component"),
            SafetyViolation::HomeUnresolved => f.write_str("cannot expand '~': home directory unknown"),
            SafetyViolation::TooDeep { depth, max } => {
                write!(f, "path depth {depth} exceeds maximum allowed depth {max}")
            }
            SafetyViolation::Forbidden { prefix } => {
                write!(f, "path is forbidden by safety prefix {}", prefix.display())
            }
            SafetyViolation::NullByte => f.write_str("path contains a null byte"),
            SafetyViolation::ReservedCharacter(c) => {
                write!(f, "path contains reserved character '{c}'")
            }
            SafetyViolation::EdgeWhitespace { segment } => {
                write!(f, "segment '{segment}' has leading or trailing whitespace")
            }
            SafetyViolation::ExcessiveDots { segment } => {
                write!(f, "segment '{segment}' contains three or more consecutive dots")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PathValidator
// ---------------------------------------------------------------------------

static RESERVED_RE: OnceLock<Regex> = OnceLock::new();
static DOTS_RE: OnceLock<Regex> = OnceLock::new();

fn reserved_re() -> &'static Regex {
    RESERVED_RE.get_or_init(|| Regex::new(r#"[<>:"|?*]"#).unwrap())
}

fn dots_re() -> &'static Regex {
    DOTS_RE.get_or_init(|| Regex::new(r"\.{3,}").unwrap())
}

pub struct PathValidator {
    policy: SafetyPolicy,
    base: PathBuf,
}

impl PathValidator {
    /// Relative paths are resolved against the current working directory.
    pub fn new(policy: SafetyPolicy) -> Self {
        let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::with_base(policy, base)
    }

    pub fn with_base(policy: SafetyPolicy, base: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            base: base.into(),
        }
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Strict mode: the first violated rule wins. Returns the normalized
    /// absolute path on success.
    pub fn validate(&self, raw: &str) -> Result<PathBuf> {
        let (resolved, violations) = self.inspect(raw, true);
        match violations.into_iter().next() {
            Some(violation) => Err(MkcdError::Safety {
                path: raw.to_string(),
                violation,
            }),
            None => Ok(resolved.unwrap_or_else(|| PathBuf::from(raw))),
        }
    }

    /// Report mode: every violated rule, in rule order.
    pub fn check(&self, raw: &str) -> Vec<SafetyViolation> {
        self.inspect(raw, false).1
    }

    fn inspect(&self, raw: &str, stop_first: bool) -> (Option<PathBuf>, Vec<SafetyViolation>) {
        let mut found = Vec::new();

        // 1. Normalize. A bare `.` names no new directory.
        let only_cur_dir = Path::new(raw.trim())
            .components()
            .all(|c| c == Component::CurDir);
        let resolved = if only_cur_dir {
            found.push(SafetyViolation::Empty);
            None
        } else if Path::new(raw).components().any(|c| c == Component::ParentDir) {
            found.push(SafetyViolation::Traversal);
            None
        } else {
            match paths::absolutize(raw, &self.base) {
                Ok(p) => Some(p),
                Err(_) => {
                    found.push(SafetyViolation::HomeUnresolved);
                    None
                }
            }
        };
        if stop_first && !found.is_empty() {
            return (None, found);
        }

        if let Some(path) = &resolved {
            // 2. Depth
            let depth = paths::depth(path);
            if depth > self.policy.max_depth {
                found.push(SafetyViolation::TooDeep {
                    depth,
                    max: self.policy.max_depth,
                });
                if stop_first {
                    return (resolved, found);
                }
            }

            // 3. Forbidden prefixes
            if let Some(prefix) = self.forbidden_match(path) {
                found.push(SafetyViolation::Forbidden { prefix });
                if stop_first {
                    return (resolved, found);
                }
            }
        }

        // 4. Characters
        for v in self.character_violations(raw) {
            found.push(v);
            if stop_first {
                break;
            }
        }

        (resolved, found)
    }

    fn forbidden_match(&self, path: &Path) -> Option<PathBuf> {
        self.policy.forbidden_prefixes.iter().find_map(|prefix| {
            let prefix = paths::normalize(prefix);
            let exact = path == prefix;
            // A bare root only forbids itself, never everything beneath it.
            let nested = paths::depth(&prefix) > 0 && path.starts_with(&prefix);
            (exact || nested).then_some(prefix)
        })
    }

    fn character_violations(&self, raw: &str) -> Vec<SafetyViolation> {
        let rules = &self.policy.character_rules;
        let mut out = Vec::new();

        if rules.contains(&CharacterRule::NullByte) && raw.contains('\0') {
            out.push(SafetyViolation::NullByte);
        }
        if rules.contains(&CharacterRule::ReservedGlyphs) {
            if let Some(m) = reserved_re().find(raw) {
                let c = m.as_str().chars().next().unwrap_or('?');
                out.push(SafetyViolation::ReservedCharacter(c));
            }
        }
        let segments = raw.split(['/', '\\']).filter(|s| !s.is_empty());
        for segment in segments {
            if rules.contains(&CharacterRule::EdgeWhitespace) && segment.trim() != segment {
                out.push(SafetyViolation::EdgeWhitespace {
                    segment: segment.to_string(),
                });
            }
            if rules.contains(&CharacterRule::ExcessiveDots) && dots_re().is_match(segment) {
                out.push(SafetyViolation::ExcessiveDots {
                    segment: segment.to_string(),
                });
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(forbidden: &[&str], max_depth: usize) -> PathValidator {
        let policy = SafetyPolicy::new(forbidden.iter().map(PathBuf::from).collect(), max_depth);
        PathValidator::with_base(policy, "/home/dev")
    }

    fn violation(result: Result<PathBuf>) -> SafetyViolation {
        match result {
            Err(MkcdError::Safety { violation, .. }) => violation,
            other => panic!("expected safety error, got {other:?}"),
        }
    }

    #[test]
    fn etc_passwd_is_forbidden() {
        let v = validator(&["/", "/etc"], 10);
        let err = violation(v.validate("/etc/passwd"));
        assert_eq!(err.kind(), "forbidden");
        assert_eq!(
            err,
            SafetyViolation::Forbidden {
                prefix: PathBuf::from("/etc")
            }
        );
    }

    #[test]
    fn forbidden_prefix_is_component_delimited() {
        let v = validator(&["/etc"], 10);
        assert!(v.validate("/etc").is_err());
        assert!(v.validate("/etc/").is_err());
        assert_eq!(v.validate("/etcetera").unwrap(), PathBuf::from("/etcetera"));
    }

    #[test]
    fn bare_root_only_forbids_itself() {
        let v = validator(&["/"], 10);
        assert!(v.validate("/").is_err());
        assert!(v.validate("/tmp/project").is_ok());
    }

    #[test]
    fn depth_boundary() {
        let v = validator(&[], 3);
        assert!(v.validate("/a/b/c").is_ok());
        let err = violation(v.validate("/a/b/c/d"));
        assert_eq!(err, SafetyViolation::TooDeep { depth: 4, max: 3 });
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let v = validator(&[], 3);
        assert_eq!(v.validate("proj").unwrap(), PathBuf::from("/home/dev/proj"));
        assert!(v.validate("proj/sub").is_err());
    }

    #[test]
    fn traversal_and_empty_rejected() {
        let v = validator(&[], 10);
        assert_eq!(violation(v.validate("../escape")), SafetyViolation::Traversal);
        assert_eq!(violation(v.validate("a/../../b")), SafetyViolation::Traversal);
        assert_eq!(violation(v.validate("   ")), SafetyViolation::Empty);
    }

    #[test]
    fn current_directory_alone_is_empty() {
        let v = validator(&[], 10);
        assert_eq!(violation(v.validate(".")), SafetyViolation::Empty);
        assert_eq!(violation(v.validate("./")), SafetyViolation::Empty);
        assert_eq!(v.validate("./proj").unwrap(), PathBuf::from("/home/dev/proj"));
    }

    #[test]
    fn character_rules() {
        let v = validator(&[], 10);
        assert_eq!(violation(v.validate("/tmp/a\0b")), SafetyViolation::NullByte);
        assert_eq!(
            violation(v.validate("/tmp/what?")),
            SafetyViolation::ReservedCharacter('?')
        );
        assert_eq!(violation(v.validate("/tmp/proj ")).kind(), "characters");
        assert_eq!(
            violation(v.validate("/tmp/a...b")),
            SafetyViolation::ExcessiveDots {
                segment: "a...b".to_string()
            }
        );
        // Two dots inside a name are not traversal
        assert!(v.validate("/tmp/v1..2").is_ok());
    }

    #[test]
    fn report_mode_collects_every_violation() {
        let v = validator(&["/etc"], 2);
        let found = v.check("/etc/x/y...z?");
        let kinds: Vec<_> = found.iter().map(|f| f.kind()).collect();
        assert_eq!(kinds, vec!["depth", "forbidden", "characters", "characters"]);
    }

    #[test]
    fn strict_mode_reports_first_rule() {
        let v = validator(&["/etc"], 1);
        assert_eq!(violation(v.validate("/etc/a/b")).kind(), "depth");
    }
}
