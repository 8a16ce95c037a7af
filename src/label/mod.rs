//! SELinux label strings and container label options
//!
//! A context has the shape `user:role:type[:level]`. The level may itself
//! contain colons (`s0:c1,c2`, `s0-s0:c0.c1023`), so only the first three
//! separators split fields.

pub mod mcs;

pub use mcs::{int_to_mcs, McsPool};

use crate::error::{LabelError, LabelResult};
use std::fmt;
use std::str::FromStr;

/// Keys accepted in container label options
const VALID_OPTIONS: &[&str] = &["user", "role", "type", "level", "filetype"];

/// A parsed SELinux security context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Context {
    pub user: String,
    pub role: String,
    pub type_: String,
    pub level: String,
}

impl Context {
    /// Parse a context string
    pub fn parse(label: &str) -> LabelResult<Self> {
        let invalid = |reason: &str| LabelError::InvalidContext {
            label: label.to_string(),
            reason: reason.to_string(),
        };

        let mut fields = label.splitn(4, ':');
        let user = fields.next().unwrap_or_default();
        let role = fields.next().ok_or_else(|| invalid("missing role"))?;
        let type_ = fields.next().ok_or_else(|| invalid("missing type"))?;
        let level = fields.next().unwrap_or_default();

        if user.is_empty() || role.is_empty() || type_.is_empty() {
            return Err(invalid("empty user, role or type"));
        }

        Ok(Self {
            user: user.to_string(),
            role: role.to_string(),
            type_: type_.to_string(),
            level: level.to_string(),
        })
    }

    /// Copy of this context with a different level
    pub fn with_level(&self, level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..self.clone()
        }
    }

    /// Check if the context carries an MLS/MCS level
    pub fn has_level(&self) -> bool {
        !self.level.is_empty()
    }
}

impl FromStr for Context {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Context::parse(s)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.user, self.role, self.type_)?;
        if !self.level.is_empty() {
            write!(f, ":{}", self.level)?;
        }
        Ok(())
    }
}

/// Security options that give future container processes the same type
/// and level as `label`.
///
/// Empty unless all four fields are present.
pub fn dup_sec_opt(label: &str) -> LabelResult<Vec<String>> {
    if label.is_empty() {
        return Ok(Vec::new());
    }
    let con = Context::parse(label)?;
    if con.user.is_empty() || con.role.is_empty() || con.type_.is_empty() || !con.has_level() {
        return Ok(Vec::new());
    }

    Ok(vec![
        format!("user:{}", con.user),
        format!("role:{}", con.role),
        format!("type:{}", con.type_),
        format!("level:{}", con.level),
    ])
}

/// Security option that disables labeling for future container processes
pub fn disable_sec_opt() -> Vec<String> {
    vec!["disable".to_string()]
}

/// Append a `context=` mount option to `src`
pub fn format_mount_label(src: &str, mount_label: &str) -> String {
    if mount_label.is_empty() {
        return src.to_string();
    }
    if src.is_empty() {
        format!("context=\"{}\"", mount_label)
    } else {
        format!("{},context=\"{}\"", src, mount_label)
    }
}

/// Reject volume options that ask for both shared and private relabeling
pub fn validate(opts: &str) -> LabelResult<()> {
    if opts.contains('z') && opts.contains('Z') {
        return Err(LabelError::IncompatibleOptions);
    }
    Ok(())
}

/// Check if volume options request a shared (`z`) relabel
pub fn is_shared(opts: &str) -> bool {
    opts.contains('z')
}

/// Check if volume options request any relabel
pub fn relabel_needed(opts: &str) -> bool {
    opts.contains('z') || opts.contains('Z')
}

/// Outcome of applying container label options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOptions {
    /// `disable` was requested
    Disabled,
    /// Adjusted process and mount contexts
    Labels { process: Context, mount: Context },
}

/// Apply `key:value` options (`user`, `role`, `type`, `level`, `filetype`)
/// to a process/mount context pair.
///
/// `user` and `level` apply to both contexts, `filetype` only to the mount
/// context, and `role`/`type` only to the process context.
pub fn apply_label_options<S>(
    process: &Context,
    mount: &Context,
    options: &[S],
) -> LabelResult<LabelOptions>
where
    S: AsRef<str>,
{
    let mut pcon = process.clone();
    let mut mcon = mount.clone();

    for opt in options {
        let opt = opt.as_ref();
        if opt == "disable" {
            return Ok(LabelOptions::Disabled);
        }

        let (key, value) = opt.split_once(':').ok_or_else(|| LabelError::InvalidOption {
            option: opt.to_string(),
        })?;
        if !VALID_OPTIONS.contains(&key) {
            return Err(LabelError::InvalidOption {
                option: key.to_string(),
            });
        }

        match key {
            "filetype" => mcon.type_ = value.to_string(),
            "user" => {
                pcon.user = value.to_string();
                mcon.user = value.to_string();
            }
            "level" => {
                pcon.level = value.to_string();
                mcon.level = value.to_string();
            }
            "role" => pcon.role = value.to_string(),
            "type" => pcon.type_ = value.to_string(),
            _ => unreachable!("option keys are checked above"),
        }
    }

    Ok(LabelOptions::Labels {
        process: pcon,
        mount: mcon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_level() {
        let con: Context = "system_u:system_r:container_t:s0:c1,c2".parse().unwrap();
        assert_eq!(con.user, "system_u");
        assert_eq!(con.role, "system_r");
        assert_eq!(con.type_, "container_t");
        assert_eq!(con.level, "s0:c1,c2");
        assert_eq!(con.to_string(), "system_u:system_r:container_t:s0:c1,c2");
    }

    #[test]
    fn test_parse_without_level() {
        let tlabel = "system_u:system_r:container_t";
        let con = Context::parse(tlabel).unwrap();
        assert!(!con.has_level());
        assert_eq!(con.to_string(), tlabel);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Context::parse("").is_err());
        assert!(Context::parse("user_u").is_err());
        assert!(Context::parse("user_u:role_r").is_err());
        assert!(Context::parse("user_u::type_t").is_err());
    }

    #[test]
    fn test_with_level() {
        let con = Context::parse("u:r:t:s0:c5,c6").unwrap().with_level("s0");
        assert_eq!(con.to_string(), "u:r:t:s0");
    }

    #[test]
    fn test_duplicate_label() {
        let secopt = dup_sec_opt("system_u:system_r:container_t:s0:c1,c2").unwrap();
        assert_eq!(
            secopt,
            vec![
                "user:system_u",
                "role:system_r",
                "type:container_t",
                "level:s0:c1,c2"
            ]
        );

        // Partial labels duplicate nothing
        assert!(dup_sec_opt("system_u:system_r:container_t").unwrap().is_empty());
        assert!(dup_sec_opt("system_u::container_t:s0").unwrap().is_empty());

        assert!(dup_sec_opt("").unwrap().is_empty());
        assert!(dup_sec_opt("foobar").is_err());
        assert_eq!(disable_sec_opt(), vec!["disable"]);
    }

    #[test]
    fn test_format_mount_label() {
        assert_eq!(format_mount_label("", "foobar"), "context=\"foobar\"");
        assert_eq!(format_mount_label("src", "foobar"), "src,context=\"foobar\"");
        assert_eq!(format_mount_label("src", ""), "src");
    }

    #[test]
    fn test_validate() {
        assert_eq!(validate("zZ"), Err(LabelError::IncompatibleOptions));
        assert!(validate("Z").is_ok());
        assert!(validate("z").is_ok());
        assert!(validate("").is_ok());
    }

    #[test]
    fn test_is_shared() {
        assert!(!is_shared("Z"));
        assert!(is_shared("z"));
        assert!(is_shared("Zz"));
        assert!(relabel_needed("Z"));
        assert!(!relabel_needed("ro"));
    }

    #[test]
    fn test_apply_user_options() {
        let process = Context::parse("system_u:system_r:container_t:s0:c3,c4").unwrap();
        let mount = Context::parse("system_u:object_r:container_file_t:s0:c3,c4").unwrap();
        let opts = ["user:user_u", "role:user_r", "type:user_t", "level:s0:c1,c15"];

        match apply_label_options(&process, &mount, &opts).unwrap() {
            LabelOptions::Labels { process, mount } => {
                assert_eq!(process.to_string(), "user_u:user_r:user_t:s0:c1,c15");
                assert_eq!(mount.to_string(), "user_u:object_r:container_file_t:s0:c1,c15");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_apply_filetype_and_disable() {
        let process = Context::parse("system_u:system_r:container_t:s0").unwrap();
        let mount = Context::parse("system_u:object_r:container_file_t:s0").unwrap();

        let out = apply_label_options(&process, &mount, &["filetype:test_file_t", "level:s0:c1,c15"])
            .unwrap();
        assert_eq!(
            out,
            LabelOptions::Labels {
                process: process.with_level("s0:c1,c15"),
                mount: Context::parse("system_u:object_r:test_file_t:s0:c1,c15").unwrap(),
            }
        );

        let out = apply_label_options(&process, &mount, &["disable"]).unwrap();
        assert_eq!(out, LabelOptions::Disabled);
    }

    #[test]
    fn test_apply_bad_options() {
        let con = Context::parse("a:b:c").unwrap();
        let err = apply_label_options(&con, &con, &["user"]).unwrap_err();
        assert!(matches!(err, LabelError::InvalidOption { .. }));
        let err = apply_label_options(&con, &con, &["color:red"]).unwrap_err();
        assert_eq!(
            err,
            LabelError::InvalidOption {
                option: "color".into()
            }
        );
    }
}
