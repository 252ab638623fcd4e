//! Reading the module path out of `go.mod`.

use std::path::Path;

use crate::{BuildError, Result};

pub const GO_MOD: &str = "go.mod";

/// The parts of `go.mod` govis uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    /// `module example.com/demo`
    pub module: String,
    /// `go 1.22`, if present.
    pub go_version: Option<String>,
}

impl GoMod {
    /// Parse `go.mod` text. Directives other than `module` and `go` are
    /// skipped, including `require (...)` blocks.
    pub fn parse(content: &str) -> Result<Self> {
        let mut module = None;
        let mut go_version = None;
        let mut in_block = false;

        for (i, raw) in content.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if in_block {
                in_block = line != ")";
                continue;
            }

            let (directive, rest) = line
                .split_once(char::is_whitespace)
                .map(|(d, r)| (d, r.trim()))
                .unwrap_or((line, ""));
            if rest == "(" || rest.ends_with('(') {
                in_block = true;
                continue;
            }

            match directive {
                "module" => {
                    if module.is_some() {
                        return Err(BuildError::GoMod {
                            line: i + 1,
                            message: "repeated module directive".into(),
                        });
                    }
                    let path = unquote(rest);
                    if path.is_empty() {
                        return Err(BuildError::GoMod {
                            line: i + 1,
                            message: "module directive without a path".into(),
                        });
                    }
                    module = Some(path.to_string());
                }
                "go" => go_version = Some(rest.to_string()),
                _ => {}
            }
        }

        Ok(Self {
            module: module.ok_or(BuildError::MissingModule)?,
            go_version,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BuildError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Read `dir/go.mod` if it exists.
    pub fn find(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(GO_MOD);
        if !path.is_file() {
            return Ok(None);
        }
        Self::from_file(&path).map(Some)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_go_mod() {
        let go_mod = GoMod::parse(
            r#"
// Demo module.
module example.com/demo // trailing comment

go 1.22

require (
    module.example/not-a-directive v1.0.0
)

require golang.org/x/text v0.14.0
"#,
        )
        .unwrap();

        assert_eq!(go_mod.module, "example.com/demo");
        assert_eq!(go_mod.go_version.as_deref(), Some("1.22"));
    }

    #[test]
    fn test_quoted_module_path() {
        let go_mod = GoMod::parse("module \"example.com/quoted\"\n").unwrap();
        assert_eq!(go_mod.module, "example.com/quoted");
    }

    #[test]
    fn test_go_mod_errors() {
        assert!(matches!(GoMod::parse("go 1.22\n"), Err(BuildError::MissingModule)));
        assert!(matches!(
            GoMod::parse("module a\nmodule b\n"),
            Err(BuildError::GoMod { line: 2, .. })
        ));
        assert!(matches!(
            GoMod::parse("module\n"),
            Err(BuildError::GoMod { line: 1, .. })
        ));
    }

    #[test]
    fn test_find() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(GoMod::find(dir.path()).unwrap(), None);

        std::fs::write(dir.path().join(GO_MOD), "module example.com/x\n").unwrap();
        let go_mod = GoMod::find(dir.path()).unwrap().unwrap();
        assert_eq!(go_mod.module, "example.com/x");
    }
}
