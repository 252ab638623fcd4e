use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use govis_build::BuildConfig;
use govis_common::{Diagnostic, SourceMap, SymbolInterner};
use govis_hir::{PackageId, Program};
use govis_sema::{CheckOptions, CheckReport};
use miette::{miette, IntoDiagnostic, Result};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Loads Go packages and runs the check and run pipelines over them.
pub struct Driver {
    source_map: SourceMap,
    interner: SymbolInterner,
    program: Program,
    config: BuildConfig,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            source_map: SourceMap::new(),
            interner: SymbolInterner::new(),
            program: Program::new(),
            config: BuildConfig::default(),
        }
    }

    /// Load every package of the module rooted at `root`.
    ///
    /// The module path comes from `govis.toml` or `go.mod`. Test files,
    /// hidden, `_`-prefixed and `testdata` directories, and configured
    /// excludes are skipped. Each directory is one package.
    pub fn load_dir(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = root.as_ref();
        let config = BuildConfig::load(root).into_diagnostic()?;
        let module = govis_build::module_path(&config, root)
            .into_diagnostic()?
            .ok_or_else(|| {
                Diagnostic::error(format!("no module path for {}", root.display()))
                    .with_help("add a go.mod file or set project.module in govis.toml")
            })?;
        info!(module = %module, root = %root.display(), "loading module");

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e, root, &config));

        let mut files = 0;
        for entry in walker {
            let entry = entry.into_diagnostic()?;
            if !entry.file_type().is_file() || !is_go_source(entry.path()) {
                continue;
            }

            let path = entry.path();
            let rel_dir = path
                .parent()
                .and_then(|dir| dir.strip_prefix(root).ok())
                .unwrap_or(Path::new(""));
            let import_path = import_path(&module, rel_dir);
            let content = std::fs::read_to_string(path)
                .map_err(|e| miette!("failed to read {}: {}", path.display(), e))?;

            self.add_file(&import_path, path.to_path_buf(), content)?;
            files += 1;
        }

        info!(files, packages = self.program.packages.len(), "module loaded");
        self.config = config;
        Ok(())
    }

    /// Add an in-memory file to the package at `import_path`.
    pub fn add_source(
        &mut self,
        import_path: &str,
        file_name: &str,
        content: impl Into<String>,
    ) -> Result<PackageId> {
        let path = PathBuf::from(format!("{import_path}/{file_name}"));
        self.add_file(import_path, path, content.into())
    }

    fn add_file(&mut self, import_path: &str, path: PathBuf, content: String) -> Result<PackageId> {
        let source_id = self.source_map.add_file(&path, content)?;
        let source = self
            .source_map
            .get(source_id)
            .ok_or_else(|| miette!("source file not found"))?;
        let module = govis_frontend_go::parse_file(&source, &self.interner)?;

        if let Some(pkg) = self.program.package_id(import_path) {
            let package = self.program.package(pkg);
            if package.name != module.package_name {
                let first = package
                    .files
                    .first()
                    .and_then(|f| self.source_map.get(f.source))
                    .map(|f| f.display_name())
                    .unwrap_or_default();
                let message = format!(
                    "found packages {} ({}) and {} ({}) in {}",
                    self.interner.resolve(package.name),
                    first,
                    self.interner.resolve(module.package_name),
                    source.display_name(),
                    import_path
                );
                return Err(Diagnostic::error(message)
                    .with_help("all files in one directory must share a package clause")
                    .into());
            }
        }

        debug!(
            file = %source.display_name(),
            package = %import_path,
            items = module.items.len(),
            "parsed"
        );
        Ok(self.program.add_file(import_path, module))
    }

    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            selectors: self.config.check.selectors,
            positional: self.config.check.positional,
        }
    }

    /// Run the visibility checker, returning every error found.
    pub fn check_report(&self) -> CheckReport {
        let report = govis_sema::check_program(
            &self.program,
            &self.source_map,
            &self.interner,
            &self.check_options(),
        );
        info!(errors = report.len(), "check finished");
        report
    }

    pub fn check(&self) -> Result<()> {
        self.check_report().into_result()?;
        Ok(())
    }

    /// Check the program, then run `main.main` writing to `out`.
    pub fn run(&self, out: &mut dyn Write) -> Result<()> {
        self.check()?;
        govis_eval::run_main(&self.program, &self.source_map, &self.interner, out)?;
        Ok(())
    }

    /// Loaded packages and their HIR.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for package in &self.program.packages {
            let _ = writeln!(
                out,
                "package {} ({})",
                self.interner.resolve(package.name),
                package.path
            );
            for file in &package.files {
                let name = self
                    .source_map
                    .get(file.source)
                    .map(|f| f.display_name())
                    .unwrap_or_default();
                let _ = writeln!(out, "// {name}");
                let _ = writeln!(out, "{file:#?}");
            }
        }
        out
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Get a reference to the symbol interner.
    pub fn interner(&self) -> &SymbolInterner {
        &self.interner
    }

    /// Get a reference to the source map.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}

/// `module` for the root directory, `module/a/b` below it.
pub fn import_path(module: &str, rel_dir: &Path) -> String {
    let mut path = module.to_string();
    for component in rel_dir.components() {
        path.push('/');
        path.push_str(&component.as_os_str().to_string_lossy());
    }
    path
}

fn is_skipped_dir(entry: &DirEntry, root: &Path, config: &BuildConfig) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || name.starts_with('_') || name == "testdata" {
        return true;
    }
    entry
        .path()
        .strip_prefix(root)
        .is_ok_and(|rel| config.is_excluded(rel))
}

fn is_go_source(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".go")
        && !name.ends_with("_test.go")
        && !name.starts_with('.')
        && !name.starts_with('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const USERS: &str = r#"package users

type User struct {
	Name     string
	ID       int
	password string
}

func New(name, password string) *User {
	return &User{Name: name, password: password}
}
"#;

    const MAIN_OK: &str = r#"package main

import (
	"fmt"

	"example.com/demo/users"
)

func main() {
	u := users.User{Name: "doej", ID: 101}
	fmt.Printf("User: %#v\n", u)
}
"#;

    const MAIN_PRIVATE: &str = r#"package main

import (
	"fmt"

	"example.com/demo/users"
)

func main() {
	u := users.User{Name: "doej", ID: 101, password: "xxxx"}
	fmt.Printf("User: %#v\n", u)
}
"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A module with `users` and `main` packages plus files the loader skips.
    fn demo_module(main: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "go.mod", "module example.com/demo\n\ngo 1.22\n");
        write(root, "main.go", main);
        write(root, "users/users.go", USERS);
        write(root, "users/users_test.go", "package users_test\n");
        write(root, "testdata/broken.go", "this is not go");
        write(root, "_scratch/x.go", "package scratch\n");
        write(root, ".git/hooks/x.go", "package hooks\n");
        write(root, "users/README.md", "# users\n");
        dir
    }

    fn load(root: &Path) -> Driver {
        let mut driver = Driver::new();
        driver.load_dir(root).unwrap();
        driver
    }

    fn package_paths(driver: &Driver) -> Vec<String> {
        let mut paths: Vec<String> = driver
            .program()
            .packages
            .iter()
            .map(|p| p.path.to_string())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_import_path() {
        assert_eq!(import_path("example.com/demo", Path::new("")), "example.com/demo");
        assert_eq!(
            import_path("example.com/demo", Path::new("internal/users")),
            "example.com/demo/internal/users"
        );
    }

    #[test]
    fn test_load_dir_groups_packages() {
        let dir = demo_module(MAIN_OK);
        let driver = load(dir.path());

        assert_eq!(
            package_paths(&driver),
            vec!["example.com/demo", "example.com/demo/users"]
        );
        let users = driver.program().package_id("example.com/demo/users").unwrap();
        assert_eq!(driver.program().package(users).files.len(), 1);
    }

    #[test]
    fn test_scenario_a_check_fails() {
        let dir = demo_module(MAIN_PRIVATE);
        let driver = load(dir.path());

        let report = driver.check_report();
        assert_eq!(report.len(), 1);
        insta::assert_snapshot!(
            report.errors[0].to_string(),
            @"unknown field 'password' in struct literal of type users.User"
        );
        assert!(driver.check().is_err());

        let mut out = Vec::new();
        assert!(driver.run(&mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_scenario_b_runs() {
        let dir = demo_module(MAIN_OK);
        let driver = load(dir.path());

        driver.check().unwrap();
        let mut out = Vec::new();
        driver.run(&mut out).unwrap();
        insta::assert_snapshot!(
            String::from_utf8(out).unwrap().trim_end(),
            @r#"User: users.User{Name:"doej", ID:101, password:""}"#
        );
    }

    #[test]
    fn test_config_overrides_module_and_excludes() {
        let dir = demo_module(MAIN_OK);
        let root = dir.path();
        write(
            root,
            "govis.toml",
            "[project]\nmodule = \"example.com/renamed\"\n\n[check]\nexclude = [\"legacy\"]\n",
        );
        write(root, "legacy/old.go", "package legacy\n\nfunc Old() {}\n");

        let driver = load(root);
        assert_eq!(
            package_paths(&driver),
            vec!["example.com/renamed", "example.com/renamed/users"]
        );
        assert_eq!(driver.config().check.exclude, vec!["legacy"]);
    }

    #[test]
    fn test_check_options_from_config() {
        let dir = demo_module(
            r#"package main

import "example.com/demo/users"

func main() {
	u := users.New("a", "b")
	u.password = "c"
}
"#,
        );
        let root = dir.path();

        assert_eq!(load(root).check_report().len(), 1);

        write(root, "govis.toml", "[check]\nselectors = false\n");
        let driver = load(root);
        assert!(!driver.check_options().selectors);
        assert!(driver.check_report().is_ok());
    }

    #[test]
    fn test_mixed_package_clauses() {
        let dir = demo_module(MAIN_OK);
        write(dir.path(), "users/zz.go", "package accounts\n");

        let mut driver = Driver::new();
        let err = driver.load_dir(dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("found packages users"), "{message}");
        assert!(message.contains("accounts"), "{message}");
    }

    #[test]
    fn test_missing_module_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");

        let mut driver = Driver::new();
        let err = driver.load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("no module path for"));
    }

    #[test]
    fn test_in_memory_sources() {
        let mut driver = Driver::new();
        driver
            .add_source("example.com/demo/users", "users.go", USERS)
            .unwrap();
        driver
            .add_source(
                "example.com/demo/users",
                "make.go",
                r#"package users

func Make() User {
	return User{Name: "a", ID: 1, password: "b"}
}
"#,
            )
            .unwrap();
        driver
            .add_source(
                "example.com/demo",
                "main.go",
                r#"package main

import (
	"fmt"

	"example.com/demo/users"
)

func main() {
	fmt.Printf("%+v\n", users.Make())
}
"#,
            )
            .unwrap();

        let mut out = Vec::new();
        driver.run(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{Name:a ID:1 password:b}\n");

        let dump = driver.dump();
        assert!(dump.contains("package users (example.com/demo/users)"));
        assert!(dump.contains("package main (example.com/demo)"));
    }
}
