use miette::NamedSource;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Unique identifier for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// A Go source file with its contents.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: SourceId,
    pub path: PathBuf,
    pub content: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    pub fn new(id: SourceId, path: PathBuf, content: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(i, _)| i as u32 + 1))
            .collect();

        Self {
            id,
            path,
            content,
            line_starts,
        }
    }

    /// Get line and column (0-indexed) from byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let col = offset - self.line_starts[line];
        (line as u32, col)
    }

    /// Get the content of a specific line.
    pub fn line(&self, line: u32) -> &str {
        let start = self.line_starts[line as usize] as usize;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .map(|&e| e as usize)
            .unwrap_or(self.content.len());
        self.content[start..end].trim_end_matches('\n')
    }

    /// The file name as shown in rendered diagnostics.
    pub fn display_name(&self) -> String {
        self.path.display().to_string()
    }

    /// Source code handle for miette reports.
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.display_name(), self.content.clone()).with_language("go")
    }
}

/// Registry of all source files.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: RwLock<Vec<SourceFile>>,
    path_to_id: RwLock<FxHashMap<PathBuf, SourceId>>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: String) -> miette::Result<SourceId> {
        let path = path.as_ref().to_path_buf();

        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            return Err(miette::miette!("Not a Go source file: {}", path.display()));
        }

        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let mut path_to_id = self.path_to_id.write().unwrap_or_else(|e| e.into_inner());

        if let Some(&id) = path_to_id.get(&path) {
            files[id.0 as usize] = SourceFile::new(id, path, content);
            return Ok(id);
        }

        let id = SourceId(files.len() as u32);
        let file = SourceFile::new(id, path.clone(), content);
        files.push(file);
        path_to_id.insert(path, id);

        Ok(id)
    }

    pub fn get(&self, id: SourceId) -> Option<SourceFile> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(id.0 as usize).cloned()
    }

    pub fn get_by_path(&self, path: impl AsRef<Path>) -> Option<SourceFile> {
        let path_to_id = self.path_to_id.read().unwrap_or_else(|e| e.into_inner());
        let id = path_to_id.get(path.as_ref())?;
        self.get(*id)
    }

    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let map = SourceMap::new();
        let id = map
            .add_file("users/users.go", "package users\n\ntype User struct{}\n".to_string())
            .unwrap();
        let file = map.get(id).unwrap();

        assert_eq!(file.line_col(0), (0, 0));
        assert_eq!(file.line_col(15), (2, 0));
        assert_eq!(file.line(2), "type User struct{}");
    }

    #[test]
    fn test_rejects_non_go_files() {
        let map = SourceMap::new();
        assert!(map.add_file("main.rs", String::new()).is_err());
        assert!(map.is_empty());
    }

    #[test]
    fn test_re_adding_a_path_replaces_contents() {
        let map = SourceMap::new();
        let first = map.add_file("main.go", "package main".to_string()).unwrap();
        let second = map.add_file("main.go", "package other".to_string()).unwrap();

        assert_eq!(first, second);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get_by_path("main.go").unwrap().content, "package other");
    }
}
