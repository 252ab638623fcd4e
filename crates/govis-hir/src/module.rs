use govis_common::{SourceId, Span, Symbol};
use smol_str::SmolStr;
use crate::item::Item;

/// How an import binds its package in the importing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportName {
    /// `import "a/b"`: bound under the imported package's own name.
    Default,
    /// `import x "a/b"`
    Alias(Symbol),
    /// `import . "a/b"`
    Dot,
    /// `import _ "a/b"`
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub name: ImportName,
    pub path: SmolStr,
    pub span: Span,
}

/// One Go source file.
#[derive(Debug, Clone)]
pub struct Module {
    /// The name from the `package` clause.
    pub package_name: Symbol,
    pub source: SourceId,
    pub imports: Vec<Import>,
    pub items: Vec<Item>,
}

impl Module {
    pub fn new(package_name: Symbol, source: SourceId) -> Self {
        Self {
            package_name,
            source,
            imports: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }
}

/// Index of a package inside a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub u32);

/// All files sharing one directory (and therefore one import path).
#[derive(Debug, Clone)]
pub struct Package {
    /// Import path, the package's identity.
    pub path: SmolStr,
    /// Package clause name, used to qualify types in messages.
    pub name: Symbol,
    pub files: Vec<Module>,
}

impl Package {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.files.iter().flat_map(|f| f.items.iter())
    }
}

/// The whole program: every loaded package.
#[derive(Debug, Default)]
pub struct Program {
    pub packages: Vec<Package>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the package at `path`, creating the package on first use.
    /// The first file's package clause names the package.
    pub fn add_file(&mut self, path: &str, module: Module) -> PackageId {
        if let Some(id) = self.package_id(path) {
            self.packages[id.0 as usize].files.push(module);
            return id;
        }
        let id = PackageId(self.packages.len() as u32);
        self.packages.push(Package {
            path: SmolStr::new(path),
            name: module.package_name,
            files: vec![module],
        });
        id
    }

    pub fn package_id(&self, path: &str) -> Option<PackageId> {
        self.packages
            .iter()
            .position(|p| p.path.as_str() == path)
            .map(|i| PackageId(i as u32))
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0 as usize]
    }

    pub fn package_ids(&self) -> impl Iterator<Item = PackageId> {
        (0..self.packages.len() as u32).map(PackageId)
    }
}
