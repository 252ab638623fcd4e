use govis_common::{Symbol, SymbolInterner};
use govis_hir::{
    FnDef, ImportName, ItemKind, Module, PackageId, Program, StructDef, TypeDecl, TypePath, VarDef,
};
use rustc_hash::FxHashMap;

/// A file inside a package: the unit that owns an import table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileScope {
    pub pkg: PackageId,
    pub file: usize,
}

/// A package-level type declaration.
#[derive(Debug, Clone, Copy)]
pub enum TypeEntry<'p> {
    Struct(&'p StructDef),
    Decl(&'p TypeDecl),
}

/// A package-level `var`/`const` name.
#[derive(Debug, Clone, Copy)]
pub struct VarEntry<'p> {
    pub scope: FileScope,
    pub def: &'p VarDef,
    /// Position of the name inside its spec.
    pub position: usize,
}

/// What an import binds a name to. External packages (outside the loaded
/// module, like `fmt`) still shadow nothing and are never looked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTarget {
    Loaded(PackageId),
    External,
}

#[derive(Debug, Default)]
struct FileImports {
    by_name: FxHashMap<Symbol, ImportTarget>,
    dot: Vec<PackageId>,
}

#[derive(Debug, Default)]
struct PackageIndex<'p> {
    types: FxHashMap<Symbol, (FileScope, TypeEntry<'p>)>,
    methods: FxHashMap<Symbol, Vec<(FileScope, &'p FnDef)>>,
    funcs: FxHashMap<Symbol, (FileScope, &'p FnDef)>,
    vars: FxHashMap<Symbol, VarEntry<'p>>,
    files: Vec<FileImports>,
}

/// Package-level declarations and per-file import tables of a whole program.
pub struct ProgramIndex<'p> {
    program: &'p Program,
    packages: Vec<PackageIndex<'p>>,
}

impl<'p> ProgramIndex<'p> {
    pub fn build(program: &'p Program, interner: &SymbolInterner) -> Self {
        let mut packages = Vec::with_capacity(program.packages.len());

        for pkg in program.package_ids() {
            let package = program.package(pkg);
            let mut index = PackageIndex::default();

            for (file, module) in package.files.iter().enumerate() {
                let scope = FileScope { pkg, file };
                index.files.push(file_imports(program, module, interner));

                for item in &module.items {
                    match &item.kind {
                        ItemKind::Struct(def) => {
                            index.types.insert(def.name, (scope, TypeEntry::Struct(def)));
                        }
                        ItemKind::TypeDecl(decl) => {
                            index.types.insert(decl.name, (scope, TypeEntry::Decl(decl)));
                        }
                        ItemKind::Function(f) => match f.receiver_type_name() {
                            Some(recv) => index.methods.entry(recv).or_default().push((scope, f)),
                            None if f.receiver.is_none() => {
                                index.funcs.insert(f.name, (scope, f));
                            }
                            None => {}
                        },
                        ItemKind::Var(def) => {
                            for (position, &name) in def.names.iter().enumerate() {
                                index.vars.insert(
                                    name,
                                    VarEntry {
                                        scope,
                                        def,
                                        position,
                                    },
                                );
                            }
                        }
                    }
                }
            }

            tracing::trace!(
                package = %package.path,
                types = index.types.len(),
                funcs = index.funcs.len(),
                "indexed package"
            );
            packages.push(index);
        }

        Self { program, packages }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    fn package(&self, pkg: PackageId) -> &PackageIndex<'p> {
        &self.packages[pkg.0 as usize]
    }

    /// What `name` means as a package qualifier inside `scope`'s file.
    pub fn import(&self, scope: FileScope, name: Symbol) -> Option<ImportTarget> {
        self.package(scope.pkg).files[scope.file]
            .by_name
            .get(&name)
            .copied()
    }

    /// Whether `name` is declared at package level in `pkg`.
    pub fn declares(&self, pkg: PackageId, name: Symbol) -> bool {
        let index = self.package(pkg);
        index.types.contains_key(&name)
            || index.funcs.contains_key(&name)
            || index.vars.contains_key(&name)
    }

    /// Resolve a type name as written in `scope` to its declaration.
    pub fn lookup_type(&self, path: &TypePath, scope: FileScope) -> Option<(FileScope, TypeEntry<'p>)> {
        match path.qualifier {
            Some(qualifier) => match self.import(scope, qualifier)? {
                ImportTarget::Loaded(pkg) => self.package(pkg).types.get(&path.name).copied(),
                ImportTarget::External => None,
            },
            None => {
                let index = self.package(scope.pkg);
                if let Some(entry) = index.types.get(&path.name) {
                    return Some(*entry);
                }
                index.files[scope.file]
                    .dot
                    .iter()
                    .find_map(|&pkg| self.package(pkg).types.get(&path.name).copied())
            }
        }
    }

    pub fn methods(&self, pkg: PackageId, type_name: Symbol) -> &[(FileScope, &'p FnDef)] {
        self.package(pkg)
            .methods
            .get(&type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn func(&self, pkg: PackageId, name: Symbol) -> Option<(FileScope, &'p FnDef)> {
        self.package(pkg).funcs.get(&name).copied()
    }

    pub fn var(&self, pkg: PackageId, name: Symbol) -> Option<VarEntry<'p>> {
        self.package(pkg).vars.get(&name).copied()
    }

    pub fn module(&self, scope: FileScope) -> &'p Module {
        &self.program.package(scope.pkg).files[scope.file]
    }
}

fn file_imports(program: &Program, module: &Module, interner: &SymbolInterner) -> FileImports {
    let mut imports = FileImports::default();

    for import in &module.imports {
        let loaded = program.package_id(&import.path);
        let target = loaded.map_or(ImportTarget::External, ImportTarget::Loaded);

        let bound = match import.name {
            ImportName::Blank => continue,
            ImportName::Dot => {
                if let Some(pkg) = loaded {
                    imports.dot.push(pkg);
                }
                continue;
            }
            ImportName::Alias(alias) => alias,
            ImportName::Default => match loaded {
                Some(pkg) => program.package(pkg).name,
                None => {
                    let last = import.path.rsplit('/').next().unwrap_or(import.path.as_str());
                    interner.intern(last)
                }
            },
        };
        imports.by_name.insert(bound, target);
    }

    imports
}
