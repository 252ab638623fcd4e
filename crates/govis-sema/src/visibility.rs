use govis_hir::{PackageId, Visibility};

/// Outcome of a single access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Access::Allowed
    }
}

/// Decide whether code in `accessing` may name something declared in
/// `declaring` with visibility `vis`.
pub fn check_access(vis: Visibility, declaring: PackageId, accessing: PackageId) -> Access {
    if declaring == accessing || vis.is_exported() {
        Access::Allowed
    } else {
        Access::Denied
    }
}

/// The exported form of an identifier: `password` -> `Password`.
pub fn exported_spelling(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: PackageId = PackageId(0);
    const MAIN: PackageId = PackageId(1);

    #[test]
    fn test_private_only_same_package() {
        assert_eq!(check_access(Visibility::Private, USERS, USERS), Access::Allowed);
        assert_eq!(check_access(Visibility::Private, USERS, MAIN), Access::Denied);
    }

    #[test]
    fn test_exported_visible_everywhere() {
        assert!(check_access(Visibility::Exported, USERS, USERS).is_allowed());
        assert!(check_access(Visibility::Exported, USERS, MAIN).is_allowed());
    }

    #[test]
    fn test_naming_convention_drives_access() {
        for (name, from_main) in [("Name", true), ("ID", true), ("password", false), ("_x", false)] {
            let vis = Visibility::from_ident(name);
            assert_eq!(check_access(vis, USERS, MAIN).is_allowed(), from_main, "{name}");
            assert!(check_access(vis, USERS, USERS).is_allowed(), "{name}");
        }
    }

    #[test]
    fn test_exported_spelling() {
        assert_eq!(exported_spelling("password"), "Password");
        assert_eq!(exported_spelling("ñame"), "Ñame");
        assert_eq!(exported_spelling(""), "");
    }
}
