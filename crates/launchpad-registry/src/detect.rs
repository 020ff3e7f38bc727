//! Heuristic stack and package-manager detection over a checkout.

use std::path::Path;

use serde::Serialize;

use crate::entry::StackKind;

const NEXT_CONFIGS: [&str; 3] = ["next.config.js", "next.config.mjs", "next.config.ts"];
const VITE_CONFIGS: [&str; 3] = ["vite.config.js", "vite.config.ts", "vite.config.mjs"];

/// JavaScript package manager inferred from lock files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// `pnpm-lock.yaml`.
    Pnpm,
    /// `package-lock.json`.
    Npm,
    /// `yarn.lock`.
    Yarn,
}

impl PackageManager {
    /// Returns the executable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pnpm => "pnpm",
            Self::Npm => "npm",
            Self::Yarn => "yarn",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers the stack family of the checkout at `dir`.
///
/// Markers are checked in priority order; the first hit wins.
#[must_use]
pub fn detect_stack(dir: &Path) -> StackKind {
    let has = |name: &str| dir.join(name).exists();
    if has("streamlit_app.py") {
        return StackKind::Python;
    }
    if NEXT_CONFIGS.iter().chain(VITE_CONFIGS.iter()).any(|n| has(n)) || has("package.json") {
        return StackKind::Node;
    }
    if dir.join("app").join("main.py").exists()
        || has("pyproject.toml")
        || has("requirements.txt")
    {
        return StackKind::Python;
    }
    if has("index.html") {
        return StackKind::Static;
    }
    StackKind::Unknown
}

/// Infers the package manager from lock files in `dir`.
#[must_use]
pub fn detect_package_manager(dir: &Path) -> Option<PackageManager> {
    [
        ("pnpm-lock.yaml", PackageManager::Pnpm),
        ("package-lock.json", PackageManager::Npm),
        ("yarn.lock", PackageManager::Yarn),
    ]
    .into_iter()
    .find(|(marker, _)| dir.join(marker).exists())
    .map(|(_, manager)| manager)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn checkout_with(files: &[&str]) -> TempDir {
        let temp = TempDir::new().expect("temp dir");
        for file in files {
            let path = temp.path().join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, "").expect("write marker");
        }
        temp
    }

    #[rstest]
    #[case::streamlit(&["streamlit_app.py", "package.json"], StackKind::Python)]
    #[case::next(&["next.config.mjs"], StackKind::Node)]
    #[case::vite(&["vite.config.ts", "requirements.txt"], StackKind::Node)]
    #[case::fastapi(&["app/main.py"], StackKind::Python)]
    #[case::pyproject(&["pyproject.toml"], StackKind::Python)]
    #[case::static_site(&["index.html"], StackKind::Static)]
    #[case::empty(&[], StackKind::Unknown)]
    fn detects_stack(#[case] files: &[&str], #[case] expected: StackKind) {
        let checkout = checkout_with(files);
        assert_eq!(detect_stack(checkout.path()), expected);
    }

    #[rstest]
    #[case::pnpm(&["pnpm-lock.yaml", "package-lock.json"], Some(PackageManager::Pnpm))]
    #[case::npm(&["package-lock.json"], Some(PackageManager::Npm))]
    #[case::yarn(&["yarn.lock"], Some(PackageManager::Yarn))]
    #[case::none(&["package.json"], None)]
    fn detects_package_manager(#[case] files: &[&str], #[case] expected: Option<PackageManager>) {
        let checkout = checkout_with(files);
        assert_eq!(detect_package_manager(checkout.path()), expected);
    }
}
