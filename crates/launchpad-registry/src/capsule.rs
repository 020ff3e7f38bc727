//! Lightweight application descriptions exported without an archive.

use serde::Serialize;

use crate::entry::{AppEntry, CapsuleMode, Phase, StackKind};

/// Exported description of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capsule {
    /// Application name.
    pub name: String,
    /// Sync source.
    pub source: String,
    /// Stack family.
    pub stack: StackKind,
    /// Entrypoint module followed by the run command template, when set.
    pub entrypoints: Vec<String>,
    /// Lower and upper bound of the port range.
    pub recommended_ports: [u16; 2],
    /// Discovery tags.
    pub tags: Vec<String>,
    /// Operations the capsule supports.
    pub capabilities: Vec<String>,
    /// Export mode.
    pub capsule_mode: CapsuleMode,
    /// Health endpoint path, empty when none is configured.
    pub health_path: String,
}

impl Capsule {
    /// Describes `entry`, preferring a detected stack over the declared one
    /// when the declaration is `unknown`.
    #[must_use]
    pub fn from_entry(entry: &AppEntry, detected: Option<StackKind>) -> Self {
        let stack = match (entry.stack(), detected) {
            (StackKind::Unknown, Some(found)) => found,
            (declared, _) => declared,
        };
        let entrypoints = entry
            .entrypoint()
            .into_iter()
            .chain(entry.command(Phase::Run))
            .map(str::to_owned)
            .collect();

        let mut capabilities = vec![String::from("pack"), String::from("capsule")];
        match entry.capsule_mode() {
            CapsuleMode::Http => capabilities.push(String::from("health")),
            CapsuleMode::Wip => capabilities.push(String::from("wip")),
            CapsuleMode::Static => {}
        }

        Self {
            name: entry.name().to_owned(),
            source: entry.source().to_owned(),
            stack,
            entrypoints,
            recommended_ports: [entry.ports().min, entry.ports().max],
            tags: vec![String::from("launchpad"), stack.as_str().to_owned()],
            capabilities,
            capsule_mode: entry.capsule_mode(),
            health_path: entry.health_path().unwrap_or_default().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PortRange;

    #[test]
    fn http_capsule_advertises_health() {
        let entry = AppEntry::new("api", PortRange::new(8000, 8019))
            .with_source("https://example.com/api.git")
            .with_stack(StackKind::Python)
            .with_command(Phase::Run, "uvicorn app.main:app --port {PORT}")
            .with_health_path("/health");

        let capsule = Capsule::from_entry(&entry, None);

        assert_eq!(capsule.recommended_ports, [8000, 8019]);
        assert_eq!(capsule.entrypoints, vec!["uvicorn app.main:app --port {PORT}"]);
        assert_eq!(capsule.capabilities, vec!["pack", "capsule", "health"]);
        assert_eq!(capsule.tags, vec!["launchpad", "python"]);
        assert_eq!(capsule.health_path, "/health");
    }

    #[test]
    fn wip_capsule_uses_detected_stack_when_undeclared() {
        let entry = AppEntry::new("draft", PortRange::new(8060, 8079))
            .with_capsule_mode(CapsuleMode::Wip);

        let capsule = Capsule::from_entry(&entry, Some(StackKind::Node));

        assert_eq!(capsule.stack, StackKind::Node);
        assert_eq!(capsule.capabilities, vec!["pack", "capsule", "wip"]);
        assert!(capsule.entrypoints.is_empty());
        assert_eq!(capsule.health_path, "");
    }

    #[test]
    fn capsule_serialises_to_json_object() {
        let entry = AppEntry::new("site", PortRange::new(8030, 8049))
            .with_stack(StackKind::Static)
            .with_capsule_mode(CapsuleMode::Static);
        let json = serde_json::to_value(Capsule::from_entry(&entry, None)).expect("serialise");
        assert_eq!(json["stack"], "static");
        assert_eq!(json["capsule_mode"], "static");
        assert_eq!(json["recommended_ports"][1], 8049);
    }
}
