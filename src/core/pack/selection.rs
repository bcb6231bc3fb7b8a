// ─── Optional-Component Selector ───
// Partitions the declared components into selected / unselected using an
// external chooser, optionally preseeded by a share code.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::manifest::ModEntry;
use crate::core::instance::{Instance, InstalledMod};

/// What the chooser is shown.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentChoiceRequest {
    pub pack: String,
    pub version: String,
    pub components: Vec<ModEntry>,
    /// Names ticked before the user sees the list.
    pub preselected: Vec<String>,
    pub share_code: Option<String>,
}

impl ComponentChoiceRequest {
    pub fn is_preselected(&self, name: &str) -> bool {
        self.preselected.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

/// The caller-facing surface consulted during resolution.
#[async_trait]
pub trait InstallInteraction: Send + Sync {
    /// Show an install/update message. `false` cancels the installation.
    async fn confirm_message(&self, title: &str, message: &str) -> bool;

    /// Pick components. `None` means the chooser was dismissed.
    async fn choose_components(&self, request: &ComponentChoiceRequest) -> Option<Vec<String>>;
}

/// Non-interactive chooser: accepts messages and keeps the preselection.
#[derive(Debug, Clone, Copy)]
pub struct PresetChooser {
    pub accept_messages: bool,
}

impl Default for PresetChooser {
    fn default() -> Self {
        Self {
            accept_messages: true,
        }
    }
}

#[async_trait]
impl InstallInteraction for PresetChooser {
    async fn confirm_message(&self, _title: &str, message: &str) -> bool {
        info!("Pack message: {}", message);
        self.accept_messages
    }

    async fn choose_components(&self, request: &ComponentChoiceRequest) -> Option<Vec<String>> {
        Some(request.preselected.clone())
    }
}

// ── Share codes ─────────────────────────────────────

/// Preselection token: comma separated component names, each optionally
/// prefixed with `+` (select) or `-` (deselect). A bare name selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCode {
    entries: Vec<(bool, String)>,
}

impl ShareCode {
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|token| {
                if let Some(rest) = token.strip_prefix('-') {
                    (false, rest.trim().to_string())
                } else if let Some(rest) = token.strip_prefix('+') {
                    (true, rest.trim().to_string())
                } else {
                    (true, token.to_string())
                }
            })
            .filter(|(_, name)| !name.is_empty())
            .collect();
        Self { entries }
    }

    /// Apply on top of `selected`; mandatory components stay selected and
    /// unknown names are ignored.
    pub fn apply(&self, components: &[ModEntry], selected: &mut HashSet<String>) {
        for (select, name) in &self.entries {
            let Some(component) = components.iter().find(|c| c.is_named(name)) else {
                debug!("Share code names unknown component '{}'", name);
                continue;
            };
            let key = component.name.to_lowercase();
            if *select {
                selected.insert(key);
            } else if component.optional {
                selected.remove(&key);
            }
        }
    }
}

// ── Selection ───────────────────────────────────────

/// Final partition of the declared components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentSelection {
    pub selected: Vec<ModEntry>,
    pub unselected: Vec<ModEntry>,
}

/// Mandatory components plus the ones enabled by default.
pub fn default_selection(components: &[ModEntry]) -> HashSet<String> {
    components
        .iter()
        .filter(|c| !c.optional || c.selected)
        .map(|c| c.name.to_lowercase())
        .collect()
}

/// Order components by name, then move each one that depends on others
/// behind its last dependency.
pub fn sort_mods(mut mods: Vec<ModEntry>) -> Vec<ModEntry> {
    mods.sort_by_key(|m| m.name.to_lowercase());

    let (dependent, independent): (Vec<_>, Vec<_>) =
        mods.into_iter().partition(ModEntry::has_depends);

    let mut ordered = independent;
    for component in dependent {
        let anchor = ordered
            .iter()
            .rposition(|other| component.depends_on(other));
        match anchor {
            Some(idx) => ordered.insert(idx + 1, component),
            None => ordered.push(component),
        }
    }
    ordered
}

/// Close `chosen` over mandatory components and declared dependencies.
fn complete(components: &[ModEntry], chosen: &[String]) -> HashSet<String> {
    let mut selected: HashSet<String> = chosen.iter().map(|n| n.to_lowercase()).collect();
    selected.extend(
        components
            .iter()
            .filter(|c| !c.optional)
            .map(|c| c.name.to_lowercase()),
    );

    loop {
        let before = selected.len();
        for component in components {
            if selected.contains(&component.name.to_lowercase()) {
                selected.extend(component.depends.iter().map(|d| d.to_lowercase()));
            }
        }
        if selected.len() == before {
            break;
        }
    }

    selected
}

/// Partition `components` (already side-filtered and sorted).
///
/// Returns `None` when the chooser is dismissed.
pub async fn select_components(
    interaction: &dyn InstallInteraction,
    pack: &str,
    version: &str,
    components: Vec<ModEntry>,
    share_code: Option<&str>,
) -> Option<ComponentSelection> {
    if !components.iter().any(|c| c.optional) {
        debug!("No optional components; selecting all {}", components.len());
        return Some(ComponentSelection {
            selected: components,
            unselected: Vec::new(),
        });
    }

    let mut preselected = default_selection(&components);
    if let Some(code) = share_code {
        ShareCode::parse(code).apply(&components, &mut preselected);
    }

    let request = ComponentChoiceRequest {
        pack: pack.to_string(),
        version: version.to_string(),
        preselected: components
            .iter()
            .filter(|c| preselected.contains(&c.name.to_lowercase()))
            .map(|c| c.name.clone())
            .collect(),
        components,
        share_code: share_code.map(str::to_string),
    };

    let chosen = interaction.choose_components(&request).await?;
    let selected_names = complete(&request.components, &chosen);

    let (selected, unselected): (Vec<_>, Vec<_>) = request
        .components
        .into_iter()
        .partition(|c| selected_names.contains(&c.name.to_lowercase()));

    info!(
        "Selected {} components ({} left out)",
        selected.len(),
        unselected.len()
    );
    Some(ComponentSelection {
        selected,
        unselected,
    })
}

/// On a reinstall of the same runtime version, carry the user's custom
/// components over into the new list.
pub fn reattach_custom_mods(
    installed: &mut Vec<InstalledMod>,
    previous: Option<&Instance>,
    runtime_version: &str,
) -> usize {
    let Some(previous) = previous else {
        return 0;
    };
    if !previous.runtime_version.eq_ignore_ascii_case(runtime_version) {
        return 0;
    }

    let custom: Vec<InstalledMod> = previous
        .mods
        .iter()
        .filter(|m| m.user_added)
        .cloned()
        .collect();
    let count = custom.len();
    installed.extend(custom);
    count
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn component(name: &str, optional: bool, selected: bool, depends: &[&str]) -> ModEntry {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "url": format!("mods/{name}.jar"),
            "file": format!("{name}.jar"),
            "optional": optional,
            "selected": selected,
            "depends": depends,
        }))
        .unwrap()
    }

    fn names(mods: &[ModEntry]) -> Vec<&str> {
        mods.iter().map(|m| m.name.as_str()).collect()
    }

    /// Records the request and answers with a fixed choice.
    struct Scripted {
        answer: Option<Vec<String>>,
        seen: Mutex<Option<ComponentChoiceRequest>>,
    }

    #[async_trait]
    impl InstallInteraction for Scripted {
        async fn confirm_message(&self, _: &str, _: &str) -> bool {
            true
        }

        async fn choose_components(
            &self,
            request: &ComponentChoiceRequest,
        ) -> Option<Vec<String>> {
            *self.seen.lock().unwrap() = Some(request.clone());
            self.answer.clone()
        }
    }

    #[tokio::test]
    async fn all_mandatory_skips_the_chooser() {
        let chooser = Scripted {
            answer: None,
            seen: Mutex::new(None),
        };
        let mods = vec![component("A", false, false, &[]), component("B", false, false, &[])];

        let selection = select_components(&chooser, "pack", "1", mods, None)
            .await
            .unwrap();

        assert_eq!(names(&selection.selected), vec!["A", "B"]);
        assert!(selection.unselected.is_empty());
        assert!(chooser.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn dismissed_chooser_cancels() {
        let chooser = Scripted {
            answer: None,
            seen: Mutex::new(None),
        };
        let mods = vec![component("A", true, false, &[])];

        assert!(select_components(&chooser, "pack", "1", mods, None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn share_code_is_applied_before_the_chooser() {
        let chooser = Scripted {
            answer: Some(vec!["Foo".into()]),
            seen: Mutex::new(None),
        };
        let mods = vec![
            component("Core", false, false, &[]),
            component("Foo", true, false, &[]),
            component("Bar", true, true, &[]),
        ];

        select_components(&chooser, "pack", "1", mods, Some("foo, -Bar, -Core, Unknown"))
            .await
            .unwrap();

        let seen = chooser.seen.lock().unwrap().clone().unwrap();
        assert!(seen.is_preselected("Foo"));
        assert!(!seen.is_preselected("Bar"));
        assert!(seen.is_preselected("Core"));
    }

    #[tokio::test]
    async fn mandatory_and_required_components_are_forced_in() {
        let chooser = Scripted {
            answer: Some(vec!["Addon".into()]),
            seen: Mutex::new(None),
        };
        let mods = sort_mods(vec![
            component("Core", false, false, &[]),
            component("Addon", true, false, &["Library"]),
            component("Library", true, false, &[]),
            component("Extra", true, false, &[]),
        ]);

        let selection = select_components(&chooser, "pack", "1", mods, None)
            .await
            .unwrap();

        assert_eq!(names(&selection.selected), vec!["Core", "Library", "Addon"]);
        assert_eq!(names(&selection.unselected), vec!["Extra"]);
    }

    #[tokio::test]
    async fn preset_chooser_keeps_defaults() {
        let mods = vec![
            component("A", true, true, &[]),
            component("B", true, false, &[]),
        ];

        let selection = select_components(&PresetChooser::default(), "p", "1", mods, None)
            .await
            .unwrap();

        assert_eq!(names(&selection.selected), vec!["A"]);
        assert_eq!(names(&selection.unselected), vec!["B"]);
    }

    #[test]
    fn sort_places_dependents_after_their_dependencies() {
        let sorted = sort_mods(vec![
            component("zeta", false, false, &[]),
            component("Alpha", true, false, &["zeta"]),
            component("beta", false, false, &[]),
        ]);

        assert_eq!(names(&sorted), vec!["beta", "zeta", "Alpha"]);
    }

    #[test]
    fn share_code_parsing() {
        let code = ShareCode::parse(" A ,+B,-C,, - ");
        assert_eq!(
            code.entries,
            vec![
                (true, "A".to_string()),
                (true, "B".to_string()),
                (false, "C".to_string())
            ]
        );
    }
}
