// ─── Dependency Evaluator ───
// Decides whether a conditional item (pack library, extra arguments,
// main-class override) is active for the final component selection.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arguments::ArgumentBlock;
use super::library::LibraryEntry;
use super::manifest::{ExtraArguments, MainClassOverride, ModEntry};

/// Inclusion gate attached to a conditional item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Predicate {
    #[default]
    Always,
    /// Active iff a selected component has exactly this name.
    Name(String),
    /// Active iff at least one selected component carries this group tag.
    Group(String),
}

impl Predicate {
    /// Build a predicate from the manifest's `depends` / `dependsGroup` pair.
    ///
    /// The two are alternatives: when both are present the name wins. Blank
    /// values count as absent.
    pub fn from_fields(depends: Option<&str>, depends_group: Option<&str>) -> Self {
        fn non_blank(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        match (non_blank(depends), non_blank(depends_group)) {
            (Some(name), _) => Predicate::Name(name.to_string()),
            (None, Some(group)) => Predicate::Group(group.to_string()),
            (None, None) => Predicate::Always,
        }
    }
}

/// Case-folded view of the selected components' names and groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    names: HashSet<String>,
    groups: HashSet<String>,
}

impl SelectionSet {
    pub fn from_mods<'a>(mods: impl IntoIterator<Item = &'a ModEntry>) -> Self {
        let mut set = Self::default();
        for m in mods {
            set.names.insert(m.name.to_lowercase());
            if let Some(group) = m.group.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
                set.groups.insert(group.to_lowercase());
            }
        }
        set
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(&group.to_lowercase())
    }

}

/// Whether an item gated by `predicate` is active for `selection`.
pub fn included(predicate: &Predicate, selection: &SelectionSet) -> bool {
    match predicate {
        Predicate::Always => true,
        Predicate::Name(name) => selection.contains_name(name),
        Predicate::Group(group) => selection.has_group(group),
    }
}

/// First override whose predicate holds, otherwise the runtime's own class.
pub fn resolve_main_class(
    overrides: &[MainClassOverride],
    runtime_main_class: &str,
    selection: &SelectionSet,
) -> String {
    overrides
        .iter()
        .find(|o| included(&o.predicate(), selection))
        .map(|o| {
            debug!("Main class overridden by pack: {}", o.main_class);
            o.main_class.clone()
        })
        .unwrap_or_else(|| runtime_main_class.to_string())
}

/// Append the extra-argument tokens to the game arguments when active.
/// Returns whether anything was appended.
pub fn apply_extra_arguments(
    arguments: &mut ArgumentBlock,
    extra: Option<&ExtraArguments>,
    selection: &SelectionSet,
) -> bool {
    let Some(extra) = extra else {
        return false;
    };
    if !included(&extra.predicate(), selection) {
        return false;
    }

    arguments.append_game_tokens(&extra.arguments);
    true
}

/// Drop libraries whose predicate is not satisfied, keeping order.
pub fn filter_libraries(
    libraries: Vec<LibraryEntry>,
    selection: &SelectionSet,
) -> Vec<LibraryEntry> {
    libraries
        .into_iter()
        .filter(|lib| {
            let keep = included(&lib.predicate, selection);
            if !keep {
                debug!("Skipping library {} ({:?} not selected)", lib.name, lib.predicate);
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pack::arguments::Argument;

    fn component(name: &str, group: Option<&str>) -> ModEntry {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "version": "1.0",
            "url": format!("mods/{name}.jar"),
            "file": format!("{name}.jar"),
            "type": "mods",
            "group": group,
        }))
        .unwrap()
    }

    fn selection(mods: &[ModEntry]) -> SelectionSet {
        SelectionSet::from_mods(mods)
    }

    #[test]
    fn no_predicate_is_always_included() {
        assert!(included(&Predicate::Always, &SelectionSet::default()));
    }

    #[test]
    fn name_predicate_is_case_insensitive_and_exact() {
        let set = selection(&[component("OptiFine", None)]);

        assert!(included(&Predicate::Name("optifine".into()), &set));
        assert!(included(&Predicate::Name("OPTIFINE".into()), &set));
        assert!(!included(&Predicate::Name("Opti".into()), &set));
        assert!(!included(&Predicate::Name("OptiFine HD".into()), &set));
    }

    #[test]
    fn group_predicate_needs_one_member() {
        let set = selection(&[component("Sodium", Some("perf")), component("JEI", None)]);

        assert!(included(&Predicate::Group("Perf".into()), &set));
        assert!(!included(&Predicate::Group("Shaders".into()), &set));
        assert!(!included(&Predicate::Group("per".into()), &set));
    }

    #[test]
    fn main_class_override_follows_selection() {
        let overrides = vec![MainClassOverride {
            main_class: "com.foo.Launch".into(),
            depends: Some("Foo".into()),
            depends_group: None,
        }];

        let with_foo = selection(&[component("Foo", None)]);
        assert_eq!(
            resolve_main_class(&overrides, "net.minecraft.client.main.Main", &with_foo),
            "com.foo.Launch"
        );

        let without_foo = selection(&[]);
        assert_eq!(
            resolve_main_class(&overrides, "net.minecraft.client.main.Main", &without_foo),
            "net.minecraft.client.main.Main"
        );
    }

    #[test]
    fn first_matching_main_class_override_wins() {
        let overrides = vec![
            MainClassOverride {
                main_class: "a.Main".into(),
                depends: Some("Missing".into()),
                depends_group: None,
            },
            MainClassOverride {
                main_class: "b.Main".into(),
                depends: None,
                depends_group: Some("Perf".into()),
            },
            MainClassOverride {
                main_class: "c.Main".into(),
                depends: None,
                depends_group: None,
            },
        ];
        let set = selection(&[component("Sodium", Some("perf"))]);

        assert_eq!(resolve_main_class(&overrides, "rt.Main", &set), "b.Main");
    }

    #[test]
    fn grouped_extra_arguments_are_appended_once_in_order() {
        let mut args = ArgumentBlock {
            jvm: vec![],
            game: vec!["--username".into(), "${auth_player_name}".into()],
        };
        let extra = ExtraArguments {
            arguments: "--tweakClass optifine.OptiFineTweaker".into(),
            depends: None,
            depends_group: Some("Perf".into()),
        };
        let set = selection(&[component("OptiFine", Some("perf"))]);

        assert!(apply_extra_arguments(&mut args, Some(&extra), &set));
        assert_eq!(
            args.game,
            vec![
                Argument::from("--username"),
                "${auth_player_name}".into(),
                "--tweakClass".into(),
                "optifine.OptiFineTweaker".into(),
            ]
        );
    }

    #[test]
    fn unselected_group_leaves_arguments_untouched() {
        let mut args = ArgumentBlock::default();
        let extra = ExtraArguments {
            arguments: "--perf".into(),
            depends: None,
            depends_group: Some("Perf".into()),
        };

        assert!(!apply_extra_arguments(&mut args, Some(&extra), &SelectionSet::default()));
        assert!(args.is_empty());
    }

    // The name and group gates are evaluated as independent alternatives.
    // A block carrying only `dependsGroup` is decided by the group alone,
    // and a block carrying both is decided by the name.
    #[test]
    fn depends_and_depends_group_are_exclusive_alternatives() {
        let set = selection(&[component("Sodium", Some("perf"))]);

        let group_only = Predicate::from_fields(None, Some("Perf"));
        assert_eq!(group_only, Predicate::Group("Perf".into()));
        assert!(included(&group_only, &set));

        let name_only = Predicate::from_fields(Some("sodium"), None);
        assert!(included(&name_only, &set));

        let both = Predicate::from_fields(Some("Iris"), Some("Perf"));
        assert_eq!(both, Predicate::Name("Iris".into()));
        assert!(!included(&both, &set));

        assert_eq!(Predicate::from_fields(Some("  "), None), Predicate::Always);
    }

    #[test]
    fn library_with_unselected_group_is_dropped() {
        let mut gated = LibraryEntry::new("perf-lib.jar", "perf-lib.jar");
        gated.predicate = Predicate::Group("Perf".into());
        let plain = LibraryEntry::new("common.jar", "common.jar");

        let set = selection(&[component("JEI", Some("utility"))]);
        let kept = filter_libraries(vec![gated, plain], &set);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "common.jar");
    }
}
