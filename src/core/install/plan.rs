// ─── Install Plan ───
// Everything resolved before the first byte is written: manifest, runtime,
// loader and selection, plus the derived main class, arguments and
// library list.

use std::collections::HashSet;

use tracing::debug;

use crate::core::config::JavaOverrides;
use crate::core::error::LauncherResult;
use crate::core::instance::Instance;
use crate::core::loaders::LoaderInstallResult;
use crate::core::pack::depends::{apply_extra_arguments, filter_libraries, resolve_main_class};
use crate::core::pack::{
    ArgumentBlock, ComponentSelection, LibraryEntry, ModCategory, ModEntry,
    PackVersionManifest, SelectionSet,
};
use crate::core::version::VersionJson;

/// What the caller asked for.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub pack: String,
    pub version: String,
    /// Instance display name; an existing instance with this name is
    /// reinstalled in place.
    pub name: String,
    pub server: bool,
    pub share_code: Option<String>,
    /// When `false` the preselection is taken as-is without asking.
    pub show_chooser: bool,
    pub java: JavaOverrides,
}

impl InstallRequest {
    pub fn new(pack: impl Into<String>, version: impl Into<String>) -> Self {
        let pack = pack.into();
        Self {
            name: pack.clone(),
            pack,
            version: version.into(),
            server: false,
            share_code: None,
            show_chooser: true,
            java: JavaOverrides::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn server(mut self, server: bool) -> Self {
        self.server = server;
        self
    }

    pub fn with_share_code(mut self, code: Option<String>) -> Self {
        self.share_code = code.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn show_chooser(mut self, show: bool) -> Self {
        self.show_chooser = show;
        self
    }

    pub fn with_java(mut self, java: JavaOverrides) -> Self {
        self.java = java;
        self
    }
}

/// A fully resolved installation, built once and then only read.
#[derive(Debug)]
pub struct InstallPlan {
    pub request: InstallRequest,
    pub manifest: PackVersionManifest,
    pub runtime: VersionJson,
    pub loader: Option<LoaderInstallResult>,
    pub selection: ComponentSelection,
    /// Existing instance with the requested name, if any.
    pub previous: Option<Instance>,
    /// Pack override when one matches, otherwise the runtime's main class.
    pub main_class: String,
    /// Entry point declared by the loader, recorded next to the instance's
    /// own main class.
    pub loader_main_class: Option<String>,
    pub arguments: ArgumentBlock,
    /// Pack, loader and runtime libraries, deduplicated by path.
    pub libraries: Vec<LibraryEntry>,
}

impl InstallPlan {
    pub fn build(
        request: InstallRequest,
        manifest: PackVersionManifest,
        runtime: VersionJson,
        loader: Option<LoaderInstallResult>,
        selection: ComponentSelection,
        previous: Option<Instance>,
        repository_url: &str,
    ) -> LauncherResult<Self> {
        let chosen = SelectionSet::from_mods(&selection.selected);
        let server = request.server;

        // Main class
        let main_class =
            resolve_main_class(manifest.main_class_overrides(), &runtime.main_class, &chosen);
        let loader_main_class = loader
            .as_ref()
            .map(|l| l.main_class.clone())
            .filter(|c| !c.is_empty());

        // Arguments
        let uses_runtime = loader.as_ref().map_or(true, |l| l.uses_runtime_arguments);
        let mut arguments = if uses_runtime {
            runtime.base_arguments()
        } else {
            ArgumentBlock::default()
        };
        if let Some(loader) = &loader {
            arguments.append(&loader.arguments);
        }
        apply_extra_arguments(&mut arguments, manifest.extra_arguments.as_ref(), &chosen);

        // Libraries: pack first, then loader, then runtime.
        let mut libraries =
            filter_libraries(manifest.library_entries(repository_url, server), &chosen);
        if let Some(loader) = &loader {
            libraries.extend(loader.libraries.iter().cloned());
        }
        if uses_runtime {
            libraries.extend(runtime.library_entries()?);
        }
        let libraries = dedup_by_path(
            libraries
                .into_iter()
                .filter(|lib| lib.side.applies_to(server))
                .collect(),
        );

        Ok(Self {
            request,
            manifest,
            runtime,
            loader,
            selection,
            previous,
            main_class,
            loader_main_class,
            arguments,
            libraries,
        })
    }

    pub fn is_server(&self) -> bool {
        self.request.server
    }

    pub fn has_jar_mods(&self) -> bool {
        self.manifest.has_jar_mods(&self.selection.selected)
    }

    pub fn has_forge(&self) -> bool {
        self.loader
            .as_ref()
            .is_some_and(|l| l.version.family.is_forge_like())
    }

    /// File name of `entry` once installed; the case policy only touches
    /// the mods directory.
    pub fn installed_file(&self, entry: &ModEntry) -> String {
        match entry.category {
            ModCategory::Mods | ModCategory::Dependency => {
                self.manifest.case_all_files.apply(&entry.file)
            }
            _ => entry.file.clone(),
        }
    }
}

fn dedup_by_path(libraries: Vec<LibraryEntry>) -> Vec<LibraryEntry> {
    let mut seen = HashSet::new();
    libraries
        .into_iter()
        .filter(|lib| {
            let fresh = seen.insert(lib.path.clone());
            if !fresh {
                debug!("Duplicate library {} dropped", lib.path);
            }
            fresh
        })
        .collect()
}
