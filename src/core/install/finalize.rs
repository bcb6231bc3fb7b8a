// ─── Finalizing ───
// Shared configs, restored user files, server scripts and the final
// instance record.

use std::path::Path;

use tracing::{debug, info};

use super::phases::{copy_common_configs, Pipeline};
use super::session::InstallationSession;
use super::state::InstallState;
use crate::core::config::system_memory_mb;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{InstalledMod, Instance};
use crate::core::pack::selection::reattach_custom_mods;

const SERVER_JAR_TOKEN: &str = "%%SERVERJAR%%";

const LAUNCH_SERVER_BAT: &str = "@echo off\r\n\
java -Xmx2G -jar %%SERVERJAR%% nogui\r\n\
pause\r\n";

const LAUNCH_SERVER_SH: &str = "#!/usr/bin/env sh\n\
cd \"$(dirname \"$0\")\"\n\
exec java -Xmx2G -jar %%SERVERJAR%% nogui\n";

impl Pipeline<'_> {
    pub(super) async fn finalize(&self, session: &mut InstallationSession) -> LauncherResult<()> {
        session.tracker.state(InstallState::Finalizing);
        session.tracker.task("Finalizing");

        let copied = copy_common_configs(&self.config.common_configs_dir(), session.root())?;
        if copied > 0 {
            debug!("Copied {} common config files", copied);
        }
        session.restore().await?;

        let scripts_wanted = self
            .plan
            .loader
            .as_ref()
            .map_or(true, |l| l.version.should_install_server_scripts());
        if self.server() && scripts_wanted {
            let jar = Instance::runtime_jar_name(&self.plan.runtime.id, true);
            write_server_scripts(&self.config.server_scripts_dir(), session.root(), &jar)?;
        }

        self.record_instance(session);
        session.commit(self.manager).await?;
        session.tracker.finish();
        Ok(())
    }

    /// Copy everything the plan resolved onto the instance record.
    fn record_instance(&self, session: &mut InstallationSession) {
        let plan = self.plan;

        let mut mods: Vec<InstalledMod> = plan
            .selection
            .selected
            .iter()
            .map(|entry| {
                InstalledMod::from_entry(
                    entry,
                    plan.installed_file(entry),
                    plan.manifest.colour(entry.colour.as_deref()),
                    true,
                )
            })
            .collect();

        let carried = reattach_custom_mods(&mut mods, plan.previous.as_ref(), &plan.runtime.id);
        if carried > 0 {
            info!("Kept {} user-added components", carried);
        }

        mods.extend(plan.selection.unselected.iter().map(|entry| {
            InstalledMod::from_entry(
                entry,
                entry.file.clone(),
                plan.manifest.colour(entry.colour.as_deref()),
                false,
            )
        }));

        let instance = &mut session.instance;
        instance.pack = plan.request.pack.clone();
        instance.pack_version = plan.request.version.clone();
        instance.runtime_version = plan.runtime.id.clone();
        instance.is_server = plan.is_server();
        instance.loader = plan.loader.as_ref().map(|l| l.version.clone());
        instance.main_class = Some(plan.main_class.clone());
        instance.loader_main_class = plan.loader_main_class.clone();
        instance.arguments = plan.arguments.clone();
        instance.libraries = plan.libraries.iter().map(|l| l.path.clone()).collect();
        instance.mods = mods;
        instance.java = plan
            .request
            .java
            .clone()
            .normalized(&self.config.java, system_memory_mb());
    }
}

/// Write `LaunchServer.bat` and `LaunchServer.sh` into `root`, preferring
/// templates found in `templates_dir`.
pub(crate) fn write_server_scripts(
    templates_dir: &Path,
    root: &Path,
    jar_name: &str,
) -> LauncherResult<()> {
    for (name, fallback) in [
        ("LaunchServer.bat", LAUNCH_SERVER_BAT),
        ("LaunchServer.sh", LAUNCH_SERVER_SH),
    ] {
        let template_path = templates_dir.join(name);
        let template = match std::fs::read_to_string(&template_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => fallback.to_string(),
            Err(e) => return Err(LauncherError::io(&template_path, e)),
        };

        let script = root.join(name);
        std::fs::write(&script, template.replace(SERVER_JAR_TOKEN, jar_name))
            .map_err(|e| LauncherError::io(&script, e))?;
        mark_executable(&script)?;
    }
    Ok(())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> LauncherResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| LauncherError::io(path, e))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|e| LauncherError::io(path, e))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> LauncherResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fall_back_to_builtin_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("server");
        std::fs::create_dir_all(&root).unwrap();

        write_server_scripts(&dir.path().join("none"), &root, "minecraft_server.1.20.1.jar").unwrap();

        let sh = std::fs::read_to_string(root.join("LaunchServer.sh")).unwrap();
        assert!(sh.contains("-jar minecraft_server.1.20.1.jar"));
        assert!(!sh.contains(SERVER_JAR_TOKEN));
        assert!(root.join("LaunchServer.bat").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(root.join("LaunchServer.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn custom_templates_get_the_jar_substituted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("LaunchServer.sh"),
            "java -jar %%SERVERJAR%% --port 25566 # %%SERVERJAR%%",
        )
        .unwrap();

        write_server_scripts(dir.path(), dir.path(), "minecraft_server.1.7.10.jar").unwrap();

        // The template file is also the output here; it must be rewritten.
        let sh = std::fs::read_to_string(dir.path().join("LaunchServer.sh")).unwrap();
        assert_eq!(
            sh,
            "java -jar minecraft_server.1.7.10.jar --port 25566 # minecraft_server.1.7.10.jar"
        );
    }
}
