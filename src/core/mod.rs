// ─── Packsmith Core ───
// Modpack instance installer.
//
// Architecture:
//   core/
//     config/     — Installer settings and directory roots
//     downloader/ — Concurrent, hash-validated fetches
//     version/    — Runtime catalog + version descriptors + OS rules
//     maven/      — Coordinates and maven-metadata listings
//     pack/       — Pack manifest, predicates, component selection
//     loaders/    — Fabric-style and Forge-style loader resolution
//     assets/     — Asset index + object downloads
//     archive/    — Natives extraction and zip repacking
//     instance/   — Instance model + persistence
//     install/    — Orchestrator, phases and progress events

pub mod archive;
pub mod assets;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod instance;
pub mod loaders;
pub mod maven;
pub mod pack;
pub mod version;
