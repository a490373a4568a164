// Copyright (c) 2017 Mike Kershaw and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Plugin discovery and activation. Plugins are described by manifest
//! files in the user and system plugin directories; scanning records
//! them, activation enables them, and a manifest that cannot be
//! activated by the last-chance pass fails the startup.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use configfile::ConfigFile;
use messagebus::MessageFlags;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

const SYSTEM_PLUGIN_DIR: &'static str = "/usr/local/lib/kismet";

#[derive(Clone, Debug)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub activated: bool,
}

pub struct Plugintracker {
    plugins: RefCell<Vec<PluginInfo>>,
    broken: RefCell<Vec<PathBuf>>,
    shut_down: Cell<bool>,
}

pub struct PlugintrackerKey;

impl ComponentKey for PlugintrackerKey {
    type Component = Plugintracker;
    const KEY: &'static str = "PLUGINTRACKER";
}

impl Plugintracker {
    pub fn new() -> Rc<Plugintracker> {
        Rc::new(Plugintracker {
            plugins: RefCell::new(Vec::new()),
            broken: RefCell::new(Vec::new()),
            shut_down: Cell::new(false),
        })
    }

    /// Scan the user plugin directory (`~/.kismet/plugins`) and the
    /// system plugin directory for manifests.
    pub fn scan_user_plugins(&self, registry: &GlobalRegistry) {
        let user_dir = registry.homedir().join(".kismet").join("plugins");
        self.scan_dir(registry, &user_dir);
        self.scan_dir(registry, Path::new(SYSTEM_PLUGIN_DIR));
    }

    fn scan_dir(&self, registry: &GlobalRegistry, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            // A missing plugin directory is the common case.
            Err(_) => return,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("conf") {
                continue;
            }
            match Self::parse_manifest(&path) {
                Ok(info) => {
                    registry.message(
                        MessageFlags::INFO,
                        &format!("Found plugin {} ({})", info.name, info.version),
                    );
                    self.plugins.borrow_mut().push(info);
                }
                Err(what) => {
                    registry.message(
                        MessageFlags::ERROR,
                        &format!("Unreadable plugin manifest {}: {}", path.display(), what),
                    );
                    self.broken.borrow_mut().push(path);
                }
            }
        }
    }

    fn parse_manifest(path: &Path) -> ::std::result::Result<PluginInfo, String> {
        let manifest = ConfigFile::parse(path).map_err(|e| format!("{}", e))?;
        let name = manifest
            .fetch_opt("name")
            .ok_or_else(|| "missing 'name'".to_string())?;
        let version = manifest
            .fetch_opt("version")
            .ok_or_else(|| "missing 'version'".to_string())?;
        Ok(PluginInfo {
            name: name,
            version: version,
            path: path.to_path_buf(),
            activated: false,
        })
    }

    pub fn activate_plugins(&self, registry: &GlobalRegistry) {
        for plugin in self.plugins.borrow_mut().iter_mut() {
            if !plugin.activated {
                plugin.activated = true;
                registry.message(
                    MessageFlags::INFO,
                    &format!("Activated plugin {}", plugin.name),
                );
            }
        }
    }

    /// The final activation pass. Anything still broken here is a
    /// fatal startup condition, exactly like a plugin that failed to
    /// load.
    pub fn last_chance_plugins(&self, registry: &GlobalRegistry) {
        if self.broken.borrow().is_empty() {
            return;
        }
        for path in self.broken.borrow().iter() {
            registry.message(
                MessageFlags::FATAL,
                &format!("Plugin {} could not be activated", path.display()),
            );
        }
        registry.set_fatal_condition();
    }

    pub fn shutdown_plugins(&self, registry: &GlobalRegistry) {
        if self.shut_down.replace(true) {
            return;
        }
        let count = self.plugins.borrow().len();
        if count > 0 {
            registry.message(
                MessageFlags::INFO,
                &format!("Shutting down {} plugins", count),
            );
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.borrow().len()
    }
}

impl LifetimeGlobal for Plugintracker {
    fn name(&self) -> &'static str {
        "plugintracker"
    }
    fn shutdown(&self, registry: &GlobalRegistry) {
        self.shutdown_plugins(registry);
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempdir::TempDir;

    use super::*;
    use registry::{GlobalRegistry, Version};

    fn registry_with_home(dir: &TempDir) -> GlobalRegistry {
        let reg = GlobalRegistry::new(
            Version {
                major: "2016",
                minor: "07",
                tiny: "R1",
                revision: "test",
                revdate: "2017-10-01",
            },
            vec![],
        );
        reg.set_homedir(dir.path().to_path_buf());
        reg
    }

    #[test]
    fn scans_and_activates_manifests() {
        let dir = TempDir::new("plugins").unwrap();
        let plugin_dir = dir.path().join(".kismet").join("plugins");
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(
            plugin_dir.join("spectools.conf"),
            "name=spectools\nversion=1.0\n",
        ).unwrap();

        let reg = registry_with_home(&dir);
        let tracker = Plugintracker::new();
        tracker.scan_user_plugins(&reg);
        assert_eq!(tracker.plugin_count(), 1);

        tracker.activate_plugins(&reg);
        tracker.last_chance_plugins(&reg);
        assert!(!reg.is_fatal_condition());
    }

    #[test]
    fn broken_manifest_fails_the_last_chance_pass() {
        let dir = TempDir::new("plugins").unwrap();
        let plugin_dir = dir.path().join(".kismet").join("plugins");
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("broken.conf"), "no version here\n").unwrap();

        let reg = registry_with_home(&dir);
        let tracker = Plugintracker::new();
        tracker.scan_user_plugins(&reg);
        tracker.activate_plugins(&reg);
        assert!(!reg.is_fatal_condition());
        tracker.last_chance_plugins(&reg);
        assert!(reg.is_fatal_condition());
    }

    #[test]
    fn missing_plugin_directory_is_fine() {
        let dir = TempDir::new("plugins").unwrap();
        let reg = registry_with_home(&dir);
        let tracker = Plugintracker::new();
        tracker.scan_user_plugins(&reg);
        assert_eq!(tracker.plugin_count(), 0);
    }
}
