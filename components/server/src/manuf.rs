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

//! OUI prefix to manufacturer lookup, loaded from the configured
//! vendor database when one exists.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::rc::Rc;

use configfile::ConfigFile;
use messagebus::MessageFlags;
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

pub struct Manuf {
    prefixes: HashMap<String, String>,
}

pub struct ManufKey;

impl ComponentKey for ManufKey {
    type Component = Manuf;
    const KEY: &'static str = "MANUF";
}

impl Manuf {
    pub fn new(registry: &GlobalRegistry, config: &ConfigFile) -> Rc<Manuf> {
        let mut prefixes = HashMap::new();
        if let Some(path) = config.fetch_opt("ouifile") {
            match Self::load(Path::new(&path), &mut prefixes) {
                Ok(count) => registry.message(
                    MessageFlags::INFO,
                    &format!("Loaded {} manufacturer prefixes from {}", count, path),
                ),
                Err(e) => registry.message(
                    MessageFlags::ERROR,
                    &format!("Unable to load OUI database {}: {}", path, e),
                ),
            }
        }
        Rc::new(Manuf { prefixes: prefixes })
    }

    fn load(path: &Path, into: &mut HashMap<String, String>) -> ::std::io::Result<usize> {
        let file = File::open(path)?;
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, |c: char| c == '\t' || c == ' ');
            let prefix = match parts.next() {
                Some(p) if p.len() >= 8 => p[..8].to_uppercase(),
                _ => continue,
            };
            let vendor = match parts.next() {
                Some(v) => v.trim().to_string(),
                None => continue,
            };
            into.insert(prefix, vendor);
            count += 1;
        }
        Ok(count)
    }

    /// Look up a formatted MAC (`AA:BB:CC:...`) by its OUI prefix.
    pub fn lookup(&self, mac: &str) -> Option<&str> {
        if mac.len() < 8 {
            return None;
        }
        self.prefixes
            .get(&mac[..8].to_uppercase())
            .map(|v| v.as_str())
    }

    pub fn prefix_count(&self) -> usize {
        self.prefixes.len()
    }
}

impl LifetimeGlobal for Manuf {
    fn name(&self) -> &'static str {
        "manuf"
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;

    use tempdir::TempDir;

    use super::*;

    #[test]
    fn lookup_matches_oui_prefix() {
        let dir = TempDir::new("manuf").unwrap();
        let path = dir.path().join("manuf");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# header comment").unwrap();
        writeln!(file, "00:11:22\tExample Corp").unwrap();
        writeln!(file, "AA:BB:CC\tOther Vendor").unwrap();

        let mut prefixes = HashMap::new();
        let count = Manuf::load(&path, &mut prefixes).unwrap();
        assert_eq!(count, 2);

        let manuf = Manuf { prefixes: prefixes };
        assert_eq!(manuf.lookup("00:11:22:33:44:55"), Some("Example Corp"));
        assert_eq!(manuf.lookup("aa:bb:cc:00:00:00"), Some("Other Vendor"));
        assert_eq!(manuf.lookup("FF:FF:FF:00:00:00"), None);
        assert_eq!(manuf.lookup("short"), None);
    }
}
