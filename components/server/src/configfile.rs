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

//! The `key=value` server configuration: multi-valued keys, `include=`
//! recursion, and the `%`-expansions used by log file templates.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::str::FromStr;

use time;

use error::{Error, Result};
use registry::{ComponentKey, GlobalRegistry, LifetimeGlobal};

const MAX_INCLUDE_DEPTH: usize = 8;

pub struct ConfigFile {
    path: PathBuf,
    opts: HashMap<String, Vec<String>>,
}

pub struct ConfigKey;

impl ComponentKey for ConfigKey {
    type Component = ConfigFile;
    const KEY: &'static str = "CONFIGFILE";
}

impl ConfigFile {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Rc<ConfigFile>> {
        let mut opts = HashMap::new();
        Self::parse_into(path.as_ref(), &mut opts, 0)?;
        Ok(Rc::new(ConfigFile {
            path: path.as_ref().to_path_buf(),
            opts: opts,
        }))
    }

    fn parse_into(
        path: &Path,
        opts: &mut HashMap<String, Vec<String>>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(Error::ConfigFileParse(
                path.to_path_buf(),
                0,
                "include files nest too deeply".to_string(),
            ));
        }
        let file =
            File::open(path).map_err(|e| Error::ConfigFileIO(path.to_path_buf(), e))?;
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::ConfigFileIO(path.to_path_buf(), e))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let eq = match line.find('=') {
                Some(pos) => pos,
                None => {
                    return Err(Error::ConfigFileParse(
                        path.to_path_buf(),
                        lineno + 1,
                        line.to_string(),
                    ))
                }
            };
            let key = line[..eq].trim().to_lowercase();
            let value = line[eq + 1..].trim().to_string();
            if key.is_empty() {
                return Err(Error::ConfigFileParse(
                    path.to_path_buf(),
                    lineno + 1,
                    line.to_string(),
                ));
            }
            if key == "include" {
                let include = if Path::new(&value).is_absolute() {
                    PathBuf::from(&value)
                } else {
                    path.parent().unwrap_or(Path::new(".")).join(&value)
                };
                Self::parse_into(&include, opts, depth + 1)?;
                continue;
            }
            opts.entry(key).or_insert_with(Vec::new).push(value);
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First value for `key`, if any.
    pub fn fetch_opt(&self, key: &str) -> Option<String> {
        self.opts
            .get(&key.to_lowercase())
            .and_then(|v| v.first())
            .cloned()
    }

    /// Every value for `key`, in file order.
    pub fn fetch_opt_vec(&self, key: &str) -> Option<Vec<String>> {
        self.opts.get(&key.to_lowercase()).cloned()
    }

    pub fn fetch_opt_bool(&self, key: &str, default: bool) -> bool {
        match self.fetch_opt(key) {
            Some(val) => match val.to_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => default,
            },
            None => default,
        }
    }

    pub fn fetch_opt_as<T: FromStr>(&self, key: &str) -> Option<::std::result::Result<T, T::Err>> {
        self.fetch_opt(key).map(|v| v.parse::<T>())
    }

    /// Expand a log path template: `%p` log prefix, `%n` server name,
    /// `%l` log type, `%h` home directory, `%D` date as YYYYMMDD.
    pub fn expand_log_path(
        &self,
        template: &str,
        logtype: &str,
        registry: &GlobalRegistry,
    ) -> PathBuf {
        let prefix = self.fetch_opt("logprefix").unwrap_or_else(|| ".".to_string());
        let date = time::strftime("%Y%m%d", &time::now()).unwrap_or_default();
        let expanded = template
            .replace("%p", &prefix)
            .replace("%n", &munge_to_printable(&registry.servername()))
            .replace("%l", logtype)
            .replace("%h", &registry.homedir().to_string_lossy())
            .replace("%D", &date);
        PathBuf::from(expanded)
    }
}

impl LifetimeGlobal for ConfigFile {
    fn name(&self) -> &'static str {
        "configfile"
    }
}

/// Strings sourced from config files end up in filenames and window
/// titles; reduce them to printable ASCII.
pub fn munge_to_printable(input: &str) -> String {
    input
        .chars()
        .map(|c| if c >= ' ' && c <= '~' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod test {
    use std::fs::File;
    use std::io::Write;

    use tempdir::TempDir;

    use super::*;
    use registry::{GlobalRegistry, Version};

    fn write_config(dir: &TempDir, name: &str, content: &str) -> ::std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_keys_comments_and_blanks() {
        let dir = TempDir::new("config").unwrap();
        let path = write_config(
            &dir,
            "kismet.conf",
            "# a comment\n\nservername=Test Server\nwriteinterval=300\n",
        );
        let conf = ConfigFile::parse(&path).unwrap();
        assert_eq!(conf.fetch_opt("servername").unwrap(), "Test Server");
        assert_eq!(conf.fetch_opt_as::<u32>("writeinterval").unwrap().unwrap(), 300);
        assert!(conf.fetch_opt("nosuchkey").is_none());
    }

    #[test]
    fn multivalued_keys_accumulate_in_order() {
        let dir = TempDir::new("config").unwrap();
        let path = write_config(&dir, "kismet.conf", "ncsource=wlan0\nncsource=wlan1\n");
        let conf = ConfigFile::parse(&path).unwrap();
        assert_eq!(
            conf.fetch_opt_vec("ncsource").unwrap(),
            vec!["wlan0".to_string(), "wlan1".to_string()]
        );
        assert_eq!(conf.fetch_opt("ncsource").unwrap(), "wlan0");
    }

    #[test]
    fn include_pulls_in_relative_files() {
        let dir = TempDir::new("config").unwrap();
        write_config(&dir, "extra.conf", "gps=false\n");
        let path = write_config(&dir, "kismet.conf", "include=extra.conf\nservername=X\n");
        let conf = ConfigFile::parse(&path).unwrap();
        assert!(!conf.fetch_opt_bool("gps", true));
        assert_eq!(conf.fetch_opt("servername").unwrap(), "X");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(ConfigFile::parse("/nonexistent/kismet.conf").is_err());
    }

    #[test]
    fn line_without_separator_is_an_error() {
        let dir = TempDir::new("config").unwrap();
        let path = write_config(&dir, "kismet.conf", "this is not a config line\n");
        assert!(ConfigFile::parse(&path).is_err());
    }

    #[test]
    fn log_template_expansion() {
        let dir = TempDir::new("config").unwrap();
        let path = write_config(&dir, "kismet.conf", "logprefix=/tmp/logs\n");
        let conf = ConfigFile::parse(&path).unwrap();
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
        reg.set_servername("Kismet");
        let path = conf.expand_log_path("%p/%n.%l", "pcapdump", &reg);
        assert_eq!(path, ::std::path::PathBuf::from("/tmp/logs/Kismet.pcapdump"));
    }

    #[test]
    fn munging_strips_control_characters() {
        assert_eq!(munge_to_printable("ok\x07name"), "ok_name");
        assert_eq!(munge_to_printable("plain"), "plain");
    }
}
