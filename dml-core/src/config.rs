use nanoserde::DeJson;
use std::path::PathBuf;

/// Contents of `dml/config.json`, every field is optional
#[derive(DeJson, Debug, Default)]
struct ConfigFile {
    threads: Option<usize>,
    kahan: Option<bool>,
    print_precision: Option<usize>,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of threads for parallel kernels, 0 lets rayon decide
    pub threads: usize,
    /// Use Kahan compensated summation for sums
    pub kahan: bool,
    /// Number of decimal places used when printing matrices
    pub print_precision: usize,
    /// Directory where config was found
    pub config_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: 0,
            kahan: true,
            print_precision: 3,
            config_dir: None,
        }
    }
}

impl Config {
    /// Parse config from json text, missing fields keep their defaults
    pub fn from_json(text: &str) -> Result<Config, nanoserde::DeJsonErr> {
        let file = ConfigFile::deserialize_json(text)?;
        let default = Config::default();
        Ok(Config {
            threads: file.threads.unwrap_or(default.threads),
            kahan: file.kahan.unwrap_or(default.kahan),
            print_precision: file.print_precision.unwrap_or(default.print_precision),
            config_dir: None,
        })
    }

    /// Search through config directories and find dml/config.json.
    /// If not found or failed to parse, use defaults.
    pub fn load() -> Config {
        let debug = crate::debug(crate::DEBUG_CONFIG);
        xdg::BaseDirectories::new()
            .map_err(|e| {
                if debug {
                    println!("Failed to find config directories for config.json, {e}");
                }
            })
            .ok()
            .map(|bd| {
                let mut dirs = bd.get_config_dirs();
                dirs.insert(0, bd.get_config_home());
                dirs
            })
            .and_then(|paths| {
                paths.into_iter().find_map(|mut path| {
                    path.push("dml/config.json");
                    let file = std::fs::read_to_string(&path).ok()?;
                    path.pop();
                    Some((path, file))
                })
            })
            .and_then(|(path, file)| {
                Config::from_json(&file)
                    .map_err(|e| {
                        if debug {
                            println!("Failed to parse config.json, {e}");
                        }
                    })
                    .ok()
                    .map(|config| Config { config_dir: Some(path), ..config })
            })
            .inspect(|config| {
                if debug {
                    println!("Config successfully read and parsed: {config:?}");
                }
            })
            .unwrap_or_else(|| {
                if debug {
                    println!("Failed to get config, using defaults.");
                }
                Config::default()
            })
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config = Config::from_json(r#"{"threads": 4}"#).ok();
    assert_eq!(
        config,
        Some(Config { threads: 4, ..Config::default() })
    );
    let config = Config::from_json(r#"{"kahan": false, "print_precision": 6}"#).ok();
    assert_eq!(
        config,
        Some(Config { kahan: false, print_precision: 6, ..Config::default() })
    );
    assert!(Config::from_json("not json").is_err());
}
