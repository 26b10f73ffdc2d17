use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "TREEFRAME_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Tree key used when saving without naming one.
    #[envconfig(from = "TREEFRAME_DEFAULT_TREE_KEY", default = "default")]
    pub default_tree_key: String,
    /// File extension of the per-tree files written by the Arrow IPC store.
    #[envconfig(from = "TREEFRAME_IPC_EXTENSION", default = "arrow")]
    pub ipc_extension: String,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.default_tree_key, "default");
        assert_eq!(config.ipc_extension, "arrow");
    }

    #[test]
    fn test_overrides() {
        let env = HashMap::from([
            ("TREEFRAME_DEFAULT_TREE_KEY".to_string(), "events".to_string()),
            ("TREEFRAME_IPC_EXTENSION".to_string(), "ipc".to_string()),
        ]);
        let config = Config::init_from_hashmap(&env).unwrap();
        assert_eq!(config.default_tree_key, "events");
        assert_eq!(config.ipc_extension, "ipc");
        assert_eq!(config.log_level, "info");
    }
}
