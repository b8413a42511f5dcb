use crate::error::Error;
use serde::de::DeserializeOwned;
use std::io;

/// Layered key/value configuration, backed by a TOML table
#[derive(Clone, Debug)]
pub struct Config {
    value: toml::Value,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            value: toml::Value::Table(toml::map::Map::new()),
        }
    }
}

impl Config {
    fn lookup(&self, k: &str) -> Option<&toml::Value> {
        let mut item = &self.value;
        for key in k.split('.') {
            item = item.get(key)?;
        }
        Some(item)
    }

    /// Get an entry by path. If the input argument contains dots, the path is split
    /// into keys, each key being requested recursively.
    pub fn get<T: AsRef<str>>(&self, k: T) -> Option<&str> {
        self.lookup(k.as_ref())?.as_str()
    }

    /// Get an entry of type integer by path
    pub fn get_usize<T: AsRef<str>>(&self, k: T) -> Option<usize> {
        self.lookup(k.as_ref())?
            .as_integer()
            .and_then(|i| if i >= 0 { Some(i as usize) } else { None })
    }

    /// Get an entry of type boolean by path
    pub fn get_bool<T: AsRef<str>>(&self, k: T) -> Option<bool> {
        self.lookup(k.as_ref())?.as_bool()
    }

    /// Deserialize a whole section (or the root table, if `k` is empty)
    ///
    /// Returns `Ok(None)` if the section is absent.
    pub fn get_section<T: DeserializeOwned, K: AsRef<str>>(
        &self,
        k: K,
    ) -> Result<Option<T>, Error> {
        let item = if k.as_ref().is_empty() {
            Some(&self.value)
        } else {
            self.lookup(k.as_ref())
        };
        match item {
            Some(v) => v.clone().try_into().map(Some).map_err(Error::from),
            None => Ok(None),
        }
    }

    /// Set an entry by path, creating intermediate tables if needed.
    ///
    /// Returns `false` if a non-table value is in the way.
    pub fn set<K: AsRef<str>, V: Into<toml::Value>>(&mut self, k: K, v: V) -> bool {
        let mut keys: Vec<&str> = k.as_ref().split('.').collect();
        let last = match keys.pop() {
            Some(last) => last,
            None => return false,
        };
        let mut item = &mut self.value;
        for key in keys {
            let table = match item.as_table_mut() {
                Some(table) => table,
                None => return false,
            };
            item = table
                .entry(key)
                .or_insert(toml::Value::Table(toml::map::Map::new()));
        }
        match item.as_table_mut() {
            Some(table) => {
                table.insert(last.to_owned(), v.into());
                true
            }
            None => false,
        }
    }

    /// Load configuration from input object. If keys are already present, they are overwritten
    pub fn load_config<R: io::Read>(&mut self, mut config: R) -> Result<(), Error> {
        let mut s = String::new();
        config.read_to_string(&mut s)?;
        let table: toml::Table = toml::from_str(&s)?;
        let current = match self.value.as_table_mut() {
            Some(t) => t,
            None => return Err(Error::Generic("Configuration root is not a table")),
        };
        for (key, value) in table {
            current.insert(key, value);
        }
        Ok(())
    }
}
