use std::collections::HashMap;

/// Lower-cased route name → path with `{placeholders}`.
#[derive(Debug, Clone, Default)]
pub struct RouteNames {
    paths: HashMap<String, String>,
}

impl RouteNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, path: &str) {
        let key = name.to_lowercase();
        if let Some(previous) = self.paths.insert(key, path.to_string()) {
            tracing::warn!(name, previous = %previous, path, "route name redefined");
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.paths.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolves `name`, substituting `params` given as flat key/value pairs.
    ///
    /// Unknown names resolve to `""`. An odd trailing key is paired with an
    /// empty value. Substitution is textual: every `{key}` is replaced in
    /// the order the pairs are given and unknown placeholders stay as-is.
    pub fn resolve(&self, name: &str, params: &[&str]) -> String {
        let Some(path) = self.get(name) else {
            return String::new();
        };

        let mut resolved = path.to_string();
        for pair in params.chunks(2) {
            let key = pair[0];
            let value = pair.get(1).copied().unwrap_or("");
            resolved = resolved.replace(&format!("{{{key}}}"), value);
        }
        resolved
    }
}
