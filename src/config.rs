//! Provisioner configuration.
//!
//! Raw configuration arrives as one or more untyped YAML mappings (the host
//! pipeline may layer several). They are merged, decoded into [`RawConfig`],
//! defaulted by [`apply_defaults`], and finally checked by
//! [`ConfigValidator`](crate::validation::ConfigValidator), which is the only
//! way to obtain a [`ProvisionConfig`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::error::{ProvisionerError, ValidationErrors};

/// Staging directory used when `staging_directory` is not configured.
pub const DEFAULT_STAGING_DIR: &str = "/tmp/packer-provisioner-ansible-local";

/// Keys the host build pipeline injects into every provisioner configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackerConfig {
    pub packer_build_name: String,
    pub packer_builder_type: String,
    pub packer_debug: bool,
    pub packer_force: bool,
    /// User variables available to templates via `user("name")`.
    pub packer_user_variables: BTreeMap<String, String>,
}

/// Decoded but not yet validated configuration.
///
/// Keys that match no field are kept in `unused` so that validation can
/// report each of them instead of silently dropping a typo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    pub common: PackerConfig,

    /// The main playbook file to execute.
    pub playbook_file: Utf8PathBuf,

    /// Local paths of additional playbook files to upload.
    pub playbook_paths: Vec<Utf8PathBuf>,

    /// Local paths of role directories to upload.
    pub role_paths: Vec<Utf8PathBuf>,

    /// Directory on the target where files are uploaded. Must be writable.
    pub staging_directory: Option<String>,

    pub unused: BTreeMap<String, Value>,
}

/// Removes `key` from `map` and decodes it.
///
/// A missing or `null` value yields the default. A value of the wrong type
/// is recorded in `errs` under `key` and also yields the default.
fn take_field<T>(map: &mut Mapping, key: &str, errs: &mut ValidationErrors) -> T
where
    T: DeserializeOwned + Default,
{
    match map.remove(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_yaml::from_value(value).unwrap_or_else(|e| {
            errs.push(format!("{}: {}", key, e));
            T::default()
        }),
    }
}

/// Renders a mapping key for error messages.
fn key_name(key: Value) -> String {
    match key {
        Value::String(name) => name,
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| value_kind(&other).to_string()),
    }
}

impl RawConfig {
    /// Merges raw configuration layers and decodes the result.
    ///
    /// Layers are applied in order and later keys override earlier ones.
    /// A `null` layer counts as empty; any other non-mapping layer is a
    /// configuration error. Each known key is decoded on its own, so every
    /// value of the wrong type is returned as a defect alongside whatever
    /// did decode.
    pub fn decode(raws: &[Value]) -> Result<(Self, ValidationErrors), ProvisionerError> {
        let mut merged = Mapping::new();
        for (index, raw) in raws.iter().enumerate() {
            match raw {
                Value::Null => {}
                Value::Mapping(map) => {
                    for (key, value) in map {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                other => {
                    return Err(ProvisionerError::Config(format!(
                        "configuration layer {} must be a mapping, got {}",
                        index + 1,
                        value_kind(other)
                    )));
                }
            }
        }

        let mut errs = ValidationErrors::new();
        let m = &mut merged;
        let common = PackerConfig {
            packer_build_name: take_field(m, "packer_build_name", &mut errs),
            packer_builder_type: take_field(m, "packer_builder_type", &mut errs),
            packer_debug: take_field(m, "packer_debug", &mut errs),
            packer_force: take_field(m, "packer_force", &mut errs),
            packer_user_variables: take_field(m, "packer_user_variables", &mut errs),
        };
        let raw = RawConfig {
            common,
            playbook_file: take_field(m, "playbook_file", &mut errs),
            playbook_paths: take_field(m, "playbook_paths", &mut errs),
            role_paths: take_field(m, "role_paths", &mut errs),
            staging_directory: take_field(m, "staging_directory", &mut errs),
            unused: merged
                .into_iter()
                .map(|(key, value)| (key_name(key), value))
                .collect(),
        };
        Ok((raw, errs))
    }

    /// Resolves relative local paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Utf8Path) {
        let resolve = |path: &mut Utf8PathBuf| {
            if !path.as_str().is_empty() && path.is_relative() {
                *path = base_dir.join(&*path);
            }
        };
        resolve(&mut self.playbook_file);
        self.playbook_paths.iter_mut().for_each(resolve);
        self.role_paths.iter_mut().for_each(resolve);
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Fills in defaults for unset optional values.
pub fn apply_defaults(mut raw: RawConfig) -> RawConfig {
    if raw
        .staging_directory
        .as_deref()
        .is_none_or(str::is_empty)
    {
        raw.staging_directory = Some(DEFAULT_STAGING_DIR.to_string());
    }
    raw
}

/// Validated provisioner configuration.
///
/// Only [`ConfigValidator`](crate::validation::ConfigValidator) constructs
/// this type, so holding one means every path was checked and
/// `staging_dir` is fully expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    pub(crate) common: PackerConfig,
    pub(crate) playbook_file: Utf8PathBuf,
    pub(crate) playbook_paths: Vec<Utf8PathBuf>,
    pub(crate) role_paths: Vec<Utf8PathBuf>,
    pub(crate) staging_dir: String,
}

impl ProvisionConfig {
    pub fn common(&self) -> &PackerConfig {
        &self.common
    }

    pub fn playbook_file(&self) -> &Utf8Path {
        &self.playbook_file
    }

    pub fn playbook_paths(&self) -> &[Utf8PathBuf] {
        &self.playbook_paths
    }

    pub fn role_paths(&self) -> &[Utf8PathBuf] {
        &self.role_paths
    }

    pub fn staging_dir(&self) -> &str {
        &self.staging_dir
    }
}

/// Loads a raw configuration layer from a YAML file.
pub fn load_raw_config(path: &Utf8Path) -> Result<Value> {
    let file = File::open(path).with_context(|| format!("failed to load file: {}", path))?;
    let reader = BufReader::new(file);
    let value: Value =
        serde_yaml::from_reader(reader).with_context(|| format!("failed to parse yaml: {}", path))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).expect("test yaml should parse")
    }

    #[test]
    fn test_decode_known_keys() {
        let (raw, errs) = RawConfig::decode(&[yaml(
            "playbook_file: site.yml\nrole_paths: [roles/common]\nstaging_directory: /opt/stage\n",
        )])
        .unwrap();
        assert!(errs.is_empty(), "errors: {}", errs);
        assert_eq!(raw.playbook_file, "site.yml");
        assert_eq!(raw.role_paths, vec![Utf8PathBuf::from("roles/common")]);
        assert!(raw.playbook_paths.is_empty());
        assert_eq!(raw.staging_directory.as_deref(), Some("/opt/stage"));
        assert!(raw.unused.is_empty());
    }

    #[test]
    fn test_decode_collects_unknown_keys() {
        let (raw, _) =
            RawConfig::decode(&[yaml("playbook_file: site.yml\nplaybok_paths: []\nfoo: 1\n")])
                .unwrap();
        let keys: Vec<&str> = raw.unused.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["foo", "playbok_paths"]);
    }

    #[test]
    fn test_decode_packer_keys_are_not_unused() {
        let raw = RawConfig::decode(&[yaml(
            "packer_build_name: web\npacker_builder_type: docker\npacker_debug: true\n\
            packer_user_variables:\n  env: prod\n",
        )])
        .unwrap()
        .0;
        assert!(raw.unused.is_empty(), "unused: {:?}", raw.unused);
        assert_eq!(raw.common.packer_build_name, "web");
        assert!(raw.common.packer_debug);
        assert_eq!(raw.common.packer_user_variables.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_decode_later_layers_override() {
        let raw = RawConfig::decode(&[
            yaml("playbook_file: first.yml\nstaging_directory: /a\n"),
            Value::Null,
            yaml("playbook_file: second.yml\n"),
        ])
        .unwrap()
        .0;
        assert_eq!(raw.playbook_file, "second.yml");
        assert_eq!(raw.staging_directory.as_deref(), Some("/a"));
    }

    #[test]
    fn test_decode_rejects_non_mapping_layer() {
        let err = RawConfig::decode(&[yaml("- a\n- b\n")]).unwrap_err();
        assert!(matches!(err, ProvisionerError::Config(_)));
        assert!(err.to_string().contains("must be a mapping, got a sequence"), "got: {}", err);
    }

    #[test]
    fn test_decode_reports_each_wrong_type_and_keeps_the_rest() {
        let (raw, errs) = RawConfig::decode(&[yaml(
            "role_paths: roles\npacker_debug: maybe\nplaybook_file: site.yml\nfoo: 1\n",
        )])
        .unwrap();
        assert_eq!(errs.len(), 2, "errors: {}", errs);
        assert!(errs.contains("role_paths: invalid type"), "errors: {}", errs);
        assert!(errs.contains("packer_debug: invalid type"), "errors: {}", errs);
        assert!(raw.role_paths.is_empty());
        assert_eq!(raw.playbook_file, "site.yml");
        assert!(raw.unused.contains_key("foo"));
    }

    #[test]
    fn test_decode_null_value_is_default() {
        let (raw, errs) = RawConfig::decode(&[yaml("role_paths: ~\nstaging_directory: ~\n")]).unwrap();
        assert!(errs.is_empty());
        assert!(raw.role_paths.is_empty());
        assert_eq!(raw.staging_directory, None);
    }

    #[test]
    fn test_decode_non_string_key_is_unused() {
        let (raw, _) = RawConfig::decode(&[yaml("42: x\n")]).unwrap();
        assert!(raw.unused.contains_key("42"), "unused: {:?}", raw.unused);
    }

    #[test]
    fn test_apply_defaults_sets_staging_dir() {
        let raw = apply_defaults(RawConfig::default());
        assert_eq!(raw.staging_directory.as_deref(), Some(DEFAULT_STAGING_DIR));
    }

    #[test]
    fn test_apply_defaults_treats_empty_as_unset() {
        let raw = apply_defaults(RawConfig {
            staging_directory: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(raw.staging_directory.as_deref(), Some(DEFAULT_STAGING_DIR));
    }

    #[test]
    fn test_apply_defaults_keeps_whitespace_value() {
        let raw = apply_defaults(RawConfig {
            staging_directory: Some("  ".to_string()),
            ..Default::default()
        });
        assert_eq!(raw.staging_directory.as_deref(), Some("  "));
    }

    #[test]
    fn test_apply_defaults_keeps_explicit_value() {
        let raw = apply_defaults(RawConfig {
            staging_directory: Some("/opt/stage".to_string()),
            ..Default::default()
        });
        assert_eq!(raw.staging_directory.as_deref(), Some("/opt/stage"));
    }

    #[test]
    fn test_resolve_paths_joins_relative_only() {
        let mut raw = RawConfig {
            playbook_file: "site.yml".into(),
            playbook_paths: vec!["/abs/extra.yml".into(), "extra.yml".into()],
            role_paths: vec!["roles/common".into()],
            ..Default::default()
        };
        raw.resolve_paths(Utf8Path::new("/work"));
        assert_eq!(raw.playbook_file, "/work/site.yml");
        assert_eq!(
            raw.playbook_paths,
            vec![Utf8PathBuf::from("/abs/extra.yml"), Utf8PathBuf::from("/work/extra.yml")]
        );
        assert_eq!(raw.role_paths, vec![Utf8PathBuf::from("/work/roles/common")]);
    }

    #[test]
    fn test_resolve_paths_leaves_empty_playbook_file() {
        let mut raw = RawConfig::default();
        raw.resolve_paths(Utf8Path::new("/work"));
        assert_eq!(raw.playbook_file, "");
    }
}
