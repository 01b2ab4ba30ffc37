//! Option declaration, validation, and binding.
//!
//! Module definitions declare typed option descriptors; the engine binds a
//! string→string map supplied by a reference (or the CLI) onto them, then
//! derives the variant-id from the bound values of binary-affecting options.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::module::{Define, Module};
use crate::errors::{BuildError, Result};
use crate::util::Fingerprint;

/// Canonical option-name pattern.
static OPTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_\-+$@.]+[A-Za-z0-9_\-+$@.]*$").unwrap());

/// The nominal type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Bool,
    Int,
    #[default]
    String,
    Enum,
}

/// Declared metadata for one module option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Whether the bound value participates in the variant-id.
    #[serde(default)]
    pub changes_binary: bool,
    #[serde(default)]
    pub value_type: OptionType,
    /// Members, when `value_type` is `Enum`.
    #[serde(default)]
    pub members: Vec<String>,
    /// Default raw value applied when the option is not supplied.
    #[serde(default)]
    pub default: Option<String>,
    /// Preprocessor definition to derive from the bound value.
    #[serde(default)]
    pub define: Option<String>,
}

impl OptionDescriptor {
    /// Parse a raw value into this descriptor's nominal type.
    pub fn parse(&self, raw: &str) -> Result<OptionValue> {
        match self.value_type {
            OptionType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(OptionValue::Bool(true)),
                "false" | "0" | "no" => Ok(OptionValue::Bool(false)),
                _ => Err(BuildError::BadOptionValue {
                    name: self.name.clone(),
                    raw: raw.to_string(),
                    expected: "one of true/false/1/0/yes/no".to_string(),
                }),
            },
            OptionType::Int => raw.trim().parse::<i64>().map(OptionValue::Int).map_err(|_| {
                BuildError::BadOptionValue {
                    name: self.name.clone(),
                    raw: raw.to_string(),
                    expected: "a decimal integer".to_string(),
                }
            }),
            OptionType::String => Ok(OptionValue::String(raw.to_string())),
            OptionType::Enum => self
                .members
                .iter()
                .find(|m| m.eq_ignore_ascii_case(raw))
                .map(|m| OptionValue::Enum(m.clone()))
                .ok_or_else(|| BuildError::BadOptionValue {
                    name: self.name.clone(),
                    raw: raw.to_string(),
                    expected: format!("one of {:?}", self.members),
                }),
        }
    }

    /// The zero value used when the option is absent and no default exists.
    pub fn zero_value(&self) -> OptionValue {
        match self.value_type {
            OptionType::Bool => OptionValue::Bool(false),
            OptionType::Int => OptionValue::Int(0),
            OptionType::String => OptionValue::String(String::new()),
            OptionType::Enum => {
                OptionValue::Enum(self.members.first().cloned().unwrap_or_default())
            }
        }
    }
}

/// A bound option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    String(String),
    Enum(String),
}

impl fmt::Display for OptionValue {
    /// Canonical textual form, used by the variant-id and `property` output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::String(s) | OptionValue::Enum(s) => f.write_str(s),
        }
    }
}

/// Validate an option name against the canonical pattern.
///
/// On failure the error names the 1-based columns of the offending
/// characters.
pub fn validate_option_name(name: &str) -> Result<()> {
    if OPTION_NAME_RE.is_match(name) {
        return Ok(());
    }

    let mut columns = Vec::new();
    for (i, c) in name.chars().enumerate() {
        let tail_ok = c.is_ascii_alphanumeric() || "_-+$@.".contains(c);
        let head_ok = tail_ok && !c.is_ascii_digit();
        if (i == 0 && !head_ok) || (i > 0 && !tail_ok) {
            columns.push(i + 1);
        }
    }
    if columns.is_empty() {
        // Empty name, or digits-only head with no legal leading character.
        columns.push(1);
    }

    Err(BuildError::BadOptionName {
        name: name.to_string(),
        columns,
    })
}

/// Bind a supplied option map onto a module per its declared descriptors.
///
/// Option-derived preprocessor definitions land in the module's private
/// definitions bucket so they never propagate to dependents.
pub fn bind_options(
    module: &mut Module,
    descriptors: &[OptionDescriptor],
    supplied: &BTreeMap<String, String>,
) -> Result<()> {
    for descriptor in descriptors {
        validate_option_name(&descriptor.name)?;
    }

    for key in supplied.keys() {
        if !descriptors.iter().any(|d| &d.name == key) {
            return Err(BuildError::UnknownOption {
                name: key.clone(),
                module: module.name().to_string(),
            });
        }
    }

    for descriptor in descriptors {
        let value = match supplied.get(&descriptor.name) {
            Some(raw) => descriptor.parse(raw)?,
            None if descriptor.required => {
                return Err(BuildError::MissingOption {
                    name: descriptor.name.clone(),
                    module: module.name().to_string(),
                });
            }
            None => match &descriptor.default {
                Some(raw) => descriptor.parse(raw)?,
                None => descriptor.zero_value(),
            },
        };

        if let Some(define) = &descriptor.define {
            match &value {
                OptionValue::Bool(true) => {
                    module.definitions_mut()?.add_private(Define::flag(define));
                }
                OptionValue::Bool(false) => {}
                other => {
                    module
                        .definitions_mut()?
                        .add_private(Define::key_value(define, other.to_string()));
                }
            }
        }

        module.bind_option(descriptor.name.clone(), value)?;
    }

    Ok(())
}

/// Compute a module's variant-id from its bound options.
///
/// Only options with `changes_binary = true` participate. The hash runs over
/// name/value pairs in sorted name order, so map insertion order is
/// irrelevant.
pub fn variant_id(module: &Module, descriptors: &[OptionDescriptor]) -> String {
    let mut fp = Fingerprint::new();
    for (name, value) in module.options() {
        let affects = descriptors
            .iter()
            .any(|d| &d.name == name && d.changes_binary);
        if affects {
            fp.update_str(name);
            fp.update_str(&value.to_string());
        }
    }
    fp.finish_short()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::module::ModuleType;

    fn descriptor(name: &str, value_type: OptionType) -> OptionDescriptor {
        OptionDescriptor {
            name: name.to_string(),
            description: String::new(),
            required: false,
            changes_binary: true,
            value_type,
            members: Vec::new(),
            default: None,
            define: None,
        }
    }

    #[test]
    fn test_option_name_accepts_canonical_forms() {
        for name in ["opt", "opt_a", "OPT-1", "$special", "a.b.c", "+x", "opt9"] {
            assert!(validate_option_name(name).is_ok(), "rejected {name}");
        }
    }

    #[test]
    fn test_option_name_rejects_with_columns() {
        let err = validate_option_name("op t!").unwrap_err();
        match err {
            BuildError::BadOptionName { columns, .. } => assert_eq!(columns, vec![3, 5]),
            other => panic!("unexpected error: {other}"),
        }

        // Leading digit violates the head class.
        let err = validate_option_name("9lives").unwrap_err();
        match err {
            BuildError::BadOptionName { columns, .. } => assert_eq!(columns, vec![1]),
            other => panic!("unexpected error: {other}"),
        }

        assert!(validate_option_name("").is_err());
    }

    #[test]
    fn test_bool_parsing_is_case_insensitive() {
        let d = descriptor("flag", OptionType::Bool);
        assert_eq!(d.parse("TRUE").unwrap(), OptionValue::Bool(true));
        assert_eq!(d.parse("Yes").unwrap(), OptionValue::Bool(true));
        assert_eq!(d.parse("0").unwrap(), OptionValue::Bool(false));
        assert!(d.parse("maybe").is_err());
    }

    #[test]
    fn test_enum_parse_canonicalizes_case() {
        let mut d = descriptor("mode", OptionType::Enum);
        d.members = vec!["Fast".into(), "Small".into()];
        assert_eq!(d.parse("fast").unwrap(), OptionValue::Enum("Fast".into()));
        assert!(d.parse("tiny").is_err());
    }

    #[test]
    fn test_bind_missing_required() {
        let mut m = Module::new("demo", ModuleType::StaticLibrary);
        let mut d = descriptor("level", OptionType::Int);
        d.required = true;

        let err = bind_options(&mut m, &[d], &BTreeMap::new()).unwrap_err();
        assert_eq!(err.kind(), "MissingOption");
    }

    #[test]
    fn test_bind_applies_default_and_zero_value() {
        let mut m = Module::new("demo", ModuleType::StaticLibrary);
        let mut with_default = descriptor("level", OptionType::Int);
        with_default.default = Some("3".into());
        let without_default = descriptor("tag", OptionType::String);

        bind_options(
            &mut m,
            &[with_default, without_default],
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(m.options()["level"], OptionValue::Int(3));
        assert_eq!(m.options()["tag"], OptionValue::String(String::new()));
    }

    #[test]
    fn test_bind_rejects_unknown_option() {
        let mut m = Module::new("demo", ModuleType::StaticLibrary);
        let supplied = BTreeMap::from([("typo".to_string(), "1".to_string())]);

        let err = bind_options(&mut m, &[descriptor("real", OptionType::Int)], &supplied)
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownOption");
    }

    #[test]
    fn test_bind_derives_defines_privately() {
        let mut m = Module::new("demo", ModuleType::StaticLibrary);
        let mut flag = descriptor("fast", OptionType::Bool);
        flag.define = Some("FAST_PATH".into());
        let mut level = descriptor("level", OptionType::Int);
        level.define = Some("LEVEL".into());

        let supplied = BTreeMap::from([
            ("fast".to_string(), "yes".to_string()),
            ("level".to_string(), "2".to_string()),
        ]);
        bind_options(&mut m, &[flag, level], &supplied).unwrap();

        let defines = m.definitions().private();
        assert!(defines.contains(&Define::flag("FAST_PATH")));
        assert!(defines.contains(&Define::key_value("LEVEL", "2")));
        assert!(m.definitions().public().is_empty());
    }

    #[test]
    fn test_variant_id_ignores_insertion_order() {
        let descriptors = vec![
            descriptor("opt_a", OptionType::String),
            descriptor("opt_b", OptionType::String),
        ];

        let mut m1 = Module::new("demo", ModuleType::StaticLibrary);
        let supplied1 = BTreeMap::from([
            ("opt_a".to_string(), "1".to_string()),
            ("opt_b".to_string(), "x".to_string()),
        ]);
        bind_options(&mut m1, &descriptors, &supplied1).unwrap();

        let mut m2 = Module::new("demo", ModuleType::StaticLibrary);
        let supplied2 = BTreeMap::from([
            ("opt_b".to_string(), "x".to_string()),
            ("opt_a".to_string(), "1".to_string()),
        ]);
        bind_options(&mut m2, &descriptors, &supplied2).unwrap();

        assert_eq!(
            variant_id(&m1, &descriptors),
            variant_id(&m2, &descriptors)
        );
    }

    #[test]
    fn test_variant_id_ignores_non_binary_options() {
        let mut silent = descriptor("verbose_tag", OptionType::String);
        silent.changes_binary = false;
        let loud = descriptor("level", OptionType::Int);
        let descriptors = vec![silent, loud];

        let mut m1 = Module::new("demo", ModuleType::StaticLibrary);
        bind_options(
            &mut m1,
            &descriptors,
            &BTreeMap::from([
                ("verbose_tag".to_string(), "a".to_string()),
                ("level".to_string(), "1".to_string()),
            ]),
        )
        .unwrap();

        let mut m2 = Module::new("demo", ModuleType::StaticLibrary);
        bind_options(
            &mut m2,
            &descriptors,
            &BTreeMap::from([
                ("verbose_tag".to_string(), "b".to_string()),
                ("level".to_string(), "1".to_string()),
            ]),
        )
        .unwrap();

        assert_eq!(variant_id(&m1, &descriptors), variant_id(&m2, &descriptors));
    }
}
