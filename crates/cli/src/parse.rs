//! ArgMatches → CliAction conversion.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ArgMatches;
use neostore_core::Value;

use crate::value::parse_assignment;

/// The result of parsing user input.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Print a summary of one container.
    Inspect { path: PathBuf },
    /// Write side-table entries into one group.
    SetMeta {
        path: PathBuf,
        group: String,
        entries: BTreeMap<String, Value>,
    },
}

/// Convert parsed arguments into an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    match matches.subcommand() {
        Some(("inspect", sub)) => Ok(CliAction::Inspect {
            path: required_path(sub)?,
        }),
        Some(("set-meta", sub)) => {
            let mut entries = BTreeMap::new();
            for raw in sub.get_many::<String>("entries").into_iter().flatten() {
                let (key, value) = parse_assignment(raw)?;
                entries.insert(key, value);
            }
            let group = sub
                .get_one::<String>("group")
                .cloned()
                .unwrap_or_default();
            Ok(CliAction::SetMeta {
                path: required_path(sub)?,
                group,
                entries,
            })
        }
        Some((other, _)) => Err(format!("Unknown command '{}'", other)),
        None => Err("No command given".to_string()),
    }
}

fn required_path(sub: &ArgMatches) -> Result<PathBuf, String> {
    sub.get_one::<String>("file")
        .map(PathBuf::from)
        .ok_or_else(|| "Missing container file".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;

    fn parse(args: &[&str]) -> Result<CliAction, String> {
        let matches = build_cli().try_get_matches_from(args).unwrap();
        matches_to_action(&matches)
    }

    #[test]
    fn test_inspect() {
        assert_eq!(
            parse(&["neostore", "inspect", "a.h5"]).unwrap(),
            CliAction::Inspect {
                path: PathBuf::from("a.h5")
            }
        );
    }

    #[test]
    fn test_set_meta_defaults_to_root_group() {
        let action = parse(&["neostore", "set-meta", "a.h5", "subject=s01", "invalid=true"]).unwrap();
        let mut entries = BTreeMap::new();
        entries.insert("subject".to_string(), Value::String("s01".into()));
        entries.insert("invalid".to_string(), Value::Bool(true));
        assert_eq!(
            action,
            CliAction::SetMeta {
                path: PathBuf::from("a.h5"),
                group: String::new(),
                entries,
            }
        );
    }

    #[test]
    fn test_set_meta_rejects_bad_assignment() {
        assert!(parse(&["neostore", "set-meta", "a.h5", "oops"]).is_err());
    }
}
