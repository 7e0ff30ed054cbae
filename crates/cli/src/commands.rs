//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("neostore")
        .about("Inspect and edit neostore container files")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_inspect())
        .subcommand(build_set_meta())
}

fn build_inspect() -> Command {
    Command::new("inspect")
        .about("Show header, completion state, metadata groups and datasets")
        .arg(Arg::new("file").required(true).help("Container file"))
}

fn build_set_meta() -> Command {
    Command::new("set-meta")
        .about("Set side-table entries; a null value removes the key")
        .arg(Arg::new("file").required(true).help("Container file"))
        .arg(
            Arg::new("entries")
                .required(true)
                .num_args(1..)
                .value_name("KEY=VALUE")
                .help("Entries to write"),
        )
        .arg(
            Arg::new("group")
                .long("group")
                .short('g')
                .default_value("")
                .help("Metadata group (default: the root table)"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_set_meta_collects_entries() {
        let matches = build_cli()
            .try_get_matches_from(["neostore", "set-meta", "f.h5", "a=1", "b=x", "--group", "data"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "set-meta");
        let entries: Vec<&String> = sub.get_many::<String>("entries").unwrap().collect();
        assert_eq!(entries, ["a=1", "b=x"]);
        assert_eq!(sub.get_one::<String>("group").unwrap(), "data");
    }
}
