use crate::cli::{Cli, Command};

/// Dispatches the parsed command line and returns the process exit code.
pub(crate) fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Query {
            snapshot,
            filter,
            attributes,
            format,
            limit,
            ignore_case,
            benchmark,
            dump_header,
            output,
        } => crate::commands::query::cmd_query(crate::commands::query::QueryArgs {
            snapshot,
            filter,
            attributes,
            format,
            limit,
            ignore_case,
            benchmark,
            dump_header,
            output,
        }),
        Command::Header { snapshot, json } => crate::commands::header::cmd_header(&snapshot, json),
        Command::Attributes { snapshot, json } => {
            crate::commands::attributes::cmd_attributes(&snapshot, json)
        }
    }
}
