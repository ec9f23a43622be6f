use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "adsnap",
    version,
    long_about = "Execute LDAP filters directly against ADExplorer snapshot files.\n\nNotes:\n  - Snapshots are read-only; no directory service is contacted.\n  - Filters use RFC 4515 syntax, e.g. \"(&(objectClass=user)(mail=*))\"."
)]
/// Offline LDAP queries against ADExplorer snapshots.
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) cmd: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run an LDAP filter against a snapshot and print the matches.
    #[command(
        after_help = "Examples:\n  adsnap query corp.dat --filter \"(objectClass=user)\"\n  adsnap query corp.dat --filter \"(mail=*)\" --attributes distinguishedName,mail --format csv\n  adsnap query corp.dat --filter \"(sAMAccountName=A*)\" --ignore-case --limit 10\n\nExit codes:\n  0 matches found, 1 no matches, 2 filter syntax error, 3 snapshot error."
    )]
    Query {
        /// Path to the ADExplorer snapshot file.
        snapshot: String,
        /// RFC 4515 filter to evaluate.
        #[arg(long)]
        filter: String,
        /// Attributes to emit (repeatable; comma-separated lists accepted).
        #[arg(long)]
        attributes: Vec<String>,
        /// Output format.
        #[arg(long, default_value = "table", value_parser = ["table", "json", "csv"])]
        format: String,
        /// Maximum number of matches to return.
        #[arg(long)]
        limit: Option<usize>,
        /// Case-insensitive value comparisons.
        #[arg(long)]
        ignore_case: bool,
        /// Print query statistics to stderr after the results.
        #[arg(long)]
        benchmark: bool,
        /// Print snapshot metadata to stderr before the results.
        #[arg(long)]
        dump_header: bool,
        /// Write results to a file instead of stdout.
        #[arg(long)]
        output: Option<String>,
    },
    /// Print snapshot header metadata.
    Header {
        /// Path to the ADExplorer snapshot file.
        snapshot: String,
        /// Emit machine-readable JSON instead of human output.
        #[arg(long)]
        json: bool,
    },
    /// List the attribute schema carried by a snapshot.
    Attributes {
        /// Path to the ADExplorer snapshot file.
        snapshot: String,
        /// Emit machine-readable JSON instead of human output.
        #[arg(long)]
        json: bool,
    },
}
