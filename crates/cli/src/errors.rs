use strata_datastore::ResetError;
use thiserror::Error;

/// Errors whose text is shown to the user as is.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("error: {0}")]
    Usage(String),
    #[error("{header}\n\t{}", .tables.join("\n\t"))]
    InvalidTables { header: &'static str, tables: Vec<String> },
    #[error("error: Failed to reset changes.\ncause: {0}")]
    ResetFailed(ResetError),
}

impl From<ResetError> for CliError {
    fn from(e: ResetError) -> Self {
        match e {
            ResetError::MutuallyExclusiveFlags | ResetError::TooManyArguments => Self::Usage(e.to_string()),
            ResetError::TablesNotFound(tables) => Self::InvalidTables {
                header: if tables.len() > 1 {
                    "Invalid Table(s):"
                } else {
                    "Invalid Ref or Table:"
                },
                tables,
            },
            e => Self::ResetFailed(e),
        }
    }
}

/// Prints a failed command's error to stderr.
pub fn report(err: &anyhow::Error) {
    match err.downcast_ref::<CliError>() {
        Some(e) => eprintln!("{e}"),
        None => eprintln!("error: {err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reset_errors_read_like_usage() {
        assert_eq!(
            CliError::from(ResetError::MutuallyExclusiveFlags).to_string(),
            "error: --hard and --soft are mutually exclusive options."
        );
        assert_eq!(
            CliError::from(ResetError::TooManyArguments).to_string(),
            "error: --hard supports at most one additional param"
        );
        assert_eq!(
            CliError::from(ResetError::TablesNotFound(vec!["t".into()])).to_string(),
            "Invalid Ref or Table:\n\tt"
        );
        assert_eq!(
            CliError::from(ResetError::TablesNotFound(vec!["a".into(), "b".into()])).to_string(),
            "Invalid Table(s):\n\ta\n\tb"
        );
    }
}
