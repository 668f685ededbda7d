use std::error::Error;
use std::fmt::Formatter;

/// Print an error followed by every error in its `source` chain. Used as the
/// `Debug` impl of our error enums, so that `error.cause_chain=?e` in logs
/// shows the full story instead of just the outermost message.
pub fn error_chain_fmt(
    e: &impl Error,
    f: &mut Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{e}\n")?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{cause}")?;
        current = cause.source();
    }
    Ok(())
}
