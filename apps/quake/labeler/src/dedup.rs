use std::fs::File;
use std::path::Path;

use domain_labeling::{dedup_by_identity, read_csv_with_layout, write_csv_as};
use eyre::{Result, WrapErr};
use tracing::info;

use crate::output::write_atomically;

/// Deduplicate a labeled CSV by `(time, account)`, keeping the first row.
/// The score column, if any, is written back where the input had it.
pub fn run(input: &Path, output: &Path) -> Result<()> {
    let file = File::open(input).wrap_err_with(|| format!("Failed to open {}", input.display()))?;
    let (records, layout) = read_csv_with_layout(file)
        .wrap_err_with(|| format!("Failed to read {}", input.display()))?;
    let before = records.len();

    let deduped = dedup_by_identity(records);

    write_atomically(output, |writer| Ok(write_csv_as(writer, &deduped, layout)?))?;

    info!(
        before,
        after = deduped.len(),
        removed = before - deduped.len(),
        output = %output.display(),
        "Deduplicated labeled messages"
    );
    Ok(())
}
