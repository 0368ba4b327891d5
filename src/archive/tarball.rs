use std::io::Read;

use crate::store::Entry;
use anyhow::{Context, Result, bail};
use chrono::DateTime;
use tracing::debug;

/// Read every member of a (decompressed) tar stream into memory.
///
/// Each member body is drained completely before the next header is read.
/// End of archive ends the loop; any header or body error aborts the load.
pub fn read_entries<R: Read>(reader: R) -> Result<Vec<Entry>> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = Vec::new();

    for member in archive.entries().context("Failed to read tar header")? {
        let mut member = member.context("Failed to read tar header")?;

        // Raw stored path, long-name extensions already applied
        let name = String::from_utf8_lossy(&member.path_bytes()).into_owned();
        let header = member.header();
        let is_dir = header.entry_type().is_dir();
        let mtime = header
            .mtime()
            .with_context(|| format!("{name}: invalid modification time"))?;

        // Header sizes are untrusted; let the buffer grow with the data
        let mut content = Vec::new();
        member
            .read_to_end(&mut content)
            .with_context(|| format!("{name}: failed to read member body"))?;
        if content.len() as u64 != member.size() {
            bail!("{name}: truncated member body");
        }

        debug!(name = %name, size = content.len(), "loaded tar member");
        let last_modified = i64::try_from(mtime)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        entries.push(Entry::new(name, is_dir, last_modified, content));
    }

    Ok(entries)
}
