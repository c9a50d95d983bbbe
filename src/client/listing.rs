//! Directory listings and single-entry lookups (LIST, MLSD, MLST)

use crate::commands;
use crate::error::{FtpError, Result};
use crate::listing::{Entry, ListingEntry, ListingMode, parse_line, parse_listing};
use crate::transport::InflateReader;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::FtpClient;

impl FtpClient {
    /// List a directory (or the current one when `path` is None)
    ///
    /// Servers advertising MLST get MLSD and the machine-readable grammar;
    /// everything else gets LIST with the Unix/MS-DOS grammars. Lines no
    /// grammar accepts are returned raw.
    pub async fn list(
        &self,
        path: Option<&str>,
        use_compression: bool,
    ) -> Result<Vec<ListingEntry>> {
        let (command, mode) = if self.features.has("MLST") {
            (commands::mlsd(path), ListingMode::Mlsd)
        } else {
            (commands::list(path), ListingMode::List)
        };

        let text = self.read_data_to_string(command, use_compression).await?;
        let entries = parse_listing(&text, mode);
        debug!("listing yielded {} entries", entries.len());
        Ok(entries)
    }

    /// `cd path`, list it, and restore the working directory afterwards
    ///
    /// The restore runs even when the listing fails.
    pub async fn list_safe(
        &self,
        path: &str,
        use_compression: bool,
    ) -> Result<Vec<ListingEntry>> {
        let owd = self.pwd().await?;
        self.cwd(path).await?;

        let result = self.list(None, use_compression).await;
        let restore = self.cwd(&owd).await;

        let entries = result?;
        restore?;
        Ok(entries)
    }

    /// Metadata for a single path
    ///
    /// Uses MLST when advertised; otherwise lists the path and picks the
    /// `.` entry (or the first parsed one). A 500/502 to MLST switches the
    /// session to the LIST fallback permanently.
    pub async fn file_info(&self, path: &str) -> Result<Entry> {
        let mlst_known_missing = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected
            .is_unsupported("MLST");

        if self.features.has("MLST") && !mlst_known_missing {
            match self.command(commands::mlst(path)).await {
                Ok(reply) => {
                    // 250 reply: entry line(s) between the begin/end lines.
                    for line in reply.text.lines() {
                        if let ListingEntry::Parsed(entry) =
                            parse_line(line.trim(), ListingMode::Mlsd)
                        {
                            return Ok(entry);
                        }
                    }
                    return Err(FtpError::Parse(format!(
                        "no entry in MLST reply for {}",
                        path
                    )));
                }
                Err(e) if e.is_unsupported() => {
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported("MLST");
                }
                Err(e) => return Err(e),
            }
        }

        let entries = self.list(Some(path), false).await?;
        let parsed: Vec<Entry> = entries
            .into_iter()
            .filter_map(|e| match e {
                ListingEntry::Parsed(entry) => Some(entry),
                ListingEntry::Raw(_) => None,
            })
            .collect();

        parsed
            .iter()
            .find(|e| e.name == ".")
            .or_else(|| parsed.first())
            .cloned()
            .ok_or_else(|| FtpError::Parse(format!("no listing entry for {}", path)))
    }

    /// Run a data command and collect its payload as text
    async fn read_data_to_string(&self, command: String, use_compression: bool) -> Result<String> {
        let mut channel = self.open_data(command, use_compression, false).await?;
        let stream = channel.stream.take().ok_or(FtpError::ConnectionClosed)?;

        let mut raw = Vec::new();
        let read_result = if use_compression {
            let mut reader = InflateReader::new(stream);
            let result = reader.read_to_end(&mut raw).await;
            self.record_compression(reader.bytes_in(), reader.bytes_out());
            result
        } else {
            let mut stream = stream;
            stream.read_to_end(&mut raw).await
        };

        let finish_result = channel.finish().await;
        finish_result?;
        read_result.map_err(FtpError::Io)?;

        // Listing text is decoded leniently; framing already happened at
        // the byte level.
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}
