//! Path and metadata operations
//!
//! Thin wrappers over the dispatcher with the RFC 959 fallback behaviors:
//! a 500/502 to PWD/CDUP/SIZE/MDTM switches the session to the documented
//! workaround and the original verb is never retried.

use crate::commands;
use crate::error::{FtpError, Result};
use crate::listing::parse_timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use super::FtpClient;

static QUOTED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("quoted path regex"));

/// First quoted string of a 257 reply body
fn extract_quoted(text: &str) -> Option<String> {
    QUOTED_PATH_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

impl FtpClient {
    /// Change the working directory
    pub async fn cwd(&self, path: &str) -> Result<()> {
        self.command(commands::cwd(path)).await?;
        Ok(())
    }

    /// Current working directory (PWD, falling back to `CWD .`)
    pub async fn pwd(&self) -> Result<String> {
        let unsupported = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected
            .is_unsupported("PWD");

        if !unsupported {
            match self.command(commands::pwd()).await {
                Ok(reply) => {
                    return extract_quoted(&reply.text).ok_or_else(|| {
                        FtpError::Parse(format!("no quoted path in PWD reply: {}", reply.text))
                    });
                }
                Err(e) if e.is_unsupported() => {
                    debug!("PWD unsupported, using CWD fallback");
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported("PWD");
                }
                Err(e) => return Err(e),
            }
        }

        let reply = self.command_promoted(commands::cwd(".")).await?;
        Ok(extract_quoted(&reply.text).unwrap_or(reply.text))
    }

    /// Move to the parent directory (CDUP, falling back to `CWD ..`)
    pub async fn cdup(&self) -> Result<()> {
        let unsupported = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected
            .is_unsupported("CDUP");

        if !unsupported {
            match self.command(commands::cdup()).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_unsupported() => {
                    debug!("CDUP unsupported, using CWD fallback");
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported("CDUP");
                }
                Err(e) => return Err(e),
            }
        }

        self.command_promoted(commands::cwd("..")).await?;
        Ok(())
    }

    /// Delete a remote file
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.command(commands::dele(path)).await?;
        Ok(())
    }

    /// Send a SITE command; returns the raw `(code, text)` outcome
    pub async fn site(&self, command: &str) -> Result<(u16, String)> {
        let reply = self.command(commands::site(command)).await?;
        Ok((reply.code, reply.text))
    }

    /// Server status text (STAT), optionally for a path
    pub async fn status(&self, path: Option<&str>) -> Result<String> {
        let reply = self.command(commands::stat(path)).await?;
        Ok(reply.text)
    }

    /// Server operating system, the first token of the SYST reply
    pub async fn system(&self) -> Result<String> {
        let reply = self.command(commands::syst()).await?;
        Ok(reply
            .text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    /// Rename a remote path
    ///
    /// RNTO is promoted so no queued command can slip between the two
    /// halves of the exchange.
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.command(commands::rnfr(from)).await?;
        self.command_promoted(commands::rnto(to)).await?;
        Ok(())
    }

    /// Size of a remote file in bytes (SIZE, falling back to the listing)
    pub async fn size(&self, path: &str) -> Result<u64> {
        let unsupported = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected
            .is_unsupported("SIZE");

        if !unsupported {
            match self.command(commands::size(path)).await {
                Ok(reply) => {
                    return reply.text.trim().parse().map_err(|_| {
                        FtpError::Parse(format!("invalid SIZE reply: {}", reply.text))
                    });
                }
                Err(e) if e.is_unsupported() => {
                    debug!("SIZE unsupported, using listing fallback");
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported("SIZE");
                }
                Err(e) => return Err(e),
            }
        }

        let info = self.file_info(path).await?;
        if info.is_dir() {
            return Err(FtpError::Protocol {
                code: 550,
                message: format!("{}: not a regular file", path),
            });
        }
        u64::try_from(info.size)
            .map_err(|_| FtpError::Parse(format!("no size in listing for {}", path)))
    }

    /// Last modification time (MDTM, falling back to the listing)
    pub async fn last_mod(&self, path: &str) -> Result<DateTime<Utc>> {
        let unsupported = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detected
            .is_unsupported("MDTM");

        if !unsupported {
            match self.command(commands::mdtm(path)).await {
                Ok(reply) => {
                    return parse_timestamp(reply.text.trim()).ok_or_else(|| {
                        FtpError::Parse("Invalid date/time format from server".to_string())
                    });
                }
                Err(e) if e.is_unsupported() => {
                    debug!("MDTM unsupported, using listing fallback");
                    self.state
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .detected
                        .mark_unsupported("MDTM");
                }
                Err(e) => return Err(e),
            }
        }

        let info = self.file_info(path).await?;
        info.modified
            .ok_or_else(|| FtpError::Parse("Invalid date/time format from server".to_string()))
    }

    /// Create a directory; `recursive` emulates `mkdir -p`
    ///
    /// The recursive walk changes directories segment by segment and always
    /// restores the original working directory.
    pub async fn mkdir(&self, path: &str, recursive: bool) -> Result<()> {
        if !recursive {
            self.command(commands::mkd(path)).await?;
            return Ok(());
        }

        let owd = self.pwd().await?;
        let result = self.mkdir_walk(path).await;
        let restore = self.cwd(&owd).await;
        result?;
        restore?;
        Ok(())
    }

    async fn mkdir_walk(&self, path: &str) -> Result<()> {
        if path.starts_with('/') {
            self.cwd("/").await?;
        }
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            match self.command(commands::cwd(segment)).await {
                Ok(_) => {}
                Err(FtpError::Protocol { code: 550, .. }) => {
                    self.command(commands::mkd(segment)).await?;
                    self.command(commands::cwd(segment)).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Remove a directory; `recursive` deletes its contents first
    pub async fn rmdir(&self, path: &str, recursive: bool) -> Result<()> {
        if !recursive {
            self.command(commands::rmd(path)).await?;
            return Ok(());
        }
        self.rmdir_recursive(path).await
    }

    fn rmdir_recursive<'a>(
        &'a self,
        path: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for listed in self.list(Some(path), false).await? {
                let Some(entry) = listed.entry() else { continue };
                if entry.name == "." || entry.name == ".." {
                    continue;
                }
                let child = format!("{}/{}", path.trim_end_matches('/'), entry.name);
                if entry.is_dir() {
                    self.rmdir_recursive(&child).await?;
                } else {
                    self.delete(&child).await?;
                }
            }
            self.command(commands::rmd(path)).await?;
            Ok(())
        })
    }
}
