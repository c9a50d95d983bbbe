//! Connect-phase state machine: TLS upgrade, login, FEAT, TYPE
//!
//! Runs sequentially on the [`ControlChannel`] before the dispatcher task
//! takes over the socket. Each step branches on the reply code the way
//! RFC 959/2389/4217 prescribe.

use crate::commands;
use crate::config::{SecureMode, SessionConfig};
use crate::error::{FtpError, Result};
use crate::features::Features;
use crate::response::codes;
use crate::transport::MaybeTlsStream;
use tracing::debug;

use super::connection::TlsContext;
use super::io::ControlChannel;
use super::state::TlsStage;

/// Upgrade the control channel to TLS via AUTH TLS, falling back to AUTH SSL
///
/// After the handshake, PBSZ 0 is negotiated; PROT P only in full explicit
/// mode so control-only sessions keep a plaintext data path.
pub(super) async fn upgrade_control(
    mut channel: ControlChannel,
    config: &SessionConfig,
    tls: Option<&TlsContext>,
) -> Result<(ControlChannel, TlsStage)> {
    let tls = tls.ok_or_else(|| FtpError::Tls("Unable to secure connection(s)".to_string()))?;

    let reply = channel.command(commands::auth_tls()).await?;
    let stage = if reply.code == codes::AUTH_ACCEPTED {
        TlsStage::UpgradedTls
    } else {
        debug!("AUTH TLS refused ({}), trying AUTH SSL", reply.code);
        let reply = channel.command(commands::auth_ssl()).await?;
        if reply.code != codes::AUTH_ACCEPTED {
            return Err(FtpError::Tls("Unable to secure connection(s)".to_string()));
        }
        TlsStage::UpgradedSsl
    };

    // Detach the parser from the raw socket, wrap, reattach.
    let (stream, parser) = channel.into_parts();
    let tcp = match stream {
        MaybeTlsStream::Plain(tcp) => tcp,
        MaybeTlsStream::Tls(_) => {
            return Err(FtpError::Tls("control channel already secured".to_string()));
        }
    };
    let tls_stream = tls.wrap(tcp).await?;
    let mut channel = ControlChannel::with_parser(MaybeTlsStream::Tls(Box::new(tls_stream)), parser);
    debug!("control channel upgraded to TLS ({:?})", stage);

    let reply = channel.command(commands::pbsz()).await?;
    if reply.code != codes::COMMAND_OKAY {
        return Err(FtpError::Tls("Unable to secure connection(s)".to_string()));
    }
    if config.secure == SecureMode::Explicit {
        let reply = channel.command(commands::prot_private()).await?;
        if reply.code != codes::COMMAND_OKAY {
            return Err(FtpError::Tls("Unable to secure connection(s)".to_string()));
        }
    }

    Ok((channel, stage))
}

/// USER/PASS exchange
///
/// A 230 to USER skips the password; 331/332 ask for one.
pub(super) async fn login(channel: &mut ControlChannel, config: &SessionConfig) -> Result<()> {
    debug!("logging in as {}", config.user);

    let reply = channel.command(&commands::user(&config.user)).await?;
    match reply.code {
        codes::LOGGED_IN => return Ok(()),
        codes::NEED_PASSWORD | codes::NEED_ACCOUNT => {}
        code => {
            return Err(FtpError::Protocol {
                code,
                message: reply.text,
            });
        }
    }

    let reply = channel.command(&commands::pass(&config.password)).await?;
    if !reply.is_success() {
        return Err(FtpError::Protocol {
            code: reply.code,
            message: reply.text,
        });
    }
    debug!("login successful");
    Ok(())
}

/// FEAT discovery (RFC 2389)
///
/// Servers without FEAT answer 500/502; that is an empty feature set, not
/// an error. Configured overrides are applied to whatever was discovered.
pub(super) async fn discover_features(
    channel: &mut ControlChannel,
    config: &SessionConfig,
) -> Result<Features> {
    let reply = channel.command(commands::feat()).await?;
    let mut features = match reply.code {
        codes::COMMAND_NOT_RECOGNIZED | codes::NOT_IMPLEMENTED => Features::unknown(),
        _ if reply.is_success() => Features::parse(&reply.text),
        code => {
            return Err(FtpError::Protocol {
                code,
                message: reply.text,
            });
        }
    };

    features.apply_overrides(&config.feat_overrides);
    debug!("server features: {:?}", features.list());
    Ok(features)
}

/// Default the session to binary transfers (TYPE I)
pub(super) async fn negotiate_type(channel: &mut ControlChannel) -> Result<()> {
    channel.expect_success(commands::type_image()).await?;
    Ok(())
}
