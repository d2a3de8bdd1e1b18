//! `liftwire token`: inspect the bearer token cache.

use chrono::Utc;
use liftwire_api::TokenStore;
use liftwire_api::evidence::mask_secret;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::cli::{GlobalOpts, TokenArgs};
use crate::config::{self, FileTokenStore};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct TokenInfo {
    profile: String,
    token: String,
    token_type: String,
    expires_at: String,
    expires_in_secs: i64,
    cache: String,
}

pub async fn handle(args: &TokenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if global.offline {
        return Err(CliError::Validation {
            field: "offline".into(),
            reason: "the token command needs the live token endpoint".into(),
        });
    }

    let resolved = config::resolve(global)?;
    let store = FileTokenStore::for_profile(resolved.name.clone());

    if args.clear {
        store.clear()?;
        tracing::info!(profile = %resolved.name, "cleared cached token");
        if !global.quiet {
            eprintln!("Cleared cached token for profile '{}'", resolved.name);
        }
        return Ok(());
    }

    let (evidence, _) = config::evidence(&resolved)?;
    let session = config::session(&resolved, evidence)?;
    let token = if args.refresh {
        tracing::info!(profile = %resolved.name, "refreshing token");
        session.refresh_token().await?
    } else {
        session.token().await?
    };

    let info = TokenInfo {
        profile: resolved.name,
        token: mask_secret(token.secret().expose_secret()),
        token_type: token.token_type().to_owned(),
        expires_at: token.expires_at().to_rfc3339(),
        expires_in_secs: (token.expires_at() - Utc::now()).num_seconds(),
        cache: store.path().display().to_string(),
    };

    let out = output::render_single(
        global.output,
        &info,
        |i| {
            format!(
                "Profile:    {}\nToken:      {} ({})\nExpires:    {} (in {}s)\nCache:      {}",
                i.profile, i.token, i.token_type, i.expires_at, i.expires_in_secs, i.cache
            )
        },
        |i| i.expires_at.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
