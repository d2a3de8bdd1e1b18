//! Config subcommand handlers.

use std::fmt::Write as _;
use std::io::BufRead;

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Replace plaintext secrets so `config show` never prints them.
fn redact(cfg: &mut Config) {
    for profile in cfg.profiles.values_mut() {
        if profile.client_secret.is_some() {
            profile.client_secret = Some(MASK.into());
        }
    }
}

/// Format config for display. Expects an already redacted config.
fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "evidence_capacity = {}", cfg.defaults.evidence_capacity);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "token_url = \"{}\"", p.token_url);
        let _ = writeln!(out, "ws_url = \"{}\"", p.ws_url);
        let _ = writeln!(out, "subprotocol = \"{}\"", p.subprotocol);
        let _ = writeln!(out, "group_id = \"{}\"", p.group_id);
        let optional = [
            ("scope", p.scope.clone()),
            ("client_id", p.client_id.clone()),
            ("client_secret", p.client_secret.clone()),
            ("client_secret_env", p.client_secret_env.clone()),
            ("building_id", p.building_id.clone()),
            ("ca_cert", p.ca_cert.as_ref().map(|c| c.display().to_string())),
            ("evidence_file", p.evidence_file.as_ref().map(|c| c.display().to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                let _ = writeln!(out, "{key} = \"{value}\"");
            }
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

fn non_empty(field: &str, value: String) -> Result<String, CliError> {
    if value.trim().is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(value)
}

fn store_secret(profile_name: &str, secret: &str) -> Result<(), CliError> {
    config::store_client_secret(profile_name, secret).map_err(|e| CliError::Validation {
        field: "keyring".into(),
        reason: format!("failed to store client secret in keyring: {e}"),
    })
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String, CliError> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    input.interact_text().map_err(prompt_err)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let mut cfg = config::load_config()?;
            redact(&mut cfg);
            let out = output::render_single(global.output, &cfg, format_config, |_| {
                config::config_path().display().to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::SetSecret { stdin } => {
            let cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);

            let secret = if stdin {
                let mut line = String::new();
                std::io::stdin().lock().read_line(&mut line)?;
                line.trim_end_matches(['\r', '\n']).to_owned()
            } else {
                rpassword::prompt_password("Client secret: ").map_err(prompt_err)?
            };
            store_secret(&profile_name, &non_empty("client_secret", secret)?)?;

            if !global.quiet {
                eprintln!("✓ Client secret stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}

/// Interactive wizard. Adds or replaces one profile, keeping the others.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("liftwire configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = config::load_config()?;
    let default_name = global.profile.clone().unwrap_or_else(|| "default".into());

    let profile_name = non_empty("profile", prompt_text("Profile name", Some(&default_name))?)?;
    let defaults = Profile::default();

    let token_url = prompt_text("Token endpoint", Some(&defaults.token_url))?;
    let ws_url = prompt_text("WebSocket endpoint", Some(&defaults.ws_url))?;
    let client_id = non_empty("client_id", prompt_text("Client id", None)?)?;

    let secret = non_empty(
        "client_secret",
        rpassword::prompt_password("Client secret: ").map_err(prompt_err)?,
    )?;
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the client secret?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    let client_secret = if selection == 0 {
        store_secret(&profile_name, &secret)?;
        eprintln!("   ✓ Client secret stored in system keyring");
        None
    } else {
        Some(secret)
    };

    let building_id = prompt_text("Building id", None)?;
    let group_id = prompt_text("Group id", Some(&defaults.group_id))?;

    let profile = Profile {
        token_url,
        ws_url,
        client_id: Some(client_id),
        client_secret,
        building_id: Some(building_id).filter(|b| !b.trim().is_empty()),
        group_id,
        ..defaults
    };

    cfg.profiles.insert(profile_name.clone(), profile);
    let default_is_missing = cfg
        .default_profile
        .as_ref()
        .is_none_or(|d| !cfg.profiles.contains_key(d));
    if default_is_missing {
        cfg.default_profile = Some(profile_name.clone());
    }
    config::save_config(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Profile: {profile_name}");
    eprintln!("\n  Test it: liftwire --profile {profile_name} ping");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_never_prints_plaintext_secrets() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "site".into(),
            Profile {
                client_id: Some("abc".into()),
                client_secret: Some("hunter2-very-secret".into()),
                building_id: Some("4TFxWRCv23D".into()),
                ..Profile::default()
            },
        );

        redact(&mut cfg);
        let text = format_config(&cfg);
        assert!(text.contains("[profiles.site]"));
        assert!(text.contains("client_id = \"abc\""));
        assert!(text.contains("client_secret = \"****\""));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn empty_values_are_rejected() {
        assert!(non_empty("client_id", "  ".into()).is_err());
        assert_eq!(non_empty("client_id", "x".into()).ok().as_deref(), Some("x"));
    }
}
