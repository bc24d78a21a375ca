use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use tracing::warn;

use haibara_core::export::{default_file_name, BusinessType, ExportError, ExportFormat};
use haibara_core::{AppContext, Persistence};

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "HAIBARA_PASSWORD";

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

/// Turn an export failure into the message shown to the user.
fn export_failure(e: ExportError) -> anyhow::Error {
    warn!(error = %e, "Export command failed");
    anyhow::anyhow!(e.user_message())
}

pub async fn login(ctx: &AppContext, username: &str, remember: bool) -> Result<()> {
    let password = read_password()?;
    let persistence = Persistence::from_remember(remember || ctx.config().remember_me);

    let auth = ctx
        .client()
        .login(username, &password, persistence)
        .await
        .context("Login failed")?;

    println!(
        "Logged in as {} (token kept in {} storage until {})",
        username,
        persistence.label(),
        auth.expire.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

pub async fn logout(ctx: &AppContext) -> Result<()> {
    if let Err(e) = ctx.client().logout().await {
        // Local credential is gone either way
        warn!(error = %e, "Backend did not confirm logout");
    }
    println!("Logged out");
    Ok(())
}

pub fn status(ctx: &AppContext) -> Result<()> {
    match ctx.store().record() {
        Some((record, persistence)) => println!(
            "Logged in ({} storage), expires {} ({} min left)",
            persistence.label(),
            record.expire.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            record.minutes_until_expiry()
        ),
        None => println!("Not logged in"),
    }
    Ok(())
}

pub async fn whoami(ctx: &AppContext) -> Result<()> {
    match ctx.restore_session().await? {
        Some(user) => {
            println!("{} ({})", user.display_name(), user.username);
            if let Some(ref email) = user.email {
                println!("  email: {}", email);
            }
            if !user.roles.is_empty() {
                println!("  roles: {}", user.roles.join(", "));
            }
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

pub async fn export_types(ctx: &AppContext) -> Result<()> {
    let types = ctx.exports().business_types().await.map_err(export_failure)?;
    for code in types {
        match code.parse::<BusinessType>() {
            Ok(bt) => println!("{:<12} {}", bt.code(), bt.display_name()),
            Err(_) => println!("{}", code),
        }
    }
    Ok(())
}

pub async fn export_formats(ctx: &AppContext, business: &str) -> Result<()> {
    let business: BusinessType = business.parse()?;
    let formats = ctx
        .exports()
        .export_types(business)
        .await
        .map_err(export_failure)?;
    for format in formats {
        println!("{}", format.to_lowercase());
    }
    Ok(())
}

pub async fn export_run(
    ctx: &AppContext,
    business: &str,
    format: &str,
    file_name: Option<&str>,
    out: &Path,
    direct: bool,
    force: bool,
) -> Result<()> {
    if !ctx.store().is_authenticated() {
        anyhow::bail!("Not logged in or login expired. Run `haibara login <username>`.");
    }

    let business: BusinessType = business.parse()?;
    let format: ExportFormat = format.parse()?;

    let result = if direct {
        let name = file_name
            .map(str::to_string)
            .unwrap_or_else(|| default_file_name(business, Utc::now()));
        ctx.exports()
            .export_direct(business, format, Some(&name))
            .await
    } else {
        ctx.exporter(business).export(format, file_name).await
    };
    let file = result.map_err(export_failure)?;

    let path = file.save_to(out, force).map_err(export_failure)?;
    println!("导出成功: {} ({} bytes)", path.display(), file.bytes.len());
    Ok(())
}

pub fn export_url(
    ctx: &AppContext,
    business: &str,
    format: &str,
    file_name: Option<&str>,
) -> Result<()> {
    let business: BusinessType = business.parse()?;
    let format: ExportFormat = format.parse()?;
    let url = ctx.exports().export_url(business, format, file_name)?;
    println!("{}", url);
    Ok(())
}
