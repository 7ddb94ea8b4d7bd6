//! Authentication commands for the subsync CLI
//!
//! Credentials live in a `username=`/`password=` file next to the
//! configuration, readable only by the owner.

use anyhow::{Context, Result};
use dialoguer::{Input, Password};
use std::path::Path;
use subsync_core::security::{
    AuthCredentials, CredentialProvider, FileCredentialProvider, SecureString,
};

/// Prompt for OpenSubtitles credentials and store them at `path`
pub async fn login(path: &Path) -> Result<()> {
    println!("OpenSubtitles Authentication");
    println!("============================");
    println!("Leave both fields empty to use an anonymous session.");

    let username: String = Input::new()
        .with_prompt("Username")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read username")?;

    let password = Password::new()
        .with_prompt("Password")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read password")?;

    let credentials = AuthCredentials::new(username.trim(), SecureString::new(password));
    FileCredentialProvider::write(path, &credentials)
        .await
        .context("Failed to store credentials")?;

    println!("\n✓ Credentials stored in {}", path.display());
    Ok(())
}

/// Remove the stored credentials file
pub async fn logout(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            println!("✓ Removed credentials from {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("No stored credentials found.");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

/// Show which account is stored (without exposing the password)
pub async fn status(path: &Path) -> Result<()> {
    let credentials = stored_credentials(path).await?;

    if credentials.is_anonymous() {
        println!("No stored credentials found, sessions are anonymous.");
        println!("Use 'subsync auth login' to add credentials.");
    } else {
        println!("Stored OpenSubtitles account: {}", credentials.username);
        println!("Credentials file: {}", path.display());
    }
    Ok(())
}

/// Credentials as the sync command will see them
pub async fn stored_credentials(path: &Path) -> Result<AuthCredentials> {
    FileCredentialProvider::new(path)
        .get()
        .await
        .context("Failed to read credentials")
}
