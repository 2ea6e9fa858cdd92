use std::path::PathBuf;

use anyhow::Result;

use crate::auth::TokenStore;

pub async fn run_status(token_file: String) -> Result<()> {
    let store = TokenStore::new(PathBuf::from(&token_file));

    match store.load() {
        Ok(Some(credential)) => {
            if !credential.is_expired(chrono::Duration::zero()) {
                println!("✅ Authorized with Google Drive");
            } else if credential.refresh_token.is_some() {
                println!("✅ Authorized with Google Drive (access token expired, will refresh)");
            } else {
                println!("⚠️  Drive token expired and no refresh token is stored.");
                println!("   Run 'veodrive login' to authorize again.");
            }
            println!("   Token file: {token_file}");
            println!("   Expires: {}", credential.expiry);
            println!("   Scopes: {:?}", credential.scopes);
        }
        Ok(None) => {
            println!("❌ Not authorized with Google Drive");
            println!("   Run 'veodrive login' to authorize.");
        }
        Err(err) => {
            println!("⚠️  Token file exists but is unreadable: {err}");
        }
    }

    Ok(())
}
