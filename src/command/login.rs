use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::auth::{OAuthTokenManager, TokenStore};

pub async fn run_login(client_secret: String, token_file: String) -> Result<()> {
    let store = TokenStore::new(PathBuf::from(&token_file));

    // Check if an authorization is already stored
    if let Ok(Some(credential)) = store.load() {
        let usable = !credential.is_expired(chrono::Duration::zero())
            || credential.refresh_token.is_some();
        if usable {
            println!("⚠️  A Drive authorization already exists at {token_file}.");
            println!("Re-authenticating will replace it.\n");

            print!("Continue and replace the stored token? [y/N]: ");
            io::stdout().flush()?;

            let mut answer = String::new();
            io::stdin().read_line(&mut answer)?;
            let answer = answer.trim().to_lowercase();

            if answer != "y" && answer != "yes" {
                println!("Authorization cancelled. The existing token remains active.");
                return Ok(());
            }
        }
    }

    let mut manager = OAuthTokenManager::new(Path::new(&client_secret), store)?;
    manager.interactive_consent().await?;

    println!("\n✅ Drive authorization saved to {token_file}");

    Ok(())
}
