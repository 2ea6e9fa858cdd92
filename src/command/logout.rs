use std::path::PathBuf;

use anyhow::Result;

use crate::auth::TokenStore;

pub async fn run_logout(token_file: String) -> Result<()> {
    let store = TokenStore::new(PathBuf::from(&token_file));

    if !store.exists() {
        println!("No Drive token is stored.");
        return Ok(());
    }

    store.clear()?;
    println!("✅ Removed the Drive token at {token_file}");

    Ok(())
}
