use color_eyre::eyre::eyre;
use color_eyre::Result;
use dialoguer::{Confirm, Password};

/// Yes/no question; `default` is what a bare Enter answers
pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| eyre!("Failed to read confirmation: {}", e))
}

pub fn prompt_password(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| eyre!("Failed to read password: {}", e))
}

/// Masked entry typed twice
pub fn prompt_new_password(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .with_confirmation("Repeat to confirm", "Passwords don't match")
        .interact()
        .map_err(|e| eyre!("Failed to read password: {}", e))
}
