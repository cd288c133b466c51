use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

pub const PASSWORD_ENV: &str = "SCRAMGEN_PASSWORD";

/// Reads the password to check against an existing secret.
pub fn read_password() -> Result<Zeroizing<String>> {
    read_with(|| Ok(Zeroizing::new(rpassword::prompt_password("Password: ")?)))
}

/// Reads a password to hash. On a terminal it must be typed twice.
pub fn read_new_password() -> Result<Zeroizing<String>> {
    read_with(|| {
        let pw1 = Zeroizing::new(rpassword::prompt_password("New password: ")?);
        let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm password: ")?);

        if pw1 != pw2 {
            bail!("passwords do not match");
        }
        Ok(pw1)
    })
}

fn read_with(prompt: impl FnOnce() -> Result<Zeroizing<String>>) -> Result<Zeroizing<String>> {
    //  SCRAMGEN_PASSWORD="secret" scramgen hash app_readwrite
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  printf '%s\n' "$PW" | scramgen hash app_readwrite
    let pw = if io::stdin().is_terminal() {
        prompt()?
    } else {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);
        buf
    };

    if pw.is_empty() {
        bail!("No password provided");
    }
    Ok(pw)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
