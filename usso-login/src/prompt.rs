//! Interactive credential prompt

use crate::error::{LoginError, Result};
use std::io::{BufRead, Write};
use usso_discharge::Credentials;

/// Source of the password answer
///
/// Implementations write their own `Password: ` prompt and leave the
/// cursor on a fresh line.
pub trait PasswordReader {
    /// Read the password, `None` at end of input
    fn read_password<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<String>>;
}

/// Reads the password without echo from the controlling terminal
#[derive(Debug, Default)]
pub struct HiddenPassword;

impl PasswordReader for HiddenPassword {
    fn read_password<R: BufRead, W: Write>(
        &mut self,
        _input: &mut R,
        output: &mut W,
    ) -> Result<Option<String>> {
        output.flush()?;
        let password = dialoguer::Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .report(false)
            .interact()?;
        Ok(Some(password))
    }
}

/// Reads the password as the next line of `input`
///
/// For piped input, where there is no terminal to hide it on.
#[derive(Debug, Default)]
pub struct LinePassword;

impl PasswordReader for LinePassword {
    fn read_password<R: BufRead, W: Write>(
        &mut self,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<String>> {
        write!(output, "Password: ")?;
        output.flush()?;
        let password = read_line(input)?;
        writeln!(output)?;
        Ok(password)
    }
}

/// Prompt for Ubuntu SSO credentials
///
/// Prompts go to `output`, answers come from `input` one line each except
/// the password, which comes from `passwords`. The one-time password is
/// only asked for when `two_factor` is set; an empty answer means the
/// account has no second factor.
pub fn read_usso_params<R, W, P>(
    input: &mut R,
    output: &mut W,
    passwords: &mut P,
    login_url: &str,
    two_factor: bool,
) -> Result<Credentials>
where
    R: BufRead,
    W: Write,
    P: PasswordReader,
{
    writeln!(output, "Login to {}:", login_url)?;

    write!(output, "Username: ")?;
    output.flush()?;
    let email = read_line(input)?.ok_or(LoginError::UnexpectedEof("username"))?;

    let password = passwords
        .read_password(input, output)?
        .ok_or(LoginError::UnexpectedEof("password"))?;

    let mut credentials = Credentials::new(email, password);
    if two_factor {
        write!(output, "Two-factor auth (Enter for none): ")?;
        output.flush()?;
        credentials.otp = read_line(input)?.unwrap_or_default();
    }
    Ok(credentials)
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
