use std::io::{self, BufRead, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use ykoath::calculate::Response;
use ykoath::YubiKey;

/// Where the one-time code for an MFA-protected role comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenSource {
    Prompt,
    Ykoath { name: String },
}

impl TokenSource {
    pub(crate) async fn token_code(&self, serial_number: &str) -> anyhow::Result<String> {
        let token_code = tokio::task::spawn_blocking({
            let source = self.clone();
            let serial_number = serial_number.to_owned();
            move || match source {
                Self::Prompt => prompt(&serial_number, &mut io::stdin().lock(), &mut io::stderr()),
                Self::Ykoath { name } => ykoath(&name),
            }
        })
        .await??;
        tracing::debug!(serial_number = serial_number, "obtained mfa token code");
        Ok(token_code)
    }
}

fn prompt(
    serial_number: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<String> {
    write!(output, "Assume Role MFA token code for {serial_number}: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let token_code = line.trim();
    anyhow::ensure!(
        !token_code.is_empty() && token_code.chars().all(|c| c.is_ascii_digit()),
        "invalid mfa token code",
    );
    Ok(token_code.to_owned())
}

fn ykoath(name: &str) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let yubikey = YubiKey::connect(&mut buf)?;
    yubikey.select(&mut buf)?;

    // https://github.com/Yubico/yubikey-manager/blob/b0b894906e450cff726f7ae0e71b329378b4b0c4/ykman/util.py#L400-L401
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let challenge = (timestamp / 30).to_be_bytes();
    let Response { digits, response } =
        yubikey.calculate(true, name.as_bytes(), &challenge, &mut buf)?;

    // https://github.com/Yubico/yubikey-manager/blob/b0b894906e450cff726f7ae0e71b329378b4b0c4/ykman/util.py#L371
    let response = u32::from_be_bytes(
        response
            .try_into()
            .map_err(|_| anyhow::format_err!("unexpected ykoath response length"))?,
    );
    Ok(format!(
        "{:01$}",
        response % 10_u32.pow(u32::from(digits)),
        digits as _,
    ))
}
