//! Decryption of encrypted source documents
//!
//! Encrypted entries name ciphertext documents. The engine never handles
//! keys itself: a [`Decrypter`] turns ciphertext into plaintext for a given
//! [`Format`], and the plaintext is then visited like any other document.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::format::Format;

/// Failures raised by the bundled decrypters
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

impl From<DecryptError> for Error {
    fn from(err: DecryptError) -> Self {
        let help = match &err {
            DecryptError::Spawn { program, .. } => {
                format!("Install `{}` or put it on PATH", program)
            }
            DecryptError::Failed { .. } => {
                "Check that your key material can decrypt this file".to_string()
            }
        };
        Error::crypto(err.to_string()).with_help(help)
    }
}

/// Decrypts ciphertext bytes of a known format
pub trait Decrypter: Send + Sync {
    /// Return the plaintext for `ciphertext`
    fn decrypt(&self, ciphertext: &[u8], format: Format) -> Result<Vec<u8>>;
}

/// Decrypts through the `sops` command line tool.
///
/// Ciphertext is piped on stdin; sops resolves keys from its usual
/// environment (KMS, age, PGP).
#[derive(Debug, Clone)]
pub struct SopsDecrypter {
    program: String,
}

impl SopsDecrypter {
    /// Use a specific sops binary
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SopsDecrypter {
    fn default() -> Self {
        Self::new("sops")
    }
}

impl Decrypter for SopsDecrypter {
    fn decrypt(&self, ciphertext: &[u8], format: Format) -> Result<Vec<u8>> {
        let spawn_err = |source| DecryptError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args([
                "--decrypt",
                "--input-type",
                format.as_str(),
                "--output-type",
                format.as_str(),
                "/dev/stdin",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(ciphertext).map_err(spawn_err)?;
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        if !output.status.success() {
            return Err(DecryptError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        log::trace!("decrypted {} bytes of {} input", ciphertext.len(), format);
        Ok(output.stdout)
    }
}
