// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::credentials::Result;
use crate::errors::CredentialsError;

/// Opens URLs for the user to visit.
///
/// The federation flow needs the user to sign in using a browser. The
/// default implementation launches the system browser. Applications that
/// cannot launch a browser, for example, because they run on a headless
/// machine, can provide their own implementation.
#[async_trait::async_trait]
pub trait Browser: std::fmt::Debug + Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

/// Launches the default browser of the operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;

#[async_trait::async_trait]
impl Browser for SystemBrowser {
    async fn open(&self, url: &str) -> Result<()> {
        let os = std::env::consts::OS;
        let wsl = os == "linux" && is_wsl().await;
        let (program, args) = command(os, wsl, url)?;
        tracing::debug!("opening browser with {program}");
        // Some openers block until the browser exits, do not wait for them.
        tokio::process::Command::new(program)
            .args(args)
            .spawn()
            .map_err(|e| {
                CredentialsError::from_msg(false, format!("cannot open the browser: {e}"))
            })?;
        Ok(())
    }
}

async fn is_wsl() -> bool {
    tokio::fs::read_to_string("/proc/version")
        .await
        .is_ok_and(|v| v.to_lowercase().contains("microsoft"))
}

// `start` treats `&` as a command separator.
fn escape_cmd(url: &str) -> String {
    url.replace('&', "^&")
}

fn command(os: &str, wsl: bool, url: &str) -> Result<(&'static str, Vec<String>)> {
    match os {
        "linux" if wsl => Ok((
            "cmd.exe",
            vec!["/c".into(), "start".into(), escape_cmd(url)],
        )),
        "linux" => Ok(("xdg-open", vec![url.into()])),
        "macos" => Ok(("open", vec![url.into()])),
        "windows" => Ok(("cmd", vec!["/c".into(), "start".into(), escape_cmd(url)])),
        _ => Err(CredentialsError::non_retryable_from_msg(
            "openBrowser: unsupported operating system",
        )),
    }
}
