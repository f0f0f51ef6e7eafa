//! Device code instructions shown in the terminal.

use recents_business::{DeviceCodeChallenge, DeviceCodePrompt};

use crate::output::Output;

#[derive(Default)]
pub struct TerminalPrompt;

impl DeviceCodePrompt for TerminalPrompt {
    fn show_challenge(&self, challenge: &DeviceCodeChallenge) {
        let out = Output::new();
        out.newline();
        out.header("Sign in to continue");
        match &challenge.message {
            Some(message) => out.print(message),
            None => out.print(format!(
                "Open {} and enter the code {}",
                challenge.verification_uri, challenge.user_code
            )),
        }
        out.labeled_indent("URL", &challenge.verification_uri, 2);
        out.labeled_indent("Code", &challenge.user_code, 2);
        out.dim(format!(
            "Waiting for sign-in, the code expires in {} minutes...",
            challenge.expires_in / 60
        ));
    }

    fn show_sign_out(&self, url: &str) {
        Output::new().dim(format!("To also end the browser session, visit {url}"));
    }
}
