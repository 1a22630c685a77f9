//! Authorization callback state machine.
//!
//! Runs once per page load of the redirect URI:
//!
//! ```text
//! Init ──(tokens stored)──────────────────────────────► Authenticated
//!  └─► CheckingCode ──(no code)───────────────────────► MissingCode
//!       └─► CheckingVerifier ──(no verifier)──────────► RedirectToLogin
//!            └─► Exchanging ──(ok)────────────────────► Authenticated
//!                           └─(err)───────────────────► ClearAndRedirect (delayed)
//! ```
//!
//! The first transition is the idempotence guard: a second invocation after a
//! successful exchange must not resubmit the single-use code.

use std::fmt;
use std::time::Duration;

use super::broker::TokenExchanger;
use super::session::Session;
use crate::error::AuthError;
use crate::oauth::token::now_secs;
use crate::oauth::TokenSet;

/// Delay before navigating back to login after a failed exchange, so the
/// failure message can be shown.
pub const FAILURE_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Terminal result of one callback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Authenticated,
    /// No code in the redirect. Terminal; the user restarts the flow.
    MissingCode { provider_error: Option<String> },
    /// No stored verifier; an exchange would be guaranteed to fail.
    RedirectToLogin,
    /// Exchange failed. Session state has been cleared.
    ClearAndRedirect { error: AuthError, delay: Duration },
}

/// Where the UI should go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Home,
    Login,
}

impl CallbackOutcome {
    /// Resolve into the next navigation, waiting out the failure delay when
    /// there is one. `MissingCode` stays on the error.
    pub async fn navigate(self) -> Option<Navigation> {
        match self {
            Self::Authenticated => Some(Navigation::Home),
            Self::RedirectToLogin => Some(Navigation::Login),
            Self::ClearAndRedirect { delay, .. } => {
                tokio::time::sleep(delay).await;
                Some(Navigation::Login)
            }
            Self::MissingCode { .. } => None,
        }
    }

    /// Message to display, if this outcome is an error.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Authenticated | Self::RedirectToLogin => None,
            Self::MissingCode {
                provider_error: Some(e),
            } => Some(format!("Authorization was not granted: {e}")),
            Self::MissingCode { provider_error: None } => {
                Some(AuthError::MissingCode.user_message())
            }
            Self::ClearAndRedirect { error, .. } => Some(error.user_message()),
        }
    }
}

enum State {
    Init,
    CheckingCode,
    CheckingVerifier { code: String },
    Exchanging { code: String, verifier: String },
    Done(CallbackOutcome),
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::CheckingCode => "checking_code",
            Self::CheckingVerifier { .. } => "checking_verifier",
            Self::Exchanging { .. } => "exchanging",
            Self::Done(CallbackOutcome::Authenticated) => "authenticated",
            Self::Done(CallbackOutcome::MissingCode { .. }) => "missing_code",
            Self::Done(CallbackOutcome::RedirectToLogin) => "redirect_to_login",
            Self::Done(CallbackOutcome::ClearAndRedirect { .. }) => "clear_and_redirect",
        };
        f.write_str(name)
    }
}

pub struct CallbackHandler<X> {
    session: Session,
    exchanger: X,
    failure_delay: Duration,
}

impl<X: TokenExchanger> CallbackHandler<X> {
    pub fn new(session: Session, exchanger: X) -> Self {
        Self {
            session,
            exchanger,
            failure_delay: FAILURE_REDIRECT_DELAY,
        }
    }

    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    pub fn exchanger(&self) -> &X {
        &self.exchanger
    }

    /// Drive the machine to a terminal outcome for `redirect_url`.
    ///
    /// The exchange is the only suspension point. If this future is dropped
    /// before it resolves, no tokens are written.
    pub async fn handle(&self, redirect_url: &str) -> CallbackOutcome {
        let mut state = State::Init;
        loop {
            let next = match state {
                State::Init => self.check_session(),
                State::CheckingCode => self.check_code(redirect_url),
                State::CheckingVerifier { code } => self.check_verifier(code),
                State::Exchanging { code, verifier } => self.exchange(&code, &verifier).await,
                State::Done(outcome) => return outcome,
            };
            tracing::debug!(to = %next, "callback transition");
            state = next;
        }
    }

    fn check_session(&self) -> State {
        match self.session.tokens.get() {
            Some(_) => State::Done(CallbackOutcome::Authenticated),
            None => State::CheckingCode,
        }
    }

    /// A redirect without a code ends the attempt, so its verifier is dropped.
    fn check_code(&self, redirect_url: &str) -> State {
        match parse_code(redirect_url) {
            Ok(code) => State::CheckingVerifier { code },
            Err(provider_error) => {
                self.session.attempts.clear();
                State::Done(CallbackOutcome::MissingCode { provider_error })
            }
        }
    }

    fn check_verifier(&self, code: String) -> State {
        match self.session.attempts.take_verifier() {
            Some(verifier) => State::Exchanging { code, verifier },
            None => {
                tracing::info!("no stored code verifier; restarting login");
                State::Done(CallbackOutcome::RedirectToLogin)
            }
        }
    }

    async fn exchange(&self, code: &str, verifier: &str) -> State {
        match self.exchanger.exchange_code(code, verifier).await {
            Ok(response) => {
                let tokens = TokenSet::from_response(response, now_secs());
                self.session.tokens.set(&tokens);
                self.session.attempts.clear();
                tracing::info!("authorization code exchanged");
                State::Done(CallbackOutcome::Authenticated)
            }
            Err(error) => {
                self.session.tokens.clear();
                self.session.attempts.clear();
                tracing::warn!(error = %error, "authorization code exchange failed");
                State::Done(CallbackOutcome::ClearAndRedirect {
                    error,
                    delay: self.failure_delay,
                })
            }
        }
    }
}

/// The non-empty `code` query parameter, or the provider's `error` if there is none.
fn parse_code(redirect_url: &str) -> Result<String, Option<String>> {
    let Ok(url) = url::Url::parse(redirect_url) else {
        tracing::warn!("callback URL could not be parsed");
        return Err(None);
    };

    let mut code = None;
    let mut provider_error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => provider_error = Some(value.into_owned()),
            _ => {}
        }
    }

    code.ok_or(provider_error)
}
