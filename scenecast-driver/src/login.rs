//! Login flow
//!
//! Signs the browser in once per run from the primary tab. Every later tab
//! shares the resulting cookies.
//!
//! The identity stage is flaky: after the email is submitted the provider
//! sometimes shows an interstitial instead of the account chooser. Each
//! attempt therefore ends either at the identifier field (passed) or with a
//! forced click on the interstitial's only button before retrying.

use async_trait::async_trait;
use scenecast_core::domain::job::SessionId;
use scenecast_core::{AuthError, Authenticator, DriverError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser::Browser;
use crate::elements::KEY_ENTER;
use crate::error::Result;
use crate::page;

const EMAIL_INPUT: &str = "#email-input";
const CONTINUE_BUTTON: &str = "#log-in-button";
const IDENTIFIER_INPUT: &str = "#identifierId";
const PASSWORD_INPUT: &str = r#"input[name="Passwd"]"#;
const CONFIRM_BUTTON: &str = r#"input[value="I understand"], #confirm"#;
const AGREE_BUTTON: &str = ".agree-button";
const AGREE_TEXT: &str = "Agree & get started";
const INTERSTITIAL_BUTTON_XPATH: &str = "/html/body/c-wiz/div/div/div/div/div/div/div/div/div/div/div/button";

/// Attempts at the identity stage before the login is abandoned
const MAX_IDENTITY_ATTEMPTS: u32 = 10;

/// Forced clicks on the interstitial per identity attempt
const INTERSTITIAL_CLICKS: u32 = 3;

/// Times the "I understand" confirmation may show up
const CONFIRMATION_ROUNDS: usize = 2;

/// Time left for out-of-band verification (2FA, captcha) in a visible browser
const VERIFICATION_GRACE: Duration = Duration::from_secs(20);

/// Account used to sign in
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Authenticator that drives the provider's sign-in pages
pub struct LoginFlow {
    browser: Arc<Browser>,
    credentials: Option<Credentials>,
}

impl LoginFlow {
    pub fn new(browser: Arc<Browser>, credentials: Option<Credentials>) -> Self {
        Self {
            browser,
            credentials,
        }
    }

    /// Enters the email and checks whether the identifier stage was reached
    async fn identity_attempt(&self, tab: &SessionId, email: &str) -> Result<bool> {
        let Some(input) = self
            .browser
            .wait_for(tab, EMAIL_INPUT, Duration::from_secs(10))
            .await?
        else {
            return Ok(false);
        };
        self.browser.click(tab, &input).await?;
        self.browser.clear(tab, &input).await?;
        self.browser.type_text(tab, &input, email).await?;
        info!("Email entered");

        if let Some(button) = self
            .browser
            .wait_for(tab, CONTINUE_BUTTON, Duration::from_secs(10))
            .await?
        {
            self.browser.click(tab, &button).await?;
            info!("Continue clicked, waiting for the identity stage");
        }
        sleep(Duration::from_secs(8)).await;

        match self
            .browser
            .wait_for(tab, IDENTIFIER_INPUT, Duration::from_secs(5))
            .await?
        {
            Some(identifier) => {
                self.browser.type_text(tab, &identifier, KEY_ENTER).await?;
                info!("Identifier stage passed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pushes through the interstitial that sometimes replaces the chooser
    async fn click_interstitial(&self, tab: &SessionId) {
        for attempt in 1..=INTERSTITIAL_CLICKS {
            match self.browser.find(tab, "xpath", INTERSTITIAL_BUTTON_XPATH).await {
                Ok(Some(button)) => match self.browser.force_click(tab, &button).await {
                    Ok(()) => {
                        info!("Interstitial button clicked (attempt {})", attempt);
                        return;
                    }
                    Err(e) => warn!("Interstitial click failed (attempt {}): {}", attempt, e),
                },
                Ok(None) => warn!("Interstitial button not found (attempt {})", attempt),
                Err(e) => warn!("Interstitial lookup failed (attempt {}): {}", attempt, e),
            }
            if attempt < INTERSTITIAL_CLICKS {
                sleep(Duration::from_secs(5)).await;
            }
        }
    }

    async fn enter_password(&self, tab: &SessionId, password: &str) -> Result<()> {
        sleep(Duration::from_secs(4)).await;
        match self
            .browser
            .wait_for(tab, PASSWORD_INPUT, Duration::from_secs(15))
            .await?
        {
            Some(input) => {
                self.browser.click(tab, &input).await?;
                self.browser.type_text(tab, &input, password).await?;
                self.browser.type_text(tab, &input, KEY_ENTER).await?;
                info!("Password entered");
            }
            None => warn!("Password field not found, continuing"),
        }
        Ok(())
    }

    /// Accepts the consent screens shown to new accounts
    async fn accept_consents(&self, tab: &SessionId) -> Result<()> {
        sleep(Duration::from_secs(5)).await;

        for round in 1..=CONFIRMATION_ROUNDS {
            if let Some(button) = self
                .browser
                .wait_for(tab, CONFIRM_BUTTON, Duration::from_secs(5))
                .await?
            {
                info!("Confirmation screen detected (round {}), accepting", round);
                self.browser.click(tab, &button).await?;
                sleep(Duration::from_secs(5)).await;
            }
        }

        if let Some(button) = self
            .browser
            .wait_for(tab, AGREE_BUTTON, Duration::from_secs(10))
            .await?
        {
            info!("Terms screen detected, agreeing");
            self.browser.click(tab, &button).await?;
            sleep(Duration::from_secs(5)).await;
        } else if self
            .browser
            .run_flag(tab, page::CLICK_BUTTON_WITH_TEXT, vec![json!(AGREE_TEXT)])
            .await?
        {
            info!("Terms screen detected by text, agreed");
            sleep(Duration::from_secs(5)).await;
        }

        Ok(())
    }

    async fn dismiss_welcome(&self, tab: &SessionId) {
        match self.browser.run_flag(tab, &page::dismiss_welcome(), vec![]).await {
            Ok(clicked) => {
                info!("Welcome dialog dismissed: {}", clicked);
                sleep(Duration::from_secs(4)).await;
            }
            Err(e) => warn!("Welcome dialog dismissal failed (ignored): {}", e),
        }
    }
}

#[async_trait]
impl Authenticator for LoginFlow {
    async fn ensure_authenticated(&self, primary: &SessionId) -> std::result::Result<(), AuthError> {
        info!("Opening the application on the primary tab");
        self.browser.goto_app(primary).await.map_err(DriverError::from)?;
        sleep(Duration::from_secs(3)).await;

        let login_required = self
            .browser
            .wait_for(primary, EMAIL_INPUT, Duration::from_secs(8))
            .await
            .map_err(DriverError::from)?
            .is_some();

        if !login_required {
            info!("Already signed in");
            self.dismiss_welcome(primary).await;
            return Ok(());
        }

        let credentials = self
            .credentials
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;

        let mut passed = false;
        for attempt in 1..=MAX_IDENTITY_ATTEMPTS {
            info!("Login attempt {}/{}", attempt, MAX_IDENTITY_ATTEMPTS);
            match self.identity_attempt(primary, &credentials.email).await {
                Ok(true) => {
                    passed = true;
                    break;
                }
                Ok(false) => {
                    warn!("Identity stage not reached (attempt {})", attempt);
                    if attempt < MAX_IDENTITY_ATTEMPTS {
                        self.click_interstitial(primary).await;
                        sleep(Duration::from_secs(8)).await;
                    }
                }
                Err(e) => {
                    warn!("Login cycle error (attempt {}): {}", attempt, e);
                    sleep(Duration::from_secs(3)).await;
                }
            }
        }

        if !passed {
            error!(
                "Identity stage failed after {} attempts",
                MAX_IDENTITY_ATTEMPTS
            );
            return Err(AuthError::AttemptsExhausted(MAX_IDENTITY_ATTEMPTS));
        }

        self.enter_password(primary, &credentials.password)
            .await
            .map_err(DriverError::from)?;
        self.accept_consents(primary)
            .await
            .map_err(DriverError::from)?;

        info!(
            "Waiting {:?} for any extra verification step",
            VERIFICATION_GRACE
        );
        sleep(VERIFICATION_GRACE).await;

        self.dismiss_welcome(primary).await;
        info!("Login flow finished on the primary tab");
        Ok(())
    }
}
