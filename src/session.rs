use crate::api::PhotosApi;
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{User, UserLogin};
use std::sync::Arc;

const SESSION_COOKIE_KEY: &str = "session_cookie";
const USER_ID_KEY: &str = "user_id";
const DISPLAY_NAME_KEY: &str = "display_name";

/// Logged in user and session cookie, persisted in the config table.
pub struct Session {
    db: Arc<Database>,
    api: Arc<dyn PhotosApi>,
}

impl Session {
    pub fn new(db: Arc<Database>, api: Arc<dyn PhotosApi>) -> Self {
        Self { db, api }
    }

    /// Hand a persisted cookie back to the API client.
    pub fn restore(&self) -> AppResult<bool> {
        let cookie = self.db.get_config(SESSION_COOKIE_KEY)?;
        let restored = cookie.is_some();
        self.api.set_session_cookie(cookie);
        Ok(restored)
    }

    pub fn is_logged_in(&self) -> AppResult<bool> {
        Ok(self.db.get_config(SESSION_COOKIE_KEY)?.is_some()
            && self.db.get_config(USER_ID_KEY)?.is_some())
    }

    pub fn user_id(&self) -> AppResult<Option<String>> {
        Ok(self.db.get_config(USER_ID_KEY)?)
    }

    pub fn current_user(&self) -> AppResult<Option<User>> {
        let Some(user_id) = self.db.get_config(USER_ID_KEY)? else {
            return Ok(None);
        };
        let display_name = self
            .db
            .get_config(DISPLAY_NAME_KEY)?
            .unwrap_or_else(|| user_id.clone());
        Ok(Some(User {
            user_id,
            display_name,
        }))
    }

    pub async fn login(&self, login: &UserLogin) -> AppResult<User> {
        let response = self.api.login(login).await?;
        if let Some(cookie) = response.session_cookie.as_deref() {
            self.db.set_config(SESSION_COOKIE_KEY, cookie)?;
        }
        self.db.set_config(USER_ID_KEY, &response.user.user_id)?;
        self.db.set_config(DISPLAY_NAME_KEY, &response.user.display_name)?;
        log::info!("Session: logged in as {}", response.user.user_id);
        Ok(response.user)
    }

    /// Local session data is dropped even when the server cannot be told.
    pub async fn logout(&self) -> AppResult<()> {
        if let Err(e) = self.api.logout().await {
            log::warn!("Session: server logout failed, clearing local session anyway: {}", e);
        }
        self.clear()
    }

    pub fn clear(&self) -> AppResult<()> {
        self.db.remove_config(SESSION_COOKIE_KEY)?;
        self.db.remove_config(USER_ID_KEY)?;
        self.db.remove_config(DISPLAY_NAME_KEY)?;
        self.api.set_session_cookie(None);
        Ok(())
    }
}
