//! REST client for the family photo server.

use crate::errors::{AppError, AppResult};
use crate::models::{BasicNetworkPhoto, ExifField, NetworkPhoto, User, UserLogin};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingResponse {
    Successful,
    Unsuccessful,
    NotLoggedIn,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Unix seconds
    pub time_created: i64,
    pub folder: Option<String>,
    pub make_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub user: User,
    pub session_cookie: Option<String>,
}

#[async_trait]
pub trait PhotosApi: Send + Sync {
    /// Never fails; connectivity problems report `Unsuccessful`.
    async fn ping(&self) -> PingResponse;

    async fn list_photos(&self) -> AppResult<Vec<BasicNetworkPhoto>>;

    /// Ids of the photos the current user marked as favorite.
    async fn favorites(&self) -> AppResult<Vec<i64>>;

    async fn download_photo(&self, id: i64) -> AppResult<Vec<u8>>;

    async fn photo_exif(&self, id: i64) -> AppResult<Vec<ExifField>>;

    /// Groups of ids the server considers the same picture.
    async fn duplicates(&self) -> AppResult<Vec<Vec<i64>>>;

    async fn upload_photo(&self, request: UploadRequest) -> AppResult<NetworkPhoto>;

    async fn delete_photo(&self, id: i64) -> AppResult<()>;

    async fn change_photo_location(
        &self,
        id: i64,
        make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<NetworkPhoto>;

    /// Returns every photo that moved.
    async fn rename_folder(
        &self,
        source_is_public: bool,
        source_folder: &str,
        target_make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<Vec<NetworkPhoto>>;

    async fn add_favorite(&self, id: i64) -> AppResult<()>;

    async fn remove_favorite(&self, id: i64) -> AppResult<()>;

    async fn login(&self, login: &UserLogin) -> AppResult<LoginResponse>;

    async fn logout(&self) -> AppResult<()>;

    /// Restore a session persisted by a previous run.
    fn set_session_cookie(&self, cookie: Option<String>);
}

pub struct HttpPhotosApi {
    client: Client,
    base_url: Url,
    session_cookie: RwLock<Option<String>>,
}

/// `name=value` of the first `Set-Cookie` header.
fn session_cookie_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .map(str::trim)
        .find(|v| v.contains('='))
        .map(str::to_string)
}

async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::NotLoggedIn);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(AppError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

impl HttpPhotosApi {
    pub fn new(server_url: &str, accept_invalid_certs: bool) -> AppResult<Self> {
        let base_url = Url::parse(server_url)
            .map_err(|e| AppError::Config(format!("Invalid server URL {:?}: {}", server_url, e)))?;
        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            session_cookie: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Endpoint paths are resolved relative to the base URL, so a server
    /// mounted under a sub-path keeps working.
    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::InvalidInput(format!("Bad endpoint {:?}: {}", path, e)))
    }

    fn cookie(&self) -> Option<String> {
        match self.session_cookie.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_cookie(&self, cookie: Option<String>) {
        match self.session_cookie.write() {
            Ok(mut guard) => *guard = cookie,
            Err(poisoned) => *poisoned.into_inner() = cookie,
        }
    }

    fn request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        let mut builder = self.client.request(method, self.url(path)?);
        if let Some(cookie) = self.cookie() {
            builder = builder.header(COOKIE, cookie);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let response = builder.send().await?;
        check_status(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl PhotosApi for HttpPhotosApi {
    async fn ping(&self) -> PingResponse {
        let builder = match self.request(Method::GET, "/profile") {
            Ok(builder) => builder,
            Err(_) => return PingResponse::Unsuccessful,
        };
        match self.send(builder).await {
            Ok(_) => PingResponse::Successful,
            Err(AppError::NotLoggedIn) => PingResponse::NotLoggedIn,
            Err(e) => {
                log::warn!("PhotosApi: ping failed: {}", e);
                PingResponse::Unsuccessful
            }
        }
    }

    async fn list_photos(&self) -> AppResult<Vec<BasicNetworkPhoto>> {
        self.get_json("/photos").await
    }

    async fn favorites(&self) -> AppResult<Vec<i64>> {
        self.get_json("/photos/favorite").await
    }

    async fn download_photo(&self, id: i64) -> AppResult<Vec<u8>> {
        let response = self
            .send(self.request(Method::GET, &format!("photos/download/{}", id))?)
            .await?;

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(bytes)
    }

    async fn photo_exif(&self, id: i64) -> AppResult<Vec<ExifField>> {
        self.get_json(&format!("photos/exif/{}", id)).await
    }

    async fn duplicates(&self) -> AppResult<Vec<Vec<i64>>> {
        self.get_json("photos/duplicates").await
    }

    async fn upload_photo(&self, request: UploadRequest) -> AppResult<NetworkPhoto> {
        let part = reqwest::multipart::Part::bytes(request.bytes)
            .file_name(request.name.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| AppError::InvalidInput(format!("Bad MIME type {:?}: {}", request.mime_type, e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut query = vec![
            ("timeCreated", request.time_created.to_string()),
            ("makePublic", request.make_public.to_string()),
        ];
        if let Some(folder) = request.folder {
            query.push(("folderName", folder));
        }

        let builder = self
            .request(Method::POST, "/photos/upload")?
            .query(&query)
            .multipart(form);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn delete_photo(&self, id: i64) -> AppResult<()> {
        self.send(self.request(Method::DELETE, &format!("/photos/delete/{}", id))?)
            .await?;
        Ok(())
    }

    async fn change_photo_location(
        &self,
        id: i64,
        make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<NetworkPhoto> {
        let mut query = vec![("make_public", make_public.to_string())];
        if let Some(folder) = target_folder {
            query.push(("target_folder_name", folder.to_string()));
        }
        let builder = self
            .request(Method::POST, &format!("/photos/change_location/{}", id))?
            .query(&query);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn rename_folder(
        &self,
        source_is_public: bool,
        source_folder: &str,
        target_make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<Vec<NetworkPhoto>> {
        let mut query = vec![
            ("source_is_public", source_is_public.to_string()),
            ("source_folder_name", source_folder.to_string()),
            ("target_make_public", target_make_public.to_string()),
        ];
        if let Some(folder) = target_folder {
            query.push(("target_folder_name", folder.to_string()));
        }
        let builder = self
            .request(Method::POST, "/photos/rename_folder")?
            .query(&query);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn add_favorite(&self, id: i64) -> AppResult<()> {
        self.send(self.request(Method::POST, &format!("/photos/favorite/{}", id))?)
            .await?;
        Ok(())
    }

    async fn remove_favorite(&self, id: i64) -> AppResult<()> {
        self.send(self.request(Method::DELETE, &format!("/photos/favorite/{}", id))?)
            .await?;
        Ok(())
    }

    async fn login(&self, login: &UserLogin) -> AppResult<LoginResponse> {
        let builder = self.request(Method::POST, "/login")?.form(&[
            ("userId", login.user_id.as_str()),
            ("password", login.password.as_str()),
        ]);
        let response = self.send(builder).await?;
        let session_cookie = session_cookie_from(response.headers());
        let user: User = response.json().await?;

        if session_cookie.is_some() {
            self.store_cookie(session_cookie.clone());
        }
        log::info!("PhotosApi: logged in as {}", user.user_id);
        Ok(LoginResponse {
            user,
            session_cookie,
        })
    }

    async fn logout(&self) -> AppResult<()> {
        let result = match self.request(Method::POST, "logout") {
            Ok(builder) => self.send(builder).await.map(|_| ()),
            Err(e) => Err(e),
        };
        self.store_cookie(None);
        result
    }

    fn set_session_cookie(&self, cookie: Option<String>) {
        self.store_cookie(cookie);
    }
}
