//! In-memory stand-ins for the server and the device library.

use crate::api::{LoginResponse, PhotosApi, PingResponse, UploadRequest};
use crate::errors::{AppError, AppResult};
use crate::media_store::MediaStore;
use crate::models::{BasicNetworkPhoto, ExifField, LocalPhoto, NetworkPhoto, User, UserLogin, PUBLIC_USER_ID};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

pub const FAKE_USER_ID: &str = "ana";

pub fn local_photo(id: i64, folder: &str, time_created: i64) -> LocalPhoto {
    LocalPhoto {
        id,
        network_photo_id: 0,
        name: format!("IMG_{}.jpg", id),
        time_created,
        folder: Some(folder.to_string()),
        uri: format!("file:///media/{}/IMG_{}.jpg", folder, id),
        mime_type: Some("image/jpeg".to_string()),
    }
}

pub fn basic_photo(id: i64, user_id: &str, folder: Option<&str>) -> BasicNetworkPhoto {
    BasicNetworkPhoto {
        id,
        user_id: user_id.to_string(),
        name: format!("{}.jpg", id),
        created_at: 1_600_000_000 + id,
        file_size: 1000,
        folder: folder.map(str::to_string),
    }
}

fn unreachable() -> AppError {
    AppError::Unreachable("connection refused".into())
}

fn server_error() -> AppError {
    AppError::Server {
        status: 500,
        message: "internal error".into(),
    }
}

#[derive(Default)]
struct FakeApiState {
    ping: Option<PingResponse>,
    unreachable: bool,
    session_expired: bool,
    fail_list: bool,
    fail_favorites: bool,
    fail_login: bool,
    fail_mutations: bool,
    failing_uploads: HashSet<String>,
    photos: Vec<BasicNetworkPhoto>,
    favorites: Vec<i64>,
    exif: HashMap<i64, Vec<ExifField>>,
    exif_calls: usize,
    duplicates: Vec<Vec<i64>>,
    downloads: HashMap<i64, Vec<u8>>,
    uploads: Vec<UploadRequest>,
    deleted: Vec<i64>,
    cookie: Option<String>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeApiState>,
}

impl FakeApi {
    fn state(&self) -> MutexGuard<'_, FakeApiState> {
        self.state.lock().unwrap()
    }

    pub fn set_photos(&self, photos: Vec<BasicNetworkPhoto>) {
        self.state().photos = photos;
    }

    pub fn set_favorites(&self, favorites: Vec<i64>) {
        self.state().favorites = favorites;
    }

    pub fn set_ping(&self, ping: PingResponse) {
        self.state().ping = Some(ping);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Listing, favorites and uploads answer 401 while ping still succeeds.
    pub fn expire_session(&self) {
        self.state().session_expired = true;
    }

    pub fn fail_list(&self) {
        self.state().fail_list = true;
    }

    pub fn fail_favorites(&self) {
        self.state().fail_favorites = true;
    }

    pub fn fail_login(&self) {
        self.state().fail_login = true;
    }

    pub fn fail_mutations(&self) {
        self.state().fail_mutations = true;
    }

    pub fn fail_upload_of(&self, name: &str) {
        self.state().failing_uploads.insert(name.to_string());
    }

    pub fn set_exif(&self, id: i64, fields: Vec<ExifField>) {
        self.state().exif.insert(id, fields);
    }

    pub fn exif_calls(&self) -> usize {
        self.state().exif_calls
    }

    pub fn set_duplicates(&self, groups: Vec<Vec<i64>>) {
        self.state().duplicates = groups;
    }

    pub fn set_download(&self, id: i64, bytes: Vec<u8>) {
        self.state().downloads.insert(id, bytes);
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.state().uploads.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.state().deleted.clone()
    }

    pub fn favorite_ids(&self) -> Vec<i64> {
        self.state().favorites.clone()
    }

    pub fn session_cookie(&self) -> Option<String> {
        self.state().cookie.clone()
    }

    fn check_mutation(state: &FakeApiState) -> AppResult<()> {
        if state.unreachable {
            return Err(unreachable());
        }
        if state.fail_mutations {
            return Err(server_error());
        }
        Ok(())
    }

    fn to_network(state: &FakeApiState, photo: &BasicNetworkPhoto) -> NetworkPhoto {
        photo.clone().into_network_photo(state.favorites.contains(&photo.id))
    }
}

#[async_trait]
impl PhotosApi for FakeApi {
    async fn ping(&self) -> PingResponse {
        let state = self.state();
        if state.unreachable {
            return PingResponse::Unsuccessful;
        }
        state.ping.unwrap_or(PingResponse::Successful)
    }

    async fn list_photos(&self) -> AppResult<Vec<BasicNetworkPhoto>> {
        let state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        if state.session_expired {
            return Err(AppError::NotLoggedIn);
        }
        if state.fail_list {
            return Err(server_error());
        }
        Ok(state.photos.clone())
    }

    async fn favorites(&self) -> AppResult<Vec<i64>> {
        let state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        if state.session_expired {
            return Err(AppError::NotLoggedIn);
        }
        if state.fail_favorites {
            return Err(server_error());
        }
        Ok(state.favorites.clone())
    }

    async fn download_photo(&self, id: i64) -> AppResult<Vec<u8>> {
        let state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        state.downloads.get(&id).cloned().ok_or(AppError::Server {
            status: 404,
            message: "no such photo".into(),
        })
    }

    async fn photo_exif(&self, id: i64) -> AppResult<Vec<ExifField>> {
        let mut state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        state.exif_calls += 1;
        Ok(state.exif.get(&id).cloned().unwrap_or_default())
    }

    async fn duplicates(&self) -> AppResult<Vec<Vec<i64>>> {
        let state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        Ok(state.duplicates.clone())
    }

    async fn upload_photo(&self, request: UploadRequest) -> AppResult<NetworkPhoto> {
        let mut state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        if state.session_expired {
            return Err(AppError::NotLoggedIn);
        }
        if state.failing_uploads.contains(&request.name) {
            return Err(server_error());
        }

        let id = 1000 + state.uploads.len() as i64;
        let basic = BasicNetworkPhoto {
            id,
            user_id: if request.make_public {
                PUBLIC_USER_ID.to_string()
            } else {
                FAKE_USER_ID.to_string()
            },
            name: request.name.clone(),
            created_at: request.time_created,
            file_size: request.bytes.len() as i64,
            folder: request.folder.clone(),
        };
        state.photos.push(basic.clone());
        state.uploads.push(request);
        Ok(basic.into_network_photo(false))
    }

    async fn delete_photo(&self, id: i64) -> AppResult<()> {
        let mut state = self.state();
        Self::check_mutation(&state)?;
        state.photos.retain(|p| p.id != id);
        state.deleted.push(id);
        Ok(())
    }

    async fn change_photo_location(
        &self,
        id: i64,
        make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<NetworkPhoto> {
        let mut state = self.state();
        Self::check_mutation(&state)?;
        let photo = state
            .photos
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::Server {
                status: 404,
                message: "no such photo".into(),
            })?;
        photo.user_id = if make_public {
            PUBLIC_USER_ID.to_string()
        } else {
            FAKE_USER_ID.to_string()
        };
        photo.folder = target_folder.map(str::to_string);
        let photo = photo.clone();
        Ok(Self::to_network(&state, &photo))
    }

    async fn rename_folder(
        &self,
        source_is_public: bool,
        source_folder: &str,
        target_make_public: bool,
        target_folder: Option<&str>,
    ) -> AppResult<Vec<NetworkPhoto>> {
        let mut state = self.state();
        Self::check_mutation(&state)?;
        let mut moved = Vec::new();
        for photo in state.photos.iter_mut() {
            let is_public = photo.user_id == PUBLIC_USER_ID;
            if photo.folder.as_deref() == Some(source_folder) && is_public == source_is_public {
                photo.user_id = if target_make_public {
                    PUBLIC_USER_ID.to_string()
                } else {
                    FAKE_USER_ID.to_string()
                };
                photo.folder = target_folder.map(str::to_string);
                moved.push(photo.clone());
            }
        }
        Ok(moved
            .iter()
            .map(|p| Self::to_network(&state, p))
            .collect())
    }

    async fn add_favorite(&self, id: i64) -> AppResult<()> {
        let mut state = self.state();
        Self::check_mutation(&state)?;
        if !state.favorites.contains(&id) {
            state.favorites.push(id);
        }
        Ok(())
    }

    async fn remove_favorite(&self, id: i64) -> AppResult<()> {
        let mut state = self.state();
        Self::check_mutation(&state)?;
        state.favorites.retain(|f| *f != id);
        Ok(())
    }

    async fn login(&self, login: &UserLogin) -> AppResult<LoginResponse> {
        let mut state = self.state();
        if state.unreachable {
            return Err(unreachable());
        }
        if state.fail_login {
            return Err(AppError::Server {
                status: 403,
                message: "bad credentials".into(),
            });
        }
        state.cookie = Some("session=fake".to_string());
        Ok(LoginResponse {
            user: User {
                user_id: login.user_id.clone(),
                display_name: "Ana".to_string(),
            },
            session_cookie: state.cookie.clone(),
        })
    }

    async fn logout(&self) -> AppResult<()> {
        let mut state = self.state();
        state.cookie = None;
        if state.unreachable {
            return Err(unreachable());
        }
        Ok(())
    }

    fn set_session_cookie(&self, cookie: Option<String>) {
        self.state().cookie = cookie;
    }
}

#[derive(Default)]
struct FakeMediaState {
    photos: Vec<LocalPhoto>,
    fail_query: bool,
    fail_save: bool,
    contents: HashMap<i64, Vec<u8>>,
    exif: HashMap<i64, Vec<ExifField>>,
    next_saved_id: i64,
}

/// Device library whose content is set by the test.
#[derive(Default)]
pub struct FakeMediaStore {
    state: Mutex<FakeMediaState>,
}

impl FakeMediaStore {
    pub fn with_photos(photos: Vec<LocalPhoto>) -> Self {
        let store = Self::default();
        store.set_photos(photos);
        store
    }

    fn state(&self) -> MutexGuard<'_, FakeMediaState> {
        self.state.lock().unwrap()
    }

    pub fn set_photos(&self, photos: Vec<LocalPhoto>) {
        self.state().photos = photos;
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.state().fail_query = fail;
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.state().fail_save = fail;
    }

    pub fn photos(&self) -> Vec<LocalPhoto> {
        self.state().photos.clone()
    }

    pub fn set_exif(&self, id: i64, fields: Vec<ExifField>) {
        self.state().exif.insert(id, fields);
    }
}

impl MediaStore for FakeMediaStore {
    fn query_media(&self) -> AppResult<Vec<LocalPhoto>> {
        let state = self.state();
        if state.fail_query {
            return Err(AppError::Io("media store unavailable".into()));
        }
        Ok(state.photos.clone())
    }

    fn read_photo(&self, photo: &LocalPhoto) -> AppResult<Vec<u8>> {
        let state = self.state();
        if !state.photos.iter().any(|p| p.id == photo.id) {
            return Err(AppError::Io(format!("{} is gone", photo.uri)));
        }
        Ok(state
            .contents
            .get(&photo.id)
            .cloned()
            .unwrap_or_else(|| photo.name.as_bytes().to_vec()))
    }

    fn read_exif(&self, photo: &LocalPhoto) -> AppResult<Vec<ExifField>> {
        let state = self.state();
        if !state.photos.iter().any(|p| p.id == photo.id) {
            return Err(AppError::NotFound(photo.uri.clone()));
        }
        Ok(state.exif.get(&photo.id).cloned().unwrap_or_default())
    }

    fn save_photo(&self, name: &str, folder: Option<&str>, bytes: &[u8]) -> AppResult<LocalPhoto> {
        let mut state = self.state();
        if state.fail_save {
            return Err(AppError::Io("disk full".into()));
        }
        state.next_saved_id += 1;
        let folder = folder.unwrap_or("Downloads");
        let photo = LocalPhoto {
            id: 9_000 + state.next_saved_id,
            network_photo_id: 0,
            name: name.to_string(),
            time_created: 0,
            folder: Some(folder.to_string()),
            uri: format!("file:///media/{}/{}", folder, name),
            mime_type: mime_guess::from_path(name).first().map(|m| m.to_string()),
        };
        state.contents.insert(photo.id, bytes.to_vec());
        state.photos.push(photo.clone());
        Ok(photo)
    }

    fn delete_photo(&self, photo: &LocalPhoto) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.photos.len();
        state.photos.retain(|p| p.id != photo.id);
        Ok(state.photos.len() != before)
    }
}
