//! Photo catalog value types.
//!
//! Both photo kinds are reconstructed wholesale, either from a media store
//! scan or from a server response. The only in-place changes are flipping the
//! local back-reference and the favorite flag.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Owner id the server uses for photos shared with the whole family.
pub const PUBLIC_USER_ID: &str = "public";

/// A file indexed by the device media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPhoto {
    pub id: i64,
    /// Id of the uploaded counterpart, 0 when not linked.
    #[serde(default)]
    pub network_photo_id: i64,
    pub name: String,
    /// Unix seconds
    pub time_created: i64,
    pub folder: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl LocalPhoto {
    pub fn is_saved_to_cloud(&self) -> bool {
        self.network_photo_id != 0
    }

    pub fn with_network_photo_id(&self, network_photo_id: i64) -> Self {
        Self {
            network_photo_id,
            ..self.clone()
        }
    }
}

/// The list endpoint's shape; carries no favorite flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicNetworkPhoto {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub created_at: i64,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub folder: Option<String>,
}

impl BasicNetworkPhoto {
    pub fn into_network_photo(self, is_favorite: bool) -> NetworkPhoto {
        NetworkPhoto {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            time_created: self.created_at,
            file_size: self.file_size,
            folder: self.folder,
            is_favorite,
        }
    }
}

/// A file stored by the remote photo server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPhoto {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub time_created: i64,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl NetworkPhoto {
    pub fn is_public(&self) -> bool {
        self.user_id == PUBLIC_USER_ID
    }

    pub fn download_url(&self, base_url: &str) -> String {
        format!("{}photos/download/{}", base_url, self.id)
    }

    pub fn preview_url(&self, base_url: &str) -> String {
        format!("{}photos/preview/{}", base_url, self.id)
    }

    /// MIME type guessed from the file extension.
    pub fn mime_type(&self) -> Option<String> {
        mime_guess::from_path(&self.name)
            .first()
            .map(|m| m.essence_str().to_string())
    }
}

/// Either kind of photo, for code that lists both side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Photo {
    Local(LocalPhoto),
    Network(NetworkPhoto),
}

impl Photo {
    pub fn id(&self) -> i64 {
        match self {
            Photo::Local(p) => p.id,
            Photo::Network(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Photo::Local(p) => &p.name,
            Photo::Network(p) => &p.name,
        }
    }

    pub fn time_created(&self) -> i64 {
        match self {
            Photo::Local(p) => p.time_created,
            Photo::Network(p) => p.time_created,
        }
    }

    pub fn folder(&self) -> Option<&str> {
        match self {
            Photo::Local(p) => p.folder.as_deref(),
            Photo::Network(p) => p.folder.as_deref(),
        }
    }

    pub fn is_video(&self) -> bool {
        let mime = match self {
            Photo::Local(p) => p.mime_type.clone(),
            Photo::Network(p) => p.mime_type(),
        };
        mime.map(|m| m.starts_with("video/")).unwrap_or(false)
    }

    /// Where the full-size file can be fetched from.
    pub fn uri(&self, base_url: &str) -> String {
        match self {
            Photo::Local(p) => p.uri.clone(),
            Photo::Network(p) => p.download_url(base_url),
        }
    }

    pub fn preview_uri(&self, base_url: &str) -> String {
        match self {
            Photo::Local(p) => p.uri.clone(),
            Photo::Network(p) => p.preview_url(base_url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct UserLogin {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifField {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifData {
    fields: HashMap<String, String>,
}

impl ExifData {
    pub fn new(fields: Vec<ExifField>) -> Self {
        Self {
            fields: fields.into_iter().map(|f| (f.tag, f.value)).collect(),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Fields sorted by tag, for stable display.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        fields.sort();
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalFolder {
    pub name: String,
    pub cover_photo_id: i64,
    pub cover_photo_uri: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFolder {
    pub name: String,
    pub cover_photo_id: i64,
    pub user_id: String,
    pub count: i64,
}

impl NetworkFolder {
    pub fn is_public(&self) -> bool {
        self.user_id == PUBLIC_USER_ID
    }
}

/// Which network folders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderType {
    #[default]
    All,
    Personal,
    Public,
}

impl FolderType {
    pub fn index(self) -> i32 {
        match self {
            FolderType::All => 0,
            FolderType::Personal => 1,
            FolderType::Public => 2,
        }
    }

    pub fn from_index(index: i32) -> Self {
        match index {
            1 => FolderType::Personal,
            2 => FolderType::Public,
            _ => FolderType::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPhotoWithYearOffset {
    pub photo: NetworkPhoto,
    pub year_offset: i64,
}
