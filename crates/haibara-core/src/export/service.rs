//! Export endpoints and the permission-checked download workflow.

use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Url;
use tracing::{debug, info};

use crate::api::{ApiClient, ApiError, ApiRequest};

use super::{BusinessType, ExportError, ExportFormat};

/// A downloaded export.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    /// Write the file into `dir`, returning the full path.
    ///
    /// An existing file of the same name is left alone and reported as
    /// [`ExportError::FileExists`] unless `overwrite` is set.
    pub fn save_to(&self, dir: &Path, overwrite: bool) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(sanitize_file_name(&self.file_name));

        let mut options = std::fs::OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ExportError::FileExists(path));
            }
            Err(source) => return Err(ExportError::Io { path, source }),
        };
        file.write_all(&self.bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Keep a server-supplied name inside the target directory.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

fn percent_decode(value: &str) -> String {
    // Java's URLEncoder writes spaces as '+'
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(|s| s.into_owned())
        .unwrap_or(value)
}

/// Pull the download name out of a `Content-Disposition` header.
///
/// `filename*=UTF-8''...` wins over `filename="..."`. Values are unquoted and
/// percent-decoded.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim().trim_matches('"');
        if key == "filename*" {
            // charset'lang'value
            let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
            if !encoded.is_empty() {
                extended = Some(percent_decode(encoded));
            }
        } else if key == "filename" && plain.is_none() && !value.is_empty() {
            plain = Some(percent_decode(value));
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Export API bound to an authenticated client.
#[derive(Clone)]
pub struct ExportService {
    client: ApiClient,
}

impl ExportService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Business types the backend can export.
    pub async fn business_types(&self) -> Result<Vec<String>, ExportError> {
        Ok(self.client.get("export/business-types").await?)
    }

    /// Formats the backend supports for a business type, as it names them.
    pub async fn export_types(&self, business: BusinessType) -> Result<Vec<String>, ExportError> {
        Ok(self
            .client
            .get(&format!("export/export-types/{}", business.code()))
            .await?)
    }

    pub async fn check_permission(&self, business: BusinessType) -> Result<bool, ExportError> {
        Ok(self
            .client
            .get(&format!("export/permission/{}", business.code()))
            .await?)
    }

    /// Direct link to an export, for opening in a browser.
    pub fn export_url(
        &self,
        business: BusinessType,
        format: ExportFormat,
        file_name: Option<&str>,
    ) -> Result<Url, ExportError> {
        let mut url = self
            .client
            .url(&format!("export/{}/{}", business.code(), format.code()))?;
        if let Some(name) = file_name {
            url.query_pairs_mut().append_pair("fileName", name);
        }
        Ok(url)
    }

    /// Download an export without checking permission or format support first.
    pub async fn download(
        &self,
        business: BusinessType,
        format: ExportFormat,
        file_name: Option<&str>,
    ) -> Result<ExportedFile, ExportError> {
        let mut req = ApiRequest::get(format!("export/{}/{}", business.code(), format.code()));
        if let Some(name) = file_name {
            req = req.query("fileName", name);
        }

        let response = self.client.request(req).await?;
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let negotiated = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);
        debug!(business = %business, negotiated = ?negotiated, "Export response received");

        let file_name = negotiated
            .or_else(|| file_name.map(str::to_string))
            .unwrap_or_else(|| format!("{}_export", business.code()));
        let bytes = response.bytes().await.map_err(ApiError::from)?.to_vec();

        info!(business = %business, format = %format, file = %file_name, size = bytes.len(), "Export downloaded");
        Ok(ExportedFile {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Check permission, then format support, then download.
    pub async fn export_with_permission_check(
        &self,
        business: BusinessType,
        format: ExportFormat,
        file_name: Option<&str>,
    ) -> Result<ExportedFile, ExportError> {
        if !self.check_permission(business).await? {
            return Err(ExportError::PermissionDenied(business));
        }

        let supported = self.export_types(business).await?;
        if !supported.iter().any(|t| format.matches(t)) {
            return Err(ExportError::UnsupportedFormat { business, format });
        }

        self.download(business, format, file_name).await
    }

    /// Download when the caller already knows it has permission.
    pub async fn export_direct(
        &self,
        business: BusinessType,
        format: ExportFormat,
        file_name: Option<&str>,
    ) -> Result<ExportedFile, ExportError> {
        self.download(business, format, file_name).await
    }
}
