use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{BusinessType, ExportError, ExportFormat, ExportService, ExportedFile};

/// Default export name: `<display name>_<YYYYMMDD_HHMMSS>`.
pub fn default_file_name(business: BusinessType, at: DateTime<Utc>) -> String {
    format!("{}_{}", business.display_name(), at.format("%Y%m%d_%H%M%S"))
}

/// Exports one business type, one run at a time.
pub struct Exporter {
    service: ExportService,
    business: BusinessType,
    in_flight: Mutex<()>,
}

impl Exporter {
    pub fn new(service: ExportService, business: BusinessType) -> Self {
        Self {
            service,
            business,
            in_flight: Mutex::new(()),
        }
    }

    pub fn business(&self) -> BusinessType {
        self.business
    }

    /// Run a permission-checked export. Refuses while another is running.
    pub async fn export(
        &self,
        format: ExportFormat,
        custom_name: Option<&str>,
    ) -> Result<ExportedFile, ExportError> {
        let _running = self.in_flight.try_lock().map_err(|_| ExportError::Busy)?;

        let file_name = custom_name
            .map(str::to_string)
            .unwrap_or_else(|| default_file_name(self.business, Utc::now()));

        match self
            .service
            .export_with_permission_check(self.business, format, Some(&file_name))
            .await
        {
            Ok(file) => {
                info!(business = %self.business, file = %file.file_name, "Export succeeded");
                Ok(file)
            }
            Err(e) => {
                warn!(business = %self.business, error = %e, "Export failed");
                Err(e)
            }
        }
    }

    pub async fn export_excel(&self, custom_name: Option<&str>) -> Result<ExportedFile, ExportError> {
        self.export(ExportFormat::Excel, custom_name).await
    }

    pub async fn export_html(&self, custom_name: Option<&str>) -> Result<ExportedFile, ExportError> {
        self.export(ExportFormat::Html, custom_name).await
    }
}
