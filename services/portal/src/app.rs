//! services/portal/src/app.rs
//!
//! The `Portal` facade: wires configuration, the session gate, the HTTP
//! adapter and the voucher tracker together, and exposes the operations the
//! CLI drives.

use portal_core::domain::{
    Credentials, Document, Session, SubmitOutcome, UserProfile, VoucherRecord, VoucherStatus,
};
use portal_core::ports::{PortError, PortalApi};
use portal_core::router::{self, DashboardTab, View, DASHBOARD_PATH};
use portal_core::{SessionContext, VoucherTracker};
use reqwest::Url;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{FileSessionStore, HttpPortalAdapter};
use crate::config::Config;
use crate::error::ClientError;

//=========================================================================================
// Dashboard Snapshot
//=========================================================================================

/// Everything the dashboard view shows, captured at one instant.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub user: UserProfile,
    pub documents: Vec<Document>,
    pub voucher: Option<VoucherRecord>,
    pub status: VoucherStatus,
    pub active_courses: usize,
}

//=========================================================================================
// Portal
//=========================================================================================

pub struct Portal {
    config: Arc<Config>,
    session: Arc<SessionContext>,
    api: Arc<dyn PortalApi>,
    voucher: VoucherTracker,
}

impl Portal {
    /// Builds the production wiring and reads the stored session.
    pub async fn bootstrap(config: Arc<Config>) -> Result<Self, ClientError> {
        let store = Arc::new(FileSessionStore::new(config.state_path.clone()));
        let session = Arc::new(SessionContext::new(
            store,
            config.default_identity.clone(),
        ));
        let api = Arc::new(HttpPortalAdapter::new(&config, session.clone())?);

        let portal = Self::from_parts(config, session, api);
        let state = portal.session.init().await;
        info!(?state, "Portal client ready");
        Ok(portal)
    }

    /// Assembles a portal from already-built parts. The session must be initialised.
    pub fn from_parts(
        config: Arc<Config>,
        session: Arc<SessionContext>,
        api: Arc<dyn PortalApi>,
    ) -> Self {
        let voucher = VoucherTracker::new(api.clone());
        Self {
            config,
            session,
            api,
            voucher,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn voucher(&self) -> &VoucherTracker {
        &self.voucher
    }

    /// The view a location resolves to under the current session state.
    pub fn view(&self, path: &str) -> View {
        router::navigate(path, self.session.state())
    }

    fn require_dashboard(&self) -> Result<(), ClientError> {
        match self.view(DASHBOARD_PATH) {
            View::Dashboard => Ok(()),
            View::Login => Err(ClientError::NotLoggedIn),
        }
    }

    // --- Session ---

    pub async fn login(&mut self, email: &str, password: &str) -> Result<Session, ClientError> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.voucher.clear();
        Ok(self.session.login(self.api.as_ref(), &credentials).await?)
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        self.voucher.clear();
        Ok(self.session.logout().await?)
    }

    pub async fn profile(&self) -> UserProfile {
        self.session.profile().await
    }

    // --- Documents ---

    pub async fn documents(&self) -> Result<Vec<Document>, ClientError> {
        self.require_dashboard()?;
        Ok(self.api.list_documents().await?)
    }

    /// Downloads `filename` to `output`, or to its base name in the working directory.
    pub async fn download(
        &self,
        filename: &str,
        output: Option<&Path>,
    ) -> Result<PathBuf, ClientError> {
        self.require_dashboard()?;
        let bytes = self.api.download_document(filename).await?;
        let target = match output {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(
                Path::new(filename)
                    .file_name()
                    .unwrap_or_else(|| OsStr::new("download")),
            ),
        };
        tokio::fs::write(&target, &bytes).await?;
        info!(bytes = bytes.len(), path = %target.display(), "Document saved");
        Ok(target)
    }

    // --- Dashboard ---

    /// Loads documents and voucher status side by side.
    ///
    /// A failed document fetch shows as an empty list and a failed status
    /// fetch as "no voucher"; only a lost session is an error.
    pub async fn dashboard(&mut self) -> Result<DashboardSnapshot, ClientError> {
        self.require_dashboard()?;
        let user = self.profile().await;

        let api = &self.api;
        let voucher = &mut self.voucher;
        let (documents, status) =
            tokio::join!(api.list_documents(), voucher.refresh_status(&user.email));
        let status_error = status.err();

        if let Err(PortError::Unauthorized(message)) = &documents {
            return Err(PortError::Unauthorized(message.clone()).into());
        }
        if let Some(e @ PortError::Unauthorized(_)) = status_error {
            return Err(e.into());
        }
        let documents = documents.unwrap_or_else(|e| {
            warn!("Could not load documents: {}", e);
            Vec::new()
        });

        Ok(DashboardSnapshot {
            user,
            documents,
            voucher: self.voucher.record().cloned(),
            status: self.voucher.status(),
            active_courses: self.voucher.active_courses(),
        })
    }

    /// URL of the platform behind a dashboard tab, if it has one.
    pub fn tab_url(&self, tab: DashboardTab) -> Result<Option<&Url>, ClientError> {
        self.require_dashboard()?;
        Ok(match tab {
            DashboardTab::Overview => None,
            DashboardTab::Courses => Some(&self.config.course_url),
            DashboardTab::Exams => Some(&self.config.exam_url),
        })
    }

    // --- Voucher ---

    pub async fn submit_voucher(&mut self, code: &str) -> Result<SubmitOutcome, ClientError> {
        self.require_dashboard()?;
        let user = self.profile().await;
        Ok(self.voucher.submit(&user.email, code).await?)
    }

    pub async fn refresh_voucher(&mut self) -> Result<VoucherStatus, ClientError> {
        self.require_dashboard()?;
        let user = self.profile().await;
        self.voucher.refresh_status(&user.email).await?;
        Ok(self.voucher.status())
    }

    /// Polls the voucher status every `every` until it reads "Verified",
    /// `cancel` fires, or the session ends.
    ///
    /// Cancellation and session loss are honoured while a request is in
    /// flight. Transient failures are logged and polling continues.
    pub async fn watch_voucher<F>(
        &mut self,
        every: Duration,
        cancel: CancellationToken,
        mut on_update: F,
    ) -> Result<VoucherStatus, ClientError>
    where
        F: FnMut(VoucherStatus),
    {
        self.require_dashboard()?;
        let email = self.profile().await.email;
        let mut session_changes = self.session.subscribe();
        let mut ticker = tokio::time::interval(every);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = session_changes.changed() => {
                    if changed.is_err() || !session_changes.borrow().is_authenticated() {
                        return Err(ClientError::NotLoggedIn);
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let refreshed = tokio::select! {
                _ = cancel.cancelled() => break,
                changed = session_changes.changed() => {
                    if changed.is_err() || !session_changes.borrow().is_authenticated() {
                        return Err(ClientError::NotLoggedIn);
                    }
                    continue;
                }
                result = self.voucher.refresh_status(&email) => result.map(|_| ()),
            };
            match refreshed {
                Ok(()) => {}
                Err(e @ PortError::Unauthorized(_)) => return Err(e.into()),
                Err(e) => warn!("Voucher poll failed, will retry: {}", e),
            }

            let status = self.voucher.status();
            on_update(status);
            if status == VoucherStatus::Verified {
                return Ok(status);
            }
        }
        debug!("Voucher watch cancelled");
        Ok(self.voucher.status())
    }
}
