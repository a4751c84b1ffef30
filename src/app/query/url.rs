//! URL querier: one HEAD check, one state transition

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::access::UrlAccessManager;
use crate::app::info::UrlInfo;
use crate::app::state::{UrlState, UrlStatus};

/// Checks accessibility and freshness of one URL without fetching content
#[derive(Debug, Clone)]
pub struct UrlQuerier {
    manager: Arc<UrlAccessManager>,
    info: Arc<UrlInfo>,
    force_update: bool,
}

impl UrlQuerier {
    pub fn new(manager: Arc<UrlAccessManager>, info: Arc<UrlInfo>, force_update: bool) -> Self {
        Self {
            manager,
            info,
            force_update,
        }
    }

    /// Run the check and update the URL cell
    ///
    /// With server access disabled no connection is opened and the cached
    /// state is returned unchanged. Without `force_update`, a URL whose status
    /// is already known is not queried again.
    pub async fn query(&self) -> UrlState {
        let current = self.info.state();

        if !self.manager.is_server_access_enabled() {
            debug!("Server access disabled, not querying {}", self.info.url());
            return current;
        }
        if !self.force_update && current.status != UrlStatus::Unknown {
            return current;
        }

        let state = self.manager.fetch_state(self.info.url()).await;
        self.info.update(state.clone());
        state
    }

    /// Run the check on the worker pool; observers of the cell hear the result
    pub fn query_in_background(&self) -> JoinHandle<UrlState> {
        let querier = self.clone();
        tokio::spawn(async move { querier.query().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::{ClientConfig, CredentialStore};
    use mockito::Matcher;

    fn manager(root: &str) -> Arc<UrlAccessManager> {
        Arc::new(
            UrlAccessManager::new(root, &ClientConfig::default(), Arc::new(CredentialStore::new()))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_accessible_url_reports_last_modified() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", Matcher::Regex(r"^/files/a\.txt".to_string()))
            .with_status(200)
            .with_header("last-modified", "Wed, 21 Oct 2015 07:28:00 GMT")
            .create_async()
            .await;

        let manager = manager(&server.url());
        let url = manager.resolve("files/a.txt").unwrap();
        let querier = UrlQuerier::new(Arc::clone(&manager), manager.info(&url), false);

        let state = querier.query().await;
        assert_eq!(state.status, UrlStatus::Accessible);
        assert!(state.queried);
        assert!(state.last_modified.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_code_mapping() {
        let mut server = mockito::Server::new_async().await;
        let cases = [
            ("/secret", 401, UrlStatus::NotAuthorized),
            ("/forbidden", 403, UrlStatus::NotAuthorized),
            ("/missing", 404, UrlStatus::NotFound),
            ("/broken", 500, UrlStatus::HttpError),
        ];
        for (path, code, _) in cases {
            server
                .mock("HEAD", Matcher::Regex(format!("^{}", path)))
                .with_status(code)
                .create_async()
                .await;
        }

        let manager = manager(&server.url());
        for (path, _, expected) in cases {
            let url = manager.resolve(path).unwrap();
            let state = UrlQuerier::new(Arc::clone(&manager), manager.info(&url), true)
                .query()
                .await;
            assert_eq!(state.status, expected, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_known_status_is_not_requeried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", Matcher::Regex(r"^/a\.txt".to_string()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let manager = manager(&server.url());
        let url = manager.resolve("a.txt").unwrap();
        let info = manager.info(&url);
        UrlQuerier::new(Arc::clone(&manager), Arc::clone(&info), false)
            .query()
            .await;
        UrlQuerier::new(Arc::clone(&manager), info, false)
            .query()
            .await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_disabled_server_access_opens_no_connection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("HEAD", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let manager = manager(&server.url());
        manager.set_enable_server_access(false);
        let url = manager.resolve("a.txt").unwrap();
        let state = UrlQuerier::new(Arc::clone(&manager), manager.info(&url), true)
            .query()
            .await;

        assert_eq!(state.status, UrlStatus::Unknown);
        assert!(!state.queried);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_background_query_updates_cell() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", Matcher::Regex(r"^/bg\.txt".to_string()))
            .with_status(404)
            .create_async()
            .await;

        let manager = manager(&server.url());
        let url = manager.resolve("bg.txt").unwrap();
        let info = manager.info(&url);
        let handle = UrlQuerier::new(Arc::clone(&manager), Arc::clone(&info), false)
            .query_in_background();
        handle.await.unwrap();
        assert_eq!(info.state().status, UrlStatus::NotFound);
    }
}
