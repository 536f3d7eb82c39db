use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};

use tokio::sync::watch;

use crate::{error::ApiError, model::UserRecord, users::UserSource};

/// Which page comes next, and how big pages are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadCursor {
    pub next_page: u32,
    pub page_size: u32,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded { page: u32, count: usize },
    /// Another fetch was in flight; nothing was requested.
    AlreadyLoading,
    Failed(ApiError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}

/// Append-only, fetch-ordered user list fed one page at a time.
#[derive(Debug)]
pub struct UserListLoader {
    source: Arc<dyn UserSource>,
    page_size: u32,
    next_page: AtomicU32,
    is_loading: AtomicBool,
    users: watch::Sender<Arc<Vec<UserRecord>>>,
    loading: watch::Sender<bool>,
}

impl UserListLoader {
    pub fn new(source: Arc<dyn UserSource>, page_size: u32) -> Self {
        let (users, _) = watch::channel(Arc::new(Vec::new()));
        let (loading, _) = watch::channel(false);

        Self {
            source,
            page_size,
            next_page: AtomicU32::new(1),
            is_loading: AtomicBool::new(false),
            users,
            loading,
        }
    }

    pub fn users(&self) -> watch::Receiver<Arc<Vec<UserRecord>>> {
        self.users.subscribe()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Arc<Vec<UserRecord>> {
        Arc::clone(&self.users.borrow())
    }

    pub fn cursor(&self) -> LoadCursor {
        LoadCursor {
            next_page: self.next_page.load(Ordering::Acquire),
            page_size: self.page_size,
        }
    }

    /// Fetch the cursor's page and append it. A no-op while another call is
    /// in flight. The cursor only advances on success.
    pub async fn load_next_page(&self) -> LoadOutcome {
        if self
            .is_loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("user page already loading, ignoring request");
            return LoadOutcome::AlreadyLoading;
        }
        self.loading.send_replace(true);
        let _guard = LoadingGuard(self);

        let page = self.next_page.load(Ordering::Acquire);

        match self.source.fetch_page(page, self.page_size).await {
            Ok(records) => {
                let count = records.len();
                self.users.send_modify(|list| Arc::make_mut(list).extend(records));
                self.next_page.store(page.saturating_add(1), Ordering::Release);

                tracing::info!(page, count, total = self.users.borrow().len(), "loaded user page");
                LoadOutcome::Loaded { page, count }
            }
            Err(e) => {
                tracing::error!(page, status = ?e.status_code(), error = %e, "error fetching users");
                LoadOutcome::Failed(e)
            }
        }
    }
}

/// Clears the loading flag however the fetch ends, including cancellation.
struct LoadingGuard<'a>(&'a UserListLoader);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.is_loading.store(false, Ordering::Release);
        self.0.loading.send_replace(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::{collections::VecDeque, sync::Mutex, time::Duration};
    use tokio::sync::Semaphore;

    /// Serves scripted page sizes (or HTTP statuses) in order.
    #[derive(Debug)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<usize, u16>>>,
        calls: Mutex<Vec<(u32, u32)>>,
        gate: Option<Semaphore>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<usize, u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(script: Vec<Result<usize, u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                gate: Some(Semaphore::new(0)),
            })
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn record(page: u32, i: usize) -> UserRecord {
        UserRecord {
            id: format!("p{page}-{i}"),
            first_name: format!("First{i}"),
            last_name: format!("Last{i}"),
            email: format!("user{i}@example.com"),
            phone: String::new(),
            city: "Billings".into(),
            country: "United States".into(),
            picture_url: None,
            latitude: 45.0,
            longitude: -108.0,
        }
    }

    #[async_trait]
    impl UserSource for ScriptedSource {
        async fn fetch_page(&self, page: u32, page_size: u32) -> Result<Vec<UserRecord>, ApiError> {
            self.calls.lock().unwrap().push((page, page_size));
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }

            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(0));
            match next {
                Ok(n) => Ok((0..n).map(|i| record(page, i)).collect()),
                Err(status) => Err(ApiError::Status { status, body: "scripted".into() }),
            }
        }
    }

    #[tokio::test]
    async fn full_page_advances_cursor_to_two() {
        let source = ScriptedSource::new(vec![Ok(26)]);
        let loader = UserListLoader::new(source.clone(), 26);

        let outcome = loader.load_next_page().await;

        assert!(matches!(outcome, LoadOutcome::Loaded { page: 1, count: 26 }));
        assert_eq!(loader.current().len(), 26);
        assert_eq!(loader.cursor(), LoadCursor { next_page: 2, page_size: 26 });
        assert_eq!(source.calls(), vec![(1, 26)]);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn pages_append_in_fetch_order_even_when_short_or_empty() {
        let source = ScriptedSource::new(vec![Ok(26), Ok(10), Ok(0), Ok(3)]);
        let loader = UserListLoader::new(source.clone(), 26);

        for _ in 0..4 {
            assert!(loader.load_next_page().await.is_loaded());
        }

        let users = loader.current();
        assert_eq!(users.len(), 26 + 10 + 3);
        assert_eq!(users[0].id, "p1-0");
        assert_eq!(users[25].id, "p1-25");
        assert_eq!(users[26].id, "p2-0");
        assert_eq!(users[36].id, "p4-0");
        assert_eq!(loader.cursor().next_page, 5);
        assert_eq!(source.calls(), vec![(1, 26), (2, 26), (3, 26), (4, 26)]);
    }

    #[tokio::test]
    async fn failure_keeps_list_and_cursor() {
        let source = ScriptedSource::new(vec![Ok(5), Err(500), Ok(5)]);
        let loader = UserListLoader::new(source.clone(), 5);

        loader.load_next_page().await;
        let outcome = loader.load_next_page().await;

        match outcome {
            LoadOutcome::Failed(e) => assert_eq!(e.status_code(), Some(500)),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(loader.current().len(), 5);
        assert_eq!(loader.cursor().next_page, 2);
        assert!(!loader.is_loading());

        // The held cursor means the next call asks for the same page again.
        assert!(loader.load_next_page().await.is_loaded());
        assert_eq!(source.calls(), vec![(1, 5), (2, 5), (2, 5)]);
        assert_eq!(loader.current().len(), 10);
    }

    #[tokio::test]
    async fn call_while_loading_issues_no_request() {
        let source = ScriptedSource::gated(vec![Ok(26)]);
        let loader = Arc::new(UserListLoader::new(source.clone(), 26));

        let first = tokio::spawn({
            let loader = Arc::clone(&loader);
            async move { loader.load_next_page().await }
        });

        while source.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(loader.is_loading());
        assert!(*loader.loading().borrow());

        assert!(matches!(loader.load_next_page().await, LoadOutcome::AlreadyLoading));

        source.gate.as_ref().unwrap().add_permits(1);
        let outcome = first.await.unwrap();

        assert!(outcome.is_loaded());
        assert_eq!(source.calls().len(), 1);
        assert_eq!(loader.current().len(), 26);
        assert!(!*loader.loading().borrow());
    }

    #[tokio::test]
    async fn cancelled_fetch_clears_loading_flag() {
        let source = ScriptedSource::gated(vec![Ok(26)]);
        let loader = UserListLoader::new(source.clone(), 26);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), loader.load_next_page()).await;

        assert!(timed_out.is_err());
        assert!(!loader.is_loading());
        assert_eq!(loader.cursor().next_page, 1);
        assert!(loader.current().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_appended_users() {
        let source = ScriptedSource::new(vec![Ok(2)]);
        let loader = UserListLoader::new(source, 26);
        let mut rx = loader.users();

        assert!(!rx.has_changed().unwrap());
        loader.load_next_page().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
    }
}
