//! Tab manager configuration

use std::fmt;

/// Called with the new active id whenever the selection changes
pub type TabChangeObserver = Box<dyn FnMut(Option<&str>) + Send>;

/// Consulted before a tab closes; returning `false` keeps it open
pub type TabCloseInterceptor = Box<dyn FnMut(&str) -> bool + Send>;

pub struct TabManagerConfig {
    pub(crate) storage_key: String,
    pub(crate) persist: bool,
    pub(crate) max_tabs: Option<usize>,
    pub(crate) on_tab_change: Option<TabChangeObserver>,
    pub(crate) on_tab_close: Option<TabCloseInterceptor>,
    pub(crate) initial_tabs: Vec<String>,
}

impl TabManagerConfig {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            persist: true,
            max_tabs: None,
            on_tab_change: None,
            on_tab_close: None,
            initial_tabs: Vec::new(),
        }
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// `None` or `Some(0)` means unlimited
    pub fn max_tabs(mut self, max_tabs: Option<usize>) -> Self {
        self.max_tabs = max_tabs.filter(|&max| max > 0);
        self
    }

    pub fn on_tab_change<F>(mut self, observer: F) -> Self
    where
        F: FnMut(Option<&str>) + Send + 'static,
    {
        self.on_tab_change = Some(Box::new(observer));
        self
    }

    pub fn on_tab_close<F>(mut self, interceptor: F) -> Self
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        self.on_tab_close = Some(Box::new(interceptor));
        self
    }

    pub fn initial_tabs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.initial_tabs = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Detach the interceptor so a wrapper can chain its own in front of it
    pub fn take_on_tab_close(&mut self) -> Option<TabCloseInterceptor> {
        self.on_tab_close.take()
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }
}

impl fmt::Debug for TabManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabManagerConfig")
            .field("storage_key", &self.storage_key)
            .field("persist", &self.persist)
            .field("max_tabs", &self.max_tabs)
            .field("on_tab_change", &self.on_tab_change.is_some())
            .field("on_tab_close", &self.on_tab_close.is_some())
            .field("initial_tabs", &self.initial_tabs)
            .finish()
    }
}
